//! Stratus Core Library
//!
//! This crate provides the domain models, error types, configuration and validation
//! shared by the upload engine, the HTTP client and the CLI.

pub mod backend;
pub mod config;
pub mod error;
pub mod hooks;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use backend::UploadBackend;
pub use config::{ClientConfig, UploadConfig};
pub use error::{LogLevel, StageError, UploadError, ValidationError};
pub use hooks::{NoOpObserver, UploadObserver};
pub use validation::validate_file;
