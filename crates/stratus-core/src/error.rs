//! Error types module
//!
//! Validation failures are reported before a file is queued and never create a task.
//! Stage failures happen inside a running pipeline and end the task in the `error`
//! state; `UploadError` is the user-facing wrapper stored on the task.

use std::time::Duration;

use crate::models::PipelineStage;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected outcomes like user cancellation
    Debug,
    /// Warning level - for remote failures outside our control
    Warn,
    /// Error level - for unexpected failures
    Error,
}

fn megabytes(bytes: &u64) -> f64 {
    *bytes as f64 / (1024.0 * 1024.0)
}

fn joined(types: &[String]) -> String {
    types.join(", ")
}

/// Why a file was rejected before it was queued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("File size exceeds {:.1}MB limit", megabytes(.limit_bytes))]
    TooLarge { size: u64, limit_bytes: u64 },

    #[error("File type not allowed. Accepted types: {}", joined(.accepted))]
    TypeNotAllowed {
        mime_type: String,
        extension: String,
        accepted: Vec<String>,
    },
}

/// Failure of a single pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    #[error("Temporary upload failed: {0}")]
    TempStore(String),

    #[error("CDN upload failed: {0}")]
    Ingestion(String),

    #[error("CDN upload returned no files")]
    EmptyIngestion,

    #[error("Failed to fetch root folder: {0}")]
    RootFolder(String),

    #[error("Failed to hash file: {0}")]
    Hashing(String),

    #[error("Backend save failed: {0}")]
    Persist(String),

    #[error("Upload timed out after {0:?}")]
    Timeout(Duration),

    #[error("Upload cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StageError {
    /// The stage that produced this error, if it belongs to one.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            StageError::TempStore(_) => Some(PipelineStage::TempStore),
            StageError::Ingestion(_) | StageError::EmptyIngestion => {
                Some(PipelineStage::Ingestion)
            }
            StageError::RootFolder(_) | StageError::Hashing(_) | StageError::Persist(_) => {
                Some(PipelineStage::Persist)
            }
            StageError::Timeout(_) | StageError::Cancelled | StageError::Internal(_) => None,
        }
    }

    pub fn log_level(&self) -> LogLevel {
        match self {
            StageError::Cancelled => LogLevel::Debug,
            StageError::Internal(_) | StageError::Hashing(_) => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }
}

/// Terminal failure of one upload, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Upload failed: {0}")]
pub struct UploadError(#[from] pub StageError);
