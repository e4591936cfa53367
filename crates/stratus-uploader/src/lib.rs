//! Client-side upload orchestration.
//!
//! [`UploadOrchestrator`] validates submitted files, queues them, runs at most
//! `max_concurrent_uploads` three-stage pipelines at a time (temp store, CDN
//! ingestion, metadata persistence) and reports per-file and aggregate status
//! through an [`UploadObserver`](stratus_core::UploadObserver) and a watch channel
//! of [`UploadSnapshot`]s.

pub mod completion;
pub mod hashing;
pub mod limiter;
pub mod notification;
pub mod orchestrator;
pub mod pipeline;
pub mod tracker;

pub use completion::CompletionSignaler;
pub use hashing::{compute_content_hashes, ContentHashes};
pub use limiter::ConcurrencyLimiter;
pub use notification::{AggregateStatus, NotificationItem, UploadNotification};
pub use orchestrator::{SubmitReport, UploadOrchestrator, UploadSnapshot};
pub use pipeline::PipelineRunner;
pub use tracker::{StateTracker, TransitionError};
