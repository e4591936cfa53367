//! Lifecycle callbacks
//!
//! The upload engine delivers these calls from one dispatcher task, in the order
//! the matching state changes happened. A slow implementation delays later
//! callbacks but never the uploads themselves.

use uuid::Uuid;

use crate::models::{CompletedUpload, UploadResult, UploadTask};

/// Observer of upload lifecycle events. Every method defaults to a no-op.
pub trait UploadObserver: Send + Sync {
    /// A submission was accepted; `tasks` are the newly queued uploads.
    fn on_upload_start(&self, _tasks: &[UploadTask]) {}

    /// Progress checkpoint of one upload (0-100).
    fn on_upload_progress(&self, _task_id: Uuid, _progress: u8) {}

    fn on_upload_complete(&self, _task_id: Uuid, _result: &UploadResult) {}

    fn on_upload_error(&self, _task_id: Uuid, _error: &str) {}

    /// Every tracked upload reached a terminal state. `completed` lists the
    /// successful uploads of the set that just finished.
    fn on_all_uploads_complete(&self, _completed: &[CompletedUpload]) {}
}

/// Observer used when the caller does not need callbacks.
pub struct NoOpObserver;

impl UploadObserver for NoOpObserver {}
