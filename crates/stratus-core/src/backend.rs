//! Remote collaborators of the upload pipeline
//!
//! The pipeline runner only talks to the outside world through this trait. The
//! HTTP client crate provides the production implementation; tests plug in
//! in-memory backends.

use async_trait::async_trait;

use crate::error::StageError;
use crate::models::{CdnIngestion, FileMetadataRecord, UploadFile};

#[async_trait]
pub trait UploadBackend: Send + Sync {
    /// Send the raw file to the temp store and return its temporary URL.
    async fn upload_temp(&self, file: &UploadFile) -> Result<String, StageError>;

    /// Ask the CDN to ingest the file found at `temp_url`.
    async fn ingest(&self, temp_url: &str) -> Result<CdnIngestion, StageError>;

    /// Identifier of the user's root folder.
    async fn root_folder_id(&self) -> Result<String, StageError>;

    /// Persist the file record and return the backend's response body.
    async fn save_file_record(
        &self,
        record: &FileMetadataRecord,
    ) -> Result<serde_json::Value, StageError>;
}
