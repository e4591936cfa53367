//! One file through the three remote stages: temp store, CDN ingestion and
//! metadata persistence.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use stratus_core::models::{CdnIngestion, FileMetadataRecord, UploadFile, UploadResult};
use stratus_core::{LogLevel, StageError, UploadBackend, UploadError};
use tokio_util::sync::CancellationToken;

use crate::hashing::compute_content_hashes;

/// Progress checkpoints reported while a pipeline runs.
pub const PROGRESS_STARTED: u8 = 10;
pub const PROGRESS_TEMP_STORED: u8 = 33;
pub const PROGRESS_INGESTED: u8 = 66;

#[derive(Clone)]
pub struct PipelineRunner {
    backend: Arc<dyn UploadBackend>,
}

impl PipelineRunner {
    pub fn new(backend: Arc<dyn UploadBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn UploadBackend> {
        &self.backend
    }

    /// Run without deadline or cancellation.
    pub async fn run<F>(
        &self,
        file: &UploadFile,
        folder_id: Option<&str>,
        on_progress: F,
    ) -> Result<UploadResult, UploadError>
    where
        F: Fn(u8) + Send + Sync,
    {
        self.run_guarded(file, folder_id, None, &CancellationToken::new(), on_progress)
            .await
    }

    /// Run the stages, giving up when `timeout` elapses or `cancel` fires.
    /// Cancellation wins over every other outcome once it is observed.
    #[tracing::instrument(skip_all, fields(file = %file.name, size = file.size))]
    pub async fn run_guarded<F>(
        &self,
        file: &UploadFile,
        folder_id: Option<&str>,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
        on_progress: F,
    ) -> Result<UploadResult, UploadError>
    where
        F: Fn(u8) + Send + Sync,
    {
        let stages = async {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, self.run_stages(file, folder_id, &on_progress))
                    .await
                    .unwrap_or(Err(StageError::Timeout(limit))),
                None => self.run_stages(file, folder_id, &on_progress).await,
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StageError::Cancelled),
            result = stages => result,
        };

        outcome.map_err(|e| {
            let stage = e.stage().map(|s| s.to_string()).unwrap_or_default();
            match e.log_level() {
                LogLevel::Debug => tracing::debug!(error = %e, stage = %stage, "Upload stopped"),
                LogLevel::Warn => tracing::warn!(error = %e, stage = %stage, "Upload failed"),
                LogLevel::Error => tracing::error!(error = %e, stage = %stage, "Upload failed"),
            }
            UploadError::from(e)
        })
    }

    async fn run_stages(
        &self,
        file: &UploadFile,
        folder_id: Option<&str>,
        on_progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<UploadResult, StageError> {
        on_progress(PROGRESS_STARTED);

        let temp_url = self.backend.upload_temp(file).await?;
        let temp_url = temp_url.trim();
        if temp_url.is_empty() {
            return Err(StageError::TempStore(
                "response did not contain a URL".to_string(),
            ));
        }
        tracing::debug!(temp_url = %temp_url, "Stored in temporary storage");
        on_progress(PROGRESS_TEMP_STORED);

        let ingestion = self.backend.ingest(temp_url).await?;
        tracing::debug!(cdn_url = %ingestion.file.deployed_url, "Ingested by CDN");
        on_progress(PROGRESS_INGESTED);

        self.persist(file, folder_id, ingestion).await
    }

    async fn persist(
        &self,
        file: &UploadFile,
        folder_id: Option<&str>,
        ingestion: CdnIngestion,
    ) -> Result<UploadResult, StageError> {
        let hashes = compute_content_hashes(file.data.clone()).await?;

        let folder_id = match folder_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => id.to_string(),
            None => self.backend.root_folder_id().await?,
        };

        let cdn_file = ingestion.file;
        let record = FileMetadataRecord {
            filename: cdn_file.file.clone(),
            original_filename: file.name.clone(),
            cdn_url: cdn_file.deployed_url.clone(),
            file_size: file.size,
            mime_type: file.mime_type.clone(),
            md5_hash: hashes.md5.clone(),
            sha256_hash: hashes.sha256.clone(),
            folder_id: folder_id.clone(),
        };

        let response = self.backend.save_file_record(&record).await?;
        let mut fields = match response {
            serde_json::Value::Object(map) => map,
            other => {
                tracing::debug!(response = %other, "Backend record is not an object");
                serde_json::Map::new()
            }
        };
        for key in UploadResult::OWN_KEYS {
            fields.remove(key);
        }

        Ok(UploadResult {
            record: fields,
            cdn_url: cdn_file.deployed_url,
            filename: file.name.clone(),
            size: file.size,
            mime_type: file.mime_type.clone(),
            uploaded_at: Utc::now(),
            sha: cdn_file.sha,
            md5_hash: hashes.md5,
            sha256_hash: hashes.sha256,
            folder_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use stratus_core::models::CdnFile;

    #[derive(Default)]
    struct MemoryBackend {
        fail_temp: bool,
        empty_ingestion: bool,
        calls: Mutex<Vec<&'static str>>,
        saved: Mutex<Vec<FileMetadataRecord>>,
    }

    impl MemoryBackend {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl UploadBackend for MemoryBackend {
        async fn upload_temp(&self, file: &UploadFile) -> Result<String, StageError> {
            self.calls.lock().unwrap().push("temp");
            if self.fail_temp {
                return Err(StageError::TempStore("500 Internal Server Error".into()));
            }
            Ok(format!(" https://tmp.example/{} ", file.name))
        }

        async fn ingest(&self, temp_url: &str) -> Result<CdnIngestion, StageError> {
            self.calls.lock().unwrap().push("ingest");
            if self.empty_ingestion {
                return Err(StageError::EmptyIngestion);
            }
            let name = temp_url.rsplit('/').next().unwrap_or_default();
            Ok(CdnIngestion {
                file: CdnFile {
                    file: format!("cdn_{}", name),
                    deployed_url: format!("https://cdn.example/{}", name),
                    sha: Some("cafe".into()),
                    size: None,
                },
                cdn_base: None,
            })
        }

        async fn root_folder_id(&self) -> Result<String, StageError> {
            self.calls.lock().unwrap().push("root");
            Ok("root-1".into())
        }

        async fn save_file_record(
            &self,
            record: &FileMetadataRecord,
        ) -> Result<serde_json::Value, StageError> {
            self.calls.lock().unwrap().push("save");
            self.saved.lock().unwrap().push(record.clone());
            Ok(serde_json::json!({
                "id": 7,
                "filename": record.filename,
                "starred": false,
            }))
        }
    }

    fn file() -> UploadFile {
        UploadFile::new("a.png", "image/png", &b"abc"[..])
    }

    #[tokio::test]
    async fn runs_all_stages_with_checkpoints() {
        let backend = Arc::new(MemoryBackend::default());
        let runner = PipelineRunner::new(backend.clone());
        let progress = Mutex::new(Vec::new());

        let result = runner
            .run(&file(), Some("folder-9"), |p| progress.lock().unwrap().push(p))
            .await
            .unwrap();

        assert_eq!(*progress.lock().unwrap(), vec![10, 33, 66]);
        assert_eq!(backend.calls(), vec!["temp", "ingest", "save"]);
        assert_eq!(result.cdn_url, "https://cdn.example/a.png");
        assert_eq!(result.filename, "a.png");
        assert_eq!(result.folder_id, "folder-9");
        assert_eq!(result.sha.as_deref(), Some("cafe"));
        assert_eq!(result.md5_hash, "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(result.record_id().as_deref(), Some("7"));
        assert!(!result.record.contains_key("filename"));
        assert_eq!(result.record["starred"], false);

        let saved = backend.saved.lock().unwrap();
        assert_eq!(saved[0].filename, "cdn_a.png");
        assert_eq!(saved[0].original_filename, "a.png");
        assert_eq!(
            saved[0].sha256_hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn missing_folder_uses_root_folder() {
        let backend = Arc::new(MemoryBackend::default());
        let runner = PipelineRunner::new(backend.clone());

        let result = runner.run(&file(), None, |_| {}).await.unwrap();
        assert_eq!(result.folder_id, "root-1");
        assert_eq!(backend.calls(), vec!["temp", "ingest", "root", "save"]);
    }

    #[tokio::test]
    async fn temp_failure_stops_before_ingestion() {
        let backend = Arc::new(MemoryBackend {
            fail_temp: true,
            ..Default::default()
        });
        let runner = PipelineRunner::new(backend.clone());
        let progress = Mutex::new(Vec::new());

        let err = runner
            .run(&file(), None, |p| progress.lock().unwrap().push(p))
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("Upload failed: "));
        assert!(err.to_string().contains("500"));
        assert_eq!(backend.calls(), vec!["temp"]);
        assert_eq!(*progress.lock().unwrap(), vec![10]);
    }

    #[tokio::test]
    async fn empty_ingestion_is_an_error() {
        let backend = Arc::new(MemoryBackend {
            empty_ingestion: true,
            ..Default::default()
        });
        let runner = PipelineRunner::new(backend.clone());

        let err = runner.run(&file(), None, |_| {}).await.unwrap_err();
        assert_eq!(err.to_string(), "Upload failed: CDN upload returned no files");
        assert_eq!(backend.calls(), vec!["temp", "ingest"]);
    }

    #[tokio::test]
    async fn cancelled_token_wins() {
        let backend = Arc::new(MemoryBackend::default());
        let runner = PipelineRunner::new(backend.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = runner
            .run_guarded(&file(), None, None, &cancel, |_| {})
            .await
            .unwrap_err();
        assert_eq!(err, UploadError(StageError::Cancelled));
        assert!(backend.calls().is_empty());
    }
}
