#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stratus_core::models::{
    CdnFile, CdnIngestion, CompletedUpload, FileMetadataRecord, UploadFile, UploadResult,
    UploadTask,
};
use stratus_core::{StageError, UploadBackend, UploadConfig, UploadObserver};
use stratus_uploader::{UploadOrchestrator, UploadSnapshot};
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

pub const WAIT: Duration = Duration::from_secs(5);

/// In-memory backend. Every temp-store upload waits for one permit of `gate`,
/// so tests decide when pipelines may move on.
pub struct GatedBackend {
    gate: Semaphore,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    started: Mutex<Vec<String>>,
    ingested: AtomicUsize,
    saved: Mutex<Vec<FileMetadataRecord>>,
    fail: HashSet<String>,
    panic: HashSet<String>,
}

impl GatedBackend {
    /// Uploads block until [`GatedBackend::open`] hands out permits.
    pub fn gated() -> Self {
        Self::with_permits(0)
    }

    /// Uploads never block.
    pub fn open_ended() -> Self {
        Self::with_permits(Semaphore::MAX_PERMITS)
    }

    fn with_permits(permits: usize) -> Self {
        Self {
            gate: Semaphore::new(permits),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            started: Mutex::new(Vec::new()),
            ingested: AtomicUsize::new(0),
            saved: Mutex::new(Vec::new()),
            fail: HashSet::new(),
            panic: HashSet::new(),
        }
    }

    /// Temp-store upload of `name` fails with a 500.
    pub fn failing(mut self, name: &str) -> Self {
        self.fail.insert(name.to_string());
        self
    }

    /// Temp-store upload of `name` panics.
    pub fn panicking(mut self, name: &str) -> Self {
        self.panic.insert(name.to_string());
        self
    }

    pub fn open(&self, permits: usize) {
        self.gate.add_permits(permits);
    }

    /// File names in the order their pipelines reached the temp store.
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn ingested(&self) -> usize {
        self.ingested.load(Ordering::SeqCst)
    }

    pub fn saved(&self) -> Vec<FileMetadataRecord> {
        self.saved.lock().unwrap().clone()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl UploadBackend for GatedBackend {
    async fn upload_temp(&self, file: &UploadFile) -> Result<String, StageError> {
        self.started.lock().unwrap().push(file.name.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        let permit = self.gate.acquire().await.expect("gate closed");
        permit.forget();

        if self.panic.contains(&file.name) {
            panic!("backend exploded on {}", file.name);
        }
        if self.fail.contains(&file.name) {
            return Err(StageError::TempStore(
                "API request failed with status 500 Internal Server Error: boom".into(),
            ));
        }
        Ok(format!("https://tmp.example/{}", file.name))
    }

    async fn ingest(&self, temp_url: &str) -> Result<CdnIngestion, StageError> {
        self.ingested.fetch_add(1, Ordering::SeqCst);
        let name = temp_url.rsplit('/').next().unwrap_or_default();
        Ok(CdnIngestion {
            file: CdnFile {
                file: name.to_string(),
                deployed_url: format!("https://cdn.example/{}", name),
                sha: Some("abc123".into()),
                size: None,
            },
            cdn_base: Some("https://cdn.example".into()),
        })
    }

    async fn root_folder_id(&self) -> Result<String, StageError> {
        Ok("root".into())
    }

    async fn save_file_record(
        &self,
        record: &FileMetadataRecord,
    ) -> Result<serde_json::Value, StageError> {
        let mut saved = self.saved.lock().unwrap();
        saved.push(record.clone());
        Ok(serde_json::json!({ "id": saved.len(), "folder_id": record.folder_id }))
    }
}

#[derive(Debug, Clone)]
pub enum Observed {
    Start(Vec<Uuid>),
    Progress(Uuid, u8),
    Complete(Uuid, UploadResult),
    Error(Uuid, String),
    AllComplete(Vec<CompletedUpload>),
}

/// Forwards every callback into a channel.
pub struct RecordingObserver {
    tx: mpsc::UnboundedSender<Observed>,
}

impl RecordingObserver {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Observed>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl UploadObserver for RecordingObserver {
    fn on_upload_start(&self, tasks: &[UploadTask]) {
        let _ = self.tx.send(Observed::Start(tasks.iter().map(|t| t.id).collect()));
    }

    fn on_upload_progress(&self, task_id: Uuid, progress: u8) {
        let _ = self.tx.send(Observed::Progress(task_id, progress));
    }

    fn on_upload_complete(&self, task_id: Uuid, result: &UploadResult) {
        let _ = self.tx.send(Observed::Complete(task_id, result.clone()));
    }

    fn on_upload_error(&self, task_id: Uuid, error: &str) {
        let _ = self.tx.send(Observed::Error(task_id, error.to_string()));
    }

    fn on_all_uploads_complete(&self, completed: &[CompletedUpload]) {
        let _ = self.tx.send(Observed::AllComplete(completed.to_vec()));
    }
}

pub fn file(name: &str, mime: &str) -> UploadFile {
    UploadFile::new(name, mime, format!("contents of {}", name).into_bytes())
}

pub fn orchestrator(
    config: UploadConfig,
    backend: &Arc<GatedBackend>,
) -> (UploadOrchestrator, mpsc::UnboundedReceiver<Observed>) {
    let (observer, rx) = RecordingObserver::new();
    let orchestrator = UploadOrchestrator::new(config, backend.clone(), observer)
        .expect("valid config");
    (orchestrator, rx)
}

/// Collect callbacks until the all-complete event arrives.
pub async fn until_all_complete(
    rx: &mut mpsc::UnboundedReceiver<Observed>,
) -> (Vec<Observed>, Vec<CompletedUpload>) {
    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for all-complete")
            .expect("observer channel closed");
        if let Observed::AllComplete(summary) = event {
            return (seen, summary);
        }
        seen.push(event);
    }
}

/// Wait until a published snapshot satisfies `predicate`.
pub async fn until_snapshot(
    orchestrator: &UploadOrchestrator,
    predicate: impl FnMut(&UploadSnapshot) -> bool,
) -> UploadSnapshot {
    let mut rx = orchestrator.subscribe();
    let snapshot = tokio::time::timeout(WAIT, rx.wait_for(predicate))
        .await
        .expect("timed out waiting for snapshot")
        .expect("snapshot channel closed")
        .clone();
    snapshot
}

/// Wait until the backend has seen `n` temp-store uploads.
pub async fn until_started(backend: &GatedBackend, n: usize) {
    tokio::time::timeout(WAIT, async {
        while backend.started().len() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for uploads to start");
}
