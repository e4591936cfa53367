use anyhow::{Context, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::models::mime::guess_mime_type;

/// MIME type used when the extension is not recognised.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// A local file selected for upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadFile {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    #[serde(skip)]
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size: data.len() as u64,
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Invalid file name: {}", path.display()))?
            .to_string();

        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read file: {}", path.display()))?;

        let mime_type = guess_mime_type(&name).unwrap_or(DEFAULT_MIME_TYPE);
        Ok(Self::new(name, mime_type, data))
    }

    /// Lowercased `.ext` synthesized from the text after the last dot of the name.
    /// A name without a dot yields `.` followed by the whole name.
    pub fn extension(&self) -> String {
        let ext = self.name.rsplit('.').next().unwrap_or_default();
        format!(".{}", ext.to_lowercase())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Uploading,
    Completed,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Uploading => write!(f, "uploading"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Error => write!(f, "error"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "uploading" => Ok(TaskStatus::Uploading),
            "completed" => Ok(TaskStatus::Completed),
            "error" => Ok(TaskStatus::Error),
            _ => Err(anyhow::anyhow!("Invalid task status: {}", s)),
        }
    }
}

/// The three remote hops of an upload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    TempStore,
    Ingestion,
    Persist,
}

impl Display for PipelineStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PipelineStage::TempStore => write!(f, "temp_store"),
            PipelineStage::Ingestion => write!(f, "ingestion"),
            PipelineStage::Persist => write!(f, "persist"),
        }
    }
}

/// Final payload of a successful upload: the backend record merged with
/// upload-local bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    #[serde(flatten)]
    pub record: serde_json::Map<String, serde_json::Value>,
    pub cdn_url: String,
    pub filename: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub sha: Option<String>,
    pub md5_hash: String,
    pub sha256_hash: String,
    pub folder_id: String,
}

impl UploadResult {
    /// Keys set from bookkeeping; the same keys in the backend record are dropped.
    pub const OWN_KEYS: [&'static str; 9] = [
        "cdnUrl",
        "filename",
        "size",
        "type",
        "uploadedAt",
        "sha",
        "md5Hash",
        "sha256Hash",
        "folderId",
    ];

    /// Record id assigned by the backend, when it returned one.
    pub fn record_id(&self) -> Option<String> {
        match self.record.get("id")? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// One tracked upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadTask {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub file: UploadFile,
    pub status: TaskStatus,
    pub progress: u8,
    pub error: Option<String>,
    pub result: Option<UploadResult>,
    pub created_at: DateTime<Utc>,
}

impl UploadTask {
    pub fn pending(batch_id: Uuid, file: UploadFile) -> Self {
        Self {
            id: Uuid::new_v4(),
            batch_id,
            file,
            status: TaskStatus::Pending,
            progress: 0,
            error: None,
            result: None,
            created_at: Utc::now(),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file.name
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Entry of the all-complete summary.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CompletedUpload {
    pub task_id: Uuid,
    pub file_name: String,
}

/// A file refused by validation; it never became a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub file_name: String,
    pub reason: ValidationError,
}

impl Display for Rejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}: {}", self.file_name, self.reason)
    }
}
