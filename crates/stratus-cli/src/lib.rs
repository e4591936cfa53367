use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::time::Duration;
use stratus_core::models::{folder_id_from_dashboard_path, UploadFile};
use stratus_core::{UploadConfig, ValidationError};

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Accept either a bare folder id or a dashboard URL/path pointing at a folder.
/// The file browser root (or an empty value) means "upload to the root folder".
pub fn resolve_folder(arg: Option<&str>) -> Option<String> {
    let arg = arg?.trim();
    if arg.contains("/dashboard/my-cdn") {
        return folder_id_from_dashboard_path(arg).map(str::to_string);
    }
    (!arg.is_empty()).then(|| arg.to_string())
}

/// Per-invocation overrides of the environment upload policy.
#[derive(Debug, Default, Clone)]
pub struct UploadOverrides {
    pub max_concurrent: Option<usize>,
    pub max_size_mb: Option<u64>,
    pub allow: Vec<String>,
    /// 0 disables the deadline.
    pub timeout_secs: Option<u64>,
}

impl UploadOverrides {
    pub fn apply(&self, mut config: UploadConfig) -> UploadConfig {
        if let Some(max) = self.max_concurrent {
            config = config.with_max_concurrent_uploads(max);
        }
        if let Some(mb) = self.max_size_mb {
            config = config.with_max_file_size(mb * 1024 * 1024);
        }
        if !self.allow.is_empty() {
            config = config.with_allowed_file_types(self.allow.iter().cloned());
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_upload_timeout((secs > 0).then(|| Duration::from_secs(secs)));
        }
        config
    }
}

/// A path that never became an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPath {
    pub path: String,
    pub reason: String,
}

impl Display for SkippedPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

/// Read the given paths into memory. Files over `max_bytes` are refused from
/// their metadata without being read. A path that cannot be read is skipped
/// and the rest are still loaded.
pub async fn load_files(paths: &[PathBuf], max_bytes: u64) -> (Vec<UploadFile>, Vec<SkippedPath>) {
    let mut files = Vec::with_capacity(paths.len());
    let mut skipped = Vec::new();

    for path in paths {
        let skip = |reason: String| SkippedPath {
            path: path.display().to_string(),
            reason,
        };

        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                skipped.push(skip(format!("Failed to read file: {}", e)));
                continue;
            }
        };
        if !metadata.is_file() {
            skipped.push(skip("Not a regular file".to_string()));
            continue;
        }
        if metadata.len() > max_bytes {
            let reason = ValidationError::TooLarge {
                size: metadata.len(),
                limit_bytes: max_bytes,
            };
            skipped.push(skip(reason.to_string()));
            continue;
        }

        match UploadFile::from_path(path).await {
            Ok(file) => files.push(file),
            Err(e) => skipped.push(skip(format!("{:#}", e))),
        }
    }

    (files, skipped)
}


/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
