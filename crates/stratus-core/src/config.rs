//! Configuration module
//!
//! `UploadConfig` is the immutable upload policy handed to the orchestrator.
//! `ClientConfig` describes where the backend and the CDN live and how to
//! authenticate against them. Both can be read from the environment (a `.env`
//! file is loaded first when present).

use std::env;
use std::time::Duration;

const MAX_FILE_SIZE_MB: u64 = 50;
const MAX_CONCURRENT_UPLOADS: usize = 3;
const UPLOAD_TIMEOUT_SECS: u64 = 300;
const CLEANUP_GRACE_MS: u64 = 3000;
const REQUEST_TIMEOUT_SECS: u64 = 60;

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_CDN_URL: &str = "https://cdn.hackclub.com";
// Public token accepted by the hosted CDN ingestion endpoint.
const DEFAULT_CDN_TOKEN: &str = "beans";

/// Upload policy
#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub max_file_size_bytes: u64,
    /// Accepted type patterns: exact MIME type, `.ext`, or a `type/*` prefix.
    /// Empty accepts every file.
    pub allowed_file_types: Vec<String>,
    pub max_concurrent_uploads: usize,
    /// Deadline for one whole pipeline. `None` disables it.
    pub upload_timeout: Option<Duration>,
    /// How long finished uploads stay visible once everything is terminal.
    pub cleanup_grace: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            allowed_file_types: Vec::new(),
            max_concurrent_uploads: MAX_CONCURRENT_UPLOADS,
            upload_timeout: Some(Duration::from_secs(UPLOAD_TIMEOUT_SECS)),
            cleanup_grace: Duration::from_millis(CLEANUP_GRACE_MS),
        }
    }
}

impl UploadConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let max_file_size_mb = env::var("STRATUS_MAX_FILE_SIZE_MB")
            .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
            .parse::<u64>()
            .map_err(|_| anyhow::anyhow!("STRATUS_MAX_FILE_SIZE_MB must be a valid number"))?;

        let allowed_file_types = env::var("STRATUS_ALLOWED_TYPES")
            .map(|s| parse_type_list(&s))
            .unwrap_or_default();

        let max_concurrent_uploads = env::var("STRATUS_MAX_CONCURRENT_UPLOADS")
            .unwrap_or_else(|_| MAX_CONCURRENT_UPLOADS.to_string())
            .parse()
            .unwrap_or(MAX_CONCURRENT_UPLOADS);

        // 0 disables the deadline
        let upload_timeout_secs: u64 = env::var("STRATUS_UPLOAD_TIMEOUT_SECS")
            .unwrap_or_else(|_| UPLOAD_TIMEOUT_SECS.to_string())
            .parse()
            .unwrap_or(UPLOAD_TIMEOUT_SECS);

        let cleanup_grace_ms = env::var("STRATUS_CLEANUP_GRACE_MS")
            .unwrap_or_else(|_| CLEANUP_GRACE_MS.to_string())
            .parse()
            .unwrap_or(CLEANUP_GRACE_MS);

        let config = Self {
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
            allowed_file_types,
            max_concurrent_uploads,
            upload_timeout: (upload_timeout_secs > 0)
                .then(|| Duration::from_secs(upload_timeout_secs)),
            cleanup_grace: Duration::from_millis(cleanup_grace_ms),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_concurrent_uploads == 0 {
            return Err(anyhow::anyhow!(
                "max_concurrent_uploads must be at least 1"
            ));
        }
        if self
            .allowed_file_types
            .iter()
            .any(|t| t.trim().is_empty())
        {
            return Err(anyhow::anyhow!("allowed file types must not contain empty entries"));
        }
        Ok(())
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size_bytes = bytes;
        self
    }

    pub fn with_allowed_file_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_file_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_concurrent_uploads(mut self, max: usize) -> Self {
        self.max_concurrent_uploads = max;
        self
    }

    pub fn with_upload_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.upload_timeout = timeout;
        self
    }

    pub fn with_cleanup_grace(mut self, grace: Duration) -> Self {
        self.cleanup_grace = grace;
        self
    }
}

/// Comma separated type patterns, trimmed, empty entries skipped.
pub fn parse_type_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Endpoints and credentials for the backend and the CDN.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Dashboard backend origin; the `/api/cdn/...` paths are appended to it.
    pub api_url: String,
    /// CDN origin; ingestion goes to `{cdn_url}/api/v3/new`.
    pub cdn_url: String,
    pub cdn_token: String,
    /// Value of the `Cookie` header sent to the backend (session auth).
    pub session_cookie: Option<String>,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            cdn_url: DEFAULT_CDN_URL.to_string(),
            cdn_token: DEFAULT_CDN_TOKEN.to_string(),
            session_cookie: None,
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Read STRATUS_API_URL (or API_URL), STRATUS_CDN_URL, STRATUS_CDN_TOKEN and
    /// STRATUS_SESSION_COOKIE.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let api_url = env::var("STRATUS_API_URL")
            .or_else(|_| env::var("API_URL"))
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let request_timeout_secs = env::var("STRATUS_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| REQUEST_TIMEOUT_SECS.to_string())
            .parse()
            .unwrap_or(REQUEST_TIMEOUT_SECS);

        let config = Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            cdn_url: env::var("STRATUS_CDN_URL")
                .unwrap_or_else(|_| DEFAULT_CDN_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            cdn_token: env::var("STRATUS_CDN_TOKEN")
                .unwrap_or_else(|_| DEFAULT_CDN_TOKEN.to_string()),
            session_cookie: env::var("STRATUS_SESSION_COOKIE")
                .ok()
                .filter(|c| !c.trim().is_empty()),
            request_timeout: Duration::from_secs(request_timeout_secs),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        for (name, url) in [("api_url", &self.api_url), ("cdn_url", &self.cdn_url)] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(anyhow::anyhow!(
                    "{} must be an http(s) URL, got '{}'",
                    name,
                    url
                ));
            }
        }
        if self.cdn_token.trim().is_empty() {
            return Err(anyhow::anyhow!("cdn_token must not be empty"));
        }
        Ok(())
    }
}
