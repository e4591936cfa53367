//! Upload endpoints of the dashboard backend and the CDN.
//!
//! [`StratusClient`] is the production [`UploadBackend`]: it talks to the backend
//! with the session cookie and to the CDN with its bearer token.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use stratus_core::models::{
    CdnIngestResponse, CdnIngestion, FileMetadataRecord, RootFolderResponse, TempUploadResponse,
    UploadFile,
};
use stratus_core::{ClientConfig, StageError, UploadBackend};

use crate::{ApiClient, Auth};

pub const TEMP_UPLOAD_PATH: &str = "/api/cdn/upload-0x0/";
pub const ROOT_FOLDER_PATH: &str = "/api/cdn/folders/root/";
pub const FILE_UPLOAD_PATH: &str = "/api/cdn/files/upload/";
pub const CDN_INGEST_PATH: &str = "/api/v3/new";

/// Client for every remote hop of an upload.
#[derive(Clone, Debug)]
pub struct StratusClient {
    api: ApiClient,
    cdn: ApiClient,
}

impl StratusClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let api_auth = match &config.session_cookie {
            Some(cookie) => Auth::Cookie(cookie.clone()),
            None => Auth::None,
        };

        Ok(Self {
            api: ApiClient::with_client(client.clone(), &config.api_url, api_auth),
            cdn: ApiClient::with_client(
                client,
                &config.cdn_url,
                Auth::Bearer(config.cdn_token.clone()),
            ),
        })
    }

    /// Create client from environment, see [`ClientConfig::from_env`].
    pub fn from_env() -> Result<Self> {
        let config = ClientConfig::from_env()?;
        Self::new(&config)
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Send the raw file to the temp store. The endpoint answers either with JSON
    /// (`tempUrl` or `url`) or with the URL as plain text.
    pub async fn upload_to_temp_storage(&self, file: &UploadFile) -> Result<String> {
        let mut part = Part::bytes(file.data.to_vec()).file_name(file.name.clone());
        if !file.mime_type.is_empty() {
            part = part
                .mime_str(&file.mime_type)
                .with_context(|| format!("Invalid MIME type: {}", file.mime_type))?;
        }
        let form = Form::new().part("file", part);

        let response = self.api.post_multipart(TEMP_UPLOAD_PATH, form).await?;

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false);

        let url = if is_json {
            response
                .json::<TempUploadResponse>()
                .await
                .context("Failed to parse response as JSON")?
                .into_url()
        } else {
            let text = response
                .text()
                .await
                .context("Failed to read response body")?;
            Some(text.trim().to_string()).filter(|u| !u.is_empty())
        };

        url.ok_or_else(|| anyhow::anyhow!("response did not contain a URL"))
    }

    /// Submit one temp URL to the CDN ingestion endpoint.
    pub async fn ingest_to_cdn(&self, temp_url: &str) -> Result<Option<CdnIngestion>> {
        let response: CdnIngestResponse = self
            .cdn
            .post_json(CDN_INGEST_PATH, &[temp_url])
            .await?;
        Ok(response.into_ingestion())
    }

    pub async fn fetch_root_folder_id(&self) -> Result<String> {
        let response: RootFolderResponse = self.api.get(ROOT_FOLDER_PATH).await?;
        Ok(response.root_folder.id)
    }

    pub async fn save_file(&self, record: &FileMetadataRecord) -> Result<serde_json::Value> {
        self.api.post_json(FILE_UPLOAD_PATH, record).await
    }
}

#[async_trait]
impl UploadBackend for StratusClient {
    async fn upload_temp(&self, file: &UploadFile) -> Result<String, StageError> {
        self.upload_to_temp_storage(file)
            .await
            .map_err(|e| StageError::TempStore(format!("{:#}", e)))
    }

    async fn ingest(&self, temp_url: &str) -> Result<CdnIngestion, StageError> {
        self.ingest_to_cdn(temp_url)
            .await
            .map_err(|e| StageError::Ingestion(format!("{:#}", e)))?
            .ok_or(StageError::EmptyIngestion)
    }

    async fn root_folder_id(&self) -> Result<String, StageError> {
        self.fetch_root_folder_id()
            .await
            .map_err(|e| StageError::RootFolder(format!("{:#}", e)))
    }

    async fn save_file_record(
        &self,
        record: &FileMetadataRecord,
    ) -> Result<serde_json::Value, StageError> {
        self.save_file(record).await.map_err(|e| {
            tracing::debug!(error = %e, filename = %record.original_filename, "File record rejected");
            StageError::Persist(format!("{:#}", e))
        })
    }
}
