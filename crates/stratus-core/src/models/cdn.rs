//! Wire types for the temp-store and CDN ingestion endpoints.

use serde::{Deserialize, Serialize};

/// JSON body of the temp-store upload. Either field may carry the URL.
#[derive(Debug, Default, Deserialize)]
pub struct TempUploadResponse {
    #[serde(rename = "tempUrl", default)]
    pub temp_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl TempUploadResponse {
    /// First non-empty URL, `tempUrl` preferred.
    pub fn into_url(self) -> Option<String> {
        [self.temp_url, self.url]
            .into_iter()
            .flatten()
            .map(|u| u.trim().to_string())
            .find(|u| !u.is_empty())
    }
}

/// One file deployed by the CDN.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CdnFile {
    /// Display file name assigned by the CDN.
    pub file: String,
    pub deployed_url: String,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdnIngestResponse {
    #[serde(default)]
    pub files: Vec<CdnFile>,
    #[serde(default)]
    pub cdn_base: Option<String>,
}

impl CdnIngestResponse {
    /// The first ingested file with the response's base URL, if any file came back.
    pub fn into_ingestion(self) -> Option<CdnIngestion> {
        let cdn_base = self.cdn_base;
        self.files
            .into_iter()
            .next()
            .map(|file| CdnIngestion { file, cdn_base })
    }
}

/// Result of the ingestion stage.
#[derive(Debug, Clone, PartialEq)]
pub struct CdnIngestion {
    pub file: CdnFile,
    pub cdn_base: Option<String>,
}
