use serde::Serialize;

/// Metadata record persisted by the backend once a file is on the CDN.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileMetadataRecord {
    /// Display file name assigned by the CDN.
    pub filename: String,
    pub original_filename: String,
    pub cdn_url: String,
    pub file_size: u64,
    pub mime_type: String,
    pub md5_hash: String,
    pub sha256_hash: String,
    pub folder_id: String,
}
