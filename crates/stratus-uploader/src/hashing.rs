//! Content digests recorded with every uploaded file.

use bytes::Bytes;
use md5::Md5;
use sha2::{Digest, Sha256};
use stratus_core::StageError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHashes {
    /// 32 hex characters
    pub md5: String,
    /// 64 hex characters
    pub sha256: String,
}

impl ContentHashes {
    pub fn of(data: &[u8]) -> Self {
        Self {
            md5: hex::encode(Md5::digest(data)),
            sha256: hex::encode(Sha256::digest(data)),
        }
    }
}

/// Hash on the blocking pool so large files do not stall other pipelines.
pub async fn compute_content_hashes(data: Bytes) -> Result<ContentHashes, StageError> {
    tokio::task::spawn_blocking(move || ContentHashes::of(&data))
        .await
        .map_err(|e| StageError::Hashing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digests() {
        let hashes = ContentHashes::of(b"hello world");
        assert_eq!(hashes.md5, "5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(
            hashes.sha256,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[tokio::test]
    async fn hashes_off_the_runtime() {
        let hashes = compute_content_hashes(Bytes::new()).await.unwrap();
        assert_eq!(hashes.md5.len(), 32);
        assert_eq!(hashes.sha256.len(), 64);
        assert_eq!(hashes.md5, "d41d8cd98f00b204e9800998ecf8427e");
    }
}
