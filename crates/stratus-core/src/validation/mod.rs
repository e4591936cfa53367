//! Pre-queue file validation

use crate::config::UploadConfig;
use crate::error::ValidationError;
use crate::models::UploadFile;

/// Check a file against the size and type policy.
///
/// Size is checked first; the type allow-list is only consulted when it is
/// non-empty.
pub fn validate_file(file: &UploadFile, config: &UploadConfig) -> Result<(), ValidationError> {
    if file.size > config.max_file_size_bytes {
        return Err(ValidationError::TooLarge {
            size: file.size,
            limit_bytes: config.max_file_size_bytes,
        });
    }

    if config.allowed_file_types.is_empty() {
        return Ok(());
    }

    let extension = file.extension();
    let allowed = config
        .allowed_file_types
        .iter()
        .any(|pattern| matches_type(pattern, &file.mime_type, &extension));

    if !allowed {
        return Err(ValidationError::TypeNotAllowed {
            mime_type: file.mime_type.clone(),
            extension,
            accepted: config.allowed_file_types.clone(),
        });
    }

    Ok(())
}

/// Whether one allow-list pattern accepts the given MIME type / extension.
fn matches_type(pattern: &str, mime_type: &str, extension: &str) -> bool {
    if pattern == mime_type {
        return true;
    }
    if pattern.eq_ignore_ascii_case(extension) {
        return true;
    }
    match pattern.strip_suffix('*') {
        // `image/*` matches every MIME type starting with `image/`
        Some(prefix) if prefix.ends_with('/') => mime_type.starts_with(prefix),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, mime: &str, size: usize) -> UploadFile {
        UploadFile::new(name, mime, vec![0u8; size])
    }

    #[test]
    fn oversized_file_is_rejected_before_type_check() {
        let config = UploadConfig::default()
            .with_max_file_size(10)
            .with_allowed_file_types(["image/*"]);

        let err = validate_file(&file("big.exe", "application/x-msdownload", 11), &config)
            .unwrap_err();
        assert!(matches!(err, ValidationError::TooLarge { size: 11, limit_bytes: 10 }));
    }

    #[test]
    fn size_equal_to_limit_passes() {
        let config = UploadConfig::default().with_max_file_size(10);
        assert!(validate_file(&file("a.bin", "", 10), &config).is_ok());
    }

    #[test]
    fn empty_allow_list_accepts_everything() {
        let config = UploadConfig::default();
        for (name, mime) in [
            ("setup.exe", "application/x-msdownload"),
            ("README", ""),
            ("photo.png", "image/png"),
        ] {
            assert!(validate_file(&file(name, mime, 1), &config).is_ok());
        }
    }

    #[test]
    fn wildcard_rejects_other_top_level_types() {
        let config = UploadConfig::default().with_allowed_file_types(["image/*"]);

        let err =
            validate_file(&file("setup.exe", "application/x-msdownload", 1), &config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "File type not allowed. Accepted types: image/*"
        );
        assert!(validate_file(&file("a.webp", "image/webp", 1), &config).is_ok());
    }

    #[test]
    fn exact_mime_type_match() {
        let config = UploadConfig::default().with_allowed_file_types(["application/pdf"]);
        assert!(validate_file(&file("doc", "application/pdf", 1), &config).is_ok());
        assert!(validate_file(&file("doc.pdf", "application/x-pdf", 1), &config).is_err());
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let config = UploadConfig::default().with_allowed_file_types([".PNG", ".pdf"]);
        assert!(validate_file(&file("Shot.png", "", 1), &config).is_ok());
        assert!(validate_file(&file("REPORT.PDF", "", 1), &config).is_ok());
        assert!(validate_file(&file("notes.txt", "text/plain", 1), &config).is_err());
    }

    #[test]
    fn bare_star_is_not_a_wildcard() {
        let config = UploadConfig::default().with_allowed_file_types(["*"]);
        assert!(validate_file(&file("a.png", "image/png", 1), &config).is_err());
    }
}
