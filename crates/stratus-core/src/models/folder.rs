use serde::{Deserialize, Serialize};

/// Minimal folder reference returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FolderRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Response of the root folder lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct RootFolderResponse {
    pub root_folder: FolderRef,
}

/// Folder id from a dashboard path such as `/dashboard/my-cdn/{id}`.
///
/// Returns `None` at the root of the file browser, where uploads land in the
/// root folder.
pub fn folder_id_from_dashboard_path(path: &str) -> Option<&str> {
    let rest = path.split_once("/dashboard/my-cdn/")?.1;
    let id = rest.trim_end_matches('/');
    (!id.is_empty()).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_id_from_path() {
        assert_eq!(
            folder_id_from_dashboard_path("/dashboard/my-cdn/4f1c"),
            Some("4f1c")
        );
        assert_eq!(
            folder_id_from_dashboard_path("https://app.example/dashboard/my-cdn/4f1c/"),
            Some("4f1c")
        );
        assert_eq!(folder_id_from_dashboard_path("/dashboard/my-cdn/"), None);
        assert_eq!(folder_id_from_dashboard_path("/dashboard/starred"), None);
    }

    #[test]
    fn root_folder_response_parses() {
        let resp: RootFolderResponse =
            serde_json::from_str(r#"{"root_folder":{"id":"r-1","name":"root","extra":true}}"#)
                .unwrap();
        assert_eq!(resp.root_folder.id, "r-1");
    }
}
