pub mod cdn;
pub mod file_record;
pub mod folder;
pub mod mime;
pub mod upload;

pub use cdn::{CdnFile, CdnIngestResponse, CdnIngestion, TempUploadResponse};
pub use file_record::FileMetadataRecord;
pub use folder::{folder_id_from_dashboard_path, FolderRef, RootFolderResponse};
pub use mime::guess_mime_type;
pub use upload::{
    CompletedUpload, PipelineStage, Rejection, TaskStatus, UploadFile, UploadResult, UploadTask,
};
