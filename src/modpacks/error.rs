use crate::integration::modrinth::SearchError;
use crate::modpack_zip::ArchiveError;
use crate::store::StoreError;

#[derive(thiserror::Error, Debug)]
pub enum ModpackError {
    #[error("Invalid file type: only .zip modpacks are accepted")]
    UnsupportedFileType,
    #[error("Upload exceeds the {0} MB limit")]
    TooLarge(u64),
    #[error("Upload interrupted: {0}")]
    Upload(String),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("Invalid modpack data: {0}")]
    InvalidData(String),
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Invalid modpack ID '{0}': only letters, numbers, underscores or hyphens are allowed")]
    InvalidIdentifier(String),
    #[error("Modpack must contain at least one mod")]
    EmptyModList,
    #[error("Logo must be PNG, JPG or GIF format")]
    UnsupportedImageType,
    #[error("Failed to fetch mod {mod_id}: {source}")]
    ModFetch {
        mod_id: String,
        #[source]
        source: SearchError,
    },
    #[error("Modpack {0} not found")]
    NotFound(String),
    #[error("No icon available for {0}")]
    IconNotFound(String),
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error("Failed to encode manifest: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
