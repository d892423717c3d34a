// Byte storage for uploaded recordings

pub mod local;

use thiserror::Error;

pub use local::LocalStorage;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid storage path: {0}")]
    InvalidPath(String),

    #[error("{suffix} file not found in {prefix}")]
    NotFound { prefix: String, suffix: String },
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Blocking key/value byte store. Paths are `/`-separated and relative to the store root.
pub trait Storage: Send + Sync {
    fn save(&self, path: &str, data: &[u8]) -> StorageResult<()>;
    fn read(&self, path: &str) -> StorageResult<Vec<u8>>;
    fn exists(&self, path: &str) -> StorageResult<bool>;
    /// Deleting a missing file is not an error.
    fn delete(&self, path: &str) -> StorageResult<()>;
    /// All files under `prefix`, recursively. A missing prefix yields an empty list.
    fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;
    fn size(&self, path: &str) -> StorageResult<u64>;
}

/// First file under `prefix` whose name ends with `suffix`, ignoring case.
pub fn find_by_suffix(storage: &dyn Storage, prefix: &str, suffix: &str) -> StorageResult<String> {
    let suffix_lower = suffix.to_lowercase();
    let mut entries = storage.list(prefix)?;
    entries.sort();
    entries
        .into_iter()
        .find(|p| p.to_lowercase().ends_with(&suffix_lower))
        .ok_or_else(|| StorageError::NotFound {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        })
}

pub fn read_by_suffix(storage: &dyn Storage, prefix: &str, suffix: &str) -> StorageResult<Vec<u8>> {
    let path = find_by_suffix(storage, prefix, suffix)?;
    storage.read(&path)
}
