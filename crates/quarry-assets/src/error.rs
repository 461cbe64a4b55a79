//! Error types for the asset database.

use std::path::{Path, PathBuf};

use quarry_core::Guid;
use thiserror::Error;

/// Errors that can occur during asset database operations.
#[derive(Debug, Error)]
pub enum AssetError {
    /// The asset directory could not be opened.
    #[error("asset directory '{}' is not accessible: {source}", path.display())]
    InvalidRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to read or write a file.
    #[error("IO error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No importer serializer is registered for the file.
    #[error("no importer registered for '{}'", path.display())]
    NoImporter { path: PathBuf },

    /// An importer failed to decode its source file.
    #[error("failed to import '{}': {message}", path.display())]
    Import { path: PathBuf, message: String },

    /// A settings sidecar could not be read or applied.
    #[error("metadata error for '{}': {message}", path.display())]
    Metadata { path: PathBuf, message: String },

    /// An asset was loaded as the wrong resource type.
    #[error("resource type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// A resource factory failed.
    #[error("asset {guid} failed to load: {message}")]
    Load { guid: Guid, message: String },

    /// The database configuration is unusable.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The directory observer failed.
    #[cfg(feature = "watch")]
    #[error("file watcher error: {0}")]
    Watch(#[from] notify_debouncer_full::notify::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AssetError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        AssetError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Shorthand for importer failures.
    pub fn import(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        AssetError::Import {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    pub fn load(guid: Guid, message: impl Into<String>) -> Self {
        AssetError::Load {
            guid,
            message: message.into(),
        }
    }

    /// Whether retrying later could succeed without the file changing.
    pub fn is_transient(&self) -> bool {
        matches!(self, AssetError::Io { .. })
    }
}

/// Result type for asset database operations.
pub type AssetResult<T> = Result<T, AssetError>;
