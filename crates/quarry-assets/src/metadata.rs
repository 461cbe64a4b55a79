//! Importer settings sidecars.
//!
//! Each tracked file `music.ogg` gets a `music.ogg.jado` next to it holding
//! the importer name and its serialized settings, so choices such as
//! generated GUIDs survive restarts.

use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AssetError, AssetResult};

/// Default sidecar suffix.
pub const DEFAULT_METADATA_EXTENSION: &str = ".jado";

/// Content of one sidecar file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImporterMetadata {
    /// Name of the serializer that owns the settings.
    pub importer: String,
    #[serde(default)]
    pub settings: serde_json::Value,
}

/// Sidecar path of `source`: the full file name plus `extension`.
pub fn sidecar_path(source: &Path, extension: &str) -> PathBuf {
    let mut name: OsString = source.as_os_str().to_owned();
    name.push(extension);
    PathBuf::from(name)
}

/// Whether `path` is a sidecar rather than a source file.
pub fn is_sidecar(path: &Path, extension: &str) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase().ends_with(&extension.to_lowercase()))
        .unwrap_or(false)
}

/// Read the sidecar of `source`. Missing sidecars yield `Ok(None)`.
pub fn read(source: &Path, extension: &str) -> AssetResult<Option<ImporterMetadata>> {
    let path = sidecar_path(source, extension);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(AssetError::io(&path, e)),
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| AssetError::Metadata {
            path,
            message: e.to_string(),
        })
}

/// Write the sidecar unless it already holds `metadata`. Returns `true` if
/// the file was written.
pub fn write_if_changed(source: &Path, extension: &str, metadata: &ImporterMetadata) -> AssetResult<bool> {
    if matches!(read(source, extension), Ok(Some(existing)) if existing == *metadata) {
        return Ok(false);
    }
    let path = sidecar_path(source, extension);
    let text = serde_json::to_string_pretty(metadata)?;
    fs::write(&path, text).map_err(|e| AssetError::io(&path, e))?;
    Ok(true)
}

/// Delete the sidecar of `source`, if any.
pub fn remove(source: &Path, extension: &str) -> AssetResult<()> {
    let path = sidecar_path(source, extension);
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AssetError::io(&path, e)),
    }
}

/// Move the sidecar along with its source file.
pub fn rename(old: &Path, new: &Path, extension: &str) -> AssetResult<()> {
    let from = sidecar_path(old, extension);
    let to = sidecar_path(new, extension);
    match fs::rename(&from, &to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AssetError::io(&from, e)),
    }
}
