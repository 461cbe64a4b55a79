//! Persisted previous-import-data tokens.
//!
//! Maps each source path to the token its importer left after the last
//! successful import, stamped with the file's modification time. The cache
//! is an optimization only: losing it costs a re-parse, never correctness.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use parking_lot::Mutex;
use quarry_core::alloc::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::{AssetError, AssetResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheEntry {
    last_modified_date: u64,
    previous_import_data: String,
}

/// Modification time of `path` in milliseconds since the Unix epoch.
pub(crate) fn modified_millis(path: &Path) -> Option<u64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
    Some(since_epoch.as_millis() as u64)
}

pub(crate) struct ImportDataCache {
    file: Option<PathBuf>,
    entries: Mutex<HashMap<PathBuf, CacheEntry>>,
    persisted: Mutex<HashMap<PathBuf, CacheEntry>>,
}

impl ImportDataCache {
    /// In-memory cache that is never saved.
    pub fn in_memory() -> Self {
        Self {
            file: None,
            entries: Mutex::new(HashMap::new()),
            persisted: Mutex::new(HashMap::new()),
        }
    }

    /// Load the cache from `file`. Missing or unreadable files start empty;
    /// entries for paths that no longer exist are dropped.
    pub fn load(file: Option<PathBuf>) -> Self {
        let Some(file) = file else {
            return Self::in_memory();
        };

        let mut entries = HashMap::new();
        match fs::read_to_string(&file) {
            Ok(text) => match serde_json::from_str::<BTreeMap<String, CacheEntry>>(&text) {
                Ok(stored) => {
                    for (path, entry) in stored {
                        let path = PathBuf::from(path);
                        if path.exists() {
                            entries.insert(path, entry);
                        }
                    }
                    tracing::debug!(
                        "Loaded {} previous import records from '{}'",
                        entries.len(),
                        file.display()
                    );
                }
                Err(e) => tracing::warn!("Ignoring corrupt import cache '{}': {}", file.display(), e),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to read import cache '{}': {}", file.display(), e),
        }

        Self {
            file: Some(file),
            persisted: Mutex::new(entries.clone()),
            entries: Mutex::new(entries),
        }
    }

    /// Remove the record of `path` and return its token if the file is
    /// still at the recorded modification time.
    pub fn take(&self, path: &Path, modified: Option<u64>) -> String {
        let entry = self.entries.lock().remove(path);
        match (entry, modified) {
            (Some(entry), Some(modified)) if entry.last_modified_date == modified => {
                entry.previous_import_data
            }
            _ => String::new(),
        }
    }

    /// Record the token of a successful import. Empty tokens are not kept.
    pub fn store(&self, path: &Path, modified: Option<u64>, token: String) {
        if token.is_empty() {
            return;
        }
        let Some(modified) = modified else {
            return;
        };
        self.entries.lock().insert(
            path.to_path_buf(),
            CacheEntry {
                last_modified_date: modified,
                previous_import_data: token,
            },
        );
    }

    pub fn remove(&self, path: &Path) {
        self.entries.lock().remove(path);
    }

    pub fn rename(&self, old: &Path, new: &Path) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.remove(old) {
            entries.insert(new.to_path_buf(), entry);
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Write the cache if it changed since it was loaded or last saved.
    /// Returns `true` if the file was written.
    pub fn save(&self) -> AssetResult<bool> {
        let Some(file) = &self.file else {
            return Ok(false);
        };
        let entries = self.entries.lock().clone();
        let mut persisted = self.persisted.lock();
        if **persisted == *entries {
            return Ok(false);
        }

        let sorted: BTreeMap<String, &CacheEntry> = entries
            .iter()
            .map(|(path, entry)| (path.to_string_lossy().into_owned(), entry))
            .collect();
        let text = serde_json::to_string_pretty(&sorted)?;
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).map_err(|e| AssetError::io(parent, e))?;
        }
        fs::write(file, text).map_err(|e| AssetError::io(file, e))?;

        tracing::debug!("Saved {} previous import records to '{}'", entries.len(), file.display());
        *persisted = entries;
        Ok(true)
    }
}
