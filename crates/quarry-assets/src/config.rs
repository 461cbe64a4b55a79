//! Database configuration.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::backends::Backends;
use crate::error::{AssetError, AssetResult};
use crate::metadata::DEFAULT_METADATA_EXTENSION;
use crate::workers::default_thread_count;

/// Progress callback of the initial scan: `(processed, total)`.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Configuration for a [`FileSystemDatabase`](crate::FileSystemDatabase).
///
/// # Example
///
/// ```ignore
/// let config = DatabaseConfig::new("assets")
///     .with_import_threads(4)
///     .with_previous_import_data_cache("target/import-cache.json")
///     .on_import_progress(|done, total| println!("{done}/{total}"));
/// ```
#[derive(Clone)]
pub struct DatabaseConfig {
    /// Root directory to scan.
    pub asset_directory: PathBuf,
    /// Import worker count. `None` uses one per logical CPU.
    pub import_thread_count: Option<usize>,
    /// Suffix of importer settings sidecars.
    pub metadata_extension: String,
    /// JSON file persisting previous import data across restarts.
    pub previous_import_data_cache: Option<PathBuf>,
    /// Called while the initial scan is imported.
    pub report_import_progress: Option<ProgressCallback>,
    /// Opaque handles handed to importers.
    pub backends: Backends,
    /// Period of the background safety-net rescan. `None` disables it.
    pub rescan_interval: Option<Duration>,
    /// Pause between files during a background rescan.
    pub rescan_file_delay: Duration,
    /// Watch the directory for changes.
    pub watch: bool,
    /// Debounce window of the directory watcher.
    pub watch_debounce: Duration,
}

impl DatabaseConfig {
    pub fn new(asset_directory: impl Into<PathBuf>) -> Self {
        Self {
            asset_directory: asset_directory.into(),
            import_thread_count: None,
            metadata_extension: DEFAULT_METADATA_EXTENSION.to_string(),
            previous_import_data_cache: None,
            report_import_progress: None,
            backends: Backends::new(),
            rescan_interval: Some(Duration::from_secs(10)),
            rescan_file_delay: Duration::from_millis(1),
            watch: true,
            watch_debounce: Duration::from_millis(500),
        }
    }

    pub fn with_import_threads(mut self, count: usize) -> Self {
        self.import_thread_count = Some(count);
        self
    }

    pub fn with_metadata_extension(mut self, extension: impl Into<String>) -> Self {
        self.metadata_extension = extension.into();
        self
    }

    pub fn with_previous_import_data_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.previous_import_data_cache = Some(path.into());
        self
    }

    pub fn on_import_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.report_import_progress = Some(Arc::new(callback));
        self
    }

    pub fn with_backends(mut self, backends: Backends) -> Self {
        self.backends = backends;
        self
    }

    pub fn with_rescan_interval(mut self, interval: Option<Duration>) -> Self {
        self.rescan_interval = interval;
        self
    }

    pub fn with_rescan_file_delay(mut self, delay: Duration) -> Self {
        self.rescan_file_delay = delay;
        self
    }

    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    pub fn with_watch_debounce(mut self, debounce: Duration) -> Self {
        self.watch_debounce = debounce;
        self
    }

    /// Effective worker count, never below one.
    pub fn thread_count(&self) -> usize {
        self.import_thread_count
            .unwrap_or_else(default_thread_count)
            .max(1)
    }

    /// Validate and normalize the configuration.
    pub(crate) fn normalized(mut self) -> AssetResult<Self> {
        let extension = self.metadata_extension.trim();
        if extension.is_empty() || extension == "." {
            return Err(AssetError::InvalidConfig {
                message: "metadata extension must not be empty".to_string(),
            });
        }
        self.metadata_extension = if extension.starts_with('.') {
            extension.to_string()
        } else {
            format!(".{}", extension)
        };

        if self.rescan_interval == Some(Duration::ZERO) {
            return Err(AssetError::InvalidConfig {
                message: "rescan interval must be positive".to_string(),
            });
        }
        Ok(self)
    }

    /// Canonical asset root, or [`AssetError::InvalidRoot`].
    pub(crate) fn canonical_root(&self) -> AssetResult<PathBuf> {
        let root = self.asset_directory.canonicalize().map_err(|source| {
            AssetError::InvalidRoot {
                path: self.asset_directory.clone(),
                source,
            }
        })?;
        if !root.is_dir() {
            return Err(AssetError::InvalidRoot {
                path: self.asset_directory.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
            });
        }
        Ok(root)
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("asset_directory", &self.asset_directory)
            .field("import_thread_count", &self.import_thread_count)
            .field("metadata_extension", &self.metadata_extension)
            .field("previous_import_data_cache", &self.previous_import_data_cache)
            .field("report_import_progress", &self.report_import_progress.is_some())
            .field("backends", &self.backends)
            .field("rescan_interval", &self.rescan_interval)
            .field("rescan_file_delay", &self.rescan_file_delay)
            .field("watch", &self.watch)
            .field("watch_debounce", &self.watch_debounce)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DatabaseConfig::new("assets");
        assert_eq!(config.metadata_extension, ".jado");
        assert_eq!(config.rescan_interval, Some(Duration::from_secs(10)));
        assert_eq!(config.rescan_file_delay, Duration::from_millis(1));
        assert!(config.watch);
        assert!(config.thread_count() >= 1);
    }

    #[test]
    fn test_thread_count_floor() {
        assert_eq!(DatabaseConfig::new("a").with_import_threads(0).thread_count(), 1);
        assert_eq!(DatabaseConfig::new("a").with_import_threads(6).thread_count(), 6);
    }

    #[test]
    fn test_normalize_metadata_extension() {
        let config = DatabaseConfig::new("a")
            .with_metadata_extension("meta")
            .normalized()
            .unwrap();
        assert_eq!(config.metadata_extension, ".meta");

        let err = DatabaseConfig::new("a")
            .with_metadata_extension("  ")
            .normalized()
            .unwrap_err();
        assert!(matches!(err, AssetError::InvalidConfig { .. }));
    }

    #[test]
    fn test_zero_rescan_interval_rejected() {
        let result = DatabaseConfig::new("a")
            .with_rescan_interval(Some(Duration::ZERO))
            .normalized();
        assert!(result.is_err());
    }

    #[test]
    fn test_canonical_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = DatabaseConfig::new(dir.path()).canonical_root().unwrap();
        assert!(root.is_absolute());

        let missing = DatabaseConfig::new(dir.path().join("missing"));
        assert!(matches!(
            missing.canonical_root(),
            Err(AssetError::InvalidRoot { .. })
        ));

        let file = dir.path().join("file.txt");
        std::fs::write(&file, b"x").unwrap();
        assert!(DatabaseConfig::new(&file).canonical_root().is_err());
    }

    #[test]
    fn test_debug_hides_callback() {
        let config = DatabaseConfig::new("a").on_import_progress(|_, _| {});
        let text = format!("{:?}", config);
        assert!(text.contains("report_import_progress: true"));
    }
}
