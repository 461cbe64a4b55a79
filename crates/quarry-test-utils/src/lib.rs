//! Test utilities for Quarry.
//!
//! Recording importers, resource types and small helpers shared by the
//! integration tests, benchmarks and demos of `quarry-assets`.
//!
//! # Overview
//!
//! - [`ImportLog`] - counts imports, parses and loads, and the peak number
//!   of concurrent imports
//! - [`AudioSerializer`] (`.wav`, `.ogg`), [`FontSerializer`] (`.font`,
//!   `.ttf`), [`PackSerializer`] (`.pack`) and [`FailingSerializer`]
//! - [`test_registry`] / [`test_config`] - a registry with all of the above
//!   and a deterministic configuration without background threads
//!
//! # Example
//!
//! ```ignore
//! let dir = tempfile::tempdir()?;
//! std::fs::write(dir.path().join("a.wav"), b"samples")?;
//!
//! let log = ImportLog::new();
//! let database = FileSystemDatabase::new(test_config(dir.path()), test_registry(&log))?;
//! assert_eq!(log.imports_of("a.wav"), 1);
//! ```

mod importers;
mod log;
mod resources;

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use quarry_assets::{DatabaseConfig, SerializerRegistry};

pub use importers::{
    AudioImporter, AudioSerializer, FailingImporter, FailingSerializer, FontImporter, FontSerializer,
    GuidSettings, PackImporter, PackSerializer, PackSettings,
};
pub use log::{ActiveImport, ImportLog};
pub use resources::{AudioClip, Font, Media, PackEntry};

/// A registry with the audio, font and pack serializers.
pub fn test_registry(log: &Arc<ImportLog>) -> Arc<SerializerRegistry> {
    let registry = Arc::new(SerializerRegistry::new());
    registry.register(AudioSerializer::new(log.clone()));
    registry.register(FontSerializer::new(log.clone()));
    registry.register(PackSerializer::new(log.clone()));
    registry
}

/// Four import threads, no watcher and no background rescan, so tests
/// drive every change explicitly.
pub fn test_config(dir: &Path) -> DatabaseConfig {
    DatabaseConfig::new(dir)
        .with_import_threads(4)
        .with_rescan_interval(None)
        .with_watch(false)
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}
