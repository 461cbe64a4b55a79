//! Call recording shared by the test importers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

/// Records every import and load performed by the test importers.
#[derive(Debug, Default)]
pub struct ImportLog {
    imports: Mutex<Vec<PathBuf>>,
    previous_data: Mutex<Vec<String>>,
    parses: AtomicUsize,
    loads: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ImportLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark an import of `path` as running until the guard drops.
    pub fn begin(&self, path: &Path) -> ActiveImport<'_> {
        self.imports.lock().push(path.to_path_buf());
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        ActiveImport { log: self }
    }

    /// Remember the previous-import-data token an import received.
    pub fn record_previous_data(&self, token: &str) {
        self.previous_data.lock().push(token.to_string());
    }

    /// Tokens received so far, in import order.
    pub fn previous_data(&self) -> Vec<String> {
        self.previous_data.lock().clone()
    }

    pub fn record_parse(&self) {
        self.parses.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::SeqCst);
    }

    pub fn import_count(&self) -> usize {
        self.imports.lock().len()
    }

    /// Imports of `path`, matched by file name so canonical roots don't matter.
    pub fn imports_of(&self, file_name: &str) -> usize {
        self.imports
            .lock()
            .iter()
            .filter(|path| path.file_name().is_some_and(|name| name == file_name))
            .count()
    }

    pub fn parse_count(&self) -> usize {
        self.parses.load(Ordering::SeqCst)
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Most imports ever running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.imports.lock().clear();
        self.previous_data.lock().clear();
        self.parses.store(0, Ordering::SeqCst);
        self.loads.store(0, Ordering::SeqCst);
        self.peak.store(self.active.load(Ordering::SeqCst), Ordering::SeqCst);
    }
}

/// Guard returned by [`ImportLog::begin`].
pub struct ActiveImport<'a> {
    log: &'a ImportLog,
}

impl Drop for ActiveImport<'_> {
    fn drop(&mut self) {
        self.log.active.fetch_sub(1, Ordering::SeqCst);
    }
}
