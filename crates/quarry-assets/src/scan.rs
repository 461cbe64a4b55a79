//! Directory walks and the background rescan thread.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

use parking_lot::{Condvar, Mutex};
use walkdir::WalkDir;

use crate::error::{AssetError, AssetResult};

/// Every regular file under `root` that `skip` does not reject, sorted.
pub(crate) fn walk_files(root: &Path, skip: impl Fn(&Path) -> bool) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry during scan: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| !skip(path))
        .collect();
    files.sort();
    files
}

/// Cheap change signal of a file: modification time and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FileStamp {
    pub modified: Option<SystemTime>,
    pub len: u64,
}

impl FileStamp {
    pub fn read(path: &Path) -> Option<Self> {
        let metadata = fs::metadata(path).ok()?;
        Some(Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        })
    }
}

/// Shutdown flag the rescan thread sleeps on.
#[derive(Default)]
pub(crate) struct RescanSignal {
    dead: Mutex<bool>,
    wake: Condvar,
}

impl RescanSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for up to `timeout`. Returns `true` once shutdown was requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        let mut dead = self.dead.lock();
        if !*dead {
            self.wake.wait_for(&mut dead, timeout);
        }
        *dead
    }

    pub fn kill(&self) {
        *self.dead.lock() = true;
        self.wake.notify_all();
    }
}

/// Spawn the periodic rescan. `pass` runs once per `interval` until the
/// signal is killed.
pub(crate) fn spawn_rescan<F>(
    signal: std::sync::Arc<RescanSignal>,
    interval: Duration,
    mut pass: F,
) -> AssetResult<JoinHandle<()>>
where
    F: FnMut(&RescanSignal) + Send + 'static,
{
    std::thread::Builder::new()
        .name("quarry-rescan".to_string())
        .spawn(move || {
            while !signal.wait(interval) {
                pass(&signal);
            }
            tracing::debug!("Rescan thread stopped");
        })
        .map_err(|e| AssetError::InvalidConfig {
            message: format!("failed to spawn rescan thread: {}", e),
        })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    use super::*;

    #[test]
    fn test_walk_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub/deeper")).unwrap();
        fs::write(dir.path().join("b.wav"), b"b").unwrap();
        fs::write(dir.path().join("a.wav"), b"a").unwrap();
        fs::write(dir.path().join("a.wav.jado"), b"{}").unwrap();
        fs::write(dir.path().join("sub/deeper/c.ttf"), b"c").unwrap();

        let files = walk_files(dir.path(), |path| {
            path.extension().is_some_and(|ext| ext == "jado")
        });
        assert_eq!(
            files,
            vec![
                dir.path().join("a.wav"),
                dir.path().join("b.wav"),
                dir.path().join("sub/deeper/c.ttf"),
            ]
        );
    }

    #[test]
    fn test_file_stamp_tracks_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        fs::write(&path, b"abc").unwrap();
        let before = FileStamp::read(&path).unwrap();
        fs::write(&path, b"abcdef").unwrap();
        let after = FileStamp::read(&path).unwrap();
        assert_eq!(before.len, 3);
        assert_ne!(before, after);
        assert!(FileStamp::read(&dir.path().join("missing")).is_none());
    }

    #[test]
    fn test_rescan_thread_stops_promptly() {
        let signal = Arc::new(RescanSignal::new());
        let passes = Arc::new(AtomicUsize::new(0));
        let counter = passes.clone();
        let handle = spawn_rescan(signal.clone(), Duration::from_millis(5), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while passes.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        signal.kill();
        handle.join().unwrap();
        assert!(passes.load(Ordering::SeqCst) >= 2);
        assert!(signal.wait(Duration::from_secs(60)));
    }
}
