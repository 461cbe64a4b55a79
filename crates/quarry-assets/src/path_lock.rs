//! One mutex per canonical path.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use quarry_core::alloc::HashMap;

/// Held while a path is being imported, renamed or erased.
pub(crate) type PathGuard = ArcMutexGuard<RawMutex, ()>;

const INITIAL_PRUNE_THRESHOLD: usize = 64;

/// Hands out one lock per path so work on the same file serializes while
/// unrelated files proceed in parallel.
///
/// Entries are weak; a path's lock disappears once nobody holds or waits on
/// it, and dead entries are pruned as the map grows.
pub(crate) struct PathLockCache {
    inner: Mutex<LockMap>,
}

struct LockMap {
    locks: HashMap<PathBuf, Weak<Mutex<()>>>,
    prune_threshold: usize,
}

impl PathLockCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LockMap {
                locks: HashMap::new(),
                prune_threshold: INITIAL_PRUNE_THRESHOLD,
            }),
        }
    }

    fn handle(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut inner = self.inner.lock();
        if let Some(lock) = inner.locks.get(path).and_then(Weak::upgrade) {
            return lock;
        }

        if inner.locks.len() >= inner.prune_threshold {
            inner.locks.retain(|_, lock| lock.strong_count() > 0);
            inner.prune_threshold = (inner.locks.len() * 2).max(INITIAL_PRUNE_THRESHOLD);
        }

        let lock = Arc::new(Mutex::new(()));
        inner.locks.insert(path.to_path_buf(), Arc::downgrade(&lock));
        lock
    }

    /// Block until `path` is free and take it.
    pub fn lock(&self, path: &Path) -> PathGuard {
        self.handle(path).lock_arc()
    }

    /// Lock two paths in a consistent order. `None` for the second guard
    /// when both paths are the same.
    pub fn lock_pair(&self, a: &Path, b: &Path) -> (PathGuard, Option<PathGuard>) {
        if a == b {
            return (self.lock(a), None);
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        let first = self.lock(first);
        let second = self.lock(second);
        (first, Some(second))
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().locks.len()
    }
}
