//! Path-deduplicated FIFO feeding the import workers.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use quarry_core::alloc::HashSet;

use crate::registry::Candidate;

/// One file waiting to be imported.
#[derive(Debug)]
pub(crate) struct ImportJob {
    pub path: PathBuf,
    /// Serializers resolved when the job was queued.
    pub candidates: Vec<Candidate>,
}

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<ImportJob>,
    queued: HashSet<PathBuf>,
    in_flight: usize,
    completed: u64,
    closed: bool,
}

impl QueueState {
    fn is_idle(&self) -> bool {
        self.jobs.is_empty() && self.in_flight == 0
    }
}

/// Import queue.
///
/// A path is queued at most once. Popping a job removes its path from the
/// dedup set, so a change arriving while the file is being imported queues
/// it again. File content is read when the job runs, never when it is
/// queued.
pub(crate) struct ImportQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    progress: Condvar,
}

impl ImportQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            available: Condvar::new(),
            progress: Condvar::new(),
        }
    }

    /// Queue a job. Returns `false` if the path is already queued or the
    /// queue is closed.
    pub fn push(&self, job: ImportJob) -> bool {
        let mut state = self.state.lock();
        if state.closed || !state.queued.insert(job.path.clone()) {
            return false;
        }
        state.jobs.push_back(job);
        drop(state);
        self.available.notify_one();
        true
    }

    /// Block until a job is available. `None` once the queue is closed.
    ///
    /// Every job handed out must be acknowledged with [`ImportQueue::finish`].
    pub fn pop(&self) -> Option<ImportJob> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(job) = state.jobs.pop_front() {
                state.queued.remove(&job.path);
                state.in_flight += 1;
                return Some(job);
            }
            self.available.wait(&mut state);
        }
    }

    pub fn finish(&self) {
        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        state.completed += 1;
        drop(state);
        self.progress.notify_all();
    }

    /// Stop handing out jobs and wake every waiter. Queued jobs are dropped.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.jobs.clear();
        state.queued.clear();
        drop(state);
        self.available.notify_all();
        self.progress.notify_all();
    }

    /// Number of jobs finished since creation.
    pub fn completed(&self) -> u64 {
        self.state.lock().completed
    }

    pub fn len(&self) -> usize {
        self.state.lock().jobs.len()
    }

    pub fn is_idle(&self) -> bool {
        self.state.lock().is_idle()
    }

    /// Block until nothing is queued or running.
    pub fn wait_idle(&self) {
        self.wait_idle_with(|_| {});
    }

    /// Like [`ImportQueue::wait_idle`], calling `on_progress` with the
    /// completed counter every time a job finishes.
    pub fn wait_idle_with(&self, mut on_progress: impl FnMut(u64)) {
        let mut state = self.state.lock();
        let mut reported = None;
        while !state.is_idle() && !state.closed {
            if reported != Some(state.completed) {
                reported = Some(state.completed);
                let completed = state.completed;
                // Report without holding the lock.
                drop(state);
                on_progress(completed);
                state = self.state.lock();
                continue;
            }
            self.progress.wait(&mut state);
        }
        let completed = state.completed;
        drop(state);
        if reported != Some(completed) {
            on_progress(completed);
        }
    }

    /// Wait until idle or until `timeout` passes. Returns `true` if idle.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.is_idle() && !state.closed {
            if self.progress.wait_until(&mut state, deadline).timed_out() {
                return state.is_idle();
            }
        }
        state.is_idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn job(path: &str) -> ImportJob {
        ImportJob {
            path: PathBuf::from(path),
            candidates: Vec::new(),
        }
    }

    #[test]
    fn test_dedup_by_path() {
        let queue = ImportQueue::new();
        assert!(queue.push(job("/a")));
        assert!(!queue.push(job("/a")));
        assert!(queue.push(job("/b")));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_fifo_and_requeue_while_running() {
        let queue = ImportQueue::new();
        queue.push(job("/a"));
        queue.push(job("/b"));

        let first = queue.pop().unwrap();
        assert_eq!(first.path, PathBuf::from("/a"));
        // Popped jobs may be queued again right away.
        assert!(queue.push(job("/a")));
        assert!(!queue.is_idle());

        assert_eq!(queue.pop().unwrap().path, PathBuf::from("/b"));
        assert_eq!(queue.pop().unwrap().path, PathBuf::from("/a"));
        queue.finish();
        queue.finish();
        queue.finish();
        assert!(queue.is_idle());
        assert_eq!(queue.completed(), 3);
    }

    #[test]
    fn test_close_wakes_poppers() {
        let queue = Arc::new(ImportQueue::new());
        let popper = {
            let queue = queue.clone();
            thread::spawn(move || queue.pop().is_none())
        };
        thread::sleep(Duration::from_millis(20));
        queue.close();
        assert!(popper.join().unwrap());
        assert!(!queue.push(job("/late")));
    }

    #[test]
    fn test_wait_idle_with_progress() {
        let queue = Arc::new(ImportQueue::new());
        for i in 0..5 {
            queue.push(job(&format!("/f{}", i)));
        }

        let worker = {
            let queue = queue.clone();
            thread::spawn(move || {
                for _ in 0..5 {
                    let _job = queue.pop().unwrap();
                    thread::sleep(Duration::from_millis(2));
                    queue.finish();
                }
            })
        };

        let mut seen = Vec::new();
        queue.wait_idle_with(|done| seen.push(done));
        worker.join().unwrap();

        assert_eq!(seen.last().copied(), Some(5));
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_wait_idle_timeout() {
        let queue = ImportQueue::new();
        assert!(queue.wait_idle_timeout(Duration::from_millis(1)));
        queue.push(job("/stuck"));
        assert!(!queue.wait_idle_timeout(Duration::from_millis(10)));
    }
}
