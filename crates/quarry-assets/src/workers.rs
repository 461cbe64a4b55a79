//! Import worker threads.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crate::error::{AssetError, AssetResult};
use crate::queue::{ImportJob, ImportQueue};

/// A fixed pool of threads draining an [`ImportQueue`].
///
/// Each worker pops one job at a time and runs the handler on it. Shutdown
/// closes the queue and joins the threads; a job that is already running
/// completes first.
pub(crate) struct ImportWorkers {
    queue: Arc<ImportQueue>,
    threads: Vec<thread::JoinHandle<()>>,
}

impl ImportWorkers {
    /// Spawn `num_threads` workers (at least one).
    pub fn spawn<F>(num_threads: usize, queue: Arc<ImportQueue>, handler: F) -> AssetResult<Self>
    where
        F: Fn(ImportJob) + Send + Sync + 'static,
    {
        let num_threads = num_threads.max(1);
        let handler = Arc::new(handler);
        let mut workers = Self {
            queue: queue.clone(),
            threads: Vec::with_capacity(num_threads),
        };

        for i in 0..num_threads {
            let queue = queue.clone();
            let handler = handler.clone();

            let handle = thread::Builder::new()
                .name(format!("quarry-import-{}", i))
                .spawn(move || {
                    while let Some(job) = queue.pop() {
                        let path = job.path.clone();
                        // A panicking importer must not leave the job in flight forever.
                        if panic::catch_unwind(AssertUnwindSafe(|| handler(job))).is_err() {
                            tracing::error!("Import of '{}' panicked", path.display());
                        }
                        queue.finish();
                    }
                })
                .map_err(|e| AssetError::InvalidConfig {
                    message: format!("failed to spawn import thread: {}", e),
                })?;

            workers.threads.push(handle);
        }

        tracing::debug!("Import pool created with {} threads", num_threads);
        Ok(workers)
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Stop the workers and wait for them to finish their current job.
    pub fn shutdown(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        tracing::debug!("Shutting down import pool with {} threads", self.threads.len());

        self.queue.close();
        for handle in std::mem::take(&mut self.threads) {
            if let Err(e) = handle.join() {
                tracing::error!("Import thread panicked: {:?}", e);
            }
        }

        tracing::debug!("Import pool shutdown complete");
    }
}

impl Drop for ImportWorkers {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Default worker count: one per logical CPU.
pub(crate) fn default_thread_count() -> usize {
    num_cpus::get().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use std::time::Duration;

    fn job(path: String) -> ImportJob {
        ImportJob {
            path: PathBuf::from(path),
            candidates: Vec::new(),
        }
    }

    #[test]
    fn test_workers_drain_queue() {
        let queue = Arc::new(ImportQueue::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let workers = ImportWorkers::spawn(3, queue.clone(), move |job| {
            sink.lock().push(job.path);
        })
        .unwrap();
        assert_eq!(workers.thread_count(), 3);

        for i in 0..20 {
            queue.push(job(format!("/f{}", i)));
        }
        queue.wait_idle();
        assert_eq!(seen.lock().len(), 20);
    }

    #[test]
    fn test_zero_threads_means_one() {
        let queue = Arc::new(ImportQueue::new());
        let workers = ImportWorkers::spawn(0, queue, |_| {}).unwrap();
        assert_eq!(workers.thread_count(), 1);
    }

    #[test]
    fn test_shutdown_lets_running_job_finish() {
        let queue = Arc::new(ImportQueue::new());
        let finished = Arc::new(Mutex::new(false));
        let flag = finished.clone();
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let mut workers = ImportWorkers::spawn(1, queue.clone(), move |_| {
            let _ = started_tx.send(());
            thread::sleep(Duration::from_millis(30));
            *flag.lock() = true;
        })
        .unwrap();

        queue.push(job("/slow".to_string()));
        started_rx.recv().unwrap();
        workers.shutdown();
        assert!(*finished.lock());
        assert_eq!(workers.thread_count(), 0);
    }

    #[test]
    fn test_default_thread_count() {
        assert!(default_thread_count() >= 1);
        assert!(default_thread_count() <= num_cpus::get().max(1));
    }
}
