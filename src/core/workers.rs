//! Thread pool running provider load jobs off the timeline thread.
//!
//! Uses work-stealing deques:
//! - New jobs go to the global injector, which workers check first
//! - Idle workers steal from each other
//!
//! Staleness is not handled here. Each job carries a [`LoadTicket`] and
//! discards its own result when superseded.
//!
//! [`LoadTicket`]: crate::core::provider::LoadTicket

use crossbeam::deque::{Injector, Stealer, Worker};
use log::{trace, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::core::provider::{LoadExecutor, LoadJob};

/// Worker pool for fire-and-forget provider loads.
///
/// # Example
/// ```ignore
/// let workers = Arc::new(Workers::new(Workers::default_threads()));
/// let provider = CatalogProvider::new("density", years, source, workers.clone(), notifier);
/// ```
pub struct Workers {
    injector: Arc<Injector<LoadJob>>,
    handles: Vec<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl Workers {
    /// Recommended size: half the cores, at least one. Loads are I/O and
    /// geometry bound and the timeline thread must stay responsive.
    pub fn default_threads() -> usize {
        (num_cpus::get() / 2).max(1)
    }

    pub fn new(num_threads: usize) -> Self {
        let num_threads = num_threads.max(1);
        let injector: Arc<Injector<LoadJob>> = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let locals: Vec<Worker<LoadJob>> = (0..num_threads).map(|_| Worker::new_fifo()).collect();
        let stealers: Vec<Stealer<LoadJob>> = locals.iter().map(|w| w.stealer()).collect();
        let mut handles = Vec::with_capacity(num_threads);

        for (worker_id, local) in locals.into_iter().enumerate() {
            let injector = Arc::clone(&injector);
            let shutdown = Arc::clone(&shutdown);
            let stealers = stealers.clone();

            let spawned = thread::Builder::new()
                .name(format!("timemap-loader-{}", worker_id))
                .spawn(move || {
                    trace!("Loader {} started", worker_id);
                    loop {
                        if let Some(job) = find_job(&local, &injector, &stealers) {
                            job();
                            continue;
                        }
                        if shutdown.load(Ordering::Relaxed) {
                            break;
                        }
                        // Idle: short sleep instead of spinning
                        thread::sleep(Duration::from_millis(1));
                    }
                    trace!("Loader {} stopped", worker_id);
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => warn!("Failed to spawn loader thread {}: {}", worker_id, e),
            }
        }

        trace!("Workers initialized: {} threads (work-stealing)", handles.len());

        Self {
            injector,
            handles,
            shutdown,
        }
    }

    pub fn num_threads(&self) -> usize {
        self.handles.len()
    }

    /// Queue a closure on the pool.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.handles.is_empty() {
            // No threads could be spawned: degrade to running in place.
            f();
            return;
        }
        self.injector.push(Box::new(f));
    }
}

fn find_job(
    local: &Worker<LoadJob>,
    injector: &Injector<LoadJob>,
    stealers: &[Stealer<LoadJob>],
) -> Option<LoadJob> {
    if let Some(job) = local.pop() {
        return Some(job);
    }
    if let Some(job) = injector.steal_batch_and_pop(local).success() {
        return Some(job);
    }
    stealers.iter().find_map(|s| s.steal().success())
}

impl LoadExecutor for Workers {
    fn spawn(&self, job: LoadJob) {
        self.execute(job);
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        let num_threads = self.handles.len();
        trace!("Workers shutting down ({} threads)...", num_threads);
        self.shutdown.store(true, Ordering::SeqCst);

        // Hung loads must not block exit; give up after the deadline.
        let deadline = Instant::now() + Duration::from_millis(500);
        for handle in std::mem::take(&mut self.handles) {
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    trace!("Shutdown timeout reached, exiting anyway");
                    return;
                }
                thread::sleep(Duration::from_millis(1));
            }
            let _ = handle.join();
        }
        trace!("All {} workers stopped", num_threads);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_executes_all_jobs() {
        let workers = Workers::new(2);
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let c = Arc::clone(&count);
            workers.spawn(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        while count.load(Ordering::SeqCst) < 50 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(count.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn test_default_threads_nonzero() {
        assert!(Workers::default_threads() >= 1);
    }
}
