//! Fixed-size worker pool draining a shared task queue.
//!
//! One primitive: schedule a nullary task on some worker. Ordering between
//! two tasks is unspecified; serialization is layered on top by
//! [`Strand`](super::strand::Strand).

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

/// A unit of work accepted by any scheduler.
pub type Task = Box<dyn FnOnce() + Send>;

/// Anything that can run a nullary task "somewhere, eventually".
///
/// Implemented by [`PoolScheduler`] (run on any worker thread) and
/// [`Strand`](super::strand::Strand) (run serialized, FIFO).
pub trait Scheduler: Send + Sync {
    fn schedule(&self, task: Task);
}

enum Job {
    Run(Task),
    Stop,
}

struct PoolShared {
    tx: flume::Sender<Job>,
    stopping: AtomicBool,
}

/// Fixed set of OS threads executing tasks drawn from one MPMC queue.
///
/// Threads are named `ravel-worker-{i}`. `request_stop` drains every task
/// already queued, then joins; tasks scheduled afterwards are dropped.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn a pool with one thread per CPU.
    pub fn new() -> Self {
        Self::with_threads(num_cpus::get())
    }

    /// Spawn a pool with an explicit thread count (minimum 1).
    pub fn with_threads(count: usize) -> Self {
        let count = count.max(1);
        let (tx, rx) = flume::unbounded::<Job>();

        let mut handles = Vec::with_capacity(count);
        for i in 0..count {
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("ravel-worker-{}", i))
                .spawn(move || worker_loop(rx))
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }

        debug!(workers = count, "worker pool started");

        Self {
            shared: Arc::new(PoolShared {
                tx,
                stopping: AtomicBool::new(false),
            }),
            handles: Mutex::new(handles),
        }
    }

    /// A cheap clonable handle used to submit tasks to this pool.
    pub fn scheduler(&self) -> PoolScheduler {
        PoolScheduler {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.shared.stopping.load(Ordering::Acquire)
    }

    /// Drain outstanding tasks and join every worker.
    ///
    /// Idempotent; concurrent callers block until the first finishes.
    /// Must not be called from a pool thread.
    pub fn request_stop(&self) {
        let mut handles = self.handles.lock();

        if !self.shared.stopping.swap(true, Ordering::AcqRel) {
            // Queued behind all outstanding work; each worker consumes one.
            for _ in 0..handles.len() {
                let _ = self.shared.tx.send(Job::Stop);
            }
        }

        for handle in handles.drain(..) {
            let _ = handle.join();
        }

        debug!("worker pool stopped");
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.request_stop();
    }
}

fn worker_loop(rx: flume::Receiver<Job>) {
    while let Ok(job) = rx.recv() {
        match job {
            Job::Run(task) => {
                if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                    warn!("pool task panicked");
                }
            }
            Job::Stop => break,
        }
    }
    trace!("worker exiting");
}

/// Submission handle for a [`WorkerPool`].
#[derive(Clone)]
pub struct PoolScheduler {
    shared: Arc<PoolShared>,
}

impl Scheduler for PoolScheduler {
    fn schedule(&self, task: Task) {
        if self.shared.stopping.load(Ordering::Acquire) {
            warn!("task scheduled after pool stop; dropping");
            return;
        }
        if self.shared.tx.send(Job::Run(task)).is_err() {
            warn!("pool queue closed; dropping task");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn runs_submitted_tasks() {
        let pool = WorkerPool::with_threads(4);
        let counter = Arc::new(AtomicUsize::new(0));

        let scheduler = pool.scheduler();
        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            scheduler.schedule(Box::new(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            }));
        }

        pool.request_stop();
        assert_eq!(counter.load(Ordering::Relaxed), 100);
    }

    #[test]
    fn stop_is_idempotent_and_rejects_new_tasks() {
        let pool = WorkerPool::with_threads(2);
        let scheduler = pool.scheduler();

        pool.request_stop();
        pool.request_stop();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        scheduler.schedule(Box::new(move || flag.store(true, Ordering::Relaxed)));

        thread::sleep(Duration::from_millis(50));
        assert!(!ran.load(Ordering::Relaxed));
    }

    #[test]
    fn panicking_task_does_not_kill_workers() {
        let pool = WorkerPool::with_threads(1);
        let scheduler = pool.scheduler();

        scheduler.schedule(Box::new(|| panic!("boom")));

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        scheduler.schedule(Box::new(move || flag.store(true, Ordering::Relaxed)));

        pool.request_stop();
        assert!(ran.load(Ordering::Relaxed));
    }
}
