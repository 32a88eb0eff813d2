//! Serialized execution lanes over a shared scheduler.
//!
//! A [`Strand`] wraps a base [`Scheduler`] and guarantees that tasks
//! submitted to it run one at a time, in FIFO order, on whichever base
//! thread happens to pick up the trampoline. No pinning: consecutive tasks
//! may land on different threads, but their executions never overlap, so
//! state owned by a strand needs no lock.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::pool::{Scheduler, Task};

struct StrandQueue {
    tasks: VecDeque<Task>,
    running: bool,
}

struct StrandState {
    base: Arc<dyn Scheduler>,
    queue: Mutex<StrandQueue>,
}

impl StrandState {
    /// Trampoline: pop one task, run it, re-arm. One task per hop; draining
    /// the whole queue here would monopolize a base thread.
    fn run_one(self: Arc<Self>) {
        let task = {
            let mut queue = self.queue.lock();
            match queue.tasks.pop_front() {
                Some(task) => task,
                None => {
                    queue.running = false;
                    return;
                }
            }
        };

        // A panicking task must not stall the tasks queued behind it.
        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            debug!("strand task panicked; continuing");
        }

        let state = Arc::clone(&self);
        self.base.schedule(Box::new(move || state.run_one()));
    }
}

/// A logical single-threaded execution lane on top of a thread pool.
///
/// Cloning yields another handle to the same lane; tasks from all clones
/// share one FIFO.
#[derive(Clone)]
pub struct Strand {
    state: Arc<StrandState>,
}

impl Strand {
    pub fn new(base: Arc<dyn Scheduler>) -> Self {
        Self {
            state: Arc::new(StrandState {
                base,
                queue: Mutex::new(StrandQueue {
                    tasks: VecDeque::new(),
                    running: false,
                }),
            }),
        }
    }

    /// Build a strand over any clonable scheduler.
    pub fn over<S: Scheduler + Clone + 'static>(base: &S) -> Self {
        Self::new(Arc::new(base.clone()))
    }

    /// Two handles are the same strand iff they share state.
    pub fn same_lane(&self, other: &Strand) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl Scheduler for Strand {
    fn schedule(&self, task: Task) {
        let is_starter = {
            let mut queue = self.state.queue.lock();
            queue.tasks.push_back(task);
            if queue.running {
                false
            } else {
                queue.running = true;
                true
            }
        };

        // The first submitter on the idle->busy edge kicks the trampoline;
        // racing submitters merely appended and rely on the loop to reach
        // their task.
        if is_starter {
            let state = Arc::clone(&self.state);
            self.state.base.schedule(Box::new(move || state.run_one()));
        }
    }
}
