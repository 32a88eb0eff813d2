//! Composable asynchronous dataflow.
//!
//! A [`Sender<T>`] is a value describing a not-yet-started computation that
//! completes on exactly one of three channels: a typed value, a
//! [`RavelError`], or "stopped" (cancelled, nothing produced). Composition
//! operators are pure: they return a new sender and start no work. Work
//! begins when the sender is connected to a receiver via [`Sender::start`],
//! [`Sender::start_detached`], or [`Sender::sync_wait`]; the intermediate
//! closures own all state for the lifetime of the computation.
//!
//! Panics inside a step are caught and routed down the error channel, so a
//! misbehaving handler degrades into an error completion instead of tearing
//! down a worker thread.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use super::pool::Scheduler;
use crate::error::{RavelError, RavelResult};

/// Terminal outcome of a sender.
pub enum Completion<T> {
    Value(T),
    Error(RavelError),
    Stopped,
}

type BoxReceiver<T> = Box<dyn FnOnce(Completion<T>) + Send>;

/// A lazily-started asynchronous computation producing `T`.
pub struct Sender<T> {
    start_fn: Box<dyn FnOnce(BoxReceiver<T>) + Send>,
}

impl<T: Send + 'static> Sender<T> {
    /// Build a sender from a raw start function. The function receives the
    /// continuation and must eventually invoke it exactly once.
    pub fn new(start_fn: impl FnOnce(BoxReceiver<T>) + Send + 'static) -> Self {
        Self {
            start_fn: Box::new(start_fn),
        }
    }

    /// An already-complete sender producing `value`.
    pub fn just(value: T) -> Self {
        Self::new(move |receiver| receiver(Completion::Value(value)))
    }

    /// An already-failed sender carrying `error`.
    pub fn fail(error: RavelError) -> Self {
        Self::new(move |receiver| receiver(Completion::Error(error)))
    }

    /// An already-stopped sender.
    pub fn stopped() -> Self {
        Self::new(move |receiver| receiver(Completion::Stopped))
    }

    /// Connect `receiver` and begin execution.
    pub fn start(self, receiver: impl FnOnce(Completion<T>) + Send + 'static) {
        (self.start_fn)(Box::new(receiver));
    }

    /// If upstream produces a value, run `f` on it in the upstream's
    /// completion context. Errors and stops pass through untouched.
    pub fn then<U, F>(self, f: F) -> Sender<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        Sender::new(move |receiver: BoxReceiver<U>| {
            self.start(move |completion| match completion {
                Completion::Value(value) => {
                    match panic::catch_unwind(AssertUnwindSafe(move || f(value))) {
                        Ok(out) => receiver(Completion::Value(out)),
                        Err(payload) => receiver(Completion::Error(panic_error(payload))),
                    }
                }
                Completion::Error(err) => receiver(Completion::Error(err)),
                Completion::Stopped => receiver(Completion::Stopped),
            });
        })
    }

    /// Like [`then`](Self::then), but `f` returns a sender which is awaited
    /// transparently. Enables dynamic selection of the next step.
    pub fn let_value<U, F>(self, f: F) -> Sender<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Sender<U> + Send + 'static,
    {
        Sender::new(move |receiver: BoxReceiver<U>| {
            self.start(move |completion| match completion {
                Completion::Value(value) => {
                    match panic::catch_unwind(AssertUnwindSafe(move || f(value))) {
                        Ok(next) => next.start(receiver),
                        Err(payload) => receiver(Completion::Error(panic_error(payload))),
                    }
                }
                Completion::Error(err) => receiver(Completion::Error(err)),
                Completion::Stopped => receiver(Completion::Stopped),
            });
        })
    }

    /// Recover an upstream error into a value.
    pub fn upon_error<F>(self, f: F) -> Sender<T>
    where
        F: FnOnce(RavelError) -> T + Send + 'static,
    {
        Sender::new(move |receiver: BoxReceiver<T>| {
            self.start(move |completion| match completion {
                Completion::Value(value) => receiver(Completion::Value(value)),
                Completion::Error(err) => {
                    match panic::catch_unwind(AssertUnwindSafe(move || f(err))) {
                        Ok(out) => receiver(Completion::Value(out)),
                        Err(payload) => receiver(Completion::Error(panic_error(payload))),
                    }
                }
                Completion::Stopped => receiver(Completion::Stopped),
            });
        })
    }

    /// Recover an upstream stop into a value.
    pub fn upon_stopped<F>(self, f: F) -> Sender<T>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Sender::new(move |receiver: BoxReceiver<T>| {
            self.start(move |completion| match completion {
                Completion::Value(value) => receiver(Completion::Value(value)),
                Completion::Error(err) => receiver(Completion::Error(err)),
                Completion::Stopped => match panic::catch_unwind(AssertUnwindSafe(f)) {
                    Ok(out) => receiver(Completion::Value(out)),
                    Err(payload) => receiver(Completion::Error(panic_error(payload))),
                },
            });
        })
    }

    /// Begin executing without a handle. Errors are logged and swallowed.
    pub fn start_detached(self) {
        self.start(|completion: Completion<T>| match completion {
            Completion::Value(_) => {}
            Completion::Error(err) => warn!(error = %err, "detached sender completed with error"),
            Completion::Stopped => debug!("detached sender stopped"),
        });
    }

    /// Begin executing and block the calling thread until completion.
    ///
    /// Returns `Ok(Some(value))`, `Ok(None)` on the stopped channel, or the
    /// error. Must not be called from a thread the sender needs to make
    /// progress (a pool worker the sender schedules onto).
    pub fn sync_wait(self) -> RavelResult<Option<T>> {
        let (tx, rx) = flume::bounded(1);
        self.start(move |completion: Completion<T>| {
            let _ = tx.send(completion);
        });
        match rx.recv() {
            Ok(Completion::Value(value)) => Ok(Some(value)),
            Ok(Completion::Error(err)) => Err(err),
            Ok(Completion::Stopped) => Ok(None),
            // Receiver dropped without completing: the task never ran.
            Err(_) => Err(RavelError::Cancelled),
        }
    }
}

/// A sender that completes with no value on `scheduler`'s execution context.
pub fn schedule<S>(scheduler: &S) -> Sender<()>
where
    S: Scheduler + Clone + 'static,
{
    let scheduler = scheduler.clone();
    Sender::new(move |receiver: BoxReceiver<()>| {
        scheduler.schedule(Box::new(move || receiver(Completion::Value(()))));
    })
}

fn panic_error(payload: Box<dyn Any + Send>) -> RavelError {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    };
    RavelError::Handler(message)
}
