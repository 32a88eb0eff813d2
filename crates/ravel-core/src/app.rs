//! Application lifecycle: a worker pool plus an ordered set of plugins.
//!
//! Lifecycle fans out in declaration order: `init` everything, `run`
//! everything against the pool's scheduler, block on the shutdown signal,
//! then `stop` everything and stop the pool. `SIGINT` and `SIGTERM` both
//! trip the process-wide signal; explicit stops go through a
//! [`StopHandle`]. Shutdown runs at most once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::RavelResult;
use crate::exec::{PoolScheduler, WorkerPool};

/// A lifecycle participant: servers, user services.
///
/// Contract: `init` may set up sockets; `run` must not block (it schedules
/// its loops on the given scheduler); `stop` must be safe to call more
/// than once.
pub trait Plugin: Send {
    fn init(&mut self) -> RavelResult<()>;
    fn run(&mut self, scheduler: &PoolScheduler) -> RavelResult<()>;
    fn stop(&mut self);
}

/// Condition-variable latch the main thread parks on.
pub struct ShutdownSignal {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            signaled: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    pub fn wait(&self) {
        let mut signaled = self.signaled.lock();
        while !*signaled {
            self.condvar.wait(&mut signaled);
        }
    }

    pub fn notify(&self) {
        let mut signaled = self.signaled.lock();
        *signaled = true;
        self.condvar.notify_all();
    }

    pub fn is_signaled(&self) -> bool {
        *self.signaled.lock()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Clonable handle that requests application shutdown.
#[derive(Clone)]
pub struct StopHandle {
    signal: Arc<ShutdownSignal>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.signal.notify();
    }
}

pub struct Application {
    // Dropped before the pool: plugin teardown cancels their engines,
    // unblocking any worker still parked in an I/O call.
    plugins: Vec<Box<dyn Plugin>>,
    pool: WorkerPool,
    signal: Arc<ShutdownSignal>,
    stopped: AtomicBool,
}

impl Application {
    pub fn new() -> Self {
        Self::with_config(&Config::from_env())
    }

    pub fn with_config(config: &Config) -> Self {
        Self {
            plugins: Vec::new(),
            pool: WorkerPool::with_threads(config.worker_threads),
            signal: Arc::new(ShutdownSignal::new()),
            stopped: AtomicBool::new(false),
        }
    }

    /// Register a plugin. Lifecycle calls follow registration order.
    pub fn add_plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    /// A handle that unblocks [`run`](Self::run) from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            signal: Arc::clone(&self.signal),
        }
    }

    /// Init and run every plugin, then block until a shutdown signal
    /// arrives; finally stop everything in order.
    pub fn run(&mut self) -> RavelResult<()> {
        for plugin in &mut self.plugins {
            plugin.init()?;
        }

        let scheduler = self.pool.scheduler();
        for plugin in &mut self.plugins {
            plugin.run(&scheduler)?;
        }

        let signal = Arc::clone(&self.signal);
        if let Err(err) = ctrlc::set_handler(move || signal.notify()) {
            // Another handler owns the process signals (tests, embedding).
            warn!(error = %err, "signal handler not installed");
        }

        info!(plugins = self.plugins.len(), "application running");
        self.signal.wait();
        self.shutdown();
        Ok(())
    }

    /// Stop plugins in declaration order, stop the pool, release waiters.
    /// Runs at most once.
    pub fn shutdown(&mut self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("application stopping; draining plugins");
        for plugin in &mut self.plugins {
            plugin.stop();
        }
        self.pool.request_stop();
        self.signal.notify();
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct ProbePlugin {
        events: Arc<Mutex<Vec<&'static str>>>,
        stops: Arc<AtomicUsize>,
    }

    impl Plugin for ProbePlugin {
        fn init(&mut self) -> RavelResult<()> {
            self.events.lock().push("init");
            Ok(())
        }

        fn run(&mut self, _scheduler: &PoolScheduler) -> RavelResult<()> {
            self.events.lock().push("run");
            Ok(())
        }

        fn stop(&mut self) {
            self.events.lock().push("stop");
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn lifecycle_fans_out_in_order_and_stop_is_idempotent() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let stops = Arc::new(AtomicUsize::new(0));

        let mut app = Application::with_config(&Config {
            worker_threads: 2,
            ..Config::default()
        })
        .add_plugin(ProbePlugin {
            events: Arc::clone(&events),
            stops: Arc::clone(&stops),
        });

        let handle = app.stop_handle();
        let runner = std::thread::spawn(move || {
            app.run().unwrap();
            app.shutdown(); // second call must be a no-op
        });

        std::thread::sleep(std::time::Duration::from_millis(50));
        handle.stop();
        runner.join().unwrap();

        assert_eq!(*events.lock(), vec!["init", "run", "stop"]);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shutdown_signal_latches() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_signaled());
        signal.notify();
        assert!(signal.is_signaled());
        signal.wait(); // already signaled: returns immediately
    }
}
