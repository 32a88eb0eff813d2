//! TCP server: listen socket, accept loop, session ownership.

use std::collections::HashMap;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::app::Plugin;
use crate::context::Context;
use crate::error::{RavelError, RavelResult};
use crate::exec::{PoolScheduler, Sender, Strand, schedule};
use crate::io::IoEngine;
use crate::net::{Endpoint, socket};
use crate::pipeline::PipelineFactory;

use super::session::TcpSession;

/// How long the accept loop backs off after a failed accept while running.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

struct TcpServerInner {
    endpoint: Endpoint,
    factory: PipelineFactory,
    ring_entries: u32,
    context: Arc<Context>,
    engine: Mutex<Option<Arc<IoEngine>>>,
    listener: Mutex<Option<OwnedFd>>,
    sessions: Mutex<HashMap<RawFd, Arc<TcpSession>>>,
    running: AtomicBool,
}

/// Owns a listen socket and one I/O engine; spawns a session per accepted
/// connection, each with a freshly built pipeline and its own strand.
pub struct TcpServer {
    inner: Arc<TcpServerInner>,
}

impl TcpServer {
    pub fn new(endpoint: Endpoint, factory: PipelineFactory) -> Self {
        Self::with_ring_entries(endpoint, factory, 256)
    }

    pub fn with_ring_entries(endpoint: Endpoint, factory: PipelineFactory, ring_entries: u32) -> Self {
        Self {
            inner: Arc::new(TcpServerInner {
                endpoint,
                factory,
                ring_entries,
                context: Arc::new(Context::new()),
                engine: Mutex::new(None),
                listener: Mutex::new(None),
                sessions: Mutex::new(HashMap::new()),
                running: AtomicBool::new(false),
            }),
        }
    }

    /// Port actually bound (differs from the endpoint when it asked for 0).
    pub fn local_port(&self) -> Option<u16> {
        let listener = self.inner.listener.lock();
        listener
            .as_ref()
            .and_then(|fd| socket::local_port(fd.as_raw_fd()).ok())
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Idempotent stop: flip the flag, cancel the engine so blocked calls
    /// return, stop every session, close the listener.
    pub fn stop(&self) {
        stop_inner(&self.inner);
    }
}

impl Plugin for TcpServer {
    fn init(&mut self) -> RavelResult<()> {
        let engine = Arc::new(IoEngine::new(self.inner.ring_entries)?);
        let listener = socket::listen_tcp(&self.inner.endpoint)?;
        info!(endpoint = %self.inner.endpoint, "tcp server listening");
        *self.inner.engine.lock() = Some(engine);
        *self.inner.listener.lock() = Some(listener);
        Ok(())
    }

    fn run(&mut self, scheduler: &PoolScheduler) -> RavelResult<()> {
        self.inner.running.store(true, Ordering::Release);
        accept_loop(Arc::clone(&self.inner), scheduler.clone());
        Ok(())
    }

    fn stop(&mut self) {
        stop_inner(&self.inner);
    }
}

impl Drop for TcpServer {
    fn drop(&mut self) {
        stop_inner(&self.inner);
    }
}

fn stop_inner(inner: &Arc<TcpServerInner>) {
    inner.running.store(false, Ordering::Release);

    let engine = inner.engine.lock().clone();
    if let Some(engine) = engine {
        engine.cancel();
    }

    let sessions: Vec<_> = inner.sessions.lock().drain().map(|(_, s)| s).collect();
    for session in &sessions {
        session.stop();
    }

    if inner.listener.lock().take().is_some() {
        info!(endpoint = %inner.endpoint, "tcp server stopped");
    }
}

/// One accept per hop: block in the engine, spawn the session, re-arm.
fn accept_loop(inner: Arc<TcpServerInner>, scheduler: PoolScheduler) {
    let state = Arc::clone(&inner);
    let sched = scheduler.clone();
    schedule(&scheduler)
        .let_value(move |_| {
            if !state.running.load(Ordering::Acquire) {
                return Sender::stopped();
            }

            let (engine, listen_fd) = {
                let engine = state.engine.lock().clone();
                let listener = state.listener.lock();
                match (engine, listener.as_ref().map(|fd| fd.as_raw_fd())) {
                    (Some(engine), Some(fd)) => (engine, fd),
                    _ => return Sender::stopped(),
                }
            };

            let client_fd = engine.accept(listen_fd);
            if !state.running.load(Ordering::Acquire) {
                if client_fd >= 0 {
                    unsafe { libc::close(client_fd) };
                }
                return Sender::stopped();
            }
            if client_fd < 0 {
                return Sender::fail(RavelError::Io(-client_fd));
            }

            debug!(fd = client_fd, "accepted connection");
            let fd = unsafe { OwnedFd::from_raw_fd(client_fd) };

            let close_target = Arc::downgrade(&state);
            let close_sched = sched.clone();
            let on_close = Box::new(move |fd: RawFd| {
                if let Some(server) = close_target.upgrade() {
                    remove_session(server, close_sched, fd);
                }
            });

            let session = Arc::new(TcpSession::new(
                fd,
                Strand::over(&sched),
                (state.factory)(),
                engine,
                Arc::clone(&state.context),
                on_close,
            ));
            state.sessions.lock().insert(client_fd, Arc::clone(&session));
            session.start();

            accept_loop(Arc::clone(&state), sched.clone());
            Sender::just(())
        })
        .upon_stopped(|| ())
        .upon_error(move |err| {
            if inner.running.load(Ordering::Acquire) {
                warn!(error = %err, "accept failed; backing off");
                std::thread::sleep(ACCEPT_RETRY_DELAY);
                accept_loop(Arc::clone(&inner), scheduler.clone());
            }
        })
        .start_detached();
}

/// Session removal goes back through the scheduler, like the addition did.
fn remove_session(server: Arc<TcpServerInner>, scheduler: PoolScheduler, fd: RawFd) {
    schedule(&scheduler)
        .then(move |_| {
            if server.sessions.lock().remove(&fd).is_some() {
                debug!(fd, "session removed");
            }
        })
        .start_detached();
}
