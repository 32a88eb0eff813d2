//! UDP server: bound datagram socket plus a receive loop dispatching each
//! datagram through the shared pipeline.

use std::os::fd::{AsRawFd, OwnedFd};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::app::Plugin;
use crate::context::Context;
use crate::error::{RavelError, RavelResult};
use crate::exec::{PoolScheduler, Sender, schedule};
use crate::io::IoEngine;
use crate::net::{Endpoint, socket};

use super::packet::UdpPacket;
use super::pipeline::UdpPipeline;
use super::router::UdpRouter;

/// Per-datagram receive buffer.
const DATAGRAM_BUFFER_SIZE: usize = 65536;

struct UdpServerInner {
    endpoint: Endpoint,
    pipeline: UdpPipeline,
    ring_entries: u32,
    context: Arc<Context>,
    engine: Mutex<Option<Arc<IoEngine>>>,
    socket: Mutex<Option<OwnedFd>>,
    local_port: AtomicU16,
    running: AtomicBool,
}

/// Owns one datagram socket; every received datagram is routed
/// independently and the optional reply is sent back to its source.
pub struct UdpServer {
    inner: Arc<UdpServerInner>,
}

impl UdpServer {
    pub fn new(endpoint: Endpoint, router: UdpRouter) -> Self {
        Self {
            inner: Arc::new(UdpServerInner {
                endpoint,
                pipeline: UdpPipeline::new(Arc::new(router)),
                ring_entries: 256,
                context: Arc::new(Context::new()),
                engine: Mutex::new(None),
                socket: Mutex::new(None),
                local_port: AtomicU16::new(0),
                running: AtomicBool::new(false),
            }),
        }
    }

    /// Bind to `INADDR_ANY` on the given port.
    pub fn bind(port: u16, router: UdpRouter) -> Self {
        Self::new(Endpoint::any_v4(port), router)
    }

    /// Port actually bound (differs from the endpoint when it asked for 0).
    pub fn local_port(&self) -> u16 {
        self.inner.local_port.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        stop_inner(&self.inner);
    }
}

impl Plugin for UdpServer {
    fn init(&mut self) -> RavelResult<()> {
        let engine = Arc::new(IoEngine::new(self.inner.ring_entries)?);
        let socket = socket::bind_udp(&self.inner.endpoint)?;
        let port = socket::local_port(socket.as_raw_fd())?;
        info!(endpoint = %self.inner.endpoint, port, "udp server bound");
        self.inner.local_port.store(port, Ordering::Release);
        *self.inner.engine.lock() = Some(engine);
        *self.inner.socket.lock() = Some(socket);
        Ok(())
    }

    fn run(&mut self, scheduler: &PoolScheduler) -> RavelResult<()> {
        self.inner.running.store(true, Ordering::Release);
        receive_loop(Arc::clone(&self.inner), scheduler.clone());
        Ok(())
    }

    fn stop(&mut self) {
        stop_inner(&self.inner);
    }
}

impl Drop for UdpServer {
    fn drop(&mut self) {
        stop_inner(&self.inner);
    }
}

fn stop_inner(inner: &Arc<UdpServerInner>) {
    inner.running.store(false, Ordering::Release);

    let engine = inner.engine.lock().clone();
    if let Some(engine) = engine {
        engine.cancel();
    }

    if inner.socket.lock().take().is_some() {
        info!(endpoint = %inner.endpoint, "udp server stopped");
    }
}

/// One datagram per hop: block in recv_from, route, reply, re-arm.
fn receive_loop(inner: Arc<UdpServerInner>, scheduler: PoolScheduler) {
    let state = Arc::clone(&inner);
    let sched = scheduler.clone();
    schedule(&scheduler)
        .let_value(move |_| {
            if !state.running.load(Ordering::Acquire) {
                return Sender::stopped();
            }

            let (engine, fd) = {
                let engine = state.engine.lock().clone();
                let socket = state.socket.lock();
                match (engine, socket.as_ref().map(|fd| fd.as_raw_fd())) {
                    (Some(engine), Some(fd)) => (engine, fd),
                    _ => return Sender::stopped(),
                }
            };

            let mut buf = vec![0u8; DATAGRAM_BUFFER_SIZE];
            let mut peer_storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
            let n = engine.recv_from(fd, &mut buf, &mut peer_storage);

            if !state.running.load(Ordering::Acquire) {
                return Sender::stopped();
            }
            if n < 0 {
                return Sender::fail(if engine.is_cancelled() {
                    RavelError::Cancelled
                } else {
                    RavelError::Io(-n)
                });
            }

            let Some(peer) = Endpoint::from_sockaddr(&peer_storage) else {
                receive_loop(Arc::clone(&state), sched.clone());
                return Sender::just(());
            };

            buf.truncate(n as usize);
            debug!(from = %peer, bytes = n, "datagram received");
            let packet =
                UdpPacket::from_peer(peer, state.local_port.load(Ordering::Acquire), buf);

            let replier = Arc::clone(&state);
            let reply_sched = sched.clone();
            state
                .pipeline
                .call(packet, &state.context)
                .let_value(move |reply| {
                    if let Some(bytes) = reply
                        && !bytes.is_empty()
                    {
                        let (storage, len) = peer.to_sockaddr();
                        let sent = engine.send_to(fd, &bytes, &storage, len);
                        if sent < 0 {
                            return Sender::fail(if engine.is_cancelled() {
                                RavelError::Cancelled
                            } else {
                                RavelError::Io(-sent)
                            });
                        }
                        debug!(to = %peer, bytes = sent, "datagram sent");
                    }
                    if replier.running.load(Ordering::Acquire) {
                        receive_loop(Arc::clone(&replier), reply_sched.clone());
                    }
                    Sender::just(())
                })
        })
        .upon_stopped(|| ())
        .upon_error(move |err| {
            if inner.running.load(Ordering::Acquire) {
                warn!(error = %err, "udp receive failed; re-arming");
                receive_loop(Arc::clone(&inner), scheduler.clone());
            }
        })
        .start_detached();
}
