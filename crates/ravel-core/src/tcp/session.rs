//! Per-connection session state machine.
//!
//! Every step of a session runs as one task on the session's strand:
//! read, feed the pipeline, write, re-arm. The strand serializes the steps,
//! so the pipeline's parse buffer is mutated by exactly one step at a time
//! while thousands of sessions progress on the shared pool. The loop ends
//! on peer close, error, or stop; the socket closes exactly once, when the
//! last reference to the session is dropped.

use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::context::Context;
use crate::error::{RavelError, RavelResult};
use crate::exec::{Sender, Strand, schedule};
use crate::io::IoEngine;
use crate::pipeline::TcpPipeline;

const RECV_BUFFER_SIZE: usize = 4096;

type OnClose = Box<dyn FnOnce(RawFd) + Send>;

pub struct TcpSession {
    fd: OwnedFd,
    strand: Strand,
    pipeline: Mutex<Box<dyn TcpPipeline>>,
    engine: Arc<IoEngine>,
    context: Arc<Context>,
    active: AtomicBool,
    on_close: Mutex<Option<OnClose>>,
}

impl TcpSession {
    pub fn new(
        fd: OwnedFd,
        strand: Strand,
        pipeline: Box<dyn TcpPipeline>,
        engine: Arc<IoEngine>,
        context: Arc<Context>,
        on_close: OnClose,
    ) -> Self {
        trace!(fd = fd.as_raw_fd(), "session created");
        Self {
            fd,
            strand,
            pipeline: Mutex::new(pipeline),
            engine,
            context,
            active: AtomicBool::new(true),
            on_close: Mutex::new(Some(on_close)),
        }
    }

    pub fn fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Begin the read loop.
    pub fn start(self: &Arc<Self>) {
        read_loop(Arc::clone(self));
    }

    /// Cooperative stop: the next strand step observes the flag and does
    /// not re-arm. The in-flight engine call is unblocked by the engine's
    /// own cancellation.
    pub fn stop(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Flip to closed and fire the close notification exactly once.
    fn mark_closed(&self) {
        if self.active.swap(false, Ordering::AcqRel)
            && let Some(callback) = self.on_close.lock().take()
        {
            callback(self.fd.as_raw_fd());
        }
    }

    /// Write all of `bytes`, retrying on short sends.
    fn write_all(&self, bytes: &[u8]) -> RavelResult<()> {
        let mut offset = 0;
        while offset < bytes.len() {
            let n = self.engine.send(self.fd.as_raw_fd(), &bytes[offset..]);
            if n <= 0 {
                return Err(if self.engine.is_cancelled() {
                    RavelError::Cancelled
                } else {
                    RavelError::Io(-n)
                });
            }
            offset += n as usize;
        }
        Ok(())
    }
}

impl Drop for TcpSession {
    fn drop(&mut self) {
        trace!(fd = self.fd.as_raw_fd(), "session destroyed");
        // OwnedFd closes the socket here, exactly once.
    }
}

/// One iteration: read, run the pipeline, write, re-arm.
fn read_loop(session: Arc<TcpSession>) {
    let step = Arc::clone(&session);
    schedule(&session.strand)
        .let_value(move |_| {
            if !step.is_active() {
                return Sender::stopped();
            }

            let mut buf = vec![0u8; RECV_BUFFER_SIZE];
            let n = step.engine.recv(step.fd.as_raw_fd(), &mut buf);

            if n == 0 {
                debug!(fd = step.fd.as_raw_fd(), "connection closed by peer");
                step.mark_closed();
                return Sender::stopped();
            }
            if n < 0 {
                return Sender::fail(if step.engine.is_cancelled() {
                    RavelError::Cancelled
                } else {
                    RavelError::Io(-n)
                });
            }

            buf.truncate(n as usize);
            trace!(fd = step.fd.as_raw_fd(), bytes = n, "received");

            let output_sender = step.pipeline.lock().call(&buf, &step.context);
            let writer = Arc::clone(&step);
            output_sender.let_value(move |output| {
                if let Some(bytes) = &output.data
                    && !bytes.is_empty()
                {
                    if let Err(err) = writer.write_all(bytes) {
                        return Sender::fail(err);
                    }
                    trace!(fd = writer.fd.as_raw_fd(), bytes = bytes.len(), "sent");
                }

                if !output.keep_open {
                    writer.mark_closed();
                    return Sender::just(());
                }
                if writer.is_active() {
                    read_loop(Arc::clone(&writer));
                }
                Sender::just(())
            })
        })
        .upon_stopped(|| ())
        .upon_error(move |err| {
            debug!(fd = session.fd.as_raw_fd(), error = %err, "session ended");
            session.mark_closed();
        })
        .start_detached();
}
