//! Thin, safe facade over the kernel submission/completion ring.
//!
//! One [`IoEngine`] owns one `io_uring`. Every operation submits a single
//! SQE and blocks the calling thread until that operation's CQE arrives;
//! concurrency comes from many pool threads driving many sessions, each
//! blocked in at most one operation at a time. Several threads share the
//! ring: the submission side is serialized by one mutex, the completion
//! side by another, and a waiter that reaps a sibling's completion stashes
//! it by `user_data` for the sibling's next pass.
//!
//! `cancel()` is sticky: it flips a flag, wakes every waiter with a no-op
//! CQE, and refuses all later submissions. A waiter observing the flag
//! chases its in-flight operation with `ASYNC_CANCEL` and keeps waiting for
//! that operation's own completion, so kernel-visible buffers stay borrowed
//! until the kernel is done with them.

use std::collections::HashMap;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use io_uring::{IoUring, opcode, squeue, types};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{RavelError, RavelResult};

/// user_data of wake-up and cancel-chase entries; their CQEs are discarded.
const WAKEUP: u64 = 0;

/// How long a waiter parks in the kernel before re-checking the stash.
const WAIT_SLICE_NSEC: u32 = 10_000_000;

pub struct IoEngine {
    ring: IoUring,
    submit_lock: Mutex<()>,
    /// Completion-side lock; holds results reaped on behalf of other waiters.
    reaped: Mutex<HashMap<u64, i32>>,
    next_id: AtomicU64,
    cancelled: AtomicBool,
}

// The ring is only ever touched under `submit_lock` (SQ) or the `reaped`
// lock (CQ); `Submitter` entry points are plain syscalls on the ring fd.
unsafe impl Send for IoEngine {}
unsafe impl Sync for IoEngine {}

impl IoEngine {
    /// Create an engine with the given submission queue depth.
    ///
    /// Ring initialization failure is the only fatal engine error.
    pub fn new(entries: u32) -> RavelResult<Self> {
        let ring = IoUring::new(entries)?;
        debug!(entries, "io engine ring initialized");
        Ok(Self {
            ring,
            submit_lock: Mutex::new(()),
            reaped: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            cancelled: AtomicBool::new(false),
        })
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Set the sticky cancellation flag and wake any blocked waiter.
    ///
    /// Subsequent operations return `-ECANCELED` without submitting.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("io engine cancelled");
        let nop = opcode::Nop::new().build().user_data(WAKEUP);
        if self.push_and_submit(&nop).is_err() {
            warn!("failed to submit wake-up nop; waiters will time out");
        }
    }

    /// Accept one connection. Returns the client fd, or a negative errno.
    /// The accepted socket is non-blocking.
    pub fn accept(&self, listen_fd: RawFd) -> i32 {
        if self.is_cancelled() {
            return -libc::ECANCELED;
        }
        let entry = opcode::Accept::new(
            types::Fd(listen_fd),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
        )
        .flags(libc::SOCK_NONBLOCK)
        .build();
        self.run(entry)
    }

    /// Receive into `buf`. 0 means the peer closed; negative is an errno.
    pub fn recv(&self, fd: RawFd, buf: &mut [u8]) -> i32 {
        if self.is_cancelled() {
            return -libc::ECANCELED;
        }
        let entry = opcode::Recv::new(types::Fd(fd), buf.as_mut_ptr(), buf.len() as u32).build();
        self.run(entry)
    }

    /// Send `buf`. Returns bytes written (possibly short) or negative errno.
    pub fn send(&self, fd: RawFd, buf: &[u8]) -> i32 {
        if self.is_cancelled() {
            return -libc::ECANCELED;
        }
        let entry = opcode::Send::new(types::Fd(fd), buf.as_ptr(), buf.len() as u32).build();
        self.run(entry)
    }

    /// Receive one datagram; the peer's address lands in `peer`.
    pub fn recv_from(
        &self,
        fd: RawFd,
        buf: &mut [u8],
        peer: &mut libc::sockaddr_storage,
    ) -> i32 {
        if self.is_cancelled() {
            return -libc::ECANCELED;
        }
        let mut iov = libc::iovec {
            iov_base: buf.as_mut_ptr().cast(),
            iov_len: buf.len(),
        };
        let mut msg: libc::msghdr = unsafe { std::mem::zeroed() };
        msg.msg_name = (peer as *mut libc::sockaddr_storage).cast();
        msg.msg_namelen = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
        msg.msg_iov = &mut iov;
        msg.msg_iovlen = 1;

        let entry = opcode::RecvMsg::new(types::Fd(fd), &mut msg).build();
        // `msg`/`iov` outlive the call: run() blocks until this op's CQE.
        self.run(entry)
    }

    /// Send one datagram to `peer`.
    pub fn send_to(
        &self,
        fd: RawFd,
        buf: &[u8],
        peer: &libc::sockaddr_storage,
        peer_len: libc::socklen_t,
    ) -> i32 {
        if self.is_cancelled() {
            return -libc::ECANCELED;
        }
        let mut iov = libc::iovec {
            iov_base: buf.as_ptr().cast_mut().cast(),
            iov_len: buf.len(),
        };
        let mut msg: libc::msghdr = unsafe { std::mem::zeroed() };
        msg.msg_name = (peer as *const libc::sockaddr_storage).cast_mut().cast();
        msg.msg_namelen = peer_len;
        msg.msg_iov = &mut iov;
        msg.msg_iovlen = 1;

        let entry = opcode::SendMsg::new(types::Fd(fd), &msg).build();
        self.run(entry)
    }

    /// Submit one entry and wait for its completion.
    fn run(&self, entry: squeue::Entry) -> i32 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        match self.push_and_submit(&entry.user_data(id)) {
            Ok(()) => self.wait_for(id),
            Err(RavelError::Io(code)) => -code,
            Err(RavelError::Sys(err)) => -err.raw_os_error().unwrap_or(libc::EIO),
            Err(_) => -libc::ECANCELED,
        }
    }

    fn push_and_submit(&self, entry: &squeue::Entry) -> RavelResult<()> {
        let _guard = self.submit_lock.lock();

        let pushed = unsafe {
            let mut sq = self.ring.submission_shared();
            let ok = sq.push(entry).is_ok();
            sq.sync();
            ok
        };

        if !pushed {
            // Queue full: flush to the kernel and retry once.
            self.ring.submit()?;
            let retried = unsafe {
                let mut sq = self.ring.submission_shared();
                sq.sync();
                let ok = sq.push(entry).is_ok();
                sq.sync();
                ok
            };
            if !retried {
                return Err(RavelError::Io(libc::EBUSY));
            }
        }

        self.ring.submit()?;
        Ok(())
    }

    /// Block until the CQE for `id` has been reaped, by us or a sibling.
    fn wait_for(&self, id: u64) -> i32 {
        let mut chased = false;
        loop {
            {
                let mut reaped = self.reaped.lock();
                unsafe {
                    let mut cq = self.ring.completion_shared();
                    cq.sync();
                    for cqe in &mut cq {
                        let key = cqe.user_data();
                        if key != WAKEUP {
                            reaped.insert(key, cqe.result());
                        }
                    }
                    cq.sync();
                }
                if let Some(result) = reaped.remove(&id) {
                    return result;
                }
            }

            if !chased && self.is_cancelled() {
                // Ask the kernel to fail the in-flight op; we still wait for
                // its CQE so the caller's buffers stay valid until then.
                let cancel = opcode::AsyncCancel::new(id).build().user_data(WAKEUP);
                chased = self.push_and_submit(&cancel).is_ok();
            }

            let ts = types::Timespec::new().nsec(WAIT_SLICE_NSEC);
            let args = types::SubmitArgs::new().timespec(&ts);
            match self.ring.submitter().submit_with_args(1, &args) {
                Ok(_) => {}
                Err(err) => match err.raw_os_error() {
                    Some(libc::ETIME) | Some(libc::EINTR) | Some(libc::EBUSY) => {}
                    _ => warn!(error = %err, "ring wait failed"),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::os::fd::AsRawFd;

    #[test]
    fn send_and_recv_over_loopback() {
        let engine = IoEngine::new(32).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut client = TcpStream::connect(addr).unwrap();
        let (server_side, _) = listener.accept().unwrap();

        client.write_all(b"ping").unwrap();
        let mut buf = [0u8; 16];
        let n = engine.recv(server_side.as_raw_fd(), &mut buf);
        assert_eq!(n, 4);
        assert_eq!(&buf[..4], b"ping");

        let sent = engine.send(server_side.as_raw_fd(), b"pong");
        assert_eq!(sent, 4);
        let mut reply = [0u8; 4];
        client.read_exact(&mut reply).unwrap();
        assert_eq!(&reply, b"pong");
    }

    #[test]
    fn recv_zero_on_peer_close() {
        let engine = IoEngine::new(32).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let client = TcpStream::connect(addr).unwrap();
        let (server_side, _) = listener.accept().unwrap();
        drop(client);

        let mut buf = [0u8; 16];
        let n = engine.recv(server_side.as_raw_fd(), &mut buf);
        assert_eq!(n, 0);
    }

    #[test]
    fn cancel_unblocks_a_pending_recv() {
        let engine = std::sync::Arc::new(IoEngine::new(32).unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let _client = TcpStream::connect(addr).unwrap();
        let (server_side, _) = listener.accept().unwrap();

        let waiter = {
            let engine = std::sync::Arc::clone(&engine);
            std::thread::spawn(move || {
                let mut buf = [0u8; 16];
                engine.recv(server_side.as_raw_fd(), &mut buf)
            })
        };

        std::thread::sleep(std::time::Duration::from_millis(50));
        engine.cancel();

        let n = waiter.join().unwrap();
        assert!(n < 0, "cancelled recv must fail, got {n}");

        // Sticky: later operations refuse immediately.
        let mut buf = [0u8; 4];
        assert_eq!(engine.recv(0, &mut buf), -libc::ECANCELED);
    }

    #[test]
    fn cancel_is_idempotent() {
        let engine = IoEngine::new(8).unwrap();
        engine.cancel();
        engine.cancel();
        assert!(engine.is_cancelled());
    }
}
