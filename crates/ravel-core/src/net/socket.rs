//! Raw socket construction for the servers.

use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use libc::{c_int, c_void, socklen_t};

use crate::error::RavelResult;

use super::endpoint::Endpoint;

const LISTEN_BACKLOG: c_int = 128;

/// Create a non-blocking TCP listener bound to `endpoint`.
///
/// SO_REUSEADDR is set so restarts do not trip over TIME_WAIT; accepted
/// sockets get their non-blocking flag from the engine's accept.
pub fn listen_tcp(endpoint: &Endpoint) -> RavelResult<OwnedFd> {
    let domain = if endpoint.is_v6() {
        libc::AF_INET6
    } else {
        libc::AF_INET
    };

    let fd = unsafe { libc::socket(domain, libc::SOCK_STREAM | libc::SOCK_NONBLOCK, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error().into());
    }
    // Owned from here on; error paths below close it on drop.
    let socket = unsafe { OwnedFd::from_raw_fd(fd) };

    let one: c_int = 1;
    if unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            (&one as *const c_int).cast::<c_void>(),
            mem::size_of_val(&one) as socklen_t,
        )
    } < 0
    {
        return Err(io::Error::last_os_error().into());
    }

    bind_endpoint(socket.as_raw_fd(), endpoint)?;

    if unsafe { libc::listen(socket.as_raw_fd(), LISTEN_BACKLOG) } < 0 {
        return Err(io::Error::last_os_error().into());
    }

    Ok(socket)
}

/// Create a datagram socket bound to `endpoint`.
pub fn bind_udp(endpoint: &Endpoint) -> RavelResult<OwnedFd> {
    let domain = if endpoint.is_v6() {
        libc::AF_INET6
    } else {
        libc::AF_INET
    };

    let fd = unsafe { libc::socket(domain, libc::SOCK_DGRAM, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error().into());
    }
    let socket = unsafe { OwnedFd::from_raw_fd(fd) };

    bind_endpoint(socket.as_raw_fd(), endpoint)?;

    Ok(socket)
}

fn bind_endpoint(fd: RawFd, endpoint: &Endpoint) -> RavelResult<()> {
    let (storage, len) = endpoint.to_sockaddr();
    if unsafe {
        libc::bind(
            fd,
            (&storage as *const libc::sockaddr_storage).cast::<libc::sockaddr>(),
            len,
        )
    } < 0
    {
        return Err(io::Error::last_os_error().into());
    }
    Ok(())
}

/// The port a socket is actually bound to (useful after binding port 0).
pub fn local_port(fd: RawFd) -> RavelResult<u16> {
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<libc::sockaddr_storage>() as socklen_t;
    if unsafe {
        libc::getsockname(
            fd,
            (&mut storage as *mut libc::sockaddr_storage).cast::<libc::sockaddr>(),
            &mut len,
        )
    } < 0
    {
        return Err(io::Error::last_os_error().into());
    }
    Ok(Endpoint::from_sockaddr(&storage).map_or(0, |ep| ep.port()))
}
