//! Endpoint: address + port, convertible to and from kernel socket addresses.

use std::fmt;
use std::mem;
use std::str::FromStr;

use crate::error::RavelError;

use super::addr::{Address, AddressV4, AddressV6};

/// A network endpoint: IPv4 or IPv6 address plus port.
///
/// Text forms are `a.b.c.d:port` and `[v6%scope]:port` (brackets required
/// when a port is present). Round-trips losslessly with
/// `libc::sockaddr_storage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    address: Address,
    port: u16,
}

impl Endpoint {
    pub fn new(address: impl Into<Address>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    pub fn from_v4(address: AddressV4, port: u16) -> Self {
        Self::new(address, port)
    }

    pub fn from_v6(address: AddressV6, port: u16) -> Self {
        Self::new(address, port)
    }

    /// 0.0.0.0 on the given port.
    pub fn any_v4(port: u16) -> Self {
        Self::new(AddressV4::any(), port)
    }

    /// 127.0.0.1 on the given port.
    pub fn loopback_v4(port: u16) -> Self {
        Self::new(AddressV4::loopback(), port)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_v6(&self) -> bool {
        self.address.is_v6()
    }

    /// Kernel representation for bind/sendmsg.
    pub fn to_sockaddr(&self) -> (libc::sockaddr_storage, libc::socklen_t) {
        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        match self.address {
            Address::V4(addr) => {
                let sin = libc::sockaddr_in {
                    sin_family: libc::AF_INET as libc::sa_family_t,
                    sin_port: self.port.to_be(),
                    sin_addr: libc::in_addr {
                        s_addr: u32::from_ne_bytes(addr.to_bytes()),
                    },
                    sin_zero: [0; 8],
                };
                unsafe {
                    std::ptr::write((&mut storage as *mut libc::sockaddr_storage).cast(), sin);
                }
                (storage, mem::size_of::<libc::sockaddr_in>() as libc::socklen_t)
            }
            Address::V6(addr) => {
                let sin6 = libc::sockaddr_in6 {
                    sin6_family: libc::AF_INET6 as libc::sa_family_t,
                    sin6_port: self.port.to_be(),
                    sin6_flowinfo: 0,
                    sin6_addr: libc::in6_addr {
                        s6_addr: addr.to_bytes(),
                    },
                    sin6_scope_id: addr.scope_id(),
                };
                unsafe {
                    std::ptr::write((&mut storage as *mut libc::sockaddr_storage).cast(), sin6);
                }
                (storage, mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t)
            }
        }
    }

    /// Interpret a kernel socket address. Unknown families yield `None`.
    pub fn from_sockaddr(storage: &libc::sockaddr_storage) -> Option<Self> {
        match storage.ss_family as i32 {
            libc::AF_INET => {
                let sin: &libc::sockaddr_in =
                    unsafe { &*(storage as *const libc::sockaddr_storage).cast() };
                let bytes = sin.sin_addr.s_addr.to_ne_bytes();
                Some(Self::new(
                    AddressV4::from_bytes(bytes),
                    u16::from_be(sin.sin_port),
                ))
            }
            libc::AF_INET6 => {
                let sin6: &libc::sockaddr_in6 =
                    unsafe { &*(storage as *const libc::sockaddr_storage).cast() };
                Some(Self::new(
                    AddressV6::with_scope(sin6.sin6_addr.s6_addr, sin6.sin6_scope_id),
                    u16::from_be(sin6.sin6_port),
                ))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.address {
            Address::V4(addr) => write!(f, "{}:{}", addr, self.port),
            Address::V6(addr) => write!(f, "[{}]:{}", addr, self.port),
        }
    }
}

impl FromStr for Endpoint {
    type Err = RavelError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = text.strip_prefix('[') {
            let (addr_text, port_text) = rest
                .split_once(']')
                .ok_or_else(|| RavelError::invalid_address(text))?;
            let port_text = port_text
                .strip_prefix(':')
                .ok_or_else(|| RavelError::invalid_address(text))?;
            let address: AddressV6 = addr_text.parse()?;
            let port: u16 = port_text
                .parse()
                .map_err(|_| RavelError::invalid_address(text))?;
            return Ok(Self::new(address, port));
        }

        let (addr_text, port_text) = text
            .rsplit_once(':')
            .ok_or_else(|| RavelError::invalid_address(text))?;
        let address: AddressV4 = addr_text.parse()?;
        let port: u16 = port_text
            .parse()
            .map_err(|_| RavelError::invalid_address(text))?;
        Ok(Self::new(address, port))
    }
}
