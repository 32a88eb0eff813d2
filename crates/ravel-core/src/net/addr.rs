//! IPv4/IPv6 address value types.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::error::RavelError;

/// An IPv4 address as four raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressV4([u8; 4]);

impl AddressV4 {
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub const fn to_bytes(self) -> [u8; 4] {
        self.0
    }

    /// Host-order u32 form.
    pub const fn to_u32(self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// 0.0.0.0
    pub const fn any() -> Self {
        Self([0, 0, 0, 0])
    }

    /// 127.0.0.1
    pub const fn loopback() -> Self {
        Self([127, 0, 0, 1])
    }

    pub fn is_loopback(self) -> bool {
        Ipv4Addr::from(self.0).is_loopback()
    }

    pub fn is_unspecified(self) -> bool {
        self.0 == [0, 0, 0, 0]
    }
}

impl fmt::Display for AddressV4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ipv4Addr::from(self.0).fmt(f)
    }
}

impl FromStr for AddressV4 {
    type Err = RavelError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let parsed: Ipv4Addr = text
            .parse()
            .map_err(|_| RavelError::invalid_address(text))?;
        Ok(Self(parsed.octets()))
    }
}

impl From<Ipv4Addr> for AddressV4 {
    fn from(addr: Ipv4Addr) -> Self {
        Self(addr.octets())
    }
}

impl From<AddressV4> for Ipv4Addr {
    fn from(addr: AddressV4) -> Self {
        Ipv4Addr::from(addr.0)
    }
}

/// An IPv6 address: sixteen raw bytes plus a link-local scope id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressV6 {
    bytes: [u8; 16],
    scope_id: u32,
}

impl AddressV6 {
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self { bytes, scope_id: 0 }
    }

    pub const fn with_scope(bytes: [u8; 16], scope_id: u32) -> Self {
        Self { bytes, scope_id }
    }

    pub const fn to_bytes(self) -> [u8; 16] {
        self.bytes
    }

    pub const fn scope_id(self) -> u32 {
        self.scope_id
    }

    /// ::
    pub const fn any() -> Self {
        Self::from_bytes([0; 16])
    }

    /// ::1
    pub const fn loopback() -> Self {
        let mut bytes = [0u8; 16];
        bytes[15] = 1;
        Self::from_bytes(bytes)
    }

    pub fn is_loopback(self) -> bool {
        Ipv6Addr::from(self.bytes).is_loopback()
    }
}

impl fmt::Display for AddressV6 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // std lowercases hex groups and collapses the longest zero run.
        let addr = Ipv6Addr::from(self.bytes);
        if self.scope_id != 0 {
            write!(f, "{}%{}", addr, self.scope_id)
        } else {
            addr.fmt(f)
        }
    }
}

impl FromStr for AddressV6 {
    type Err = RavelError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (addr_text, scope_id) = match text.split_once('%') {
            Some((addr, scope)) => {
                let scope: u32 = scope
                    .parse()
                    .map_err(|_| RavelError::invalid_address(text))?;
                (addr, scope)
            }
            None => (text, 0),
        };
        let parsed: Ipv6Addr = addr_text
            .parse()
            .map_err(|_| RavelError::invalid_address(text))?;
        Ok(Self {
            bytes: parsed.octets(),
            scope_id,
        })
    }
}

impl From<Ipv6Addr> for AddressV6 {
    fn from(addr: Ipv6Addr) -> Self {
        Self::from_bytes(addr.octets())
    }
}

/// Either address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    V4(AddressV4),
    V6(AddressV6),
}

impl Address {
    pub fn is_v4(self) -> bool {
        matches!(self, Address::V4(_))
    }

    pub fn is_v6(self) -> bool {
        matches!(self, Address::V6(_))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::V4(a) => a.fmt(f),
            Address::V6(a) => a.fmt(f),
        }
    }
}

impl From<AddressV4> for Address {
    fn from(addr: AddressV4) -> Self {
        Address::V4(addr)
    }
}

impl From<AddressV6> for Address {
    fn from(addr: AddressV6) -> Self {
        Address::V6(addr)
    }
}
