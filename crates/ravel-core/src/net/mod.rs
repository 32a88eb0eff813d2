//! Address and endpoint model plus raw socket plumbing.

pub mod addr;
pub mod endpoint;
pub mod socket;

pub use addr::{Address, AddressV4, AddressV6};
pub use endpoint::Endpoint;
