//! UDP server, router, and datagram pipeline.

pub mod packet;
pub mod pipeline;
pub mod router;
pub mod server;

pub use packet::UdpPacket;
pub use pipeline::UdpPipeline;
pub use router::{UdpHandler, UdpRouter};
pub use server::UdpServer;
