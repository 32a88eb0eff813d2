//! The datagram pipeline: one packet in, sender of an optional reply out.
//!
//! Unlike stream pipelines, this one carries no per-connection state; each
//! datagram is self-contained, so a single instance is shared by the whole
//! receive loop.

use std::sync::Arc;

use crate::context::Context;
use crate::exec::Sender;

use super::packet::UdpPacket;
use super::router::UdpRouter;

pub struct UdpPipeline {
    router: Arc<UdpRouter>,
}

impl UdpPipeline {
    pub fn new(router: Arc<UdpRouter>) -> Self {
        Self { router }
    }

    pub fn call(&self, packet: UdpPacket, _context: &Arc<Context>) -> Sender<Option<Vec<u8>>> {
        let router = Arc::clone(&self.router);
        Sender::just(packet).then(move |packet| router.route(&packet))
    }
}
