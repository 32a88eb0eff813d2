//! Port-keyed datagram dispatch.

use std::any::Any;
use std::sync::Arc;

use tracing::warn;

use crate::context::Context;

use super::packet::UdpPacket;

/// A datagram handler: packet in, optional reply payload out.
pub type UdpHandler = Arc<dyn Fn(&UdpPacket, &Context) -> Option<Vec<u8>> + Send + Sync>;

/// Dispatches each datagram to the first handler registered for its
/// destination port. No handler means no reply.
#[derive(Default)]
pub struct UdpRouter {
    routes: Vec<(u16, UdpHandler)>,
    context: Arc<Context>,
}

impl UdpRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shared resource visible to every handler.
    ///
    /// Only valid while the router is still being built.
    pub fn add_resource<T: Any + Send + Sync>(&mut self, name: &str, resource: Arc<T>) {
        match Arc::get_mut(&mut self.context) {
            Some(context) => context.set(name, resource),
            None => warn!(name, "add_resource after router is shared; ignoring"),
        }
    }

    /// Handle datagrams arriving on `port`.
    pub fn on_port<F>(&mut self, port: u16, handler: F)
    where
        F: Fn(&UdpPacket, &Context) -> Option<Vec<u8>> + Send + Sync + 'static,
    {
        self.routes.push((port, Arc::new(handler)));
    }

    pub fn route(&self, packet: &UdpPacket) -> Option<Vec<u8>> {
        for (port, handler) in &self.routes {
            if *port == packet.dest_port {
                return handler(packet, &self.context);
            }
        }
        None
    }
}
