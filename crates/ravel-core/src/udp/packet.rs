use crate::net::Endpoint;

/// One received datagram with its addressing facts.
#[derive(Debug, Clone)]
pub struct UdpPacket {
    /// Sender address in text form.
    pub source_ip: String,
    /// Sender port.
    pub source_port: u16,
    /// Local port the datagram arrived on.
    pub dest_port: u16,
    /// Kernel-level peer address, used to reply.
    pub peer: Endpoint,
    /// Payload bytes.
    pub data: Vec<u8>,
}

impl UdpPacket {
    pub fn from_peer(peer: Endpoint, dest_port: u16, data: Vec<u8>) -> Self {
        Self {
            source_ip: peer.address().to_string(),
            source_port: peer.port(),
            dest_port,
            peer,
            data,
        }
    }
}
