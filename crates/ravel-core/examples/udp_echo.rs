//! UDP echo server on port 5000.
//!
//! ```bash
//! cargo run --example udp_echo
//! printf 'ping' | nc -u -w1 127.0.0.1 5000
//! ```

use ravel_core::prelude::*;

fn main() -> RavelResult<()> {
    init_logging();

    let mut router = UdpRouter::new();
    router.on_port(5000, |packet, _| Some(packet.data.clone()));

    let server = UdpServer::bind(5000, router);

    Application::new().add_plugin(server).run()
}
