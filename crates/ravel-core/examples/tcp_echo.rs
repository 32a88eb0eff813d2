//! Raw TCP echo server on 127.0.0.1:9000.
//!
//! ```bash
//! cargo run --example tcp_echo
//! printf 'hello\n' | nc 127.0.0.1 9000
//! ```

use ravel_core::prelude::*;

fn main() -> RavelResult<()> {
    init_logging();

    let factory = RawPipeline::factory(|data: &[u8]| {
        let mut reply = b"ECHO: ".to_vec();
        reply.extend_from_slice(data);
        reply
    });

    let server = TcpServer::new("127.0.0.1:9000".parse()?, factory);

    Application::new().add_plugin(server).run()
}
