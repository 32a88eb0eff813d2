//! End-to-end TCP echo through the full stack: worker pool, io_uring
//! engine, accept loop, per-session strand, raw pipeline.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use ravel_core::app::Plugin;
use ravel_core::exec::WorkerPool;
use ravel_core::net::Endpoint;
use ravel_core::pipeline::RawPipeline;
use ravel_core::tcp::TcpServer;

fn open_fd_count() -> usize {
    std::fs::read_dir("/proc/self/fd").unwrap().count()
}

fn echo_server() -> TcpServer {
    let factory = RawPipeline::factory(|data: &[u8]| {
        let mut reply = b"ECHO: ".to_vec();
        reply.extend_from_slice(data);
        reply
    });
    TcpServer::new(Endpoint::loopback_v4(0), factory)
}

#[test]
fn echoes_and_releases_fds() {
    let baseline = open_fd_count();

    let pool = WorkerPool::with_threads(4);
    {
        let mut server = echo_server();
        server.init().unwrap();
        let port = server.local_port().unwrap();
        server.run(&pool.scheduler()).unwrap();

        let mut client = TcpStream::connect(("127.0.0.1", port)).unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        client.write_all(b"hello\n").unwrap();

        let mut reply = [0u8; 32];
        let n = client.read(&mut reply).unwrap();
        assert_eq!(&reply[..n], b"ECHO: hello\n");

        // Second round trip on the same connection.
        client.write_all(b"again").unwrap();
        let n = client.read(&mut reply).unwrap();
        assert_eq!(&reply[..n], b"ECHO: again");

        drop(client);
        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(server.session_count(), 0, "closed session must be removed");

        server.stop();
        server.stop(); // idempotent
    }
    pool.request_stop();

    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(open_fd_count(), baseline, "fd leak after full run");
}

#[test]
fn concurrent_clients_each_get_their_own_echo() {
    let pool = WorkerPool::with_threads(4);
    let mut server = echo_server();
    server.init().unwrap();
    let port = server.local_port().unwrap();
    server.run(&pool.scheduler()).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            std::thread::spawn(move || {
                let mut client = TcpStream::connect(("127.0.0.1", port)).unwrap();
                client
                    .set_read_timeout(Some(Duration::from_secs(2)))
                    .unwrap();
                let message = format!("client-{i}");
                client.write_all(message.as_bytes()).unwrap();

                let mut reply = [0u8; 32];
                let n = client.read(&mut reply).unwrap();
                assert_eq!(
                    std::str::from_utf8(&reply[..n]).unwrap(),
                    format!("ECHO: client-{i}")
                );
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    server.stop();
    pool.request_stop();
}

#[test]
fn no_new_connections_after_stop() {
    let pool = WorkerPool::with_threads(2);
    let mut server = echo_server();
    server.init().unwrap();
    let port = server.local_port().unwrap();
    server.run(&pool.scheduler()).unwrap();

    server.stop();
    std::thread::sleep(Duration::from_millis(100));

    // The listener is closed; a fresh connect must fail or be reset on use.
    match TcpStream::connect(("127.0.0.1", port)) {
        Err(_) => {}
        Ok(mut stream) => {
            stream
                .set_read_timeout(Some(Duration::from_millis(500)))
                .unwrap();
            let _ = stream.write_all(b"x");
            let mut buf = [0u8; 8];
            let outcome = stream.read(&mut buf);
            assert!(
                matches!(outcome, Ok(0) | Err(_)),
                "stopped server must not serve"
            );
        }
    }

    pool.request_stop();
}
