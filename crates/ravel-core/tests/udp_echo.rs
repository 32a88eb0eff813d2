//! End-to-end UDP echo through the receive loop and port router.

use std::net::UdpSocket;
use std::time::Duration;

use ravel_core::app::Plugin;
use ravel_core::exec::WorkerPool;
use ravel_core::udp::{UdpRouter, UdpServer};

// Fixed port: the router keys on the destination port, which must be known
// at registration time.
const ECHO_PORT: u16 = 15621;

#[test]
fn datagrams_echo_back_to_their_sender() {
    let mut router = UdpRouter::new();
    router.on_port(ECHO_PORT, |packet, _| Some(packet.data.clone()));

    let pool = WorkerPool::with_threads(2);
    let mut server = UdpServer::bind(ECHO_PORT, router);
    server.init().unwrap();
    assert_eq!(server.local_port(), ECHO_PORT);
    server.run(&pool.scheduler()).unwrap();

    let client = UdpSocket::bind("127.0.0.1:0").unwrap();
    client
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();

    client.send_to(b"ping", ("127.0.0.1", ECHO_PORT)).unwrap();
    let mut buf = [0u8; 64];
    let (n, from) = client.recv_from(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"ping");
    assert_eq!(from.port(), ECHO_PORT);

    // Datagrams are independent; a second one round-trips too.
    client.send_to(b"pong", ("127.0.0.1", ECHO_PORT)).unwrap();
    let (n, _) = client.recv_from(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"pong");

    server.stop();
    pool.request_stop();
}

#[test]
fn unrouted_port_gets_no_reply_and_loop_survives() {
    const PORT: u16 = 15622;
    let mut router = UdpRouter::new();
    // Handler registered for a different port: router declines every packet.
    router.on_port(1, |packet, _| Some(packet.data.clone()));

    let pool = WorkerPool::with_threads(2);
    let mut server = UdpServer::bind(PORT, router);
    server.init().unwrap();
    server.run(&pool.scheduler()).unwrap();

    let client = UdpSocket::bind("127.0.0.1:0").unwrap();
    client
        .set_read_timeout(Some(Duration::from_millis(300)))
        .unwrap();

    client.send_to(b"anyone?", ("127.0.0.1", PORT)).unwrap();
    let mut buf = [0u8; 16];
    assert!(client.recv_from(&mut buf).is_err(), "no handler, no reply");

    server.stop();
    pool.request_stop();
}
