//! Graceful shutdown under load: looping clients all observe their
//! connections closing shortly after stop(), and the pool joins cleanly.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use ravel_core::app::Plugin;
use ravel_core::exec::WorkerPool;
use ravel_core::http::{HttpPipelineBuilder, HttpResponse, HttpRouter};
use ravel_core::net::Endpoint;
use ravel_core::tcp::TcpServer;

const CLIENTS: usize = 24;

#[test]
fn stop_under_load_disconnects_clients_and_joins_pool() {
    let mut router = HttpRouter::new();
    router.get("/", |_, _| HttpResponse::ok("ok"));

    let pool = WorkerPool::with_threads(8);
    let mut server = TcpServer::new(Endpoint::loopback_v4(0), HttpPipelineBuilder::new(router).build());
    server.init().unwrap();
    let port = server.local_port().unwrap();
    server.run(&pool.scheduler()).unwrap();

    let completed = Arc::new(AtomicUsize::new(0));

    let clients: Vec<_> = (0..CLIENTS)
        .map(|_| {
            let completed = Arc::clone(&completed);
            std::thread::spawn(move || {
                let Ok(mut stream) = TcpStream::connect(("127.0.0.1", port)) else {
                    return;
                };
                stream
                    .set_read_timeout(Some(Duration::from_secs(2)))
                    .unwrap();

                // Loop until the server, not the client, ends the session.
                let mut buf = [0u8; 512];
                loop {
                    if stream
                        .write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n")
                        .is_err()
                    {
                        break;
                    }
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {
                            completed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    // Let the load build up.
    std::thread::sleep(Duration::from_millis(300));
    assert!(completed.load(Ordering::Relaxed) > 0, "load never started");

    let stop_started = Instant::now();
    server.stop();

    for client in clients {
        client.join().unwrap();
    }
    let disconnect_time = stop_started.elapsed();
    assert!(
        disconnect_time < Duration::from_secs(3),
        "clients took {disconnect_time:?} to observe shutdown"
    );

    let join_started = Instant::now();
    pool.request_stop();
    assert!(
        join_started.elapsed() < Duration::from_secs(2),
        "pool join too slow"
    );

    assert_eq!(server.session_count(), 0);
}
