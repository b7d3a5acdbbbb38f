//! Integration tests for the transport
//!
//! These tests drive both roles over loopback the way a remote protocol would.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use remote_socket::net::{
    self, CountingAllocator, Handle, HandleKind, Transport, TransportConfig,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn listen_any(transport: &Transport<impl net::HandleAllocator>) -> (Handle, u32) {
    let listener = transport.listen_start(0).expect("Failed to open listen socket");
    let port = listener.local_addr().expect("Failed to get local address").port();
    (listener, port as u32)
}

#[test]
fn test_full_client_server_flow() {
    init_tracing();
    assert!(net::startup());

    let transport = Arc::new(Transport::new(TransportConfig::new()));
    let (listener, port) = listen_any(&transport);

    let server_transport = Arc::clone(&transport);
    let server = thread::spawn(move || {
        let peer = server_transport
            .listen_connect(Some(&listener))
            .expect("Failed to accept connection");
        assert_eq!(peer.kind(), HandleKind::Accepted);

        let mut buf = [0u8; 17];
        assert!(server_transport.receive(&peer, &mut buf));
        assert_eq!(&buf, b"Hello from client");
        assert!(server_transport.send(&peer, b"Hello from server"));

        server_transport.disconnect(peer);
        server_transport.disconnect(listener);
    });

    let client = transport
        .connect("127.0.0.1", port)
        .expect("Failed to connect");
    assert_eq!(client.kind(), HandleKind::Connected);
    assert!(transport.send(&client, b"Hello from client"));

    let mut buf = [0u8; 17];
    assert!(transport.receive(&client, &mut buf));
    assert_eq!(&buf, b"Hello from server");

    transport.disconnect(client);
    server.join().expect("Server thread panicked");
    net::shutdown();
}

#[test]
fn test_round_trip_sizes() {
    init_tracing();
    let transport = Arc::new(Transport::new(TransportConfig::new()));
    let (listener, port) = listen_any(&transport);

    let client = transport.connect("127.0.0.1", port).expect("Failed to connect");
    let peer = transport
        .listen_connect(Some(&listener))
        .expect("Failed to accept");

    for size in [0usize, 1, 1460, 65536] {
        let payload: Vec<u8> = (0..size).map(|i| (i * 31 % 251) as u8).collect();

        let received = thread::scope(|s| {
            s.spawn(|| assert!(transport.send(&client, &payload)));
            let mut buf = vec![0u8; size];
            assert!(transport.receive(&peer, &mut buf), "receive of {} bytes", size);
            buf
        });

        assert_eq!(received, payload, "payload of {} bytes differs", size);
    }

    transport.disconnect(client);
    transport.disconnect(peer);
    transport.disconnect(listener);
}

#[test]
fn test_connect_reachable_within_timeout() {
    init_tracing();
    let timeout = Duration::from_secs(2);
    let transport = Transport::new(TransportConfig::new().connect_timeout(timeout));
    let (listener, port) = listen_any(&transport);

    let start = Instant::now();
    let client = transport.connect("127.0.0.1", port);
    assert!(client.is_some());
    assert!(start.elapsed() < timeout);

    transport.disconnect(client.unwrap());
    transport.disconnect(listener);
}

#[test]
fn test_connect_unresponsive_peer_times_out() {
    init_tracing();
    let server = Transport::new(TransportConfig::new());
    let (listener, port) = listen_any(&server);
    // Backlog 0: one queued, unaccepted peer makes the kernel drop later SYNs
    let _queued = std::net::TcpStream::connect(("127.0.0.1", port as u16))
        .expect("Failed to queue first peer");

    let timeout = Duration::from_millis(150);
    let transport = Transport::new(TransportConfig::new().connect_timeout(timeout));

    let start = Instant::now();
    let result = transport.try_connect("127.0.0.1", port);
    let elapsed = start.elapsed();

    assert!(matches!(result, Err(net::Error::ConnectTimeout(_))));
    assert!(elapsed >= timeout, "gave up early after {:?}", elapsed);
    assert!(elapsed < timeout + Duration::from_millis(250), "took {:?}", elapsed);

    server.disconnect(listener);
}

#[test]
fn test_connect_unresolvable_host() {
    let transport = Transport::new(TransportConfig::new());
    assert!(transport.connect("no-such-host.invalid", 80).is_none());
    assert!(transport.connect("127.0.0.1", 70000).is_none());
}

#[test]
fn test_localhost_falls_through_candidates() {
    init_tracing();
    // The listener is IPv4 only; a ::1 candidate is refused and skipped
    let transport = Transport::new(TransportConfig::new());
    let (listener, port) = listen_any(&transport);

    let client = transport.connect("localhost", port).expect("Failed to connect");
    let peer = transport.listen_connect(Some(&listener)).expect("Failed to accept");

    assert!(transport.send(&peer, b"ok"));
    let mut buf = [0u8; 2];
    assert!(transport.receive(&client, &mut buf));
    assert_eq!(&buf, b"ok");

    transport.disconnect(client);
    transport.disconnect(peer);
    transport.disconnect(listener);
}

#[test]
fn test_listen_port_in_use() {
    init_tracing();
    let transport = Transport::new(TransportConfig::new().listen_reuse(false));
    let (first, port) = listen_any(&transport);

    assert!(transport.listen_start(port).is_none());
    assert!(matches!(
        transport.try_listen(port),
        Err(net::Error::Bind { .. })
    ));

    transport.disconnect(first);

    let reuse = Transport::new(TransportConfig::new().listen_reuse(true));
    let again = reuse.listen_start(port).expect("Failed to rebind released port");
    reuse.disconnect(again);
}

#[test]
fn test_accept_exactly_once() {
    init_tracing();
    let transport = Arc::new(Transport::with_allocator(
        TransportConfig::new(),
        CountingAllocator::new(),
    ));
    let (listener, port) = listen_any(&transport);

    let server_transport = Arc::clone(&transport);
    let server = thread::spawn(move || {
        let peer = server_transport.listen_connect(Some(&listener));
        (peer, listener)
    });

    let client = transport.connect("127.0.0.1", port).expect("Failed to connect");
    let (peer, listener) = server.join().expect("Server thread panicked");
    let peer = peer.expect("Failed to accept");

    // listener + accepted + client
    assert_eq!(transport.allocator().created(), 3);
    assert_eq!(peer.peer_addr().unwrap(), client.local_addr().unwrap());

    assert!(transport.send(&client, b"up"));
    assert!(transport.send(&peer, b"down"));
    let mut up = [0u8; 2];
    let mut down = [0u8; 4];
    assert!(transport.receive(&peer, &mut up));
    assert!(transport.receive(&client, &mut down));
    assert_eq!(&up, b"up");
    assert_eq!(&down, b"down");

    transport.disconnect(client);
    transport.disconnect(peer);
    transport.disconnect(listener);
    assert_eq!(transport.allocator().live(), 0);
}

#[test]
fn test_sequential_peers() {
    init_tracing();
    let transport = Arc::new(Transport::new(TransportConfig::new()));
    let (listener, port) = listen_any(&transport);

    let server_transport = Arc::clone(&transport);
    let server = thread::spawn(move || {
        for _ in 0..3 {
            let peer = server_transport
                .listen_connect(Some(&listener))
                .expect("Failed to accept");
            let mut buf = [0u8; 8];
            assert!(server_transport.receive(&peer, &mut buf));
            assert!(server_transport.send(&peer, &buf));
            server_transport.disconnect(peer);
        }
        server_transport.disconnect(listener);
    });

    for i in 0..3u64 {
        let client = transport.connect("127.0.0.1", port).expect("Failed to connect");
        let message = i.to_le_bytes();
        assert!(transport.send(&client, &message));
        let mut echo = [0u8; 8];
        assert!(transport.receive(&client, &mut echo));
        assert_eq!(echo, message);
        transport.disconnect(client);
    }

    server.join().expect("Server thread panicked");
}

#[test]
fn test_receive_fails_when_peer_closes_mid_transfer() {
    init_tracing();
    let transport = Transport::new(TransportConfig::new());
    let (listener, port) = listen_any(&transport);

    let client = transport.connect("127.0.0.1", port).expect("Failed to connect");
    let peer = transport.listen_connect(Some(&listener)).expect("Failed to accept");

    assert!(transport.send(&client, &[7u8; 10]));
    transport.disconnect(client);

    let mut buf = [0u8; 100];
    assert!(!transport.receive(&peer, &mut buf));

    transport.disconnect(peer);
    transport.disconnect(listener);
}

#[test]
fn test_send_fails_after_peer_closes() {
    init_tracing();
    let transport = Transport::new(TransportConfig::new());
    let (listener, port) = listen_any(&transport);

    let client = transport.connect("127.0.0.1", port).expect("Failed to connect");
    let peer = transport.listen_connect(Some(&listener)).expect("Failed to accept");
    transport.disconnect(client);

    // The first send may still be buffered before the reset comes back
    let chunk = [1u8; 1024];
    let failed = (0..100).any(|_| {
        let ok = transport.send(&peer, &chunk);
        if ok {
            thread::sleep(Duration::from_millis(10));
        }
        !ok
    });
    assert!(failed);

    transport.disconnect(peer);
    transport.disconnect(listener);
}

#[test]
fn test_facade_null_listener() {
    assert!(net::facade::listen_connect(None).is_none());
}
