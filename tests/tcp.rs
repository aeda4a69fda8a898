mod common;

use std::thread;

use mini_socket::{Address, Error, Family, TcpServerSocket, TcpSocket};

use common::{init_logging, listen, loopback, pattern};

const PAYLOAD_LEN: usize = 4 * 1024 * 1024;

#[test]
fn accept_reports_client_endpoint() {
    init_logging();
    let (server, addr) = listen();

    let client = TcpSocket::connect(&addr).unwrap();
    let accepted = server.accept().unwrap();

    let client_local = client.local_endpoint().unwrap();
    let peer = accepted.remote_endpoint().unwrap();
    assert_eq!(peer.family(), client_local.family());
    assert_eq!(peer.port(), client_local.port());
    assert_eq!(peer, client_local);
    assert_eq!(client.remote_endpoint().unwrap(), accepted.local_endpoint().unwrap());

    // The listening handle survives the hand-off.
    assert!(server.is_valid());
    assert_eq!(server.local_endpoint().unwrap(), addr);
}

#[test]
fn send_all_delivers_large_buffer_through_echo() {
    init_logging();
    let (server, addr) = listen();

    let echo = thread::spawn(move || {
        let conn = server.accept().unwrap();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = conn.receive(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            conn.send_all(&buf[..n]).unwrap();
        }
    });

    let mut client = TcpSocket::connect(&addr).unwrap();
    let payload = pattern(PAYLOAD_LEN);

    // Read the echo concurrently so neither side stalls on full buffers.
    let echoed = thread::scope(|scope| {
        let socket = &client;
        let reader = scope.spawn(move || {
            let mut received = Vec::with_capacity(PAYLOAD_LEN);
            let mut buf = vec![0u8; 64 * 1024];
            while received.len() < PAYLOAD_LEN {
                let n = socket.receive(&mut buf).unwrap();
                assert!(n > 0, "echo closed early");
                received.extend_from_slice(&buf[..n]);
            }
            received
        });
        socket.send_all(&payload).unwrap();
        reader.join().unwrap()
    });

    assert_eq!(echoed.len(), payload.len());
    assert!(echoed == payload);

    client.close();
    assert!(!client.is_valid());
    echo.join().unwrap();
}

#[test]
fn closed_peer_is_end_of_stream() {
    init_logging();
    let (server, addr) = listen();

    let client = TcpSocket::connect(&addr).unwrap();
    let accepted = server.accept().unwrap();
    drop(client);

    let mut buf = [0u8; 16];
    assert_eq!(accepted.receive(&mut buf).unwrap(), 0);
    assert_eq!(accepted.receive(&mut buf).unwrap(), 0);
}

#[test]
fn each_accept_owns_its_connection() {
    init_logging();
    let (server, addr) = listen();

    let first = TcpSocket::connect(&addr).unwrap();
    let second = TcpSocket::connect(&addr).unwrap();
    let a = server.accept().unwrap();
    let b = server.accept().unwrap();

    first.send_all(b"one").unwrap();
    second.send_all(b"two").unwrap();
    drop(first);
    drop(second);

    let mut seen = Vec::new();
    for conn in [a, b] {
        let mut buf = [0u8; 8];
        let n = conn.receive(&mut buf).unwrap();
        seen.push(buf[..n].to_vec());
    }
    seen.sort();
    assert_eq!(seen, vec![b"one".to_vec(), b"two".to_vec()]);
}

#[test]
fn ipv6_loopback_when_available() {
    init_logging();
    let local = Address::from_text("::1", 0).unwrap();
    let server = match TcpServerSocket::bind(&local) {
        Ok(server) => server,
        // Hosts without IPv6 cannot run this test.
        Err(Error::SocketCreation(_)) | Err(Error::Bind(_)) => return,
        Err(e) => panic!("unexpected error: {e}"),
    };
    let addr = server.local_endpoint().unwrap();
    assert_eq!(addr.family(), Family::V6);
    assert!(addr.to_text().starts_with("[::1]:"));

    let client = TcpSocket::connect(&addr).unwrap();
    let accepted = server.accept().unwrap();
    assert_eq!(accepted.remote_endpoint().unwrap(), client.local_endpoint().unwrap());
}

#[test]
fn failed_connect_returns_no_socket() {
    init_logging();
    let addr = {
        let server = TcpServerSocket::bind(&loopback()).unwrap();
        server.local_endpoint().unwrap()
    };
    match TcpSocket::connect(&addr) {
        Err(Error::Connect(e)) => assert!(!e.to_string().is_empty()),
        other => panic!("expected a connect error, got {other:?}"),
    }
}
