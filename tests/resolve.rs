mod common;

use std::thread;

use mini_socket::{resolve, tcp_connect, udp_connect, Error, Family, Transport};

use common::{init_logging, listen};

#[test]
fn views_borrow_from_the_list() {
    init_logging();
    let list = resolve("127.0.0.1", Some("8080"), Transport::Tcp).unwrap();
    let texts: Vec<String> = list.iter().map(|view| view.to_text()).collect();
    assert!(texts.iter().all(|text| text == "127.0.0.1:8080"));
    for view in &list {
        assert_eq!(view.family(), Some(Family::V4));
        assert_eq!(view.to_address().unwrap().port(), 8080);
    }
}

#[test]
fn tcp_connect_reaches_listener() {
    init_logging();
    let (server, addr) = listen();
    let port = addr.port().to_string();

    let acceptor = thread::spawn(move || {
        let conn = server.accept().unwrap();
        let mut buf = [0u8; 8];
        let n = conn.receive(&mut buf).unwrap();
        buf[..n].to_vec()
    });

    let socket = tcp_connect("127.0.0.1", &port).unwrap();
    assert_eq!(socket.remote_endpoint().unwrap(), addr);
    socket.send_all(b"hi").unwrap();
    assert_eq!(acceptor.join().unwrap(), b"hi");
}

#[test]
fn tcp_connect_reports_last_failure() {
    init_logging();
    let port = {
        let (_server, addr) = listen();
        addr.port().to_string()
    };
    assert!(matches!(tcp_connect("127.0.0.1", &port), Err(Error::Connect(_))));
}

#[test]
fn udp_connect_fixes_the_peer() {
    init_logging();
    let socket = udp_connect("127.0.0.1", "9").unwrap();
    let remote = socket.remote_endpoint().unwrap();
    assert_eq!(remote.to_text(), "127.0.0.1:9");
}

#[test]
fn unknown_service_is_a_resolve_error() {
    init_logging();
    match resolve("127.0.0.1", Some("no-such-service-name"), Transport::Tcp) {
        Err(Error::Resolve { host, service, message }) => {
            assert_eq!(host, "127.0.0.1");
            assert_eq!(service, "no-such-service-name");
            assert!(!message.is_empty());
        }
        other => panic!("expected a resolve error, got {other:?}"),
    }
}
