#![allow(dead_code)]

use std::sync::Once;

use mini_socket::{Address, TcpServerSocket};
use tracing_subscriber::filter::EnvFilter;

static LOGGING: Once = Once::new();

fn init_env_filter(env_filter: EnvFilter) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_level(true)
        .with_target(true)
        .with_test_writer();

    let subscriber = subscriber.finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Routes the library's `log` records to a tracing subscriber filtered by
/// `RUST_LOG`. Safe to call from every test.
pub fn init_logging() {
    LOGGING.call_once(|| {
        let _ = tracing_log::LogTracer::init();
        if let Ok(env_filter) = EnvFilter::try_from_default_env() {
            init_env_filter(env_filter);
        }
    });
}

pub fn loopback() -> Address {
    Address::from_text("127.0.0.1", 0).unwrap()
}

/// A listening server on an ephemeral loopback port and its address.
pub fn listen() -> (TcpServerSocket, Address) {
    let server = TcpServerSocket::bind(&loopback()).unwrap();
    let addr = server.local_endpoint().unwrap();
    (server, addr)
}

/// `len` bytes of a repeating, position dependent pattern.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
