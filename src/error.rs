use std::io;

use thiserror::Error;

/// Which side of a connection an address query was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The locally bound endpoint (`getsockname()`).
    Local,
    /// The connected peer (`getpeername()`).
    Remote,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Local => f.write_str("local"),
            Side::Remote => f.write_str("foreign"),
        }
    }
}

/// Errors raised by every layer of the socket library.
///
/// Each variant backed by a system call carries the `io::Error` captured right
/// after the failing call, so the platform error text is always part of the
/// message.
#[derive(Debug, Error)]
pub enum Error {
    /// The host could not be read as a numeric IPv4 or IPv6 literal.
    #[error("construct socket address error: the address is [{host}], and port is [{port}]")]
    AddressFormat {
        /// The rejected host text.
        host: String,
        /// The port that came with it.
        port: u16,
    },
    /// `socket()` failed.
    #[error("can't create socket: {0}")]
    SocketCreation(#[source] io::Error),
    /// `bind()` failed.
    #[error("bind error: {0}")]
    Bind(#[source] io::Error),
    /// `listen()` failed.
    #[error("listen error: {0}")]
    Listen(#[source] io::Error),
    /// `connect()` failed.
    #[error("connect error: {0}")]
    Connect(#[source] io::Error),
    /// `send()` or `sendto()` failed.
    #[error("send failed (send()): {0}")]
    Send(#[source] io::Error),
    /// `recv()` or `recvfrom()` failed.
    #[error("receive failed (recv()): {0}")]
    Receive(#[source] io::Error),
    /// `accept()` failed.
    #[error("accept failed (accept()): {0}")]
    Accept(#[source] io::Error),
    /// Fetching the local or foreign endpoint of a handle failed.
    #[error("fetch of {side} address failed: {source}")]
    AddressQuery {
        /// Which endpoint was asked for.
        side: Side,
        /// The platform error.
        source: io::Error,
    },
    /// The name-resolution boundary could not produce a usable endpoint.
    #[error("can't resolve [{host}], service [{service}]: {message}")]
    Resolve {
        /// The host that was looked up.
        host: String,
        /// The service that was looked up, empty if none.
        service: String,
        /// The resolver's explanation.
        message: String,
    },
}

impl Error {
    /// Returns the platform error carried by this error, if any.
    pub fn os_error(&self) -> Option<&io::Error> {
        match self {
            Error::SocketCreation(e)
            | Error::Bind(e)
            | Error::Listen(e)
            | Error::Connect(e)
            | Error::Send(e)
            | Error::Receive(e)
            | Error::Accept(e)
            | Error::AddressQuery { source: e, .. } => Some(e),
            Error::AddressFormat { .. } | Error::Resolve { .. } => None,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        let kind = match &err {
            Error::AddressFormat { .. } => io::ErrorKind::InvalidInput,
            Error::Resolve { .. } => io::ErrorKind::NotFound,
            other => other
                .os_error()
                .map(io::Error::kind)
                .unwrap_or(io::ErrorKind::Other),
        };
        io::Error::new(kind, err)
    }
}

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the last platform error as human readable text.
pub fn last_error_string() -> String {
    io::Error::last_os_error().to_string()
}
