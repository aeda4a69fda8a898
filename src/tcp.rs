use std::io;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::os::fd::{AsRawFd, FromRawFd};

use crate::address::{Address, AddressView};
use crate::communicating::CommunicatingSocket;
use crate::error::{Error, Result};
use crate::socket::{cvt, Domain, Handle, Protocol, Socket, Type};
use crate::stream::StreamAdapter;

/// Number of pending connections a listening socket queues before `accept()`.
pub const BACKLOG: libc::c_int = 1024;

/// A connected TCP socket.
///
/// Dereferences to [`CommunicatingSocket`] for the single-shot primitives.
///
/// ```rust,no_run
/// use mini_socket::{Address, TcpSocket};
///
/// let remote = Address::from_text("127.0.0.1", 7)?;
/// let socket = TcpSocket::connect(&remote)?;
/// socket.send_all(b"hello")?;
/// # Ok::<(), mini_socket::Error>(())
/// ```
#[derive(Debug)]
pub struct TcpSocket {
    inner: CommunicatingSocket,
}

impl TcpSocket {
    /// Creates a stream socket of the endpoint's family and connects it.
    ///
    /// Nothing is returned unless both steps succeed; on failure the handle
    /// is closed.
    pub fn connect(remote: &Address) -> Result<TcpSocket> {
        let mut inner = CommunicatingSocket::new();
        inner.create(Domain::for_address(remote), Type::STREAM, Protocol::DEFAULT)?;
        inner.connect(remote)?;
        Ok(TcpSocket { inner })
    }

    /// Wraps a handle of an already connected stream socket.
    pub fn from_handle(handle: Handle) -> TcpSocket {
        TcpSocket {
            inner: CommunicatingSocket::from_socket(Socket::from_handle(handle)),
        }
    }

    /// Sends the whole buffer, looping over short sends.
    pub fn send_all(&self, buf: &[u8]) -> Result<()> {
        let mut sent = 0;
        while sent < buf.len() {
            let n = self.inner.send(&buf[sent..])?;
            if n == 0 {
                return Err(Error::Send(io::Error::from(io::ErrorKind::WriteZero)));
            }
            sent += n;
        }
        Ok(())
    }

    /// Returns a buffered byte stream over this socket.
    ///
    /// The adapter borrows the socket exclusively until it is dropped.
    pub fn stream(&mut self) -> StreamAdapter<'_> {
        StreamAdapter::new(self)
    }
}

impl Deref for TcpSocket {
    type Target = CommunicatingSocket;

    fn deref(&self) -> &CommunicatingSocket {
        &self.inner
    }
}

impl DerefMut for TcpSocket {
    fn deref_mut(&mut self) -> &mut CommunicatingSocket {
        &mut self.inner
    }
}

/// A listening TCP socket.
///
/// ```rust,no_run
/// use mini_socket::{Address, TcpServerSocket};
///
/// let server = TcpServerSocket::bind(&Address::from_text("0.0.0.0", 7890)?)?;
/// loop {
///     let client = server.accept()?;
///     println!("Accepted connection from: {}", client.remote_endpoint()?);
/// }
/// # Ok::<(), mini_socket::Error>(())
/// ```
#[derive(Debug)]
pub struct TcpServerSocket {
    inner: CommunicatingSocket,
}

impl TcpServerSocket {
    /// Creates a stream socket of the endpoint's family, binds it and starts
    /// listening with [`BACKLOG`].
    pub fn bind(local: &Address) -> Result<TcpServerSocket> {
        let mut inner = CommunicatingSocket::new();
        inner.create(Domain::for_address(local), Type::STREAM, Protocol::DEFAULT)?;
        inner.bind(local)?;
        listen(&inner, BACKLOG)?;
        log::debug!("Listening on {local} (socket {})", inner.as_raw_fd());
        Ok(TcpServerSocket { inner })
    }

    /// Blocks until a client connects and returns the new connection. The
    /// listening handle is left untouched.
    pub fn accept(&self) -> Result<TcpSocket> {
        // SAFETY: storage is large enough for any address and `len` says so.
        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        let mut len = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
        let fd = cvt(unsafe {
            libc::accept(
                self.inner.as_raw_fd(),
                &mut storage as *mut libc::sockaddr_storage as *mut libc::sockaddr,
                &mut len,
            )
        })
        .map_err(Error::Accept)?;
        // SAFETY: `accept()` returned a fresh descriptor that nobody owns yet.
        let handle = unsafe { Handle::from_raw_fd(fd) };
        log::debug!(
            "Accepted connection from: {} (socket {fd})",
            AddressView::from_storage(&storage, len)
        );
        Ok(TcpSocket::from_handle(handle))
    }
}

/// Marks a bound stream socket as passive.
fn listen(socket: &Socket, backlog: libc::c_int) -> Result<()> {
    // SAFETY: plain system call on a descriptor the socket owns.
    cvt(unsafe { libc::listen(socket.as_raw_fd(), backlog) }).map_err(Error::Listen)?;
    Ok(())
}

impl Deref for TcpServerSocket {
    type Target = Socket;

    fn deref(&self) -> &Socket {
        &self.inner
    }
}

impl DerefMut for TcpServerSocket {
    fn deref_mut(&mut self) -> &mut Socket {
        &mut self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn loopback() -> Address {
        Address::from_text("127.0.0.1", 0).unwrap()
    }

    #[test]
    fn connect_to_closed_port_fails() {
        let server = TcpServerSocket::bind(&loopback()).unwrap();
        let addr = server.local_endpoint().unwrap();
        drop(server);
        assert!(matches!(TcpSocket::connect(&addr), Err(Error::Connect(_))));
    }

    #[test]
    fn bind_in_use_fails() {
        let server = TcpServerSocket::bind(&loopback()).unwrap();
        let addr = server.local_endpoint().unwrap();
        assert!(matches!(TcpServerSocket::bind(&addr), Err(Error::Bind(_))));
    }

    #[test]
    fn listen_on_connected_socket_fails() {
        let server = TcpServerSocket::bind(&loopback()).unwrap();
        let client = TcpSocket::connect(&server.local_endpoint().unwrap()).unwrap();
        assert!(matches!(listen(&client, BACKLOG), Err(Error::Listen(_))));
    }

    #[test]
    fn listen_on_closed_socket_fails() {
        let socket = Socket::new();
        assert!(matches!(listen(&socket, BACKLOG), Err(Error::Listen(_))));
    }

    #[test]
    fn accept_on_closed_server_fails() {
        let mut server = TcpServerSocket::bind(&loopback()).unwrap();
        server.close();
        assert!(!server.is_valid());
        assert!(matches!(server.accept(), Err(Error::Accept(_))));
    }

    #[test]
    fn send_all_then_peer_sees_eof() {
        let server = TcpServerSocket::bind(&loopback()).unwrap();
        let addr = server.local_endpoint().unwrap();
        let client = thread::spawn(move || {
            let socket = TcpSocket::connect(&addr).unwrap();
            socket.send_all(b"hello, world").unwrap();
        });

        let conn = server.accept().unwrap();
        client.join().unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 4];
        loop {
            let n = conn.receive(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
        }
        assert_eq!(received, b"hello, world");
    }
}
