use std::ops::{Deref, DerefMut};
use std::os::fd::AsRawFd;

use crate::address::Address;
use crate::error::{Error, Result, Side};
use crate::socket::{cvt, cvt_len, query_endpoint, Socket};

// A peer that went away must surface as a send error, not as SIGPIPE.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub(crate) const SEND_FLAGS: libc::c_int = 0;

/// A socket that can be bound, connected and used to move bytes.
///
/// This is the behavior shared by stream and datagram sockets. Every call
/// maps to exactly one system call: no retries, and short transfers are
/// reported as they are.
#[derive(Debug, Default)]
pub struct CommunicatingSocket {
    socket: Socket,
}

impl CommunicatingSocket {
    /// Returns a socket that holds no handle yet.
    pub fn new() -> CommunicatingSocket {
        CommunicatingSocket {
            socket: Socket::new(),
        }
    }

    /// Wraps a base socket.
    pub fn from_socket(socket: Socket) -> CommunicatingSocket {
        CommunicatingSocket { socket }
    }

    /// Binds the handle to a local endpoint.
    pub fn bind(&self, local: &Address) -> Result<()> {
        let (addr, len) = local.as_raw();
        // SAFETY: `addr` points to `len` bytes owned by `local`.
        cvt(unsafe { libc::bind(self.as_raw_fd(), addr, len) }).map_err(Error::Bind)?;
        log::debug!("Socket {} bound to {local}", self.as_raw_fd());
        Ok(())
    }

    /// Connects the handle to a remote endpoint. One attempt, no retry.
    pub fn connect(&self, remote: &Address) -> Result<()> {
        let (addr, len) = remote.as_raw();
        // SAFETY: `addr` points to `len` bytes owned by `remote`.
        cvt(unsafe { libc::connect(self.as_raw_fd(), addr, len) }).map_err(Error::Connect)?;
        log::debug!("Socket {} connected to {remote}", self.as_raw_fd());
        Ok(())
    }

    /// Same as [`connect`](Self::connect) but reports the outcome as a flag.
    ///
    /// The platform error is only logged; use `connect` to get it back.
    pub fn try_connect(&self, remote: &Address) -> bool {
        match self.connect(remote) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("Connection to {remote} failed: {e}");
                false
            }
        }
    }

    /// Transmits with a single `send()` call and returns how many bytes the
    /// system accepted, which may be less than `buf.len()`.
    pub fn send(&self, buf: &[u8]) -> Result<usize> {
        // SAFETY: `buf` is valid for reads of `buf.len()` bytes.
        let rc = unsafe {
            libc::send(
                self.as_raw_fd(),
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
                SEND_FLAGS,
            )
        };
        let n = cvt_len(rc).map_err(Error::Send)?;
        log::trace!("Sent {n}/{} bytes on socket {}", buf.len(), self.as_raw_fd());
        Ok(n)
    }

    /// Receives with a single `recv()` call. `Ok(0)` means the peer shut the
    /// connection down in order.
    pub fn receive(&self, buf: &mut [u8]) -> Result<usize> {
        // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
        let rc = unsafe {
            libc::recv(
                self.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                0,
            )
        };
        let n = cvt_len(rc).map_err(Error::Receive)?;
        log::trace!("Received {n} bytes on socket {}", self.as_raw_fd());
        Ok(n)
    }

    /// Returns the endpoint of the connected peer.
    pub fn remote_endpoint(&self) -> Result<Address> {
        query_endpoint(self.as_raw_fd(), Side::Remote)
    }
}

impl Deref for CommunicatingSocket {
    type Target = Socket;

    fn deref(&self) -> &Socket {
        &self.socket
    }
}

impl DerefMut for CommunicatingSocket {
    fn deref_mut(&mut self) -> &mut Socket {
        &mut self.socket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::{Domain, Protocol, Type};

    fn udp_v4() -> CommunicatingSocket {
        let mut socket = CommunicatingSocket::new();
        socket.create(Domain::IPV4, Type::DGRAM, Protocol::DEFAULT).unwrap();
        socket
    }

    #[test]
    fn bind_reports_local_endpoint() {
        let socket = udp_v4();
        socket.bind(&Address::from_text("127.0.0.1", 0).unwrap()).unwrap();
        let local = socket.local_endpoint().unwrap();
        assert_eq!(local.address_and_port().0, "127.0.0.1");
        assert_ne!(local.port(), 0);
    }

    #[test]
    fn bind_twice_fails() {
        let socket = udp_v4();
        let any = Address::from_text("127.0.0.1", 0).unwrap();
        socket.bind(&any).unwrap();
        assert!(matches!(socket.bind(&any), Err(Error::Bind(_))));
    }

    #[test]
    fn unconnected_has_no_remote_endpoint() {
        let socket = udp_v4();
        assert!(matches!(
            socket.remote_endpoint(),
            Err(Error::AddressQuery { side: Side::Remote, .. })
        ));
    }

    #[test]
    fn connected_datagram_round_trip() {
        let a = udp_v4();
        let b = udp_v4();
        a.bind(&Address::from_text("127.0.0.1", 0).unwrap()).unwrap();
        b.bind(&Address::from_text("127.0.0.1", 0).unwrap()).unwrap();
        let a_addr = a.local_endpoint().unwrap();
        let b_addr = b.local_endpoint().unwrap();
        assert!(a.try_connect(&b_addr));
        b.connect(&a_addr).unwrap();
        assert_eq!(a.remote_endpoint().unwrap(), b_addr);

        assert_eq!(a.send(b"ping").unwrap(), 4);
        let mut buf = [0u8; 16];
        let n = b.receive(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ping");
    }

    #[test]
    fn io_on_closed_socket_fails() {
        let mut socket = udp_v4();
        socket.close();
        assert!(matches!(socket.send(b"x"), Err(Error::Send(_))));
        let mut buf = [0u8; 1];
        assert!(matches!(socket.receive(&mut buf), Err(Error::Receive(_))));
        let remote = Address::from_text("127.0.0.1", 9).unwrap();
        assert!(!socket.try_connect(&remote));
        assert!(matches!(socket.connect(&remote), Err(Error::Connect(_))));
    }
}
