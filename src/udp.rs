use std::mem;
use std::ops::{Deref, DerefMut};
use std::os::fd::AsRawFd;

use crate::address::{Address, AddressView};
use crate::communicating::{CommunicatingSocket, SEND_FLAGS};
use crate::error::{Error, Result};
use crate::socket::{cvt_len, unsupported_family, Domain, Protocol, Type};

/// A datagram socket.
///
/// Each `send_to`/`receive_from` is one independent datagram. Connecting the
/// socket (through [`CommunicatingSocket::connect`]) fixes the peer so that
/// `send`/`receive` can be used instead.
#[derive(Debug)]
pub struct UdpSocket {
    inner: CommunicatingSocket,
}

impl UdpSocket {
    /// Creates an unbound datagram socket in `domain`.
    pub fn new(domain: Domain) -> Result<UdpSocket> {
        let mut inner = CommunicatingSocket::new();
        inner.create(domain, Type::DGRAM, Protocol::DEFAULT)?;
        Ok(UdpSocket { inner })
    }

    /// Creates an unbound datagram socket able to talk to `remote`.
    pub fn for_address(remote: &Address) -> Result<UdpSocket> {
        UdpSocket::new(Domain::for_address(remote))
    }

    /// Creates a datagram socket bound to `local`.
    pub fn bind(local: &Address) -> Result<UdpSocket> {
        let socket = UdpSocket::for_address(local)?;
        socket.inner.bind(local)?;
        Ok(socket)
    }

    /// Sends one datagram to `remote` with a single `sendto()` call.
    pub fn send_to(&self, buf: &[u8], remote: &Address) -> Result<usize> {
        let (addr, len) = remote.as_raw();
        // SAFETY: `buf` is readable for its length and `addr` points to `len`
        // bytes owned by `remote`.
        let rc = unsafe {
            libc::sendto(
                self.as_raw_fd(),
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
                SEND_FLAGS,
                addr,
                len,
            )
        };
        cvt_len(rc).map_err(Error::Send)
    }

    /// Receives one datagram with a single `recvfrom()` call and returns its
    /// length together with the sender.
    pub fn receive_from(&self, buf: &mut [u8]) -> Result<(usize, Address)> {
        // SAFETY: storage is large enough for any address and `len` says so;
        // `buf` is writable for its length.
        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        let mut len = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
        let rc = unsafe {
            libc::recvfrom(
                self.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                0,
                &mut storage as *mut libc::sockaddr_storage as *mut libc::sockaddr,
                &mut len,
            )
        };
        let n = cvt_len(rc).map_err(Error::Receive)?;
        let from = AddressView::from_storage(&storage, len)
            .to_address()
            .ok_or_else(|| Error::Receive(unsupported_family(storage.ss_family)))?;
        log::trace!("Received {n} bytes from {from}");
        Ok((n, from))
    }
}

impl Deref for UdpSocket {
    type Target = CommunicatingSocket;

    fn deref(&self) -> &CommunicatingSocket {
        &self.inner
    }
}

impl DerefMut for UdpSocket {
    fn deref_mut(&mut self) -> &mut CommunicatingSocket {
        &mut self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_address_is_unbound() {
        let remote = Address::from_text("127.0.0.1", 9).unwrap();
        let socket = UdpSocket::for_address(&remote).unwrap();
        assert!(socket.is_valid());
        assert_eq!(socket.local_endpoint().unwrap().port(), 0);
    }

    #[test]
    fn send_to_and_receive_from() {
        let server = UdpSocket::bind(&Address::from_text("127.0.0.1", 0).unwrap()).unwrap();
        let server_addr = server.local_endpoint().unwrap();
        let client = UdpSocket::bind(&Address::from_text("127.0.0.1", 0).unwrap()).unwrap();
        let client_addr = client.local_endpoint().unwrap();

        assert_eq!(client.send_to(b"datagram", &server_addr).unwrap(), 8);
        let mut buf = [0u8; 64];
        let (n, from) = server.receive_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"datagram");
        assert_eq!(from, client_addr);
    }
}
