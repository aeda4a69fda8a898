use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, RawFd};

use crate::address::{Address, AddressView, Family};
use crate::error::{last_error_string, Error, Result, Side};
use crate::network::Network;

/// Communication domain passed to `socket()`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Domain(pub libc::c_int);

impl Domain {
    /// IPv4 Internet protocols.
    pub const IPV4: Domain = Domain(libc::AF_INET);

    /// IPv6 Internet protocols.
    pub const IPV6: Domain = Domain(libc::AF_INET6);

    /// Returns the domain matching the family of `address`.
    pub fn for_address(address: &Address) -> Domain {
        Domain(address.family().as_raw())
    }
}

impl From<Family> for Domain {
    fn from(family: Family) -> Domain {
        Domain(family.as_raw())
    }
}

/// Socket type passed to `socket()`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Type(pub libc::c_int);

impl Type {
    /// Reliable, connection-oriented byte stream.
    pub const STREAM: Type = Type(libc::SOCK_STREAM);

    /// Connectionless datagrams.
    pub const DGRAM: Type = Type(libc::SOCK_DGRAM);
}

/// Protocol passed to `socket()`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Protocol(pub libc::c_int);

impl Protocol {
    /// Lets the system pick the protocol for the domain and type.
    pub const DEFAULT: Protocol = Protocol(0);

    /// `IPPROTO_TCP`.
    pub const TCP: Protocol = Protocol(libc::IPPROTO_TCP);

    /// `IPPROTO_UDP`.
    pub const UDP: Protocol = Protocol(libc::IPPROTO_UDP);
}

const INVALID_SOCKET: RawFd = -1;

/// Sole owner of one OS socket descriptor.
///
/// A handle is either invalid or holds one live descriptor. It is not
/// `Clone`; ownership moves only by value, and the descriptor is released
/// exactly once, on [`Handle::release`] or on drop.
#[derive(Debug)]
pub struct Handle {
    fd: RawFd,
}

impl Handle {
    /// A handle that holds nothing.
    pub const fn invalid() -> Handle {
        Handle { fd: INVALID_SOCKET }
    }

    /// Returns `true` if a descriptor is held.
    pub fn is_valid(&self) -> bool {
        self.fd != INVALID_SOCKET
    }

    /// Shuts down the read direction and closes the descriptor. Releasing an
    /// invalid handle does nothing.
    pub fn release(&mut self) {
        if !self.is_valid() {
            return;
        }
        let fd = mem::replace(&mut self.fd, INVALID_SOCKET);
        // SAFETY: `fd` was owned by this handle and is no longer reachable
        // through it. The descriptor is gone whatever `close()` returns.
        unsafe {
            libc::shutdown(fd, libc::SHUT_RD);
            if libc::close(fd) != 0 {
                log::debug!("close() on socket {fd} failed: {}", last_error_string());
                return;
            }
        }
        log::trace!("Closed socket {fd}");
    }
}

impl AsRawFd for Handle {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl FromRawFd for Handle {
    /// Takes ownership of a raw descriptor.
    ///
    /// `fd` must be an open socket descriptor that nothing else will close.
    unsafe fn from_raw_fd(fd: RawFd) -> Handle {
        Handle { fd }
    }
}

impl IntoRawFd for Handle {
    /// Gives up ownership without closing; an invalid handle yields `-1`.
    fn into_raw_fd(mut self) -> RawFd {
        mem::replace(&mut self.fd, INVALID_SOCKET)
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.release();
    }
}

pub(crate) fn cvt(rc: libc::c_int) -> io::Result<libc::c_int> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc)
    }
}

pub(crate) fn cvt_len(rc: libc::ssize_t) -> io::Result<usize> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc as usize)
    }
}

type NameFn = unsafe extern "C" fn(libc::c_int, *mut libc::sockaddr, *mut libc::socklen_t) -> libc::c_int;

/// Runs `getsockname()` or `getpeername()` and copies the result out.
pub(crate) fn query_endpoint(fd: RawFd, side: Side) -> Result<Address> {
    let query: NameFn = match side {
        Side::Local => libc::getsockname,
        Side::Remote => libc::getpeername,
    };
    // SAFETY: storage is large enough for any address and `len` says so.
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
    let rc = unsafe {
        query(
            fd,
            &mut storage as *mut libc::sockaddr_storage as *mut libc::sockaddr,
            &mut len,
        )
    };
    cvt(rc).map_err(|source| Error::AddressQuery { side, source })?;
    AddressView::from_storage(&storage, len)
        .to_address()
        .ok_or_else(|| Error::AddressQuery {
            side,
            source: unsupported_family(storage.ss_family),
        })
}

pub(crate) fn unsupported_family(family: libc::sa_family_t) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("unsupported address family {family}"),
    )
}

/// Base of every socket: owns at most one OS handle.
///
/// Dropping a `Socket` closes the handle if it is still open.
#[derive(Debug)]
pub struct Socket {
    handle: Handle,
    _network: Network,
}

impl Socket {
    /// Returns a socket that holds no handle yet.
    pub fn new() -> Socket {
        Socket {
            handle: Handle::invalid(),
            _network: Network::acquire(),
        }
    }

    /// Wraps an already open handle, for instance one returned by `accept()`.
    pub fn from_handle(handle: Handle) -> Socket {
        Socket {
            handle,
            _network: Network::acquire(),
        }
    }

    /// Requests a new OS handle, closing the current one first.
    pub fn create(&mut self, domain: Domain, ty: Type, protocol: Protocol) -> Result<()> {
        self.close();
        // SAFETY: plain system call, no pointers involved.
        let fd = cvt(unsafe { libc::socket(domain.0, ty.0, protocol.0) })
            .map_err(Error::SocketCreation)?;
        log::debug!("Created socket {fd} (domain: {}, type: {})", domain.0, ty.0);
        // SAFETY: `fd` was just returned by `socket()` and is owned by nobody.
        self.handle = unsafe { Handle::from_raw_fd(fd) };
        Ok(())
    }

    /// Returns `true` if the socket currently holds a handle.
    pub fn is_valid(&self) -> bool {
        self.handle.is_valid()
    }

    /// Shuts down the read direction and releases the handle. Calling it
    /// again is a no-op.
    pub fn close(&mut self) {
        self.handle.release();
    }

    /// Returns the locally bound endpoint of the handle.
    pub fn local_endpoint(&self) -> Result<Address> {
        query_endpoint(self.handle.as_raw_fd(), Side::Local)
    }

    /// Gives up ownership of the handle, leaving this socket invalid.
    pub fn into_handle(mut self) -> Handle {
        mem::replace(&mut self.handle, Handle::invalid())
    }
}

impl Default for Socket {
    fn default() -> Socket {
        Socket::new()
    }
}

impl AsRawFd for Socket {
    fn as_raw_fd(&self) -> RawFd {
        self.handle.as_raw_fd()
    }
}
