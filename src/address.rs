use std::ffi::{CStr, CString};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use crate::error::{Error, Result};

// Part of POSIX but not bound by the `libc` crate.
unsafe extern "C" {
    fn inet_pton(af: libc::c_int, src: *const libc::c_char, dst: *mut libc::c_void) -> libc::c_int;
    fn inet_ntop(
        af: libc::c_int,
        src: *const libc::c_void,
        dst: *mut libc::c_char,
        size: libc::socklen_t,
    ) -> *const libc::c_char;
}

/// The address family of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// IPv4 (`AF_INET`).
    V4,
    /// IPv6 (`AF_INET6`).
    V6,
}

impl Family {
    pub(crate) fn as_raw(self) -> libc::c_int {
        match self {
            Family::V4 => libc::AF_INET,
            Family::V6 => libc::AF_INET6,
        }
    }
}

/// Borrowed, family-checked access to a native endpoint descriptor.
///
/// Both [`Address`] and [`AddressView`] format themselves through this type,
/// so the text contract lives in one place.
#[derive(Clone, Copy)]
enum Endpoint<'a> {
    V4(&'a libc::sockaddr_in),
    V6(&'a libc::sockaddr_in6),
}

impl<'a> Endpoint<'a> {
    /// Reads the family tag and reinterprets the descriptor accordingly.
    ///
    /// # Safety
    ///
    /// `sa` must point to at least `len` readable bytes that stay valid for `'a`.
    unsafe fn from_raw(sa: *const libc::sockaddr, len: libc::socklen_t) -> Option<Endpoint<'a>> {
        let len = len as usize;
        if sa.is_null() || len < mem::size_of::<libc::sa_family_t>() {
            return None;
        }
        // SAFETY: the caller guarantees `len` readable bytes; the family tag
        // and the family-specific structure are only read once the length
        // check for that structure has passed.
        unsafe {
            match (*sa).sa_family as libc::c_int {
                libc::AF_INET if len >= mem::size_of::<libc::sockaddr_in>() => {
                    Some(Endpoint::V4(&*(sa as *const libc::sockaddr_in)))
                }
                libc::AF_INET6 if len >= mem::size_of::<libc::sockaddr_in6>() => {
                    Some(Endpoint::V6(&*(sa as *const libc::sockaddr_in6)))
                }
                _ => None,
            }
        }
    }

    fn address_and_port(self) -> Option<(String, u16)> {
        let mut buf = [0 as libc::c_char; 128];
        let (family, src, port) = match self {
            Endpoint::V4(sin) => (
                libc::AF_INET,
                &sin.sin_addr as *const libc::in_addr as *const libc::c_void,
                sin.sin_port,
            ),
            Endpoint::V6(sin6) => (
                libc::AF_INET6,
                &sin6.sin6_addr as *const libc::in6_addr as *const libc::c_void,
                sin6.sin6_port,
            ),
        };
        // SAFETY: `src` points to an address of the announced family and
        // `buf` is writable for its full length.
        let text = unsafe {
            if inet_ntop(family, src, buf.as_mut_ptr(), buf.len() as libc::socklen_t).is_null() {
                return None;
            }
            CStr::from_ptr(buf.as_ptr())
        };
        let host = text.to_str().ok()?.to_owned();
        Some((host, u16::from_be(port)))
    }

    fn to_text(self) -> Option<String> {
        let (host, port) = self.address_and_port()?;
        Some(match self {
            Endpoint::V4(_) => format!("{host}:{port}"),
            Endpoint::V6(_) => format!("[{host}]:{port}"),
        })
    }

    fn to_address(self) -> Address {
        match self {
            Endpoint::V4(sin) => Address::V4(*sin),
            Endpoint::V6(sin6) => Address::V6(*sin6),
        }
    }
}

/// An owned transport endpoint (IP address and port).
///
/// The native descriptor is stored as a tagged variant, so the family and the
/// stored layout always agree. The port is kept in network byte order and
/// exposed in host byte order.
#[derive(Clone, Copy)]
pub enum Address {
    /// An IPv4 endpoint.
    V4(libc::sockaddr_in),
    /// An IPv6 endpoint.
    V6(libc::sockaddr_in6),
}

impl Address {
    /// Builds an endpoint from a numeric host literal and a port.
    ///
    /// The host is tried as an IPv4 literal first, then as an IPv6 literal.
    /// Nothing is returned unless one of them succeeds.
    pub fn from_text(host: &str, port: u16) -> Result<Address> {
        parse(host, port).ok_or_else(|| Error::AddressFormat {
            host: host.to_owned(),
            port,
        })
    }

    /// Returns the family of the stored endpoint.
    pub fn family(&self) -> Family {
        match self {
            Address::V4(_) => Family::V4,
            Address::V6(_) => Family::V6,
        }
    }

    /// Returns the port in host byte order.
    pub fn port(&self) -> u16 {
        match self {
            Address::V4(sin) => u16::from_be(sin.sin_port),
            Address::V6(sin6) => u16::from_be(sin6.sin6_port),
        }
    }

    /// Renders `host:port` for IPv4 and `[host]:port` for IPv6.
    ///
    /// An empty string means the endpoint could not be rendered.
    pub fn to_text(&self) -> String {
        self.endpoint().to_text().unwrap_or_default()
    }

    /// Returns the host text and the port, or a default pair if the endpoint
    /// could not be rendered.
    pub fn address_and_port(&self) -> (String, u16) {
        self.endpoint().address_and_port().unwrap_or_default()
    }

    /// Borrows the stored descriptor without copying it.
    pub fn view(&self) -> AddressView<'_> {
        AddressView {
            endpoint: Some(self.endpoint()),
        }
    }

    pub(crate) fn as_raw(&self) -> (*const libc::sockaddr, libc::socklen_t) {
        match self {
            Address::V4(sin) => (
                sin as *const libc::sockaddr_in as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            ),
            Address::V6(sin6) => (
                sin6 as *const libc::sockaddr_in6 as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t,
            ),
        }
    }

    fn endpoint(&self) -> Endpoint<'_> {
        match self {
            Address::V4(sin) => Endpoint::V4(sin),
            Address::V6(sin6) => Endpoint::V6(sin6),
        }
    }
}

fn parse(host: &str, port: u16) -> Option<Address> {
    let c_host = CString::new(host).ok()?;

    // SAFETY: zeroed descriptors are valid, and `inet_pton` writes at most
    // the size of the address field it is given for the announced family.
    unsafe {
        let mut sin: libc::sockaddr_in = mem::zeroed();
        let dst = &mut sin.sin_addr as *mut libc::in_addr as *mut libc::c_void;
        if inet_pton(libc::AF_INET, c_host.as_ptr(), dst) == 1 {
            sin.sin_family = libc::AF_INET as libc::sa_family_t;
            sin.sin_port = port.to_be();
            return Some(Address::V4(sin));
        }

        let mut sin6: libc::sockaddr_in6 = mem::zeroed();
        let dst = &mut sin6.sin6_addr as *mut libc::in6_addr as *mut libc::c_void;
        if inet_pton(libc::AF_INET6, c_host.as_ptr(), dst) == 1 {
            sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
            sin6.sin6_port = port.to_be();
            return Some(Address::V6(sin6));
        }
    }
    None
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Address {
        // SAFETY: all-zero bytes are a valid value for both descriptors.
        match addr {
            SocketAddr::V4(a) => {
                let mut sin: libc::sockaddr_in = unsafe { mem::zeroed() };
                sin.sin_family = libc::AF_INET as libc::sa_family_t;
                sin.sin_port = a.port().to_be();
                sin.sin_addr = libc::in_addr {
                    s_addr: u32::from_ne_bytes(a.ip().octets()),
                };
                Address::V4(sin)
            }
            SocketAddr::V6(a) => {
                let mut sin6: libc::sockaddr_in6 = unsafe { mem::zeroed() };
                sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
                sin6.sin6_port = a.port().to_be();
                sin6.sin6_flowinfo = a.flowinfo();
                sin6.sin6_scope_id = a.scope_id();
                sin6.sin6_addr = libc::in6_addr {
                    s6_addr: a.ip().octets(),
                };
                Address::V6(sin6)
            }
        }
    }
}

impl From<Address> for SocketAddr {
    fn from(addr: Address) -> SocketAddr {
        match addr {
            Address::V4(sin) => SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::from(sin.sin_addr.s_addr.to_ne_bytes()),
                u16::from_be(sin.sin_port),
            )),
            Address::V6(sin6) => SocketAddr::V6(SocketAddrV6::new(
                Ipv6Addr::from(sin6.sin6_addr.s6_addr),
                u16::from_be(sin6.sin6_port),
                sin6.sin6_flowinfo,
                sin6.sin6_scope_id,
            )),
        }
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Address) -> bool {
        SocketAddr::from(*self) == SocketAddr::from(*other)
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        SocketAddr::from(*self).hash(state)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Address").field(&SocketAddr::from(*self)).finish()
    }
}

/// A non-owning view of an endpoint descriptor stored elsewhere.
///
/// The view never copies the descriptor and cannot outlive the buffer it
/// borrows. A descriptor of an unrecognized family is still a valid view; it
/// just renders as an empty string.
#[derive(Clone, Copy)]
pub struct AddressView<'a> {
    endpoint: Option<Endpoint<'a>>,
}

impl<'a> AddressView<'a> {
    /// Views the first `len` bytes of a socket address storage buffer, as
    /// filled by `accept()`, `getsockname()`, `getpeername()` or `recvfrom()`.
    pub fn from_storage(storage: &'a libc::sockaddr_storage, len: libc::socklen_t) -> AddressView<'a> {
        let len = len.min(mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t);
        let ptr = storage as *const libc::sockaddr_storage as *const libc::sockaddr;
        // SAFETY: `len` is clamped to the size of the borrowed storage.
        unsafe { AddressView::from_raw(ptr, len) }
    }

    /// Views a raw descriptor.
    ///
    /// # Safety
    ///
    /// `sa` must be null or point to at least `len` readable bytes that stay
    /// valid and unmodified for `'a`.
    pub unsafe fn from_raw(sa: *const libc::sockaddr, len: libc::socklen_t) -> AddressView<'a> {
        AddressView {
            endpoint: unsafe { Endpoint::from_raw(sa, len) },
        }
    }

    /// Returns the family of the viewed descriptor, if it is recognized.
    pub fn family(&self) -> Option<Family> {
        self.endpoint.map(|endpoint| match endpoint {
            Endpoint::V4(_) => Family::V4,
            Endpoint::V6(_) => Family::V6,
        })
    }

    /// Same contract as [`Address::to_text`].
    pub fn to_text(&self) -> String {
        self.endpoint.and_then(Endpoint::to_text).unwrap_or_default()
    }

    /// Same contract as [`Address::address_and_port`].
    pub fn address_and_port(&self) -> (String, u16) {
        self.endpoint
            .and_then(Endpoint::address_and_port)
            .unwrap_or_default()
    }

    /// Copies the viewed descriptor into owned storage.
    pub fn to_address(&self) -> Option<Address> {
        self.endpoint.map(Endpoint::to_address)
    }
}

impl fmt::Display for AddressView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl fmt::Debug for AddressView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AddressView").field(&self.to_text()).finish()
    }
}
