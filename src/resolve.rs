use std::ffi::{CStr, CString};
use std::io;
use std::marker::PhantomData;
use std::mem;
use std::ptr;

use crate::address::AddressView;
use crate::error::{Error, Result};
use crate::tcp::TcpSocket;
use crate::udp::UdpSocket;

/// Transport the resolved endpoints are meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Stream endpoints (`SOCK_STREAM`).
    Tcp,
    /// Datagram endpoints (`SOCK_DGRAM`).
    Udp,
}

impl Transport {
    fn socket_type(self) -> libc::c_int {
        match self {
            Transport::Tcp => libc::SOCK_STREAM,
            Transport::Udp => libc::SOCK_DGRAM,
        }
    }
}

/// The endpoints returned by one `getaddrinfo()` call.
///
/// The list is freed when this value is dropped; the views handed out by
/// [`iter`](Self::iter) borrow from it.
#[derive(Debug)]
pub struct AddrInfoList {
    head: *mut libc::addrinfo,
}

impl AddrInfoList {
    /// Iterates over the resolved endpoints in the order the resolver
    /// returned them.
    pub fn iter(&self) -> AddrInfoIter<'_> {
        AddrInfoIter {
            cur: self.head,
            _list: PhantomData,
        }
    }
}

impl Drop for AddrInfoList {
    fn drop(&mut self) {
        if !self.head.is_null() {
            // SAFETY: `head` came from a successful `getaddrinfo()` and is
            // freed only here.
            unsafe { libc::freeaddrinfo(self.head) };
        }
    }
}

impl<'a> IntoIterator for &'a AddrInfoList {
    type Item = AddressView<'a>;
    type IntoIter = AddrInfoIter<'a>;

    fn into_iter(self) -> AddrInfoIter<'a> {
        self.iter()
    }
}

/// Iterator over the endpoints of an [`AddrInfoList`].
pub struct AddrInfoIter<'a> {
    cur: *const libc::addrinfo,
    _list: PhantomData<&'a AddrInfoList>,
}

impl<'a> Iterator for AddrInfoIter<'a> {
    type Item = AddressView<'a>;

    fn next(&mut self) -> Option<AddressView<'a>> {
        if self.cur.is_null() {
            return None;
        }
        // SAFETY: every node of the list stays valid while the list is
        // borrowed, and `ai_addr` points to `ai_addrlen` bytes.
        unsafe {
            let info = &*self.cur;
            self.cur = info.ai_next;
            Some(AddressView::from_raw(info.ai_addr, info.ai_addrlen))
        }
    }
}

/// Resolves `host` and an optional `service` (name or port number) with
/// `getaddrinfo()`.
pub fn resolve(host: &str, service: Option<&str>, transport: Transport) -> Result<AddrInfoList> {
    let failure = |message: String| Error::Resolve {
        host: host.to_owned(),
        service: service.unwrap_or_default().to_owned(),
        message,
    };
    let c_host = CString::new(host).map_err(|e| failure(e.to_string()))?;
    let c_service = service
        .map(CString::new)
        .transpose()
        .map_err(|e| failure(e.to_string()))?;

    // SAFETY: a zeroed `addrinfo` is the documented way to start hints.
    let mut hints: libc::addrinfo = unsafe { mem::zeroed() };
    hints.ai_family = libc::AF_UNSPEC;
    hints.ai_socktype = transport.socket_type();

    let mut head: *mut libc::addrinfo = ptr::null_mut();
    // SAFETY: all pointers are valid C strings or null, and `head` receives
    // a list owned by the returned `AddrInfoList`.
    let rc = unsafe {
        libc::getaddrinfo(
            c_host.as_ptr(),
            c_service.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
            &hints,
            &mut head,
        )
    };
    if rc != 0 {
        return Err(failure(gai_message(rc)));
    }
    log::debug!("Resolved {host} (service: {service:?})");
    Ok(AddrInfoList { head })
}

fn gai_message(rc: libc::c_int) -> String {
    if rc == libc::EAI_SYSTEM {
        return io::Error::last_os_error().to_string();
    }
    // SAFETY: `gai_strerror` returns a static, NUL terminated string.
    unsafe { CStr::from_ptr(libc::gai_strerror(rc)) }
        .to_string_lossy()
        .into_owned()
}

/// Resolves `host`/`service` and returns a TCP socket connected to the first
/// endpoint that accepts the connection.
///
/// If every endpoint fails, the error of the last attempt is returned.
pub fn tcp_connect(host: &str, service: &str) -> Result<TcpSocket> {
    let list = resolve(host, Some(service), Transport::Tcp)?;
    let mut last = None;
    for address in list.iter().filter_map(|view| view.to_address()) {
        match TcpSocket::connect(&address) {
            Ok(socket) => return Ok(socket),
            Err(e) => {
                log::debug!("Connection to {address} failed: {e}");
                last = Some(e);
            }
        }
    }
    Err(last.unwrap_or_else(|| no_usable_address(host, service)))
}

/// Resolves `host`/`service` and returns a UDP socket connected to the first
/// usable endpoint.
pub fn udp_connect(host: &str, service: &str) -> Result<UdpSocket> {
    let list = resolve(host, Some(service), Transport::Udp)?;
    let mut last = None;
    for address in list.iter().filter_map(|view| view.to_address()) {
        let attempt = UdpSocket::for_address(&address)
            .and_then(|socket| socket.connect(&address).map(|()| socket));
        match attempt {
            Ok(socket) => return Ok(socket),
            Err(e) => {
                log::debug!("Connection to {address} failed: {e}");
                last = Some(e);
            }
        }
    }
    Err(last.unwrap_or_else(|| no_usable_address(host, service)))
}

fn no_usable_address(host: &str, service: &str) -> Error {
    Error::Resolve {
        host: host.to_owned(),
        service: service.to_owned(),
        message: "no usable address".to_owned(),
    }
}
