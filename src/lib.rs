//! # Mini Socket - Safe BSD Socket Objects
//!
//! Mini Socket wraps the raw BSD socket calls (`socket`, `bind`, `listen`,
//! `accept`, `connect`, `send`, `recv`, ...) into owned objects that release
//! their OS handle exactly once, whatever the exit path.
//!
//! ## Key Features
//!
//! - **Dual-Stack Endpoints**: [`Address`] holds an IPv4 or an IPv6 endpoint
//!   as a tagged variant and renders it as `host:port` or `[host]:port`;
//!   [`AddressView`] formats descriptors owned by someone else without
//!   copying them
//! - **Single-Owner Handles**: [`Socket`] owns one descriptor, closes it on
//!   drop, and hands it over only by value (see [`TcpServerSocket::accept`])
//! - **Stream and Datagram Sockets**: [`TcpSocket`], [`TcpServerSocket`] and
//!   [`UdpSocket`] share the single-shot primitives of
//!   [`CommunicatingSocket`]
//! - **Full Delivery Where Asked**: [`TcpSocket::send_all`] absorbs short
//!   sends; every other write path is one system call
//! - **Byte Streams**: [`StreamAdapter`] lets a TCP connection be consumed
//!   through `std::io::{Read, BufRead, Write}` with buffered read-ahead and
//!   write-behind
//!
//! ## Basic Usage
//!
//! ### Server Side
//!
//! ```rust,no_run
//! use std::io::{BufRead, Write};
//! use mini_socket::{Address, TcpServerSocket};
//!
//! let server = TcpServerSocket::bind(&Address::from_text("127.0.0.1", 7890)?)?;
//! loop {
//!     let mut client = server.accept()?;
//!     println!("Accepted connection from {}", client.remote_endpoint()?);
//!
//!     // Echo lines back until the client hangs up
//!     let mut stream = client.stream();
//!     let mut line = String::new();
//!     while stream.read_line(&mut line)? > 0 {
//!         stream.write_all(line.as_bytes())?;
//!         line.clear();
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Client Side
//!
//! ```rust,no_run
//! use mini_socket::{Address, TcpSocket};
//!
//! let socket = TcpSocket::connect(&Address::from_text("127.0.0.1", 7890)?)?;
//! socket.send_all(b"Hello from mini socket!\n")?;
//!
//! let mut response = [0; 1024];
//! let n = socket.receive(&mut response)?;
//! println!("Response: {}", String::from_utf8_lossy(&response[..n]));
//! # Ok::<(), mini_socket::Error>(())
//! ```
//!
//! ## Threading
//!
//! Every call blocks the calling thread; there is no timeout and no
//! non-blocking mode. A socket object has one logical owner at a time.
//! Closing a socket from one thread while another is blocked on it is
//! undefined behavior as far as this library is concerned.
//!
//! ## Networking Subsystem
//!
//! Sockets keep a [`Network`] reference alive, so the process-wide subsystem
//! is started before the first socket exists and torn down after the last
//! one is gone.

#![warn(missing_docs)]

#[cfg(not(unix))]
compile_error!("mini-socket only supports unix targets");

mod address;
mod communicating;
mod error;
mod network;
mod resolve;
mod socket;
mod stream;
mod tcp;
mod udp;

pub use address::{Address, AddressView, Family};
pub use communicating::CommunicatingSocket;
pub use error::{last_error_string, Error, Result, Side};
pub use network::Network;
pub use resolve::{resolve, tcp_connect, udp_connect, AddrInfoIter, AddrInfoList, Transport};
pub use socket::{Domain, Handle, Protocol, Socket, Type};
pub use stream::{StreamAdapter, DEFAULT_BUFFER_SIZE};
pub use tcp::{TcpServerSocket, TcpSocket, BACKLOG};
pub use udp::UdpSocket;
