use std::io::{self, BufRead, Read, Write};
use std::os::fd::{AsRawFd, RawFd};

use crate::error::Result;
use crate::tcp::TcpSocket;

/// Default capacity of both buffer regions of a [`StreamAdapter`].
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// A buffered byte stream over an exclusively borrowed [`TcpSocket`].
///
/// While the adapter lives it is the only way to talk to the socket, so
/// bytes it has read ahead cannot be skipped by another reader. Unread bytes
/// are visible through [`buffer`](Self::buffer) and are lost when the adapter
/// is dropped; a warning is logged if that happens.
///
/// Reads are served from an input region refilled by one `receive()` call
/// whenever it runs empty; a short refill is kept as is. Writes accumulate in
/// an output region that is handed to [`TcpSocket::send_all`] when it is full,
/// on [`drain`](Self::drain)/[`flush`](Write::flush), before a refill blocks,
/// and when the adapter is dropped.
///
/// The adapter implements [`Read`], [`BufRead`] and [`Write`]; a read of
/// `Ok(0)` is the end of the stream.
///
/// ```rust,no_run
/// use std::io::{BufRead, Write};
/// use mini_socket::{Address, TcpSocket};
///
/// let mut socket = TcpSocket::connect(&Address::from_text("127.0.0.1", 7)?)?;
/// let mut stream = socket.stream();
/// stream.write_all(b"hello\n")?;
/// let mut line = String::new();
/// stream.read_line(&mut line)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct StreamAdapter<'a> {
    socket: &'a mut TcpSocket,
    input: Box<[u8]>,
    pos: usize,
    filled: usize,
    output: Vec<u8>,
    write_capacity: usize,
}

impl<'a> StreamAdapter<'a> {
    /// Creates an adapter with [`DEFAULT_BUFFER_SIZE`] regions.
    pub fn new(socket: &'a mut TcpSocket) -> StreamAdapter<'a> {
        StreamAdapter::with_capacity(socket, DEFAULT_BUFFER_SIZE, DEFAULT_BUFFER_SIZE)
    }

    /// Creates an adapter with the given region sizes. A zero size is
    /// raised to one byte.
    pub fn with_capacity(
        socket: &'a mut TcpSocket,
        read_capacity: usize,
        write_capacity: usize,
    ) -> StreamAdapter<'a> {
        let write_capacity = write_capacity.max(1);
        StreamAdapter {
            socket,
            input: vec![0u8; read_capacity.max(1)].into_boxed_slice(),
            pos: 0,
            filled: 0,
            output: Vec::with_capacity(write_capacity),
            write_capacity,
        }
    }

    /// The socket underneath.
    pub fn socket(&self) -> &TcpSocket {
        &*self.socket
    }

    /// Returns the received bytes not yet consumed, without refilling.
    pub fn buffer(&self) -> &[u8] {
        &self.input[self.pos..self.filled]
    }

    /// Returns the unread bytes, refilling the input region with a single
    /// `receive()` if it is empty. An empty slice means end of stream.
    pub fn fill(&mut self) -> Result<&[u8]> {
        if self.pos >= self.filled {
            self.drain()?;
            let n = self.socket.receive(&mut self.input)?;
            self.pos = 0;
            self.filled = n;
            if n == 0 {
                log::debug!("End of stream on socket {}", self.socket_fd());
            }
        }
        Ok(&self.input[self.pos..self.filled])
    }

    /// Sends the whole output region and empties it.
    ///
    /// The region is emptied even when sending fails, so that nothing is sent
    /// twice.
    pub fn drain(&mut self) -> Result<()> {
        if self.output.is_empty() {
            return Ok(());
        }
        log::trace!(
            "Draining {} bytes on socket {}",
            self.output.len(),
            self.socket_fd()
        );
        let result = self.socket.send_all(&self.output);
        self.output.clear();
        result
    }

    /// Reads one byte, `None` at end of stream.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let byte = self.fill()?.first().copied();
        if byte.is_some() {
            self.pos += 1;
        }
        Ok(byte)
    }

    /// Appends one byte, draining the output region first if it is full.
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        if self.output.len() >= self.write_capacity {
            self.drain()?;
        }
        self.output.push(byte);
        Ok(())
    }

    /// Number of received bytes not yet consumed.
    pub fn buffered_input(&self) -> usize {
        self.filled - self.pos
    }

    /// Number of written bytes not yet handed to the socket.
    pub fn pending_output(&self) -> usize {
        self.output.len()
    }

    fn socket_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

impl Read for StreamAdapter<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let available = self.fill()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl BufRead for StreamAdapter<'_> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        Ok(self.fill()?)
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.filled);
    }
}

impl Write for StreamAdapter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.output.len() >= self.write_capacity {
            self.drain()?;
        }
        let n = (self.write_capacity - self.output.len()).min(buf.len());
        self.output.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.drain()?)
    }
}

impl Drop for StreamAdapter<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.drain() {
            log::warn!("Dropping unsent stream data: {e}");
        }
        if self.buffered_input() > 0 {
            log::warn!(
                "Dropping {} unread bytes on socket {}",
                self.buffered_input(),
                self.socket_fd()
            );
        }
    }
}
