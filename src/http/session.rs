//! Outbound transport
//!
//! A response is written through [`SessionOps`]. [`FdSessionOps`] drives a
//! TCP socket and [`WriterSessionOps`] any `io::Write` sink, so the same
//! send path serves real connections and in-memory serialization.

use super::{Error, Result};
use std::io::{self, Write};
use std::net::{Shutdown, TcpStream};
use std::os::fd::AsRawFd;
use std::time::Duration;

/// Byte sink a response is written to
pub trait SessionOps {
    /// Wait until the session accepts writes
    ///
    /// Returns true if the session is ready before the timeout expires
    fn poll_writable(&self, timeout: Option<Duration>) -> Result<bool>;

    /// Write data to the session
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Flush buffered data
    fn flush(&mut self) -> Result<()>;

    /// Close the session
    fn close(&mut self) -> Result<()>;
}

/// A transport plus the write timeout and byte accounting of one exchange
pub struct HttpSession<S: SessionOps> {
    ops: S,
    timeout: Option<Duration>,
    bytes_written: u64,
}

impl<S: SessionOps> HttpSession<S> {
    /// Wrap `ops` with the default 10 second write timeout
    pub fn new(ops: S) -> Self {
        HttpSession {
            ops,
            timeout: Some(Duration::from_secs(10)),
            bytes_written: 0,
        }
    }

    /// `None` waits forever
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Total bytes written through this session
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Write once the transport is ready, or fail with [`Error::Timeout`]
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if !self.ops.poll_writable(self.timeout)? {
            return Err(Error::Timeout);
        }

        let n = self.ops.write(buf)?;
        self.bytes_written += n as u64;
        Ok(n)
    }

    /// Write the whole buffer, failing if the peer stops accepting data
    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..])?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            written += n;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.ops.flush()
    }

    pub fn close(&mut self) -> Result<()> {
        self.ops.close()
    }

    pub fn get_ref(&self) -> &S {
        &self.ops
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.ops
    }

    pub fn into_inner(self) -> S {
        self.ops
    }
}

/// Socket transport, polled for writability before each write
pub struct FdSessionOps {
    stream: TcpStream,
}

impl FdSessionOps {
    pub fn new(stream: TcpStream) -> Self {
        FdSessionOps { stream }
    }

    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }
}

impl SessionOps for FdSessionOps {
    fn poll_writable(&self, timeout: Option<Duration>) -> Result<bool> {
        use libc::{poll, pollfd, POLLOUT};

        let mut pfd = pollfd {
            fd: self.stream.as_raw_fd(),
            events: POLLOUT,
            revents: 0,
        };

        let timeout_ms = timeout
            .map(|d| i32::try_from(d.as_millis()).unwrap_or(i32::MAX))
            .unwrap_or(-1); // -1 = infinite

        // SAFETY: `pfd` is a single valid pollfd that outlives the call.
        let result = unsafe { poll(&mut pfd as *mut pollfd, 1, timeout_ms) };

        if result < 0 {
            return Err(Error::Io(io::Error::last_os_error()));
        }

        Ok(result > 0)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.stream.write(buf).map_err(Error::from)
    }

    fn flush(&mut self) -> Result<()> {
        self.stream.flush().map_err(Error::from)
    }

    fn close(&mut self) -> Result<()> {
        self.stream.shutdown(Shutdown::Both).map_err(Error::from)
    }
}

/// Session operations over any `io::Write`
///
/// Writers are assumed always ready, so timeouts never fire.
pub struct WriterSessionOps<W: Write> {
    writer: W,
}

impl<W: Write> WriterSessionOps<W> {
    pub fn new(writer: W) -> Self {
        WriterSessionOps { writer }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> SessionOps for WriterSessionOps<W> {
    fn poll_writable(&self, _timeout: Option<Duration>) -> Result<bool> {
        Ok(true)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.writer.write(buf).map_err(Error::from)
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(Error::from)
    }

    fn close(&mut self) -> Result<()> {
        self.flush()
    }
}

/// Session over an accepted connection
pub fn from_tcp_stream(stream: TcpStream) -> HttpSession<FdSessionOps> {
    HttpSession::new(FdSessionOps::new(stream))
}

/// Session over memory or any other sink
pub fn from_writer<W: Write>(writer: W) -> HttpSession<WriterSessionOps<W>> {
    HttpSession::new(WriterSessionOps::new(writer))
}
