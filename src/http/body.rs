//! Byte streams and transfer throttling
//!
//! [`BodyStream`] is the byte-stream type used for request bodies, uploaded
//! files, and streamed response bodies. [`Throttle`] is the hook invoked
//! while a stream is being transferred.

use bytes::{Buf, Bytes};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

/// A readable body with an optionally known length
pub struct BodyStream {
    reader: Box<dyn Read + Send>,
    len: Option<u64>,
}

impl BodyStream {
    /// Stream of unknown length
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        BodyStream {
            reader: Box::new(reader),
            len: None,
        }
    }

    /// Stream over in-memory bytes
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let len = bytes.len() as u64;
        BodyStream {
            reader: Box::new(bytes.reader()),
            len: Some(len),
        }
    }

    /// Open a file, taking its length from the metadata
    pub fn from_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(BodyStream {
            reader: Box::new(file),
            len: Some(len),
        })
    }

    /// Declare the number of bytes the stream will yield
    pub fn with_len(mut self, len: u64) -> Self {
        self.len = Some(len);
        self
    }

    /// Length in bytes, if known up front
    pub fn len(&self) -> Option<u64> {
        self.len
    }

    /// Read the whole stream into memory
    pub fn read_to_bytes(mut self) -> io::Result<Bytes> {
        let mut buf = Vec::new();
        self.reader.read_to_end(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    /// Wrap the stream so reads report progress to a throttle
    pub fn throttled(self, throttle: Box<dyn Throttle>) -> Self {
        let len = self.len;
        BodyStream {
            reader: Box::new(ThrottledStream::new(self, throttle)),
            len,
        }
    }
}

impl Read for BodyStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyStream").field("len", &self.len).finish_non_exhaustive()
    }
}

/// Hook invoked as body bytes are transferred
///
/// `chunk` is the size of the piece just transferred and `total` the number
/// of bytes transferred so far, including `chunk`. Implementations may block
/// to pace the transfer.
pub trait Throttle: Send {
    fn on_transfer(&mut self, chunk: usize, total: u64);
}

impl<F> Throttle for F
where
    F: FnMut(usize, u64) + Send,
{
    fn on_transfer(&mut self, chunk: usize, total: u64) {
        self(chunk, total)
    }
}

/// Throttle that caps throughput at a fixed number of bytes per second
#[derive(Debug)]
pub struct RateLimit {
    bytes_per_second: u64,
    started: Option<Instant>,
}

impl RateLimit {
    pub fn new(bytes_per_second: u64) -> Self {
        RateLimit {
            bytes_per_second: bytes_per_second.max(1),
            started: None,
        }
    }

    /// How long to wait so that `total` bytes do not exceed the rate
    fn delay_for(&self, total: u64, elapsed: Duration) -> Duration {
        let expected = Duration::from_secs_f64(total as f64 / self.bytes_per_second as f64);
        expected.saturating_sub(elapsed)
    }
}

impl Throttle for RateLimit {
    fn on_transfer(&mut self, _chunk: usize, total: u64) {
        let started = *self.started.get_or_insert_with(Instant::now);
        let delay = self.delay_for(total, started.elapsed());
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}

/// Reader adapter that reports every successful read to a throttle
pub struct ThrottledStream<R: Read> {
    inner: R,
    throttle: Box<dyn Throttle>,
    total: u64,
}

impl<R: Read> ThrottledStream<R> {
    pub fn new(inner: R, throttle: Box<dyn Throttle>) -> Self {
        ThrottledStream {
            inner,
            throttle,
            total: 0,
        }
    }

    /// Bytes read so far
    pub fn total(&self) -> u64 {
        self.total
    }
}

impl<R: Read> Read for ThrottledStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.total += n as u64;
            self.throttle.on_transfer(n, self.total);
        }
        Ok(n)
    }
}
