//! Chunked transfer coding
//!
//! Bodies of unknown length go out as size-prefixed chunks ended by a
//! zero-sized one.

use super::session::{HttpSession, SessionOps};
use super::{Result, CRLF};

/// Frames body pieces as chunks on a session
pub struct ChunkedEncoder<'s, S: SessionOps> {
    session: &'s mut HttpSession<S>,
    chunks: usize,
}

impl<'s, S: SessionOps> ChunkedEncoder<'s, S> {
    pub fn new(session: &'s mut HttpSession<S>) -> Self {
        ChunkedEncoder { session, chunks: 0 }
    }

    /// Write one chunk
    ///
    /// Empty input is skipped, since a zero-sized chunk ends the body.
    pub fn write_chunk(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        let size_line = format!("{:x}{}", data.len(), CRLF);
        let mut frame = Vec::with_capacity(size_line.len() + data.len() + CRLF.len());
        frame.extend_from_slice(size_line.as_bytes());
        frame.extend_from_slice(data);
        frame.extend_from_slice(CRLF.as_bytes());

        self.session.write_all(&frame)?;
        self.chunks += 1;
        Ok(())
    }

    /// Write the last chunk, returning how many data chunks preceded it
    pub fn finish(self) -> Result<usize> {
        self.session.write_all(format!("0{}{}", CRLF, CRLF).as_bytes())?;
        Ok(self.chunks)
    }
}
