//! Line-oriented byte-range reader.
//!
//! A line belongs to the range that contains its first byte. A range that
//! does not begin at a line boundary skips the partial first line (the
//! previous range reads it in full), and the last line that starts inside the
//! range is read to completion even if it runs past `start + length`.

use std::sync::Arc;

use crate::error::Result;
use crate::storage::Storage;

const DEFAULT_CHUNK_BYTES: usize = 64 * 1024;

pub struct LineRangeReader {
    storage: Arc<dyn Storage>,
    path: String,
    start: u64,
    /// Lines starting at or after this offset belong to the next range.
    end: u64,
    /// File offset of `buf[0]`, always a line start once initialised.
    cursor: u64,
    buf: Vec<u8>,
    eof: bool,
    initialized: bool,
    chunk_bytes: usize,
    bytes_read: u64,
}

impl LineRangeReader {
    /// `length` may run past the end of the file; it is clamped.
    pub fn new(storage: Arc<dyn Storage>, path: &str, start: u64, length: u64) -> Result<Self> {
        let file_size = storage.size(path)?;
        let end = start.saturating_add(length).min(file_size);
        Ok(Self {
            storage,
            path: path.to_string(),
            start,
            end,
            cursor: start,
            buf: Vec::new(),
            eof: false,
            initialized: false,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            bytes_read: 0,
        })
    }

    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes.max(1);
        self
    }

    /// Bytes fetched from storage so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Next complete line (without its `\n` or `\r\n`), or `None` at range end.
    pub fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        if !self.initialized {
            self.initialized = true;
            if self.start >= self.end {
                return Ok(None);
            }
            if self.start > 0 && !self.starts_at_line_boundary()? {
                // Partial first line; the previous range owns it.
                if self.take_through_newline()?.is_none() {
                    return Ok(None);
                }
            }
        }

        if self.cursor >= self.end {
            return Ok(None);
        }
        let Some(mut line) = self.take_through_newline()? else {
            return Ok(None);
        };
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    fn starts_at_line_boundary(&mut self) -> Result<bool> {
        let prev = self.storage.read_range(&self.path, self.start - 1, 1)?;
        self.bytes_read += prev.len() as u64;
        Ok(prev.first() == Some(&b'\n'))
    }

    /// Remove and return bytes up to and including the next `\n` (or to EOF).
    fn take_through_newline(&mut self) -> Result<Option<Vec<u8>>> {
        let mut scanned = 0;
        loop {
            if let Some(i) = self.buf[scanned..].iter().position(|b| *b == b'\n') {
                let n = scanned + i + 1;
                let line: Vec<u8> = self.buf.drain(..n).collect();
                self.cursor += n as u64;
                return Ok(Some(line));
            }
            scanned = self.buf.len();
            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let line = std::mem::take(&mut self.buf);
                self.cursor += line.len() as u64;
                return Ok(Some(line));
            }
            self.fill()?;
        }
    }

    fn fill(&mut self) -> Result<()> {
        let offset = self.cursor + self.buf.len() as u64;
        let chunk = self
            .storage
            .read_range(&self.path, offset, self.chunk_bytes)?;
        if chunk.is_empty() {
            self.eof = true;
        }
        self.bytes_read += chunk.len() as u64;
        self.buf.extend_from_slice(&chunk);
        Ok(())
    }
}
