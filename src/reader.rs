//! Header-peekable reader.
//!
//! Parsers often need to look at the first bytes of a file (to detect a
//! header, an encoding mark or a dialect) before reading it from the start.
//! [`Reader`] reads that head once, keeps it, and replays it through both
//! [`Reader::head_bytes`] and the normal `Read` path, so the underlying
//! stream is never read twice and need not be seekable.

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Stdin};

/// A stream whose total size may be known up front.
pub trait Source: Read {
    /// Total length in bytes, or 0 when it cannot be determined.
    fn size(&self) -> u64 {
        0
    }
}

impl Source for File {
    fn size(&self) -> u64 {
        self.metadata().map(|m| m.len()).unwrap_or(0)
    }
}

impl Source for &File {
    fn size(&self) -> u64 {
        (*self).size()
    }
}

impl Source for &[u8] {
    fn size(&self) -> u64 {
        self.len() as u64
    }
}

impl<T: AsRef<[u8]>> Source for Cursor<T> {
    fn size(&self) -> u64 {
        self.get_ref().as_ref().len() as u64
    }
}

impl Source for Stdin {}

impl<R: Source> Source for BufReader<R> {
    fn size(&self) -> u64 {
        self.get_ref().size()
    }
}

impl<S: Source + ?Sized> Source for Box<S> {
    fn size(&self) -> u64 {
        (**self).size()
    }
}

impl<S: Source + ?Sized> Source for &mut S {
    fn size(&self) -> u64 {
        (**self).size()
    }
}

/// Stream wrapper that buffers the first bytes for replay.
#[derive(Debug)]
pub struct Reader<R> {
    offset: u64,
    inner: R,
    head: Vec<u8>,
    /// Total length reported by the source before anything was read.
    size: u64,
    /// Stream error held back while buffered bytes were handed out.
    pending: Option<io::Error>,
}

impl<R: Source> Reader<R> {
    /// Wrap `inner`, reading up to `head_len` bytes from it immediately.
    ///
    /// A stream shorter than `head_len` is not an error; the head is simply
    /// shorter.
    pub fn new(mut inner: R, head_len: usize) -> io::Result<Self> {
        let size = inner.size();
        let mut head = Vec::with_capacity(head_len);
        (&mut inner).take(head_len as u64).read_to_end(&mut head)?;
        Ok(Self {
            offset: 0,
            inner,
            head,
            size,
            pending: None,
        })
    }
}

impl<R> Reader<R> {
    /// A fresh cursor over the buffered head, positioned at its start.
    pub fn head_bytes(&self) -> Cursor<&[u8]> {
        Cursor::new(&self.head)
    }

    /// Number of bytes actually buffered.
    pub fn head_len(&self) -> usize {
        self.head.len()
    }

    /// Bytes consumed through `Read` so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Best-effort total length of the wrapped stream; 0 when unknown.
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl<R: Read> Read for Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(e) = self.pending.take() {
            return Err(e);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let head_len = self.head.len() as u64;
        if self.offset >= head_len {
            let n = self.inner.read(buf)?;
            self.offset += n as u64;
            return Ok(n);
        }

        let start = self.offset as usize;
        let buffered = (self.head.len() - start).min(buf.len());
        buf[..buffered].copy_from_slice(&self.head[start..start + buffered]);
        self.offset += buffered as u64;

        if buffered == buf.len() {
            return Ok(buffered);
        }

        // The request straddles the end of the head: top it up from the
        // stream. The buffered bytes are returned either way; a stream error
        // is held and returned by the next call.
        match self.inner.read(&mut buf[buffered..]) {
            Ok(n) => {
                self.offset += n as u64;
                Ok(buffered + n)
            }
            Err(e) => {
                self.pending = Some(e);
                Ok(buffered)
            }
        }
    }
}
