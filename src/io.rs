//! Byte-stream abstraction between the core engine and its I/O sink/source.
//!
//! Disk-vs-stream plumbing is explicitly out of scope (spec.md §1); the core
//! only requires a sink offering sequential writes plus `tell`, and a source
//! offering sequential reads, `tell`, `peek`, and *optionally* random-access
//! `seek_to`. Concrete adapters here wrap anything implementing
//! [`std::io::Read`]/[`std::io::Write`], mirroring the way the teacher's
//! `io/file_io.rs` wraps `Box<dyn Read>`/`Box<dyn Write>` behind `DstFile`.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::{ErrorKind, Result};
use crate::xcdf_err;

/// Sequential write sink with an optional random-access reposition.
pub trait Sink {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
    fn tell(&mut self) -> io::Result<u64>;
    fn is_seekable(&self) -> bool {
        false
    }
    /// Reposition the sink's write cursor. Only implemented by seekable
    /// sinks; others return `SeekUnsupported`.
    fn seek_to(&mut self, _pos: u64) -> Result<()> {
        Err(xcdf_err!(ErrorKind::SeekUnsupported))
    }
}

/// Sequential read source with `peek`/`tell` and an optional `seek_to`.
pub trait Source {
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()>;
    fn tell(&mut self) -> io::Result<u64>;
    fn is_seekable(&self) -> bool {
        false
    }
    fn seek_to(&mut self, _pos: u64) -> Result<()> {
        Err(xcdf_err!(ErrorKind::SeekUnsupported))
    }
    /// Non-destructive test for "is there at least one more byte". Used to
    /// detect concatenated segments and plain EOF (`peek_next_exists` in
    /// spec.md §4.2).
    fn peek_exists(&mut self) -> io::Result<bool>;
}

/// Adapts any `W: Write` into a [`Sink`]; not seekable.
pub struct WriteSink<W: Write> {
    inner: W,
    pos: u64,
}

impl<W: Write> WriteSink<W> {
    pub fn new(inner: W) -> Self {
        WriteSink { inner, pos: 0 }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Sink for WriteSink<W> {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn tell(&mut self) -> io::Result<u64> {
        Ok(self.pos)
    }
}

/// Adapts any `W: Write + Seek` into a [`Sink`] with random-access
/// repositioning, used by `FileEngine::close` to rewrite the file header's
/// trailer pointer after the trailer has been written.
pub struct SeekWriteSink<W: Write + Seek> {
    inner: W,
}

impl<W: Write + Seek> SeekWriteSink<W> {
    pub fn new(inner: W) -> Self {
        SeekWriteSink { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Seek> Sink for SeekWriteSink<W> {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf)
    }

    fn tell(&mut self) -> io::Result<u64> {
        self.inner.stream_position()
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn seek_to(&mut self, pos: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(())
    }
}

/// Adapts any `R: Read` into a [`Source`]; sequential only, with a one-byte
/// lookahead buffer backing `peek_exists`.
pub struct ReadSource<R: Read> {
    inner: R,
    pos: u64,
    peeked: Option<u8>,
}

impl<R: Read> ReadSource<R> {
    pub fn new(inner: R) -> Self {
        ReadSource { inner, pos: 0, peeked: None }
    }
}

impl<R: Read> Source for ReadSource<R> {
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        read_with_peek(&mut self.inner, &mut self.peeked, &mut self.pos, buf)
    }

    fn tell(&mut self) -> io::Result<u64> {
        Ok(self.pos)
    }

    fn peek_exists(&mut self) -> io::Result<bool> {
        peek_with_buffer(&mut self.inner, &mut self.peeked)
    }
}

/// Adapts any `R: Read + Seek` into a [`Source`] with random-access seeking.
pub struct SeekReadSource<R: Read + Seek> {
    inner: R,
    peeked: Option<u8>,
}

impl<R: Read + Seek> SeekReadSource<R> {
    pub fn new(inner: R) -> Self {
        SeekReadSource { inner, peeked: None }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> Source for SeekReadSource<R> {
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let mut dummy_pos = 0u64;
        read_with_peek(&mut self.inner, &mut self.peeked, &mut dummy_pos, buf)
    }

    fn tell(&mut self) -> io::Result<u64> {
        let mut pos = self.inner.stream_position()?;
        if self.peeked.is_some() {
            pos -= 1;
        }
        Ok(pos)
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn seek_to(&mut self, pos: u64) -> Result<()> {
        self.peeked = None;
        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    fn peek_exists(&mut self) -> io::Result<bool> {
        peek_with_buffer(&mut self.inner, &mut self.peeked)
    }
}

fn peek_with_buffer<R: Read>(inner: &mut R, peeked: &mut Option<u8>) -> io::Result<bool> {
    if peeked.is_some() {
        return Ok(true);
    }
    let mut one = [0u8; 1];
    let n = read_some(inner, &mut one)?;
    if n == 0 {
        return Ok(false);
    }
    *peeked = Some(one[0]);
    Ok(true)
}

fn read_with_peek<R: Read>(
    inner: &mut R,
    peeked: &mut Option<u8>,
    pos: &mut u64,
    buf: &mut [u8],
) -> io::Result<()> {
    if buf.is_empty() {
        return Ok(());
    }
    let mut written = 0;
    if let Some(b) = peeked.take() {
        buf[0] = b;
        written = 1;
        *pos += 1;
    }
    if written < buf.len() {
        inner.read_exact(&mut buf[written..])?;
        *pos += (buf.len() - written) as u64;
    }
    Ok(())
}

/// `Read::read` can return 0 on a non-fatal "try again" for some streams;
/// here we only deal with blocking readers, so a single call suffices.
fn read_some<R: Read>(inner: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    inner.read(buf)
}

/// A stream that is both a [`Sink`] and a [`Source`] with random-access
/// positioning, needed by `FileEngine::open_append` to read the existing
/// tail of a file and then resume writing in place.
pub trait SeekStream: Sink + Source {}
impl<T: Sink + Source> SeekStream for T {}

/// Adapts any `T: Read + Write + Seek` (e.g. `std::fs::File`) into a
/// [`SeekStream`]. A single shared position is used for both reads and
/// writes, matching how a real file descriptor behaves.
pub struct FileStream<T: Read + Write + Seek> {
    inner: T,
    peeked: Option<u8>,
}

impl<T: Read + Write + Seek> FileStream<T> {
    pub fn new(inner: T) -> Self {
        FileStream { inner, peeked: None }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read + Write + Seek> Sink for FileStream<T> {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.peeked = None;
        self.inner.write_all(buf)
    }

    fn tell(&mut self) -> io::Result<u64> {
        self.inner.stream_position()
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn seek_to(&mut self, pos: u64) -> Result<()> {
        self.peeked = None;
        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(())
    }
}

impl<T: Read + Write + Seek> Source for FileStream<T> {
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let mut dummy_pos = 0u64;
        read_with_peek(&mut self.inner, &mut self.peeked, &mut dummy_pos, buf)
    }

    fn tell(&mut self) -> io::Result<u64> {
        let mut pos = self.inner.stream_position()?;
        if self.peeked.is_some() {
            pos -= 1;
        }
        Ok(pos)
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn seek_to(&mut self, pos: u64) -> Result<()> {
        self.peeked = None;
        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    fn peek_exists(&mut self) -> io::Result<bool> {
        peek_with_buffer(&mut self.inner, &mut self.peeked)
    }
}
