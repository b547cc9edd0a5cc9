//! Growable byte buffer with a read cursor, Adler-32 checksum, and zlib
//! deflate/inflate. Backs both the `Frame` envelope and the length-prefixed
//! packing used by block headers, file headers, and the file trailer.

use std::io::{Cursor, Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{ErrorKind, Result};
use crate::xcdf_err;

#[derive(Debug, Clone, Default)]
pub struct FrameBuffer {
    data: Vec<u8>,
    cursor: usize,
}

impl FrameBuffer {
    pub fn new() -> Self {
        FrameBuffer { data: Vec::new(), cursor: 0 }
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        FrameBuffer { data, cursor: 0 }
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn put_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    pub fn put_u32(&mut self, v: u32) {
        self.append(&v.to_le_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.append(&v.to_le_bytes());
    }

    /// Length-prefixed string: `u32` byte count *including* the trailing
    /// NUL, followed by that many bytes, the last of which is 0.
    pub fn put_string(&mut self, s: &str) {
        let bytes = s.as_bytes();
        self.put_u32(bytes.len() as u32 + 1);
        self.append(bytes);
        self.put_u8(0);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.cursor
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    fn read(&mut self, n: usize) -> Result<&[u8]> {
        if self.remaining() < n {
            return Err(xcdf_err!(ErrorKind::CorruptFrame(format!(
                "underflow: wanted {n} bytes, {} remain",
                self.remaining()
            ))));
        }
        let slice = &self.data[self.cursor..self.cursor + n];
        self.cursor += n;
        Ok(slice)
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        Ok(self.read(1)?[0])
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        let b = self.read(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        let b = self.read(8)?;
        let mut a = [0u8; 8];
        a.copy_from_slice(b);
        Ok(u64::from_le_bytes(a))
    }

    pub fn get_string(&mut self) -> Result<String> {
        let total = self.get_u32()? as usize;
        if total == 0 {
            return Err(xcdf_err!(ErrorKind::CorruptFrame("zero-length string record".into())));
        }
        let bytes = self.read(total)?;
        let (body, nul) = bytes.split_at(total - 1);
        if nul != [0] {
            return Err(xcdf_err!(ErrorKind::CorruptFrame("string not NUL-terminated".into())));
        }
        String::from_utf8(body.to_vec())
            .map_err(|e| xcdf_err!(ErrorKind::CorruptFrame(format!("invalid utf8 string: {e}"))))
    }

    /// Adler-32 over the buffer's entire contents (not just the unread
    /// remainder) — matches `XCDFFrameBuffer::CalculateChecksum`.
    pub fn checksum(&self) -> u32 {
        adler32::RollingAdler32::from_buffer(&self.data).hash()
    }

    /// Replace contents with their zlib-deflated form; resets the cursor.
    pub fn deflate(&mut self) -> Result<()> {
        let mut enc = ZlibEncoder::new(Vec::with_capacity(self.data.len()), Compression::default());
        enc.write_all(&self.data)
            .map_err(|e| xcdf_err!(ErrorKind::CorruptFrame(format!("deflate failed: {e}"))))?;
        let out = enc
            .finish()
            .map_err(|e| xcdf_err!(ErrorKind::CorruptFrame(format!("deflate failed: {e}"))))?;
        self.data = out;
        self.cursor = 0;
        Ok(())
    }

    /// Replace contents with their zlib-inflated form; resets the cursor.
    pub fn inflate(&mut self) -> Result<()> {
        let mut dec = ZlibDecoder::new(Cursor::new(&self.data));
        let mut out = Vec::new();
        dec.read_to_end(&mut out)
            .map_err(|e| xcdf_err!(ErrorKind::CorruptFrame(format!("inflate failed: {e}"))))?;
        self.data = out;
        self.cursor = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_round_trips() {
        let mut fb = FrameBuffer::new();
        fb.put_string("hello");
        let s = fb.get_string().unwrap();
        assert_eq!(s, "hello");
    }

    #[test]
    fn deflate_inflate_round_trips() {
        let mut fb = FrameBuffer::new();
        fb.append(b"the quick brown fox jumps over the lazy dog, repeatedly");
        let original = fb.as_slice().to_vec();
        fb.deflate().unwrap();
        assert_ne!(fb.as_slice(), original.as_slice());
        fb.inflate().unwrap();
        assert_eq!(fb.as_slice(), original.as_slice());
    }

    #[test]
    fn underflow_is_corrupt_frame() {
        let mut fb = FrameBuffer::new();
        fb.put_u8(1);
        let err = fb.get_u32().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::CorruptFrame(_)));
    }

    #[test]
    fn checksum_changes_on_single_byte_flip() {
        let mut a = FrameBuffer::new();
        a.append(&[1, 2, 3, 4]);
        let mut b = FrameBuffer::new();
        b.append(&[1, 2, 3, 5]);
        assert_ne!(a.checksum(), b.checksum());
    }
}
