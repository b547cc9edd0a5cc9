//! The on-wire envelope: `{type, size, checksum[, inner_type]}` plus payload,
//! with optional zlib deflation. `to_le_bytes`/`from_le_bytes` make the
//! little-endian-on-wire requirement hold regardless of host byte order, so
//! there is no separate big-endian-host code path to maintain (see
//! DESIGN.md, "endian handling").

use crate::error::{ErrorKind, Result};
use crate::frame::buffer::FrameBuffer;
use crate::frame::types::{is_valid_frame_type, XCDF_DEFLATED};
use crate::io::{Sink, Source};
use crate::xcdf_err;

pub struct Frame {
    pub frame_type: u32,
    pub payload: FrameBuffer,
}

impl Frame {
    pub fn new(frame_type: u32, payload: FrameBuffer) -> Self {
        Frame { frame_type, payload }
    }

    pub fn write<S: Sink + ?Sized>(&self, sink: &mut S, deflate: bool) -> Result<()> {
        let raw = self.payload.as_slice();
        let checksum = self.payload.checksum();
        if deflate {
            let mut fb = FrameBuffer::from_bytes(raw.to_vec());
            fb.deflate()?;
            let deflated = fb.into_bytes();
            sink.write_all(&XCDF_DEFLATED.to_le_bytes())?;
            sink.write_all(&(deflated.len() as u32).to_le_bytes())?;
            sink.write_all(&checksum.to_le_bytes())?;
            sink.write_all(&self.frame_type.to_le_bytes())?;
            sink.write_all(&deflated)?;
        } else {
            sink.write_all(&self.frame_type.to_le_bytes())?;
            sink.write_all(&(raw.len() as u32).to_le_bytes())?;
            sink.write_all(&checksum.to_le_bytes())?;
            sink.write_all(raw)?;
        }
        Ok(())
    }

    pub fn read<S: Source + ?Sized>(source: &mut S) -> Result<Self> {
        let outer_type = read_u32(source)?;
        let size = read_u32(source)?;
        let checksum = read_u32(source)?;

        let (frame_type, payload_bytes) = if outer_type == XCDF_DEFLATED {
            let inner_type = read_u32(source)?;
            let mut buf = vec![0u8; size as usize];
            source.read_exact(&mut buf)?;
            let mut fb = FrameBuffer::from_bytes(buf);
            fb.inflate()
                .map_err(|_| xcdf_err!(ErrorKind::CorruptFrame("bad zlib stream".into())))?;
            (inner_type, fb.into_bytes())
        } else {
            if !is_valid_frame_type(outer_type) {
                return Err(xcdf_err!(ErrorKind::CorruptFrame(format!(
                    "unknown frame type {outer_type:#010x}"
                ))));
            }
            let mut buf = vec![0u8; size as usize];
            source.read_exact(&mut buf)?;
            (outer_type, buf)
        };

        if !is_valid_frame_type(frame_type) {
            return Err(xcdf_err!(ErrorKind::CorruptFrame(format!(
                "unknown inner frame type {frame_type:#010x}"
            ))));
        }

        let actual = FrameBuffer::from_bytes(payload_bytes.clone()).checksum();
        if actual != checksum {
            return Err(xcdf_err!(ErrorKind::ChecksumMismatch { expected: checksum, actual }));
        }

        Ok(Frame { frame_type, payload: FrameBuffer::from_bytes(payload_bytes) })
    }

    pub fn peek_next_exists<S: Source + ?Sized>(source: &mut S) -> Result<bool> {
        Ok(source.peek_exists()?)
    }
}

fn read_u32<S: Source + ?Sized>(source: &mut S) -> Result<u32> {
    let mut b = [0u8; 4];
    source.read_exact(&mut b)?;
    Ok(u32::from_le_bytes(b))
}
