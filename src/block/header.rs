//! Block header: per-block event count plus each field's range statistics.

use crate::error::{ErrorKind, Result};
use crate::frame::FrameBuffer;
use crate::xcdf_err;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldHeader {
    pub raw_active_min: u64,
    pub active_size: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockHeader {
    pub event_count: u32,
    pub field_headers: Vec<FieldHeader>,
}

impl BlockHeader {
    pub fn pack(&self) -> FrameBuffer {
        let mut fb = FrameBuffer::new();
        fb.put_u32(self.event_count);
        fb.put_u32(self.field_headers.len() as u32);
        for fh in &self.field_headers {
            fb.put_u64(fh.raw_active_min);
            fb.put_u8(fh.active_size);
        }
        fb
    }

    pub fn unpack(mut fb: FrameBuffer, expected_fields: usize) -> Result<Self> {
        let event_count = fb.get_u32()?;
        let n = fb.get_u32()? as usize;
        if n != expected_fields {
            return Err(xcdf_err!(ErrorKind::CorruptBlock(format!(
                "block header has {n} field headers, schema has {expected_fields}"
            ))));
        }
        let mut field_headers = Vec::with_capacity(n);
        for _ in 0..n {
            let raw_active_min = fb.get_u64()?;
            let active_size = fb.get_u8()?;
            if active_size > 64 {
                return Err(xcdf_err!(ErrorKind::CorruptBlock(format!(
                    "active_size {active_size} out of range"
                ))));
            }
            field_headers.push(FieldHeader { raw_active_min, active_size });
        }
        Ok(BlockHeader { event_count, field_headers })
    }
}

/// Maps an absolute event number to the byte offset of its block's first
/// frame, enabling O(log n) seek (spec.md §3/§6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockIndexEntry {
    pub next_event_number: u64,
    pub file_ptr: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let h = BlockHeader {
            event_count: 10,
            field_headers: vec![
                FieldHeader { raw_active_min: 5, active_size: 3 },
                FieldHeader { raw_active_min: u64::MAX, active_size: 64 },
            ],
        };
        let fb = h.pack();
        let h2 = BlockHeader::unpack(fb, 2).unwrap();
        assert_eq!(h, h2);
    }

    #[test]
    fn field_count_mismatch_is_corrupt_block() {
        let h = BlockHeader { event_count: 1, field_headers: vec![FieldHeader { raw_active_min: 0, active_size: 0 }] };
        let fb = h.pack();
        let err = BlockHeader::unpack(fb, 2).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::CorruptBlock(_)));
    }
}
