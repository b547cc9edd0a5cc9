//! File trailer: total event count, block index, comments, (v≥3) per-field
//! globals and aliases (spec.md §6).

use crate::block::BlockIndexEntry;
use crate::error::Result;
use crate::frame::FrameBuffer;
use crate::schema::{AliasDescriptor, FieldType};
use crate::store::FieldGlobals;

#[derive(Debug, Clone, PartialEq)]
pub struct FileTrailer {
    pub total_event_count: u64,
    pub block_entries: Vec<BlockIndexEntry>,
    pub comments: Vec<String>,
    pub globals: Vec<FieldGlobals>,
    pub aliases: Vec<AliasDescriptor>,
}

impl FileTrailer {
    pub fn new() -> Self {
        FileTrailer {
            total_event_count: 0,
            block_entries: Vec::new(),
            comments: Vec::new(),
            globals: Vec::new(),
            aliases: Vec::new(),
        }
    }

    pub fn pack(&self, version: u32) -> FrameBuffer {
        let mut fb = FrameBuffer::new();
        fb.put_u64(self.total_event_count);
        fb.put_u32(self.block_entries.len() as u32);
        for e in &self.block_entries {
            fb.put_u64(e.next_event_number);
            fb.put_u64(e.file_ptr);
        }
        fb.put_u32(self.comments.len() as u32);
        for c in &self.comments {
            fb.put_string(c);
        }
        if version >= 3 {
            fb.put_u32(self.globals.len() as u32);
            for g in &self.globals {
                fb.put_u64(g.raw_global_max);
                fb.put_u64(g.raw_global_min);
                fb.put_u64(g.total_bytes_written);
                fb.put_u8(if g.set { 1 } else { 0 });
            }
            fb.put_u32(self.aliases.len() as u32);
            for a in &self.aliases {
                fb.put_string(&a.name);
                fb.put_string(&a.expression);
                fb.put_u8(a.ftype.wire_tag());
            }
        }
        fb
    }

    pub fn unpack(mut fb: FrameBuffer, version: u32) -> Result<Self> {
        let total_event_count = fb.get_u64()?;
        let n_entries = fb.get_u32()? as usize;
        let mut block_entries = Vec::with_capacity(n_entries);
        for _ in 0..n_entries {
            let next_event_number = fb.get_u64()?;
            let file_ptr = fb.get_u64()?;
            block_entries.push(BlockIndexEntry { next_event_number, file_ptr });
        }
        let n_comments = fb.get_u32()? as usize;
        let mut comments = Vec::with_capacity(n_comments);
        for _ in 0..n_comments {
            comments.push(fb.get_string()?);
        }
        let mut globals = Vec::new();
        let mut aliases = Vec::new();
        if version >= 3 {
            let n_globals = fb.get_u32()? as usize;
            for _ in 0..n_globals {
                let raw_global_max = fb.get_u64()?;
                let raw_global_min = fb.get_u64()?;
                let total_bytes_written = fb.get_u64()?;
                let set = fb.get_u8()? != 0;
                globals.push(FieldGlobals { raw_global_min, raw_global_max, total_bytes_written, set });
            }
            let n_aliases = fb.get_u32()? as usize;
            for _ in 0..n_aliases {
                let name = fb.get_string()?;
                let expression = fb.get_string()?;
                let tag = fb.get_u8()?;
                let ftype = FieldType::from_wire_tag(tag).ok_or_else(|| {
                    crate::xcdf_err!(crate::error::ErrorKind::CorruptFrame(format!(
                        "unknown field type tag {tag}"
                    )))
                })?;
                aliases.push(AliasDescriptor { name, expression, ftype });
            }
        }
        Ok(FileTrailer { total_event_count, block_entries, comments, globals, aliases })
    }
}

impl Default for FileTrailer {
    fn default() -> Self {
        FileTrailer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailer_round_trips_v3() {
        let mut t = FileTrailer::new();
        t.total_event_count = 10;
        t.block_entries.push(BlockIndexEntry { next_event_number: 0, file_ptr: 16 });
        t.comments.push("hello".into());
        let mut g = FieldGlobals::new();
        g.observe(FieldType::U64, 5);
        t.globals.push(g);
        let fb = t.pack(3);
        let t2 = FileTrailer::unpack(fb, 3).unwrap();
        assert_eq!(t, t2);
    }

    #[test]
    fn trailer_v1_has_no_globals_or_alias_section() {
        let mut t = FileTrailer::new();
        t.total_event_count = 1;
        let fb = t.pack(1);
        let t2 = FileTrailer::unpack(fb, 1).unwrap();
        assert_eq!(t2.globals.len(), 0);
        assert_eq!(t2.aliases.len(), 0);
    }
}
