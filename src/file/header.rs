//! File header: format version, trailer pointer, field descriptors, and
//! (v≥3) alias descriptors (spec.md §6).

use crate::error::Result;
use crate::frame::FrameBuffer;
use crate::schema::{AliasDescriptor, FieldDescriptor, FieldType};

#[derive(Debug, Clone, PartialEq)]
pub struct FileHeader {
    pub version: u32,
    pub file_trailer_ptr: u64,
    pub fields: Vec<FieldDescriptor>,
    pub aliases: Vec<AliasDescriptor>,
}

impl FileHeader {
    pub fn pack(&self) -> FrameBuffer {
        let mut fb = FrameBuffer::new();
        fb.put_u32(self.version);
        fb.put_u64(self.file_trailer_ptr);
        fb.put_u32(self.fields.len() as u32);
        for f in &self.fields {
            fb.put_string(&f.name);
            fb.put_u8(f.ftype.wire_tag());
            fb.put_u64(f.raw_resolution);
            fb.put_string(&f.parent_name);
        }
        if self.version >= 3 {
            fb.put_u32(self.aliases.len() as u32);
            for a in &self.aliases {
                fb.put_string(&a.name);
                fb.put_string(&a.expression);
                fb.put_u8(a.ftype.wire_tag());
            }
        }
        fb
    }

    pub fn unpack(mut fb: FrameBuffer) -> Result<Self> {
        let version = fb.get_u32()?;
        let file_trailer_ptr = fb.get_u64()?;
        let n_fields = fb.get_u32()? as usize;
        let mut fields = Vec::with_capacity(n_fields);
        for _ in 0..n_fields {
            let name = fb.get_string()?;
            let tag = fb.get_u8()?;
            let ftype = field_type_from_tag(tag)?;
            let raw_resolution = fb.get_u64()?;
            let parent_name = fb.get_string()?;
            fields.push(FieldDescriptor { name, ftype, raw_resolution, parent_name });
        }
        let mut aliases = Vec::new();
        if version >= 3 && fb.remaining() > 0 {
            let n_aliases = fb.get_u32()? as usize;
            for _ in 0..n_aliases {
                let name = fb.get_string()?;
                let expression = fb.get_string()?;
                let tag = fb.get_u8()?;
                let ftype = field_type_from_tag(tag)?;
                aliases.push(AliasDescriptor { name, expression, ftype });
            }
        }
        Ok(FileHeader { version, file_trailer_ptr, fields, aliases })
    }
}

fn field_type_from_tag(tag: u8) -> Result<FieldType> {
    FieldType::from_wire_tag(tag).ok_or_else(|| {
        crate::xcdf_err!(crate::error::ErrorKind::CorruptFrame(format!("unknown field type tag {tag}")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Value;

    #[test]
    fn header_round_trips_with_aliases() {
        let h = FileHeader {
            version: 3,
            file_trailer_ptr: 0,
            fields: vec![
                FieldDescriptor::scalar("a", FieldType::U64, Value::U64(1)),
                FieldDescriptor::vector("v", FieldType::I64, Value::I64(2), "a"),
            ],
            aliases: vec![AliasDescriptor::new("alias1", "a + v", FieldType::I64)],
        };
        let fb = h.pack();
        let h2 = FileHeader::unpack(fb).unwrap();
        assert_eq!(h, h2);
    }

    #[test]
    fn v1_header_has_no_alias_section() {
        let h = FileHeader {
            version: 1,
            file_trailer_ptr: 0,
            fields: vec![FieldDescriptor::scalar("a", FieldType::U64, Value::U64(1))],
            aliases: vec![],
        };
        let fb = h.pack();
        let h2 = FileHeader::unpack(fb).unwrap();
        assert_eq!(h2.aliases.len(), 0);
    }
}
