//! Field graph: ordered field descriptors, parent resolution, and the
//! freeze-on-first-use lifecycle (spec.md §3: "frozen after the first record
//! is written or any read occurs").

use std::collections::HashSet;

use crate::error::{ErrorKind, Result};
use crate::schema::alias::AliasDescriptor;
use crate::schema::field::{FieldDescriptor, FieldType};
use crate::xcdf_err;

/// How a field's per-record value count is determined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LengthKind {
    Scalar,
    /// Parent is a root U64 scalar (resolution 1, no parent of its own):
    /// length equals the parent's current value.
    Vector1D(usize),
    /// Parent is itself a vector field: length equals the sum of the
    /// parent's current values (spec.md glossary: "Recursive vector").
    VectorRecursive(usize),
}

#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<FieldDescriptor>,
    aliases: Vec<AliasDescriptor>,
    length_kinds: Vec<LengthKind>,
    frozen: bool,
}

impl Schema {
    pub fn new() -> Self {
        Schema { fields: Vec::new(), aliases: Vec::new(), length_kinds: Vec::new(), frozen: false }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn aliases(&self) -> &[AliasDescriptor] {
        &self.aliases
    }

    pub fn length_kind(&self, index: usize) -> LengthKind {
        self.length_kinds[index]
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn alias_index(&self, name: &str) -> Option<usize> {
        self.aliases.iter().position(|a| a.name == name)
    }

    /// Add a field descriptor. Only legal before the schema is frozen.
    /// Resolves and validates the parent relationship immediately so that
    /// `length_kind` is available without a separate freeze pass.
    pub fn allocate_field(&mut self, desc: FieldDescriptor) -> Result<usize> {
        if self.frozen {
            return Err(xcdf_err!(ErrorKind::SchemaViolation(
                "cannot allocate a field after the schema is frozen".into()
            )));
        }
        if desc.name.is_empty() {
            return Err(xcdf_err!(ErrorKind::SchemaViolation("field name must be non-empty".into())));
        }
        if self.field_index(&desc.name).is_some() {
            return Err(xcdf_err!(ErrorKind::SchemaViolation(format!(
                "duplicate field name \"{}\"",
                desc.name
            ))));
        }

        let length_kind = if !desc.has_parent() {
            LengthKind::Scalar
        } else {
            let parent_idx = self.field_index(&desc.parent_name).ok_or_else(|| {
                xcdf_err!(ErrorKind::SchemaViolation(format!(
                    "parent field \"{}\" not previously declared",
                    desc.parent_name
                )))
            })?;
            let parent = &self.fields[parent_idx];
            if parent.ftype != FieldType::U64 {
                return Err(xcdf_err!(ErrorKind::SchemaViolation(format!(
                    "parent field \"{}\" must be U64",
                    desc.parent_name
                ))));
            }
            if parent.has_parent() {
                LengthKind::VectorRecursive(parent_idx)
            } else {
                if parent.resolution_raw_normalized() != 1 {
                    return Err(xcdf_err!(ErrorKind::SchemaViolation(format!(
                        "root parent field \"{}\" must have resolution 1",
                        desc.parent_name
                    ))));
                }
                LengthKind::Vector1D(parent_idx)
            }
        };

        self.fields.push(desc);
        self.length_kinds.push(length_kind);
        Ok(self.fields.len() - 1)
    }

    pub fn add_alias(&mut self, alias: AliasDescriptor) -> Result<()> {
        if self.alias_index(&alias.name).is_some() || self.field_index(&alias.name).is_some() {
            return Err(xcdf_err!(ErrorKind::SchemaViolation(format!(
                "duplicate alias/field name \"{}\"",
                alias.name
            ))));
        }
        self.aliases.push(alias);
        Ok(())
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Validate that a set of field names (as loaded from a file header)
    /// are unique, used when merging concatenated segments.
    pub fn assert_field_names_unique(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for f in &self.fields {
            if !seen.insert(f.name.as_str()) {
                return Err(xcdf_err!(ErrorKind::SchemaViolation(format!(
                    "duplicate field name \"{}\"",
                    f.name
                ))));
            }
        }
        Ok(())
    }

    /// Byte-for-byte schema equivalence check used when verifying a
    /// concatenated file's second header against the first.
    pub fn schema_equivalent(&self, other: &Schema) -> bool {
        self.fields == other.fields
    }
}

impl Default for Schema {
    fn default() -> Self {
        Schema::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field::Value;

    #[test]
    fn scalar_field_has_scalar_length_kind() {
        let mut s = Schema::new();
        let i = s.allocate_field(FieldDescriptor::scalar("a", FieldType::U64, Value::U64(1))).unwrap();
        assert_eq!(s.length_kind(i), LengthKind::Scalar);
    }

    #[test]
    fn vector_parent_must_be_root_u64_resolution_one() {
        let mut s = Schema::new();
        s.allocate_field(FieldDescriptor::scalar("n", FieldType::U64, Value::U64(2))).unwrap();
        let err = s
            .allocate_field(FieldDescriptor::vector("v", FieldType::I64, Value::I64(1), "n"))
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::SchemaViolation(_)));
    }

    #[test]
    fn recursive_vector_parent_is_itself_a_vector() {
        let mut s = Schema::new();
        s.allocate_field(FieldDescriptor::scalar("n", FieldType::U64, Value::U64(1))).unwrap();
        s.allocate_field(FieldDescriptor::vector("lens", FieldType::U64, Value::U64(1), "n")).unwrap();
        let i = s
            .allocate_field(FieldDescriptor::vector("v", FieldType::I64, Value::I64(1), "lens"))
            .unwrap();
        assert!(matches!(s.length_kind(i), LengthKind::VectorRecursive(_)));
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut s = Schema::new();
        s.allocate_field(FieldDescriptor::scalar("a", FieldType::U64, Value::U64(1))).unwrap();
        let err = s
            .allocate_field(FieldDescriptor::scalar("a", FieldType::U64, Value::U64(1)))
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::SchemaViolation(_)));
    }

    #[test]
    fn cannot_allocate_after_freeze() {
        let mut s = Schema::new();
        s.freeze();
        let err = s
            .allocate_field(FieldDescriptor::scalar("a", FieldType::U64, Value::U64(1)))
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::SchemaViolation(_)));
    }
}
