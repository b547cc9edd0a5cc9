//! Public, ergonomic surface over the raw `Vec<Vec<u64>>` record shape used
//! internally by [`crate::file::FileEngine`]: typed field handles, a
//! record-view for name-based access, and the filter/projection helpers
//! that back the CLI driver's `select`/`select-fields` verbs (spec.md §2,
//! "PublicAPI").

use crate::block::Record;
use crate::error::{ErrorKind, Result};
use crate::expr::{self, Ast, EvalContext};
use crate::schema::{from_raw, FieldType, Schema, Value};
use crate::xcdf_err;

/// A resolved reference to one field in a schema: its index, name, and type,
/// so callers don't need to re-look-up a field by name on every record.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldHandle {
    pub index: usize,
    pub name: String,
    pub ftype: FieldType,
}

impl Schema {
    /// Resolve a field by name into a stable [`FieldHandle`].
    pub fn handle(&self, name: &str) -> Option<FieldHandle> {
        let index = self.field_index(name)?;
        let field = &self.fields()[index];
        Some(FieldHandle { index, name: field.name.clone(), ftype: field.ftype })
    }
}

/// Name-based view over one decoded record.
pub struct RecordView<'a> {
    schema: &'a Schema,
    record: &'a Record,
}

impl<'a> RecordView<'a> {
    pub fn new(schema: &'a Schema, record: &'a Record) -> Self {
        RecordView { schema, record }
    }

    pub fn field(&self, name: &str) -> Option<FieldHandle> {
        self.schema.handle(name)
    }

    /// All values for a field handle, decoded to their typed [`Value`].
    pub fn values(&self, handle: &FieldHandle) -> Vec<Value> {
        self.record[handle.index]
            .iter()
            .map(|&raw| from_raw(handle.ftype, raw))
            .collect()
    }

    /// Convenience accessor for a field expected to carry exactly one value.
    pub fn scalar(&self, name: &str) -> Option<Value> {
        let handle = self.field(name)?;
        self.record[handle.index].first().map(|&raw| from_raw(handle.ftype, raw))
    }

    /// Dump every field's current values as `(name, values)` pairs, in
    /// schema-declaration order — the shape the CLI driver's `dump`/`csv`
    /// verbs walk over.
    pub fn visit_fields(&self) -> Vec<(&'a str, Vec<Value>)> {
        self.schema
            .fields()
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let values = self.record[i].iter().map(|&raw| from_raw(f.ftype, raw)).collect();
                (f.name.as_str(), values)
            })
            .collect()
    }
}

/// A compiled boolean predicate over a schema, backing the `select <expr>`
/// CLI verb and any other record-selection use.
pub struct Filter {
    ast: Ast,
}

impl Filter {
    pub fn compile(expression: &str, schema: &Schema) -> Result<Self> {
        let ast = expr::parse(expression, schema)?;
        Ok(Filter { ast })
    }

    /// True if any element of the expression's evaluated result is nonzero
    /// for this record (spec.md §4.6: "filter predicates are satisfied if
    /// any element of the evaluated result is nonzero").
    pub fn matches(&self, schema: &Schema, record: &Record, current_event_number: u64) -> Result<bool> {
        let ctx = EvalContext { schema, record, current_event_number };
        self.ast.evaluate_truth(&ctx)
    }
}

/// A compiled field projection, backing the `select-fields <cols>` CLI verb:
/// picks a subset of fields, in the requested order, out of a record.
pub struct Projection {
    indices: Vec<usize>,
}

impl Projection {
    pub fn compile(schema: &Schema, names: &[String]) -> Result<Self> {
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let idx = schema.field_index(name).ok_or_else(|| {
                xcdf_err!(ErrorKind::SchemaViolation(format!("no such field \"{name}\"")))
            })?;
            indices.push(idx);
        }
        Ok(Projection { indices })
    }

    /// Select this projection's fields out of `record`, preserving the
    /// projection's (not the schema's) order.
    pub fn apply(&self, record: &Record) -> Record {
        self.indices.iter().map(|&i| record[i].clone()).collect()
    }
}
