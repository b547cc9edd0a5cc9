//! Schema: field descriptors, parent graph, alias descriptors.

pub mod alias;
pub mod field;
pub mod schema;

pub use alias::AliasDescriptor;
pub use field::{from_raw, raw_cmp, to_raw, FieldDescriptor, FieldType, Value};
pub use schema::{LengthKind, Schema};
