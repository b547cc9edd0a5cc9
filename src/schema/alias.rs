//! Named expressions stored alongside the schema, evaluated at read time.

use crate::schema::field::FieldType;

#[derive(Debug, Clone, PartialEq)]
pub struct AliasDescriptor {
    pub name: String,
    pub expression: String,
    pub ftype: FieldType,
}

impl AliasDescriptor {
    pub fn new(name: impl Into<String>, expression: impl Into<String>, ftype: FieldType) -> Self {
        AliasDescriptor { name: name.into(), expression: expression.into(), ftype }
    }
}
