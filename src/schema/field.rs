//! Field type tag and descriptor, plus the raw-bit-pattern helpers that let
//! the rest of the crate treat every field's values uniformly as `u64`
//! (the "punning from T to u64" the spec calls for in the block codec).

use std::cmp::Ordering;

/// The three scalar types a field may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    U64,
    I64,
    F64,
}

impl FieldType {
    pub fn wire_tag(self) -> u8 {
        match self {
            FieldType::U64 => 0,
            FieldType::I64 => 1,
            FieldType::F64 => 2,
        }
    }

    pub fn from_wire_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(FieldType::U64),
            1 => Some(FieldType::I64),
            2 => Some(FieldType::F64),
            _ => None,
        }
    }
}

/// A runtime value, carrying its own type tag. Used at the public API
/// boundary; internally every value is stored as the raw `u64` bit pattern
/// produced by [`to_raw`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    U64(u64),
    I64(i64),
    F64(f64),
}

impl Value {
    pub fn field_type(self) -> FieldType {
        match self {
            Value::U64(_) => FieldType::U64,
            Value::I64(_) => FieldType::I64,
            Value::F64(_) => FieldType::F64,
        }
    }
}

/// Reinterpret a typed value as its raw 64-bit pattern.
pub fn to_raw(v: Value) -> u64 {
    match v {
        Value::U64(x) => x,
        Value::I64(x) => x as u64,
        Value::F64(x) => x.to_bits(),
    }
}

/// Reinterpret a raw 64-bit pattern back into a typed value.
pub fn from_raw(ftype: FieldType, raw: u64) -> Value {
    match ftype {
        FieldType::U64 => Value::U64(raw),
        FieldType::I64 => Value::I64(raw as i64),
        FieldType::F64 => Value::F64(f64::from_bits(raw)),
    }
}

/// Type-aware ordering of two raw values. NaN never compares less/greater
/// than anything (mirrors IEEE 754 and keeps NaN out of min/max ratchets).
pub fn raw_cmp(ftype: FieldType, a: u64, b: u64) -> Option<Ordering> {
    match ftype {
        FieldType::U64 => a.partial_cmp(&b),
        FieldType::I64 => (a as i64).partial_cmp(&(b as i64)),
        FieldType::F64 => f64::from_bits(a).partial_cmp(&f64::from_bits(b)),
    }
}

/// A single field in a schema: name, scalar type, declared resolution (as
/// its raw bit pattern — already the value itself for U64/I64, `f64::to_bits`
/// for F64), and an optional parent field name.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub ftype: FieldType,
    pub raw_resolution: u64,
    pub parent_name: String,
}

impl FieldDescriptor {
    pub fn scalar(name: impl Into<String>, ftype: FieldType, resolution: Value) -> Self {
        FieldDescriptor {
            name: name.into(),
            ftype,
            raw_resolution: to_raw(resolution),
            parent_name: String::new(),
        }
    }

    pub fn vector(
        name: impl Into<String>,
        ftype: FieldType,
        resolution: Value,
        parent_name: impl Into<String>,
    ) -> Self {
        FieldDescriptor {
            name: name.into(),
            ftype,
            raw_resolution: to_raw(resolution),
            parent_name: parent_name.into(),
        }
    }

    pub fn has_parent(&self) -> bool {
        !self.parent_name.is_empty()
    }

    /// Normalized resolution, accounting for the "0 means 1" rule on integer
    /// fields (spec.md §3).
    pub fn resolution_raw_normalized(&self) -> u64 {
        match self.ftype {
            FieldType::U64 | FieldType::I64 => {
                if self.raw_resolution == 0 {
                    1
                } else {
                    self.raw_resolution
                }
            }
            FieldType::F64 => self.raw_resolution,
        }
    }

    pub fn resolution_f64(&self) -> f64 {
        f64::from_bits(self.raw_resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_round_trip_all_types() {
        assert_eq!(from_raw(FieldType::U64, to_raw(Value::U64(42))), Value::U64(42));
        assert_eq!(from_raw(FieldType::I64, to_raw(Value::I64(-7))), Value::I64(-7));
        assert_eq!(from_raw(FieldType::F64, to_raw(Value::F64(1.5))), Value::F64(1.5));
    }

    #[test]
    fn nan_never_orders() {
        let nan = f64::NAN.to_bits();
        let one = 1.0f64.to_bits();
        assert_eq!(raw_cmp(FieldType::F64, nan, one), None);
    }

    #[test]
    fn signed_ordering_uses_twos_complement_interpretation() {
        let neg_one = (-1i64) as u64;
        let one = 1i64 as u64;
        assert_eq!(raw_cmp(FieldType::I64, neg_one, one), Some(Ordering::Less));
        assert_eq!(raw_cmp(FieldType::U64, neg_one, one), Some(Ordering::Greater));
    }
}
