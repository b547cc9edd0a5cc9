//! Per-block range computation, zero-alignment, and the bit-packed
//! writer/reader (spec.md §4.4).
//!
//! A block is staged as `records: Vec<Vec<Vec<u64>>>` — outer index is the
//! record, middle index is the field (schema order), inner vector the
//! field's raw values in that record. This keeps the bit-packing loop
//! (record-major, then field, then value) a direct transcription of the
//! spec's step 6, at the cost of holding one `Vec` of staged records in
//! memory between flushes — the same tradeoff the reference implementation
//! makes with its "uncompressed staging block".

use crate::block::bitbuffer::BitBuffer;
use crate::block::header::{BlockHeader, FieldHeader};
use crate::config::Config;
use crate::error::Result;
use crate::schema::{FieldDescriptor, FieldType, LengthKind, Schema};

pub type Record = Vec<Vec<u64>>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldPlan {
    pub active_min: u64,
    pub active_size: u8,
    /// Full 64-bit bit-pattern passthrough: F64 field with resolution ≤ 0,
    /// or any staged value is NaN/±∞ (spec.md §4.4 step 4, extended per
    /// DESIGN.md to also cover ±∞ so invariant 3's "±∞ preserved" holds).
    pub passthrough: bool,
}

struct FieldAccumulator {
    raw_min: u64,
    raw_max: u64,
    set: bool,
    nan_or_inf: bool,
}

impl FieldAccumulator {
    fn new() -> Self {
        FieldAccumulator { raw_min: 0, raw_max: 0, set: false, nan_or_inf: false }
    }

    fn push(&mut self, ftype: FieldType, raw: u64) {
        if ftype == FieldType::F64 {
            let f = f64::from_bits(raw);
            if f.is_nan() || f.is_infinite() {
                self.nan_or_inf = true;
            }
        }
        if !self.set {
            self.raw_min = raw;
            self.raw_max = raw;
            self.set = true;
            return;
        }
        if let Some(std::cmp::Ordering::Less) = crate::schema::raw_cmp(ftype, raw, self.raw_min) {
            self.raw_min = raw;
        }
        if let Some(std::cmp::Ordering::Greater) = crate::schema::raw_cmp(ftype, raw, self.raw_max) {
            self.raw_max = raw;
        }
    }
}

fn bits_for_span(span: u128) -> u8 {
    if span == 0 {
        return 0;
    }
    let mut n: u32 = 0;
    while n < 64 && (1u128 << n) <= span {
        n += 1;
    }
    n.min(64) as u8
}

fn compute_plan(fd: &FieldDescriptor, zero_align: bool, acc: &FieldAccumulator) -> FieldPlan {
    if !acc.set {
        return FieldPlan { active_min: 0, active_size: 0, passthrough: false };
    }
    match fd.ftype {
        FieldType::F64 => {
            let resolution = fd.resolution_f64();
            if resolution <= 0.0 || acc.nan_or_inf {
                return FieldPlan { active_min: 0, active_size: 64, passthrough: true };
            }
            let mut min = f64::from_bits(acc.raw_min);
            let max = f64::from_bits(acc.raw_max);
            if zero_align {
                min = (min / resolution).floor() * resolution;
            }
            let span = ((max - min) / resolution).round();
            let bits = bits_for_span(span.max(0.0) as u128);
            FieldPlan { active_min: min.to_bits(), active_size: bits, passthrough: false }
        }
        FieldType::U64 => {
            let resolution = fd.resolution_raw_normalized();
            let mut min = acc.raw_min;
            if zero_align {
                min = (min / resolution) * resolution;
            }
            let span = (acc.raw_max - min) / resolution;
            FieldPlan { active_min: min, active_size: bits_for_span(span as u128), passthrough: false }
        }
        FieldType::I64 => {
            let resolution = fd.resolution_raw_normalized() as i64;
            let mut min = acc.raw_min as i64;
            if zero_align {
                min = min.div_euclid(resolution) * resolution;
            }
            let max = acc.raw_max as i64;
            let span = (max as i128 - min as i128) / resolution as i128;
            FieldPlan { active_min: min as u64, active_size: bits_for_span(span as u128), passthrough: false }
        }
    }
}

fn quantize(fd: &FieldDescriptor, plan: &FieldPlan, raw: u64) -> u64 {
    if plan.passthrough {
        return raw;
    }
    match fd.ftype {
        FieldType::F64 => {
            let resolution = fd.resolution_f64();
            let min = f64::from_bits(plan.active_min);
            let v = f64::from_bits(raw);
            ((v - min) / resolution).round().max(0.0) as u64
        }
        FieldType::U64 => {
            let resolution = fd.resolution_raw_normalized();
            (raw - plan.active_min) / resolution
        }
        FieldType::I64 => {
            let resolution = fd.resolution_raw_normalized() as i64;
            let min = plan.active_min as i64;
            ((raw as i64 as i128 - min as i128) / resolution as i128) as u64
        }
    }
}

fn dequantize(fd: &FieldDescriptor, plan: &FieldPlan, q: u64) -> u64 {
    if plan.passthrough {
        return q;
    }
    match fd.ftype {
        FieldType::F64 => {
            let resolution = fd.resolution_f64();
            let min = f64::from_bits(plan.active_min);
            (min + (q as f64) * resolution).to_bits()
        }
        FieldType::U64 => {
            let resolution = fd.resolution_raw_normalized();
            plan.active_min + q * resolution
        }
        FieldType::I64 => {
            let resolution = fd.resolution_raw_normalized() as i64;
            let min = plan.active_min as i64;
            (min + (q as i64) * resolution) as u64
        }
    }
}

pub struct BlockCodec;

impl BlockCodec {
    pub fn should_flush(records: &[Record], staged_bytes_estimate: u64, cfg: &Config) -> bool {
        records.len() as u32 >= cfg.block_size || staged_bytes_estimate >= cfg.threshold_byte_count
    }

    pub fn plan_fields(fields: &[FieldDescriptor], records: &[Record], zero_align: bool) -> Vec<FieldPlan> {
        fields
            .iter()
            .enumerate()
            .map(|(fi, fd)| {
                let mut acc = FieldAccumulator::new();
                for rec in records {
                    for v in &rec[fi] {
                        acc.push(fd.ftype, *v);
                    }
                }
                compute_plan(fd, zero_align, &acc)
            })
            .collect()
    }

    pub fn header(plans: &[FieldPlan], event_count: u32) -> BlockHeader {
        BlockHeader {
            event_count,
            field_headers: plans
                .iter()
                .map(|p| FieldHeader { raw_active_min: p.active_min, active_size: p.active_size })
                .collect(),
        }
    }

    pub fn pack_data(fields: &[FieldDescriptor], plans: &[FieldPlan], records: &[Record]) -> Vec<u8> {
        let mut bb = BitBuffer::new();
        for rec in records {
            for (fi, fd) in fields.iter().enumerate() {
                for v in &rec[fi] {
                    let q = quantize(fd, &plans[fi], *v);
                    bb.add(q, plans[fi].active_size);
                }
            }
        }
        bb.finish()
    }

    pub fn unpack_data(
        schema: &Schema,
        plans: &[FieldPlan],
        event_count: u32,
        data: Vec<u8>,
    ) -> Result<Vec<Record>> {
        let fields = schema.fields();
        let mut bb = BitBuffer::from_bytes(data);
        let mut records = Vec::with_capacity(event_count as usize);
        for _ in 0..event_count {
            let mut rec: Record = vec![Vec::new(); fields.len()];
            for (fi, fd) in fields.iter().enumerate() {
                let len = match schema.length_kind(fi) {
                    LengthKind::Scalar => 1,
                    LengthKind::Vector1D(parent) => rec[parent][0] as usize,
                    LengthKind::VectorRecursive(parent) => rec[parent].iter().sum::<u64>() as usize,
                };
                let mut values = Vec::with_capacity(len);
                for _ in 0..len {
                    let q = bb.get(plans[fi].active_size);
                    values.push(dequantize(fd, &plans[fi], q));
                }
                rec[fi] = values;
            }
            records.push(rec);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDescriptor, Value};

    fn schema_ab() -> Schema {
        let mut s = Schema::new();
        s.allocate_field(FieldDescriptor::scalar("a", FieldType::U64, Value::U64(1))).unwrap();
        s.allocate_field(FieldDescriptor::scalar("b", FieldType::F64, Value::F64(0.1))).unwrap();
        s.freeze();
        s
    }

    #[test]
    fn block_round_trip_scalar_fields() {
        let schema = schema_ab();
        let fields = schema.fields().to_vec();
        let records: Vec<Record> = vec![
            vec![vec![2], vec![0.1f64.to_bits()]],
            vec![vec![5], vec![0.35f64.to_bits()]],
        ];
        let plans = BlockCodec::plan_fields(&fields, &records, true);
        let packed = BlockCodec::pack_data(&fields, &plans, &records);
        let back = BlockCodec::unpack_data(&schema, &plans, records.len() as u32, packed).unwrap();
        assert_eq!(back[0][0][0], 2);
        let b0 = f64::from_bits(back[0][1][0]);
        assert!((b0 - 0.1).abs() < 1e-9);
        let b1 = f64::from_bits(back[1][1][0]);
        // 0.35 is not exactly representable; as an f64 it's 0.34999999999999997,
        // whose nearest multiple of the 0.1 resolution is 0.3, not 0.4.
        assert!((b1 - 0.3).abs() < 1e-9);
    }

    #[test]
    fn zero_align_keeps_min_a_multiple_of_resolution() {
        let mut s = Schema::new();
        s.allocate_field(FieldDescriptor::scalar("x", FieldType::I64, Value::I64(3))).unwrap();
        s.freeze();
        let fields = s.fields().to_vec();
        let records: Vec<Record> = vec![vec![vec![(-2i64) as u64]], vec![vec![4i64 as u64]]];
        let plans = BlockCodec::plan_fields(&fields, &records, true);
        let min = plans[0].active_min as i64;
        assert_eq!(min.rem_euclid(3), 0);
    }

    #[test]
    fn nan_forces_passthrough() {
        let mut s = Schema::new();
        s.allocate_field(FieldDescriptor::scalar("x", FieldType::F64, Value::F64(0.1))).unwrap();
        s.freeze();
        let fields = s.fields().to_vec();
        let records: Vec<Record> = vec![vec![vec![1.0f64.to_bits()]], vec![vec![f64::NAN.to_bits()]]];
        let plans = BlockCodec::plan_fields(&fields, &records, true);
        assert!(plans[0].passthrough);
        assert_eq!(plans[0].active_size, 64);
        let packed = BlockCodec::pack_data(&fields, &plans, &records);
        let back = BlockCodec::unpack_data(&s, &plans, 2, packed).unwrap();
        assert!(f64::from_bits(back[1][0][0]).is_nan());
        assert_eq!(f64::from_bits(back[0][0][0]), 1.0);
    }
}
