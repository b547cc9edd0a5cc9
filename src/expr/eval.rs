//! Per-record evaluation: `size()`/`evaluate(i)` over a typed [`Ast`]
//! against a decoded record (spec.md §4.6 "evaluation is lazy").

use std::collections::HashSet;

use crate::block::Record;
use crate::error::{ErrorKind, Result};
use crate::schema::{from_raw, to_raw, FieldType, Schema, Value};
use crate::xcdf_err;

use super::ast::{Ast, BinaryOp, Func, Node, UnaryOp};

/// Everything evaluation needs: the schema (for field types/parents, already
/// baked into the `Ast`, but kept for `FieldIndex` bounds) and the current
/// decoded record plus event number.
pub struct EvalContext<'a> {
    pub schema: &'a Schema,
    pub record: &'a Record,
    pub current_event_number: u64,
}

impl Ast {
    /// Current per-record length of this node's result.
    pub fn size(&self, ctx: &EvalContext) -> Result<usize> {
        match &self.node {
            Node::ConstU64(_)
            | Node::ConstI64(_)
            | Node::ConstF64(_)
            | Node::CurrentEventNumber
            | Node::FieldIndex(_, _) => Ok(1),
            Node::Field(idx) => Ok(ctx.record[*idx].len()),
            Node::Alias(_, inner) => inner.size(ctx),
            Node::Unary(_, inner) => inner.size(ctx),
            Node::Binary(_, lhs, rhs) => binary_size(lhs, rhs, ctx),
            Node::Call(Func::Unique, _) | Node::Call(Func::Rand, _) => Ok(1),
            Node::Call(Func::Fmod, args) | Node::Call(Func::Pow, args) | Node::Call(Func::Atan2, args) => {
                binary_size(&args[0], &args[1], ctx)
            }
            Node::Call(_, args) => args[0].size(ctx),
        }
    }

    /// The i-th value of this node's result for the current record.
    pub fn evaluate(&self, ctx: &EvalContext, i: usize) -> Result<Value> {
        match &self.node {
            Node::ConstU64(v) => Ok(Value::U64(*v)),
            Node::ConstI64(v) => Ok(Value::I64(*v)),
            Node::ConstF64(v) => Ok(Value::F64(*v)),
            Node::CurrentEventNumber => Ok(Value::U64(ctx.current_event_number)),
            Node::Field(idx) => {
                let raw = ctx.record[*idx][i];
                Ok(from_raw(field_type_of(ctx.schema, *idx), raw))
            }
            Node::FieldIndex(idx, k) => {
                let values = &ctx.record[*idx];
                let k = *k as usize;
                if k >= values.len() {
                    return Err(xcdf_err!(ErrorKind::Type(format!(
                        "index {k} out of range for field with {} values",
                        values.len()
                    ))));
                }
                Ok(from_raw(field_type_of(ctx.schema, *idx), values[k]))
            }
            Node::Alias(_, inner) => inner.evaluate(ctx, i),
            Node::Unary(op, inner) => apply_unary(*op, inner.evaluate(ctx, i)?),
            Node::Binary(op @ (BinaryOp::LogAnd | BinaryOp::LogOr), lhs, rhs) => {
                evaluate_short_circuit(*op, lhs, rhs, ctx, i)
            }
            Node::Binary(op, lhs, rhs) => {
                let (a, b) = broadcast_pair(lhs, rhs, ctx, i)?;
                apply_binary(*op, a, b)
            }
            Node::Call(Func::Unique, args) => evaluate_unique(&args[0], ctx),
            Node::Call(Func::Rand, _) => Ok(Value::F64(rand::random::<f64>())),
            Node::Call(Func::Fmod, args) => {
                let (a, b) = broadcast_pair(&args[0], &args[1], ctx, i)?;
                Ok(Value::F64(as_f64(a) % as_f64(b)))
            }
            Node::Call(Func::Pow, args) => {
                let (a, b) = broadcast_pair(&args[0], &args[1], ctx, i)?;
                Ok(Value::F64(as_f64(a).powf(as_f64(b))))
            }
            Node::Call(Func::Atan2, args) => {
                let (a, b) = broadcast_pair(&args[0], &args[1], ctx, i)?;
                Ok(Value::F64(as_f64(a).atan2(as_f64(b))))
            }
            Node::Call(func, args) => apply_unary_func(*func, args[0].evaluate(ctx, i)?),
        }
    }

    /// Filter-predicate semantics: true if any evaluated element is nonzero.
    pub fn evaluate_truth(&self, ctx: &EvalContext) -> Result<bool> {
        let n = self.size(ctx)?;
        for i in 0..n {
            if is_nonzero(self.evaluate(ctx, i)?) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn field_type_of(schema: &Schema, idx: usize) -> FieldType {
    schema.fields()[idx].ftype
}

fn binary_size(lhs: &Ast, rhs: &Ast, ctx: &EvalContext) -> Result<usize> {
    let a = lhs.size(ctx)?;
    let b = rhs.size(ctx)?;
    Ok(if a == 1 && b == 1 {
        1
    } else if a == 1 {
        b
    } else if b == 1 {
        a
    } else {
        a
    })
}

fn broadcast_pair(lhs: &Ast, rhs: &Ast, ctx: &EvalContext, i: usize) -> Result<(Value, Value)> {
    let a_size = lhs.size(ctx)?;
    let b_size = rhs.size(ctx)?;
    let a = lhs.evaluate(ctx, if a_size == 1 { 0 } else { i })?;
    let b = rhs.evaluate(ctx, if b_size == 1 { 0 } else { i })?;
    Ok((a, b))
}

/// `&&`/`||` short-circuit: the right-hand side is only evaluated (and so
/// only allowed to fail, e.g. on an out-of-range `FieldIndex`) once the
/// left-hand side hasn't already decided the result.
fn evaluate_short_circuit(op: BinaryOp, lhs: &Ast, rhs: &Ast, ctx: &EvalContext, i: usize) -> Result<Value> {
    let a_size = lhs.size(ctx)?;
    let a = lhs.evaluate(ctx, if a_size == 1 { 0 } else { i })?;
    let a_truth = is_nonzero(a);
    let decided = match op {
        BinaryOp::LogAnd => !a_truth,
        BinaryOp::LogOr => a_truth,
        _ => unreachable!("caller only passes LogAnd/LogOr"),
    };
    if decided {
        return Ok(Value::U64(a_truth as u64));
    }
    let b_size = rhs.size(ctx)?;
    let b = rhs.evaluate(ctx, if b_size == 1 { 0 } else { i })?;
    Ok(Value::U64(is_nonzero(b) as u64))
}

fn evaluate_unique(arg: &Ast, ctx: &EvalContext) -> Result<Value> {
    let n = arg.size(ctx)?;
    let mut seen = HashSet::new();
    for i in 0..n {
        seen.insert(to_raw(arg.evaluate(ctx, i)?));
    }
    Ok(Value::U64(seen.len() as u64))
}

pub fn as_f64(v: Value) -> f64 {
    match v {
        Value::U64(x) => x as f64,
        Value::I64(x) => x as f64,
        Value::F64(x) => x,
    }
}

pub fn is_nonzero(v: Value) -> bool {
    match v {
        Value::U64(x) => x != 0,
        Value::I64(x) => x != 0,
        Value::F64(x) => x != 0.0,
    }
}

/// Binary-op arithmetic type promotion (spec.md §4.6): F64 wins, else I64,
/// else U64.
pub fn promote(a: FieldType, b: FieldType) -> FieldType {
    if a == FieldType::F64 || b == FieldType::F64 {
        FieldType::F64
    } else if a == FieldType::I64 || b == FieldType::I64 {
        FieldType::I64
    } else {
        FieldType::U64
    }
}

pub fn cast_to(v: Value, t: FieldType) -> Value {
    match (v, t) {
        (Value::U64(x), FieldType::U64) => Value::U64(x),
        (Value::U64(x), FieldType::I64) => Value::I64(x as i64),
        (Value::U64(x), FieldType::F64) => Value::F64(x as f64),
        (Value::I64(x), FieldType::U64) => Value::U64(x as u64),
        (Value::I64(x), FieldType::I64) => Value::I64(x),
        (Value::I64(x), FieldType::F64) => Value::F64(x as f64),
        (Value::F64(x), FieldType::U64) => Value::U64(x as u64),
        (Value::F64(x), FieldType::I64) => Value::I64(x as i64),
        (Value::F64(x), FieldType::F64) => Value::F64(x),
    }
}

fn int_bits(v: Value) -> Result<u64> {
    if let Value::F64(_) = v {
        return Err(xcdf_err!(ErrorKind::Type("bitwise operator applied to F64".into())));
    }
    Ok(to_raw(v))
}

fn apply_unary(op: UnaryOp, v: Value) -> Result<Value> {
    Ok(match op {
        UnaryOp::Not => Value::U64(if is_nonzero(v) { 0 } else { 1 }),
        UnaryOp::BitNot => {
            let bits = int_bits(v)?;
            match v {
                Value::I64(_) => Value::I64(!(bits as i64)),
                _ => Value::U64(!bits),
            }
        }
        UnaryOp::Neg => match v {
            Value::U64(x) => Value::U64(x.wrapping_neg()),
            Value::I64(x) => Value::I64(x.wrapping_neg()),
            Value::F64(x) => Value::F64(-x),
        },
    })
}

fn apply_binary(op: BinaryOp, a: Value, b: Value) -> Result<Value> {
    use BinaryOp::*;
    Ok(match op {
        LogAnd => Value::U64((is_nonzero(a) && is_nonzero(b)) as u64),
        LogOr => Value::U64((is_nonzero(a) || is_nonzero(b)) as u64),
        BitAnd | BitOr => {
            let x = int_bits(a)?;
            let y = int_bits(b)?;
            let raw = if op == BitAnd { x & y } else { x | y };
            let t = promote(a.field_type(), b.field_type());
            cast_to(Value::U64(raw), t)
        }
        Gt | Lt | Ge | Le | Eq | Ne => {
            let ord = compare(a, b);
            let truth = match (op, ord) {
                (Gt, Some(o)) => o == std::cmp::Ordering::Greater,
                (Lt, Some(o)) => o == std::cmp::Ordering::Less,
                (Ge, Some(o)) => o != std::cmp::Ordering::Less,
                (Le, Some(o)) => o != std::cmp::Ordering::Greater,
                (Eq, Some(o)) => o == std::cmp::Ordering::Equal,
                (Eq, None) => false,
                (Ne, Some(o)) => o != std::cmp::Ordering::Equal,
                (Ne, None) => true,
                _ => false,
            };
            Value::U64(truth as u64)
        }
        Mod => {
            let x = as_u64_trunc(a);
            let y = as_u64_trunc(b);
            Value::U64(if y == 0 { 0 } else { x % y })
        }
        Add | Sub | Mul | Div | Pow => {
            let t = promote(a.field_type(), b.field_type());
            let a = cast_to(a, t);
            let b = cast_to(b, t);
            arith(op, a, b, t)
        }
    })
}

fn as_u64_trunc(v: Value) -> u64 {
    match v {
        Value::U64(x) => x,
        Value::I64(x) => x as u64,
        Value::F64(x) => x as u64,
    }
}

fn compare(a: Value, b: Value) -> Option<std::cmp::Ordering> {
    let t = promote(a.field_type(), b.field_type());
    match (cast_to(a, t), cast_to(b, t)) {
        (Value::U64(x), Value::U64(y)) => x.partial_cmp(&y),
        (Value::I64(x), Value::I64(y)) => x.partial_cmp(&y),
        (Value::F64(x), Value::F64(y)) => x.partial_cmp(&y),
        _ => None,
    }
}

fn arith(op: BinaryOp, a: Value, b: Value, t: FieldType) -> Value {
    use BinaryOp::*;
    match (a, b) {
        (Value::U64(x), Value::U64(y)) => Value::U64(match op {
            Add => x.wrapping_add(y),
            Sub => x.wrapping_sub(y),
            Mul => x.wrapping_mul(y),
            Div => {
                if y == 0 {
                    0
                } else {
                    x / y
                }
            }
            Pow => (x as f64).powf(y as f64) as u64,
            _ => unreachable!(),
        }),
        (Value::I64(x), Value::I64(y)) => Value::I64(match op {
            Add => x.wrapping_add(y),
            Sub => x.wrapping_sub(y),
            Mul => x.wrapping_mul(y),
            Div => {
                if y == 0 {
                    0
                } else {
                    x / y
                }
            }
            Pow => (x as f64).powf(y as f64) as i64,
            _ => unreachable!(),
        }),
        (Value::F64(x), Value::F64(y)) => Value::F64(match op {
            Add => x + y,
            Sub => x - y,
            Mul => x * y,
            Div => x / y,
            Pow => x.powf(y),
            _ => unreachable!(),
        }),
        _ => unreachable!("cast_to guarantees matching variants for type {t:?}"),
    }
}

fn apply_unary_func(func: Func, v: Value) -> Result<Value> {
    let x = as_f64(v);
    Ok(match func {
        Func::Sin => Value::F64(x.sin()),
        Func::Cos => Value::F64(x.cos()),
        Func::Tan => Value::F64(x.tan()),
        Func::Asin => Value::F64(x.asin()),
        Func::Acos => Value::F64(x.acos()),
        Func::Atan => Value::F64(x.atan()),
        Func::Log => Value::F64(x.ln()),
        Func::Log10 => Value::F64(x.log10()),
        Func::Exp => Value::F64(x.exp()),
        Func::Sqrt => Value::F64(x.sqrt()),
        Func::Ceil => Value::F64(x.ceil()),
        Func::Floor => Value::F64(x.floor()),
        Func::Sinh => Value::F64(x.sinh()),
        Func::Cosh => Value::F64(x.cosh()),
        Func::Tanh => Value::F64(x.tanh()),
        Func::IsNan => Value::U64(x.is_nan() as u64),
        Func::IsInf => Value::U64(x.is_infinite() as u64),
        Func::Fabs => Value::F64(x.abs()),
        Func::Abs => match v {
            Value::U64(u) => Value::U64(u),
            Value::I64(i) => Value::I64(i.wrapping_abs()),
            Value::F64(f) => Value::F64(f.abs()),
        },
        Func::Unique | Func::Fmod | Func::Pow | Func::Atan2 | Func::Rand => unreachable!("handled by caller"),
    })
}
