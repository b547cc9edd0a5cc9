//! Typed AST for the expression engine. Shape and type (and, for vectors,
//! "parent identity") are resolved once against the schema at parse time;
//! only concrete per-record sizes and values are computed lazily at
//! evaluation time (spec.md §4.6).

use crate::schema::FieldType;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    BitAnd,
    BitOr,
    LogAnd,
    LogOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Log,
    Log10,
    Exp,
    Abs,
    Fabs,
    Sqrt,
    Ceil,
    Floor,
    IsNan,
    IsInf,
    Sinh,
    Cosh,
    Tanh,
    Unique,
    Fmod,
    Pow,
    Atan2,
    Rand,
}

impl Func {
    /// Fixed argument count: `None` means nullary (`rand`).
    pub fn arity(self) -> usize {
        match self {
            Func::Rand => 0,
            Func::Fmod | Func::Pow | Func::Atan2 => 2,
            _ => 1,
        }
    }

    pub fn from_name(name: &str) -> Option<Func> {
        Some(match name {
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "asin" => Func::Asin,
            "acos" => Func::Acos,
            "atan" => Func::Atan,
            "log" => Func::Log,
            "log10" => Func::Log10,
            "exp" => Func::Exp,
            "abs" => Func::Abs,
            "fabs" => Func::Fabs,
            "sqrt" => Func::Sqrt,
            "ceil" => Func::Ceil,
            "floor" => Func::Floor,
            "isnan" => Func::IsNan,
            "isinf" => Func::IsInf,
            "sinh" => Func::Sinh,
            "cosh" => Func::Cosh,
            "tanh" => Func::Tanh,
            "unique" => Func::Unique,
            "fmod" => Func::Fmod,
            "pow" => Func::Pow,
            "atan2" => Func::Atan2,
            "rand" => Func::Rand,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    ConstU64(u64),
    ConstI64(i64),
    ConstF64(f64),
    CurrentEventNumber,
    /// Index into the schema's field vector.
    Field(usize),
    /// A single element of a vector field, pulled out by a constant index
    /// (the `v[0]` syntax used in filter expressions). Not in the literal
    /// grammar in spec.md §4.6; treated as sugar on `primary` (DESIGN.md).
    FieldIndex(usize, u64),
    /// A previously-registered alias, inlined as its own parsed subtree so
    /// evaluation never has to re-look-up the schema's alias list.
    Alias(String, Box<Ast>),
    Unary(UnaryOp, Box<Ast>),
    Binary(BinaryOp, Box<Ast>, Box<Ast>),
    Call(Func, Vec<Ast>),
}

/// A type- and shape-checked expression node.
#[derive(Debug, Clone)]
pub struct Ast {
    pub node: Node,
    pub ftype: FieldType,
    /// `None` for scalars; otherwise the name of the field that governs this
    /// node's per-record length (spec.md §4.6 "abstract parent identity").
    pub parent: Option<String>,
}

impl Ast {
    pub fn result_type(&self) -> FieldType {
        self.ftype
    }

    pub fn is_scalar(&self) -> bool {
        self.parent.is_none()
    }
}
