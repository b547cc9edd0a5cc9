//! Recursive-descent parser implementing the grammar in spec.md §4.6,
//! resolving field/alias/function names against the schema and computing
//! each node's type and vector-parent identity as it goes.

use crate::error::{ErrorKind, Result};
use crate::schema::{FieldType, Schema};
use crate::xcdf_err;

use super::ast::{Ast, BinaryOp, Func, Node, UnaryOp};
use super::token::{tokenize, NumberLiteral, Token};

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    schema: &'a Schema,
    last_index: Option<u64>,
}

/// Parse an infix expression string against `schema`, returning a
/// type-checked [`Ast`]. Top-level comma sequences are only meaningful
/// inside a function call's argument list (spec.md §4.6); a bare top-level
/// expression is a single `logor`-level production.
pub fn parse(expr_str: &str, schema: &Schema) -> Result<Ast> {
    let tokens = tokenize(expr_str)?;
    let mut parser = Parser { tokens, pos: 0, schema, last_index: None };
    let ast = parser.parse_logor()?;
    parser.expect_eof()?;
    Ok(ast)
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn expect_eof(&self) -> Result<()> {
        if *self.peek() == Token::Eof {
            Ok(())
        } else {
            Err(xcdf_err!(ErrorKind::Parse(format!(
                "unexpected trailing token {:?}",
                self.peek()
            ))))
        }
    }

    fn eat(&mut self, tok: &Token) -> Result<()> {
        if self.peek() == tok {
            self.advance();
            Ok(())
        } else {
            Err(xcdf_err!(ErrorKind::Parse(format!(
                "expected {tok:?}, found {:?}",
                self.peek()
            ))))
        }
    }

    // expression := logor ("," logor)*   -- only used inside call args.
    fn parse_logor(&mut self) -> Result<Ast> {
        let mut lhs = self.parse_logand()?;
        while *self.peek() == Token::PipePipe {
            self.advance();
            let rhs = self.parse_logand()?;
            lhs = combine_binary(BinaryOp::LogOr, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn parse_logand(&mut self) -> Result<Ast> {
        let mut lhs = self.parse_bitor()?;
        while *self.peek() == Token::AmpAmp {
            self.advance();
            let rhs = self.parse_bitor()?;
            lhs = combine_binary(BinaryOp::LogAnd, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn parse_bitor(&mut self) -> Result<Ast> {
        let mut lhs = self.parse_bitand()?;
        while *self.peek() == Token::Pipe {
            self.advance();
            let rhs = self.parse_bitand()?;
            lhs = combine_binary(BinaryOp::BitOr, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn parse_bitand(&mut self) -> Result<Ast> {
        let mut lhs = self.parse_equal()?;
        while *self.peek() == Token::Amp {
            self.advance();
            let rhs = self.parse_equal()?;
            lhs = combine_binary(BinaryOp::BitAnd, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn parse_equal(&mut self) -> Result<Ast> {
        let mut lhs = self.parse_compare()?;
        loop {
            let op = match self.peek() {
                Token::EqEq => BinaryOp::Eq,
                Token::Ne => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_compare()?;
            lhs = combine_binary(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn parse_compare(&mut self) -> Result<Ast> {
        let mut lhs = self.parse_addsub()?;
        loop {
            let op = match self.peek() {
                Token::Gt => BinaryOp::Gt,
                Token::Lt => BinaryOp::Lt,
                Token::Ge => BinaryOp::Ge,
                Token::Le => BinaryOp::Le,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_addsub()?;
            lhs = combine_binary(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn parse_addsub(&mut self) -> Result<Ast> {
        let mut lhs = self.parse_mulmod()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_mulmod()?;
            lhs = combine_binary(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn parse_mulmod(&mut self) -> Result<Ast> {
        let mut lhs = self.parse_power()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_power()?;
            lhs = combine_binary(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    // power := unary ( "^" power )?   -- right-associative.
    fn parse_power(&mut self) -> Result<Ast> {
        let lhs = self.parse_unary()?;
        if *self.peek() == Token::Caret {
            self.advance();
            let rhs = self.parse_power()?;
            return combine_binary(BinaryOp::Pow, lhs, rhs);
        }
        Ok(lhs)
    }

    // unary := ("!" | "~" | "-") unary | primary
    //
    // Spec's literal grammar omits a unary-minus production even though its
    // numeric-parsing order names a "decimal signed" tier; folding "-" into
    // `unary` is how that tier is actually reached (DESIGN.md).
    fn parse_unary(&mut self) -> Result<Ast> {
        let op = match self.peek() {
            Token::Bang => Some(UnaryOp::Not),
            Token::Tilde => Some(UnaryOp::BitNot),
            Token::Minus => Some(UnaryOp::Neg),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let inner = self.parse_unary()?;
            let ftype = match op {
                UnaryOp::Not => FieldType::U64,
                UnaryOp::BitNot => {
                    if inner.ftype == FieldType::F64 {
                        return Err(xcdf_err!(ErrorKind::Type("'~' applied to F64".into())));
                    }
                    inner.ftype
                }
                UnaryOp::Neg => inner.ftype,
            };
            let parent = inner.parent.clone();
            return Ok(Ast { node: Node::Unary(op, Box::new(inner)), ftype, parent });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Ast> {
        match self.peek().clone() {
            Token::Number(lit) => {
                self.advance();
                Ok(match lit {
                    NumberLiteral::U64(v) => Ast { node: Node::ConstU64(v), ftype: FieldType::U64, parent: None },
                    NumberLiteral::I64(v) => Ast { node: Node::ConstI64(v), ftype: FieldType::I64, parent: None },
                    NumberLiteral::F64(v) => Ast { node: Node::ConstF64(v), ftype: FieldType::F64, parent: None },
                })
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_logor()?;
                self.eat(&Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) => {
                self.advance();
                self.parse_ident(name)
            }
            other => Err(xcdf_err!(ErrorKind::Parse(format!("unexpected token {other:?}")))),
        }
    }

    fn parse_ident(&mut self, name: String) -> Result<Ast> {
        if name == "currentEventNumber" {
            return Ok(Ast { node: Node::CurrentEventNumber, ftype: FieldType::U64, parent: None });
        }
        if name == "true" {
            return Ok(Ast { node: Node::ConstU64(1), ftype: FieldType::U64, parent: None });
        }
        if name == "false" {
            return Ok(Ast { node: Node::ConstU64(0), ftype: FieldType::U64, parent: None });
        }
        if *self.peek() == Token::LParen {
            if let Some(func) = Func::from_name(&name) {
                return self.parse_call(func);
            }
            return Err(xcdf_err!(ErrorKind::Parse(format!("unknown function \"{name}\""))));
        }
        if let Some(idx) = self.schema.field_index(&name) {
            let field = &self.schema.fields()[idx];
            let ftype = field.ftype;
            let parent = if field.has_parent() { Some(field.name.clone()) } else { None };
            if self.try_eat_bracket_index()? {
                let k = self.last_index.take().unwrap();
                return Ok(Ast { node: Node::FieldIndex(idx, k), ftype, parent: None });
            }
            return Ok(Ast { node: Node::Field(idx), ftype, parent });
        }
        if let Some(ai) = self.schema.alias_index(&name) {
            let alias = &self.schema.aliases()[ai];
            let inner = parse(&alias.expression, self.schema)?;
            let ftype = inner.ftype;
            let parent = inner.parent.clone();
            return Ok(Ast { node: Node::Alias(name, Box::new(inner)), ftype, parent });
        }
        Err(xcdf_err!(ErrorKind::Parse(format!("unknown identifier \"{name}\""))))
    }

    /// Parses an optional `"[" <uint literal> "]"` suffix after a field
    /// name. Returns whether one was present, stashing the index in
    /// `self.last_index` (a poor-man's multi-return to keep `parse_ident`'s
    /// control flow linear).
    fn try_eat_bracket_index(&mut self) -> Result<bool> {
        if *self.peek() != Token::LBracket {
            return Ok(false);
        }
        self.advance();
        let k = match self.advance() {
            Token::Number(NumberLiteral::U64(v)) => v,
            other => {
                return Err(xcdf_err!(ErrorKind::Parse(format!(
                    "expected an unsigned integer index, found {other:?}"
                ))))
            }
        };
        self.eat(&Token::RBracket)?;
        self.last_index = Some(k);
        Ok(true)
    }

    fn parse_call(&mut self, func: Func) -> Result<Ast> {
        self.eat(&Token::LParen)?;
        let mut args = Vec::new();
        if *self.peek() != Token::RParen {
            args.push(self.parse_logor()?);
            while *self.peek() == Token::Comma {
                self.advance();
                args.push(self.parse_logor()?);
            }
        }
        self.eat(&Token::RParen)?;
        if args.len() != func.arity() {
            return Err(xcdf_err!(ErrorKind::Parse(format!(
                "function expects {} argument(s), got {}",
                func.arity(),
                args.len()
            ))));
        }
        let (ftype, parent) = match func {
            Func::Fmod | Func::Pow | Func::Atan2 => {
                let (_, parent) = combine_parent(&args[0], &args[1])?;
                (FieldType::F64, parent)
            }
            Func::IsNan | Func::IsInf | Func::Unique => (FieldType::U64, if func == Func::Unique { None } else { args[0].parent.clone() }),
            Func::Rand => (FieldType::F64, None),
            Func::Abs => (args[0].ftype, args[0].parent.clone()),
            _ => (FieldType::F64, args[0].parent.clone()),
        };
        Ok(Ast { node: Node::Call(func, args), ftype, parent })
    }
}

/// Resolves the result type and vector-parent identity of a binary node per
/// spec.md §4.6's SCALAR/SCALAR_FIRST/SCALAR_SECOND/VECTOR_VECTOR rules.
fn combine_binary(op: BinaryOp, lhs: Ast, rhs: Ast) -> Result<Ast> {
    let (_, parent) = combine_parent(&lhs, &rhs)?;
    let ftype = match op {
        BinaryOp::Mod => FieldType::U64,
        BinaryOp::Gt | BinaryOp::Lt | BinaryOp::Ge | BinaryOp::Le | BinaryOp::Eq | BinaryOp::Ne => FieldType::U64,
        BinaryOp::LogAnd | BinaryOp::LogOr => FieldType::U64,
        BinaryOp::BitAnd | BinaryOp::BitOr => {
            if lhs.ftype == FieldType::F64 || rhs.ftype == FieldType::F64 {
                return Err(xcdf_err!(ErrorKind::Type(
                    "bitwise operator requires integer operands".into()
                )));
            }
            super::eval::promote(lhs.ftype, rhs.ftype)
        }
        _ => super::eval::promote(lhs.ftype, rhs.ftype),
    };
    Ok(Ast { node: Node::Binary(op, Box::new(lhs), Box::new(rhs)), ftype, parent })
}

fn combine_parent(lhs: &Ast, rhs: &Ast) -> Result<(usize, Option<String>)> {
    match (&lhs.parent, &rhs.parent) {
        (None, None) => Ok((1, None)),
        (None, Some(p)) => Ok((1, Some(p.clone()))),
        (Some(p), None) => Ok((1, Some(p.clone()))),
        (Some(a), Some(b)) => {
            if a == b {
                Ok((1, Some(a.clone())))
            } else {
                Err(xcdf_err!(ErrorKind::IncompatibleVectors {
                    lhs_parent: a.clone(),
                    rhs_parent: b.clone(),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDescriptor, Value};

    fn demo_schema() -> Schema {
        let mut s = Schema::new();
        s.allocate_field(FieldDescriptor::scalar("n", FieldType::U64, Value::U64(1))).unwrap();
        s.allocate_field(FieldDescriptor::vector("v", FieldType::I64, Value::I64(1), "n")).unwrap();
        s
    }

    #[test]
    fn parses_filter_expression_from_scenario_s6() {
        let schema = demo_schema();
        let ast = parse("n > 0 && v[0] == 0", &schema).unwrap();
        assert_eq!(ast.result_type(), FieldType::U64);
        assert!(ast.is_scalar());
    }

    #[test]
    fn mismatched_vector_parents_rejected() {
        let mut s = Schema::new();
        s.allocate_field(FieldDescriptor::scalar("n1", FieldType::U64, Value::U64(1))).unwrap();
        s.allocate_field(FieldDescriptor::scalar("n2", FieldType::U64, Value::U64(1))).unwrap();
        s.allocate_field(FieldDescriptor::vector("a", FieldType::U64, Value::U64(1), "n1")).unwrap();
        s.allocate_field(FieldDescriptor::vector("b", FieldType::U64, Value::U64(1), "n2")).unwrap();
        let err = parse("a + b", &s).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::IncompatibleVectors { .. }));
    }

    #[test]
    fn bitwise_on_float_is_a_type_error() {
        let mut s = Schema::new();
        s.allocate_field(FieldDescriptor::scalar("x", FieldType::F64, Value::F64(0.0))).unwrap();
        let err = parse("x & 1", &s).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Type(_)));
    }

    #[test]
    fn unknown_identifier_is_a_parse_error() {
        let s = demo_schema();
        let err = parse("nope + 1", &s).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Parse(_)));
    }
}
