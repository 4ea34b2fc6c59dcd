//! Tagged-variant AST. Each node kind lowers to exactly one closure shape in
//! `eval`, so the evaluator is exhaustively checked at compile time.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// Top-level field lookup on the record under evaluation.
    Identifier(String),
    Array(Vec<Expr>),
    Member {
        object: Box<Expr>,
        property: Box<Expr>,
        /// `a[expr]` vs `a.name`.
        computed: bool,
    },
    /// Call into the static builtin registry. Unregistered names evaluate to
    /// `false`, never error.
    Call {
        callee: String,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    /// `==` with source-language coercion.
    EqLoose,
    NeLoose,
    /// `===`: same type and value.
    EqStrict,
    NeStrict,
    BitAnd,
    BitXor,
    BitOr,
    /// `=~`
    RegexMatch,
    /// `=*`
    GlobMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}
