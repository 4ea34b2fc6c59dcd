//! # timegraph-expr
//!
//! The small boolean/value DSL used as a filter by every read path. An
//! expression is parsed once into a tagged AST, lowered to a closure tree,
//! and then evaluated against JSON records. Compiled evaluators never fail
//! at runtime: missing members resolve to `null`, which is falsy.

mod ast;
mod builtins;
mod error;
mod eval;
mod parser;
mod token;

pub use ast::{BinaryOp, Expr, LogicalOp, UnaryOp};
pub use error::ExprError;
pub use eval::{compile, truthy, CompiledExpr};
pub use parser::parse;

use serde_json::Value;

/// Keep the records for which `expr` evaluates truthy, preserving input
/// order. Parses and compiles the expression once.
pub fn filter(records: Vec<Value>, expr: &str) -> Result<Vec<Value>, ExprError> {
    let compiled = compile(&parse(expr)?);
    Ok(records
        .into_iter()
        .filter(|record| compiled.eval_bool(record))
        .collect())
}
