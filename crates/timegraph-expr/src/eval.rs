//! Closure compiler. Each AST variant lowers to one pure closure
//! `(record) -> value`; evaluation never errors; bad operands and missing
//! members yield `null`.

use std::cmp::Ordering;

use serde_json::{Number, Value};

use crate::ast::{BinaryOp, Expr, LogicalOp, UnaryOp};
use crate::builtins;

type Thunk = Box<dyn Fn(&Value) -> Value + Send + Sync>;

/// A compiled evaluator. Cheap to call repeatedly against many records.
pub struct CompiledExpr {
    thunk: Thunk,
}

impl CompiledExpr {
    pub fn eval(&self, record: &Value) -> Value {
        (self.thunk)(record)
    }

    pub fn eval_bool(&self, record: &Value) -> bool {
        truthy(&self.eval(record))
    }
}

/// Lower an AST into a closure tree.
pub fn compile(expr: &Expr) -> CompiledExpr {
    CompiledExpr { thunk: lower(expr) }
}

fn lower(expr: &Expr) -> Thunk {
    match expr {
        Expr::Literal(v) => {
            let v = v.clone();
            Box::new(move |_| v.clone())
        }
        Expr::Identifier(name) => {
            let name = name.clone();
            Box::new(move |record| record.get(&name).cloned().unwrap_or(Value::Null))
        }
        Expr::Array(items) => {
            let items: Vec<Thunk> = items.iter().map(lower).collect();
            Box::new(move |record| Value::Array(items.iter().map(|t| t(record)).collect()))
        }
        Expr::Member {
            object, property, ..
        } => {
            let object = lower(object);
            let property = lower(property);
            Box::new(move |record| member(&object(record), &property(record)))
        }
        Expr::Call { callee, args } => {
            let callee = callee.clone();
            let args: Vec<Thunk> = args.iter().map(lower).collect();
            Box::new(move |record| {
                let values: Vec<Value> = args.iter().map(|t| t(record)).collect();
                // Unknown call fails closed.
                builtins::call(&callee, &values).unwrap_or(Value::Bool(false))
            })
        }
        Expr::Unary { op, operand } => {
            let op = *op;
            let operand = lower(operand);
            Box::new(move |record| unary(op, &operand(record)))
        }
        Expr::Binary {
            op: BinaryOp::RegexMatch,
            left,
            right,
        } => {
            let left = lower(left);
            // Literal patterns compile once, at expression-compile time.
            if let Expr::Literal(Value::String(pattern)) = right.as_ref() {
                let re = regex::Regex::new(pattern).ok();
                return Box::new(move |record| {
                    let hay = value_to_string(&left(record));
                    Value::Bool(re.as_ref().is_some_and(|re| re.is_match(&hay)))
                });
            }
            let right = lower(right);
            Box::new(move |record| {
                let hay = value_to_string(&left(record));
                let pattern = value_to_string(&right(record));
                Value::Bool(
                    regex::Regex::new(&pattern).is_ok_and(|re| re.is_match(&hay)),
                )
            })
        }
        Expr::Binary {
            op: BinaryOp::GlobMatch,
            left,
            right,
        } => {
            let left = lower(left);
            if let Expr::Literal(Value::String(pattern)) = right.as_ref() {
                let pat = glob::Pattern::new(pattern).ok();
                return Box::new(move |record| {
                    let hay = value_to_string(&left(record));
                    Value::Bool(pat.as_ref().is_some_and(|p| p.matches(&hay)))
                });
            }
            let right = lower(right);
            Box::new(move |record| {
                let hay = value_to_string(&left(record));
                let pattern = value_to_string(&right(record));
                Value::Bool(glob::Pattern::new(&pattern).is_ok_and(|p| p.matches(&hay)))
            })
        }
        Expr::Binary { op, left, right } => {
            let op = *op;
            let left = lower(left);
            let right = lower(right);
            Box::new(move |record| binary(op, &left(record), &right(record)))
        }
        Expr::Logical { op, left, right } => {
            let op = *op;
            let left = lower(left);
            let right = lower(right);
            Box::new(move |record| {
                let l = left(record);
                match op {
                    LogicalOp::And => {
                        if truthy(&l) {
                            right(record)
                        } else {
                            l
                        }
                    }
                    LogicalOp::Or => {
                        if truthy(&l) {
                            l
                        } else {
                            right(record)
                        }
                    }
                }
            })
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            let test = lower(test);
            let consequent = lower(consequent);
            let alternate = lower(alternate);
            Box::new(move |record| {
                if truthy(&test(record)) {
                    consequent(record)
                } else {
                    alternate(record)
                }
            })
        }
    }
}

fn member(object: &Value, property: &Value) -> Value {
    match object {
        Value::Object(map) => {
            let key = match property {
                Value::String(s) => s.clone(),
                other => value_to_string(other),
            };
            map.get(&key).cloned().unwrap_or(Value::Null)
        }
        Value::Array(items) => match to_number(property) {
            Some(n) if n >= 0.0 => items
                .get(n as usize)
                .cloned()
                .unwrap_or(Value::Null),
            _ => Value::Null,
        },
        _ => Value::Null,
    }
}

fn unary(op: UnaryOp, v: &Value) -> Value {
    match op {
        UnaryOp::Not => Value::Bool(!truthy(v)),
        UnaryOp::Neg => to_number(v).map_or(Value::Null, |n| number(-n)),
        UnaryOp::Pos => to_number(v).map_or(Value::Null, number),
        UnaryOp::BitNot => Value::from(!to_int(v)),
    }
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            // String wins, as in the source language.
            if l.is_string() || r.is_string() {
                Value::String(format!("{}{}", value_to_string(l), value_to_string(r)))
            } else {
                numeric(l, r, |a, b| a + b)
            }
        }
        BinaryOp::Sub => numeric(l, r, |a, b| a - b),
        BinaryOp::Mul => numeric(l, r, |a, b| a * b),
        BinaryOp::Div => numeric(l, r, |a, b| a / b),
        BinaryOp::Rem => numeric(l, r, |a, b| a % b),
        BinaryOp::Shl => Value::from(to_int(l).wrapping_shl(to_int(r) as u32)),
        BinaryOp::Shr => Value::from(to_int(l).wrapping_shr(to_int(r) as u32)),
        BinaryOp::BitAnd => Value::from(to_int(l) & to_int(r)),
        BinaryOp::BitXor => Value::from(to_int(l) ^ to_int(r)),
        BinaryOp::BitOr => Value::from(to_int(l) | to_int(r)),
        BinaryOp::Lt => Value::Bool(compare(l, r) == Some(Ordering::Less)),
        BinaryOp::Le => Value::Bool(matches!(
            compare(l, r),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Gt => Value::Bool(compare(l, r) == Some(Ordering::Greater)),
        BinaryOp::Ge => Value::Bool(matches!(
            compare(l, r),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::EqLoose => Value::Bool(loose_eq(l, r)),
        BinaryOp::NeLoose => Value::Bool(!loose_eq(l, r)),
        BinaryOp::EqStrict => Value::Bool(strict_eq(l, r)),
        BinaryOp::NeStrict => Value::Bool(!strict_eq(l, r)),
        // Handled by dedicated lowering arms.
        BinaryOp::RegexMatch | BinaryOp::GlobMatch => Value::Null,
    }
}

fn numeric(l: &Value, r: &Value, f: impl Fn(f64, f64) -> f64) -> Value {
    match (to_number(l), to_number(r)) {
        (Some(a), Some(b)) => number(f(a, b)),
        _ => Value::Null,
    }
}

/// Source-language truthiness: `false`, `0`, `NaN`, `""`, and `null` are
/// falsy; everything else (including empty arrays/objects) is truthy.
pub fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub(crate) fn to_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_int(v: &Value) -> i64 {
    to_number(v).map_or(0, |n| n as i64)
}

pub(crate) fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < (i64::MAX as f64) {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

pub(crate) fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn compare(l: &Value, r: &Value) -> Option<Ordering> {
    if let (Value::String(a), Value::String(b)) = (l, r) {
        return Some(a.cmp(b));
    }
    match (to_number(l), to_number(r)) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => None,
    }
}

/// `==`: equal after the source language's coercions. Numbers, bools, and
/// numeric strings compare numerically; null equals only null.
fn loose_eq(l: &Value, r: &Value) -> bool {
    if strict_eq(l, r) {
        return true;
    }
    match (l, r) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => false,
        _ => match (to_number(l), to_number(r)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

/// `===`: same type, same value.
fn strict_eq(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => l == r,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use serde_json::json;

    fn eval(expr: &str, record: &Value) -> Value {
        compile(&parse(expr).unwrap()).eval(record)
    }

    #[test]
    fn identifier_and_member_access() {
        let rec = json!({"name": "a", "meta": {"rev": "1-x"}, "tags": ["p", "q"]});
        assert_eq!(eval("name", &rec), json!("a"));
        assert_eq!(eval("meta.rev", &rec), json!("1-x"));
        assert_eq!(eval("tags[1]", &rec), json!("q"));
        assert_eq!(eval("missing.deep.path", &rec), Value::Null);
    }

    #[test]
    fn loose_vs_strict_equality() {
        let rec = json!({"n": 1});
        assert_eq!(eval("n == '1'", &rec), json!(true));
        assert_eq!(eval("n === '1'", &rec), json!(false));
        assert_eq!(eval("n === 1", &rec), json!(true));
        assert_eq!(eval("null == 0", &rec), json!(false));
        assert_eq!(eval("true == 1", &rec), json!(true));
    }

    #[test]
    fn arithmetic_and_string_concat() {
        let rec = json!({});
        assert_eq!(eval("1 + 2 * 3", &rec), json!(7));
        assert_eq!(eval("'a' + 1", &rec), json!("a1"));
        assert_eq!(eval("10 % 4", &rec), json!(2));
        assert_eq!(eval("1 << 3", &rec), json!(8));
        assert_eq!(eval("5 & 3", &rec), json!(1));
    }

    #[test]
    fn logical_short_circuit_returns_operands() {
        let rec = json!({"a": 0, "b": "x"});
        assert_eq!(eval("a || b", &rec), json!("x"));
        assert_eq!(eval("b && a", &rec), json!(0));
    }

    #[test]
    fn ternary() {
        let rec = json!({"cost": 5});
        assert_eq!(eval("cost > 3 ? 'high' : 'low'", &rec), json!("high"));
    }

    #[test]
    fn regex_and_glob_operators() {
        let rec = json!({"id": "people/alice"});
        assert_eq!(eval("id =~ '^people/'", &rec), json!(true));
        assert_eq!(eval("id =* 'people/*'", &rec), json!(true));
        assert_eq!(eval("id =* 'pets/*'", &rec), json!(false));
        // Invalid dynamic pattern fails closed.
        assert_eq!(eval("id =~ '('", &rec), json!(false));
    }

    #[test]
    fn unknown_call_fails_closed() {
        let rec = json!({"x": 1});
        assert_eq!(eval("no_such_fn(x)", &rec), json!(false));
    }

    #[test]
    fn builtins_dispatch() {
        let rec = json!({"tags": ["a", "b"], "name": "Ada"});
        assert_eq!(eval("length(tags)", &rec), json!(2));
        assert_eq!(eval("includes(tags, 'b')", &rec), json!(true));
        assert_eq!(eval("lower(name)", &rec), json!("ada"));
        assert_eq!(eval("typeof(tags)", &rec), json!("array"));
    }

    #[test]
    fn evaluation_never_errors() {
        let rec = json!({"s": "abc"});
        assert_eq!(eval("s - 1", &rec), Value::Null);
        assert_eq!(eval("-s", &rec), Value::Null);
        assert_eq!(eval("s[0]", &rec), Value::Null);
    }
}
