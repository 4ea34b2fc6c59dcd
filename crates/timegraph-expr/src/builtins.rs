//! Static registry of callable names. One explicit `match`, never a
//! reflective lookup, so the set of callables is fixed at compile time.
//! `call` returns `None` for unregistered names; the evaluator maps that to
//! `false`.

use serde_json::Value;

use crate::eval::{number, to_number, value_to_string};

pub fn call(name: &str, args: &[Value]) -> Option<Value> {
    let first = args.first().unwrap_or(&Value::Null);
    Some(match name {
        "length" => match first {
            Value::String(s) => Value::from(s.chars().count()),
            Value::Array(items) => Value::from(items.len()),
            Value::Object(map) => Value::from(map.len()),
            _ => Value::Null,
        },
        "includes" => {
            let needle = args.get(1).unwrap_or(&Value::Null);
            match first {
                Value::Array(items) => Value::Bool(items.contains(needle)),
                Value::String(s) => Value::Bool(s.contains(&value_to_string(needle))),
                _ => Value::Bool(false),
            }
        }
        "startsWith" => Value::Bool(as_str(first).is_some_and(|s| {
            args.get(1)
                .and_then(as_str)
                .is_some_and(|prefix| s.starts_with(prefix))
        })),
        "endsWith" => Value::Bool(as_str(first).is_some_and(|s| {
            args.get(1)
                .and_then(as_str)
                .is_some_and(|suffix| s.ends_with(suffix))
        })),
        "lower" => as_str(first).map_or(Value::Null, |s| Value::String(s.to_lowercase())),
        "upper" => as_str(first).map_or(Value::Null, |s| Value::String(s.to_uppercase())),
        "abs" => to_number(first).map_or(Value::Null, |n| number(n.abs())),
        "floor" => to_number(first).map_or(Value::Null, |n| number(n.floor())),
        "ceil" => to_number(first).map_or(Value::Null, |n| number(n.ceil())),
        "min" => fold_numeric(args, f64::min),
        "max" => fold_numeric(args, f64::max),
        "typeof" => Value::String(
            match first {
                Value::Null => "null",
                Value::Bool(_) => "boolean",
                Value::Number(_) => "number",
                Value::String(_) => "string",
                Value::Array(_) => "array",
                Value::Object(_) => "object",
            }
            .to_string(),
        ),
        _ => return None,
    })
}

fn as_str(v: &Value) -> Option<&str> {
    v.as_str()
}

fn fold_numeric(args: &[Value], f: impl Fn(f64, f64) -> f64) -> Value {
    let mut nums = args.iter().filter_map(to_number);
    match nums.next() {
        Some(seed) => number(nums.fold(seed, f)),
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unregistered_name_is_none() {
        assert!(call("eval", &[json!(1)]).is_none());
    }

    #[test]
    fn min_max_over_args() {
        assert_eq!(call("min", &[json!(3), json!(1), json!(2)]), Some(json!(1)));
        assert_eq!(call("max", &[json!(3), json!(9)]), Some(json!(9)));
        assert_eq!(call("min", &[]), Some(Value::Null));
    }

    #[test]
    fn string_helpers() {
        assert_eq!(
            call("startsWith", &[json!("people/a"), json!("people/")]),
            Some(json!(true))
        );
        assert_eq!(call("length", &[json!("héllo")]), Some(json!(5)));
    }
}
