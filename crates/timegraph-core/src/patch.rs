//! JSON-Patch-style deltas for command edges.
//!
//! `diff` produces the operation list turning one JSON value into another;
//! `apply` replays such a list. Objects are diffed recursively; arrays and
//! scalars are replaced atomically, which keeps patches small, deterministic,
//! and trivially reversible by diffing in the other direction.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{TgResult, TimegraphError};

/// One RFC 6902-style operation. Paths are JSON Pointers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PatchOp {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
}

impl PatchOp {
    pub fn path(&self) -> &str {
        match self {
            PatchOp::Add { path, .. }
            | PatchOp::Remove { path }
            | PatchOp::Replace { path, .. } => path,
        }
    }
}

/// Compute the patch turning `old` into `new`.
pub fn diff(old: &Value, new: &Value) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    diff_at("", old, new, &mut ops);
    ops
}

fn diff_at(path: &str, old: &Value, new: &Value, ops: &mut Vec<PatchOp>) {
    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            for key in old_map.keys() {
                if !new_map.contains_key(key) {
                    ops.push(PatchOp::Remove {
                        path: join(path, key),
                    });
                }
            }
            for (key, new_val) in new_map {
                match old_map.get(key) {
                    None => ops.push(PatchOp::Add {
                        path: join(path, key),
                        value: new_val.clone(),
                    }),
                    Some(old_val) if old_val != new_val => {
                        diff_at(&join(path, key), old_val, new_val, ops);
                    }
                    Some(_) => {}
                }
            }
        }
        _ if old != new => ops.push(PatchOp::Replace {
            path: path.to_string(),
            value: new.clone(),
        }),
        _ => {}
    }
}

/// Apply a patch to a value, returning the result. Fails with `Validation`
/// on a dangling pointer; patches written by the commit engine always apply
/// cleanly to the state they were diffed against.
pub fn apply(base: &Value, ops: &[PatchOp]) -> TgResult<Value> {
    let mut value = base.clone();
    for op in ops {
        apply_one(&mut value, op)?;
    }
    Ok(value)
}

fn apply_one(value: &mut Value, op: &PatchOp) -> TgResult<()> {
    let path = op.path();
    if path.is_empty() {
        // Whole-document operation.
        match op {
            PatchOp::Add { value: v, .. } | PatchOp::Replace { value: v, .. } => {
                *value = v.clone();
            }
            PatchOp::Remove { .. } => *value = Value::Object(Map::new()),
        }
        return Ok(());
    }

    let tokens = parse_pointer(path)?;
    let (last, parents) = tokens.split_last().expect("non-empty pointer");

    let mut cursor = value;
    for token in parents {
        cursor = descend(cursor, token)
            .ok_or_else(|| TimegraphError::Validation(format!("dangling patch path: {path}")))?;
    }

    match (cursor, op) {
        (Value::Object(map), PatchOp::Add { value: v, .. })
        | (Value::Object(map), PatchOp::Replace { value: v, .. }) => {
            map.insert(last.clone(), v.clone());
            Ok(())
        }
        (Value::Object(map), PatchOp::Remove { .. }) => {
            map.remove(last);
            Ok(())
        }
        (Value::Array(items), PatchOp::Replace { value: v, .. }) => {
            let idx: usize = last
                .parse()
                .map_err(|_| TimegraphError::Validation(format!("bad array index in {path}")))?;
            if idx >= items.len() {
                return Err(TimegraphError::Validation(format!(
                    "array index out of range in {path}"
                )));
            }
            items[idx] = v.clone();
            Ok(())
        }
        _ => Err(TimegraphError::Validation(format!(
            "patch target is not a container: {path}"
        ))),
    }
}

fn descend<'a>(value: &'a mut Value, token: &str) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(token),
        Value::Array(items) => token.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
        _ => None,
    }
}

fn join(path: &str, key: &str) -> String {
    format!("{path}/{}", escape(key))
}

fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn unescape(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

fn parse_pointer(path: &str) -> TgResult<Vec<String>> {
    if !path.starts_with('/') {
        return Err(TimegraphError::Validation(format!(
            "patch path must start with '/': {path}"
        )));
    }
    Ok(path[1..].split('/').map(unescape).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn diff_of_identical_values_is_empty() {
        let v = json!({"a": 1, "b": {"c": [1, 2]}});
        assert!(diff(&v, &v).is_empty());
    }

    #[test]
    fn diff_detects_add_remove_replace() {
        let old = json!({"keep": 1, "drop": 2, "change": "x"});
        let new = json!({"keep": 1, "change": "y", "fresh": true});
        let ops = diff(&old, &new);
        assert_eq!(ops.len(), 3);
        assert!(ops.contains(&PatchOp::Remove {
            path: "/drop".into()
        }));
        assert!(ops.contains(&PatchOp::Replace {
            path: "/change".into(),
            value: json!("y")
        }));
        assert!(ops.contains(&PatchOp::Add {
            path: "/fresh".into(),
            value: json!(true)
        }));
    }

    #[test]
    fn diff_recurses_into_nested_objects() {
        let old = json!({"outer": {"inner": 1, "same": 0}});
        let new = json!({"outer": {"inner": 2, "same": 0}});
        let ops = diff(&old, &new);
        assert_eq!(
            ops,
            vec![PatchOp::Replace {
                path: "/outer/inner".into(),
                value: json!(2)
            }]
        );
    }

    #[test]
    fn arrays_are_replaced_atomically() {
        let old = json!({"xs": [1, 2, 3]});
        let new = json!({"xs": [1, 2]});
        let ops = diff(&old, &new);
        assert_eq!(
            ops,
            vec![PatchOp::Replace {
                path: "/xs".into(),
                value: json!([1, 2])
            }]
        );
    }

    #[test]
    fn apply_round_trips_diff() {
        let old = json!({"name": "a", "tags": ["x"], "nested": {"n": 1}});
        let new = json!({"name": "b", "nested": {"n": 2, "m": 3}, "extra": null});
        let ops = diff(&old, &new);
        assert_eq!(apply(&old, &ops).unwrap(), new);

        // And back, via the reverse diff.
        let back = diff(&new, &old);
        assert_eq!(apply(&new, &back).unwrap(), old);
    }

    #[test]
    fn empty_to_value_and_back() {
        let empty = json!({});
        let full = json!({"name": "a", "cost": 5});
        let fwd = diff(&empty, &full);
        assert_eq!(apply(&empty, &fwd).unwrap(), full);
        let rev = diff(&full, &empty);
        assert_eq!(apply(&full, &rev).unwrap(), empty);
    }

    #[test]
    fn pointer_escaping_survives_odd_keys() {
        let old = json!({});
        let new = json!({"a/b": 1, "c~d": 2});
        let ops = diff(&old, &new);
        assert_eq!(apply(&old, &ops).unwrap(), new);
    }

    #[test]
    fn apply_rejects_dangling_paths() {
        let base = json!({"a": 1});
        let op = PatchOp::Replace {
            path: "/missing/deep".into(),
            value: json!(0),
        };
        assert!(apply(&base, &[op]).is_err());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        // Keys deliberately include '/' and '~' so pointer escaping is
        // exercised, not just plain identifiers.
        fn arb_json() -> impl Strategy<Value = Value> {
            let leaf = prop_oneof![
                Just(Value::Null),
                any::<bool>().prop_map(Value::Bool),
                any::<i64>().prop_map(|n| json!(n)),
                "[a-z]{0,8}".prop_map(Value::String),
            ];
            leaf.prop_recursive(3, 24, 4, |inner| {
                prop_oneof![
                    proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                    proptest::collection::btree_map("[a-z~/]{1,6}", inner, 0..4)
                        .prop_map(|m| Value::Object(m.into_iter().collect())),
                ]
            })
        }

        proptest! {
            #[test]
            fn applying_a_diff_reaches_the_target(a in arb_json(), b in arb_json()) {
                let ops = diff(&a, &b);
                prop_assert_eq!(apply(&a, &ops).unwrap(), b);
            }

            #[test]
            fn applying_the_reverse_diff_restores_the_source(a in arb_json(), b in arb_json()) {
                let reverse = diff(&b, &a);
                prop_assert_eq!(apply(&b, &reverse).unwrap(), a);
            }
        }
    }
}
