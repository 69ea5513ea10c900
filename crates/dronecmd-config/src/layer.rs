//! JSON layering helpers.
//!
//! The file layer is checked key by key against the defaults: a key whose
//! JSON type disagrees with its default is dropped (with a warning) and the
//! default stays in effect. Value-level checks happen in the manager.

use serde_json::{Map, Value};

/// Keep only the keys of `file` that exist in `defaults` with a compatible type
pub fn type_checked(defaults: &Value, file: &Value, warnings: &mut Vec<String>) -> Value {
    check_object(defaults, file, "", warnings)
}

fn check_object(defaults: &Value, file: &Value, prefix: &str, warnings: &mut Vec<String>) -> Value {
    let (Some(defaults), Some(file)) = (defaults.as_object(), file.as_object()) else {
        return Value::Object(Map::new());
    };

    let mut out = Map::new();
    for (key, value) in file {
        let path = join(prefix, key);
        let Some(default) = defaults.get(key) else {
            warnings.push(format!("unknown key '{}' ignored", path));
            continue;
        };

        if default.is_object() {
            if value.is_object() {
                out.insert(key.clone(), check_object(default, value, &path, warnings));
            } else {
                warnings.push(format!("'{}' must be an object, default kept", path));
            }
        } else if compatible(default, value) {
            out.insert(key.clone(), value.clone());
        } else {
            warnings.push(format!(
                "'{}' has type {} but {} is expected, default kept",
                path,
                type_name(value),
                type_name(default)
            ));
        }
    }
    Value::Object(out)
}

fn compatible(default: &Value, value: &Value) -> bool {
    match (default, value) {
        // Optional fields default to null and accept a string
        (Value::Null, Value::Null | Value::String(_)) => true,
        (Value::Number(_), Value::Number(_)) => true,
        (Value::String(_), Value::String(_)) => true,
        (Value::Bool(_), Value::Bool(_)) => true,
        (Value::Array(_), Value::Array(_)) => true,
        _ => false,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Leaf paths of an object tree with their values, in key order
pub fn leaves(value: &Value) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    collect_leaves(value, "", &mut out);
    out
}

fn collect_leaves(value: &Value, prefix: &str, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                collect_leaves(child, &join(prefix, key), out);
            }
        }
        leaf if !prefix.is_empty() => out.push((prefix.to_string(), leaf.clone())),
        _ => {}
    }
}

/// Deep merge `overlay` onto `base`
pub fn merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge(existing, value)
                    }
                    _ => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Value at a dot path, e.g. `limits.movement.maxDistance`
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |node, key| node.get(key))
}

/// Set a value at a dot path, creating intermediate objects
pub fn set_path(value: &mut Value, path: &str, new_value: Value) {
    let mut node = value;
    let mut keys = path.split('.').peekable();
    while let Some(key) = keys.next() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            return;
        };
        if keys.peek().is_none() {
            map.insert(key.to_string(), new_value);
            return;
        }
        node = map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// Leaf paths whose values differ between two records
pub fn changed_keys(old: &Value, new: &Value) -> Vec<String> {
    let mut keys = Vec::new();
    diff(old, new, "", &mut keys);
    keys.sort();
    keys
}

fn diff(old: &Value, new: &Value, prefix: &str, out: &mut Vec<String>) {
    match (old, new) {
        (Value::Object(a), Value::Object(b)) => {
            for (key, va) in a {
                let path = join(prefix, key);
                match b.get(key) {
                    Some(vb) => diff(va, vb, &path, out),
                    None => out.push(path),
                }
            }
            for key in b.keys().filter(|k| !a.contains_key(*k)) {
                out.push(join(prefix, key));
            }
        }
        (a, b) if a != b => out.push(prefix.to_string()),
        _ => {}
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_checked_drops_mismatches() {
        let defaults = json!({"server": {"port": 8080, "host": "0.0.0.0"}, "security": {"apiKey": null}});
        let file = json!({
            "server": {"port": "eighty", "host": "127.0.0.1"},
            "security": {"apiKey": "k"},
            "bogus": 1
        });
        let mut warnings = Vec::new();
        let layer = type_checked(&defaults, &file, &mut warnings);

        assert_eq!(layer, json!({"server": {"host": "127.0.0.1"}, "security": {"apiKey": "k"}}));
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().any(|w| w.contains("server.port")));
    }

    #[test]
    fn test_merge_and_paths() {
        let mut base = json!({"drone": {"maxDrones": 5, "defaultSpeed": 50}});
        merge(&mut base, &json!({"drone": {"maxDrones": 10}}));
        assert_eq!(get_path(&base, "drone.maxDrones"), Some(&json!(10)));
        assert_eq!(get_path(&base, "drone.defaultSpeed"), Some(&json!(50)));
        assert_eq!(get_path(&base, "drone.missing"), None);

        set_path(&mut base, "retry.attempts", json!(4));
        assert_eq!(base["retry"]["attempts"], 4);
    }

    #[test]
    fn test_leaves() {
        let value = json!({"retry": {"attempts": 3, "backoff": "fixed"}, "security": {"apiKey": null}, "empty": {}});
        let paths: Vec<String> = leaves(&value).into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["retry.attempts", "retry.backoff", "security.apiKey"]);
    }

    #[test]
    fn test_changed_keys() {
        let old = json!({"drone": {"maxDrones": 5, "defaultSpeed": 50}, "logging": {"level": "info"}});
        let new = json!({"drone": {"maxDrones": 10, "defaultSpeed": 50}, "logging": {"level": "debug"}});
        assert_eq!(changed_keys(&old, &new), vec!["drone.maxDrones", "logging.level"]);
    }
}
