//! Secret masking for logged or exposed configuration.

use serde_json::{Map, Value};

pub const MASK: &str = "***";

const SECRET_MARKERS: [&str; 5] = ["secret", "password", "token", "apikey", "credential"];

fn is_secret_key(key: &str) -> bool {
    let key = key.to_lowercase().replace(['_', '-'], "");
    SECRET_MARKERS.iter().any(|m| key.contains(m))
}

/// Copy of `value` with non-empty strings under secret-like keys masked
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let v = match v {
                        Value::String(s) if is_secret_key(k) && !s.is_empty() => Value::from(MASK),
                        other => redact(other),
                    };
                    (k.clone(), v)
                })
                .collect::<Map<_, _>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}
