//! Response normalizer for the `{data, has_more, next}` envelope.

use serde_json::Value;

/// Unwrap `data` when the response carries it, otherwise return the
/// response unchanged.
///
/// A present-but-empty `data` (`null`, `{}`, `[]`) is still unwrapped, so
/// callers must cope with empty payloads.
pub fn simplify(response: Value) -> Value {
    match response {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// The `data` array of a list response, empty when absent or not an array.
pub fn data_items(response: Value) -> Vec<Value> {
    match simplify(response) {
        Value::Array(items) => items,
        _ => Vec::new(),
    }
}
