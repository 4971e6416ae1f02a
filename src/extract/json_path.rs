//! Defensive reads over third-party JSON.
//!
//! Paths are dot-separated: object keys by name, array elements by index
//! (`"niobeClientData.0.1.data"`). Keys that themselves contain a dot are
//! reached through [`lookup_segments`]. A missing key, an out-of-range index,
//! a step into a scalar, or an explicit `null` all mean "not found". Nothing
//! here panics or returns an error.

use serde_json::Value;

/// Walk the dot-separated `path` from `data`.
pub fn lookup<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return non_null(data);
    }
    let segments: Vec<&str> = path.split('.').collect();
    lookup_segments(data, &segments)
}

/// Walk one key or index per segment; segments are taken verbatim.
pub fn lookup_segments<'a>(data: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    let mut current = data;
    for key in segments {
        current = match current {
            Value::Object(map) => map.get(*key)?,
            Value::Array(arr) => arr.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    non_null(current)
}

fn non_null(value: &Value) -> Option<&Value> {
    if value.is_null() {
        None
    } else {
        Some(value)
    }
}

/// The value at `path`, or `default` when it cannot be reached.
pub fn read_or<'a>(data: &'a Value, path: &str, default: &'a Value) -> &'a Value {
    lookup(data, path).unwrap_or(default)
}

pub fn read_str<'a>(data: &'a Value, path: &str) -> Option<&'a str> {
    lookup(data, path).and_then(Value::as_str)
}

/// String at `path`, or an empty string.
pub fn read_string(data: &Value, path: &str) -> String {
    read_str(data, path).unwrap_or_default().to_string()
}

/// Array at `path`; anything else reads as an empty slice.
pub fn read_array<'a>(data: &'a Value, path: &str) -> &'a [Value] {
    lookup(data, path)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub fn read_bool(data: &Value, path: &str) -> Option<bool> {
    lookup(data, path).and_then(Value::as_bool)
}

/// Float at `path`; numeric strings are accepted.
pub fn read_f64(data: &Value, path: &str) -> Option<f64> {
    match lookup(data, path)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Unsigned integer at `path`; numeric strings are accepted.
pub fn read_u64(data: &Value, path: &str) -> Option<u64> {
    match lookup(data, path)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Scalar at `path` rendered as a string (ids arrive as numbers or strings).
pub fn read_scalar_string(data: &Value, path: &str) -> Option<String> {
    match lookup(data, path)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
