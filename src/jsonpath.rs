//! Minimal JSON path lookup
//!
//! Supports the dotted paths used in extractor definitions:
//! `$.data.items`, `data.items[0].id`, `data.items.-1.id`, `meta.next_cursor`.
//! Negative indices count from the end of an array.

use serde_json::Value;

/// Resolve a path against a JSON value
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.trim();
    let path = path.strip_prefix("$.").unwrap_or(path);
    if path.is_empty() || path == "$" {
        return Some(value);
    }

    let mut current = value;
    for segment in segments(path) {
        current = step(current, &segment)?;
    }
    Some(current)
}

/// Resolve a path and render scalars as a string
///
/// Returns `None` for missing values, `null`, objects and arrays.
pub fn extract_string(value: &Value, path: &str) -> Option<String> {
    match lookup(value, path)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Resolve a path to an unsigned integer, accepting numeric strings
pub fn extract_u64(value: &Value, path: &str) -> Option<u64> {
    match lookup(value, path)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Resolve a path to a boolean with JavaScript-like truthiness
pub fn extract_bool(value: &Value, path: &str) -> Option<bool> {
    lookup(value, path).map(is_truthy)
}

/// Truthiness of a JSON value: null, false, 0, "" and empty containers are false
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn segments(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    for part in path.split('.') {
        // `items[0][1]` -> items, 0, 1
        let mut rest = part;
        if let Some(idx) = rest.find('[') {
            if idx > 0 {
                out.push(rest[..idx].to_string());
            }
            rest = &rest[idx..];
            while let Some(stripped) = rest.strip_prefix('[') {
                match stripped.find(']') {
                    Some(end) => {
                        out.push(stripped[..end].trim_matches(['"', '\'']).to_string());
                        rest = &stripped[end + 1..];
                    }
                    None => {
                        out.push(stripped.to_string());
                        rest = "";
                    }
                }
            }
        } else if !rest.is_empty() {
            out.push(rest.to_string());
        }
    }
    out
}

fn step<'a>(current: &'a Value, segment: &str) -> Option<&'a Value> {
    match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => {
            let index: i64 = segment.parse().ok()?;
            let len = items.len() as i64;
            let index = if index < 0 { len + index } else { index };
            if index < 0 {
                return None;
            }
            items.get(index as usize)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn doc() -> Value {
        json!({
            "data": {
                "items": [{"id": 1}, {"id": 2}, {"id": 3}],
                "next": "abc",
                "total": "42",
                "has_more": true,
                "empty": ""
            },
            "token": "t0k3n"
        })
    }

    #[test_case("$.token", Some("t0k3n") ; "root prefix")]
    #[test_case("token", Some("t0k3n") ; "bare key")]
    #[test_case("data.next", Some("abc") ; "nested")]
    #[test_case("data.items[0].id", Some("1") ; "bracket index")]
    #[test_case("data.items.1.id", Some("2") ; "dotted index")]
    #[test_case("data.items[-1].id", Some("3") ; "negative index")]
    #[test_case("data.items[7].id", None ; "index out of range")]
    #[test_case("data.missing", None ; "missing key")]
    #[test_case("data.items", None ; "array is not a scalar")]
    fn test_extract_string(path: &str, expected: Option<&str>) {
        assert_eq!(extract_string(&doc(), path).as_deref(), expected);
    }

    #[test]
    fn test_extract_u64_from_string() {
        assert_eq!(extract_u64(&doc(), "data.total"), Some(42));
        assert_eq!(extract_u64(&doc(), "data.items[2].id"), Some(3));
        assert_eq!(extract_u64(&doc(), "data.next"), None);
    }

    #[test]
    fn test_extract_bool_truthiness() {
        assert_eq!(extract_bool(&doc(), "data.has_more"), Some(true));
        assert_eq!(extract_bool(&doc(), "data.empty"), Some(false));
        assert_eq!(extract_bool(&doc(), "data.nope"), None);
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!([])));
        assert!(is_truthy(&json!({"a": 1})));
    }

    #[test]
    fn test_lookup_root() {
        let value = json!([1, 2]);
        assert_eq!(lookup(&value, "$"), Some(&value));
        assert_eq!(lookup(&value, ""), Some(&value));
        assert_eq!(lookup(&value, "[1]"), Some(&json!(2)));
    }
}
