//! Helpers over the JSON value model.

use serde_json::Value;

/// Truthiness used by `if` and the `default` filter.
///
/// `null`, `false`, zero, and empty strings, arrays and objects are false.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Text emitted when a value is rendered.
///
/// `null` renders as nothing, strings render raw, and composite values
/// render as JSON.
#[must_use]
pub fn to_display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Equality that treats `1` and `1.0` as equal.
#[must_use]
pub fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_truthiness() {
        for falsy in [json!(null), json!(false), json!(0), json!(0.0), json!(""), json!([]), json!({})] {
            assert!(!is_truthy(&falsy), "{falsy} should be falsy");
        }
        for truthy in [json!(true), json!(2), json!("x"), json!([0]), json!({"a": null})] {
            assert!(is_truthy(&truthy), "{truthy} should be truthy");
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(to_display(&json!(null)), "");
        assert_eq!(to_display(&json!("raw <b>")), "raw <b>");
        assert_eq!(to_display(&json!(3)), "3");
        assert_eq!(to_display(&json!(true)), "true");
        assert_eq!(to_display(&json!([1, "a"])), r#"[1,"a"]"#);
    }

    #[test]
    fn test_loosely_equal() {
        assert!(loosely_equal(&json!(1), &json!(1.0)));
        assert!(!loosely_equal(&json!(1), &json!("1")));
    }
}
