//! Value classification and blankness predicates for `serde_json::Value`.
//!
//! Contract fields are loosely typed: callers hand the engine raw JSON
//! values and the contract narrows them. This module supplies the two
//! questions every rule asks first: what shape is this value, and does
//! it count as present?

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The JSON shape a field's value is expected to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// A JSON string.
    String,
    /// Any JSON number (integer or float).
    Number,
    /// A JSON number with no fractional part.
    Integer,
    /// A JSON boolean.
    Boolean,
    /// A JSON array.
    Array,
    /// A JSON object.
    Object,
}

impl ValueKind {
    /// Whether `value` is of this kind.
    ///
    /// `Number` accepts any numeric value; `Integer` only values that
    /// round-trip through `i64`/`u64`.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    /// Lowercase name used in error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lowercase name of a value's actual JSON shape, for error messages.
#[must_use]
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Whether a value counts as blank.
///
/// Null, whitespace-only strings, and empty collections are blank.
/// `false` and `0` are NOT blank; booleans and numbers always carry
/// information.
#[must_use]
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Whether a value counts as present (the inverse of [`is_blank`]).
#[must_use]
pub fn is_present(value: &Value) -> bool {
    !is_blank(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_matches() {
        assert!(ValueKind::String.matches(&json!("hi")));
        assert!(ValueKind::Number.matches(&json!(1.5)));
        assert!(ValueKind::Number.matches(&json!(3)));
        assert!(ValueKind::Integer.matches(&json!(3)));
        assert!(!ValueKind::Integer.matches(&json!(1.5)));
        assert!(ValueKind::Boolean.matches(&json!(false)));
        assert!(ValueKind::Array.matches(&json!([1])));
        assert!(ValueKind::Object.matches(&json!({"a": 1})));
        assert!(!ValueKind::String.matches(&json!(1)));
    }

    #[test]
    fn kind_of_names() {
        assert_eq!(kind_of(&json!(null)), "null");
        assert_eq!(kind_of(&json!("x")), "string");
        assert_eq!(kind_of(&json!([])), "array");
    }

    #[test]
    fn blankness() {
        assert!(is_blank(&json!(null)));
        assert!(is_blank(&json!("")));
        assert!(is_blank(&json!("   ")));
        assert!(is_blank(&json!([])));
        assert!(is_blank(&json!({})));
        assert!(!is_blank(&json!(false)));
        assert!(!is_blank(&json!(0)));
        assert!(!is_blank(&json!("x")));
        assert!(is_present(&json!([1])));
    }

    #[test]
    fn display_matches_name() {
        assert_eq!(ValueKind::Integer.to_string(), "integer");
    }
}
