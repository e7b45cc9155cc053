//! Typed row values.
//!
//! Rows exist in two representations: the wire form the API speaks, where
//! every value is a string, and the typed form callers work with. A
//! [`FieldValue`] is one cell of the typed form.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// A typed row: column name → value.
pub type TypedRow = BTreeMap<String, FieldValue>;

/// One typed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(DateTime<Utc>),
    /// A nested record: a dot-walked reference expansion, or a reference
    /// link object passed through untouched.
    Record(TypedRow),
}

impl FieldValue {
    /// The value as a string, if it is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this is `Null` or an empty string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Null) || matches!(self, FieldValue::Str(s) if s.is_empty())
    }

    /// Map raw JSON into a typed value without consulting a schema.
    ///
    /// Used for passthrough cells (link objects, columns absent from the
    /// schema). Arrays have no wire-row counterpart and are kept as their
    /// JSON text.
    #[must_use]
    pub fn from_json(value: &Value) -> FieldValue {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Int(i)
                } else {
                    FieldValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => FieldValue::Str(s.clone()),
            Value::Object(map) => FieldValue::Record(
                map.iter()
                    .map(|(k, v)| (k.clone(), FieldValue::from_json(v)))
                    .collect(),
            ),
            Value::Array(_) => FieldValue::Str(value.to_string()),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        FieldValue::Date(v)
    }
}

/// Whether `value` is a well-formed record identifier: exactly 32 lowercase
/// hex characters.
#[must_use]
pub fn is_sys_id(value: &str) -> bool {
    value.len() == 32
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sys_id_shape() {
        assert!(is_sys_id("0123456789abcdef0123456789abcdef"));
        assert!(!is_sys_id(""));
        assert!(!is_sys_id("0123456789abcdef0123456789abcde")); // 31 chars
        assert!(!is_sys_id("0123456789ABCDEF0123456789ABCDEF")); // uppercase
        assert!(!is_sys_id("0123456789abcdef0123456789abcdeg")); // non-hex
    }

    #[test]
    fn from_json_maps_scalars() {
        assert_eq!(FieldValue::from_json(&json!(null)), FieldValue::Null);
        assert_eq!(FieldValue::from_json(&json!(true)), FieldValue::Bool(true));
        assert_eq!(FieldValue::from_json(&json!(42)), FieldValue::Int(42));
        assert_eq!(FieldValue::from_json(&json!(1.5)), FieldValue::Float(1.5));
        assert_eq!(
            FieldValue::from_json(&json!("abc")),
            FieldValue::Str("abc".into())
        );
    }

    #[test]
    fn from_json_keeps_link_objects() {
        let link = json!({"link": "https://x/api/now/v2/table/u_dm_user/0123", "value": "0123"});
        match FieldValue::from_json(&link) {
            FieldValue::Record(record) => {
                assert_eq!(record.get("value"), Some(&FieldValue::Str("0123".into())));
            }
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[test]
    fn emptiness() {
        assert!(FieldValue::Null.is_empty());
        assert!(FieldValue::Str(String::new()).is_empty());
        assert!(!FieldValue::Str("x".into()).is_empty());
        assert!(!FieldValue::Bool(false).is_empty());
    }
}
