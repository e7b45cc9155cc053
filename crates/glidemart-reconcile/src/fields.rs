//! Helpers for reading bookkeeping rows.
//!
//! Rows from `sys_dictionary`, `sys_choice`, and friends come back typed;
//! these accessors flatten them to the strings and flags the reconcilers
//! compare.

use glidemart_client::{FieldValue, TypedRow};

/// The field as a comparison string; absent and null become empty.
pub(crate) fn text(row: &TypedRow, name: &str) -> String {
    match row.get(name) {
        None | Some(FieldValue::Null) => String::new(),
        Some(FieldValue::Str(s)) => s.clone(),
        Some(FieldValue::Bool(b)) => b.to_string(),
        Some(FieldValue::Int(i)) => i.to_string(),
        Some(FieldValue::Float(f)) => f.to_string(),
        Some(FieldValue::Date(d)) => d.format("%Y-%m-%d %H:%M:%S").to_string(),
        // link object: compare by its sys_id
        Some(FieldValue::Record(record)) => match record.get("value") {
            Some(FieldValue::Str(s)) => s.clone(),
            _ => String::new(),
        },
    }
}

/// The field as a string, with empty flattened to `None`.
pub(crate) fn opt_text(row: &TypedRow, name: &str) -> Option<String> {
    let value = text(row, name);
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// The field as a boolean flag (`true`/`"true"`/`"1"`).
pub(crate) fn flag(row: &TypedRow, name: &str) -> bool {
    match row.get(name) {
        Some(FieldValue::Bool(b)) => *b,
        Some(FieldValue::Str(s)) => s == "true" || s == "1",
        Some(FieldValue::Int(i)) => *i == 1,
        _ => false,
    }
}

/// The field as a non-negative number.
pub(crate) fn number(row: &TypedRow, name: &str) -> Option<usize> {
    match row.get(name) {
        Some(FieldValue::Int(i)) if *i >= 0 => Some(*i as usize),
        Some(FieldValue::Str(s)) => s.parse().ok(),
        Some(FieldValue::Float(f)) if *f >= 0.0 => Some(*f as usize),
        _ => None,
    }
}
