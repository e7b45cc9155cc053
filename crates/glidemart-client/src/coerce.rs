//! Schema-driven type coercion.
//!
//! Converts between the wire representation (every value a string) and the
//! typed representation ([`FieldValue`]), using the table schema to decide
//! each column's rules. Dotted keys (`u_owner.u_name`) decode into nested
//! records by walking reference columns through the schema source.

use chrono::NaiveDateTime;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::schema::{SchemaElement, TableSchema};
use crate::value::{is_sys_id, FieldValue, TypedRow};

/// Bounded fan-out for batch row conversion.
const BATCH_CONCURRENCY: usize = 8;

/// Wire format for `glide_date_time` values (UTC).
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Display-layer date format. Whether the API can still hand this format to
/// a client that never sets `sysparm_display_value` is unclear; the decoder
/// is kept for rows captured under that flag.
const DISPLAY_DATETIME_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

/// Resolves schemas for nested (dot-walked) decoding.
pub trait SchemaSource: Send + Sync {
    fn schema<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<Arc<TableSchema>>>;
}

/// Decode one wire row into its typed form.
pub fn decode_row<'a>(
    schema: &'a TableSchema,
    source: &'a dyn SchemaSource,
    wire: &'a Map<String, Value>,
) -> BoxFuture<'a, Result<TypedRow>> {
    Box::pin(async move {
        let mut row = TypedRow::new();
        let mut nested: BTreeMap<&str, Map<String, Value>> = BTreeMap::new();

        for (key, value) in wire {
            match key.split_once('.') {
                None => {
                    let typed = match schema.element(key) {
                        Some(element) => decode_value(element, value)?,
                        // columns the schema does not know pass through
                        None => FieldValue::from_json(value),
                    };
                    row.insert(key.clone(), typed);
                }
                Some((head, rest)) => {
                    nested
                        .entry(head)
                        .or_default()
                        .insert(rest.to_string(), value.clone());
                }
            }
        }

        for (head, sub_wire) in nested {
            let element = schema.element(head).ok_or_else(|| {
                Error::coercion(head, "reference", "dotted key on a column not in the schema")
            })?;
            let target = element.reference_table.as_deref().ok_or_else(|| {
                Error::coercion(
                    head,
                    element.internal_type.clone(),
                    "dotted key on a non-reference column",
                )
            })?;
            let sub_schema = source.schema(target).await?;
            let record = decode_row(&sub_schema, source, &sub_wire).await?;
            row.insert(head.to_string(), FieldValue::Record(record));
        }

        Ok(row)
    })
}

/// Decode a batch of wire rows element-wise with bounded concurrency. Any
/// failure fails the whole batch.
pub async fn decode_rows(
    schema: &TableSchema,
    source: &dyn SchemaSource,
    rows: &[Map<String, Value>],
) -> Result<Vec<TypedRow>> {
    let futures: Vec<_> = rows
        .iter()
        .map(|wire| decode_row(schema, source, wire))
        .collect();
    stream::iter(futures)
        .buffered(BATCH_CONCURRENCY)
        .try_collect()
        .await
}

/// Decode one wire cell according to its schema element.
pub fn decode_value(element: &SchemaElement, value: &Value) -> Result<FieldValue> {
    // reference link objects pass through untouched, whatever the type tag
    if value.is_object() {
        return Ok(FieldValue::from_json(value));
    }
    if value.is_null() {
        return Ok(FieldValue::Null);
    }

    let text = match value {
        Value::String(s) => s.as_str(),
        // tolerated: some endpoints emit raw numbers/booleans
        other => return Ok(FieldValue::from_json(other)),
    };

    // absent values arrive as empty strings
    if text.is_empty() {
        return Ok(FieldValue::Null);
    }

    match element.internal_type.as_str() {
        // reads return "true"/"false"; our own writes circulate "1"/"0"
        "boolean" => match text {
            "true" | "1" => Ok(FieldValue::Bool(true)),
            "false" | "0" => Ok(FieldValue::Bool(false)),
            other => Err(Error::coercion(
                &element.name,
                "boolean",
                format!("'{other}' is not a boolean"),
            )),
        },
        "integer" | "long" => {
            if let Ok(i) = text.parse::<i64>() {
                Ok(FieldValue::Int(i))
            } else if let Some(f) = parse_finite(text) {
                Ok(FieldValue::Int(f.round() as i64))
            } else if element.choice_list {
                // choice-list integers may be display strings
                Ok(FieldValue::Str(text.to_string()))
            } else {
                Err(Error::coercion(
                    &element.name,
                    &element.internal_type,
                    format!("'{text}' is not an integer"),
                ))
            }
        }
        "float" | "decimal" => parse_finite(text).map(FieldValue::Float).ok_or_else(|| {
            Error::coercion(
                &element.name,
                &element.internal_type,
                format!("'{text}' is not a number"),
            )
        }),
        "glide_date_time" => parse_datetime(&element.name, text),
        _ => Ok(FieldValue::Str(text.to_string())),
    }
}

/// Parse a float, rejecting the `NaN`/`inf` tokens Rust's parser accepts.
fn parse_finite(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|f| f.is_finite())
}

fn parse_datetime(column: &str, text: &str) -> Result<FieldValue> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, DATETIME_FORMAT) {
        return Ok(FieldValue::Date(naive.and_utc()));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, DISPLAY_DATETIME_FORMAT) {
        debug!(column, value = text, "decoded display-format date");
        return Ok(FieldValue::Date(naive.and_utc()));
    }
    Err(Error::coercion(
        column,
        "glide_date_time",
        format!("'{text}' matches neither accepted date format"),
    ))
}

/// Encode a typed row into wire form. Writes are flat: nested records are
/// only accepted where a reference link object makes sense.
pub fn encode_row(schema: &TableSchema, row: &TypedRow) -> Result<Map<String, Value>> {
    let mut wire = Map::new();
    for (name, value) in row {
        let encoded = match schema.element(name) {
            Some(element) => encode_value(element, value)?,
            None => {
                debug!(column = %name, "encoding a column the schema does not know");
                passthrough_string(name, value)?
            }
        };
        wire.insert(name.clone(), Value::String(encoded));
    }
    Ok(wire)
}

/// Encode a batch of typed rows; any failure fails the whole batch.
pub fn encode_rows(schema: &TableSchema, rows: &[TypedRow]) -> Result<Vec<Map<String, Value>>> {
    rows.iter().map(|row| encode_row(schema, row)).collect()
}

/// Encode one typed cell according to its schema element.
pub fn encode_value(element: &SchemaElement, value: &FieldValue) -> Result<String> {
    match element.internal_type.as_str() {
        "boolean" => encode_boolean(element, value),
        "integer" | "long" => encode_integer(element, value),
        "float" => encode_number(element, value, 7),
        "decimal" => encode_decimal(element, value),
        "glide_date_time" => encode_datetime(element, value),
        "reference" | "glide_list" => encode_reference(element, value),
        "string" | "text" | "html" | "url" => encode_string(element, value),
        _ => passthrough_string(&element.name, value),
    }
}

fn encode_boolean(element: &SchemaElement, value: &FieldValue) -> Result<String> {
    match value {
        FieldValue::Bool(true) => Ok("1".to_string()),
        FieldValue::Bool(false) | FieldValue::Null => Ok("0".to_string()),
        FieldValue::Str(s) => match s.as_str() {
            "true" | "1" => Ok("1".to_string()),
            "false" | "0" | "" => Ok("0".to_string()),
            other => Err(Error::coercion(
                &element.name,
                "boolean",
                format!("'{other}' is not a boolean"),
            )),
        },
        other => Err(Error::coercion(
            &element.name,
            "boolean",
            format!("{other:?} is not a boolean"),
        )),
    }
}

fn encode_integer(element: &SchemaElement, value: &FieldValue) -> Result<String> {
    match value {
        FieldValue::Null => Ok(String::new()),
        FieldValue::Int(i) => Ok(i.to_string()),
        FieldValue::Float(f) => Ok((f.round() as i64).to_string()),
        FieldValue::Str(s) if s.is_empty() => Ok(String::new()),
        FieldValue::Str(s) => {
            if let Ok(i) = s.parse::<i64>() {
                Ok(i.to_string())
            } else if let Some(f) = parse_finite(s) {
                Ok((f.round() as i64).to_string())
            } else if element.choice_list {
                Ok(s.clone())
            } else {
                Err(Error::coercion(
                    &element.name,
                    &element.internal_type,
                    format!("'{s}' is not an integer"),
                ))
            }
        }
        other => Err(Error::coercion(
            &element.name,
            &element.internal_type,
            format!("{other:?} is not an integer"),
        )),
    }
}

fn encode_number(element: &SchemaElement, value: &FieldValue, places: u32) -> Result<String> {
    let number = numeric_value(element, value)?;
    match number {
        None => Ok(String::new()),
        Some(f) => {
            let scale = 10f64.powi(places as i32);
            Ok(((f * scale).round() / scale).to_string())
        }
    }
}

fn encode_decimal(element: &SchemaElement, value: &FieldValue) -> Result<String> {
    match numeric_value(element, value)? {
        None => Ok(String::new()),
        Some(f) => Ok(format!("{:.2}", f)),
    }
}

fn numeric_value(element: &SchemaElement, value: &FieldValue) -> Result<Option<f64>> {
    match value {
        FieldValue::Null => Ok(None),
        FieldValue::Str(s) if s.is_empty() => Ok(None),
        FieldValue::Int(i) => Ok(Some(*i as f64)),
        FieldValue::Float(f) if f.is_finite() => Ok(Some(*f)),
        FieldValue::Str(s) => parse_finite(s).map(Some).ok_or_else(|| {
            Error::coercion(
                &element.name,
                &element.internal_type,
                format!("'{s}' is not a number"),
            )
        }),
        other => Err(Error::coercion(
            &element.name,
            &element.internal_type,
            format!("{other:?} is not a number"),
        )),
    }
}

fn encode_datetime(element: &SchemaElement, value: &FieldValue) -> Result<String> {
    match value {
        FieldValue::Null => Ok(String::new()),
        FieldValue::Str(s) if s.is_empty() => Ok(String::new()),
        // milliseconds are dropped by the second-resolution format
        FieldValue::Date(date) => Ok(date.format(DATETIME_FORMAT).to_string()),
        FieldValue::Str(s) => match parse_datetime(&element.name, s)? {
            FieldValue::Date(date) => Ok(date.format(DATETIME_FORMAT).to_string()),
            _ => unreachable!("parse_datetime returns dates"),
        },
        other => Err(Error::coercion(
            &element.name,
            "glide_date_time",
            format!("{other:?} is not a date"),
        )),
    }
}

fn encode_reference(element: &SchemaElement, value: &FieldValue) -> Result<String> {
    let text = match value {
        FieldValue::Null => return Ok(String::new()),
        FieldValue::Str(s) => s.clone(),
        // link object: the sys_id sits in its `value` field
        FieldValue::Record(record) => match record.get("value") {
            Some(FieldValue::Str(s)) => s.clone(),
            _ => {
                return Err(Error::coercion(
                    &element.name,
                    &element.internal_type,
                    "link object without a value field",
                ))
            }
        },
        other => {
            return Err(Error::coercion(
                &element.name,
                &element.internal_type,
                format!("{other:?} is not a reference"),
            ))
        }
    };

    // empty means "disconnected" and is valid
    if text.is_empty() || is_sys_id(&text) {
        Ok(text)
    } else {
        Err(Error::coercion(
            &element.name,
            &element.internal_type,
            format!("'{text}' is not a 32-character sys_id"),
        ))
    }
}

fn encode_string(element: &SchemaElement, value: &FieldValue) -> Result<String> {
    let mut text = passthrough_string(&element.name, value)?;
    if let Some(max) = element.max_length {
        if max > 0 && text.chars().count() > max {
            warn!(
                column = %element.name,
                max_length = max,
                length = text.chars().count(),
                "truncating over-long value"
            );
            text = text.chars().take(max).collect();
        }
    }
    Ok(text)
}

fn passthrough_string(column: &str, value: &FieldValue) -> Result<String> {
    match value {
        FieldValue::Null => Ok(String::new()),
        FieldValue::Str(s) => Ok(s.clone()),
        FieldValue::Bool(b) => Ok(b.to_string()),
        FieldValue::Int(i) => Ok(i.to_string()),
        FieldValue::Float(f) => Ok(f.to_string()),
        FieldValue::Date(d) => Ok(d.format(DATETIME_FORMAT).to_string()),
        FieldValue::Record(_) => Err(Error::coercion(
            column,
            "string",
            "nested records cannot be written flat",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;
    use serde_json::json;

    fn element(name: &str, internal_type: &str) -> SchemaElement {
        SchemaElement {
            name: name.to_string(),
            internal_type: internal_type.to_string(),
            max_length: None,
            reference_table: None,
            choice_list: false,
        }
    }

    struct NoNesting;

    impl SchemaSource for NoNesting {
        fn schema<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<Arc<TableSchema>>> {
            Box::pin(async move { Err(Error::schema(table, "no nested schemas in this test")) })
        }
    }

    #[test]
    fn boolean_round_trip() {
        let col = element("u_active", "boolean");
        assert_eq!(
            decode_value(&col, &json!("true")).unwrap(),
            FieldValue::Bool(true)
        );
        assert_eq!(
            decode_value(&col, &json!("false")).unwrap(),
            FieldValue::Bool(false)
        );
        assert!(decode_value(&col, &json!("yes")).is_err());

        assert_eq!(encode_value(&col, &FieldValue::Bool(true)).unwrap(), "1");
        assert_eq!(encode_value(&col, &FieldValue::Bool(false)).unwrap(), "0");
        // null booleans write as false
        assert_eq!(encode_value(&col, &FieldValue::Null).unwrap(), "0");
    }

    #[test]
    fn integer_round_trip() {
        let col = element("u_count", "integer");
        assert_eq!(
            decode_value(&col, &json!("42")).unwrap(),
            FieldValue::Int(42)
        );
        assert_eq!(encode_value(&col, &FieldValue::Int(42)).unwrap(), "42");
        // fractional values round on encode
        assert_eq!(encode_value(&col, &FieldValue::Float(3.7)).unwrap(), "4");
        assert!(decode_value(&col, &json!("forty-two")).is_err());
    }

    #[test]
    fn choice_list_integers_keep_display_strings() {
        let mut col = element("u_state", "integer");
        col.choice_list = true;
        assert_eq!(
            decode_value(&col, &json!("In Progress")).unwrap(),
            FieldValue::Str("In Progress".into())
        );
        assert_eq!(
            encode_value(&col, &FieldValue::Str("In Progress".into())).unwrap(),
            "In Progress"
        );
    }

    #[test]
    fn float_rounds_to_seven_places() {
        let col = element("u_ratio", "float");
        assert_eq!(
            encode_value(&col, &FieldValue::Float(1.23456789)).unwrap(),
            "1.2345679"
        );
    }

    #[test]
    fn non_finite_tokens_are_rejected() {
        for token in ["NaN", "inf", "-inf", "infinity"] {
            assert!(
                decode_value(&element("u_ratio", "float"), &json!(token)).is_err(),
                "float column accepted '{token}'"
            );
            assert!(
                decode_value(&element("u_price", "decimal"), &json!(token)).is_err(),
                "decimal column accepted '{token}'"
            );
            // integer columns must not fall back to a NaN round
            assert!(
                decode_value(&element("u_count", "integer"), &json!(token)).is_err(),
                "integer column accepted '{token}'"
            );
            assert!(
                encode_value(
                    &element("u_price", "decimal"),
                    &FieldValue::Str(token.to_string())
                )
                .is_err(),
                "decimal encode accepted '{token}'"
            );
        }
    }

    #[test]
    fn decimal_rounds_to_two_places() {
        let col = element("u_price", "decimal");
        assert_eq!(
            encode_value(&col, &FieldValue::Float(1.239)).unwrap(),
            "1.24"
        );
    }

    #[test]
    fn date_round_trip() {
        let col = element("u_seen", "glide_date_time");
        let decoded = decode_value(&col, &json!("2024-03-15 08:09:10")).unwrap();
        assert_eq!(
            decoded,
            FieldValue::Date(Utc.with_ymd_and_hms(2024, 3, 15, 8, 9, 10).unwrap())
        );
        assert_eq!(
            encode_value(&col, &decoded).unwrap(),
            "2024-03-15 08:09:10"
        );

        // display format is accepted on the way in
        let display = decode_value(&col, &json!("15-03-2024 08:09:10")).unwrap();
        assert_eq!(display, decoded);

        assert!(decode_value(&col, &json!("March 15th")).is_err());
    }

    #[test]
    fn datetime_encode_drops_milliseconds() {
        let col = element("u_seen", "glide_date_time");
        let instant = Utc.with_ymd_and_hms(2024, 3, 15, 8, 9, 10).unwrap()
            + chrono::Duration::milliseconds(987);
        assert_eq!(
            encode_value(&col, &FieldValue::Date(instant)).unwrap(),
            "2024-03-15 08:09:10"
        );
    }

    #[test]
    fn strings_truncate_to_max_length() {
        let mut col = element("u_name", "string");
        col.max_length = Some(4);
        assert_eq!(
            encode_value(&col, &FieldValue::Str("abcdefgh".into())).unwrap(),
            "abcd"
        );
        // never an error
        assert_eq!(
            encode_value(&col, &FieldValue::Str("ab".into())).unwrap(),
            "ab"
        );
    }

    #[test]
    fn references_validate_sys_ids() {
        let col = element("u_owner", "reference");
        let guid = "0123456789abcdef0123456789abcdef";
        assert_eq!(
            encode_value(&col, &FieldValue::Str(guid.into())).unwrap(),
            guid
        );
        // empty disconnects
        assert_eq!(encode_value(&col, &FieldValue::Str(String::new())).unwrap(), "");
        assert!(encode_value(&col, &FieldValue::Str("alice".into())).is_err());
    }

    #[test]
    fn link_objects_pass_through_on_decode() {
        let col = element("u_owner", "reference");
        let link = json!({"link": "https://x/u_dm_user/0123", "value": "0123"});
        assert!(matches!(
            decode_value(&col, &link).unwrap(),
            FieldValue::Record(_)
        ));
    }

    #[test]
    fn empty_strings_decode_as_null() {
        for kind in ["boolean", "integer", "float", "glide_date_time", "string"] {
            let col = element("u_x", kind);
            assert_eq!(decode_value(&col, &json!("")).unwrap(), FieldValue::Null);
        }
    }

    #[tokio::test]
    async fn dotted_keys_build_nested_records() {
        struct UserSource;

        impl SchemaSource for UserSource {
            fn schema<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<Arc<TableSchema>>> {
                Box::pin(async move {
                    assert_eq!(table, "u_dm_user");
                    let mut elements = BTreeMap::new();
                    elements.insert(
                        "u_name".to_string(),
                        SchemaElement {
                            name: "u_name".into(),
                            internal_type: "string".into(),
                            max_length: Some(40),
                            reference_table: None,
                            choice_list: false,
                        },
                    );
                    Ok(Arc::new(TableSchema {
                        table: table.to_string(),
                        elements,
                    }))
                })
            }
        }

        let mut elements = BTreeMap::new();
        elements.insert(
            "u_owner".to_string(),
            SchemaElement {
                name: "u_owner".into(),
                internal_type: "reference".into(),
                max_length: Some(32),
                reference_table: Some("u_dm_user".into()),
                choice_list: false,
            },
        );
        let schema = TableSchema {
            table: "u_dm_app".into(),
            elements,
        };

        let wire: Map<String, Value> =
            serde_json::from_value(json!({"u_owner.u_name": "alice"})).unwrap();
        let row = decode_row(&schema, &UserSource, &wire).await.unwrap();

        match row.get("u_owner").unwrap() {
            FieldValue::Record(record) => {
                assert_eq!(record.get("u_name"), Some(&FieldValue::Str("alice".into())));
            }
            other => panic!("expected nested record, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dotted_key_on_plain_column_fails() {
        let mut elements = BTreeMap::new();
        elements.insert("u_name".to_string(), element("u_name", "string"));
        let schema = TableSchema {
            table: "u_dm_app".into(),
            elements,
        };

        let wire: Map<String, Value> =
            serde_json::from_value(json!({"u_name.u_x": "boom"})).unwrap();
        assert!(decode_row(&schema, &NoNesting, &wire).await.is_err());
    }

    #[tokio::test]
    async fn batch_failure_fails_the_batch() {
        let mut elements = BTreeMap::new();
        elements.insert("u_count".to_string(), element("u_count", "integer"));
        let schema = TableSchema {
            table: "u_dm_host".into(),
            elements,
        };

        let good: Map<String, Value> = serde_json::from_value(json!({"u_count": "1"})).unwrap();
        let bad: Map<String, Value> = serde_json::from_value(json!({"u_count": "x"})).unwrap();

        assert!(decode_rows(&schema, &NoNesting, &[good.clone(), bad])
            .await
            .is_err());
        assert_eq!(
            decode_rows(&schema, &NoNesting, &[good]).await.unwrap().len(),
            1
        );
    }
}
