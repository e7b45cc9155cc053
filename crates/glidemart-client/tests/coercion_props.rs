//! Property tests for the wire ↔ typed round trip.

use proptest::prelude::*;
use serde_json::json;

use glidemart_client::schema::SchemaElement;
use glidemart_client::{coerce, FieldValue};

fn element(internal_type: &str) -> SchemaElement {
    SchemaElement {
        name: "u_value".to_string(),
        internal_type: internal_type.to_string(),
        max_length: Some(4000),
        reference_table: None,
        choice_list: false,
    }
}

proptest! {
    #[test]
    fn integers_round_trip(n in i64::MIN..i64::MAX) {
        let col = element("integer");
        let decoded = coerce::decode_value(&col, &json!(n.to_string())).unwrap();
        prop_assert_eq!(&decoded, &FieldValue::Int(n));
        prop_assert_eq!(coerce::encode_value(&col, &decoded).unwrap(), n.to_string());
    }

    #[test]
    fn dates_round_trip(secs in 0i64..4_102_444_800) {
        let col = element("glide_date_time");
        let instant = chrono::DateTime::from_timestamp(secs, 0).unwrap();
        let wire = instant.format("%Y-%m-%d %H:%M:%S").to_string();

        let decoded = coerce::decode_value(&col, &json!(wire.clone())).unwrap();
        prop_assert_eq!(&decoded, &FieldValue::Date(instant));
        prop_assert_eq!(coerce::encode_value(&col, &decoded).unwrap(), wire);
    }

    #[test]
    fn floats_stabilise_after_one_round(x in -1e6f64..1e6) {
        let col = element("float");
        let first = coerce::encode_value(&col, &FieldValue::Float(x)).unwrap();
        let decoded = coerce::decode_value(&col, &json!(first.clone())).unwrap();
        let second = coerce::encode_value(&col, &decoded).unwrap();
        // rounding to 7 places is idempotent
        prop_assert_eq!(first, second);
    }

    #[test]
    fn decimals_stabilise_after_one_round(x in -1e9f64..1e9) {
        let col = element("decimal");
        let first = coerce::encode_value(&col, &FieldValue::Float(x)).unwrap();
        let decoded = coerce::decode_value(&col, &json!(first.clone())).unwrap();
        let second = coerce::encode_value(&col, &decoded).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn short_strings_round_trip(s in "[a-zA-Z0-9 _-]{1,64}") {
        let col = element("string");
        let decoded = coerce::decode_value(&col, &json!(s.clone())).unwrap();
        prop_assert_eq!(coerce::encode_value(&col, &decoded).unwrap(), s);
    }

    #[test]
    fn references_accept_exactly_sys_ids(id in "[a-f0-9]{32}") {
        let col = element("reference");
        prop_assert_eq!(
            coerce::encode_value(&col, &FieldValue::Str(id.clone())).unwrap(),
            id
        );
    }

    #[test]
    fn references_reject_near_misses(id in "[a-f0-9]{1,31}") {
        let col = element("reference");
        prop_assert!(coerce::encode_value(&col, &FieldValue::Str(id)).is_err());
    }
}
