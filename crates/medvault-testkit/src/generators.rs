//! Proptest strategies for record bodies and payload bytes.

use proptest::prelude::*;
use serde_json::{Map, Value};

/// Arbitrary payload bytes, up to 2 KiB.
pub fn arb_payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..2048)
}

/// Arbitrary JSON field name.
pub fn arb_field_name() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z0-9_]{0,12}"
}

/// Arbitrary scalar JSON value.
pub fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        "[ -~]{0,24}".prop_map(Value::String),
    ]
}

/// Arbitrary flat record body: an object of 1-5 scalar fields.
pub fn arb_record_body() -> impl Strategy<Value = Value> {
    prop::collection::btree_map(arb_field_name(), arb_scalar(), 1..6)
        .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>()))
}
