// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(clippy::unwrap_used, clippy::panic)]

use crate::schema::{Schema, Type};
use serde_json::json;

#[test]
fn test_deserialize_integer() {
    let schema = Schema::from_serde_json_value(json!({
        "type": "integer",
        "minimum": 1,
        "maximum": 10
    }))
    .unwrap();

    match schema.as_type() {
        Type::Integer {
            minimum, maximum, ..
        } => {
            assert_eq!(*minimum, Some(1));
            assert_eq!(*maximum, Some(10));
        }
        other => panic!("Expected integer, got {other:?}"),
    }
}

#[test]
fn test_deserialize_string_camel_case() {
    let schema = Schema::from_json_str(
        r#"{ "type": "string", "minLength": 2, "maxLength": 5, "pattern": "^[a-z]+$" }"#,
    )
    .unwrap();

    match schema.as_type() {
        Type::String {
            min_length,
            max_length,
            pattern,
            ..
        } => {
            assert_eq!(*min_length, Some(2));
            assert_eq!(*max_length, Some(5));
            assert_eq!(pattern.as_deref(), Some("^[a-z]+$"));
        }
        other => panic!("Expected string, got {other:?}"),
    }
}

#[test]
fn test_deserialize_object_as_map() {
    let schema = Schema::from_serde_json_value(json!({
        "type": "object",
        "additionalProperties": { "type": "boolean" }
    }))
    .unwrap();

    match schema.as_type() {
        Type::Map { values, .. } => assert!(matches!(values.as_type(), Type::Boolean { .. })),
        other => panic!("Expected map, got {other:?}"),
    }
}

#[test]
fn test_deserialize_array() {
    let schema = Schema::from_serde_json_value(json!({
        "type": "array",
        "items": { "type": "number" },
        "minItems": 1
    }))
    .unwrap();

    match schema.as_type() {
        Type::Array {
            items, min_items, ..
        } => {
            assert!(matches!(items.as_type(), Type::Number { .. }));
            assert_eq!(*min_items, Some(1));
        }
        other => panic!("Expected array, got {other:?}"),
    }
}

#[test]
fn test_deserialize_const_enum_any_of() {
    let literal = Schema::from_serde_json_value(json!({ "const": "dog" })).unwrap();
    assert!(matches!(literal.as_type(), Type::Const { value, .. } if value == &json!("dog")));

    let literals = Schema::from_serde_json_value(json!({ "enum": ["dog", "puppy"] })).unwrap();
    assert!(matches!(literals.as_type(), Type::Enum { values, .. } if values.len() == 2));

    let any_of = Schema::from_serde_json_value(json!({
        "anyOf": [{ "type": "string" }, { "type": "null" }]
    }))
    .unwrap();
    assert!(matches!(any_of.as_type(), Type::AnyOf(variants) if variants.len() == 2));
}

#[test]
fn test_deserialize_rejects_unknown_fields() {
    assert!(Schema::from_serde_json_value(json!({
        "type": "integer",
        "multipleOf": 2
    }))
    .is_err());

    assert!(Schema::from_serde_json_value(json!({
        "const": 1,
        "title": "one"
    }))
    .is_err());
}

#[test]
fn test_deserialize_rejects_runtime_only_types() {
    assert!(Schema::from_serde_json_value(json!({ "type": "model" })).is_err());
    assert!(Schema::from_serde_json_value(json!({ "type": "taggedUnion" })).is_err());
}

#[test]
fn test_deserialize_reports_parse_errors() {
    let err = Schema::from_json_str("{ not json").unwrap_err();
    assert!(err.to_string().starts_with("Failed to parse schema"));
}
