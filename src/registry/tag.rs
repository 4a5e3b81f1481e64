// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(clippy::pattern_type_mismatch)]

use crate::model::ModelType;
use crate::registry::error::ConfigurationError;
use crate::schema::Type;
use crate::Value;

/// Extracts the tag `model` declares on its discriminator field.
///
/// The field's schema is unwrapped through every annotation layer and must be a literal
/// permitting exactly one value. Any JSON value is accepted as a tag.
pub fn resolve_tag(model: &ModelType, field: &str) -> Result<Value, ConfigurationError> {
    let declared = model.resolve_declared_field(field).ok_or_else(|| {
        ConfigurationError::MissingDiscriminatorField {
            model: model.name().to_string(),
            field: field.to_string(),
        }
    })?;

    match declared.schema.unwrap_annotated().as_type() {
        Type::Const { value, .. } => Ok(value.clone()),
        Type::Enum { values, .. } => match values.as_slice() {
            [single] => Ok(single.clone()),
            many => Err(ConfigurationError::AmbiguousDiscriminator {
                model: model.name().to_string(),
                field: field.to_string(),
                count: many.len(),
                values: many.iter().map(display_tag).collect(),
            }),
        },
        other => Err(ConfigurationError::DiscriminatorNotLiteral {
            model: model.name().to_string(),
            field: field.to_string(),
            found: other.kind_name().to_string(),
        }),
    }
}

/// Renders a tag for messages: strings as-is, anything else as JSON.
pub fn display_tag(tag: &Value) -> String {
    match tag {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Whether two tags are the same value.
///
/// JSON equality, except that numbers compare by numeric value: `1` and `1.0` are one tag.
/// Booleans, strings and numbers never match each other.
pub fn same_tag(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return x == y;
            }
            if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                return x == y;
            }
            x.as_f64() == y.as_f64()
        }
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| same_tag(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| same_tag(x, y)))
        }
        _ => a == b,
    }
}
