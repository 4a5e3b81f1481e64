// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(missing_debug_implementations)] // validator is zero-sized marker
#![allow(clippy::pattern_type_mismatch, clippy::needless_continue)]

use indexmap::IndexMap;
use regex::Regex;

use crate::registry::tag::{display_tag, same_tag};
use crate::schema::{error::ValidationError, Schema, TaggedUnion, Type};
use crate::value::ConfigValue;
use crate::Value;

/// Validator for checking if a value conforms to a schema.
///
/// Validation is strict: no value is coerced into another type. The output is the validated
/// value, with every nested model turned into a [`ConfigInstance`](crate::ConfigInstance).
pub struct SchemaValidator;

impl SchemaValidator {
    /// Validates `value` against `schema`.
    ///
    /// # Returns
    /// * `Ok(value)` with nested models instantiated if the value conforms to the schema
    /// * `Err(ValidationError)` describing the first violation otherwise
    pub fn validate(value: &ConfigValue, schema: &Schema) -> Result<ConfigValue, ValidationError> {
        Self::validate_with_path(value, schema, "")
    }

    /// Internal validation function that tracks the current path for error reporting.
    pub(crate) fn validate_with_path(
        value: &ConfigValue,
        schema: &Schema,
        path: &str,
    ) -> Result<ConfigValue, ValidationError> {
        if let ConfigValue::Missing = value {
            return if schema.allows_missing() {
                Ok(ConfigValue::Missing)
            } else {
                Err(ValidationError::MissingValue { path: path.into() })
            };
        }

        match schema.as_type() {
            Type::Any { .. } => Ok(value.clone()),
            Type::Integer {
                minimum, maximum, ..
            } => Self::validate_integer(value, *minimum, *maximum, path),
            Type::Number {
                minimum, maximum, ..
            } => Self::validate_number(value, *minimum, *maximum, path),
            Type::Boolean { .. } => Self::validate_boolean(value, path),
            Type::Null { .. } => Self::validate_null(value, path),
            Type::String {
                min_length,
                max_length,
                pattern,
                ..
            } => Self::validate_string(value, *min_length, *max_length, pattern.as_deref(), path),
            Type::Array {
                items,
                min_items,
                max_items,
                ..
            } => Self::validate_array(value, items, *min_items, *max_items, path),
            Type::Map { values, .. } => Self::validate_map(value, values, path),
            Type::Const {
                value: const_value, ..
            } => Self::validate_const(value, const_value, path),
            Type::Enum { values, .. } => Self::validate_enum(value, values, path),
            Type::AnyOf(schemas) => Self::validate_any_of(value, schemas, path),
            Type::Model(model) => model
                .validate_with_path(value, path)
                .map(ConfigValue::Config),
            Type::TaggedUnion(union) => Self::validate_tagged_union(value, union, path),
            Type::Invalid { message } => Err(ValidationError::Invalid {
                message: message.clone(),
                path: path.into(),
            }),
            Type::Annotated { inner, .. } => Self::validate_with_path(value, inner, path),
        }
    }

    fn validate_integer(
        value: &ConfigValue,
        minimum: Option<i64>,
        maximum: Option<i64>,
        path: &str,
    ) -> Result<ConfigValue, ValidationError> {
        let ConfigValue::Number(num) = value else {
            return Err(Self::mismatch("integer", value, path));
        };
        let Some(int_val) = num.as_i64() else {
            return Err(ValidationError::TypeMismatch {
                expected: "integer".into(),
                actual: "non-integer number".into(),
                path: path.into(),
            });
        };
        if minimum.is_some_and(|min| int_val < min) || maximum.is_some_and(|max| int_val > max) {
            return Err(ValidationError::OutOfRange {
                value: int_val.to_string(),
                min: minimum.map(|m| m.to_string()),
                max: maximum.map(|m| m.to_string()),
                path: path.into(),
            });
        }
        Ok(value.clone())
    }

    fn validate_number(
        value: &ConfigValue,
        minimum: Option<f64>,
        maximum: Option<f64>,
        path: &str,
    ) -> Result<ConfigValue, ValidationError> {
        let ConfigValue::Number(num) = value else {
            return Err(Self::mismatch("number", value, path));
        };
        let Some(float_val) = num.as_f64() else {
            return Err(ValidationError::TypeMismatch {
                expected: "number".into(),
                actual: "non-numeric value".into(),
                path: path.into(),
            });
        };
        if minimum.is_some_and(|min| float_val < min) || maximum.is_some_and(|max| float_val > max)
        {
            return Err(ValidationError::OutOfRange {
                value: float_val.to_string(),
                min: minimum.map(|m| m.to_string()),
                max: maximum.map(|m| m.to_string()),
                path: path.into(),
            });
        }
        Ok(value.clone())
    }

    fn validate_boolean(value: &ConfigValue, path: &str) -> Result<ConfigValue, ValidationError> {
        match value {
            ConfigValue::Bool(_) => Ok(value.clone()),
            _ => Err(Self::mismatch("boolean", value, path)),
        }
    }

    fn validate_null(value: &ConfigValue, path: &str) -> Result<ConfigValue, ValidationError> {
        match value {
            ConfigValue::Null => Ok(ConfigValue::Null),
            _ => Err(Self::mismatch("null", value, path)),
        }
    }

    fn validate_string(
        value: &ConfigValue,
        min_length: Option<usize>,
        max_length: Option<usize>,
        pattern: Option<&str>,
        path: &str,
    ) -> Result<ConfigValue, ValidationError> {
        let ConfigValue::String(string_value) = value else {
            return Err(Self::mismatch("string", value, path));
        };
        let str_len = string_value.chars().count();

        if min_length.is_some_and(|min| str_len < min) || max_length.is_some_and(|max| str_len > max)
        {
            return Err(ValidationError::LengthConstraint {
                actual_length: str_len,
                min_length,
                max_length,
                path: path.into(),
            });
        }

        if let Some(pattern_str) = pattern {
            let regex = Regex::new(pattern_str).map_err(|e| ValidationError::InvalidPattern {
                pattern: pattern_str.into(),
                error: e.to_string(),
            })?;

            if !regex.is_match(string_value) {
                return Err(ValidationError::PatternMismatch {
                    value: string_value.clone(),
                    pattern: pattern_str.into(),
                    path: path.into(),
                });
            }
        }

        Ok(value.clone())
    }

    fn validate_array(
        value: &ConfigValue,
        items_schema: &Schema,
        min_items: Option<usize>,
        max_items: Option<usize>,
        path: &str,
    ) -> Result<ConfigValue, ValidationError> {
        let ConfigValue::Array(array_value) = value else {
            return Err(Self::mismatch("array", value, path));
        };
        let arr_len = array_value.len();

        if min_items.is_some_and(|min| arr_len < min) || max_items.is_some_and(|max| arr_len > max)
        {
            return Err(ValidationError::ArraySizeConstraint {
                actual_size: arr_len,
                min_items,
                max_items,
                path: path.into(),
            });
        }

        let mut validated = Vec::with_capacity(arr_len);
        for (index, item) in array_value.iter().enumerate() {
            let item_path = if path.is_empty() {
                format!("[{index}]")
            } else {
                format!("{path}[{index}]")
            };
            let item = Self::validate_with_path(item, items_schema, &item_path).map_err(|e| {
                ValidationError::ArrayItemValidationFailed {
                    index,
                    path: path.into(),
                    error: Box::new(e),
                }
            })?;
            validated.push(item);
        }

        Ok(ConfigValue::Array(validated))
    }

    fn validate_map(
        value: &ConfigValue,
        values_schema: &Schema,
        path: &str,
    ) -> Result<ConfigValue, ValidationError> {
        let ConfigValue::Map(map_value) = value else {
            return Err(Self::mismatch("object", value, path));
        };

        let mut validated = IndexMap::with_capacity(map_value.len());
        for (key, item) in map_value.iter() {
            let item = Self::validate_with_path(item, values_schema, &Self::property_path(path, key))
                .map_err(|e| ValidationError::PropertyValidationFailed {
                    property: key.clone(),
                    path: path.into(),
                    error: Box::new(e),
                })?;
            validated.insert(key.clone(), item);
        }

        Ok(ConfigValue::Map(validated))
    }

    fn validate_any_of(
        value: &ConfigValue,
        schemas: &[Schema],
        path: &str,
    ) -> Result<ConfigValue, ValidationError> {
        let mut errors = Vec::new();

        for schema in schemas {
            match Self::validate_with_path(value, schema, path) {
                Ok(validated) => return Ok(validated),
                Err(e) => errors.push(e),
            }
        }

        Err(ValidationError::NoUnionMatch {
            path: path.into(),
            errors,
        })
    }

    fn validate_const(
        value: &ConfigValue,
        const_value: &Value,
        path: &str,
    ) -> Result<ConfigValue, ValidationError> {
        let actual = value.to_json();
        if same_tag(&actual, const_value) {
            Ok(value.clone())
        } else {
            Err(ValidationError::ConstMismatch {
                expected: const_value.to_string(),
                actual: actual.to_string(),
                path: path.into(),
            })
        }
    }

    fn validate_enum(
        value: &ConfigValue,
        allowed_values: &[Value],
        path: &str,
    ) -> Result<ConfigValue, ValidationError> {
        let actual = value.to_json();
        if allowed_values.iter().any(|v| same_tag(v, &actual)) {
            Ok(value.clone())
        } else {
            Err(ValidationError::NotInEnum {
                value: actual.to_string(),
                allowed_values: allowed_values.iter().map(Value::to_string).collect(),
                path: path.into(),
            })
        }
    }

    /// Dispatches straight to the variant named by the discriminator field.
    /// Other variants are never tried.
    fn validate_tagged_union(
        value: &ConfigValue,
        union: &TaggedUnion,
        path: &str,
    ) -> Result<ConfigValue, ValidationError> {
        let discriminator = &union.discriminator;
        let tag = match value {
            ConfigValue::Map(map_value) => map_value.get(discriminator),
            ConfigValue::Config(instance) => instance.get(discriminator),
            _ => return Err(Self::mismatch("object", value, path)),
        }
        .ok_or_else(|| ValidationError::MissingDiscriminator {
            discriminator: discriminator.clone(),
            path: path.into(),
        })?
        .to_json();

        let variant_schema =
            union
                .choice(&tag)
                .ok_or_else(|| ValidationError::UnknownDiscriminatorValue {
                    discriminator: discriminator.clone(),
                    value: display_tag(&tag),
                    allowed_values: union
                        .choices
                        .iter()
                        .map(|(t, _)| display_tag(t))
                        .collect(),
                    path: path.into(),
                })?;

        Self::validate_with_path(value, variant_schema, path).map_err(|e| {
            ValidationError::VariantValidationFailed {
                discriminator: discriminator.clone(),
                value: display_tag(&tag),
                path: path.into(),
                error: Box::new(e),
            }
        })
    }

    pub(crate) fn property_path(path: &str, property: &str) -> String {
        if path.is_empty() {
            format!("[{property}]")
        } else {
            format!("{path}.{property}")
        }
    }

    fn mismatch(expected: &str, value: &ConfigValue, path: &str) -> ValidationError {
        ValidationError::TypeMismatch {
            expected: expected.into(),
            actual: value.type_name().into(),
            path: path.into(),
        }
    }
}
