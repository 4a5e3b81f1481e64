// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(clippy::use_debug, clippy::pattern_type_mismatch)]

use core::fmt;

/// Validation errors that can occur when validating a value against a compiled schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Value type does not match the expected schema type.
    TypeMismatch {
        expected: String,
        actual: String,
        path: String,
    },
    /// Numeric value is outside the allowed range.
    OutOfRange {
        value: String,
        min: Option<String>,
        max: Option<String>,
        path: String,
    },
    /// String length constraint violation.
    LengthConstraint {
        actual_length: usize,
        min_length: Option<usize>,
        max_length: Option<usize>,
        path: String,
    },
    /// String does not match required pattern.
    PatternMismatch {
        value: String,
        pattern: String,
        path: String,
    },
    /// Array size constraint violation.
    ArraySizeConstraint {
        actual_size: usize,
        min_items: Option<usize>,
        max_items: Option<usize>,
        path: String,
    },
    /// Required field is absent and has no default.
    MissingRequiredProperty { property: String, path: String },
    /// A field failed validation.
    PropertyValidationFailed {
        property: String,
        path: String,
        error: Box<ValidationError>,
    },
    /// Unknown field on a model that forbids extras.
    AdditionalPropertiesNotAllowed { property: String, path: String },
    /// Value is not one of the allowed literal values.
    NotInEnum {
        value: String,
        allowed_values: Vec<String>,
        path: String,
    },
    /// Value does not match the required constant.
    ConstMismatch {
        expected: String,
        actual: String,
        path: String,
    },
    /// Value does not match any schema in a union (anyOf).
    NoUnionMatch {
        path: String,
        errors: Vec<ValidationError>,
    },
    /// Invalid regex pattern in schema.
    InvalidPattern { pattern: String, error: String },
    /// Array item validation failed.
    ArrayItemValidationFailed {
        index: usize,
        path: String,
        error: Box<ValidationError>,
    },
    /// Missing discriminator field in a tagged union input.
    MissingDiscriminator { discriminator: String, path: String },
    /// Discriminator value matches no tag of the union.
    UnknownDiscriminatorValue {
        discriminator: String,
        value: String,
        allowed_values: Vec<String>,
        path: String,
    },
    /// The variant selected by the discriminator rejected the value.
    VariantValidationFailed {
        discriminator: String,
        value: String,
        path: String,
        error: Box<ValidationError>,
    },
    /// The value reached an invalid type.
    Invalid { message: String, path: String },
    /// A `Missing` value where a real one is required.
    MissingValue { path: String },
    /// A config instance of an unrelated model.
    NotASubtype {
        expected: String,
        actual: String,
        path: String,
    },
    /// The model's validator could not be compiled.
    ModelUnavailable {
        model: String,
        reason: String,
        path: String,
    },
    /// `finalize` called on an instance that is not a draft.
    NotADraft { model: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::TypeMismatch {
                expected,
                actual,
                path,
            } => {
                write!(
                    f,
                    "Type mismatch at '{path}': expected {expected}, got {actual}"
                )
            }
            ValidationError::OutOfRange {
                value,
                min,
                max,
                path,
            } => {
                let range_desc = match (min, max) {
                    (Some(min), Some(max)) => format!("between {min} and {max}"),
                    (Some(min), None) => format!("at least {min}"),
                    (None, Some(max)) => format!("at most {max}"),
                    (None, None) => "within valid range".to_string(),
                };
                write!(
                    f,
                    "Value {value} at '{path}' is out of range: must be {range_desc}"
                )
            }
            ValidationError::LengthConstraint {
                actual_length,
                min_length,
                max_length,
                path,
            } => {
                let constraint_desc = match (min_length, max_length) {
                    (Some(min), Some(max)) => format!("between {min} and {max} characters"),
                    (Some(min), None) => format!("at least {min} characters"),
                    (None, Some(max)) => format!("at most {max} characters"),
                    (None, None) => "within valid length".to_string(),
                };
                write!(
                    f,
                    "String length {actual_length} at '{path}' violates constraint: must be {constraint_desc}"
                )
            }
            ValidationError::PatternMismatch {
                value,
                pattern,
                path,
            } => {
                write!(
                    f,
                    "String '{value}' at '{path}' does not match pattern '{pattern}'"
                )
            }
            ValidationError::ArraySizeConstraint {
                actual_size,
                min_items,
                max_items,
                path,
            } => {
                let constraint_desc = match (min_items, max_items) {
                    (Some(min), Some(max)) => format!("between {min} and {max} items"),
                    (Some(min), None) => format!("at least {min} items"),
                    (None, Some(max)) => format!("at most {max} items"),
                    (None, None) => "within valid size".to_string(),
                };
                write!(
                    f,
                    "Array size {actual_size} at '{path}' violates constraint: must have {constraint_desc}"
                )
            }
            ValidationError::MissingRequiredProperty { property, path } => {
                write!(f, "Missing required property '{property}' at '{path}'")
            }
            ValidationError::PropertyValidationFailed {
                property,
                path,
                error,
            } => {
                write!(
                    f,
                    "Property '{property}' at '{path}' failed validation: {error}"
                )
            }
            ValidationError::AdditionalPropertiesNotAllowed { property, path } => {
                write!(
                    f,
                    "Additional property '{property}' not allowed at '{path}'"
                )
            }
            ValidationError::NotInEnum {
                value,
                allowed_values,
                path,
            } => {
                write!(
                    f,
                    "Value '{value}' at '{path}' is not in allowed literal values: [{}]",
                    allowed_values.join(", ")
                )
            }
            ValidationError::ConstMismatch {
                expected,
                actual,
                path,
            } => {
                write!(
                    f,
                    "Constant mismatch at '{path}': expected '{expected}', got '{actual}'"
                )
            }
            ValidationError::NoUnionMatch { path, errors } => {
                write!(
                    f,
                    "Value at '{path}' does not match any schema in union. Errors: {errors:?}"
                )
            }
            ValidationError::InvalidPattern { pattern, error } => {
                write!(f, "Invalid regex pattern '{pattern}': {error}")
            }
            ValidationError::ArrayItemValidationFailed { index, path, error } => {
                write!(
                    f,
                    "Array item {index} at '{path}' failed validation: {error}"
                )
            }
            ValidationError::MissingDiscriminator {
                discriminator,
                path,
            } => {
                write!(
                    f,
                    "Missing discriminator field '{discriminator}' at '{path}'"
                )
            }
            ValidationError::UnknownDiscriminatorValue {
                discriminator,
                value,
                allowed_values,
                path,
            } => {
                write!(
                    f,
                    "Unknown discriminator value '{value}' for field '{discriminator}' at '{path}'. Allowed values: [{}]",
                    allowed_values.join(", ")
                )
            }
            ValidationError::VariantValidationFailed {
                discriminator,
                value,
                path,
                error,
            } => {
                write!(
                    f,
                    "Variant validation failed for discriminator '{discriminator}' with value '{value}' at '{path}': {error}"
                )
            }
            ValidationError::Invalid { message, path } => {
                write!(f, "Invalid value at '{path}': {message}")
            }
            ValidationError::MissingValue { path } => {
                write!(
                    f,
                    "Field '{path}' is still `MISSING`. Please provide a value for it."
                )
            }
            ValidationError::NotASubtype {
                expected,
                actual,
                path,
            } => {
                write!(
                    f,
                    "Instance of {actual} at '{path}' is not an instance of {expected}"
                )
            }
            ValidationError::ModelUnavailable {
                model,
                reason,
                path,
            } => {
                write!(
                    f,
                    "Model {model} at '{path}' has no usable validator: {reason}"
                )
            }
            ValidationError::NotADraft { model } => {
                write!(f, "Finalize can only be called on drafts ({model}).")
            }
        }
    }
}

impl core::error::Error for ValidationError {}
