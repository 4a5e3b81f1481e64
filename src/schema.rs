// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(clippy::pattern_type_mismatch)]

//! Type descriptions.
//!
//! A [`Schema`] describes the shape a value must have. Schemas are immutable and cheap to
//! clone; two clones of one schema share the same [`Type`] allocation, which is what
//! [`Schema::ptr_eq`] compares.
//!
//! Leaf and container types can be written in a subset of JSON Schema and deserialized with
//! serde:
//!
//! ```json
//! {
//!   "type": "object",
//!   "additionalProperties": { "type": "integer", "minimum": 0 }
//! }
//! ```
//!
//! Types that refer to runtime objects (config models, tagged unions built by a registry,
//! annotated fields carrying a [`SchemaContributor`]) cannot be deserialized and are built
//! with the constructors on [`Schema`].
//!
//! Type construction follows a few rules:
//!     - Unsupported JSON Schema keywords are rejected during deserialization instead of being ignored.
//!     - `anyOf`, `const` and `enum` have no `type` field and are detected before the tagged variants.
//!     - `Annotated` layers never change what a value is, only what is known about the field holding it.
use core::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};

use crate::compile::{CompileError, SchemaHandler};
use crate::model::ModelRef;
use crate::registry::Registry;
use crate::value::ConfigValue;
use crate::Value;

pub mod error;
pub mod validate;

/// A type description that can be compiled into a validator.
#[derive(Debug, Clone)]
pub struct Schema {
    t: Arc<Type>,
}

impl Schema {
    pub fn new(t: Type) -> Self {
        Schema { t: Arc::new(t) }
    }

    /// Returns a reference to the underlying type definition.
    pub fn as_type(&self) -> &Type {
        &self.t
    }

    /// Whether both handles point at the same type allocation.
    pub fn ptr_eq(&self, other: &Schema) -> bool {
        Arc::ptr_eq(&self.t, &other.t)
    }

    pub(crate) fn type_ptr(&self) -> *const Type {
        Arc::as_ptr(&self.t)
    }

    pub fn any() -> Self {
        Schema::new(Type::Any { description: None })
    }

    pub fn null() -> Self {
        Schema::new(Type::Null { description: None })
    }

    pub fn boolean() -> Self {
        Schema::new(Type::Boolean { description: None })
    }

    pub fn integer() -> Self {
        Schema::new(Type::Integer {
            description: None,
            minimum: None,
            maximum: None,
        })
    }

    pub fn number() -> Self {
        Schema::new(Type::Number {
            description: None,
            minimum: None,
            maximum: None,
        })
    }

    pub fn string() -> Self {
        Schema::new(Type::String {
            description: None,
            min_length: None,
            max_length: None,
            pattern: None,
        })
    }

    /// A literal type permitting exactly one value.
    pub fn literal(value: impl Into<Value>) -> Self {
        Schema::new(Type::Const {
            description: None,
            value: value.into(),
        })
    }

    /// A literal type permitting any of `values`.
    pub fn literals<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Schema::new(Type::Enum {
            description: None,
            values: Arc::new(values.into_iter().map(Into::into).collect()),
        })
    }

    pub fn list(items: Schema) -> Self {
        Schema::new(Type::Array {
            description: None,
            items,
            min_items: None,
            max_items: None,
        })
    }

    /// A mapping from string keys to values of `values`.
    pub fn map(values: Schema) -> Self {
        Schema::new(Type::Map {
            description: None,
            values,
        })
    }

    pub fn any_of(variants: Vec<Schema>) -> Self {
        Schema::new(Type::AnyOf(Arc::new(variants)))
    }

    /// `inner` or `null`.
    pub fn optional(inner: Schema) -> Self {
        Schema::any_of(vec![inner, Schema::null()])
    }

    pub fn model(model: &ModelRef) -> Self {
        Schema::new(Type::Model(model.clone()))
    }

    pub fn tagged_union(discriminator: impl Into<String>, choices: Vec<(Value, Schema)>) -> Self {
        Schema::new(Type::TaggedUnion(Arc::new(TaggedUnion {
            discriminator: discriminator.into(),
            choices,
        })))
    }

    /// A type no value satisfies. Validation fails with `message`.
    pub fn invalid(message: impl Into<String>) -> Self {
        Schema::new(Type::Invalid {
            message: message.into(),
        })
    }

    /// Wraps this schema in an annotation layer carrying `metadata`.
    pub fn annotated(self, metadata: Metadata) -> Self {
        self.annotated_with(vec![metadata])
    }

    pub fn annotated_with(self, metadata: Vec<Metadata>) -> Self {
        Schema::new(Type::Annotated {
            inner: self,
            metadata: Arc::new(metadata),
        })
    }

    /// Marks the field as accepting the `Missing` marker.
    pub fn allow_missing(self) -> Self {
        self.annotated(Metadata::AllowMissing)
    }

    pub fn describe(self, text: impl Into<String>) -> Self {
        self.annotated(Metadata::Description(text.into()))
    }

    /// Strips every `Annotated` layer and returns the innermost schema.
    pub fn unwrap_annotated(&self) -> &Schema {
        let mut schema = self;
        while let Type::Annotated { inner, .. } = schema.as_type() {
            schema = inner;
        }
        schema
    }

    /// Whether any annotation layer on this schema carries [`Metadata::AllowMissing`].
    pub fn allows_missing(&self) -> bool {
        let mut schema = self;
        while let Type::Annotated { inner, metadata } = schema.as_type() {
            if metadata.iter().any(|m| matches!(m, Metadata::AllowMissing)) {
                return true;
            }
            schema = inner;
        }
        false
    }

    /// Parse a JSON Schema document into a `Schema` instance.
    /// Provides better error messages than `serde_json::from_value`.
    pub fn from_serde_json_value(
        schema: serde_json::Value,
    ) -> Result<Self, Box<dyn core::error::Error + Send + Sync>> {
        let schema = serde_json::from_value::<Schema>(schema)
            .map_err(|e| format!("Failed to parse schema: {e}"))?;
        Ok(schema)
    }

    /// Parse a JSON Schema document from a string into a `Schema` instance.
    pub fn from_json_str(s: &str) -> Result<Self, Box<dyn core::error::Error + Send + Sync>> {
        let value: serde_json::Value =
            serde_json::from_str(s).map_err(|e| format!("Failed to parse schema: {e}"))?;
        Self::from_serde_json_value(value)
    }

    /// Validates `value` against this schema as written.
    ///
    /// Contributor annotations are not resolved here; use
    /// [`compile_validator`](crate::compile_validator) for schemas that embed registries.
    pub fn validate(&self, value: &ConfigValue) -> Result<ConfigValue, error::ValidationError> {
        validate::SchemaValidator::validate(value, self)
    }
}

impl<'de> Deserialize<'de> for Schema {
    /// Deserializes the JSON Schema subset into a `Schema`.
    ///
    /// `anyOf`, `const` and `enum` documents are recognized by their keyword; every other
    /// document must carry a `type` field naming one of the tagged [`Type`] variants.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v: serde_json::Value = Deserialize::deserialize(deserializer)?;
        if v.get("anyOf").is_some() {
            #[derive(Deserialize)]
            #[serde(deny_unknown_fields)]
            struct AnyOf {
                #[serde(rename = "anyOf")]
                variants: Vec<Schema>,
            }
            let any_of: AnyOf = Deserialize::deserialize(v)
                .map_err(|e| serde::de::Error::custom(format!("{e}")))?;
            return Ok(Schema::any_of(any_of.variants));
        }

        if v.get("const").is_some() {
            #[derive(Deserialize)]
            #[serde(deny_unknown_fields)]
            struct Const {
                #[serde(rename = "const")]
                value: Value,
                description: Option<String>,
            }
            let const_schema: Const = Deserialize::deserialize(v)
                .map_err(|e| serde::de::Error::custom(format!("{e}")))?;
            return Ok(Schema::new(Type::Const {
                description: const_schema.description,
                value: const_schema.value,
            }));
        }

        if v.get("enum").is_some() {
            #[derive(Deserialize)]
            #[serde(deny_unknown_fields)]
            struct Enum {
                #[serde(rename = "enum")]
                values: Vec<Value>,
                description: Option<String>,
            }
            let enum_schema: Enum = Deserialize::deserialize(v)
                .map_err(|e| serde::de::Error::custom(format!("{e}")))?;
            return Ok(Schema::new(Type::Enum {
                description: enum_schema.description,
                values: Arc::new(enum_schema.values),
            }));
        }

        let t: Type =
            Deserialize::deserialize(v).map_err(|e| serde::de::Error::custom(format!("{e}")))?;
        Ok(Schema::new(t))
    }
}

#[derive(Debug, Clone, Deserialize)]
// Use `type` when deserializing to discriminate between different types.
#[serde(tag = "type")]
// match JSON Schema casing.
#[serde(rename_all = "camelCase")]
// Raise error if unsupported fields are encountered.
#[serde(deny_unknown_fields)]
pub enum Type {
    /// Accepts any value.
    ///
    /// ```json
    /// { "type": "any" }
    /// ```
    Any { description: Option<String> },

    /// A 64-bit signed integer with optional bounds.
    ///
    /// ```json
    /// { "type": "integer", "minimum": 0, "maximum": 100 }
    /// ```
    Integer {
        description: Option<String>,
        minimum: Option<i64>,
        maximum: Option<i64>,
    },

    /// A floating-point number with optional bounds.
    Number {
        description: Option<String>,
        minimum: Option<f64>,
        maximum: Option<f64>,
    },

    Boolean { description: Option<String> },

    Null { description: Option<String> },

    /// A string with optional length and pattern constraints.
    ///
    /// ```json
    /// { "type": "string", "minLength": 1, "pattern": "^[a-z]+$" }
    /// ```
    #[serde(rename_all = "camelCase")]
    String {
        description: Option<String>,
        min_length: Option<usize>,
        max_length: Option<usize>,
        pattern: Option<String>,
    },

    /// A list of `items`.
    ///
    /// ```json
    /// { "type": "array", "items": { "type": "string" }, "minItems": 1 }
    /// ```
    #[serde(rename_all = "camelCase")]
    Array {
        description: Option<String>,
        items: Schema,
        min_items: Option<usize>,
        max_items: Option<usize>,
    },

    /// A mapping from string keys to `values`.
    ///
    /// Written as a JSON Schema object that only constrains its additional properties:
    /// ```json
    /// { "type": "object", "additionalProperties": { "type": "boolean" } }
    /// ```
    #[serde(rename = "object")]
    Map {
        description: Option<String>,
        #[serde(rename = "additionalProperties")]
        values: Schema,
    },

    /// A single-value literal. This is the only shape a discriminator field may take.
    ///
    /// Deserialization is handled by the `Schema` deserializer (`{ "const": "dog" }`).
    #[serde(skip)]
    Const {
        description: Option<String>,
        value: Value,
    },

    /// A literal permitting several values (`{ "enum": ["dog", "puppy"] }`).
    #[serde(skip)]
    Enum {
        description: Option<String>,
        values: Arc<Vec<Value>>,
    },

    /// Untagged union; the first member that accepts the value wins.
    #[serde(skip)]
    AnyOf(Arc<Vec<Schema>>),

    /// A composite config type, validated by the model's own compiled validator.
    #[serde(skip)]
    Model(ModelRef),

    /// A union dispatched on the value of one field.
    #[serde(skip)]
    TaggedUnion(Arc<TaggedUnion>),

    /// Never validates. Used where no real type can be produced yet.
    #[serde(skip)]
    Invalid { message: String },

    /// `inner` plus per-field metadata.
    #[serde(skip)]
    Annotated {
        inner: Schema,
        metadata: Arc<Vec<Metadata>>,
    },
}

impl Type {
    /// Short human readable name of the variant, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Type::Any { .. } => "any",
            Type::Integer { .. } => "integer",
            Type::Number { .. } => "number",
            Type::Boolean { .. } => "boolean",
            Type::Null { .. } => "null",
            Type::String { .. } => "string",
            Type::Array { .. } => "array",
            Type::Map { .. } => "map",
            Type::Const { .. } => "literal",
            Type::Enum { .. } => "multi-value literal",
            Type::AnyOf(_) => "union",
            Type::Model(_) => "model",
            Type::TaggedUnion(_) => "tagged union",
            Type::Invalid { .. } => "invalid",
            Type::Annotated { .. } => "annotated",
        }
    }
}

/// Choices of a discriminated union, keyed by tag in insertion order.
#[derive(Debug, Clone)]
pub struct TaggedUnion {
    pub discriminator: String,
    pub choices: Vec<(Value, Schema)>,
}

impl TaggedUnion {
    pub fn choice(&self, tag: &Value) -> Option<&Schema> {
        self.choices
            .iter()
            .find(|(candidate, _)| crate::registry::tag::same_tag(candidate, tag))
            .map(|(_, schema)| schema)
    }
}

/// Per-field metadata carried by [`Type::Annotated`].
#[derive(Debug, Clone)]
pub enum Metadata {
    Description(String),
    /// The field may hold [`ConfigValue::Missing`].
    AllowMissing,
    /// Replaces the annotated schema at compile time.
    Contributor(Arc<dyn SchemaContributor>),
}

/// Something that supplies the compiled schema of a field it annotates.
///
/// The schema compiler calls [`provide_compiled_schema`](Self::provide_compiled_schema) each time
/// it compiles a schema containing the annotation, so the answer may change between compilations.
pub trait SchemaContributor: fmt::Debug + Send + Sync {
    fn provide_compiled_schema(&self, handler: &SchemaHandler<'_>) -> Result<Schema, CompileError>;

    /// Returns the contributor as a registry when it is one.
    fn as_registry(self: Arc<Self>) -> Option<Arc<Registry>> {
        None
    }
}
