// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::fmt;

use indexmap::IndexMap;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::model::ModelRef;
use crate::schema::error::ValidationError;
use crate::schema::validate::SchemaValidator;
use crate::Value;

/// Data flowing into and out of validation.
///
/// Mirrors JSON, plus two variants JSON cannot express: the `Missing` marker for fields
/// that have deliberately not been given a value yet, and validated config instances.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Missing,
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<ConfigValue>),
    Map(IndexMap<String, ConfigValue>),
    Config(ConfigInstance),
}

impl ConfigValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, ConfigValue::Missing)
    }

    pub fn as_config(&self) -> Option<&ConfigInstance> {
        match self {
            ConfigValue::Config(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Dumps the value to JSON. `Missing` becomes `null`.
    pub fn to_json(&self) -> Value {
        match self {
            ConfigValue::Missing | ConfigValue::Null => Value::Null,
            ConfigValue::Bool(b) => Value::Bool(*b),
            ConfigValue::Number(n) => Value::Number(n.clone()),
            ConfigValue::String(s) => Value::String(s.clone()),
            ConfigValue::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            ConfigValue::Map(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            ConfigValue::Config(instance) => instance.to_json(),
        }
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Missing => "missing",
            ConfigValue::Null => "null",
            ConfigValue::Bool(_) => "boolean",
            ConfigValue::Number(_) => "number",
            ConfigValue::String(_) => "string",
            ConfigValue::Array(_) => "array",
            ConfigValue::Map(_) => "object",
            ConfigValue::Config(_) => "config",
        }
    }
}

impl From<Value> for ConfigValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ConfigValue::Null,
            Value::Bool(b) => ConfigValue::Bool(b),
            Value::Number(n) => ConfigValue::Number(n),
            Value::String(s) => ConfigValue::String(s),
            Value::Array(items) => ConfigValue::Array(items.into_iter().map(Into::into).collect()),
            Value::Object(fields) => {
                ConfigValue::Map(fields.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<ConfigInstance> for ConfigValue {
    fn from(instance: ConfigInstance) -> Self {
        ConfigValue::Config(instance)
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_string())
    }
}

impl From<i32> for ConfigValue {
    fn from(n: i32) -> Self {
        ConfigValue::Number(n.into())
    }
}

impl From<i64> for ConfigValue {
    fn from(n: i64) -> Self {
        ConfigValue::Number(n.into())
    }
}

impl From<u64> for ConfigValue {
    fn from(n: u64) -> Self {
        ConfigValue::Number(n.into())
    }
}

impl From<f64> for ConfigValue {
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n).map_or(ConfigValue::Null, ConfigValue::Number)
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::String(s)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

impl Serialize for ConfigValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            ConfigValue::Missing | ConfigValue::Null => serializer.serialize_none(),
            ConfigValue::Bool(b) => serializer.serialize_bool(*b),
            ConfigValue::Number(n) => n.serialize(serializer),
            ConfigValue::String(s) => serializer.serialize_str(s),
            ConfigValue::Array(items) => items.serialize(serializer),
            ConfigValue::Map(fields) => fields.serialize(serializer),
            ConfigValue::Config(instance) => instance.serialize(serializer),
        }
    }
}

/// A value of a config model.
///
/// Instances produced by validation are final. Drafts come from
/// [`ModelType::draft`](crate::ModelType::draft), accept any field assignment, and become
/// final through [`finalize`](Self::finalize).
#[derive(Clone)]
pub struct ConfigInstance {
    model: ModelRef,
    fields: IndexMap<String, ConfigValue>,
    draft: bool,
}

impl ConfigInstance {
    pub(crate) fn new(model: ModelRef, fields: IndexMap<String, ConfigValue>, draft: bool) -> Self {
        Self {
            model,
            fields,
            draft,
        }
    }

    pub fn model(&self) -> &ModelRef {
        &self.model
    }

    /// Whether this is an instance of `model` or of one of its subtypes.
    pub fn is_instance_of(&self, model: &ModelRef) -> bool {
        self.model.is_subtype_of(model)
    }

    pub fn get(&self, field: &str) -> Option<&ConfigValue> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &IndexMap<String, ConfigValue> {
        &self.fields
    }

    pub fn is_draft(&self) -> bool {
        self.draft
    }

    /// Assigns a field.
    ///
    /// Drafts store the value as given. Final instances validate it against the field's
    /// compiled schema first and reject unknown fields.
    pub fn set(&mut self, field: &str, value: impl Into<ConfigValue>) -> Result<(), ValidationError> {
        let value = value.into();
        if self.draft {
            self.fields.insert(field.to_string(), value);
            return Ok(());
        }

        let validated = self.model.validate_assignment(field, &value)?;
        self.fields.insert(field.to_string(), validated);
        Ok(())
    }

    /// Re-validates a draft against its model and returns the final instance.
    pub fn finalize(&self) -> Result<ConfigInstance, ValidationError> {
        if !self.draft {
            return Err(ValidationError::NotADraft {
                model: self.model.name().to_string(),
            });
        }
        self.model
            .validate_with_path(&ConfigValue::Map(self.fields.clone()), "")
    }

    /// Fails on the first field still holding the `Missing` marker, searching nested
    /// config instances too.
    pub fn validate_no_missing(&self) -> Result<(), ValidationError> {
        self.check_no_missing("")
    }

    fn check_no_missing(&self, path: &str) -> Result<(), ValidationError> {
        for (name, value) in self.fields.iter() {
            let field_path = SchemaValidator::property_path(path, name);
            match value {
                ConfigValue::Missing => {
                    return Err(ValidationError::MissingValue { path: field_path })
                }
                ConfigValue::Config(nested) => nested.check_no_missing(&field_path)?,
                _ => {}
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_yaml_string(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

impl PartialEq for ConfigInstance {
    fn eq(&self, other: &Self) -> bool {
        std::sync::Arc::ptr_eq(&self.model, &other.model)
            && self.draft == other.draft
            && self.fields == other.fields
    }
}

impl fmt::Debug for ConfigInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.model.name());
        for (name, value) in self.fields.iter() {
            s.field(name, value);
        }
        if self.draft {
            s.field("<draft>", &true);
        }
        s.finish()
    }
}

impl Serialize for ConfigInstance {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in self.fields.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
