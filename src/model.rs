// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(clippy::pattern_type_mismatch)]

//! Composite config types.
//!
//! A [`ModelType`] is a named set of typed fields, optionally extending a parent model.
//! Models are shared as [`ModelRef`] and compared by identity. Each model lazily compiles
//! and caches a validator for its fields; [`ModelType::force_rebuild`] replaces that cache,
//! which is how registries make later registrations visible to models that embed them.

use core::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::compile::{compile_validator, CompileError, CompiledValidator};
use crate::registry::{rebuild::Rebuild, scan::find_registries, Registry};
use crate::schema::{error::ValidationError, validate::SchemaValidator, Schema};
use crate::value::{ConfigInstance, ConfigValue};
use crate::Value;

pub type ModelRef = Arc<ModelType>;

/// Value a field takes when the input omits it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldDefault {
    #[default]
    Required,
    /// The field starts out as [`ConfigValue::Missing`].
    Missing,
    Value(Value),
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub schema: Schema,
    pub default: FieldDefault,
}

/// The compiled form of a model's fields.
#[derive(Debug)]
pub struct CompiledModel {
    fields: IndexMap<String, (CompiledValidator, FieldDefault)>,
}

impl CompiledModel {
    pub fn field(&self, name: &str) -> Option<&CompiledValidator> {
        self.fields.get(name).map(|(validator, _)| validator)
    }
}

pub struct ModelType {
    name: String,
    parent: Option<ModelRef>,
    fields: IndexMap<String, Field>,
    forbid_extra: bool,
    validator: RwLock<Option<Arc<CompiledModel>>>,
}

impl ModelType {
    pub fn builder(name: impl Into<String>) -> ModelBuilder {
        ModelBuilder {
            name: name.into(),
            parent: None,
            fields: Vec::new(),
            forbid_extra: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&ModelRef> {
        self.parent.as_ref()
    }

    /// Declared fields, inherited ones first.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    pub fn forbids_extra(&self) -> bool {
        self.forbid_extra
    }

    /// Whether `base` is this model or one of its ancestors.
    pub fn is_subtype_of(&self, base: &ModelType) -> bool {
        let mut current = Some(self);
        while let Some(model) = current {
            if core::ptr::eq(model, base) {
                return true;
            }
            current = model.parent.as_deref();
        }
        false
    }

    pub fn resolve_declared_field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// The cached validator, compiled on first use.
    pub fn validator(&self) -> Result<Arc<CompiledModel>, CompileError> {
        if let Some(compiled) = self.validator.read().as_ref() {
            return Ok(compiled.clone());
        }

        let compiled = Arc::new(self.compile()?);
        let mut slot = self.validator.write();
        Ok(slot.get_or_insert(compiled).clone())
    }

    /// Recompiles the validator and replaces the cached one.
    ///
    /// On failure the cache is emptied, so the next validation compiles again.
    pub fn force_rebuild(&self) -> Result<(), CompileError> {
        match self.compile() {
            Ok(compiled) => {
                *self.validator.write() = Some(Arc::new(compiled));
                Ok(())
            }
            Err(e) => {
                *self.validator.write() = None;
                Err(e)
            }
        }
    }

    fn compile(&self) -> Result<CompiledModel, CompileError> {
        let mut fields = IndexMap::with_capacity(self.fields.len());
        for (name, field) in self.fields.iter() {
            let validator =
                compile_validator(&field.schema).map_err(|e| CompileError::Field {
                    model: self.name.clone(),
                    field: name.clone(),
                    source: Box::new(e),
                })?;
            fields.insert(name.clone(), (validator, field.default.clone()));
        }
        Ok(CompiledModel { fields })
    }

    pub fn validate(self: &Arc<Self>, value: &ConfigValue) -> Result<ConfigInstance, ValidationError> {
        self.validate_with_path(value, "")
    }

    pub fn validate_json(self: &Arc<Self>, value: Value) -> Result<ConfigInstance, ValidationError> {
        self.validate(&ConfigValue::from(value))
    }

    pub fn from_json_str(self: &Arc<Self>, s: &str) -> crate::Result<ConfigInstance> {
        let value: Value = serde_json::from_str(s)?;
        Ok(self.validate_json(value)?)
    }

    pub fn from_yaml_str(self: &Arc<Self>, s: &str) -> crate::Result<ConfigInstance> {
        let value: Value = serde_yaml::from_str(s)?;
        Ok(self.validate_json(value)?)
    }

    /// Starts an unvalidated instance. See [`ConfigInstance::finalize`].
    pub fn draft<K, V>(self: &Arc<Self>, values: impl IntoIterator<Item = (K, V)>) -> ConfigInstance
    where
        K: Into<String>,
        V: Into<ConfigValue>,
    {
        let fields = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        ConfigInstance::new(self.clone(), fields, true)
    }

    pub(crate) fn validate_with_path(
        self: &Arc<Self>,
        value: &ConfigValue,
        path: &str,
    ) -> Result<ConfigInstance, ValidationError> {
        let input = match value {
            ConfigValue::Map(fields) => fields,
            ConfigValue::Config(instance) => {
                if !instance.is_instance_of(self) {
                    return Err(ValidationError::NotASubtype {
                        expected: self.name.clone(),
                        actual: instance.model().name().to_string(),
                        path: path.into(),
                    });
                }
                if !instance.is_draft() {
                    return Ok(instance.clone());
                }
                if !Arc::ptr_eq(instance.model(), self) {
                    return instance.model().validate_with_path(value, path);
                }
                instance.fields()
            }
            other => {
                return Err(ValidationError::TypeMismatch {
                    expected: self.name.clone(),
                    actual: other.type_name().into(),
                    path: path.into(),
                })
            }
        };

        let compiled = self
            .validator()
            .map_err(|e| ValidationError::ModelUnavailable {
                model: self.name.clone(),
                reason: e.to_string(),
                path: path.into(),
            })?;

        let mut fields = IndexMap::with_capacity(compiled.fields.len());
        for (name, (validator, default)) in compiled.fields.iter() {
            let field_path = SchemaValidator::property_path(path, name);
            let validated = match (input.get(name), default) {
                (Some(ConfigValue::Missing), FieldDefault::Missing) => Ok(ConfigValue::Missing),
                (Some(v), _) => validator.validate_with_path(v, &field_path),
                (None, FieldDefault::Required) => {
                    return Err(ValidationError::MissingRequiredProperty {
                        property: name.clone(),
                        path: path.into(),
                    })
                }
                (None, FieldDefault::Missing) => Ok(ConfigValue::Missing),
                (None, FieldDefault::Value(v)) => {
                    validator.validate_with_path(&ConfigValue::from(v.clone()), &field_path)
                }
            }
            .map_err(|e| ValidationError::PropertyValidationFailed {
                property: name.clone(),
                path: path.into(),
                error: Box::new(e),
            })?;
            fields.insert(name.clone(), validated);
        }

        for (name, v) in input.iter() {
            if compiled.fields.contains_key(name) {
                continue;
            }
            if self.forbid_extra {
                return Err(ValidationError::AdditionalPropertiesNotAllowed {
                    property: name.clone(),
                    path: path.into(),
                });
            }
            fields.insert(name.clone(), v.clone());
        }

        Ok(ConfigInstance::new(self.clone(), fields, false))
    }

    /// Validates a single field assignment on a final instance.
    pub(crate) fn validate_assignment(
        &self,
        field: &str,
        value: &ConfigValue,
    ) -> Result<ConfigValue, ValidationError> {
        let compiled = self
            .validator()
            .map_err(|e| ValidationError::ModelUnavailable {
                model: self.name.clone(),
                reason: e.to_string(),
                path: String::new(),
            })?;

        let Some((validator, default)) = compiled.fields.get(field) else {
            if self.forbid_extra {
                return Err(ValidationError::AdditionalPropertiesNotAllowed {
                    property: field.into(),
                    path: String::new(),
                });
            }
            return Ok(value.clone());
        };

        if value.is_missing() && *default == FieldDefault::Missing {
            return Ok(ConfigValue::Missing);
        }
        validator.validate_with_path(value, &SchemaValidator::property_path("", field))
    }
}

impl fmt::Debug for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelType")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Rebuild for ModelType {
    fn rebuild_target(&self) -> String {
        self.name.clone()
    }

    fn force_rebuild(&self) -> Result<(), CompileError> {
        ModelType::force_rebuild(self)
    }
}

pub struct ModelBuilder {
    name: String,
    parent: Option<ModelRef>,
    fields: Vec<Field>,
    forbid_extra: Option<bool>,
}

impl ModelBuilder {
    /// Inherits every field of `parent`. The new model is a subtype of it.
    pub fn extends(mut self, parent: &ModelRef) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    pub fn field(self, name: impl Into<String>, schema: Schema) -> Self {
        self.field_with_default(name, schema, FieldDefault::Required)
    }

    pub fn field_with_default(
        mut self,
        name: impl Into<String>,
        schema: Schema,
        default: FieldDefault,
    ) -> Self {
        self.fields.push(Field {
            name: name.into(),
            schema,
            default,
        });
        self
    }

    /// Whether unknown input keys are rejected. Inherited from the parent, `true` otherwise.
    pub fn forbid_extra(mut self, forbid: bool) -> Self {
        self.forbid_extra = Some(forbid);
        self
    }

    /// Defines the model.
    ///
    /// Every registry found in the field schemas with auto-rebuild enabled subscribes the
    /// new model, so later registrations reach its validator.
    pub fn build(self) -> ModelRef {
        let mut fields = self
            .parent
            .as_ref()
            .map(|p| p.fields.clone())
            .unwrap_or_default();
        for field in self.fields {
            fields.insert(field.name.clone(), field);
        }

        let forbid_extra = self
            .forbid_extra
            .or_else(|| self.parent.as_ref().map(|p| p.forbid_extra))
            .unwrap_or(true);

        let model = Arc::new(ModelType {
            name: self.name,
            parent: self.parent,
            fields,
            forbid_extra,
            validator: RwLock::new(None),
        });
        on_definition(&model);
        model
    }
}

/// Construction hook: wires the new model to the registries its fields embed.
fn on_definition(model: &ModelRef) {
    let mut registries: Vec<Arc<Registry>> = Vec::new();
    for field in model.fields.values() {
        for registry in find_registries(&field.schema) {
            if !registries.iter().any(|r| Arc::ptr_eq(r, &registry)) {
                registries.push(registry);
            }
        }
    }

    for registry in registries {
        registry.rebuild_on_registers_if_auto_rebuild(model);
    }
}
