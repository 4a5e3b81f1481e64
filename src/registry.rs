// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(clippy::pattern_type_mismatch)]

//! Dynamic discriminated-union registries.
//!
//! A [`Registry`] collects config models that share a base model and declare a
//! single-literal discriminator field. Its [`type_hint`](Registry::type_hint) is a tagged
//! union over whatever is registered at the time of the call, and embedding the registry
//! as field metadata ([`Registry::annotation`]) lets models validate against that union.
//!
//! Registrations made after a dependent model compiled its validator only reach it when
//! the dependent is subscribed through [`Registry::rebuild_on_registers`], which happens
//! automatically for models whose fields embed the registry while `auto_rebuild` is on.

use core::fmt::{self, Write as _};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::compile::compile_validator;
use crate::model::{ModelRef, ModelType};
use crate::schema::{error::ValidationError, Metadata, Schema};
use crate::value::{ConfigInstance, ConfigValue};
use crate::Value;

use self::error::ConfigurationError;
use self::policy::{handle_conflict, ConflictAction};
use self::rebuild::Subscription;
use self::tag::{display_tag, resolve_tag, same_tag};

pub mod compat;
pub mod error;
pub mod policy;
pub mod rebuild;
pub mod scan;
pub mod tag;
mod union;

#[cfg(test)]
mod tests {
    mod compat;
    mod policy;
    mod rebuild;
    mod register;
    mod scan;
    mod tag;
    mod union;
}

/// What `register` does when a new model declares a tag that is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateTagPolicy {
    /// Warn and keep the registered model. `register` returns the registered model.
    WarnAndIgnore,
    /// Warn, evict the registered model and register the new one.
    WarnAndReplace,
    #[default]
    Error,
}

/// Registry settings.
///
/// ```yaml
/// duplicate_tag_policy: warn-and-replace
/// auto_rebuild: false
/// name: animals
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    pub duplicate_tag_policy: DuplicateTagPolicy,
    /// Subscribe models embedding the registry when they are defined.
    pub auto_rebuild: bool,
    /// Name used in diagnostics instead of the base model and discriminator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            duplicate_tag_policy: DuplicateTagPolicy::Error,
            auto_rebuild: true,
            name: None,
        }
    }
}

/// A registered model and the tag it was registered under.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub tag: Value,
    pub model: ModelRef,
}

pub struct Registry {
    base: ModelRef,
    discriminator: String,
    config: RegistryConfig,
    entries: RwLock<Vec<RegistryEntry>>,
    subscriptions: RwLock<Vec<Subscription>>,
    invalid_fallback: OnceLock<Schema>,
}

impl Registry {
    pub fn new(base: &ModelRef, discriminator: impl Into<String>) -> Arc<Self> {
        Self::with_config(base, discriminator, RegistryConfig::default())
    }

    pub fn with_config(
        base: &ModelRef,
        discriminator: impl Into<String>,
        config: RegistryConfig,
    ) -> Arc<Self> {
        compat::warn_known_issues();
        Arc::new(Self {
            base: base.clone(),
            discriminator: discriminator.into(),
            config,
            entries: RwLock::new(Vec::new()),
            subscriptions: RwLock::new(Vec::new()),
            invalid_fallback: OnceLock::new(),
        })
    }

    pub fn base(&self) -> &ModelRef {
        &self.base
    }

    pub fn discriminator(&self) -> &str {
        &self.discriminator
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Registers `model` under the tag its discriminator field declares.
    ///
    /// Returns the registered model. Under [`DuplicateTagPolicy::WarnAndIgnore`] a tag
    /// conflict returns the model that already holds the tag instead of `model`.
    ///
    /// Register callbacks run after the entry is stored, in subscription order, with no
    /// registry lock held.
    pub fn register(&self, model: &ModelRef) -> Result<ModelRef, ConfigurationError> {
        if !model.is_subtype_of(&self.base) {
            return Err(ConfigurationError::NotASubtype {
                model: model.name().to_string(),
                base: self.base.name().to_string(),
            });
        }

        {
            let mut entries = self.entries.write();
            if entries.iter().any(|e| Arc::ptr_eq(&e.model, model)) {
                return Err(ConfigurationError::AlreadyRegistered {
                    model: model.name().to_string(),
                });
            }

            let tag = resolve_tag(model, &self.discriminator)?;

            let existing = entries.iter().find(|e| same_tag(&e.tag, &tag)).cloned();
            if let Some(existing) = existing {
                let registry = self.to_string();
                match handle_conflict(&existing, model, self.config.duplicate_tag_policy, &registry)
                {
                    ConflictAction::IgnoreAndReturnExisting => return Ok(existing.model),
                    ConflictAction::EvictThenInsert => {
                        entries.retain(|e| !same_tag(&e.tag, &tag))
                    }
                    ConflictAction::Raise => {
                        return Err(ConfigurationError::DuplicateTag {
                            tag: display_tag(&tag),
                            existing: existing.model.name().to_string(),
                            candidate: model.name().to_string(),
                        })
                    }
                }
            }

            info!(
                registry = %self,
                tag = %display_tag(&tag),
                model = %model.name(),
                "registered config"
            );
            entries.push(RegistryEntry {
                tag,
                model: model.clone(),
            });
        }

        self.notify_registered(model);

        Ok(model.clone())
    }

    /// Validates `raw` against the union of the registered models.
    pub fn construct(&self, raw: impl Into<ConfigValue>) -> Result<ConfigInstance, ValidationError> {
        let validator =
            compile_validator(&self.type_hint()).map_err(|e| ValidationError::ModelUnavailable {
                model: self.base.name().to_string(),
                reason: e.to_string(),
                path: String::new(),
            })?;

        match validator.validate(&raw.into())? {
            ConfigValue::Config(instance) => Ok(instance),
            other => Err(ValidationError::TypeMismatch {
                expected: self.base.name().to_string(),
                actual: other.type_name().into(),
                path: String::new(),
            }),
        }
    }

    /// A field schema validated against this registry: `base` annotated with the registry.
    pub fn annotation(self: &Arc<Self>) -> Schema {
        Schema::model(&self.base).annotated(Metadata::Contributor(self.clone()))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Tags in registration order.
    pub fn tags(&self) -> Vec<Value> {
        self.entries.read().iter().map(|e| e.tag.clone()).collect()
    }

    pub fn entries(&self) -> Vec<RegistryEntry> {
        self.entries.read().clone()
    }

    /// The model registered under `tag`.
    pub fn get(&self, tag: &Value) -> Option<ModelRef> {
        self.entries
            .read()
            .iter()
            .find(|e| same_tag(&e.tag, tag))
            .map(|e| e.model.clone())
    }

    pub fn contains_model(&self, model: &ModelType) -> bool {
        self.entries
            .read()
            .iter()
            .any(|e| core::ptr::eq(Arc::as_ptr(&e.model), model))
    }

    pub fn registered_tags_report(&self) -> String {
        let entries = self.entries.read();
        if entries.is_empty() {
            return "No tags registered.".to_string();
        }

        let mut report = String::from("Registered tags:\n");
        for entry in entries.iter() {
            let _ = writeln!(
                report,
                "  - {}: {}",
                display_tag(&entry.tag),
                entry.model.name()
            );
        }
        report
    }

    /// Prints [`registered_tags_report`](Self::registered_tags_report) to stdout.
    pub fn print_registered_tags(&self) {
        print!("{}", self.registered_tags_report());
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.config.name {
            Some(name) => f.write_str(name),
            None => write!(
                f,
                "Registry(base={}, discriminator={})",
                self.base.name(),
                self.discriminator
            ),
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("base", &self.base.name())
            .field("discriminator", &self.discriminator)
            .field("config", &self.config)
            .field("tags", &self.tags())
            .finish()
    }
}
