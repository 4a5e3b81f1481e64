// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Use README.md as crate documentation.
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

pub mod compile;
pub mod model;
pub mod registry;
pub mod schema;
mod value;

pub use compile::{compile_validator, CompileError, CompiledValidator, SchemaHandler};
pub use model::{CompiledModel, Field, FieldDefault, ModelBuilder, ModelRef, ModelType};
pub use registry::{
    error::ConfigurationError, rebuild::Rebuild, DuplicateTagPolicy, Registry, RegistryConfig,
    RegistryEntry,
};
pub use schema::{error::ValidationError, Metadata, Schema, SchemaContributor, TaggedUnion, Type};
pub use serde_json::Value;
pub use value::{ConfigInstance, ConfigValue};

/// Any error surfaced by this crate.
///
/// Most operations return the narrower error of their own concern; this type exists
/// for callers that chain registration, compilation and validation with `?`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
