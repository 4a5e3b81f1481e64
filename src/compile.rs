// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(clippy::pattern_type_mismatch)]

use std::sync::Arc;

use regex::Regex;

use crate::schema::{
    error::ValidationError, validate::SchemaValidator, Metadata, Schema, TaggedUnion, Type,
};
use crate::value::ConfigValue;
use crate::Value;

/// Nesting limit for schemas, counted through contributor output as well.
const MAX_DEPTH: usize = 128;

/// Errors produced while compiling a schema into a validator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("invalid regex pattern '{pattern}': {error}")]
    InvalidPattern { pattern: String, error: String },
    #[error("schema contributor failed: {message}")]
    Contributor { message: String },
    #[error("field '{field}' of {model}: {source}")]
    Field {
        model: String,
        field: String,
        source: Box<CompileError>,
    },
    #[error("schema nesting exceeds {limit} levels")]
    DepthExceeded { limit: usize },
}

/// Handed to a [`SchemaContributor`](crate::SchemaContributor) when the compiler reaches the
/// annotation carrying it.
#[derive(Debug)]
pub struct SchemaHandler<'a> {
    source: &'a Schema,
    depth: usize,
}

impl SchemaHandler<'_> {
    /// The schema the annotation wraps, after any contributor listed before this one.
    pub fn source(&self) -> &Schema {
        self.source
    }

    /// Compiles `schema` in the context of the current compilation.
    pub fn compile(&self, schema: &Schema) -> Result<Schema, CompileError> {
        resolve(schema, self.depth + 1)
    }
}

/// A schema with every contributor resolved and every pattern checked.
#[derive(Debug, Clone)]
pub struct CompiledValidator {
    schema: Schema,
}

impl CompiledValidator {
    /// The resolved schema this validator runs.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn validate(&self, value: &ConfigValue) -> Result<ConfigValue, ValidationError> {
        SchemaValidator::validate(value, &self.schema)
    }

    pub fn validate_json(&self, value: Value) -> Result<ConfigValue, ValidationError> {
        self.validate(&ConfigValue::from(value))
    }

    pub(crate) fn validate_with_path(
        &self,
        value: &ConfigValue,
        path: &str,
    ) -> Result<ConfigValue, ValidationError> {
        SchemaValidator::validate_with_path(value, &self.schema, path)
    }
}

/// Compiles `schema` into a validator.
///
/// Contributor annotations are asked for their schema now; the result does not follow
/// later changes on the contributor's side. Model references are left in place and
/// resolve to the model's own cached validator when a value reaches them.
pub fn compile_validator(schema: &Schema) -> Result<CompiledValidator, CompileError> {
    Ok(CompiledValidator {
        schema: resolve(schema, 0)?,
    })
}

fn resolve(schema: &Schema, depth: usize) -> Result<Schema, CompileError> {
    if depth > MAX_DEPTH {
        return Err(CompileError::DepthExceeded { limit: MAX_DEPTH });
    }
    let next = depth + 1;

    match schema.as_type() {
        Type::String {
            pattern: Some(pattern),
            ..
        } => {
            Regex::new(pattern).map_err(|e| CompileError::InvalidPattern {
                pattern: pattern.clone(),
                error: e.to_string(),
            })?;
            Ok(schema.clone())
        }
        Type::Array {
            description,
            items,
            min_items,
            max_items,
        } => {
            let resolved = resolve(items, next)?;
            if resolved.ptr_eq(items) {
                return Ok(schema.clone());
            }
            Ok(Schema::new(Type::Array {
                description: description.clone(),
                items: resolved,
                min_items: *min_items,
                max_items: *max_items,
            }))
        }
        Type::Map {
            description,
            values,
        } => {
            let resolved = resolve(values, next)?;
            if resolved.ptr_eq(values) {
                return Ok(schema.clone());
            }
            Ok(Schema::new(Type::Map {
                description: description.clone(),
                values: resolved,
            }))
        }
        Type::AnyOf(variants) => {
            let resolved = variants
                .iter()
                .map(|v| resolve(v, next))
                .collect::<Result<Vec<_>, _>>()?;
            if unchanged(variants.iter(), resolved.iter()) {
                return Ok(schema.clone());
            }
            Ok(Schema::any_of(resolved))
        }
        Type::TaggedUnion(union) => {
            let resolved = union
                .choices
                .iter()
                .map(|(tag, s)| resolve(s, next).map(|s| (tag.clone(), s)))
                .collect::<Result<Vec<_>, _>>()?;
            if unchanged(
                union.choices.iter().map(|(_, s)| s),
                resolved.iter().map(|(_, s)| s),
            ) {
                return Ok(schema.clone());
            }
            Ok(Schema::new(Type::TaggedUnion(Arc::new(TaggedUnion {
                discriminator: union.discriminator.clone(),
                choices: resolved,
            }))))
        }
        Type::Annotated { inner, metadata } => resolve_annotated(schema, inner, metadata, next),
        _ => Ok(schema.clone()),
    }
}

fn resolve_annotated(
    schema: &Schema,
    inner: &Schema,
    metadata: &Arc<Vec<Metadata>>,
    depth: usize,
) -> Result<Schema, CompileError> {
    let has_contributor = metadata
        .iter()
        .any(|m| matches!(m, Metadata::Contributor(_)));

    if !has_contributor {
        let resolved = resolve(inner, depth)?;
        if resolved.ptr_eq(inner) {
            return Ok(schema.clone());
        }
        return Ok(Schema::new(Type::Annotated {
            inner: resolved,
            metadata: metadata.clone(),
        }));
    }

    // Contributors apply in declaration order, each seeing the previous one's output.
    let mut current = inner.clone();
    let mut kept = Vec::new();
    for m in metadata.iter() {
        match m {
            Metadata::Contributor(contributor) => {
                let handler = SchemaHandler {
                    source: &current,
                    depth,
                };
                current = contributor.provide_compiled_schema(&handler)?;
            }
            other => kept.push(other.clone()),
        }
    }

    let resolved = resolve(&current, depth)?;
    if kept.is_empty() {
        Ok(resolved)
    } else {
        Ok(resolved.annotated_with(kept))
    }
}

fn unchanged<'a>(
    before: impl Iterator<Item = &'a Schema>,
    after: impl Iterator<Item = &'a Schema>,
) -> bool {
    before.zip(after).all(|(b, a)| b.ptr_eq(a))
}
