// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(clippy::pattern_type_mismatch)]

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::registry::Registry;
use crate::schema::{Metadata, Schema, Type};

/// Collects every registry embedded as metadata in `schema`, in discovery order and
/// without duplicates.
///
/// Annotation layers, list items, map values and union members are searched. Model
/// references are not followed: a model wires its own registries when it is defined.
pub fn find_registries(schema: &Schema) -> Vec<Arc<Registry>> {
    let mut found = Vec::new();
    let mut visited = HashSet::new();
    scan(schema, &mut visited, &mut found);
    found
}

fn scan(schema: &Schema, visited: &mut HashSet<*const Type>, found: &mut Vec<Arc<Registry>>) {
    if !visited.insert(schema.type_ptr()) {
        return;
    }

    match schema.as_type() {
        Type::Annotated { inner, metadata } => {
            for m in metadata.iter() {
                let Metadata::Contributor(contributor) = m else {
                    continue;
                };
                let Some(registry) = contributor.clone().as_registry() else {
                    continue;
                };
                if !found.iter().any(|r| Arc::ptr_eq(r, &registry)) {
                    debug!(registry = %registry, "found embedded registry");
                    found.push(registry);
                }
            }
            scan(inner, visited, found);
        }
        Type::Array { items, .. } => scan(items, visited, found),
        Type::Map { values, .. } => scan(values, visited, found),
        Type::AnyOf(variants) => {
            for variant in variants.iter() {
                scan(variant, visited, found);
            }
        }
        Type::TaggedUnion(union) => {
            for (_, choice) in union.choices.iter() {
                scan(choice, visited, found);
            }
        }
        _ => {}
    }
}
