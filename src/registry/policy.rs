// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use tracing::warn;

use crate::model::ModelType;
use crate::registry::{tag::display_tag, DuplicateTagPolicy, RegistryEntry};

/// Outcome of a tag conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictAction {
    /// Leave the registry untouched and hand back the registered model.
    IgnoreAndReturnExisting,
    /// Remove the entry holding the tag, then register the candidate.
    EvictThenInsert,
    /// Fail the registration.
    Raise,
}

/// Decides what happens when `candidate` declares the tag `existing` already holds.
///
/// The warn policies log here; raising is left to the caller.
pub fn handle_conflict(
    existing: &RegistryEntry,
    candidate: &ModelType,
    policy: DuplicateTagPolicy,
    registry: &str,
) -> ConflictAction {
    match policy {
        DuplicateTagPolicy::WarnAndIgnore => {
            warn!(
                registry,
                tag = %display_tag(&existing.tag),
                existing = %existing.model.name(),
                candidate = %candidate.name(),
                "tag already registered; keeping the existing config"
            );
            ConflictAction::IgnoreAndReturnExisting
        }
        DuplicateTagPolicy::WarnAndReplace => {
            warn!(
                registry,
                tag = %display_tag(&existing.tag),
                existing = %existing.model.name(),
                candidate = %candidate.name(),
                "tag already registered; replacing the existing config"
            );
            ConflictAction::EvictThenInsert
        }
        DuplicateTagPolicy::Error => ConflictAction::Raise,
    }
}
