// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use crate::compile::{CompileError, SchemaHandler};
use crate::registry::Registry;
use crate::schema::{Schema, SchemaContributor};

impl Registry {
    /// The union of the models registered right now, dispatched on the discriminator.
    ///
    /// An empty registry yields a schema that rejects every value. That schema is created
    /// once per registry, so repeated calls return the same allocation.
    pub fn type_hint(&self) -> Schema {
        let entries = self.entries.read();
        if entries.is_empty() {
            return self.invalid_fallback();
        }

        Schema::tagged_union(
            self.discriminator.clone(),
            entries
                .iter()
                .map(|e| (e.tag.clone(), Schema::model(&e.model)))
                .collect(),
        )
    }

    fn invalid_fallback(&self) -> Schema {
        self.invalid_fallback
            .get_or_init(|| {
                Schema::invalid(format!(
                    "No configs have been registered with registry {self}"
                ))
            })
            .clone()
    }
}

impl SchemaContributor for Registry {
    fn provide_compiled_schema(&self, _handler: &SchemaHandler<'_>) -> Result<Schema, CompileError> {
        Ok(self.type_hint())
    }

    fn as_registry(self: Arc<Self>) -> Option<Arc<Registry>> {
        Some(self)
    }
}
