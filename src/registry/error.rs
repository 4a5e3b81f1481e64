// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Registration-time misconfigurations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("{model} is not a subtype of {base}.")]
    NotASubtype { model: String, base: String },

    #[error("{model} is already registered.")]
    AlreadyRegistered { model: String },

    #[error("{model} has no field named `{field}` to use as discriminator.")]
    MissingDiscriminatorField { model: String, field: String },

    #[error("Discriminator field `{field}` of {model} must be a literal, found {found}.")]
    DiscriminatorNotLiteral {
        model: String,
        field: String,
        found: String,
    },

    #[error(
        "Discriminator field `{field}` of {model} must permit exactly one value, found {count}: [{}].",
        .values.join(", ")
    )]
    AmbiguousDiscriminator {
        model: String,
        field: String,
        count: usize,
        values: Vec<String>,
    },

    #[error("Tag `{tag}` is already registered by {existing}; cannot register {candidate}.")]
    DuplicateTag {
        tag: String,
        existing: String,
        candidate: String,
    },
}
