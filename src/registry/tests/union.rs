// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(clippy::unwrap_used, clippy::panic)]

use crate::*;
use serde_json::json;
use std::sync::Arc;

fn animal() -> ModelRef {
    ModelType::builder("Animal")
        .field("kind", Schema::string())
        .build()
}

fn variant(base: &ModelRef, name: &str, tag: &str) -> ModelRef {
    ModelType::builder(name)
        .extends(base)
        .field("kind", Schema::literal(tag))
        .build()
}

#[test]
fn test_empty_type_hint_is_memoized() {
    let registry = Registry::new(&animal(), "kind");

    let first = registry.type_hint();
    let second = registry.type_hint();
    assert!(first.ptr_eq(&second));
    match first.as_type() {
        Type::Invalid { message } => assert_eq!(
            message,
            "No configs have been registered with registry Registry(base=Animal, discriminator=kind)"
        ),
        other => panic!("Expected invalid fallback, got {other:?}"),
    }
}

#[test]
fn test_empty_registry_construct_names_registry() {
    let base = animal();
    let registry = Registry::with_config(
        &base,
        "kind",
        RegistryConfig {
            name: Some("animals".to_string()),
            ..RegistryConfig::default()
        },
    );

    match registry.construct(json!({ "kind": "dog" })) {
        Err(ValidationError::Invalid { message, .. }) => {
            assert_eq!(message, "No configs have been registered with registry animals")
        }
        other => panic!("Expected Invalid, got {other:?}"),
    }
}

#[test]
fn test_type_hint_tracks_entries() {
    let base = animal();
    let registry = Registry::new(&base, "kind");
    let dog = variant(&base, "Dog", "dog");
    let cat = variant(&base, "Cat", "cat");
    registry.register(&dog).unwrap();

    let before = registry.type_hint();
    registry.register(&cat).unwrap();
    let after = registry.type_hint();

    let Type::TaggedUnion(union) = before.as_type() else {
        panic!("Expected tagged union");
    };
    assert_eq!(union.discriminator, "kind");
    assert_eq!(union.choices.len(), 1);

    let Type::TaggedUnion(union) = after.as_type() else {
        panic!("Expected tagged union");
    };
    let tags: Vec<&Value> = union.choices.iter().map(|(tag, _)| tag).collect();
    assert_eq!(tags, vec![&json!("dog"), &json!("cat")]);
    assert!(matches!(
        union.choice(&json!("cat")).unwrap().as_type(),
        Type::Model(model) if Arc::ptr_eq(model, &cat)
    ));
}

#[test]
fn test_annotation_compiles_to_current_union() {
    let base = animal();
    let registry = Registry::new(&base, "kind");
    let annotation = registry.annotation();

    let empty = compile_validator(&annotation).unwrap();
    assert!(matches!(empty.schema().as_type(), Type::Invalid { .. }));

    registry.register(&variant(&base, "Dog", "dog")).unwrap();
    let filled = compile_validator(&annotation).unwrap();
    assert!(matches!(filled.schema().as_type(), Type::TaggedUnion(_)));
    assert!(filled.validate_json(json!({ "kind": "dog" })).is_ok());

    // The earlier compilation is a snapshot.
    assert!(empty.validate_json(json!({ "kind": "dog" })).is_err());
}

#[test]
fn test_registry_is_its_own_contributor() {
    let registry = Registry::new(&animal(), "kind");
    let contributor: Arc<dyn SchemaContributor> = registry.clone();
    let found = contributor.as_registry().unwrap();
    assert!(Arc::ptr_eq(&found, &registry));

    let Type::Annotated { inner, metadata } = registry.annotation().as_type().clone() else {
        panic!("Expected annotated schema");
    };
    assert!(matches!(inner.as_type(), Type::Model(model) if Arc::ptr_eq(model, registry.base())));
    assert!(matches!(metadata.as_slice(), [Metadata::Contributor(_)]));
}
