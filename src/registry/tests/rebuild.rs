// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(clippy::unwrap_used, clippy::panic)]

use crate::*;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

type Log = Arc<Mutex<Vec<String>>>;

/// Records every forced rebuild into a shared log.
struct Recorder {
    name: &'static str,
    fail: bool,
    log: Log,
}

impl Recorder {
    fn new(name: &'static str, log: &Log) -> Arc<Self> {
        Arc::new(Self {
            name,
            fail: false,
            log: log.clone(),
        })
    }

    fn failing(name: &'static str, log: &Log) -> Arc<Self> {
        Arc::new(Self {
            name,
            fail: true,
            log: log.clone(),
        })
    }
}

impl Rebuild for Recorder {
    fn rebuild_target(&self) -> String {
        self.name.to_string()
    }

    fn force_rebuild(&self) -> Result<(), CompileError> {
        self.log.lock().push(self.name.to_string());
        if self.fail {
            return Err(CompileError::Contributor {
                message: "not ready".to_string(),
            });
        }
        Ok(())
    }
}

fn animal() -> ModelRef {
    ModelType::builder("Animal")
        .field("kind", Schema::string())
        .field("name", Schema::string())
        .build()
}

fn variant(base: &ModelRef, name: &str, tag: &str) -> ModelRef {
    ModelType::builder(name)
        .extends(base)
        .field("kind", Schema::literal(tag))
        .build()
}

#[test]
fn test_subscription_rebuilds_immediately() {
    let registry = Registry::new(&animal(), "kind");
    let log = Log::default();

    let d1 = Recorder::new("d1", &log);
    let returned = registry.rebuild_on_registers(d1.clone());
    assert!(Arc::ptr_eq(&returned, &d1));
    assert_eq!(*log.lock(), vec!["d1".to_string()]);
}

#[test]
fn test_rebuilds_follow_subscription_order() {
    let base = animal();
    let registry = Registry::new(&base, "kind");
    let log = Log::default();
    let d1 = registry.rebuild_on_registers(Recorder::new("d1", &log));
    let d2 = registry.rebuild_on_registers(Recorder::new("d2", &log));
    log.lock().clear();

    registry.register(&variant(&base, "Dog", "dog")).unwrap();
    registry.register(&variant(&base, "Cat", "cat")).unwrap();

    assert_eq!(*log.lock(), vec!["d1", "d2", "d1", "d2"]);
    drop((d1, d2));
}

#[test]
fn test_rebuild_failures_are_suppressed() {
    let base = animal();
    let registry = Registry::new(&base, "kind");
    let log = Log::default();
    let broken = registry.rebuild_on_registers(Recorder::failing("broken", &log));
    let healthy = registry.rebuild_on_registers(Recorder::new("healthy", &log));
    log.lock().clear();

    assert!(registry.register(&variant(&base, "Dog", "dog")).is_ok());
    assert_eq!(*log.lock(), vec!["broken", "healthy"]);
    drop((broken, healthy));
}

#[test]
fn test_dropped_dependent_is_skipped() {
    let base = animal();
    let registry = Registry::new(&base, "kind");
    let log = Log::default();
    let dependent = registry.rebuild_on_registers(Recorder::new("gone", &log));
    drop(dependent);

    registry.register(&variant(&base, "Dog", "dog")).unwrap();
    assert_eq!(*log.lock(), vec!["gone"]);
}

#[test]
fn test_dropped_dependents_are_unsubscribed() {
    let base = animal();
    let registry = Registry::new(&base, "kind");
    registry.on_register(|_| {});

    let owners: Vec<ModelRef> = (0..100)
        .map(|i| {
            ModelType::builder(format!("Owner{i}"))
                .field("pet", registry.annotation())
                .build()
        })
        .collect();
    assert_eq!(registry.subscriber_count(), 101);

    drop(owners);
    assert_eq!(registry.subscriber_count(), 1);

    registry.register(&variant(&base, "Dog", "dog")).unwrap();
    assert_eq!(registry.subscriptions.read().len(), 1);
}

#[test]
fn test_subscribing_prunes_dropped_dependents() {
    let registry = Registry::new(&animal(), "kind");
    let log = Log::default();
    for _ in 0..10 {
        drop(registry.rebuild_on_registers(Recorder::new("gone", &log)));
    }

    let kept = registry.rebuild_on_registers(Recorder::new("kept", &log));
    assert_eq!(registry.subscriptions.read().len(), 1);
    assert_eq!(registry.subscriber_count(), 1);
    drop(kept);
}

#[test]
fn test_auto_rebuild_reaches_nested_field() {
    let base = animal();
    let registry = Registry::new(&base, "kind");
    let zoo = ModelType::builder("Zoo")
        .field("animals", Schema::list(registry.annotation()))
        .build();
    let raw = json!({ "animals": [{ "kind": "dog", "name": "rex" }] });

    assert!(zoo.validate_json(raw.clone()).is_err());

    let dog = variant(&base, "Dog", "dog");
    registry.register(&dog).unwrap();

    let zoo_config = zoo.validate_json(raw).unwrap();
    let ConfigValue::Array(animals) = zoo_config.get("animals").unwrap() else {
        panic!("Expected array");
    };
    assert!(Arc::ptr_eq(animals[0].as_config().unwrap().model(), &dog));
}

#[test]
fn test_auto_rebuild_disabled_leaves_dependents_stale() {
    let base = animal();
    let registry = Registry::with_config(
        &base,
        "kind",
        RegistryConfig {
            auto_rebuild: false,
            ..RegistryConfig::default()
        },
    );
    let owner = ModelType::builder("Owner")
        .field("pet", registry.annotation())
        .build();
    let raw = json!({ "pet": { "kind": "dog", "name": "rex" } });

    assert!(owner.validate_json(raw.clone()).is_err());
    registry.register(&variant(&base, "Dog", "dog")).unwrap();
    assert!(owner.validate_json(raw.clone()).is_err());

    registry.rebuild_on_registers(owner.clone());
    assert!(owner.validate_json(raw).is_ok());
}

#[test]
fn test_model_compiled_before_first_registration() {
    let base = animal();
    let registry = Registry::new(&base, "kind");
    let dog = variant(&base, "Dog", "dog");
    registry.register(&dog).unwrap();

    // Defined after the registration: its first compilation already sees it.
    let owner = ModelType::builder("Owner")
        .field("pet", registry.annotation())
        .build();
    assert!(owner
        .validate_json(json!({ "pet": { "kind": "dog", "name": "rex" } }))
        .is_ok());

    let cat = variant(&base, "Cat", "cat");
    registry.register(&cat).unwrap();
    let config = owner
        .validate_json(json!({ "pet": { "kind": "cat", "name": "tom" } }))
        .unwrap();
    assert!(config
        .get("pet")
        .and_then(ConfigValue::as_config)
        .unwrap()
        .is_instance_of(&cat));
}
