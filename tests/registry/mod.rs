// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::sync::Arc;

use taggedconf::*;

use anyhow::{anyhow, bail, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use test_generator::test_resources;

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct ModelSpec {
    name: String,
    #[serde(default)]
    fields: IndexMap<String, Value>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "snake_case")]
enum Container {
    #[default]
    Single,
    List,
    Map,
}

/// A model with one field validated against the case's registry.
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct DependentSpec {
    name: String,
    field: String,
    #[serde(default)]
    container: Container,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct ValidateStep {
    model: String,
    data: Value,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct Step {
    register: Option<String>,
    construct: Option<Value>,
    define: Option<String>,
    subscribe: Option<String>,
    validate: Option<ValidateStep>,
    report: Option<bool>,
    want_model: Option<String>,
    want_result: Option<Value>,
    want_error: Option<String>,
    want_report: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct TestCase {
    note: String,
    discriminator: String,
    #[serde(default)]
    config: RegistryConfig,
    base: ModelSpec,
    #[serde(default)]
    variants: Vec<ModelSpec>,
    #[serde(default)]
    dependents: Vec<DependentSpec>,
    steps: Vec<Step>,
    skip: Option<bool>,
}

#[derive(Deserialize, Debug)]
struct YamlTest {
    cases: Vec<TestCase>,
}

fn build_model(spec: &ModelSpec, parent: Option<&ModelRef>) -> Result<ModelRef> {
    let mut builder = ModelType::builder(spec.name.clone());
    if let Some(parent) = parent {
        builder = builder.extends(parent);
    }
    for (name, schema) in spec.fields.iter() {
        let schema = Schema::from_serde_json_value(schema.clone())
            .map_err(|e| anyhow!("field `{name}` of {}: {e}", spec.name))?;
        builder = builder.field(name.clone(), schema);
    }
    Ok(builder.build())
}

fn define_dependent(spec: &DependentSpec, registry: &Arc<Registry>) -> ModelRef {
    let annotation = registry.annotation();
    let schema = match spec.container {
        Container::Single => annotation,
        Container::List => Schema::list(annotation),
        Container::Map => Schema::map(annotation),
    };
    ModelType::builder(spec.name.clone())
        .field(spec.field.clone(), schema)
        .build()
}

fn check_error(actual: &dyn std::fmt::Display, want_error: &Option<String>) -> Result<()> {
    match want_error {
        Some(expected) if actual.to_string().contains(expected.as_str()) => Ok(()),
        Some(expected) => bail!("`{actual}` does not contain `{expected}`"),
        None => bail!("unexpected error `{actual}`"),
    }
}

fn check_instance(instance: &ConfigInstance, step: &Step) -> Result<()> {
    if let Some(error) = &step.want_error {
        bail!("expected error `{error}`, got {instance:?}");
    }
    if let Some(model) = &step.want_model {
        if instance.model().name() != model {
            bail!("expected {model}, got {}", instance.model().name());
        }
    }
    if let Some(result) = &step.want_result {
        assert_eq!(&instance.to_json(), result);
    }
    Ok(())
}

fn run_step(
    step: &Step,
    registry: &Arc<Registry>,
    variants: &HashMap<String, ModelRef>,
    dependents: &mut HashMap<String, ModelRef>,
    specs: &[DependentSpec],
) -> Result<()> {
    if let Some(name) = &step.register {
        let model = variants
            .get(name)
            .ok_or_else(|| anyhow!("unknown variant {name}"))?;
        match registry.register(model) {
            Ok(returned) => {
                if let Some(error) = &step.want_error {
                    bail!("expected error `{error}`, registered {}", returned.name());
                }
                if let Some(want) = &step.want_model {
                    if returned.name() != want {
                        bail!("register returned {}, expected {want}", returned.name());
                    }
                }
            }
            Err(e) => check_error(&e, &step.want_error)?,
        }
    } else if let Some(data) = &step.construct {
        match registry.construct(data.clone()) {
            Ok(instance) => check_instance(&instance, step)?,
            Err(e) => check_error(&e, &step.want_error)?,
        }
    } else if let Some(name) = &step.define {
        let spec = specs
            .iter()
            .find(|s| &s.name == name)
            .ok_or_else(|| anyhow!("unknown dependent {name}"))?;
        dependents.insert(name.clone(), define_dependent(spec, registry));
    } else if let Some(name) = &step.subscribe {
        let model = dependents
            .get(name)
            .ok_or_else(|| anyhow!("dependent {name} is not defined"))?;
        registry.rebuild_on_registers(model.clone());
    } else if let Some(validate) = &step.validate {
        let model = dependents
            .get(&validate.model)
            .ok_or_else(|| anyhow!("dependent {} is not defined", validate.model))?;
        match model.validate_json(validate.data.clone()) {
            Ok(instance) => check_instance(&instance, step)?,
            Err(e) => check_error(&e, &step.want_error)?,
        }
    } else if step.report == Some(true) {
        let report = registry.registered_tags_report();
        if step.want_report.as_deref() != Some(report.as_str()) {
            bail!("report mismatch:\n{report}\nexpected:\n{:?}", step.want_report);
        }
    } else {
        bail!("step has no action: {step:?}");
    }
    Ok(())
}

fn yaml_test_impl(file: &str) -> Result<()> {
    let yaml_str = std::fs::read_to_string(file)?;
    let test: YamlTest = serde_yaml::from_str(&yaml_str)?;

    std::eprintln!("running {file}");

    for case in test.cases {
        std::print!("case {} ", case.note);
        if case.skip == Some(true) {
            std::println!("skipped");
            continue;
        }

        let base = build_model(&case.base, None)?;
        let registry = Registry::with_config(&base, case.discriminator.clone(), case.config);

        let mut variants = HashMap::new();
        for spec in case.variants.iter() {
            variants.insert(spec.name.clone(), build_model(spec, Some(&base))?);
        }

        let mut dependents = HashMap::new();
        for (idx, step) in case.steps.iter().enumerate() {
            run_step(step, &registry, &variants, &mut dependents, &case.dependents)
                .map_err(|e| anyhow!("case `{}` step {idx}: {e}", case.note))?;
        }

        std::println!("passed");
    }

    Ok(())
}

fn yaml_test(file: &str) -> Result<()> {
    match yaml_test_impl(file) {
        Ok(_) => Ok(()),
        Err(e) => {
            // If Err is returned, it doesn't always get printed by cargo test.
            // Therefore, panic with the error.
            panic!("{e}");
        }
    }
}

#[test_resources("tests/registry/cases/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}
