//! Shared fixtures for the integration scenarios

use flag_runtime::{EngineConfig, Fixture, FlagEngine};
use serde_json::{json, Value};
use shared_types::{
    Attributes, Environment, Feature, FeatureEnvironment, Holdout, Organization, Rule, ValueType,
};

pub const ORG: &str = "org_1";
pub const PRODUCTION: &str = "production";

pub fn organization() -> Organization {
    Organization::new(ORG)
        .with_environment(Environment::new(PRODUCTION))
        .with_environment(Environment::new("staging"))
}

/// A string feature enabled in production with `rules`.
pub fn feature(id: &str, default: Value, rules: Vec<Rule>) -> Feature {
    let mut environment = FeatureEnvironment::new(true);
    for rule in rules {
        environment = environment.with_rule(rule);
    }
    Feature::new(id, ORG, ValueType::String, default).with_environment(PRODUCTION, environment)
}

pub fn boolean_flag(id: &str) -> Feature {
    Feature::new(id, ORG, ValueType::Boolean, json!(false)).with_environment(
        PRODUCTION,
        FeatureEnvironment::new(true).with_rule(Rule::force(format!("{id}-on"), json!(true))),
    )
}

/// An engine loaded with `features` and `holdouts` for [`organization`].
pub async fn engine(features: Vec<Feature>, holdouts: Vec<Holdout>) -> FlagEngine {
    let engine = FlagEngine::new(EngineConfig::default()).expect("default config is valid");
    let fixture = Fixture {
        organization: organization(),
        features,
        holdouts,
        ..Default::default()
    };
    let json = serde_json::to_string(&fixture).expect("fixture serializes");
    engine.load_fixture(&json).await.expect("fixture loads");
    engine
}

pub fn attributes(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        _ => Attributes::new(),
    }
}
