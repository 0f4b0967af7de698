//! Environment inheritance
//!
//! A feature without settings for an environment inherits the closest
//! ancestor's settings. With no ancestor settings either, the environment's
//! `default_state` applies with an empty rule list.

use shared_types::{Environment, Feature, FeatureEnvironment};
use std::borrow::Cow;

pub fn effective_settings<'f>(
    feature: &'f Feature,
    environment: &Environment,
    environments: &[Environment],
    max_depth: usize,
) -> Cow<'f, FeatureEnvironment> {
    let mut current = environment;
    for _ in 0..=max_depth {
        if let Some(settings) = feature.environments.get(&current.id) {
            return Cow::Borrowed(settings);
        }
        let parent = current
            .parent
            .as_deref()
            .and_then(|id| environments.iter().find(|e| e.id == id));
        match parent {
            Some(parent) => current = parent,
            None => break,
        }
    }
    Cow::Owned(FeatureEnvironment::new(environment.default_state))
}
