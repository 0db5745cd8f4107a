use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::rule::{Rule, SetVarsRule};

/// Config is the complete rule set of the service: a version string and every known feature,
/// keyed by name.
///
/// A config is usually assembled from several fragments, one per source file, with
/// [Config::append] or by collecting an iterator of fragments. Once handed to a
/// [crate::Registry] it is never mutated again.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub features: HashMap<String, Feature>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Feature {
    #[serde(default)]
    pub rules: Rules,
}

/// The three ordered rule lists of a feature. Earlier rules are tested first.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Rules {
    #[serde(default)]
    pub enable: Vec<Rule>,
    #[serde(default)]
    pub disable: Vec<Rule>,
    #[serde(default)]
    pub set_vars: Vec<SetVarsRule>,
}

impl Feature {
    pub fn new(rules: Rules) -> Self {
        Feature { rules }
    }

    /// Returns true if the feature has no rules of any kind; such a feature is always disabled.
    pub fn is_empty(&self) -> bool {
        self.rules.enable.is_empty()
            && self.rules.disable.is_empty()
            && self.rules.set_vars.is_empty()
    }

    /// Appends the rules of `other` after this feature's own, list by list.
    pub fn append(&mut self, other: Feature) {
        let Rules {
            enable,
            disable,
            set_vars,
        } = other.rules;
        self.rules.enable.extend(enable);
        self.rules.disable.extend(disable);
        self.rules.set_vars.extend(set_vars);
    }
}

impl Config {
    pub fn new(version: impl Into<String>) -> Self {
        Config {
            version: version.into(),
            features: HashMap::new(),
        }
    }

    /// Adds a feature, merging it into an existing feature of the same name.
    pub fn with_feature(mut self, name: impl Into<String>, feature: Feature) -> Self {
        self.add_feature(name.into(), feature);
        self
    }

    pub fn feature(&self, name: &str) -> Option<&Feature> {
        self.features.get(name)
    }

    /// Merges `addition` into this config.
    ///
    /// The version is taken from `addition` only if this config has none yet. Features present in
    /// both have `addition`'s rules appended after the existing ones; features new to this config
    /// are inserted as they are. Existing rules are never dropped or reordered.
    pub fn append(&mut self, addition: Config) {
        if self.version.is_empty() {
            self.version = addition.version;
        }
        for (name, feature) in addition.features {
            self.add_feature(name, feature);
        }
    }

    /// By-value form of [Config::append].
    pub fn merge(mut self, addition: Config) -> Config {
        self.append(addition);
        self
    }

    /// Folds an ordered sequence of fragments into a single config.
    pub fn merged<I: IntoIterator<Item = Config>>(fragments: I) -> Config {
        fragments.into_iter().fold(Config::default(), Config::merge)
    }

    fn add_feature(&mut self, name: String, feature: Feature) {
        match self.features.get_mut(&name) {
            Some(existing) => {
                debug!("appending rules to feature '{}'", name);
                existing.append(feature);
            }
            None => {
                self.features.insert(name, feature);
            }
        }
    }
}

impl FromIterator<Config> for Config {
    fn from_iter<T: IntoIterator<Item = Config>>(iter: T) -> Self {
        Config::merged(iter)
    }
}

impl Extend<Config> for Config {
    fn extend<T: IntoIterator<Item = Config>>(&mut self, iter: T) {
        for fragment in iter {
            self.append(fragment);
        }
    }
}
