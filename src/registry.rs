use itertools::Itertools;
use log::debug;
use serde_json::{Map, Value};

use crate::config::{Config, Feature};
use crate::eval::{evaluate, Detail};
use crate::status::{FeatureStatus, FeaturesResponse};
use crate::vars::Vars;

/// Errors returned when querying a [Registry].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The requested feature is not defined in the config.
    #[error("unknown feature: '{name}'")]
    UnknownFeature { name: String },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Registry holds the fully merged [Config] and answers feature status queries against it.
///
/// The config is owned and never mutated after construction, so a registry can be shared between
/// threads (e.g. behind an `Arc`) and queried concurrently. Replacing the rules means building a
/// new registry.
#[derive(Clone, Debug)]
pub struct Registry {
    config: Config,
    feature_names: Vec<String>,
}

impl Registry {
    pub fn new(config: Config) -> Self {
        let feature_names = config.features.keys().cloned().sorted().collect();
        Registry {
            config,
            feature_names,
        }
    }

    /// The config version.
    pub fn version(&self) -> &str {
        &self.config.version
    }

    /// Names of all known features, in ascending order.
    pub fn features(&self) -> &[String] {
        &self.feature_names
    }

    pub fn feature(&self, name: &str) -> Option<&Feature> {
        self.config.feature(name)
    }

    /// Evaluates the feature named `feature_name` in full detail.
    pub fn detail(&self, vars: &Vars, feature_name: &str) -> Result<Detail> {
        let feature = self
            .feature(feature_name)
            .ok_or_else(|| Error::UnknownFeature {
                name: feature_name.to_string(),
            })?;
        let detail = evaluate(feature, vars);
        debug!(
            "feature '{}' enabled={} reason={:?}",
            feature_name, detail.enabled, detail.reason
        );
        Ok(detail)
    }

    /// Evaluates a single feature, or every feature when `feature_name` is empty.
    ///
    /// A single-feature query fails with [Error::UnknownFeature] if the name is not configured.
    /// An all-features query evaluates each feature independently against the same variables, in
    /// name order, and reports every one of them, disabled features included.
    pub fn status(&self, vars: &Vars, feature_name: &str) -> Result<FeaturesResponse> {
        if !feature_name.is_empty() {
            return self.feature_status(vars, feature_name);
        }

        let mut response = FeaturesResponse::new();
        for name in &self.feature_names {
            response.extend(self.feature_status(vars, name)?.features);
        }
        Ok(response)
    }

    /// Like [Registry::status], taking the variables as a JSON object. Non-string values are
    /// stringified before matching.
    pub fn evaluate(
        &self,
        vars: &Map<String, Value>,
        feature_name: &str,
    ) -> Result<FeaturesResponse> {
        self.status(&Vars::from_json(vars), feature_name)
    }

    fn feature_status(&self, vars: &Vars, feature_name: &str) -> Result<FeaturesResponse> {
        let status = FeatureStatus::from(self.detail(vars, feature_name)?);
        Ok(FeaturesResponse::new().add_status(feature_name, status.enabled, status.vars))
    }
}

impl From<Config> for Registry {
    fn from(config: Config) -> Self {
        Registry::new(config)
    }
}
