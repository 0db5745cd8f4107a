use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::eval::Detail;
use crate::vars::Vars;

/// Body of a feature status request.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct FeaturesRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vars: Option<Map<String, Value>>,
}

impl FeaturesRequest {
    /// The request variables in the form rules are matched against.
    pub fn vars(&self) -> Vars {
        self.vars.as_ref().map(Vars::from_json).unwrap_or_default()
    }
}

/// The evaluated state of one feature.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct FeatureStatus {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vars: Option<Map<String, Value>>,
}

impl From<Detail> for FeatureStatus {
    fn from(detail: Detail) -> Self {
        FeatureStatus {
            enabled: detail.enabled,
            vars: detail.vars,
        }
    }
}

/// Feature statuses keyed by feature name.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct FeaturesResponse {
    #[serde(default)]
    pub features: BTreeMap<String, FeatureStatus>,
}

impl FeaturesResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the status of `feature_name`. Empty variable maps are dropped.
    pub fn add_status(
        mut self,
        feature_name: impl Into<String>,
        enabled: bool,
        vars: Option<Map<String, Value>>,
    ) -> Self {
        let vars = vars.filter(|vars| !vars.is_empty());
        self.features
            .insert(feature_name.into(), FeatureStatus { enabled, vars });
        self
    }

    pub fn get(&self, feature_name: &str) -> Option<&FeatureStatus> {
        self.features.get(feature_name)
    }

    /// Returns true if `feature_name` was evaluated and found enabled.
    pub fn is_enabled(&self, feature_name: &str) -> bool {
        self.get(feature_name)
            .map(|status| status.enabled)
            .unwrap_or(false)
    }
}

impl Extend<(String, FeatureStatus)> for FeaturesResponse {
    fn extend<T: IntoIterator<Item = (String, FeatureStatus)>>(&mut self, iter: T) {
        self.features.extend(iter);
    }
}
