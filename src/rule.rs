use std::collections::HashSet;
use std::slice;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::rollout;
use crate::vars::Vars;

/// Weights are percentages; anything outside this range never matches by weighting.
pub const MAX_WEIGHT: i64 = 100;

/// MatchValues lists the explicit values that count as a match for a rule's fields.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct MatchValues {
    #[serde(default)]
    pub eq: HashSet<String>,
}

/// Rule is a single condition attached to one or more request fields. It is shared by the
/// enable, disable and set-vars rule lists of a [crate::Feature].
///
/// A rule matches either exactly, when a request variable named by one of its fields holds one of
/// the [MatchValues::eq] values, or by weighting, when the rule's fields hash into a rollout bucket
/// below [Rule::weight]. Disable rules only ever match exactly.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    #[serde(default)]
    pub values: MatchValues,
    #[serde(default)]
    pub weight: i64,
}

/// SetVarsRule is a [Rule] which, when it matches for an enabled feature, emits the variables in
/// [SetVarsRule::set].
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct SetVarsRule {
    #[serde(flatten)]
    pub rule: Rule,
    #[serde(default)]
    pub set: Map<String, Value>,
}

impl Rule {
    /// Creates a rule keyed on the single field `field`.
    pub fn on_field(field: impl Into<String>) -> Self {
        Rule {
            field: Some(field.into()),
            ..Default::default()
        }
    }

    /// Creates a rule keyed on all of `fields`, in order.
    pub fn on_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Rule {
            fields: fields.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Adds explicit match values.
    pub fn eq<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values.eq.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_weight(mut self, weight: i64) -> Self {
        self.weight = weight;
        self
    }

    /// The fields this rule is keyed on: [Rule::fields] if any are set, otherwise the single
    /// [Rule::field]. A rule with neither has no effective fields.
    pub fn effective_fields(&self) -> &[String] {
        if !self.fields.is_empty() {
            return &self.fields;
        }
        match &self.field {
            Some(field) => slice::from_ref(field),
            None => &[],
        }
    }

    /// Whether this rule takes part in weighted rollout at all.
    pub fn is_weighted(&self) -> bool {
        self.weight > 0
    }

    /// Returns true if any effective field is present in `vars` with one of the explicit values.
    pub fn matches_exact(&self, vars: &Vars) -> bool {
        let fields = self.effective_fields();
        if fields.is_empty() {
            debug!("check: rule has neither field nor fields set");
            return false;
        }

        fields.iter().any(|field| {
            let matched = vars
                .get(field)
                .map(|value| self.values.eq.contains(value))
                .unwrap_or(false);
            debug!(
                "check: field '{}' ({:?}) in {:?}: {}",
                field,
                vars.get(field),
                self.values.eq,
                matched
            );
            matched
        })
    }

    /// Returns true if the request's bucket for this rule's fields falls below the rule's weight.
    pub fn matches_weight(&self, vars: &Vars) -> bool {
        self.rollout_bucket(vars).is_some()
    }

    /// Returns the request's bucket for this rule's fields if it falls below the rule's weight,
    /// or None if it does not or the weight is outside `0..=MAX_WEIGHT`.
    pub fn rollout_bucket(&self, vars: &Vars) -> Option<u8> {
        if !(0..=MAX_WEIGHT).contains(&self.weight) {
            warn!("weight ({}) outside range 0-{}", self.weight, MAX_WEIGHT);
            return None;
        }

        let bucket = rollout::bucket(self.effective_fields(), vars);
        let matched = i64::from(bucket) < self.weight;
        debug!(
            "check: bucket < weight ({} < {}): {}",
            bucket, self.weight, matched
        );
        matched.then_some(bucket)
    }
}

impl SetVarsRule {
    pub fn new(rule: Rule, set: Map<String, Value>) -> Self {
        SetVarsRule { rule, set }
    }

    /// Set-vars rules match either exactly or, when weighted, by their own rollout bucket.
    pub fn matches(&self, vars: &Vars) -> bool {
        self.rule.matches_exact(vars) || (self.rule.is_weighted() && self.rule.matches_weight(vars))
    }
}

impl From<Rule> for SetVarsRule {
    fn from(rule: Rule) -> Self {
        SetVarsRule {
            rule,
            set: Map::new(),
        }
    }
}
