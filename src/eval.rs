use log::debug;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::Feature;
use crate::rule::SetVarsRule;
use crate::vars::Vars;

/// Evaluate a feature for the given request variables.
///
/// Rules are checked in a fixed order and the first decisive outcome wins:
///
/// 1. any matching disable rule turns the feature off, without computing variables;
/// 2. any enable rule matching exactly turns it on;
/// 3. otherwise the first enable rule with a positive weight, and only that one, decides by
///    rollout bucket;
/// 4. for an enabled feature, every matching set-vars rule contributes its variables, later rules
///    overriding earlier ones.
///
/// A feature without rules is always disabled. Evaluation is a pure function of its inputs.
pub fn evaluate(feature: &Feature, vars: &Vars) -> Detail {
    let rules = &feature.rules;

    if let Some(rule_index) = rules.disable.iter().position(|rule| rule.matches_exact(vars)) {
        debug!("match: disable rule {} matched values.eq", rule_index);
        return Detail::disabled(Reason::Disabled { rule_index });
    }

    if let Some(rule_index) = rules.enable.iter().position(|rule| rule.matches_exact(vars)) {
        debug!("match: enable rule {} matched values.eq", rule_index);
        return Detail::enabled(Reason::Match { rule_index }, &rules.set_vars, vars);
    }

    // Only the first weighted enable rule takes part in the rollout, later ones are never consulted.
    let weighted = rules
        .enable
        .iter()
        .enumerate()
        .find(|(_, rule)| rule.is_weighted());
    if let Some((rule_index, rule)) = weighted {
        if let Some(bucket) = rule.rollout_bucket(vars) {
            debug!("match: enable rule {} matched weight", rule_index);
            return Detail::enabled(
                Reason::Rollout { rule_index, bucket },
                &rules.set_vars,
                vars,
            );
        }
    }

    debug!("no rule enabled the feature");
    Detail::disabled(Reason::NoMatch)
}

fn set_vars(rules: &[SetVarsRule], vars: &Vars) -> Option<Map<String, Value>> {
    if rules.is_empty() {
        debug!("no set_vars rules");
        return None;
    }

    debug!("checking {} set_vars rules", rules.len());
    let mut out = Map::new();
    for rule in rules.iter().filter(|rule| rule.matches(vars)) {
        for (k, v) in &rule.set {
            out.insert(k.clone(), v.clone());
        }
    }

    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// A Detail is returned from [evaluate], combining the verdict with the variables it produced and
/// an explanation of how it was reached.
#[derive(Clone, Debug, PartialEq)]
pub struct Detail {
    /// Whether the feature is enabled for the request.
    pub enabled: bool,

    /// Variables emitted by matching set-vars rules. Always None for a disabled feature, and None
    /// for an enabled one if no set-vars rule matched.
    pub vars: Option<Map<String, Value>>,

    /// The main factor that influenced the verdict.
    pub reason: Reason,
}

impl Detail {
    fn disabled(reason: Reason) -> Detail {
        Detail {
            enabled: false,
            vars: None,
            reason,
        }
    }

    fn enabled(reason: Reason, rules: &[SetVarsRule], vars: &Vars) -> Detail {
        Detail {
            enabled: true,
            vars: set_vars(rules, vars),
            reason,
        }
    }
}

/// Reason describes why an evaluation produced a particular verdict.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "kind")]
pub enum Reason {
    /// Disabled indicates that a disable rule matched one of its explicit values.
    #[serde(rename_all = "camelCase")]
    Disabled {
        /// Zero-based index of the matching disable rule.
        rule_index: usize,
    },
    /// Match indicates that an enable rule matched one of its explicit values.
    #[serde(rename_all = "camelCase")]
    Match {
        /// Zero-based index of the matching enable rule.
        rule_index: usize,
    },
    /// Rollout indicates that the request's bucket fell within the weight of the first weighted
    /// enable rule.
    #[serde(rename_all = "camelCase")]
    Rollout {
        /// Zero-based index of the weighted enable rule.
        rule_index: usize,
        /// The bucket the request hashed into.
        bucket: u8,
    },
    /// NoMatch indicates that no rule enabled the feature.
    NoMatch,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Rules;
    use crate::rule::Rule;
    use crate::test_common::{profile, stripe, vars};
    use assert_json_diff::assert_json_eq;
    use proptest::prelude::*;
    use serde_json::json;
    use spectral::prelude::*;
    use test_case::test_case;

    fn feature(enable: Vec<Rule>, disable: Vec<Rule>, set_vars: Vec<SetVarsRule>) -> Feature {
        Feature::new(Rules {
            enable,
            disable,
            set_vars,
        })
    }

    fn set(rule: Rule, set: Value) -> SetVarsRule {
        SetVarsRule::new(rule, set.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn feature_without_rules_is_disabled() {
        let detail = evaluate(&Feature::default(), &vars(&[("customer_id", "1")]));
        assert_that!(detail).is_equal_to(Detail {
            enabled: false,
            vars: None,
            reason: Reason::NoMatch,
        });
    }

    #[test]
    fn disable_takes_precedence_over_enable() {
        let rule = Rule::on_field("customer_id").eq(["123"]);
        let f = feature(vec![rule.clone()], vec![rule], vec![]);

        let detail = evaluate(&f, &vars(&[("customer_id", "123")]));
        assert!(!detail.enabled);
        assert_that!(detail.reason).is_equal_to(Reason::Disabled { rule_index: 0 });
    }

    #[test]
    fn disable_beats_weighted_enable() {
        let f = feature(
            vec![Rule::on_field("customer_id").with_weight(100)],
            vec![Rule::on_field("customer_id").eq(["1"])],
            vec![],
        );
        assert!(!evaluate(&f, &vars(&[("customer_id", "1")])).enabled);
        assert!(evaluate(&f, &vars(&[("customer_id", "2")])).enabled);
    }

    #[test]
    fn disable_rules_ignore_weight() {
        let f = feature(
            vec![Rule::on_field("customer_id").eq(["1"])],
            vec![Rule::on_field("customer_id").with_weight(100)],
            vec![],
        );
        assert!(evaluate(&f, &vars(&[("customer_id", "1")])).enabled);
    }

    #[test_case(&[("customer_id", "123")], true, Reason::Match { rule_index: 0 }; "explicitly enabled")]
    #[test_case(&[("customer_id", "111")], true, Reason::Match { rule_index: 1 }; "enabled by second rule")]
    #[test_case(&[("customer_id", "321")], false, Reason::Disabled { rule_index: 0 }; "explicitly disabled")]
    #[test_case(&[("customer_id", "222")], false, Reason::Disabled { rule_index: 1 }; "disabled by second rule")]
    #[test_case(&[], false, Reason::NoMatch; "variable absent")]
    #[test_case(&[("customer_id", "999")], false, Reason::NoMatch; "unlisted value")]
    fn exact_rules(pairs: &[(&str, &str)], enabled: bool, reason: Reason) {
        let f = feature(
            vec![
                Rule::on_field("customer_id").eq(["123", "456"]),
                Rule::on_field("customer_id").eq(["111"]),
            ],
            vec![
                Rule::on_field("customer_id").eq(["321", "567"]),
                Rule::on_field("customer_id").eq(["222"]),
            ],
            vec![],
        );

        let detail = evaluate(&f, &vars(pairs));
        assert_eq!(detail.enabled, enabled);
        assert_eq!(detail.reason, reason);
        assert_that!(detail.vars).is_none();
    }

    #[test]
    fn weighted_rollout_is_bucketed() {
        let f = feature(vec![Rule::on_field("customer_id").with_weight(50)], vec![], vec![]);

        // buckets: 1 -> 8, 42 -> 54, 3 -> 45
        let detail = evaluate(&f, &vars(&[("customer_id", "1")]));
        assert!(detail.enabled);
        assert_that!(detail.reason).is_equal_to(Reason::Rollout {
            rule_index: 0,
            bucket: 8,
        });
        assert!(!evaluate(&f, &vars(&[("customer_id", "42")])).enabled);
        assert!(evaluate(&f, &vars(&[("customer_id", "3")])).enabled);
    }

    #[test]
    fn only_first_weighted_rule_is_consulted() {
        // customer_id=42 is in bucket 54: outside the first weighted rule, inside the second
        let f = feature(
            vec![
                Rule::on_field("customer_id").eq(["123"]),
                Rule::on_field("customer_id").with_weight(50),
                Rule::on_field("customer_id").with_weight(100),
            ],
            vec![],
            vec![],
        );

        let detail = evaluate(&f, &vars(&[("customer_id", "42")]));
        assert!(!detail.enabled);
        assert_that!(detail.reason).is_equal_to(Reason::NoMatch);
    }

    #[test]
    fn out_of_range_first_weighted_rule_shadows_later_ones() {
        let f = feature(
            vec![
                Rule::on_field("customer_id").with_weight(150),
                Rule::on_field("customer_id").with_weight(100),
            ],
            vec![],
            vec![],
        );
        assert!(!evaluate(&f, &vars(&[("customer_id", "1")])).enabled);
    }

    #[test]
    fn absent_fields_hash_as_empty_values() {
        // "email=;customer_id=1;" is bucket 9
        let f = feature(
            vec![Rule::on_fields(["email", "customer_id"]).with_weight(10)],
            vec![],
            vec![],
        );
        assert!(evaluate(&f, &vars(&[("customer_id", "1")])).enabled);
        // "email=a@b.c;customer_id=1;" is bucket 85
        assert!(!evaluate(&f, &vars(&[("customer_id", "1"), ("email", "a@b.c")])).enabled);
    }

    #[test]
    fn set_vars_are_emitted_for_enabled_features() {
        let f = feature(
            vec![Rule::on_field("customer_id").eq(["123", "1"])],
            vec![],
            vec![
                set(
                    Rule::on_field("customer_id").eq(["123"]),
                    json!({"plan": "gold", "limit": 10}),
                ),
                set(
                    Rule::on_field("customer_id").with_weight(10),
                    json!({"limit": 20, "beta": true}),
                ),
                set(Rule::on_field("country").eq(["nz"]), json!({"currency": "NZD"})),
            ],
        );

        // customer_id=123 is bucket 16, so only the exact rule applies
        let detail = evaluate(&f, &vars(&[("customer_id", "123")]));
        assert!(detail.enabled);
        assert_json_eq!(json!(detail.vars), json!({"plan": "gold", "limit": 10}));

        // customer_id=1 is bucket 8, so the weighted rule applies
        let detail = evaluate(&f, &vars(&[("customer_id", "1"), ("country", "nz")]));
        assert_json_eq!(
            json!(detail.vars),
            json!({"limit": 20, "beta": true, "currency": "NZD"})
        );
    }

    #[test]
    fn later_set_vars_rules_override_earlier_keys() {
        let f = feature(
            vec![Rule::on_field("customer_id").eq(["123"])],
            vec![],
            vec![
                set(Rule::on_field("customer_id").eq(["123"]), json!({"limit": 10})),
                set(Rule::on_field("customer_id").eq(["123"]), json!({"limit": 20})),
            ],
        );

        let detail = evaluate(&f, &vars(&[("customer_id", "123")]));
        assert_json_eq!(json!(detail.vars), json!({"limit": 20}));
    }

    #[test]
    fn unmatched_set_vars_yield_no_vars() {
        let f = feature(
            vec![Rule::on_field("customer_id").eq(["123"])],
            vec![],
            vec![set(Rule::on_field("country").eq(["nz"]), json!({"currency": "NZD"}))],
        );

        let detail = evaluate(&f, &vars(&[("customer_id", "123")]));
        assert!(detail.enabled);
        assert_that!(detail.vars).is_none();
    }

    #[test]
    fn disabled_features_never_emit_vars() {
        let f = feature(
            vec![Rule::on_field("customer_id").eq(["123"])],
            vec![Rule::on_field("country").eq(["au"])],
            vec![set(Rule::on_field("customer_id").eq(["123"]), json!({"plan": "gold"}))],
        );

        let detail = evaluate(&f, &vars(&[("customer_id", "123"), ("country", "au")]));
        assert!(!detail.enabled);
        assert_that!(detail.vars).is_none();

        let detail = evaluate(&f, &vars(&[("customer_id", "9")]));
        assert!(!detail.enabled);
        assert_that!(detail.vars).is_none();
    }

    #[test]
    fn merged_fixture_features() {
        let config = stripe();
        let stripe_billing = &config.features["stripe_billing"];

        assert!(evaluate(stripe_billing, &vars(&[("customer_id", "123")])).enabled);
        assert!(!evaluate(stripe_billing, &vars(&[("customer_id", "321")])).enabled);
        assert!(evaluate(stripe_billing, &vars(&[("customer_id", "1")])).enabled);

        let config = profile();
        let detail = evaluate(&config.features["profile_page_v2"], &vars(&[("customer_id", "1")]));
        assert!(detail.enabled);
        assert_json_eq!(
            json!(detail.vars),
            json!({"int_key": 1337, "string_key": "my_string_value"})
        );
    }

    #[test]
    fn reason_serialization() {
        assert_json_eq!(
            serde_json::to_value(Reason::Rollout {
                rule_index: 2,
                bucket: 8
            })
            .unwrap(),
            json!({"kind": "ROLLOUT", "ruleIndex": 2, "bucket": 8})
        );
        assert_json_eq!(
            serde_json::to_value(Reason::NoMatch).unwrap(),
            json!({"kind": "NO_MATCH"})
        );
    }

    proptest! {
        #[test]
        fn evaluation_is_deterministic(customer_id in "[0-9]{1,6}", weight in 0i64..=100) {
            let f = feature(
                vec![Rule::on_field("customer_id").with_weight(weight)],
                vec![],
                vec![set(Rule::on_field("customer_id").with_weight(weight), json!({"k": 1}))],
            );
            let request = vars(&[("customer_id", customer_id.as_str())]);

            let first = evaluate(&f, &request);
            for _ in 0..3 {
                prop_assert_eq!(&evaluate(&f, &request), &first);
            }
            prop_assert_eq!(first.enabled, first.vars.is_some());
        }
    }
}
