#![cfg(test)]

use serde_json::json;

use crate::config::Config;
use crate::vars::Vars;

pub fn vars(pairs: &[(&str, &str)]) -> Vars {
    pairs.iter().copied().collect()
}

fn config(value: serde_json::Value) -> Config {
    serde_json::from_value(value).unwrap()
}

pub fn profile() -> Config {
    config(json!({
        "version": "1.0",
        "features": {
            "profile_page_v2": {
                "rules": {
                    "enable": [
                        {"fields": ["email", "customer_id"], "weight": 10}
                    ],
                    "set_vars": [
                        {
                            "fields": ["customer_id"],
                            "weight": 50,
                            "set": {"int_key": 1337, "string_key": "my_string_value"}
                        }
                    ]
                }
            }
        }
    }))
}

pub fn stripe_include() -> Config {
    config(json!({
        "version": "1.0",
        "features": {
            "stripe_billing": {
                "rules": {
                    "enable": [{"field": "customer_id", "values": {"eq": ["123"]}}]
                }
            }
        }
    }))
}

pub fn stripe_exclude() -> Config {
    config(json!({
        "version": "1.0",
        "features": {
            "stripe_billing": {
                "rules": {
                    "disable": [{"field": "customer_id", "values": {"eq": ["321"]}}]
                }
            }
        }
    }))
}

pub fn stripe_weight() -> Config {
    config(json!({
        "version": "1.0",
        "features": {
            "stripe_billing": {
                "rules": {
                    "enable": [{"field": "customer_id", "weight": 50}]
                }
            }
        }
    }))
}

pub fn stripe() -> Config {
    Config::merged(vec![stripe_include(), stripe_exclude(), stripe_weight()])
}

pub fn combined() -> Config {
    profile().merge(stripe())
}
