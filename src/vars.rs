use std::collections::HashMap;

use itertools::Itertools;
use serde_json::{Map, Value};

use crate::util::format_float;

const NIL: &str = "<nil>";

/// Vars holds the request-supplied variables that rules are matched against.
///
/// Every value is kept in its textual form; see [Vars::from_json] for how non-string JSON values
/// are coerced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Vars(HashMap<String, String>);

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the variables from a JSON object, stringifying every non-string value.
    pub fn from_json(map: &Map<String, Value>) -> Self {
        map.iter()
            .map(|(k, v)| (k.clone(), stringify(v)))
            .collect()
    }

    /// Returns the value of `field`, or None if the request did not supply it. An empty string is
    /// a present value.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Vars {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Vars(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<HashMap<String, String>> for Vars {
    fn from(map: HashMap<String, String>) -> Self {
        Vars(map)
    }
}

impl From<&Map<String, Value>> for Vars {
    fn from(map: &Map<String, Value>) -> Self {
        Vars::from_json(map)
    }
}

/// Renders a request value the way previous deployments did, which decoded JSON numbers as
/// 64-bit floats and printed values with Go's `%v`: so `1234567` becomes `1.234567e+06`, `null`
/// becomes `<nil>`, arrays print as `[a b]` and objects as `map[k:v]` with sorted keys.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Null => NIL.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) => format_float(f),
            None => n.to_string(),
        },
        Value::Array(values) => format!("[{}]", values.iter().map(stringify).join(" ")),
        Value::Object(map) => format!(
            "map[{}]",
            map.iter()
                .sorted_by(|(a, _), (b, _)| a.cmp(b))
                .map(|(k, v)| format!("{}:{}", k, stringify(v)))
                .join(" ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use spectral::prelude::*;
    use test_case::test_case;

    #[test_case(json!("123"), "123"; "string")]
    #[test_case(json!(""), ""; "empty string")]
    #[test_case(json!(123), "123"; "integer")]
    #[test_case(json!(-7), "-7"; "negative integer")]
    #[test_case(json!(123.0), "123"; "integral float")]
    #[test_case(json!(1.5), "1.5"; "fraction")]
    #[test_case(json!(1234567), "1.234567e+06"; "integer in exponent form")]
    #[test_case(json!(1e21), "1e+21"; "large float")]
    #[test_case(json!(0.00001), "1e-05"; "small float")]
    #[test_case(json!(18446744073709551615u64), "1.8446744073709552e+19"; "u64 max loses precision")]
    #[test_case(json!(true), "true"; "boolean true")]
    #[test_case(json!(false), "false"; "boolean false")]
    #[test_case(json!(null), "<nil>"; "null")]
    #[test_case(json!([1, "a", null]), "[1 a <nil>]"; "array")]
    #[test_case(json!({"b": [true], "a": 1}), "map[a:1 b:[true]]"; "object")]
    fn stringifies_json_values(value: Value, expected: &str) {
        assert_eq!(stringify(&value), expected);
    }

    #[test]
    fn builds_from_json_object() {
        let json = json!({"customer_id": 123, "email": "a@b.c"});
        let vars = Vars::from_json(json.as_object().unwrap());

        assert_that!(vars.len()).is_equal_to(2);
        assert_that!(vars.get("customer_id")).contains_value("123");
        assert_that!(vars.get("email")).contains_value("a@b.c");
        assert_that!(vars.get("missing")).is_none();
    }

    #[test]
    fn numbers_and_nulls_keep_their_legacy_text() {
        let json = json!({"customer_id": 1234567, "n": null});
        let vars = Vars::from_json(json.as_object().unwrap());

        assert_that!(vars.get("customer_id")).contains_value("1.234567e+06");
        assert_that!(vars.get("n")).contains_value("<nil>");
    }

    #[test]
    fn empty_string_is_present() {
        let vars: Vars = vec![("customer_id", "")].into_iter().collect();
        assert_that!(vars.get("customer_id")).contains_value("");
    }
}
