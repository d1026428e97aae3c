//! Loading rule tables from JSON.
//!
//! A JSON rule table has the same shape as the tuple table accepted by
//! [`rules!`](crate::rules): an array of 5-element arrays.
//!
//! ```json
//! [
//!   ["top",  "disk", "^Disk states",            null,                     null],
//!   ["disk", "top",  "^\\s*$",                  null,                     null],
//!   ["disk", "",     "^name:(?P<diskname>.*)",  null,                     null],
//!   ["disk", "",     "(?P<key>.*):(?P<val>.*)", "disks.{diskname}.{key}", "{val}"]
//! ]
//! ```
//!
//! Filter functions cannot be expressed in JSON; everything else can. Shape
//! errors name the rule index and the expectation that was violated.

use super::compiled_rules::{FilterSpec, PathSpec, PatternSpec, RuleDef, StateGuard, Transition};
use crate::Value;
use crate::error::{ConfigError, StatescanError};
use serde_json::Value as Json;

/// A raw (not yet compiled) rule table.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<RuleDef>,
}

impl RuleTable {
    /// Parse JSON text into a rule table.
    pub fn from_json_str(text: &str) -> Result<Self, StatescanError> {
        let json: Json = serde_json::from_str(text)?;
        Ok(Self::from_json(&json)?)
    }

    /// Validate the shape of a JSON document and convert it.
    pub fn from_json(json: &Json) -> Result<Self, ConfigError> {
        let Json::Array(rows) = json else {
            return Err(ConfigError::NotASequence);
        };
        if rows.is_empty() {
            return Err(ConfigError::EmptyTable);
        }
        let rules = rows.iter().enumerate().map(|(rule, row)| rule_from_json(rule, row)).collect::<Result<_, _>>()?;
        Ok(RuleTable { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn push(&mut self, rule: RuleDef) {
        self.rules.push(rule);
    }

    pub fn into_rules(self) -> Vec<RuleDef> {
        self.rules
    }
}

impl From<Vec<RuleDef>> for RuleTable {
    fn from(rules: Vec<RuleDef>) -> Self {
        RuleTable { rules }
    }
}

fn rule_from_json(rule: usize, row: &Json) -> Result<RuleDef, ConfigError> {
    let Json::Array(fields) = row else {
        return Err(ConfigError::RuleNotASequence { rule });
    };
    let [guard, goto, pattern, path, filter] = fields.as_slice() else {
        return Err(ConfigError::WrongArity { rule, found: fields.len() });
    };

    let invalid = |field: &'static str, expected: &'static str| ConfigError::InvalidField { rule, field, expected };

    let guard = match guard {
        Json::Null => StateGuard::Any,
        Json::String(spec) => StateGuard::parse(spec),
        Json::Array(items) => StateGuard::from(
            items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| invalid("ifstate", "a string, an array of strings or null"))?,
        ),
        _ => return Err(invalid("ifstate", "a string, an array of strings or null")),
    };

    let transition = match goto {
        Json::Null => Transition::Stay,
        Json::String(spec) => Transition::parse(spec),
        _ => return Err(invalid("gotostate", "a string or null")),
    };

    let pattern = match pattern {
        Json::String(source) => PatternSpec::from(source.as_str()),
        _ => return Err(invalid("pattern", "a string")),
    };

    let path = match path {
        Json::Null => None,
        Json::String(dotted) => Some(PathSpec::from(dotted.as_str())),
        Json::Array(items) => Some(PathSpec::Segments(
            items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| invalid("datapath", "a string, an array of strings or null"))?,
        )),
        _ => return Err(invalid("datapath", "a string, an array of strings or null")),
    };

    let filter = match filter {
        Json::Null => FilterSpec::None,
        Json::String(spec) => FilterSpec::parse(spec),
        Json::Object(_) => FilterSpec::Literal(Value::from_json(filter)),
        _ => return Err(invalid("outfilter", "null, a string or an object")),
    };

    Ok(RuleDef { guard, transition, pattern, path, filter })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn loads_a_well_formed_table() {
        let table = RuleTable::from_json(&json!([
            ["top", "disk", "^Disk states", null, null],
            [["disk"], null, "(?P<key>.*):(?P<val>.*)", ["disks", "{key}"], "{val}"],
            ["disk", "top", "\\}", ">rec", {}],
            ["", "", "x", "", "<rec"],
        ]))
        .unwrap();
        let rules = table.into_rules();
        assert_eq!(rules.len(), 4);
        assert_eq!(rules[0].transition, Transition::Goto("disk".into()));
        assert_eq!(rules[1].guard, StateGuard::States(vec!["disk".into()]));
        assert_eq!(rules[1].path, Some(PathSpec::Segments(vec!["disks".into(), "{key}".into()])));
        assert!(matches!(&rules[2].filter, FilterSpec::Literal(v) if *v == Value::empty_map()));
        assert!(matches!(&rules[3].filter, FilterSpec::BackRef(n) if n == "rec"));
        assert_eq!(rules[3].guard, StateGuard::Any);
    }

    #[test]
    fn rejects_non_sequences() {
        assert!(matches!(RuleTable::from_json(&json!({"a": 1})), Err(ConfigError::NotASequence)));
        assert!(matches!(RuleTable::from_json(&json!([])), Err(ConfigError::EmptyTable)));
        assert!(matches!(
            RuleTable::from_json(&json!(["top", "disk", "x", null, null])),
            Err(ConfigError::RuleNotASequence { rule: 0 })
        ));
    }

    #[test]
    fn rejects_wrong_arity() {
        let err = RuleTable::from_json(&json!([["top", "disk", "x", null, null], ["top", "x"]])).unwrap_err();
        assert!(matches!(err, ConfigError::WrongArity { rule: 1, found: 2 }));
        assert!(err.to_string().contains("must contain 5 elements"));
    }

    #[test]
    fn rejects_fields_of_the_wrong_type() {
        let err = RuleTable::from_json(&json!([[1, null, "x", null, null]])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { rule: 0, field: "ifstate", .. }));

        let err = RuleTable::from_json(&json!([["", null, 5, null, null]])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { field: "pattern", .. }));

        let err = RuleTable::from_json(&json!([["", null, "x", [1], null]])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { field: "datapath", .. }));

        let err = RuleTable::from_json(&json!([["", null, "x", "a", 3]])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { field: "outfilter", .. }));
    }

    #[test]
    fn invalid_json_text_is_reported() {
        assert!(matches!(RuleTable::from_json_str("[[\"top\""), Err(StatescanError::Json(_))));
    }
}
