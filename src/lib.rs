//! Rule-table driven state machine for extracting nested data from text reports.
//!
//! A rule table is an ordered list of `(if-state, goto-state, pattern, path, filter)`
//! rules. The scanner reads the input once, line by line, and for every line applies the
//! first rule whose guard admits the current state and whose pattern matches the start of
//! the line. Captured fields accumulate in a persistent [`Context`] that later rules
//! interpolate into output paths and values.
//!
//! ```
//! use statescan::{StatePattern, Options, rules};
//!
//! let table = rules![
//!     ("top", "disk", r"^Disk states", None, None),
//!     ("disk", "top", r"^\s*$", None, None),
//!     ("disk", "", r"^name:(?P<diskname>.*)", None, None),
//!     ("disk", "", r"(?P<key>.*):(?P<val>.*)", "disks.{diskname}.{key}", "{val}"),
//! ];
//! let parser = StatePattern::new(table, Options::default()).unwrap();
//! let tree = parser.parse_str("Disk states\nname: c1t0d0s0\nstate: good\n").unwrap();
//!
//! assert_eq!(tree["disks"]["c1t0d0s0"]["state"], "good");
//! ```

extern crate self as statescan;

#[macro_use]
mod macros;
mod api;
mod engine;
mod error;

pub use api::{Options, ScanResult, StatePattern, parse, parse_json};
pub use engine::{
    CompiledRules, Context, FilterError, FilterFn, FilterSpec, LineTrace, PathSpec, PatternSpec, RegexFlags, RuleDef,
    RuleHits, RuleTable, RuleTrace, ScanMetrics, StateGuard, Transition, interpolate, normalize_key,
};
pub use error::{ConfigError, ScanError, StatescanError};

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

// --- Values -----------------------------------------------------------------

/// Ordered mapping used for the output tree, buffers and the context store.
pub type Tree = IndexMap<String, Value>;

/// A node of the output tree.
///
/// Leaves are always strings: the scanner never guesses numeric types from
/// captured text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Str(String),
    Map(Tree),
    List(Vec<Value>),
}

impl Value {
    /// An empty mapping, the usual initializer for a differed buffer.
    pub fn empty_map() -> Self {
        Value::Map(Tree::new())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Tree> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Look up a direct child of a mapping value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Follow a dotted path of mapping keys, e.g. `"disks.c1t0d0s0.state"`.
    pub fn pointer(&self, dotted: &str) -> Option<&Value> {
        dotted.split('.').filter(|s| !s.is_empty()).try_fold(self, |node, key| node.get(key))
    }

    /// Convert into a `serde_json::Value` (strings, objects and arrays only).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Map(m) => serde_json::Value::Object(m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
            Value::List(l) => serde_json::Value::Array(l.iter().map(Value::to_json).collect()),
        }
    }

    /// Build a value from JSON. Numbers, booleans and nulls become strings (`null` -> `""`).
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Str(String::new()),
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Bool(b) => Value::Str(b.to_string()),
            serde_json::Value::Number(n) => Value::Str(n.to_string()),
            serde_json::Value::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(obj) => {
                Value::Map(obj.iter().map(|(k, v)| (k.clone(), Value::from_json(v))).collect())
            }
        }
    }
}

/// Strings render as-is; mappings and lists render as compact JSON in insertion order.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            other => f.write_str(&serde_json::to_string(other).map_err(|_| fmt::Error)?),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Tree> for Value {
    fn from(m: Tree) -> Self {
        Value::Map(m)
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Value::List(l)
    }
}

impl PartialEq<str> for Value {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == Some(other)
    }
}

impl PartialEq<&str> for Value {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

/// Indexing a mapping by key, like `IndexMap`'s `Index`.
///
/// # Panics
///
/// If the key is absent or the value is not a mapping. Use [`Value::get`] or
/// [`Value::pointer`] when the key may be missing.
impl std::ops::Index<&str> for Value {
    type Output = Value;

    fn index(&self, key: &str) -> &Value {
        match self.get(key) {
            Some(value) => value,
            None => panic!("no entry found for key {key:?}"),
        }
    }
}
