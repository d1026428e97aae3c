//! The persistent capture store.
//!
//! A single [`Context`] lives for the whole scan. Every fired rule merges its
//! named captures into it, plus three bookkeeping entries:
//!
//! - `_state`: the scanner state before the rule fired;
//! - `_ifstate`: the rule's guard, as a list of state names (empty = any);
//! - `_gotostate`: the rule's transition text (empty = stay).
//!
//! Differed buffers are ordinary mapping entries of the context, created by
//! `>name` / `>>name` paths and read back with `<name` filters.

use super::compiled_rules::{BufferMode, CompiledRule};
use crate::{Tree, Value};
use regex::{Captures, Regex};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    fields: Tree,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Set an entry, returning the previous value. Filter functions use this on a
    /// clone of the context they receive.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.shift_remove(key)
    }

    pub fn fields(&self) -> &Tree {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Merge a fired rule's captures and bookkeeping entries.
    pub(crate) fn absorb(&mut self, captured: &Tree, state: &str, rule: &CompiledRule) {
        for (key, value) in captured {
            self.fields.insert(key.clone(), value.clone());
        }
        let guard = rule.guard.names().iter().map(|s| Value::Str(s.clone())).collect();
        self.fields.insert("_ifstate".to_string(), Value::List(guard));
        self.fields.insert("_gotostate".to_string(), Value::Str(rule.transition.as_str().to_string()));
        self.fields.insert("_state".to_string(), Value::Str(state.to_string()));
    }

    /// Prepare the buffer `name` and return it.
    ///
    /// `Replace` always resets it to an empty mapping; `Merge` keeps an existing
    /// mapping and only creates (or resets a non-mapping) when needed.
    pub(crate) fn open_buffer(&mut self, name: &str, mode: BufferMode) -> &mut Value {
        let slot = self.fields.entry(name.to_string()).or_insert_with(Value::empty_map);
        if mode == BufferMode::Replace || !matches!(slot, Value::Map(_)) {
            *slot = Value::empty_map();
        }
        slot
    }

    /// Read back a buffer (or any entry) for a `<name` filter.
    pub(crate) fn back_ref(&self, name: &str) -> Value {
        self.fields.get(name).cloned().unwrap_or_else(Value::empty_map)
    }
}

impl From<Tree> for Context {
    fn from(fields: Tree) -> Self {
        Context { fields }
    }
}

/// Named captures of a match as a mapping. Groups that did not participate map
/// to an empty string; values are trimmed when `autostrip` is set.
pub(crate) fn named_captures(regex: &Regex, caps: &Captures<'_>, autostrip: bool) -> Tree {
    regex
        .capture_names()
        .flatten()
        .map(|name| {
            let text = caps.name(name).map_or("", |m| m.as_str());
            let text = if autostrip { text.trim() } else { text };
            (name.to_string(), Value::Str(text.to_string()))
        })
        .collect()
}
