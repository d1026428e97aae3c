//! Auto-vivifying writer for the output tree and differed buffers.
//!
//! ```text
//! store(tree, ["disks", "c1t0d0s0", "state"], "good")
//!
//! {}  ──▶  {"disks": {"c1t0d0s0": {"state": "good"}}}
//! ```
//!
//! Intermediate segments are created as mappings (a list segment appends a
//! fresh mapping and descends into it). At the terminal segment a list segment
//! appends, a mapping value is merged key-wise, and anything else replaces the
//! leaf. A location that already holds a list stays a list: whatever is stored
//! there is appended, with or without the `[]` marker.

use super::template::normalize_key;
use crate::{Tree, Value};

/// A resolved, normalized path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Segment {
    pub key: String,
    /// The segment ended with `[]`.
    pub list: bool,
}

impl Segment {
    /// Build from an interpolated segment, honoring the `[]` list marker.
    pub(crate) fn parse(raw: &str) -> Self {
        match raw.strip_suffix("[]") {
            Some(key) => Segment { key: normalize_key(key), list: true },
            None => Segment { key: normalize_key(raw), list: false },
        }
    }
}

/// Store `value` at `segments` under `tree`.
///
/// With no segments, a mapping value is merged into `tree` itself; any other
/// value cannot live at a mapping root and is handed back to the caller.
pub(crate) fn store(tree: &mut Tree, segments: &[Segment], value: Value) -> Option<Value> {
    let Some((last, parents)) = segments.split_last() else {
        return match value {
            Value::Map(map) => {
                merge(tree, map);
                None
            }
            other => Some(other),
        };
    };

    let mut node = tree;
    for segment in parents {
        node = descend(node, segment);
    }

    if last.list {
        let slot = node.entry(last.key.clone()).or_insert_with(|| Value::List(Vec::new()));
        ensure_list(slot).push(value);
    } else if let Some(Value::List(items)) = node.get_mut(&last.key) {
        items.push(value);
    } else {
        match value {
            Value::Map(map) => {
                let slot = node.entry(last.key.clone()).or_insert_with(Value::empty_map);
                merge(ensure_map(slot), map);
            }
            other => {
                node.insert(last.key.clone(), other);
            }
        }
    }
    None
}

fn descend<'t>(node: &'t mut Tree, segment: &Segment) -> &'t mut Tree {
    if segment.list {
        let slot = node.entry(segment.key.clone()).or_insert_with(|| Value::List(Vec::new()));
        let items = ensure_list(slot);
        items.push(Value::empty_map());
        let last = items.len() - 1;
        ensure_map(&mut items[last])
    } else {
        let slot = node.entry(segment.key.clone()).or_insert_with(Value::empty_map);
        ensure_map(slot)
    }
}

fn ensure_map(slot: &mut Value) -> &mut Tree {
    if !matches!(slot, Value::Map(_)) {
        *slot = Value::empty_map();
    }
    match slot {
        Value::Map(map) => map,
        _ => unreachable!("slot was just set to a mapping"),
    }
}

fn ensure_list(slot: &mut Value) -> &mut Vec<Value> {
    if !matches!(slot, Value::List(_)) {
        *slot = Value::List(Vec::new());
    }
    match slot {
        Value::List(items) => items,
        _ => unreachable!("slot was just set to a list"),
    }
}

/// Shallow key-wise update; later writes win.
fn merge(target: &mut Tree, source: Tree) {
    for (key, value) in source {
        target.insert(key, value);
    }
}
