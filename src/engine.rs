//! Rule compilation and line scanning.
//!
//! This module is the engine behind [`StatePattern`](crate::StatePattern). It is
//! split into focused submodules under `src/engine/`, re-exported here.
//!
//! ## How the parts work together
//!
//! ```text
//! RuleDef table ──┐
//! (or JSON)       │  CompiledRules::new             (compiled_rules.rs, table.rs)
//!                 └───────────────┬────────────────
//!                                 │
//! lines ── Scanner::run ──────────┼─ per line: ordered guard check + anchored match
//!          (scanner.rs)           │
//!                                 v
//!                       Context::absorb            (context.rs)
//!                         - merge captures + bookkeeping
//!                                 │
//!                                 v
//!                       open_target / resolve_value    (resolve.rs, template.rs)
//!                         - interpolate path segments
//!                         - pick buffer or output tree
//!                         - evaluate filter
//!                                 │
//!                                 v
//!                       tree::store                (tree.rs)
//!                         - auto-vivify, append, merge
//!                                 │
//!                                 v
//!                               Tree
//! ```
//!
//! ## Responsibilities by module
//!
//! - `compiled_rules.rs`: the raw rule shape (`RuleDef`) and its validated,
//!   compiled form (`CompiledRules`).
//! - `table.rs`: loading a raw rule table from JSON with shape validation.
//! - `template.rs`: `{key}` interpolation against the context and key normalization.
//! - `context.rs`: the persistent capture store, including differed buffers.
//! - `tree.rs`: the auto-vivifying writer shared by the output tree and buffers.
//! - `resolve.rs`: turns a matched rule into a storage location and a value.
//! - `scanner.rs`: the line dispatcher / state machine.
//! - `metrics.rs`: run counters and the opt-in per-line trace.
//!
//! ## Debugging
//!
//! The scanner logs through `tracing`: `debug` for every line and every fired
//! rule, `trace` for every attempted rule.

#[path = "engine/compiled_rules.rs"]
mod compiled_rules;
#[path = "engine/context.rs"]
mod context;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/resolve.rs"]
mod resolve;
#[path = "engine/scanner.rs"]
mod scanner;
#[path = "engine/table.rs"]
mod table;
#[path = "engine/template.rs"]
mod template;
#[path = "engine/tree.rs"]
mod tree;


pub use compiled_rules::{
    CompiledRules, FilterError, FilterFn, FilterSpec, PathSpec, PatternSpec, RegexFlags, RuleDef, StateGuard,
    Transition,
};
pub use context::Context;
pub use metrics::{LineTrace, RuleHits, RuleTrace, ScanMetrics};
pub(crate) use scanner::Scanner;
pub use table::RuleTable;
pub use template::{interpolate, normalize_key};
