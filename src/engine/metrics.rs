//! Scan metrics and trace.
//!
//! Counters are always collected: they are a handful of integers per rule. The
//! per-line trace is opt-in (`Options::trace`) since it keeps one entry per
//! input line.

use std::time::Duration;

/// Counters for one scan.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanMetrics {
    /// Lines pulled from the input.
    pub lines: usize,
    /// Lines on which at least one rule fired.
    pub matched_lines: usize,
    /// Match attempts across all rules (guard-rejected rules are not attempted).
    pub rule_attempts: usize,
    /// Per-rule counters, indexed like the rule table.
    pub rule_hits: Vec<RuleHits>,
    /// Scanner state when the scan ended.
    pub final_state: String,
    /// The scan ended on a `__stop__` transition rather than end of input.
    pub stopped_early: bool,
    pub elapsed: Duration,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RuleHits {
    pub attempts: usize,
    pub matches: usize,
}

/// What happened on one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineTrace {
    /// 1-based line number.
    pub line_no: usize,
    /// First 80 characters of the line.
    pub preview: String,
    pub state_before: String,
    pub state_after: String,
    /// Rules that fired on this line, in order.
    pub fired: Vec<RuleTrace>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTrace {
    pub rule: usize,
    /// Resolved storage location, `None` for rules without a path.
    pub location: Option<String>,
}
