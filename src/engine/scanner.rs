//! Line dispatcher / state machine.
//!
//! The scanner pulls one line at a time and walks the compiled rules in table
//! order:
//!
//! ```text
//! line ──▶ rule 0 ── guard? ── match? ──┐
//!          rule 1 ── guard? ── match? ──┤  first hit fires:
//!          ...                          │    absorb captures into Context
//!                                       │    resolve path + filter, store
//!                                       │    transition:
//!                                       │      Continue -> try next rule, same line
//!                                       │      Stay     -> next line
//!                                       │      Goto(s)  -> state = s, next line
//!                                       │      Stop     -> return tree
//! no hit ──▶ next line (silently) ◀─────┘
//! ```
//!
//! A rule whose guard excludes the current state is skipped without a match
//! attempt. Lines matching nothing are not an error. A failing filter function
//! aborts the scan with [`ScanError::Filter`].

use super::compiled_rules::{BufferMode, CompiledRule, CompiledRules, PathRoot, Transition};
use super::context::{Context, named_captures};
use super::metrics::{LineTrace, RuleHits, RuleTrace, ScanMetrics};
use super::resolve::{describe_location, open_target, resolve_segments, resolve_value};
use super::tree;
use crate::error::ScanError;
use crate::{Tree, Value};
use regex::Captures;
use std::time::Instant;
use tracing::{debug, trace, warn};

pub(crate) const INITIAL_STATE: &str = "top";

/// Whether the scan goes on after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineOutcome {
    Next,
    Stop,
}

/// Everything a finished scan produced.
#[derive(Debug)]
pub(crate) struct ScanRun {
    pub tree: Tree,
    pub metrics: ScanMetrics,
    pub trace: Vec<LineTrace>,
}

/// One scan over one input. Owns its context and output tree; the compiled
/// rules are shared.
#[derive(Debug)]
pub(crate) struct Scanner<'r> {
    rules: &'r CompiledRules,
    autostrip: bool,
    keep_trace: bool,
    state: String,
    context: Context,
    tree: Tree,
    metrics: ScanMetrics,
    trace: Vec<LineTrace>,
}

impl<'r> Scanner<'r> {
    pub(crate) fn new(rules: &'r CompiledRules, autostrip: bool, keep_trace: bool) -> Self {
        Scanner {
            rules,
            autostrip,
            keep_trace,
            state: INITIAL_STATE.to_string(),
            context: Context::new(),
            tree: Tree::new(),
            metrics: ScanMetrics { rule_hits: vec![RuleHits::default(); rules.len()], ..ScanMetrics::default() },
            trace: Vec::new(),
        }
    }

    /// Consume `lines` until exhausted (or a `__stop__` rule fires).
    pub(crate) fn run<I, S>(mut self, lines: I) -> Result<ScanRun, ScanError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let start = Instant::now();
        for line in lines {
            let line_no = self.metrics.lines + 1;
            if self.scan_line(line_no, line.as_ref())? == LineOutcome::Stop {
                self.metrics.stopped_early = true;
                debug!(line_no, "scan stopped by rule");
                break;
            }
        }
        self.metrics.final_state = self.state;
        self.metrics.elapsed = start.elapsed();
        debug!(
            lines = self.metrics.lines,
            matched = self.metrics.matched_lines,
            final_state = %self.metrics.final_state,
            "scan finished"
        );
        Ok(ScanRun { tree: self.tree, metrics: self.metrics, trace: self.trace })
    }

    /// Apply the rule table to one line.
    pub(crate) fn scan_line(&mut self, line_no: usize, line: &str) -> Result<LineOutcome, ScanError> {
        let rules = self.rules;
        let state_before = self.state.clone();
        let mut fired = Vec::new();
        let mut outcome = LineOutcome::Next;

        self.metrics.lines += 1;
        debug!(state = %self.state, line_no, line, "line");

        for rule in rules.iter() {
            if !rule.guard.admits(&self.state) {
                continue;
            }
            self.metrics.rule_attempts += 1;
            self.metrics.rule_hits[rule.index].attempts += 1;
            trace!(rule = rule.index, pattern = rule.regex.as_str(), "try");

            let Some(caps) = rule.captures(line) else {
                continue;
            };
            self.metrics.rule_hits[rule.index].matches += 1;

            let location = self.fire(rule, &caps, line_no)?;
            debug!(rule = rule.index, location = location.as_deref().unwrap_or("-"), "fired");
            fired.push(RuleTrace { rule: rule.index, location });

            match &rule.transition {
                Transition::Continue => continue,
                Transition::Stay => {}
                Transition::Goto(next) => self.state.clone_from(next),
                Transition::Stop => outcome = LineOutcome::Stop,
            }
            break;
        }

        if fired.is_empty() {
            trace!(line_no, "no rule matched");
        } else {
            self.metrics.matched_lines += 1;
        }
        if self.keep_trace {
            self.trace.push(LineTrace {
                line_no,
                preview: line.chars().take(80).collect(),
                state_before,
                state_after: self.state.clone(),
                fired,
            });
        }
        Ok(outcome)
    }

    /// Update the context from a match and store the rule's value.
    ///
    /// Returns the resolved location, if the rule has a path.
    fn fire(&mut self, rule: &CompiledRule, caps: &Captures<'_>, line_no: usize) -> Result<Option<String>, ScanError> {
        let captured = named_captures(&rule.regex, caps, self.autostrip);
        self.context.absorb(&captured, &self.state, rule);

        let Some(path) = &rule.path else {
            return Ok(None);
        };

        open_target(path, &mut self.context);
        let segments = resolve_segments(path, &self.context);
        let (value, replacement) = resolve_value(&rule.filter, caps, captured, &self.context)
            .map_err(|source| ScanError::Filter { rule: rule.index, line: line_no, source })?;
        if let Some(context) = replacement {
            self.context = context;
        }

        let location = describe_location(path, &segments);
        match &path.root {
            PathRoot::Tree => {
                if let Some(dropped) = tree::store(&mut self.tree, &segments, value) {
                    warn!(rule = rule.index, value = %dropped, "cannot store a non-mapping value at the tree root");
                }
            }
            PathRoot::Buffer { name, .. } => {
                let slot = self.context.open_buffer(name, BufferMode::Merge);
                let leftover = match slot {
                    Value::Map(buffer) => tree::store(buffer, &segments, value),
                    _ => Some(value),
                };
                if let Some(value) = leftover {
                    *slot = value;
                }
            }
        }
        Ok(Some(location))
    }

    #[cfg(test)]
    pub(crate) fn context(&self) -> &Context {
        &self.context
    }

    #[cfg(test)]
    pub(crate) fn tree(&self) -> &Tree {
        &self.tree
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &str {
        &self.state
    }
}
