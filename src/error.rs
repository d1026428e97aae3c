//! Error types.
//!
//! Two phases can fail: compiling a rule table ([`ConfigError`], always before the
//! first line is read) and running a caller-supplied filter function during a scan
//! ([`ScanError`]). Lines that match no rule and template keys missing from the
//! context are not errors.

use crate::engine::FilterError;
use thiserror::Error;

/// The rule table is malformed. Always a programming error in the caller.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("rule table must be a sequence of 5-element sequences")]
    NotASequence,

    #[error("rule table must not be empty")]
    EmptyTable,

    #[error("rule {rule}: expected a sequence, one level of brackets or a comma is missing somewhere")]
    RuleNotASequence { rule: usize },

    #[error(
        "rule {rule}: must contain 5 elements (ifstate, gotostate, pattern, datapath and outfilter), found {found}"
    )]
    WrongArity { rule: usize, found: usize },

    #[error("rule {rule}: field `{field}` must be {expected}")]
    InvalidField { rule: usize, field: &'static str, expected: &'static str },

    #[error("rule {rule}: invalid pattern `{pattern}`")]
    InvalidPattern {
        rule: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("rule {rule}: buffer path `{path}` has no buffer name")]
    EmptyBufferName { rule: usize, path: String },
}

/// A scan aborted.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A filter function returned an error. The scan stops at that line.
    #[error("rule {rule}: filter failed on line {line}")]
    Filter {
        rule: usize,
        line: usize,
        #[source]
        source: FilterError,
    },
}

/// Umbrella error for one-shot helpers that load, compile and scan.
#[derive(Debug, Error)]
pub enum StatescanError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("rule table is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
