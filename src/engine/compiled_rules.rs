//! Rule definitions and their compiled form.
//!
//! A rule table is written as a list of [`RuleDef`]s: a closed set of five fields
//! (guard, transition, pattern, path, filter), each with a small enum describing
//! the accepted shapes. [`CompiledRules::new`] validates the table once, before
//! any line is read, and produces the immutable form the scanner walks.
//!
//! ## Invariants
//!
//! - `CompiledRule::index` is the rule's position in the original table; the
//!   scanner relies on `CompiledRules::rules` keeping table order.
//! - Every string pattern is compiled exactly once, anchored at the start of the
//!   line (`\A(?:...)`). Pre-built regexes are anchored at match time instead.
//! - Buffer sigils (`>`/`>>`) are only recognized on the first path segment.

use super::context::Context;
use crate::Value;
use crate::error::ConfigError;
use regex::{Captures, Regex, RegexBuilder};
use std::fmt;
use std::sync::Arc;

/// Transition sentinel: keep evaluating the following rules on the same line.
pub(crate) const CONTINUE: &str = "__continue__";
/// Transition sentinel: end the scan after this rule.
pub(crate) const STOP: &str = "__stop__";

bitflags::bitflags! {
    /// Regex flags applied uniformly to every string pattern of a table.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RegexFlags: u8 {
        const IGNORE_CASE = 1 << 0;
        /// `^`/`$` match at line boundaries inside the subject.
        const MULTI_LINE  = 1 << 1;
        /// `.` also matches `\n`.
        const DOT_ALL     = 1 << 2;
        /// Whitespace and `#` comments in patterns are ignored.
        const VERBOSE     = 1 << 3;
        const SWAP_GREED  = 1 << 4;
        /// ASCII-only classes (`\w`, `\d`, ...).
        const UNICODE_OFF = 1 << 5;
    }
}

impl Default for RegexFlags {
    fn default() -> Self {
        RegexFlags::empty()
    }
}

impl RegexFlags {
    fn builder(self, pattern: &str) -> RegexBuilder {
        let mut builder = RegexBuilder::new(pattern);
        builder
            .case_insensitive(self.contains(RegexFlags::IGNORE_CASE))
            .multi_line(self.contains(RegexFlags::MULTI_LINE))
            .dot_matches_new_line(self.contains(RegexFlags::DOT_ALL))
            .ignore_whitespace(self.contains(RegexFlags::VERBOSE))
            .swap_greed(self.contains(RegexFlags::SWAP_GREED))
            .unicode(!self.contains(RegexFlags::UNICODE_OFF));
        builder
    }
}

// --- Raw rule fields --------------------------------------------------------

/// States under which a rule may be tried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StateGuard {
    /// Eligible in every state.
    #[default]
    Any,
    States(Vec<String>),
}

impl StateGuard {
    /// Parse a comma separated list of state names. Blank input means [`StateGuard::Any`].
    pub fn parse(spec: &str) -> Self {
        Self::from_names(spec.split(','))
    }

    fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<String> =
            names.into_iter().map(|s| s.as_ref().trim().to_string()).filter(|s| !s.is_empty()).collect();
        if names.is_empty() { StateGuard::Any } else { StateGuard::States(names) }
    }

    pub fn admits(&self, state: &str) -> bool {
        match self {
            StateGuard::Any => true,
            StateGuard::States(names) => names.iter().any(|n| n == state),
        }
    }

    /// Guarded state names; empty for [`StateGuard::Any`].
    pub fn names(&self) -> &[String] {
        match self {
            StateGuard::Any => &[],
            StateGuard::States(names) => names,
        }
    }
}

impl From<&str> for StateGuard {
    fn from(spec: &str) -> Self {
        StateGuard::parse(spec)
    }
}

impl From<String> for StateGuard {
    fn from(spec: String) -> Self {
        StateGuard::parse(&spec)
    }
}

impl<const N: usize> From<[&str; N]> for StateGuard {
    fn from(names: [&str; N]) -> Self {
        StateGuard::from_names(names)
    }
}

impl From<&[&str]> for StateGuard {
    fn from(names: &[&str]) -> Self {
        StateGuard::from_names(names)
    }
}

impl From<Vec<String>> for StateGuard {
    fn from(names: Vec<String>) -> Self {
        StateGuard::from_names(names)
    }
}

/// What happens to the scanner state after a rule fires.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Transition {
    /// Keep the current state; stop evaluating rules for this line.
    #[default]
    Stay,
    /// Switch to the named state; stop evaluating rules for this line.
    Goto(String),
    /// Keep the current state and try the following rules on the same line.
    Continue,
    /// End the scan; the tree built so far is returned.
    Stop,
}

impl Transition {
    /// `""` -> stay, `"__continue__"`, `"__stop__"`, anything else is a state name.
    pub fn parse(spec: &str) -> Self {
        match spec.trim() {
            "" => Transition::Stay,
            CONTINUE => Transition::Continue,
            STOP => Transition::Stop,
            state => Transition::Goto(state.to_string()),
        }
    }

    /// The textual form recorded in the context as `_gotostate`.
    pub fn as_str(&self) -> &str {
        match self {
            Transition::Stay => "",
            Transition::Goto(state) => state,
            Transition::Continue => CONTINUE,
            Transition::Stop => STOP,
        }
    }
}

/// A rule pattern, either source text or an already built regex.
#[derive(Debug, Clone)]
pub enum PatternSpec {
    Source(String),
    /// Used as-is: table-level [`RegexFlags`] are not applied.
    Compiled(Regex),
}

impl From<&str> for PatternSpec {
    fn from(source: &str) -> Self {
        PatternSpec::Source(source.to_string())
    }
}

impl From<String> for PatternSpec {
    fn from(source: String) -> Self {
        PatternSpec::Source(source)
    }
}

impl From<Regex> for PatternSpec {
    fn from(re: Regex) -> Self {
        PatternSpec::Compiled(re)
    }
}

/// Where a rule stores its value.
///
/// Segments are templates (`{key}` placeholders). A trailing `[]` makes the
/// location a list. A leading `>name` / `>>name` on the first segment targets a
/// differed buffer in the context instead of the output tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSpec {
    /// `"disks.{diskname}.{key}"`; the empty string is the tree root. Dots
    /// inside `{...}` are accessors, not separators.
    Dotted(String),
    Segments(Vec<String>),
}

impl From<&str> for PathSpec {
    fn from(path: &str) -> Self {
        PathSpec::Dotted(path.to_string())
    }
}

impl From<String> for PathSpec {
    fn from(path: String) -> Self {
        PathSpec::Dotted(path)
    }
}

impl<const N: usize> From<[&str; N]> for PathSpec {
    fn from(segments: [&str; N]) -> Self {
        PathSpec::Segments(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl From<Vec<String>> for PathSpec {
    fn from(segments: Vec<String>) -> Self {
        PathSpec::Segments(segments)
    }
}

impl PathSpec {
    fn into_segments(self) -> Vec<String> {
        match self {
            PathSpec::Dotted(path) if path.is_empty() => Vec::new(),
            PathSpec::Dotted(path) => split_dotted(&path),
            PathSpec::Segments(segments) => segments,
        }
    }
}

/// Split on `.` outside `{...}`, so `items.{rec.name}` keeps its accessor chain.
fn split_dotted(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in path.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            '.' if depth == 0 => {
                segments.push(path[start..i].to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(path[start..].to_string());
    segments
}

/// Error type filter functions may return; it aborts the scan.
pub type FilterError = Box<dyn std::error::Error + Send + Sync>;

/// A filter function: receives the match and the context, returns the value to
/// store and optionally a context that replaces the current one.
pub type FilterFn =
    Arc<dyn Fn(&Captures<'_>, &Context) -> Result<(Value, Option<Context>), FilterError> + Send + Sync>;

/// How the stored value is built from a match.
#[derive(Clone, Default)]
pub enum FilterSpec {
    /// Store the mapping of named captures.
    #[default]
    None,
    /// Store this value as-is (typically `{}` to initialize a buffer).
    Literal(Value),
    /// Store the context entry with this name (`"<name"`), an empty mapping if absent.
    BackRef(String),
    /// Interpolate against the context and store the resulting string.
    Template(String),
    Func(FilterFn),
}

impl FilterSpec {
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Captures<'_>, &Context) -> Result<(Value, Option<Context>), FilterError> + Send + Sync + 'static,
    {
        FilterSpec::Func(Arc::new(f))
    }

    /// `"<name"` is a back-reference, anything else a template.
    pub fn parse(spec: &str) -> Self {
        match spec.strip_prefix('<') {
            Some(name) => FilterSpec::BackRef(name.trim().to_string()),
            None => FilterSpec::Template(spec.to_string()),
        }
    }
}

impl fmt::Debug for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterSpec::None => f.write_str("None"),
            FilterSpec::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            FilterSpec::BackRef(name) => f.debug_tuple("BackRef").field(name).finish(),
            FilterSpec::Template(t) => f.debug_tuple("Template").field(t).finish(),
            FilterSpec::Func(_) => f.write_str("Func(<function>)"),
        }
    }
}

impl From<&str> for FilterSpec {
    fn from(spec: &str) -> Self {
        FilterSpec::parse(spec)
    }
}

impl From<String> for FilterSpec {
    fn from(spec: String) -> Self {
        FilterSpec::parse(&spec)
    }
}

impl From<Value> for FilterSpec {
    fn from(value: Value) -> Self {
        FilterSpec::Literal(value)
    }
}

impl From<crate::Tree> for FilterSpec {
    fn from(map: crate::Tree) -> Self {
        FilterSpec::Literal(Value::Map(map))
    }
}

/// One row of a rule table: `(if_state, goto_state, pattern, path, filter)`.
///
/// Build with [`rules!`](crate::rules), with struct syntax, or with the
/// chained helpers:
///
/// ```
/// use statescan::RuleDef;
///
/// let rule = RuleDef::new("disk", r"(?P<key>.*):(?P<val>.*)").path("disks.{diskname}.{key}").filter("{val}");
/// assert!(rule.path.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct RuleDef {
    pub guard: StateGuard,
    pub transition: Transition,
    pub pattern: PatternSpec,
    /// `None` stores nothing (and skips the filter).
    pub path: Option<PathSpec>,
    pub filter: FilterSpec,
}

impl RuleDef {
    pub fn new(guard: impl Into<StateGuard>, pattern: impl Into<PatternSpec>) -> Self {
        RuleDef {
            guard: guard.into(),
            transition: Transition::Stay,
            pattern: pattern.into(),
            path: None,
            filter: FilterSpec::None,
        }
    }

    pub fn goto(mut self, transition: &str) -> Self {
        self.transition = Transition::parse(transition);
        self
    }

    pub fn path(mut self, path: impl Into<PathSpec>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn filter(mut self, filter: impl Into<FilterSpec>) -> Self {
        self.filter = filter.into();
        self
    }
}

// --- Compiled form ----------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BufferMode {
    /// `>name`: start from an empty mapping.
    Replace,
    /// `>>name`: update the existing mapping.
    Merge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PathRoot {
    Tree,
    Buffer { name: String, mode: BufferMode },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CompiledPath {
    pub root: PathRoot,
    /// Segment templates, interpolated at match time.
    pub segments: Vec<String>,
}

impl CompiledPath {
    fn compile(rule: usize, spec: PathSpec) -> Result<Self, ConfigError> {
        let original = format!("{spec:?}");
        let mut segments = spec.into_segments();

        let root = match segments.first().and_then(|s| s.strip_prefix('>')) {
            None => PathRoot::Tree,
            Some(rest) => {
                let (mode, name) = match rest.trim_start().strip_prefix('>') {
                    Some(name) => (BufferMode::Merge, name.trim()),
                    None => (BufferMode::Replace, rest.trim()),
                };
                if name.is_empty() {
                    return Err(ConfigError::EmptyBufferName { rule, path: original });
                }
                PathRoot::Buffer { name: name.to_string(), mode }
            }
        };
        if root != PathRoot::Tree {
            segments.remove(0);
        }

        Ok(CompiledPath { root, segments })
    }

    fn describe(&self) -> String {
        let prefix = match &self.root {
            PathRoot::Tree => String::new(),
            PathRoot::Buffer { name, mode: BufferMode::Replace } => format!(">{name}"),
            PathRoot::Buffer { name, mode: BufferMode::Merge } => format!(">>{name}"),
        };
        std::iter::once(prefix).chain(self.segments.iter().cloned()).filter(|s| !s.is_empty()).collect::<Vec<_>>().join(".")
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CompiledRule {
    /// Position in the rule table.
    pub index: usize,
    pub guard: StateGuard,
    pub transition: Transition,
    pub regex: Regex,
    /// `true` when `regex` already carries the `\A` anchor.
    anchored: bool,
    pub path: Option<CompiledPath>,
    pub filter: FilterSpec,
}

impl CompiledRule {
    fn compile(index: usize, def: RuleDef, flags: RegexFlags) -> Result<Self, ConfigError> {
        let (regex, anchored) = match def.pattern {
            PatternSpec::Source(source) => {
                // Validate the pattern on its own so a stray `)` cannot pair with the anchor group.
                flags
                    .builder(&source)
                    .build()
                    .map_err(|source_err| ConfigError::InvalidPattern {
                        rule: index,
                        pattern: source.clone(),
                        source: source_err,
                    })?;
                let wrapped = if flags.contains(RegexFlags::VERBOSE) {
                    format!("\\A(?:{source}\n)")
                } else {
                    format!("\\A(?:{source})")
                };
                let regex = flags.builder(&wrapped).build().map_err(|source_err| ConfigError::InvalidPattern {
                    rule: index,
                    pattern: source,
                    source: source_err,
                })?;
                (regex, true)
            }
            PatternSpec::Compiled(regex) => (regex, false),
        };

        let path = def.path.map(|p| CompiledPath::compile(index, p)).transpose()?;

        Ok(CompiledRule { index, guard: def.guard, transition: def.transition, regex, anchored, path, filter: def.filter })
    }

    /// Match `line` from its first character.
    pub fn captures<'h>(&self, line: &'h str) -> Option<Captures<'h>> {
        let caps = self.regex.captures(line)?;
        if self.anchored || caps.get(0).is_some_and(|m| m.start() == 0) { Some(caps) } else { None }
    }

    fn describe(&self) -> String {
        let guard = match &self.guard {
            StateGuard::Any => "*".to_string(),
            StateGuard::States(names) => names.join(","),
        };
        let path = self.path.as_ref().map(CompiledPath::describe).unwrap_or_else(|| "-".to_string());
        format!(
            "#{} [{}] -> {:?} /{}/ path={} filter={:?}",
            self.index,
            guard,
            self.transition,
            self.regex.as_str(),
            path,
            self.filter
        )
    }
}

/// A validated rule table, ready to scan any number of inputs.
#[derive(Debug, Clone)]
pub struct CompiledRules {
    rules: Vec<CompiledRule>,
}

impl CompiledRules {
    /// Validate and compile `table`.
    ///
    /// Fails on an empty table, an invalid regex, or a buffer path without a
    /// buffer name.
    pub fn new(table: Vec<RuleDef>, flags: RegexFlags) -> Result<Self, ConfigError> {
        if table.is_empty() {
            return Err(ConfigError::EmptyTable);
        }
        let rules = table
            .into_iter()
            .enumerate()
            .map(|(index, def)| CompiledRule::compile(index, def, flags))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CompiledRules { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub(crate) fn iter(&self) -> std::slice::Iter<'_, CompiledRule> {
        self.rules.iter()
    }

    /// One line per rule: guard, transition, anchored pattern, path and filter.
    pub fn describe(&self) -> Vec<String> {
        self.rules.iter().map(CompiledRule::describe).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_parsing_splits_and_trims() {
        assert_eq!(StateGuard::parse(""), StateGuard::Any);
        assert_eq!(StateGuard::parse(" , "), StateGuard::Any);
        assert_eq!(StateGuard::parse("top, disk"), StateGuard::States(vec!["top".into(), "disk".into()]));
        assert!(StateGuard::from(["disk"]).admits("disk"));
        assert!(!StateGuard::from(["disk"]).admits("top"));
        assert!(StateGuard::Any.admits("anything"));
    }

    #[test]
    fn transition_sentinels() {
        assert_eq!(Transition::parse(""), Transition::Stay);
        assert_eq!(Transition::parse("__continue__"), Transition::Continue);
        assert_eq!(Transition::parse("__stop__"), Transition::Stop);
        assert_eq!(Transition::parse("disk"), Transition::Goto("disk".into()));
        assert_eq!(Transition::parse(" disk "), Transition::Goto("disk".into()));
        assert_eq!(Transition::parse(" __continue__"), Transition::Continue);
        assert_eq!(Transition::Goto("disk".into()).as_str(), "disk");
    }

    #[test]
    fn filter_string_forms() {
        assert!(matches!(FilterSpec::from("< disk_info"), FilterSpec::BackRef(n) if n == "disk_info"));
        assert!(matches!(FilterSpec::from("{val}"), FilterSpec::Template(t) if t == "{val}"));
    }

    #[test]
    fn buffer_sigils_are_split_from_the_path() {
        let merge = CompiledPath::compile(0, PathSpec::from(">>disk_info.{key}")).unwrap();
        assert_eq!(merge.root, PathRoot::Buffer { name: "disk_info".into(), mode: BufferMode::Merge });
        assert_eq!(merge.segments, vec!["{key}".to_string()]);

        let replace = CompiledPath::compile(0, PathSpec::from("> record")).unwrap();
        assert_eq!(replace.root, PathRoot::Buffer { name: "record".into(), mode: BufferMode::Replace });
        assert!(replace.segments.is_empty());

        let root = CompiledPath::compile(0, PathSpec::from("")).unwrap();
        assert_eq!(root.root, PathRoot::Tree);
        assert!(root.segments.is_empty());
    }

    #[test]
    fn dots_inside_placeholders_do_not_split_segments() {
        let path = CompiledPath::compile(0, PathSpec::from("items.{rec.name}.{a}")).unwrap();
        assert_eq!(path.segments, vec!["items".to_string(), "{rec.name}".into(), "{a}".into()]);

        let path = CompiledPath::compile(0, PathSpec::from(">>rec.{{x.y}}")).unwrap();
        assert_eq!(path.segments, vec!["{{x.y}}".to_string()]);
    }

    #[test]
    fn empty_buffer_name_is_rejected() {
        let err = CompiledPath::compile(3, PathSpec::from(">>.x")).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyBufferName { rule: 3, .. }));
    }

    #[test]
    fn empty_table_is_rejected() {
        assert!(matches!(CompiledRules::new(Vec::new(), RegexFlags::empty()), Err(ConfigError::EmptyTable)));
    }

    #[test]
    fn invalid_pattern_names_the_rule() {
        let table = vec![RuleDef::new("", "ok"), RuleDef::new("", "(unclosed")];
        match CompiledRules::new(table, RegexFlags::empty()) {
            Err(ConfigError::InvalidPattern { rule, pattern, .. }) => {
                assert_eq!(rule, 1);
                assert_eq!(pattern, "(unclosed");
            }
            other => panic!("expected an invalid pattern error, got {other:?}"),
        }
    }

    #[test]
    fn stray_paren_is_not_absorbed_by_the_anchor() {
        let table = vec![RuleDef::new("", "a)(b")];
        assert!(CompiledRules::new(table, RegexFlags::empty()).is_err());
    }

    #[test]
    fn patterns_match_only_at_line_start() {
        let rules = CompiledRules::new(vec![RuleDef::new("", "name")], RegexFlags::empty()).unwrap();
        let rule = rules.iter().next().unwrap();
        assert!(rule.captures("name: x").is_some());
        assert!(rule.captures("my name: x").is_none());
    }

    #[test]
    fn prebuilt_regex_is_anchored_at_match_time() {
        let re = Regex::new("name").unwrap();
        let rules = CompiledRules::new(vec![RuleDef::new("", re)], RegexFlags::empty()).unwrap();
        let rule = rules.iter().next().unwrap();
        assert!(rule.captures("name: x").is_some());
        assert!(rule.captures("my name: x").is_none());
    }

    #[test]
    fn verbose_flag_keeps_trailing_comments_inside_the_pattern() {
        let table = vec![RuleDef::new("", "(?P<word> \\w+ )  # a word")];
        let rules = CompiledRules::new(table, RegexFlags::VERBOSE).unwrap();
        let caps = rules.iter().next().unwrap().captures("hello world").unwrap();
        assert_eq!(&caps["word"], "hello");
    }

    #[test]
    fn compiling_twice_is_deterministic() {
        let table = || {
            rules![
                ("top", "disk", r"^Disk states", None, None),
                ("disk", "top", r"^\s*$", None, None),
                ("disk", "", r"(?P<key>.*):(?P<val>.*)", ">>buf.{key}", "{val}"),
            ]
        };
        let a = CompiledRules::new(table(), RegexFlags::IGNORE_CASE).unwrap();
        let b = CompiledRules::new(table(), RegexFlags::IGNORE_CASE).unwrap();
        assert_eq!(a.describe(), b.describe());
        assert_eq!(a.len(), 3);
    }
}
