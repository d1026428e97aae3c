use crate::engine::{CompiledRules, LineTrace, RegexFlags, RuleDef, RuleTable, ScanMetrics, Scanner};
use crate::error::{ConfigError, ScanError, StatescanError};
use crate::Tree;

/// Engine-level options, applied uniformly to a whole rule table.
#[derive(Debug, Clone)]
pub struct Options {
    /// Regex flags for every string pattern.
    pub reflags: RegexFlags,
    /// Trim captured values before they are stored or merged into the context.
    pub autostrip: bool,
    /// Keep a per-line trace in [`StatePattern::parse_verbose`] results.
    pub trace: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options { reflags: RegexFlags::empty(), autostrip: true, trace: false }
    }
}

/// A compiled rule table plus its options.
///
/// Compilation happens once in [`StatePattern::new`]; every `parse*` call is an
/// independent scan with a fresh context and output tree, so one `StatePattern`
/// can be reused (and shared across threads).
#[derive(Debug, Clone)]
pub struct StatePattern {
    rules: CompiledRules,
    options: Options,
}

/// Result from [`StatePattern::parse_verbose`].
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub tree: Tree,
    pub metrics: ScanMetrics,
    /// Empty unless [`Options::trace`] is set.
    pub trace: Vec<LineTrace>,
}

impl StatePattern {
    /// Validate and compile `table`. Fails before any input is read.
    pub fn new(table: impl Into<RuleTable>, options: Options) -> Result<Self, ConfigError> {
        let rules = CompiledRules::new(table.into().into_rules(), options.reflags)?;
        Ok(StatePattern { rules, options })
    }

    /// Load a JSON rule table (see [`RuleTable`]) and compile it.
    pub fn from_json(json: &str, options: Options) -> Result<Self, StatescanError> {
        Ok(Self::new(RuleTable::from_json_str(json)?, options)?)
    }

    pub fn rules(&self) -> &CompiledRules {
        &self.rules
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Scan `lines` and return the output tree.
    pub fn parse<I, S>(&self, lines: I) -> Result<Tree, ScanError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Scanner::new(&self.rules, self.options.autostrip, false).run(lines)?.tree)
    }

    /// Scan `text`, split on line breaks.
    pub fn parse_str(&self, text: &str) -> Result<Tree, ScanError> {
        self.parse(text.lines())
    }

    /// Scan `lines` and also return counters and (if enabled) the per-line trace.
    pub fn parse_verbose<I, S>(&self, lines: I) -> Result<ScanResult, ScanError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let run = Scanner::new(&self.rules, self.options.autostrip, self.options.trace).run(lines)?;
        Ok(ScanResult { tree: run.tree, metrics: run.metrics, trace: run.trace })
    }
}

/// Compile `table` with default [`Options`] and scan `lines`.
///
/// # Example
/// ```
/// use statescan::{parse, rules};
///
/// let tree = parse(rules![("", None, "(?P<key>.*):(?P<val>.*)", "{key}", "{val}")], ["first name: Eric"]).unwrap();
/// assert_eq!(tree["first_name"], "Eric");
/// ```
pub fn parse<I, S>(table: Vec<RuleDef>, lines: I) -> Result<Tree, StatescanError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Ok(StatePattern::new(table, Options::default())?.parse(lines)?)
}

/// Load a JSON rule table, compile it with default [`Options`] and scan `lines`.
pub fn parse_json<I, S>(json: &str, lines: I) -> Result<Tree, StatescanError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Ok(StatePattern::from_json(json, Options::default())?.parse(lines)?)
}
