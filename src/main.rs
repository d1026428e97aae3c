mod debug_report;

use clap::{ArgAction, Parser};
use statescan::{Options, RegexFlags, StatePattern, StatescanError, Tree, Value};
use std::error::Error;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "STATESCAN_LOG";

/// Extract a JSON tree from line-oriented text with a stateful rule table.
#[derive(Debug, Parser)]
#[command(name = "statescan", version)]
struct Cli {
    /// JSON rule table: an array of [ifstate, gotostate, pattern, datapath, outfilter] rows.
    #[arg(long, value_name = "FILE.json")]
    rules: PathBuf,

    /// Text to scan instead of files or stdin.
    #[arg(long, value_name = "TEXT", conflicts_with = "files")]
    input: Option<String>,

    /// Files to scan, each one independently. Reads stdin when none are given.
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Case-insensitive patterns.
    #[arg(short = 'i', long)]
    ignore_case: bool,

    /// `^` and `$` match at line boundaries.
    #[arg(short = 'm', long)]
    multi_line: bool,

    /// `.` matches a newline.
    #[arg(short = 's', long)]
    dot_all: bool,

    /// Keep surrounding whitespace in captured values.
    #[arg(long)]
    no_strip: bool,

    /// Print the tree on one line.
    #[arg(long)]
    compact: bool,

    /// Print a run report (counters, per-rule hits, line trace) to stderr.
    #[arg(long)]
    report: bool,

    /// Force ANSI color in the report.
    #[arg(long, overrides_with = "no_color")]
    color: bool,

    /// Disable ANSI color in the report.
    #[arg(long, overrides_with = "color")]
    no_color: bool,

    /// Raise the log level (-v debug, -vv trace). `STATESCAN_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn options(&self) -> Options {
        let mut reflags = RegexFlags::empty();
        reflags.set(RegexFlags::IGNORE_CASE, self.ignore_case);
        reflags.set(RegexFlags::MULTI_LINE, self.multi_line);
        reflags.set(RegexFlags::DOT_ALL, self.dot_all);
        Options { reflags, autostrip: !self.no_strip, trace: self.report }
    }

    fn color(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            io::stderr().is_terminal()
        }
    }
}

/// One input to scan, with the label used in the report.
struct Source {
    label: String,
    text: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let parser = match load_rules(&cli) {
        Ok(parser) => parser,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };
    let sources = match read_sources(&cli) {
        Ok(sources) => sources,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };

    let color = cli.color();
    let mut trees = Vec::with_capacity(sources.len());
    for source in &sources {
        let result = match parser.parse_verbose(source.text.lines()) {
            Ok(result) => result,
            Err(err) => {
                eprintln!("error: {}: {}", source.label, error_chain(&err));
                return ExitCode::from(1);
            }
        };
        if cli.report {
            debug_report::print_run(&source.label, &result, &parser.rules().describe(), color);
        }
        trees.push((source.label.clone(), result.tree));
    }

    match render(trees, cli.compact) {
        Ok(out) => {
            println!("{out}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).with_target(false).try_init();
}

fn load_rules(cli: &Cli) -> Result<StatePattern, String> {
    let json = std::fs::read_to_string(&cli.rules)
        .map_err(|err| format!("failed to read rules '{}': {err}", cli.rules.display()))?;
    StatePattern::from_json(&json, cli.options())
        .map_err(|err: StatescanError| format!("{}: {}", cli.rules.display(), error_chain(&err)))
}

fn read_sources(cli: &Cli) -> Result<Vec<Source>, String> {
    if let Some(text) = &cli.input {
        return Ok(vec![Source { label: "--input".to_string(), text: text.clone() }]);
    }
    if cli.files.is_empty() {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text).map_err(|err| format!("failed to read stdin: {err}"))?;
        return Ok(vec![Source { label: "<stdin>".to_string(), text }]);
    }
    cli.files
        .iter()
        .map(|path| {
            std::fs::read_to_string(path)
                .map(|text| Source { label: path.display().to_string(), text })
                .map_err(|err| format!("failed to read '{}': {err}", path.display()))
        })
        .collect()
}

/// `outer: cause: root cause`
fn error_chain(err: &dyn Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(&format!(": {cause}"));
        source = cause.source();
    }
    out
}

/// A single source prints its tree; several print an object keyed by source.
fn render(trees: Vec<(String, Tree)>, compact: bool) -> serde_json::Result<String> {
    let value = if trees.len() == 1 {
        trees.into_iter().next().map(|(_, tree)| Value::Map(tree)).unwrap_or_else(Value::empty_map)
    } else {
        Value::Map(trees.into_iter().map(|(label, tree)| (label, Value::Map(tree))).collect())
    };
    if compact { serde_json::to_string(&value) } else { serde_json::to_string_pretty(&value) }
}
