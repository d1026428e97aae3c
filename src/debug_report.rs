use statescan::{LineTrace, RuleHits, ScanResult};

/// Report styling. Every piece of text is tagged with the role it plays in
/// the report; the role decides the SGR code.
mod style {
    #[derive(Debug, Clone, Copy)]
    pub enum Role {
        Title,
        Banner,
        Label,
        Count,
        State,
        Transition,
        Rule,
        Hit,
        Miss,
        Location,
    }

    impl Role {
        fn sgr(self) -> &'static str {
            match self {
                Role::Title => "1;36",
                Role::Banner | Role::Rule => "90",
                Role::Label | Role::Miss => "2",
                Role::Count => "33",
                Role::State => "34",
                Role::Transition => "36",
                Role::Hit | Role::Location => "32",
            }
        }
    }

    pub struct Painter {
        ansi: bool,
    }

    impl Painter {
        pub fn new(ansi: bool) -> Self {
            Self { ansi }
        }

        pub fn role(&self, role: Role, text: impl AsRef<str>) -> String {
            let text = text.as_ref();
            if self.ansi { format!("\x1b[{}m{text}\x1b[0m", role.sgr()) } else { text.to_string() }
        }

        pub fn banner(&self, title: &str) -> String {
            self.role(Role::Banner, format!("━━━ {title} ━━━"))
        }
    }
}

use style::{Painter, Role};

/// Print the run report for one scanned source to stderr.
///
/// `rules` holds one description per rule, indexed like the table.
pub fn print_run(source: &str, result: &ScanResult, rules: &[String], color: bool) {
    let p = Painter::new(color);
    eprintln!("\n{}", p.role(Role::Title, format!("⚙  Scanning: {source}")));

    eprintln!("\n{}", p.banner("Summary"));
    for line in summary(result, &p) {
        eprintln!("{line}");
    }

    eprintln!("\n{}", p.banner("Rules"));
    for (idx, hits) in result.metrics.rule_hits.iter().enumerate() {
        eprintln!("{}", rule_row(idx, hits, rules.get(idx).map(String::as_str), &p));
    }

    if !result.trace.is_empty() {
        eprintln!("\n{}", p.banner("Trace"));
        for line in &result.trace {
            eprintln!("{}", trace_entry(line, &p));
        }
    }

    eprintln!("\n{}", p.banner("Timing"));
    eprintln!("  Total: {}", p.role(Role::Hit, format!("{:?}", result.metrics.elapsed)));
    eprintln!();
}

fn summary(result: &ScanResult, p: &Painter) -> Vec<String> {
    let m = &result.metrics;
    let ending = if m.stopped_early { p.role(Role::Count, "stopped by rule") } else { p.role(Role::Label, "end of input") };
    let mut out = vec![
        format!(
            "  {} {}  │  {} {}  │  {} {}",
            p.role(Role::Label, "lines:"),
            p.role(Role::Count, m.lines.to_string()),
            p.role(Role::Label, "matched:"),
            p.role(Role::Hit, m.matched_lines.to_string()),
            p.role(Role::Label, "attempts:"),
            p.role(Role::Count, m.rule_attempts.to_string()),
        ),
        format!("  {} {}  │  {}", p.role(Role::Label, "final state:"), p.role(Role::State, &m.final_state), ending),
    ];
    if result.tree.is_empty() {
        out.push(format!("  {}", p.role(Role::Miss, "output tree is empty")));
    }
    out
}

fn rule_row(idx: usize, hits: &RuleHits, description: Option<&str>, p: &Painter) -> String {
    let matches = if hits.matches > 0 {
        p.role(Role::Hit, format!("✓ {}", hits.matches))
    } else {
        p.role(Role::Miss, "✗ 0")
    };
    format!(
        "  {} {}  {} {}  {}",
        p.role(Role::Rule, format!("[{idx}]")),
        matches,
        p.role(Role::Label, "tried:"),
        p.role(Role::Count, hits.attempts.to_string()),
        p.role(Role::Label, description.unwrap_or("?")),
    )
}

/// One trace line plus one indented row per fired rule.
fn trace_entry(line: &LineTrace, p: &Painter) -> String {
    let state = if line.state_before == line.state_after {
        p.role(Role::State, &line.state_before)
    } else {
        p.role(Role::Transition, format!("{} → {}", line.state_before, line.state_after))
    };
    let mut out =
        format!("  {} {} {}", p.role(Role::Rule, format!("{:>4}", line.line_no)), state, p.role(Role::Label, &line.preview));
    for hit in &line.fired {
        out.push_str(&format!(
            "\n       {} {}",
            p.role(Role::Count, format!("rule {}", hit.rule)),
            p.role(Role::Location, hit.location.as_deref().unwrap_or("-")),
        ));
    }
    out
}
