//! Plain-text change reports.
//!
//! A report has a run header, an optional `## Summary` of per-section update
//! counts, the first N accepted signals under `## Top Items`, and every signal
//! grouped by matched term under `## By Drug/Device`. Output is a pure
//! function of its input.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use signalwatch_shared::CandidateSignal;
use tracing::{debug, instrument};

/// Group label for signals without a matched term.
pub const UNSPECIFIED_GROUP: &str = "Unspecified";

/// Line printed instead of item sections when nothing was accepted.
pub const EMPTY_NOTICE: &str = "No matching items found.";

/// One `- {label}: {count}` line under `## Summary`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryLine {
    pub label: String,
    pub count: usize,
}

impl SummaryLine {
    pub fn new(label: impl Into<String>, count: usize) -> Self {
        Self {
            label: label.into(),
            count,
        }
    }
}

/// Everything a report is rendered from.
#[derive(Debug, Clone)]
pub struct ReportInput<'a> {
    /// Report name, printed as `# {heading} ({date})`.
    pub heading: &'a str,
    pub generated_at: DateTime<Utc>,
    /// Empty means no `## Summary` section.
    pub summary: &'a [SummaryLine],
    pub signals: &'a [CandidateSignal],
    /// Length of the `## Top Items` list.
    pub top_items: usize,
}

/// Render a report.
#[instrument(skip_all, fields(heading = input.heading, signals = input.signals.len()))]
pub fn render_report(input: &ReportInput<'_>) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push(format!(
        "# {} ({})",
        input.heading,
        input.generated_at.date_naive()
    ));
    lines.push(String::new());
    lines.push(format!(
        "Run time: {}",
        input.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    lines.push(String::new());

    if !input.summary.is_empty() {
        lines.push("## Summary".into());
        for line in input.summary {
            lines.push(format!("- {}: {}", line.label, line.count));
        }
        lines.push(String::new());
    }

    if input.signals.is_empty() {
        lines.push(EMPTY_NOTICE.into());
        return finish(lines);
    }

    lines.push("## Top Items".into());
    for signal in input.signals.iter().take(input.top_items) {
        lines.push(format!("- {} (match: {})", signal.title, signal.matched_term));
        lines.push(format!("- {}", signal.url));
    }
    lines.push(String::new());

    let groups = group_by_term(input.signals);
    debug!(groups = groups.len(), "grouped signals");

    lines.push("## By Drug/Device".into());
    for (key, members) in groups {
        lines.push(format!("- {key}"));
        for signal in members {
            lines.push(format!("- {}", signal.title));
            lines.push(format!("- {}", signal.url));
        }
        lines.push(String::new());
    }

    finish(lines)
}

/// Group signals by matched term, groups ordered case-insensitively, members
/// in input order.
fn group_by_term(signals: &[CandidateSignal]) -> Vec<(&str, Vec<&CandidateSignal>)> {
    let mut grouped: BTreeMap<(String, &str), Vec<&CandidateSignal>> = BTreeMap::new();
    for signal in signals {
        let key = match signal.matched_term.trim() {
            "" => UNSPECIFIED_GROUP,
            term => term,
        };
        grouped
            .entry((key.to_lowercase(), key))
            .or_default()
            .push(signal);
    }
    grouped
        .into_iter()
        .map(|((_, key), members)| (key, members))
        .collect()
}

fn finish(lines: Vec<String>) -> String {
    let mut out = lines.join("\n").trim().to_string();
    out.push('\n');
    out
}

/// Turn a section key like `press_rooms` into `Press rooms`.
pub fn humanize_section(key: &str) -> String {
    let spaced = key.replace(['_', '-'], " ");
    let mut chars = spaced.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
