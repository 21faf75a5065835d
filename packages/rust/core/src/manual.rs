//! Manual URL scan: filter a hand-collected list of links and report the hits.

use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use signalwatch_extract::{document_title, resolve_date};
use signalwatch_feeds::{FetchStrategy, Fetcher};
use signalwatch_report::{ReportInput, SummaryLine, render_report};
use signalwatch_shared::{AppConfig, CandidateSignal, Result};
use signalwatch_storage::DataStore;
use tracing::{debug, info, instrument};
use url::Url;

use crate::conference::ConferenceCalendar;
use crate::filter::{FilterPolicy, FilterVocabulary, RawCandidate, SignalFilter, tracked_required};
use crate::progress::ProgressReporter;
use crate::terms::TermRegistry;

pub const MANUAL_HEADING: &str = "Manual Scan";
const MANUAL_TOP_ITEMS: usize = 15;

static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_]+").expect("separator regex"));

/// One usable input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualLine {
    pub title: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ManualSettings {
    pub days: u32,
    pub allow_keyword_only: bool,
    pub conference_mode: bool,
    /// Fetch pages to read `<title>` for lines without one.
    pub fetch_missing_titles: bool,
    pub top_items: usize,
    /// Overrides the configured input file.
    pub input_path: Option<PathBuf>,
    /// Overrides the configured report file.
    pub output_path: Option<PathBuf>,
}

impl From<&AppConfig> for ManualSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            days: config.scan.days,
            allow_keyword_only: false,
            conference_mode: config.scan.conference_mode,
            fetch_missing_titles: false,
            top_items: MANUAL_TOP_ITEMS,
            input_path: None,
            output_path: None,
        }
    }
}

/// Parse `title<TAB>url` or a bare URL. Blank, comment, and non-URL lines
/// yield `None`.
pub fn parse_input_line(line: &str) -> Option<ManualLine> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (title, url) = match line.split_once('\t') {
        Some((title, url)) => (Some(title.trim()), url.trim()),
        None => (None, line),
    };
    if !url.starts_with("http") {
        return None;
    }
    Some(ManualLine {
        title: title.filter(|t| !t.is_empty()).map(str::to_string),
        url: url.to_string(),
    })
}

pub fn parse_input(text: &str) -> Vec<ManualLine> {
    text.lines().filter_map(parse_input_line).collect()
}

/// Readable title from the last path segment, or the URL itself when the
/// slug has nothing left.
pub fn title_from_url(url: &str) -> String {
    let slug = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()).map(str::to_string))
        })
        .unwrap_or_default();

    let spaced = SEPARATOR_RE.replace_all(&slug, " ");
    let title: String = spaced.chars().filter(|c| !c.is_ascii_digit()).collect();
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.is_empty() { url.to_string() } else { title }
}

async fn resolve_title<F: Fetcher + ?Sized>(fetcher: &F, line: &ManualLine, fetch: bool) -> String {
    if let Some(title) = &line.title {
        return title.clone();
    }
    if fetch {
        match fetcher.fetch(&line.url, FetchStrategy::Page).await {
            Ok(bytes) => {
                if let Some(title) = document_title(&String::from_utf8_lossy(&bytes)) {
                    return title;
                }
            }
            Err(e) => debug!(url = %line.url, error = %e, "title fetch failed"),
        }
    }
    title_from_url(&line.url)
}

/// Title every line and keep the ones the filter accepts, in input order.
#[instrument(skip_all, fields(lines = lines.len()))]
pub async fn run_manual<F: Fetcher + ?Sized>(
    fetcher: &F,
    lines: &[ManualLine],
    filter: &SignalFilter,
    fetch_missing_titles: bool,
    progress: &dyn ProgressReporter,
) -> Vec<CandidateSignal> {
    let mut accepted = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        progress.source_started(&line.url, idx + 1, lines.len());
        let title = resolve_title(fetcher, line, fetch_missing_titles).await;
        let published_at = resolve_date(&format!("{title} {}", line.url));
        match filter.classify(RawCandidate {
            title,
            url: line.url.clone(),
            published_at,
        }) {
            Ok(signal) => accepted.push(signal),
            Err(reason) => debug!(url = %line.url, ?reason, "manual line rejected"),
        }
    }
    accepted
}

#[derive(Debug)]
pub struct ManualSummary {
    pub report_path: PathBuf,
    pub lines: usize,
    pub accepted: usize,
}

/// Read the input list, filter it, and write the manual report.
#[instrument(skip_all)]
pub async fn manual_scan<F: Fetcher + ?Sized>(
    store: &DataStore,
    config: &AppConfig,
    settings: &ManualSettings,
    fetcher: &F,
    progress: &dyn ProgressReporter,
    now: DateTime<Utc>,
) -> Result<ManualSummary> {
    let input_path = settings
        .input_path
        .clone()
        .unwrap_or_else(|| store.paths().manual_input_path());
    let report_path = settings
        .output_path
        .clone()
        .unwrap_or_else(|| store.paths().manual_report_path());

    progress.phase("Reading input");
    let lines = parse_input(&store.read_manual_input(&input_path)?);
    let tracked = store.load_tracked()?;
    let terms = TermRegistry::from_items(&tracked.items);
    info!(lines = lines.len(), input = %input_path.display(), "manual scan input loaded");

    let calendar = ConferenceCalendar::new(config.conference_windows.clone());
    let require_tracked = tracked_required(
        settings.allow_keyword_only,
        settings.conference_mode,
        &calendar,
        now.date_naive(),
    );
    let filter = SignalFilter::new(
        terms.matcher().clone(),
        FilterVocabulary::manual(&config.vocabulary),
        FilterPolicy::new(now, settings.days, require_tracked, false),
    );

    progress.phase("Filtering links");
    let signals = run_manual(fetcher, &lines, &filter, settings.fetch_missing_titles, progress).await;

    let summary = [
        SummaryLine::new("Links read", lines.len()),
        SummaryLine::new("Links matched", signals.len()),
    ];
    let report = render_report(&ReportInput {
        heading: MANUAL_HEADING,
        generated_at: now,
        summary: &summary,
        signals: &signals,
        top_items: settings.top_items,
    });
    store.write_report(&report_path, &report)?;

    info!(accepted = signals.len(), report = %report_path.display(), "manual scan complete");
    progress.done(&format!("{} of {} links matched", signals.len(), lines.len()));
    Ok(ManualSummary {
        report_path,
        lines: lines.len(),
        accepted: signals.len(),
    })
}
