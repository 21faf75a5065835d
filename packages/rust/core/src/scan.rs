//! The scan pipeline: plan sources, fetch, filter, diff against the cache,
//! and render the change report.
//!
//! Search mode walks the planned search-feed queries. Direct mode visits
//! every watchlist page and falls back to a site-scoped search when a page
//! fails or yields nothing. Both share one classification path.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use signalwatch_extract::{extract_links, resolve_date};
use signalwatch_feeds::{FeedEntry, FetchStrategy, Fetcher, parse_feed};
use signalwatch_report::{ReportInput, SummaryLine, humanize_section, render_report};
use signalwatch_shared::{
    AppConfig, CandidateSignal, Result, RunId, ScanMode, ScanSettings, SignalWatchError,
    Watchlists,
};
use signalwatch_storage::DataStore;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::cache::{IncrementalCache, SourceDelta};
use crate::conference::ConferenceCalendar;
use crate::filter::{FilterPolicy, FilterVocabulary, RawCandidate, SignalFilter};
use crate::planner::{PlanLimits, PlannedQuery, SearchEndpoint, SourcePlanner, daily_seed, domain_of};
use crate::progress::ProgressReporter;
use crate::terms::TermRegistry;

/// Report heading for scans.
pub const SCAN_HEADING: &str = "Signal Scan";

const SEARCH_SECTION: &str = "search";

// ---------------------------------------------------------------------------
// Inputs & outcome
// ---------------------------------------------------------------------------

/// Everything a scan reads. Built once per run.
pub struct ScanInputs<'a> {
    pub run_id: RunId,
    pub settings: &'a ScanSettings,
    pub watchlists: &'a Watchlists,
    pub terms: &'a TermRegistry,
    pub planner: &'a SourcePlanner,
    pub filter: &'a SignalFilter,
    pub now: DateTime<Utc>,
}

/// A source with new items this run.
#[derive(Debug, Clone)]
pub struct SourceChange {
    pub label: String,
    /// Cache key (feed or page URL).
    pub key: String,
    pub delta: SourceDelta,
}

/// Changes within one watchlist section (or the search query set).
#[derive(Debug, Clone)]
pub struct SectionChanges {
    pub name: String,
    /// Label of the section's `## Summary` line.
    pub summary_label: String,
    pub changes: Vec<SourceChange>,
}

#[derive(Debug)]
pub struct ScanOutcome {
    pub run_id: RunId,
    /// Updated snapshots. Failed sources keep their previous entry.
    pub cache: IncrementalCache,
    pub sections: Vec<SectionChanges>,
    pub sources_scanned: usize,
    pub sources_failed: usize,
}

impl ScanOutcome {
    /// New items of every reportable source, in scan order.
    pub fn reported_signals(&self) -> Vec<CandidateSignal> {
        self.sections
            .iter()
            .flat_map(|s| &s.changes)
            .flat_map(|c| c.delta.new_items.iter().cloned())
            .collect()
    }

    pub fn summary_lines(&self) -> Vec<SummaryLine> {
        self.sections
            .iter()
            .map(|s| SummaryLine::new(s.summary_label.clone(), s.changes.len()))
            .collect()
    }

    pub fn sources_updated(&self) -> usize {
        self.sections.iter().map(|s| s.changes.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// Scan
// ---------------------------------------------------------------------------

/// Run one scan over all planned or listed sources.
///
/// Fetch and parse failures are logged and skipped; they never abort the run.
#[instrument(skip_all, fields(run_id = %inputs.run_id, mode = ?inputs.settings.mode))]
pub async fn run_scan<F: Fetcher + ?Sized>(
    fetcher: &F,
    inputs: &ScanInputs<'_>,
    cache: IncrementalCache,
    progress: &dyn ProgressReporter,
) -> ScanOutcome {
    let mut scanner = Scanner {
        fetcher,
        inputs,
        pacer: Pacer::new(Duration::from_millis(inputs.settings.request_delay_ms)),
        cache,
        scanned: 0,
        failed: 0,
    };

    let sections = match inputs.settings.mode {
        ScanMode::Search => vec![scanner.search_mode(progress).await],
        ScanMode::Direct => scanner.direct_mode(progress).await,
    };

    ScanOutcome {
        run_id: inputs.run_id.clone(),
        cache: scanner.cache,
        sections,
        sources_scanned: scanner.scanned,
        sources_failed: scanner.failed,
    }
}

struct Scanner<'a, 'i, F: ?Sized> {
    fetcher: &'a F,
    inputs: &'a ScanInputs<'i>,
    pacer: Pacer,
    cache: IncrementalCache,
    scanned: usize,
    failed: usize,
}

impl<F: Fetcher + ?Sized> Scanner<'_, '_, F> {
    async fn search_mode(&mut self, progress: &dyn ProgressReporter) -> SectionChanges {
        let settings = self.inputs.settings;
        let seed = daily_seed(self.inputs.now.date_naive());
        let queries = self.inputs.planner.plan(
            seed,
            &self.inputs.watchlists.domains(),
            self.inputs.terms.terms(),
            &PlanLimits::from(settings),
        );
        info!(queries = queries.len(), "planned search queries");
        progress.phase("Searching feeds");

        let mut changes = Vec::new();
        let total = queries.len();
        for (idx, query) in queries.iter().enumerate() {
            progress.source_started(&query.label, idx + 1, total);
            let result = self.search(query).await;
            if let Some(change) = self.record(&query.label, &query.url, result) {
                changes.push(change);
            }
        }

        SectionChanges {
            name: SEARCH_SECTION.into(),
            summary_label: "Search queries with updates".into(),
            changes,
        }
    }

    async fn direct_mode(&mut self, progress: &dyn ProgressReporter) -> Vec<SectionChanges> {
        let settings = self.inputs.settings;
        let mut sections = Vec::new();

        for (section, sources) in self.inputs.watchlists.sections() {
            progress.phase(&format!("Scanning {}", humanize_section(&section)));
            let mut changes = Vec::new();
            let total = sources.len();

            for (idx, source) in sources.iter().enumerate() {
                let name = source.name.trim();
                let url = source.url.trim();
                if name.is_empty() || url.is_empty() {
                    continue;
                }
                progress.source_started(name, idx + 1, total);

                let result = match self.page(url).await {
                    Ok(items) if !items.is_empty() => Ok(items),
                    page_result => match domain_of(url).filter(|_| settings.fallback_search) {
                        Some(domain) => {
                            if let Err(e) = &page_result {
                                debug!(source = name, error = %e, "page failed");
                            }
                            let query = self.inputs.planner.fallback(&domain, name, settings.days);
                            debug!(source = name, query = %query.query, "falling back to search");
                            self.search(&query).await
                        }
                        None => page_result,
                    },
                };

                if let Some(change) = self.record(name, url, result) {
                    changes.push(change);
                }
            }

            sections.push(SectionChanges {
                summary_label: format!("{} updated", humanize_section(&section)),
                name: section,
                changes,
            });
        }

        sections
    }

    /// Apply a source result to the cache. Failures leave the cache untouched.
    fn record(
        &mut self,
        label: &str,
        key: &str,
        result: Result<Vec<CandidateSignal>>,
    ) -> Option<SourceChange> {
        self.scanned += 1;
        let accepted = match result {
            Ok(accepted) => accepted,
            Err(e) => {
                self.failed += 1;
                self.log_failure(label, &e);
                return None;
            }
        };

        let delta = self.cache.apply(key, &accepted, self.inputs.now);
        debug!(
            source = label,
            accepted = accepted.len(),
            new = delta.new_items.len(),
            bootstrap = delta.bootstrap,
            "source scanned"
        );
        delta.is_reportable().then(|| SourceChange {
            label: label.to_string(),
            key: key.to_string(),
            delta,
        })
    }

    async fn search(&mut self, query: &PlannedQuery) -> Result<Vec<CandidateSignal>> {
        self.pacer.wait().await;
        let bytes = self.fetcher.fetch(&query.url, FetchStrategy::Feed).await?;
        let entries = parse_feed(&bytes)?;
        Ok(self.classify_entries(entries))
    }

    async fn page(&self, url: &str) -> Result<Vec<CandidateSignal>> {
        let base = Url::parse(url)
            .map_err(|e| SignalWatchError::validation(format!("invalid source URL {url}: {e}")))?;
        let bytes = self.fetcher.fetch(url, FetchStrategy::Page).await?;
        let html = String::from_utf8_lossy(&bytes);

        let accepted = extract_links(&html, &base)
            .into_iter()
            .filter_map(|link| {
                let published_at = resolve_date(&format!("{} {}", link.text, link.url));
                self.classify(RawCandidate {
                    title: link.text,
                    url: link.url,
                    published_at,
                })
            })
            .collect();
        Ok(accepted)
    }

    fn classify_entries(&self, entries: Vec<FeedEntry>) -> Vec<CandidateSignal> {
        entries
            .into_iter()
            .filter_map(|entry| {
                let published_at = entry
                    .published
                    .or_else(|| resolve_date(&format!("{} {}", entry.title, entry.link)));
                self.classify(RawCandidate {
                    title: entry.title,
                    url: entry.link,
                    published_at,
                })
            })
            .collect()
    }

    fn classify(&self, candidate: RawCandidate) -> Option<CandidateSignal> {
        match self.inputs.filter.classify(candidate) {
            Ok(signal) => Some(signal),
            Err(reason) => {
                tracing::trace!(?reason, "candidate rejected");
                None
            }
        }
    }

    fn log_failure(&self, label: &str, error: &SignalWatchError) {
        if self.inputs.settings.verbose_errors || !error.is_source_local() {
            warn!(source = label, error = %error, "source failed");
        } else {
            debug!(source = label, error = %error, "source failed");
        }
    }
}

/// Fixed pause between consecutive search-feed requests.
pub(crate) struct Pacer {
    delay: Duration,
    issued: usize,
}

impl Pacer {
    pub(crate) fn new(delay: Duration) -> Self {
        Self { delay, issued: 0 }
    }

    pub(crate) async fn wait(&mut self) {
        if self.issued > 0 && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.issued += 1;
    }
}

// ---------------------------------------------------------------------------
// End-to-end command
// ---------------------------------------------------------------------------

/// Result of a full scan command.
#[derive(Debug)]
pub struct ScanSummary {
    pub run_id: RunId,
    pub report_path: PathBuf,
    pub sources_scanned: usize,
    pub sources_failed: usize,
    pub sources_updated: usize,
    pub new_items: usize,
    pub elapsed: Duration,
}

/// Load inputs, scan, write the report, and persist the cache.
#[instrument(skip_all, fields(mode = ?settings.mode))]
pub async fn scan<F: Fetcher + ?Sized>(
    store: &DataStore,
    config: &AppConfig,
    settings: &ScanSettings,
    fetcher: &F,
    progress: &dyn ProgressReporter,
    now: DateTime<Utc>,
) -> Result<ScanSummary> {
    let start = Instant::now();
    let run_id = RunId::new();
    info!(%run_id, "starting scan");

    progress.phase("Loading watchlists");
    let tracked = store.load_tracked()?;
    let watchlists = store.load_watchlists()?;
    let terms = TermRegistry::from_items(&tracked.items);
    let cache = IncrementalCache::new(store.load_cache());
    debug!(terms = terms.len(), cached_sources = cache.len(), "inputs loaded");

    let planner = SourcePlanner::new(
        SearchEndpoint::new(&config.search)?,
        config.search.condition_query.clone(),
    );
    let calendar = ConferenceCalendar::new(config.conference_windows.clone());
    let policy = FilterPolicy::for_scan(settings, &calendar, now);
    if !policy.require_tracked {
        info!("keyword-only matches allowed this run");
    }
    let filter = SignalFilter::new(
        terms.matcher().clone(),
        FilterVocabulary::scan(&config.vocabulary),
        policy,
    );

    let inputs = ScanInputs {
        run_id: run_id.clone(),
        settings,
        watchlists: &watchlists,
        terms: &terms,
        planner: &planner,
        filter: &filter,
        now,
    };
    let outcome = run_scan(fetcher, &inputs, cache, progress).await;

    progress.phase("Writing report");
    let signals = outcome.reported_signals();
    let summary = outcome.summary_lines();
    let report = render_report(&ReportInput {
        heading: SCAN_HEADING,
        generated_at: now,
        summary: &summary,
        signals: &signals,
        top_items: settings.top_items,
    });
    let report_path = store.scan_report_path();
    store.write_report(&report_path, &report)?;

    let sources_updated = outcome.sources_updated();
    let ScanOutcome {
        cache,
        sources_scanned,
        sources_failed,
        ..
    } = outcome;
    store.save_cache(&cache.into_entries())?;

    let result = ScanSummary {
        run_id,
        report_path,
        sources_scanned,
        sources_failed,
        sources_updated,
        new_items: signals.len(),
        elapsed: start.elapsed(),
    };
    info!(
        new_items = result.new_items,
        sources_updated = result.sources_updated,
        sources_failed = result.sources_failed,
        "scan complete"
    );
    progress.done(&format!("{} new items", result.new_items));
    Ok(result)
}
