//! News collection: pull feed items into the long-lived updates dataset.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use signalwatch_extract::resolve_date;
use signalwatch_feeds::{FeedEntry, FetchStrategy, Fetcher, parse_feed};
use signalwatch_shared::{
    AppConfig, Category, DEFAULT_PRIORITY, Result, RunId, Source, SourceSpec, WeeklyUpdateRow,
};
use signalwatch_storage::DataStore;
use tracing::{debug, info, instrument, warn};

use crate::filter::cutoff_day;
use crate::planner::{SearchEndpoint, SourcePlanner};
use crate::progress::ProgressReporter;
use crate::scan::Pacer;
use crate::terms::{TermMatcher, TermRegistry};

/// Runtime settings for a news run.
#[derive(Debug, Clone)]
pub struct NewsSettings {
    pub days: u32,
    /// Tracked terms per generated search source.
    pub chunk_size: usize,
    pub request_delay_ms: u64,
    pub verbose_errors: bool,
}

impl From<&AppConfig> for NewsSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            days: config.news.days,
            chunk_size: config.news.chunk_size,
            request_delay_ms: config.scan.request_delay_ms,
            verbose_errors: false,
        }
    }
}

/// Merge configured, generated, and company press-room sources.
///
/// Configured sources with a blank name/URL or an unknown category are
/// dropped. Company press rooms are always `press_pipeline`.
pub fn news_sources(
    configured: &[SourceSpec],
    company_press: &[SourceSpec],
    terms: &TermRegistry,
    planner: &SourcePlanner,
    settings: &NewsSettings,
) -> Vec<Source> {
    let mut sources: Vec<Source> = configured
        .iter()
        .filter_map(|spec| {
            let source = Source::from_spec(spec);
            if source.is_none() {
                warn!(name = %spec.name, category = %spec.category, "skipping invalid news source");
            }
            source
        })
        .collect();

    let generated = planner
        .term_chunks(terms.terms(), settings.chunk_size, settings.days)
        .into_iter()
        .enumerate()
        .map(|(idx, query)| Source {
            name: format!("Search: watchlist {}", idx + 1),
            url: query.url,
            category: Category::PressPipeline,
            priority: DEFAULT_PRIORITY,
            require_match: true,
        });
    sources.extend(generated);

    sources.extend(company_press.iter().filter_map(|spec| {
        Source::from_spec(&SourceSpec {
            category: Category::PressPipeline.as_str().to_string(),
            ..spec.clone()
        })
    }));

    sources
}

/// Turn one source's feed entries into dataset rows.
///
/// Entries need a title; dated entries must fall on or after `cutoff`; when the
/// source requires a match, a tracked term must appear in the title.
pub fn rows_from_entries(
    source: &Source,
    entries: Vec<FeedEntry>,
    terms: &TermMatcher,
    cutoff: NaiveDate,
) -> Vec<WeeklyUpdateRow> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let title = entry.title.trim();
            if title.is_empty() {
                return None;
            }
            let date = entry
                .published
                .or_else(|| resolve_date(&format!("{} {}", entry.title, entry.link)))
                .map(|d| d.date_naive());
            if date.is_some_and(|d| d < cutoff) {
                return None;
            }

            let label = match terms.find(title) {
                Some(term) => format!("{} \u{b7} Match: {term}", source.name),
                None if source.require_match => return None,
                None => source.name.clone(),
            };
            let link = entry.link.trim();
            Some(WeeklyUpdateRow {
                category: source.category,
                title: title.to_string(),
                date,
                source: label,
                link: (!link.is_empty()).then(|| link.to_string()),
            })
        })
        .collect()
}

type RowKey = (Category, String, String, String);

fn row_key(row: &WeeklyUpdateRow) -> RowKey {
    (row.category, row.title.clone(), row.date_str(), row.source.clone())
}

#[derive(Debug)]
pub struct NewsOutcome {
    pub run_id: RunId,
    /// Rows not already present in the dataset, in source order.
    pub added: Vec<WeeklyUpdateRow>,
    pub sources_scanned: usize,
    pub sources_failed: usize,
}

/// Everything a news run reads.
pub struct NewsInputs<'a> {
    pub run_id: RunId,
    pub sources: &'a [Source],
    pub terms: &'a TermMatcher,
    /// Rows already in the dataset.
    pub existing: &'a [WeeklyUpdateRow],
    pub settings: &'a NewsSettings,
    /// Sources served by this endpoint are paced; plain feeds are not.
    pub search: &'a SearchEndpoint,
    pub now: DateTime<Utc>,
}

/// Fetch every source and collect rows missing from the dataset.
#[instrument(skip_all, fields(run_id = %inputs.run_id, sources = inputs.sources.len()))]
pub async fn run_news<F: Fetcher + ?Sized>(
    fetcher: &F,
    inputs: &NewsInputs<'_>,
    progress: &dyn ProgressReporter,
) -> NewsOutcome {
    let NewsInputs {
        sources,
        terms,
        existing,
        settings,
        search,
        now,
        ..
    } = *inputs;
    let cutoff = cutoff_day(now, settings.days);
    let mut seen: HashSet<RowKey> = existing.iter().map(row_key).collect();
    let mut pacer = Pacer::new(Duration::from_millis(settings.request_delay_ms));
    let mut added = Vec::new();
    let mut failed = 0;

    for (idx, source) in sources.iter().enumerate() {
        progress.source_started(&source.name, idx + 1, sources.len());
        if search.serves(&source.url) {
            pacer.wait().await;
        }

        let entries = match fetcher.fetch(&source.url, FetchStrategy::Feed).await {
            Ok(bytes) => parse_feed(&bytes),
            Err(e) => Err(e),
        };
        let entries = match entries {
            Ok(entries) => entries,
            Err(e) => {
                failed += 1;
                if settings.verbose_errors || !e.is_source_local() {
                    warn!(source = %source.name, error = %e, "news source failed");
                } else {
                    debug!(source = %source.name, error = %e, "news source failed");
                }
                continue;
            }
        };

        let before = added.len();
        for row in rows_from_entries(source, entries, terms, cutoff) {
            if seen.insert(row_key(&row)) {
                added.push(row);
            }
        }
        debug!(source = %source.name, new_rows = added.len() - before, "news source scanned");
    }

    NewsOutcome {
        run_id: inputs.run_id.clone(),
        added,
        sources_scanned: sources.len(),
        sources_failed: failed,
    }
}

#[derive(Debug)]
pub struct NewsSummary {
    pub run_id: RunId,
    pub sources_scanned: usize,
    pub sources_failed: usize,
    pub rows_added: usize,
    pub rows_total: usize,
    pub elapsed: Duration,
}

/// Load sources and the dataset, collect news, and append new rows.
#[instrument(skip_all)]
pub async fn collect_news<F: Fetcher + ?Sized>(
    store: &DataStore,
    config: &AppConfig,
    settings: &NewsSettings,
    fetcher: &F,
    progress: &dyn ProgressReporter,
    now: DateTime<Utc>,
) -> Result<NewsSummary> {
    let start = Instant::now();
    let run_id = RunId::new();
    info!(%run_id, "starting news collection");

    progress.phase("Loading sources");
    let tracked = store.load_tracked()?;
    let terms = TermRegistry::from_items(&tracked.items);
    let configured = store.load_news_sources()?;
    let company_press = store.load_company_press();
    let mut rows = store.load_rows()?;

    let endpoint = SearchEndpoint::new(&config.search)?;
    let planner = SourcePlanner::new(endpoint.clone(), config.search.news_condition_query.clone());
    let sources = news_sources(&configured, &company_press, &terms, &planner, settings);
    info!(sources = sources.len(), existing_rows = rows.len(), "sources ready");

    progress.phase("Fetching news");
    let inputs = NewsInputs {
        run_id: run_id.clone(),
        sources: &sources,
        terms: terms.matcher(),
        existing: &rows,
        settings,
        search: &endpoint,
        now,
    };
    let outcome = run_news(fetcher, &inputs, progress).await;

    let rows_added = outcome.added.len();
    rows.extend(outcome.added);
    store.save_rows(&rows)?;

    let summary = NewsSummary {
        run_id,
        sources_scanned: outcome.sources_scanned,
        sources_failed: outcome.sources_failed,
        rows_added,
        rows_total: rows.len(),
        elapsed: start.elapsed(),
    };
    info!(rows_added, rows_total = summary.rows_total, "news collection complete");
    progress.done(&format!("{rows_added} rows added"));
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentProgress;
    use crate::testing::{MockFetcher, rss};
    use chrono::TimeZone;
    use signalwatch_shared::PathsConfig;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap()
    }

    fn settings() -> NewsSettings {
        NewsSettings {
            request_delay_ms: 0,
            ..NewsSettings::from(&AppConfig::default())
        }
    }

    fn endpoint() -> SearchEndpoint {
        SearchEndpoint::new(&AppConfig::default().search).unwrap()
    }

    fn planner() -> SourcePlanner {
        SourcePlanner::new(endpoint(), AppConfig::default().search.news_condition_query)
    }

    fn spec(name: &str, url: &str, category: &str) -> SourceSpec {
        SourceSpec {
            name: name.into(),
            url: url.into(),
            category: category.into(),
            ..SourceSpec::default()
        }
    }

    fn source(name: &str, require_match: bool) -> Source {
        Source {
            name: name.into(),
            url: format!("https://feeds.example.com/{}", name.to_lowercase()),
            category: Category::SafetySignals,
            priority: DEFAULT_PRIORITY,
            require_match,
        }
    }

    fn entry(title: &str, link: &str, published: Option<DateTime<Utc>>) -> FeedEntry {
        FeedEntry {
            title: title.into(),
            link: link.into(),
            published,
        }
    }

    #[test]
    fn merges_configured_generated_and_company_sources() {
        let terms: Vec<String> = (1..=13).map(|i| format!("term{i}")).collect();
        let registry = TermRegistry::from_raw(terms.iter().map(String::as_str));
        let configured = vec![
            spec("MedWatch", "https://regulator.example.org/medwatch.xml", "safety_signals"),
            spec("Gossip", "https://gossip.example.com/feed", "rumours"),
        ];
        let company = vec![spec("Acme press", "https://acme.example.com/press.xml", "")];

        let sources = news_sources(&configured, &company, &registry, &planner(), &settings());
        let names: Vec<_> = sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["MedWatch", "Search: watchlist 1", "Search: watchlist 2", "Acme press"]
        );
        assert_eq!(sources[1].category, Category::PressPipeline);
        assert!(sources[1].require_match);
        assert!(sources[1].url.contains("when%3A7d"));
        assert_eq!(sources[3].category, Category::PressPipeline);
    }

    #[test]
    fn rows_respect_window_and_match() {
        let terms = TermMatcher::new(["Acme Corp"]);
        let cutoff = NaiveDate::from_ymd_opt(2026, 10, 10).unwrap();
        let entries = vec![
            entry("Acme Corp recalls lot", "https://w.example.com/1", Some(now())),
            entry("Acme Corp old news", "https://w.example.com/2", Some(Utc.with_ymd_and_hms(2026, 10, 9, 23, 0, 0).unwrap())),
            entry("Unrelated recall", "https://w.example.com/3", Some(now())),
            entry("Acme Corp undated", "", None),
            entry("  ", "https://w.example.com/5", Some(now())),
        ];

        let rows = rows_from_entries(&source("Wire", true), entries, &terms, cutoff);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].source, "Wire \u{b7} Match: Acme Corp");
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2026, 10, 17));
        assert_eq!(rows[0].link.as_deref(), Some("https://w.example.com/1"));
        assert_eq!(rows[1].title, "Acme Corp undated");
        assert_eq!(rows[1].date, None);
        assert_eq!(rows[1].link, None);
    }

    #[test]
    fn unmatched_rows_kept_when_match_not_required() {
        let terms = TermMatcher::new(["Acme Corp"]);
        let cutoff = NaiveDate::from_ymd_opt(2026, 10, 10).unwrap();
        let rows = rows_from_entries(
            &source("MedWatch", false),
            vec![entry("Unrelated recall", "https://w.example.com/3", Some(now()))],
            &terms,
            cutoff,
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source, "MedWatch");
        assert_eq!(rows[0].category, Category::SafetySignals);
    }

    #[tokio::test]
    async fn skips_rows_already_in_dataset() {
        let fetcher = MockFetcher::new()
            .route(
                "feeds.example.com/wire",
                rss(&[
                    ("Acme Corp recalls lot", "https://w.example.com/1", Some("Fri, 16 Oct 2026 09:00:00 GMT")),
                    ("Acme Corp expands trial", "https://w.example.com/2", Some("Fri, 16 Oct 2026 10:00:00 GMT")),
                    ("Acme Corp expands trial", "https://w.example.com/2", Some("Fri, 16 Oct 2026 10:00:00 GMT")),
                ]),
            )
            .fail("feeds.example.com/down");
        let existing = vec![WeeklyUpdateRow {
            category: Category::SafetySignals,
            title: "Acme Corp recalls lot".into(),
            date: NaiveDate::from_ymd_opt(2026, 10, 16),
            source: "Wire \u{b7} Match: Acme Corp".into(),
            link: None,
        }];

        let sources = [source("Wire", true), source("Down", true)];
        let terms = TermMatcher::new(["Acme Corp"]);
        let settings = settings();
        let search = endpoint();
        let inputs = NewsInputs {
            run_id: RunId::new(),
            sources: &sources,
            terms: &terms,
            existing: &existing,
            settings: &settings,
            search: &search,
            now: now(),
        };
        let outcome = run_news(&fetcher, &inputs, &SilentProgress).await;

        assert_eq!(outcome.added.len(), 1);
        assert_eq!(outcome.added[0].title, "Acme Corp expands trial");
        assert_eq!(outcome.sources_scanned, 2);
        assert_eq!(outcome.sources_failed, 1);
    }

    #[tokio::test]
    async fn plain_feeds_are_not_paced() {
        let feed = rss(&[("Acme Corp recalls lot", "https://w.example.com/1", None)]);
        let fetcher = MockFetcher::new().route("feeds.example.com", feed);
        let sources = [source("Wire", true), source("Alerts", true), source("Labels", true)];
        let terms = TermMatcher::new(["Acme Corp"]);
        let settings = NewsSettings {
            request_delay_ms: 60_000,
            ..settings()
        };
        let search = endpoint();
        let inputs = NewsInputs {
            run_id: RunId::new(),
            sources: &sources,
            terms: &terms,
            existing: &[],
            settings: &settings,
            search: &search,
            now: now(),
        };

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            run_news(&fetcher, &inputs, &SilentProgress),
        )
        .await
        .expect("plain feeds fetched without pacing");
        assert_eq!(outcome.sources_scanned, 3);
        assert_eq!(outcome.sources_failed, 0);
        assert_eq!(outcome.added.len(), 3);
    }

    #[test]
    fn oversized_window_keeps_every_dated_row() {
        let terms = TermMatcher::new(["Acme Corp"]);
        let old = Utc.with_ymd_and_hms(1990, 1, 1, 0, 0, 0).unwrap();
        let rows = rows_from_entries(
            &source("Wire", true),
            vec![entry("Acme Corp founded", "https://w.example.com/0", Some(old))],
            &terms,
            cutoff_day(now(), u32::MAX),
        );
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn collect_news_appends_to_dataset() {
        let root = std::env::temp_dir().join(format!("sw-news-test-{}", Uuid::now_v7()));
        let paths = PathsConfig {
            data_dir: root.join("data"),
            reports_dir: root.join("reports"),
            ..PathsConfig::default()
        };
        std::fs::create_dir_all(&paths.data_dir).unwrap();
        std::fs::copy("../../../fixtures/json/tracked.fixture.json", paths.tracked_path()).unwrap();
        std::fs::write(
            paths.news_sources_path(),
            r#"[{"name": "Label feed", "url": "https://regulator.example.org/labels.atom", "category": "label_expansions"}]"#,
        )
        .unwrap();
        let atom = std::fs::read("../../../fixtures/feeds/label.atom.xml").unwrap();
        let fetcher = MockFetcher::new()
            .route("regulator.example.org/labels.atom", atom)
            .route("news.google.com", rss(&[]));

        let store = DataStore::new(paths);
        let first = collect_news(&store, &AppConfig::default(), &settings(), &fetcher, &SilentProgress, now())
            .await
            .unwrap();
        assert_eq!(first.rows_added, 1);
        let rows = store.load_rows().unwrap();
        assert_eq!(rows[0].category, Category::LabelExpansions);
        assert_eq!(rows[0].title, "Label expansion granted for Factor XIa Inhibitor");
        assert_eq!(rows[0].source, "Label feed \u{b7} Match: Factor XIa Inhibitor");

        let second = collect_news(&store, &AppConfig::default(), &settings(), &fetcher, &SilentProgress, now())
            .await
            .unwrap();
        assert_eq!(second.rows_added, 0);
        assert_eq!(second.rows_total, 1);
    }
}
