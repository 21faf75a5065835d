//! Application configuration for SignalWatch.
//!
//! User config lives at `~/.signalwatch/signalwatch.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SignalWatchError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "signalwatch.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".signalwatch";

// ---------------------------------------------------------------------------
// Config structs (matching signalwatch.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Data and report file locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Scan defaults.
    #[serde(default)]
    pub scan: ScanDefaults,

    /// News collection defaults.
    #[serde(default)]
    pub news: NewsDefaults,

    /// Search feed endpoint and query vocabulary.
    #[serde(default)]
    pub search: SearchConfig,

    /// Relevance filter vocabularies.
    #[serde(default)]
    pub vocabulary: VocabularyConfig,

    /// Yearly conference seasons during which tracked-term matching is relaxed.
    #[serde(default = "default_conference_windows")]
    pub conference_windows: Vec<ConferenceWindow>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            scan: ScanDefaults::default(),
            news: NewsDefaults::default(),
            search: SearchConfig::default(),
            vocabulary: VocabularyConfig::default(),
            conference_windows: default_conference_windows(),
        }
    }
}

/// `[paths]` section. Relative paths resolve against the working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,
    /// Tracked-item dataset (terms source, card target).
    #[serde(default = "default_tracked_file")]
    pub tracked_file: String,
    /// Media domains and directly fetchable watchlist sections.
    #[serde(default = "default_watchlists_file")]
    pub watchlists_file: String,
    /// Per-source snapshot cache.
    #[serde(default = "default_cache_file")]
    pub cache_file: String,
    /// Append-only updates dataset.
    #[serde(default = "default_dataset_file")]
    pub dataset_file: String,
    /// Category-tagged feed sources for news collection.
    #[serde(default = "default_news_sources_file")]
    pub news_sources_file: String,
    /// Optional company press-room feeds.
    #[serde(default = "default_company_press_file")]
    pub company_press_file: String,
    #[serde(default = "default_scan_report_file")]
    pub scan_report_file: String,
    #[serde(default = "default_manual_input_file")]
    pub manual_input_file: String,
    #[serde(default = "default_manual_report_file")]
    pub manual_report_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            reports_dir: default_reports_dir(),
            tracked_file: default_tracked_file(),
            watchlists_file: default_watchlists_file(),
            cache_file: default_cache_file(),
            dataset_file: default_dataset_file(),
            news_sources_file: default_news_sources_file(),
            company_press_file: default_company_press_file(),
            scan_report_file: default_scan_report_file(),
            manual_input_file: default_manual_input_file(),
            manual_report_file: default_manual_report_file(),
        }
    }
}

impl PathsConfig {
    pub fn tracked_path(&self) -> PathBuf {
        self.data_dir.join(&self.tracked_file)
    }
    pub fn watchlists_path(&self) -> PathBuf {
        self.data_dir.join(&self.watchlists_file)
    }
    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join(&self.cache_file)
    }
    pub fn dataset_path(&self) -> PathBuf {
        self.data_dir.join(&self.dataset_file)
    }
    pub fn news_sources_path(&self) -> PathBuf {
        self.data_dir.join(&self.news_sources_file)
    }
    pub fn company_press_path(&self) -> PathBuf {
        self.data_dir.join(&self.company_press_file)
    }
    pub fn scan_report_path(&self) -> PathBuf {
        self.reports_dir.join(&self.scan_report_file)
    }
    pub fn manual_input_path(&self) -> PathBuf {
        self.data_dir.join(&self.manual_input_file)
    }
    pub fn manual_report_path(&self) -> PathBuf {
        self.reports_dir.join(&self.manual_report_file)
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}
fn default_tracked_file() -> String {
    "tracked.json".into()
}
fn default_watchlists_file() -> String {
    "watchlists.json".into()
}
fn default_cache_file() -> String {
    "scan_cache.json".into()
}
fn default_dataset_file() -> String {
    "weekly_updates.json".into()
}
fn default_news_sources_file() -> String {
    "news_sources.json".into()
}
fn default_company_press_file() -> String {
    "company_press.json".into()
}
fn default_scan_report_file() -> String {
    "scan.md".into()
}
fn default_manual_input_file() -> String {
    "manual_urls.txt".into()
}
fn default_manual_report_file() -> String {
    "manual_scan.md".into()
}

/// `[scan]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanDefaults {
    /// Lookback window in days.
    #[serde(default = "default_scan_days")]
    pub days: u32,
    /// Maximum search queries per run.
    #[serde(default = "default_max_queries")]
    pub max_queries: usize,
    /// Media domains queried per run (rotated daily).
    #[serde(default = "default_media_per_run")]
    pub media_per_run: usize,
    /// Tracked terms per search query (floored at 4).
    #[serde(default = "default_term_chunk")]
    pub term_chunk: usize,
    /// Pause between consecutive search queries.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "default_feed_timeout")]
    pub feed_timeout_secs: u64,
    #[serde(default = "default_page_timeout")]
    pub page_timeout_secs: u64,
    /// Length of the report's "Top Items" list.
    #[serde(default = "default_top_items")]
    pub top_items: usize,
    /// In direct mode, fall back to a site-scoped search feed when a page
    /// yields nothing.
    #[serde(default = "default_true")]
    pub fallback_search: bool,
    /// Relax tracked-term matching inside conference windows.
    #[serde(default = "default_true")]
    pub conference_mode: bool,
}

impl Default for ScanDefaults {
    fn default() -> Self {
        Self {
            days: default_scan_days(),
            max_queries: default_max_queries(),
            media_per_run: default_media_per_run(),
            term_chunk: default_term_chunk(),
            request_delay_ms: default_request_delay_ms(),
            feed_timeout_secs: default_feed_timeout(),
            page_timeout_secs: default_page_timeout(),
            top_items: default_top_items(),
            fallback_search: true,
            conference_mode: true,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_scan_days() -> u32 {
    10
}
fn default_max_queries() -> usize {
    6
}
fn default_media_per_run() -> usize {
    4
}
fn default_term_chunk() -> usize {
    8
}
fn default_request_delay_ms() -> u64 {
    800
}
fn default_feed_timeout() -> u64 {
    25
}
fn default_page_timeout() -> u64 {
    15
}
fn default_top_items() -> usize {
    10
}

/// `[news]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsDefaults {
    #[serde(default = "default_news_days")]
    pub days: u32,
    /// Tracked terms per generated search source.
    #[serde(default = "default_news_chunk")]
    pub chunk_size: usize,
}

impl Default for NewsDefaults {
    fn default() -> Self {
        Self {
            days: default_news_days(),
            chunk_size: default_news_chunk(),
        }
    }
}

fn default_news_days() -> u32 {
    7
}
fn default_news_chunk() -> usize {
    12
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Search endpoint returning an RSS feed for a `q` parameter.
    #[serde(default = "default_feed_endpoint")]
    pub feed_endpoint: String,
    /// Extra query parameters appended to every search URL.
    #[serde(default = "default_search_params")]
    pub params: BTreeMap<String, String>,
    /// OR-joined condition vocabulary used by scan queries.
    #[serde(default = "default_condition_query")]
    pub condition_query: String,
    /// Narrower condition vocabulary used by news collection.
    #[serde(default = "default_news_condition_query")]
    pub news_condition_query: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            feed_endpoint: default_feed_endpoint(),
            params: default_search_params(),
            condition_query: default_condition_query(),
            news_condition_query: default_news_condition_query(),
        }
    }
}

fn default_feed_endpoint() -> String {
    "https://news.google.com/rss/search".into()
}
fn default_search_params() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("hl".to_string(), "en-US".to_string()),
        ("gl".to_string(), "US".to_string()),
        ("ceid".to_string(), "US:en".to_string()),
    ])
}
fn default_condition_query() -> String {
    "atrial fibrillation OR AFib OR LAAO OR ablation OR device OR drug".into()
}
fn default_news_condition_query() -> String {
    "atrial fibrillation OR AFib".into()
}

/// `[vocabulary]` section. Matching is case-insensitive substring matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyConfig {
    /// Condition/intervention keywords accepted when no tracked term matches.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
    /// Patient-story/awareness/lifestyle phrases that always reject.
    #[serde(default = "default_exclude_phrases")]
    pub exclude_phrases: Vec<String>,
    /// Broader signal vocabulary a keyword-only match must also hit.
    #[serde(default = "default_include_signal_terms")]
    pub include_signal_terms: Vec<String>,
    /// Signal vocabulary for manual URL scans.
    #[serde(default = "default_manual_signal_terms")]
    pub manual_signal_terms: Vec<String>,
    /// Exclusions for manual URL scans.
    #[serde(default = "default_manual_exclude_phrases")]
    pub manual_exclude_phrases: Vec<String>,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            exclude_phrases: default_exclude_phrases(),
            include_signal_terms: default_include_signal_terms(),
            manual_signal_terms: default_manual_signal_terms(),
            manual_exclude_phrases: default_manual_exclude_phrases(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_keywords() -> Vec<String> {
    strings(&[
        "atrial fibrillation",
        "afib",
        "left atrial appendage",
        "laa",
        "laao",
        "pulsed field",
        "pfa",
        "catheter ablation",
        "antiarrhythmic",
        "factor xi",
        "factor xia",
        "stroke prevention",
    ])
}

fn default_exclude_phrases() -> Vec<String> {
    strings(&[
        "patient story",
        "personal story",
        "living with",
        "celebrity",
        "athlete",
        "awareness",
        "heart month",
        "tips for",
        "lifestyle",
    ])
}

const SIGNAL_TERMS: &[&str] = &[
    "trial",
    "study",
    "phase",
    "pivotal",
    "registrational",
    "approval",
    "approved",
    "fda",
    "ema",
    "ce mark",
    "pma",
    "510(k)",
    "ide",
    "device",
    "drug",
    "catheter",
    "ablation",
    "laao",
    "left atrial appendage",
    "stroke prevention",
];

fn default_include_signal_terms() -> Vec<String> {
    strings(SIGNAL_TERMS)
}

fn default_manual_signal_terms() -> Vec<String> {
    let mut terms = strings(SIGNAL_TERMS);
    terms.extend(strings(&["atrial fibrillation", "afib", "pfa"]));
    terms
}

fn default_manual_exclude_phrases() -> Vec<String> {
    strings(&[
        "patient story",
        "personal story",
        "living with",
        "celebrity",
        "awareness",
        "lifestyle",
    ])
}

/// A yearly `(start month/day, end month/day)` window, bounds inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConferenceWindow {
    pub start_month: u32,
    pub start_day: u32,
    pub end_month: u32,
    pub end_day: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
}

impl ConferenceWindow {
    pub fn new(start_month: u32, start_day: u32, end_month: u32, end_day: u32, label: &str) -> Self {
        Self {
            start_month,
            start_day,
            end_month,
            end_day,
            label: label.to_string(),
        }
    }
}

/// Default season list: AF Symposium, ACC, HRS, EHRA, ESC (each with buffer).
pub fn default_conference_windows() -> Vec<ConferenceWindow> {
    vec![
        ConferenceWindow::new(2, 1, 2, 20, "AF Symposium"),
        ConferenceWindow::new(3, 15, 4, 10, "ACC"),
        ConferenceWindow::new(5, 5, 5, 31, "HRS"),
        ConferenceWindow::new(6, 5, 6, 30, "EHRA"),
        ConferenceWindow::new(8, 15, 9, 10, "ESC"),
    ]
}

// ---------------------------------------------------------------------------
// Scan settings (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// How a scan discovers candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Planned search-feed queries (domain rotation + tracked-term chunks).
    Search,
    /// Fetch every watchlist page directly.
    Direct,
}

/// Runtime scan configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub mode: ScanMode,
    pub days: u32,
    pub strict_date: bool,
    /// Accept keyword-only matches even outside conference windows.
    pub allow_keyword_only: bool,
    pub conference_mode: bool,
    /// Surface per-source fetch errors at `warn` instead of `debug`.
    pub verbose_errors: bool,
    pub fallback_search: bool,
    pub max_queries: usize,
    pub media_per_run: usize,
    pub term_chunk: usize,
    pub request_delay_ms: u64,
    pub top_items: usize,
}

impl From<&AppConfig> for ScanSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            mode: ScanMode::Search,
            days: config.scan.days,
            strict_date: false,
            allow_keyword_only: false,
            conference_mode: config.scan.conference_mode,
            verbose_errors: false,
            fallback_search: config.scan.fallback_search,
            max_queries: config.scan.max_queries,
            media_per_run: config.scan.media_per_run,
            term_chunk: config.scan.term_chunk,
            request_delay_ms: config.scan.request_delay_ms,
            top_items: config.scan.top_items,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.signalwatch/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SignalWatchError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.signalwatch/signalwatch.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SignalWatchError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        SignalWatchError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SignalWatchError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SignalWatchError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SignalWatchError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject values the pipeline cannot work with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.scan.max_queries == 0 {
        return Err(SignalWatchError::config("scan.max_queries must be at least 1"));
    }
    for window in &config.conference_windows {
        let months_ok = (1..=12).contains(&window.start_month) && (1..=12).contains(&window.end_month);
        let days_ok = (1..=31).contains(&window.start_day) && (1..=31).contains(&window.end_day);
        if !months_ok || !days_ok {
            return Err(SignalWatchError::config(format!(
                "invalid conference window {}/{}-{}/{}",
                window.start_month, window.start_day, window.end_month, window.end_day
            )));
        }
    }
    Ok(())
}
