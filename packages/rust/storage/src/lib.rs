//! JSON file storage for datasets, caches and reports.
//!
//! The [`DataStore`] resolves every file through [`PathsConfig`]. Each file is
//! read once at the start of a run and written once at the end.
//!
//! **Missing-file rules:**
//! - tracked dataset, watchlists, news sources: required (run-level error)
//! - updates dataset: optional (starts empty)
//! - scan cache, company press list: optional, and a malformed file is ignored

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use signalwatch_shared::{
    CacheEntry, PathsConfig, Result, SignalWatchError, SourceSpec, TrackedDataset, Watchlists,
    WeeklyUpdateRow,
};
use tracing::{debug, warn};

/// Scan cache contents: source key to last snapshot.
pub type CacheMap = BTreeMap<String, CacheEntry>;

/// File-backed store for all persistent state.
#[derive(Debug, Clone)]
pub struct DataStore {
    paths: PathsConfig,
}

impl DataStore {
    pub fn new(paths: PathsConfig) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &PathsConfig {
        &self.paths
    }

    // -----------------------------------------------------------------------
    // Tracked dataset
    // -----------------------------------------------------------------------

    pub fn load_tracked(&self) -> Result<TrackedDataset> {
        read_json_required(&self.paths.tracked_path())
    }

    pub fn save_tracked(&self, dataset: &TrackedDataset) -> Result<()> {
        write_json(&self.paths.tracked_path(), dataset)
    }

    // -----------------------------------------------------------------------
    // Sources
    // -----------------------------------------------------------------------

    pub fn load_watchlists(&self) -> Result<Watchlists> {
        read_json_required(&self.paths.watchlists_path())
    }

    /// Configured news sources, unvalidated.
    pub fn load_news_sources(&self) -> Result<Vec<SourceSpec>> {
        read_json_required(&self.paths.news_sources_path())
    }

    /// Company press-room feeds. Missing or malformed files yield no sources.
    pub fn load_company_press(&self) -> Vec<SourceSpec> {
        let path = self.paths.company_press_path();
        match read_json_optional::<Vec<SourceSpec>>(&path) {
            Ok(Some(specs)) => specs,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "ignoring unreadable company press list");
                Vec::new()
            }
        }
    }

    // -----------------------------------------------------------------------
    // Scan cache
    // -----------------------------------------------------------------------

    /// Load the scan cache. A corrupt file is treated as a first run.
    pub fn load_cache(&self) -> CacheMap {
        match read_json_optional::<CacheMap>(&self.paths.cache_path()) {
            Ok(cache) => cache.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "ignoring unreadable scan cache");
                CacheMap::new()
            }
        }
    }

    pub fn save_cache(&self, cache: &CacheMap) -> Result<()> {
        write_json(&self.paths.cache_path(), cache)
    }

    // -----------------------------------------------------------------------
    // Updates dataset
    // -----------------------------------------------------------------------

    /// Load dataset rows. Rows that fail validation (unknown category,
    /// missing title) are skipped.
    pub fn load_rows(&self) -> Result<Vec<WeeklyUpdateRow>> {
        let path = self.paths.dataset_path();
        let Some(raw) = read_json_optional::<Vec<serde_json::Value>>(&path)? else {
            return Ok(Vec::new());
        };

        let total = raw.len();
        let rows: Vec<WeeklyUpdateRow> = raw
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect();

        if rows.len() < total {
            debug!(skipped = total - rows.len(), "skipped invalid dataset rows");
        }
        Ok(rows)
    }

    pub fn save_rows(&self, rows: &[WeeklyUpdateRow]) -> Result<()> {
        write_json(&self.paths.dataset_path(), &rows)
    }

    // -----------------------------------------------------------------------
    // Reports & manual input
    // -----------------------------------------------------------------------

    /// Write a rendered report, creating parent directories as needed.
    pub fn write_report(&self, path: &Path, contents: &str) -> Result<()> {
        ensure_parent(path)?;
        std::fs::write(path, contents).map_err(|e| SignalWatchError::io(path, e))?;
        debug!(path = %path.display(), "wrote report");
        Ok(())
    }

    pub fn read_manual_input(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|e| SignalWatchError::io(path, e))
    }

    pub fn scan_report_path(&self) -> PathBuf {
        self.paths.scan_report_path()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_json_required<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| SignalWatchError::io(path, e))?;
    parse_json(path, &content)
}

fn read_json_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        debug!(path = %path.display(), "file not found, starting empty");
        return Ok(None);
    }
    read_json_required(path).map(Some)
}

fn parse_json<T: DeserializeOwned>(path: &Path, content: &str) -> Result<T> {
    serde_json::from_str(content).map_err(|e| {
        SignalWatchError::Storage(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Serialize and write a JSON file (pretty-printed).
fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data).map_err(|e| {
        SignalWatchError::Storage(format!("JSON serialization failed: {e}"))
    })?;
    ensure_parent(path)?;
    std::fs::write(path, json + "\n").map_err(|e| SignalWatchError::io(path, e))?;
    debug!(path = %path.display(), "wrote JSON file");
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| SignalWatchError::io(parent, e))?;
    }
    Ok(())
}
