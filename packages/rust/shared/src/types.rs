//! Core domain types for SignalWatch.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying a single pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// The closed set of dataset categories.
///
/// Declaration order is the cross-category priority order: when the same
/// story lands in two categories, the earlier one keeps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    SafetySignals,
    LabelExpansions,
    GuidelineUpdates,
    ConferenceAbstracts,
    PressPipeline,
}

impl Category {
    /// All categories, highest priority first.
    pub const PRIORITY: [Category; 5] = [
        Category::SafetySignals,
        Category::LabelExpansions,
        Category::GuidelineUpdates,
        Category::ConferenceAbstracts,
        Category::PressPipeline,
    ];

    /// The wire name used in datasets and source files.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::SafetySignals => "safety_signals",
            Category::LabelExpansions => "label_expansions",
            Category::GuidelineUpdates => "guideline_updates",
            Category::ConferenceAbstracts => "conference_abstracts",
            Category::PressPipeline => "press_pipeline",
        }
    }

    /// Parse a wire name. Anything outside the closed set yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::PRIORITY.into_iter().find(|c| c.as_str() == raw)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tracked items (watchlist dataset)
// ---------------------------------------------------------------------------

/// A tracked drug/device program. Source of match terms.
///
/// Unknown fields are carried through `extra` so rewriting the dataset never
/// drops data owned by other tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackedItem {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub company: String,
    /// Program type, e.g. `Drug` or `Device`.
    #[serde(rename = "type", default, deserialize_with = "null_as_empty")]
    pub kind: String,
    /// Opt-out flag for automatic card updates. Absent means enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_news: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_update: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub press_current_year: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TrackedItem {
    /// Whether automatic news updates may touch this item's card.
    pub fn auto_news_enabled(&self) -> bool {
        self.auto_news.unwrap_or(true)
    }
}

/// Root structure of the tracked-item dataset file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackedDataset {
    #[serde(default)]
    pub items: Vec<TrackedItem>,
    /// Deduplicated digest keyed by category wire name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_updates: Option<BTreeMap<String, Vec<WeeklyUpdateRow>>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Default priority for sources that do not declare one.
pub const DEFAULT_PRIORITY: u32 = 3;

/// A feed or page to query, with a validated category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub url: String,
    pub category: Category,
    pub priority: u32,
    pub require_match: bool,
}

/// A source as written in a sources file, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSpec {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_match: Option<bool>,
}

impl Source {
    /// Validate a raw spec. Returns `None` for blank names/URLs or categories
    /// outside the closed set.
    pub fn from_spec(spec: &SourceSpec) -> Option<Self> {
        let name = spec.name.trim();
        let url = spec.url.trim();
        if name.is_empty() || url.is_empty() {
            return None;
        }
        let category = Category::parse(&spec.category)?;
        Some(Self {
            name: name.to_string(),
            url: url.to_string(),
            category,
            priority: spec.priority.unwrap_or(DEFAULT_PRIORITY),
            require_match: spec.require_match.unwrap_or(true),
        })
    }
}

/// A named page in a watchlist section (press room, pipeline page, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchlistSource {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
}

impl WatchlistSource {
    pub fn priority(&self) -> u32 {
        self.priority.unwrap_or(DEFAULT_PRIORITY)
    }
}

/// The watchlists file: media domains for search rotation plus named
/// sections of directly fetchable pages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Watchlists {
    #[serde(default)]
    pub media_domains: Vec<String>,
    /// Every other top-level key, in file order. Array values are parsed as
    /// sections.
    #[serde(flatten)]
    pub sections: serde_json::Map<String, serde_json::Value>,
}

impl Watchlists {
    /// Non-blank media domains, in file order.
    pub fn domains(&self) -> Vec<String> {
        self.media_domains
            .iter()
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Sections in file order, each with its sources sorted by priority
    /// (stable).
    ///
    /// Non-array keys and malformed entries are skipped.
    pub fn sections(&self) -> Vec<(String, Vec<WatchlistSource>)> {
        self.sections
            .iter()
            .filter_map(|(name, value)| {
                let entries = value.as_array()?;
                let mut sources: Vec<WatchlistSource> = entries
                    .iter()
                    .filter_map(|v| serde_json::from_value(v.clone()).ok())
                    .collect();
                sources.sort_by_key(WatchlistSource::priority);
                Some((name.clone(), sources))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Signals & cache
// ---------------------------------------------------------------------------

/// A candidate that passed the relevance filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSignal {
    pub title: String,
    pub url: String,
    /// Tracked term or fallback keyword that matched. Never empty.
    pub matched_term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

/// A signal as remembered in a cache snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedItem {
    pub title: String,
    pub url: String,
    #[serde(alias = "match", default)]
    pub matched_term: String,
}

impl From<&CandidateSignal> for CachedItem {
    fn from(signal: &CandidateSignal) -> Self {
        Self {
            title: signal.title.clone(),
            url: signal.url.clone(),
            matched_term: signal.matched_term.clone(),
        }
    }
}

/// Last known state of one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(default)]
    pub items: Vec<CachedItem>,
    pub fetched_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Dataset rows
// ---------------------------------------------------------------------------

/// A durable row in the long-lived updates dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyUpdateRow {
    pub category: Category,
    pub title: String,
    #[serde(default, with = "iso_date_or_empty")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl WeeklyUpdateRow {
    /// The date as written in the dataset (`YYYY-MM-DD` or empty).
    pub fn date_str(&self) -> String {
        self.date.map(|d| d.to_string()).unwrap_or_default()
    }
}

/// Serde adapter for `Option<NaiveDate>` stored as `YYYY-MM-DD` or `""`.
pub mod iso_date_or_empty {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => s.serialize_str(&d.format("%Y-%m-%d").to_string()),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        Ok(raw.as_deref().and_then(parse))
    }

    /// Lenient parse: accepts a bare date or anything starting with one.
    pub fn parse(raw: &str) -> Option<NaiveDate> {
        let raw = raw.trim();
        let head = raw.get(..10).unwrap_or(raw);
        NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
    }
}

/// Treat JSON `null` like a missing string.
fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_display_is_uuid() {
        let id = RunId::new();
        assert_eq!(id.to_string().len(), 36);
    }

    #[test]
    fn category_parse_closed_set() {
        assert_eq!(Category::parse("safety_signals"), Some(Category::SafetySignals));
        assert_eq!(Category::parse(" press_pipeline "), Some(Category::PressPipeline));
        assert_eq!(Category::parse("rumours"), None);
        assert!(Category::SafetySignals < Category::PressPipeline);
    }

    #[test]
    fn source_spec_validation() {
        let spec = SourceSpec {
            name: "FDA MedWatch".into(),
            url: "https://www.fda.gov/medwatch.xml".into(),
            category: "safety_signals".into(),
            priority: None,
            require_match: Some(false),
        };
        let source = Source::from_spec(&spec).expect("valid source");
        assert_eq!(source.category, Category::SafetySignals);
        assert_eq!(source.priority, DEFAULT_PRIORITY);
        assert!(!source.require_match);

        let bad = SourceSpec {
            category: "gossip".into(),
            ..spec.clone()
        };
        assert!(Source::from_spec(&bad).is_none());

        let blank = SourceSpec {
            url: "  ".into(),
            ..spec
        };
        assert!(Source::from_spec(&blank).is_none());
    }

    #[test]
    fn tracked_item_tolerates_nulls_and_keeps_extra_fields() {
        let json = r#"{"id":"fxi-1","name":null,"company":"Acme Corp","type":"Drug",
                       "auto_news":false,"trials":[{"name":"LIBREXIA"}]}"#;
        let item: TrackedItem = serde_json::from_str(json).expect("parse item");
        assert_eq!(item.name, "");
        assert_eq!(item.kind, "Drug");
        assert!(!item.auto_news_enabled());
        assert!(item.extra.contains_key("trials"));

        let out = serde_json::to_string(&item).expect("serialize");
        assert!(out.contains("\"trials\""));
        assert!(!out.contains("press_current_year"));
    }

    #[test]
    fn watchlist_sections_skip_non_arrays_and_sort_by_priority() {
        let json = r#"{
            "media_domains": ["tctmd.com", " ", "medscape.com"],
            "notes": "free text",
            "press_rooms": [
                {"name": "Low", "url": "https://low.example.com", "priority": 5},
                {"name": "High", "url": "https://high.example.com", "priority": 1},
                {"name": "Default", "url": "https://default.example.com"}
            ]
        }"#;
        let lists: Watchlists = serde_json::from_str(json).expect("parse watchlists");
        assert_eq!(lists.domains(), vec!["tctmd.com", "medscape.com"]);

        let sections = lists.sections();
        assert_eq!(sections.len(), 1);
        let (name, sources) = &sections[0];
        assert_eq!(name, "press_rooms");
        let names: Vec<_> = sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["High", "Default", "Low"]);
    }

    #[test]
    fn watchlist_sections_keep_file_order() {
        let json = r#"{
            "zeta": [{"name": "Z", "url": "https://z.example.com"}],
            "media_domains": [],
            "alpha": [{"name": "A", "url": "https://a.example.com"}],
            "mid": [{"name": "M", "url": "https://m.example.com"}]
        }"#;
        let lists: Watchlists = serde_json::from_str(json).expect("parse watchlists");
        let names: Vec<_> = lists.sections().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn cached_item_accepts_legacy_match_key() {
        let json = r#"{"title":"t","url":"https://a.example.com","match":"Acme Corp"}"#;
        let item: CachedItem = serde_json::from_str(json).expect("parse");
        assert_eq!(item.matched_term, "Acme Corp");
    }

    #[test]
    fn weekly_row_date_roundtrip_and_empty() {
        let json = r#"{"category":"press_pipeline","title":"T","date":"","source":"S"}"#;
        let row: WeeklyUpdateRow = serde_json::from_str(json).expect("parse");
        assert!(row.date.is_none());
        assert_eq!(row.date_str(), "");

        let json = r#"{"category":"press_pipeline","title":"T","date":"2026-10-12","source":"S"}"#;
        let row: WeeklyUpdateRow = serde_json::from_str(json).expect("parse");
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2026, 10, 12));
        let out = serde_json::to_string(&row).expect("serialize");
        assert!(out.contains("\"date\":\"2026-10-12\""));
        assert!(!out.contains("link"));
    }

    #[test]
    fn tracked_dataset_fixture_validates() {
        let fixture = std::fs::read_to_string("../../../fixtures/json/tracked.fixture.json")
            .expect("read fixture");
        let parsed: TrackedDataset = serde_json::from_str(&fixture).expect("parse fixture");
        assert_eq!(parsed.items.len(), 3);
        assert_eq!(parsed.items[0].name, "Factor XIa Inhibitor");
        assert_eq!(parsed.items[0].company, "Acme Corp");
        assert!(parsed.extra.contains_key("as_of"));
    }
}
