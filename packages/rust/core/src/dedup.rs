//! Dataset deduplication.
//!
//! Rows are collapsed per category by `(match term, date)` when the source
//! label names a match, otherwise by `(normalized title, date)`, keeping the
//! longest title. A second pass walks categories in priority order and drops
//! stories already claimed by an earlier category.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use signalwatch_shared::{Category, Result, WeeklyUpdateRow};
use signalwatch_storage::DataStore;
use tracing::{debug, info, instrument};

/// Title suffix separators: ` - `, ` | `, ` — `.
static SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s[-|\x{2014}]\s").expect("suffix regex"));

static NON_ALNUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\s]").expect("non-alphanumeric regex"));

static MATCH_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)match:\s*(.+)$").expect("match label regex"));

/// Deduplicated rows per category. Every category is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyDigest {
    pub categories: BTreeMap<Category, Vec<WeeklyUpdateRow>>,
}

impl WeeklyDigest {
    /// Rows in category priority order.
    pub fn flatten(&self) -> Vec<WeeklyUpdateRow> {
        Category::PRIORITY
            .iter()
            .filter_map(|c| self.categories.get(c))
            .flatten()
            .cloned()
            .collect()
    }

    pub fn total(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    /// Keyed by category wire name, as stored in the tracked dataset.
    pub fn to_wire(&self) -> BTreeMap<String, Vec<WeeklyUpdateRow>> {
        self.categories
            .iter()
            .map(|(c, rows)| (c.as_str().to_string(), rows.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GroupKey {
    Match(String, Option<NaiveDate>),
    Title(String, Option<NaiveDate>),
}

/// Cut a headline at its first outlet suffix, lowercase, replace
/// non-alphanumerics with spaces, and collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    let base = SUFFIX_RE.split(title).next().unwrap_or(title).to_lowercase();
    let cleaned = NON_ALNUM_RE.replace_all(&base, " ");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The lowercased term after `Match:` in a source label, if any.
pub fn label_match(source: &str) -> Option<String> {
    let caps = MATCH_LABEL_RE.captures(source)?;
    let term = caps[1].trim().to_lowercase();
    (!term.is_empty()).then_some(term)
}

fn group_key(row: &WeeklyUpdateRow) -> GroupKey {
    match label_match(&row.source) {
        Some(term) => GroupKey::Match(term, row.date),
        None => GroupKey::Title(normalize_title(&row.title), row.date),
    }
}

/// Collapse one category's rows. Output is newest-first, undated last.
pub fn dedupe_category(rows: &[WeeklyUpdateRow]) -> Vec<WeeklyUpdateRow> {
    let mut sorted: Vec<&WeeklyUpdateRow> = rows.iter().collect();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));

    let mut kept: Vec<WeeklyUpdateRow> = Vec::new();
    let mut index: HashMap<GroupKey, usize> = HashMap::new();

    for row in sorted {
        match index.get(&group_key(row)) {
            Some(&slot) => {
                if row.title.chars().count() > kept[slot].title.chars().count() {
                    kept[slot] = row.clone();
                }
            }
            None => {
                index.insert(group_key(row), kept.len());
                kept.push(row.clone());
            }
        }
    }

    kept
}

/// Full two-pass deduplication over a mixed-category dataset.
pub fn build_digest(rows: &[WeeklyUpdateRow]) -> WeeklyDigest {
    let mut by_category: BTreeMap<Category, Vec<WeeklyUpdateRow>> = Category::PRIORITY
        .iter()
        .map(|c| (*c, Vec::new()))
        .collect();
    for row in rows {
        by_category.entry(row.category).or_default().push(row.clone());
    }

    let mut seen: HashSet<(String, Option<NaiveDate>)> = HashSet::new();
    let mut categories = BTreeMap::new();
    for category in Category::PRIORITY {
        let collapsed = dedupe_category(by_category.get(&category).map_or(&[][..], Vec::as_slice));
        let unique: Vec<WeeklyUpdateRow> = collapsed
            .into_iter()
            .filter(|row| seen.insert((normalize_title(&row.title), row.date)))
            .collect();
        debug!(category = %category, rows = unique.len(), "deduplicated category");
        categories.insert(category, unique);
    }

    WeeklyDigest { categories }
}

/// Rebuild the digest from the dataset and store it on the tracked items.
#[instrument(skip_all)]
pub fn update_weekly(store: &DataStore) -> Result<WeeklyDigest> {
    let rows = store.load_rows()?;
    let mut tracked = store.load_tracked()?;
    let digest = build_digest(&rows);
    tracked.weekly_updates = Some(digest.to_wire());
    store.save_tracked(&tracked)?;
    info!(rows = rows.len(), kept = digest.total(), "weekly digest updated");
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(category: Category, title: &str, date: &str, source: &str) -> WeeklyUpdateRow {
        WeeklyUpdateRow {
            category,
            title: title.into(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").ok(),
            source: source.into(),
            link: None,
        }
    }

    #[test]
    fn normalizes_titles() {
        assert_eq!(
            normalize_title("Acme Corp's FXI data impress - MedTech Wire"),
            "acme corp s fxi data impress"
        );
        assert_eq!(normalize_title("Label update | Regulator"), "label update");
        assert_eq!(normalize_title("Shield\u{2014}pivotal \u{2014} TCTMD"), "shield pivotal");
        assert_eq!(normalize_title("  Spaced   out  "), "spaced out");
        assert_eq!(normalize_title("Pre-market approval"), "pre market approval");
    }

    #[test]
    fn extracts_match_from_label() {
        assert_eq!(
            label_match("Search: watchlist 1 \u{b7} Match: Acme Corp").as_deref(),
            Some("acme corp")
        );
        assert_eq!(label_match("Regulator feed"), None);
        assert_eq!(label_match("match:   "), None);
    }

    #[test]
    fn collapses_by_match_and_date_keeping_longest() {
        let rows = vec![
            row(Category::PressPipeline, "Acme trial", "2026-10-12", "Wire \u{b7} Match: Acme Corp"),
            row(Category::PressPipeline, "Acme Corp Phase 3 trial succeeds", "2026-10-12", "Blog \u{b7} Match: acme corp"),
            row(Category::PressPipeline, "Acme older", "2026-10-01", "Wire \u{b7} Match: Acme Corp"),
        ];
        let out = dedupe_category(&rows);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].title, "Acme Corp Phase 3 trial succeeds");
        assert_eq!(out[1].title, "Acme older");
    }

    #[test]
    fn tie_keeps_first_encountered() {
        let rows = vec![
            row(Category::SafetySignals, "Warning A - Wire", "2026-10-12", "Wire"),
            row(Category::SafetySignals, "Warning A | Blog", "2026-10-12", "Blog"),
        ];
        let out = dedupe_category(&rows);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source, "Wire");
    }

    #[test]
    fn newest_first_and_undated_last() {
        let rows = vec![
            row(Category::GuidelineUpdates, "Undated", "", "S"),
            row(Category::GuidelineUpdates, "Old", "2026-09-01", "S"),
            row(Category::GuidelineUpdates, "New", "2026-10-10", "S"),
        ];
        let titles: Vec<_> = dedupe_category(&rows).into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["New", "Old", "Undated"]);
    }

    #[test]
    fn cross_category_collapse_prefers_priority() {
        let rows = vec![
            row(Category::PressPipeline, "Boxed warning added", "2026-10-12", "Wire"),
            row(Category::SafetySignals, "Boxed warning added", "2026-10-12", "Regulator"),
        ];
        let digest = build_digest(&rows);
        assert_eq!(digest.categories[&Category::SafetySignals].len(), 1);
        assert!(digest.categories[&Category::PressPipeline].is_empty());
        assert_eq!(digest.total(), 1);
        assert_eq!(digest.categories.len(), 5);
    }

    #[test]
    fn dedup_is_idempotent() {
        let rows = vec![
            row(Category::PressPipeline, "Acme trial", "2026-10-12", "Wire \u{b7} Match: Acme Corp"),
            row(Category::PressPipeline, "Acme Corp Phase 3 trial succeeds", "2026-10-12", "Blog \u{b7} Match: Acme Corp"),
            row(Category::SafetySignals, "Boxed warning added - Wire", "2026-10-12", "Wire"),
            row(Category::PressPipeline, "Boxed warning added", "2026-10-12", "Blog"),
            row(Category::LabelExpansions, "Label expanded", "", "Regulator"),
            row(Category::LabelExpansions, "Label expanded!", "", "Regulator"),
        ];
        let once = build_digest(&rows);
        let twice = build_digest(&once.flatten());
        assert_eq!(once, twice);
    }

    #[test]
    fn update_weekly_stores_digest() {
        let root = std::env::temp_dir().join(format!("sw-weekly-test-{}", uuid::Uuid::now_v7()));
        let paths = signalwatch_shared::PathsConfig {
            data_dir: root.join("data"),
            reports_dir: root.join("reports"),
            ..Default::default()
        };
        std::fs::create_dir_all(&paths.data_dir).unwrap();
        std::fs::copy("../../../fixtures/json/tracked.fixture.json", paths.tracked_path()).unwrap();
        let store = DataStore::new(paths);
        store
            .save_rows(&[
                row(Category::PressPipeline, "Acme trial", "2026-10-12", "Wire \u{b7} Match: Acme Corp"),
                row(Category::PressPipeline, "Acme Corp trial succeeds", "2026-10-12", "Blog \u{b7} Match: Acme Corp"),
            ])
            .unwrap();

        let digest = update_weekly(&store).unwrap();
        assert_eq!(digest.total(), 1);

        let saved = store.load_tracked().unwrap();
        let weekly = saved.weekly_updates.expect("digest stored");
        assert_eq!(weekly["press_pipeline"][0].title, "Acme Corp trial succeeds");
        assert!(weekly["safety_signals"].is_empty());
        assert_eq!(saved.items.len(), 3);
        // The dataset itself is left as collected.
        assert_eq!(store.load_rows().unwrap().len(), 2);
    }

    #[test]
    fn wire_keys_are_category_names() {
        let digest = build_digest(&[]);
        let wire = digest.to_wire();
        assert!(wire.contains_key("safety_signals"));
        assert!(wire.contains_key("press_pipeline"));
    }
}
