//! Card updates: copy the newest matching dataset row onto each tracked item.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use signalwatch_shared::{Category, Result, TrackedDataset, TrackedItem, WeeklyUpdateRow};
use signalwatch_storage::DataStore;
use tracing::{debug, info, instrument};

/// What changed on one item's card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardUpdate {
    pub item_id: String,
    pub latest_update: String,
    pub link_added: bool,
}

/// Items whose cards automatic news must not touch: opted out, or generic
/// drugs whose name matches too much unrelated news.
pub fn is_locked(item: &TrackedItem) -> bool {
    !item.auto_news_enabled()
        || (item.kind.eq_ignore_ascii_case("drug") && item.company.to_lowercase().contains("generic"))
}

fn matches(item: &TrackedItem, title_lower: &str) -> bool {
    [item.name.as_str(), item.company.as_str()]
        .into_iter()
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .any(|term| title_lower.contains(&term.to_lowercase()))
}

/// Whether `candidate` should replace `current` as an item's best row.
fn is_better(candidate: &WeeklyUpdateRow, current: &WeeklyUpdateRow) -> bool {
    match (candidate.date, current.date) {
        (Some(new), Some(old)) => new > old,
        (Some(_), None) => true,
        _ => false,
    }
}

/// The best matching row per item, indexed like `items`.
pub fn best_rows<'a>(
    items: &[TrackedItem],
    rows: &'a [WeeklyUpdateRow],
) -> Vec<Option<&'a WeeklyUpdateRow>> {
    let mut best: Vec<Option<&WeeklyUpdateRow>> = vec![None; items.len()];
    for row in rows {
        let title = row.title.to_lowercase();
        for (slot, item) in best.iter_mut().zip(items) {
            if item.id.trim().is_empty() || !matches(item, &title) {
                continue;
            }
            if slot.is_none_or(|current| is_better(row, current)) {
                *slot = Some(row);
            }
        }
    }
    best
}

/// Apply the best rows to unlocked items. `today` decides the
/// current-year press flag.
pub fn apply_card_updates(
    dataset: &mut TrackedDataset,
    rows: &[WeeklyUpdateRow],
    today: NaiveDate,
) -> Vec<CardUpdate> {
    let best: Vec<Option<WeeklyUpdateRow>> = best_rows(&dataset.items, rows)
        .into_iter()
        .map(|row| row.cloned())
        .collect();

    let mut updates = Vec::new();
    for (item, row) in dataset.items.iter_mut().zip(best) {
        let Some(row) = row else { continue };
        if is_locked(item) {
            debug!(item = %item.id, "card locked, skipping");
            continue;
        }

        let latest = match row.date {
            Some(date) => format!("{date}: {}", row.title),
            None => row.title.clone(),
        };
        item.latest_update = Some(latest.clone());

        let mut link_added = false;
        if let Some(link) = row.link.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            if !item.sources.iter().any(|s| s == link) {
                item.sources.push(link.to_string());
                link_added = true;
            }
        }

        if row.category == Category::PressPipeline && row.date.is_some_and(|d| d.year() == today.year()) {
            item.press_current_year = true;
        }

        updates.push(CardUpdate {
            item_id: item.id.clone(),
            latest_update: latest,
            link_added,
        });
    }
    updates
}

/// Update cards from the dataset and save the tracked items.
#[instrument(skip_all)]
pub fn update_cards(store: &DataStore, now: DateTime<Utc>) -> Result<Vec<CardUpdate>> {
    let mut dataset = store.load_tracked()?;
    let rows = store.load_rows()?;
    let updates = apply_card_updates(&mut dataset, &rows, now.date_naive());
    store.save_tracked(&dataset)?;
    info!(updated = updates.len(), rows = rows.len(), "cards updated");
    Ok(updates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalwatch_shared::PathsConfig;
    use uuid::Uuid;

    fn fixture() -> TrackedDataset {
        let json = std::fs::read_to_string("../../../fixtures/json/tracked.fixture.json")
            .expect("read tracked fixture");
        serde_json::from_str(&json).expect("parse tracked fixture")
    }

    fn row(category: Category, title: &str, date: Option<&str>, link: Option<&str>) -> WeeklyUpdateRow {
        WeeklyUpdateRow {
            category,
            title: title.into(),
            date: date.and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            source: "Wire".into(),
            link: link.map(str::to_string),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    #[test]
    fn newest_dated_row_wins() {
        let mut dataset = fixture();
        let rows = vec![
            row(Category::PressPipeline, "acme corp undated note", None, None),
            row(Category::PressPipeline, "Acme Corp trial update", Some("2026-10-01"), Some("https://w.example.com/a")),
            row(Category::SafetySignals, "Factor XIa Inhibitor safety review", Some("2026-10-12"), None),
            row(Category::PressPipeline, "Acme Corp older news", Some("2026-09-01"), None),
        ];

        let updates = apply_card_updates(&mut dataset, &rows, today());
        assert_eq!(updates.len(), 1);
        let fxi = &dataset.items[0];
        assert_eq!(
            fxi.latest_update.as_deref(),
            Some("2026-10-12: Factor XIa Inhibitor safety review")
        );
        assert!(fxi.sources.is_empty());
        assert!(!fxi.press_current_year);
        assert!(fxi.extra.contains_key("phase"));
    }

    #[test]
    fn dated_beats_undated_and_ties_keep_first() {
        let rows = vec![
            row(Category::PressPipeline, "Beacon Medical note", None, None),
            row(Category::PressPipeline, "Beacon Medical first", Some("2026-10-05"), None),
            row(Category::PressPipeline, "Beacon Medical second", Some("2026-10-05"), None),
        ];
        let dataset = fixture();
        let best = best_rows(&dataset.items, &rows);
        assert_eq!(best[1].map(|r| r.title.as_str()), Some("Beacon Medical first"));
        assert!(best[0].is_none());
    }

    #[test]
    fn appends_link_and_flags_current_year_press() {
        let mut dataset = fixture();
        let rows = vec![row(
            Category::PressPipeline,
            "Beacon Medical wins approval",
            Some("2026-10-14"),
            Some("https://beacon.example.com/news/approval"),
        )];

        let updates = apply_card_updates(&mut dataset, &rows, today());
        assert_eq!(
            updates,
            vec![CardUpdate {
                item_id: "laao-002".into(),
                latest_update: "2026-10-14: Beacon Medical wins approval".into(),
                link_added: true,
            }]
        );
        let laao = &dataset.items[1];
        assert_eq!(laao.sources.len(), 2);
        assert!(laao.press_current_year);

        // Re-applying does not duplicate the link.
        let again = apply_card_updates(&mut dataset, &rows, today());
        assert!(!again[0].link_added);
        assert_eq!(dataset.items[1].sources.len(), 2);
    }

    #[test]
    fn locked_items_untouched() {
        let mut dataset = fixture();
        let rows = vec![row(Category::PressPipeline, "Dofetilide shortage eases", Some("2026-10-14"), None)];
        assert!(apply_card_updates(&mut dataset, &rows, today()).is_empty());
        assert!(dataset.items[2].latest_update.is_none());

        let generic = TrackedItem {
            id: "gen-004".into(),
            name: "Amiodarone".into(),
            company: "Various Generic Makers".into(),
            kind: "Drug".into(),
            ..TrackedItem::default()
        };
        assert!(is_locked(&generic));
        let device = TrackedItem {
            kind: "Device".into(),
            ..generic
        };
        assert!(!is_locked(&device));
    }

    #[test]
    fn update_cards_persists_dataset() {
        let root = std::env::temp_dir().join(format!("sw-cards-test-{}", Uuid::now_v7()));
        let paths = PathsConfig {
            data_dir: root.join("data"),
            reports_dir: root.join("reports"),
            ..PathsConfig::default()
        };
        std::fs::create_dir_all(&paths.data_dir).unwrap();
        std::fs::copy("../../../fixtures/json/tracked.fixture.json", paths.tracked_path()).unwrap();
        let store = DataStore::new(paths);
        store
            .save_rows(&[row(Category::LabelExpansions, "Label expansion granted for Factor XIa Inhibitor", Some("2026-10-14"), None)])
            .unwrap();

        let now = today().and_hms_opt(9, 0, 0).unwrap().and_utc();
        let updates = update_cards(&store, now).unwrap();
        assert_eq!(updates.len(), 1);

        let saved = store.load_tracked().unwrap();
        assert_eq!(
            saved.items[0].latest_update.as_deref(),
            Some("2026-10-14: Label expansion granted for Factor XIa Inhibitor")
        );
        assert_eq!(saved.extra.get("as_of").and_then(|v| v.as_str()), Some("2026-10-01"));
    }
}
