//! Search query planning.
//!
//! A run issues at most `max_queries` search-feed queries:
//! 1. media domains, rotated daily by ordinal day, capped at `media_per_run`
//! 2. tracked-term chunks filling the remaining budget

use chrono::{Datelike, NaiveDate};
use signalwatch_shared::{Result, ScanSettings, SearchConfig, SignalWatchError};
use url::Url;

/// Smallest tracked-term chunk per query.
pub const MIN_TERM_CHUNK: usize = 4;

/// A search-feed query ready to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedQuery {
    /// Human-readable label for logs.
    pub label: String,
    /// Raw query text.
    pub query: String,
    /// Full feed URL. Also the cache key.
    pub url: String,
}

/// Search endpoint that turns query text into a feed URL.
#[derive(Debug, Clone)]
pub struct SearchEndpoint {
    base: Url,
    params: Vec<(String, String)>,
}

impl SearchEndpoint {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let base = Url::parse(&config.feed_endpoint).map_err(|e| {
            SignalWatchError::config(format!(
                "invalid search endpoint {}: {e}",
                config.feed_endpoint
            ))
        })?;
        let params = config
            .params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Self { base, params })
    }

    pub fn feed_url(&self, query: &str) -> String {
        let mut url = self.base.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("q", query);
            for (key, value) in &self.params {
                pairs.append_pair(key, value);
            }
        }
        url.to_string()
    }

    /// Whether `url` is a query against this endpoint.
    pub fn serves(&self, url: &str) -> bool {
        Url::parse(url).is_ok_and(|u| {
            u.host_str() == self.base.host_str() && u.path() == self.base.path()
        })
    }
}

/// Per-run caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLimits {
    pub days: u32,
    pub max_queries: usize,
    pub media_per_run: usize,
    pub term_chunk: usize,
}

impl From<&ScanSettings> for PlanLimits {
    fn from(settings: &ScanSettings) -> Self {
        Self {
            days: settings.days,
            max_queries: settings.max_queries,
            media_per_run: settings.media_per_run,
            term_chunk: settings.term_chunk,
        }
    }
}

/// Builds bounded query sets over one condition vocabulary.
#[derive(Debug, Clone)]
pub struct SourcePlanner {
    endpoint: SearchEndpoint,
    condition: String,
}

impl SourcePlanner {
    pub fn new(endpoint: SearchEndpoint, condition: impl Into<String>) -> Self {
        Self {
            endpoint,
            condition: condition.into(),
        }
    }

    /// Plan the queries for one run.
    pub fn plan(
        &self,
        seed: i64,
        media_domains: &[String],
        terms: &[String],
        limits: &PlanLimits,
    ) -> Vec<PlannedQuery> {
        let domain_budget = limits.media_per_run.min(limits.max_queries);
        let mut queries: Vec<PlannedQuery> = rotate_domains(media_domains, seed)
            .into_iter()
            .take(domain_budget)
            .map(|domain| {
                let query = format!("site:{domain} ({}) when:{}d", self.condition, limits.days);
                self.query(format!("Media site {domain}"), query)
            })
            .collect();

        let remaining = limits.max_queries.saturating_sub(queries.len());
        let chunk_size = limits.term_chunk.max(MIN_TERM_CHUNK);
        for (idx, chunk) in terms.chunks(chunk_size).take(remaining).enumerate() {
            let query = terms_query(chunk, &self.condition, limits.days);
            queries.push(self.query(format!("Tracked terms {}", idx + 1), query));
        }

        queries
    }

    /// Site-scoped query for one named source, used when direct fetching
    /// yields nothing.
    pub fn fallback(&self, domain: &str, name: &str, days: u32) -> PlannedQuery {
        let query = format!("site:{domain} \"{name}\" ({}) when:{days}d", self.condition);
        self.query(format!("Fallback {name}"), query)
    }

    /// One query per tracked-term chunk, without a cap.
    pub fn term_chunks(&self, terms: &[String], chunk_size: usize, days: u32) -> Vec<PlannedQuery> {
        terms
            .chunks(chunk_size.max(1))
            .enumerate()
            .map(|(idx, chunk)| {
                let query = terms_query(chunk, &self.condition, days);
                self.query(format!("Tracked terms {}", idx + 1), query)
            })
            .collect()
    }

    fn query(&self, label: String, query: String) -> PlannedQuery {
        let url = self.endpoint.feed_url(&query);
        PlannedQuery { label, query, url }
    }
}

/// `("t1" OR "t2") (condition) when:{days}d`
fn terms_query(chunk: &[String], condition: &str, days: u32) -> String {
    let joined = chunk
        .iter()
        .map(|t| format!("\"{t}\""))
        .collect::<Vec<_>>()
        .join(" OR ");
    format!("({joined}) ({condition}) when:{days}d")
}

/// Rotation seed for a calendar day (days since 0001-01-01, day one = 1).
pub fn daily_seed(day: NaiveDate) -> i64 {
    i64::from(day.num_days_from_ce())
}

/// Non-blank domains rotated left by `seed mod len`.
pub fn rotate_domains(domains: &[String], seed: i64) -> Vec<&str> {
    let mut kept: Vec<&str> = domains
        .iter()
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .collect();
    if kept.is_empty() {
        return kept;
    }
    let start = seed.rem_euclid(kept.len() as i64) as usize;
    kept.rotate_left(start);
    kept
}

/// Host of a URL, used to scope fallback searches.
pub fn domain_of(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn planner() -> SourcePlanner {
        let endpoint = SearchEndpoint::new(&SearchConfig::default()).unwrap();
        SourcePlanner::new(endpoint, "AFib OR device")
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn limits() -> PlanLimits {
        PlanLimits {
            days: 10,
            max_queries: 6,
            media_per_run: 4,
            term_chunk: 8,
        }
    }

    #[test]
    fn endpoint_recognises_its_own_queries() {
        let endpoint = SearchEndpoint::new(&SearchConfig::default()).unwrap();
        assert!(endpoint.serves(&endpoint.feed_url("\"Acme Corp\"")));
        assert!(!endpoint.serves("https://regulator.example.org/medwatch.xml"));
        assert!(!endpoint.serves("not a url"));
    }

    #[test]
    fn rotation_returns_to_original_after_len_days() {
        let domains = strings(&["a.com", "b.com", "c.com", "d.com", "e.com"]);
        let len = domains.len() as i64;
        for seed in 0..20 {
            assert_eq!(rotate_domains(&domains, seed), rotate_domains(&domains, seed + len));
        }
        assert_eq!(rotate_domains(&domains, 0), vec!["a.com", "b.com", "c.com", "d.com", "e.com"]);
        assert_eq!(rotate_domains(&domains, 7), vec!["c.com", "d.com", "e.com", "a.com", "b.com"]);
    }

    #[test]
    fn rotation_covers_every_domain_over_len_days() {
        let domains = strings(&["a.com", "b.com", "c.com", "d.com", "e.com", "f.com", "g.com"]);
        let today = daily_seed(NaiveDate::from_ymd_opt(2026, 10, 17).unwrap());
        let mut seen = HashSet::new();
        for offset in 0..domains.len() as i64 {
            for domain in rotate_domains(&domains, today + offset).into_iter().take(1) {
                seen.insert(domain.to_string());
            }
        }
        assert_eq!(seen.len(), domains.len());
    }

    #[test]
    fn rotation_skips_blank_domains() {
        let domains = strings(&["", " ", "a.com"]);
        assert_eq!(rotate_domains(&domains, 3), vec!["a.com"]);
        assert!(rotate_domains(&[], 3).is_empty());
    }

    #[test]
    fn plan_respects_caps() {
        let domains = strings(&["a.com", "b.com", "c.com", "d.com", "e.com"]);
        let terms: Vec<String> = (1..=40).map(|i| format!("term{i}")).collect();
        let plan = planner().plan(0, &domains, &terms, &limits());

        assert_eq!(plan.len(), 6);
        assert_eq!(plan[0].label, "Media site a.com");
        assert_eq!(plan[3].label, "Media site d.com");
        assert_eq!(plan[4].label, "Tracked terms 1");
        assert_eq!(plan[5].label, "Tracked terms 2");
        assert!(plan[5].query.starts_with("(\"term9\" OR"));
    }

    #[test]
    fn media_never_exceeds_max_queries() {
        let domains = strings(&["a.com", "b.com", "c.com"]);
        let terms = strings(&["Acme Corp"]);
        let plan = planner().plan(
            1,
            &domains,
            &terms,
            &PlanLimits {
                max_queries: 2,
                ..limits()
            },
        );
        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|q| q.label.starts_with("Media site")));
    }

    #[test]
    fn term_chunk_floor_is_four() {
        let terms: Vec<String> = (1..=9).map(|i| format!("t{i}")).collect();
        let plan = planner().plan(
            0,
            &[],
            &terms,
            &PlanLimits {
                term_chunk: 2,
                ..limits()
            },
        );
        assert_eq!(plan.len(), 3);
        assert_eq!(
            plan[0].query,
            "(\"t1\" OR \"t2\" OR \"t3\" OR \"t4\") (AFib OR device) when:10d"
        );
    }

    #[test]
    fn query_text_and_url() {
        let domains = strings(&["tctmd.com"]);
        let plan = planner().plan(0, &domains, &[], &limits());
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].query, "site:tctmd.com (AFib OR device) when:10d");

        let url = Url::parse(&plan[0].url).unwrap();
        assert_eq!(url.host_str(), Some("news.google.com"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("q".into(), plan[0].query.clone()));
        assert!(pairs.contains(&("hl".into(), "en-US".into())));
        assert!(pairs.contains(&("ceid".into(), "US:en".into())));
    }

    #[test]
    fn fallback_query_is_site_scoped() {
        let query = planner().fallback("acme.example.com", "Acme Newsroom", 10);
        assert_eq!(
            query.query,
            "site:acme.example.com \"Acme Newsroom\" (AFib OR device) when:10d"
        );
    }

    #[test]
    fn domain_of_url() {
        assert_eq!(
            domain_of("https://www.acme.example.com/news?x=1").as_deref(),
            Some("www.acme.example.com")
        );
        assert_eq!(domain_of("not a url"), None);
    }

    #[test]
    fn ordinal_seed_matches_calendar() {
        assert_eq!(daily_seed(NaiveDate::from_ymd_opt(1, 1, 1).unwrap()), 1);
        let a = daily_seed(NaiveDate::from_ymd_opt(2026, 10, 17).unwrap());
        let b = daily_seed(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
        assert_eq!(b - a, 1);
    }
}
