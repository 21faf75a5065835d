//! Relevance filter: classifies raw candidates as accepted signals or rejects.
//!
//! Rules run in a fixed order and the first failing rule decides:
//! 1. incomplete (blank title or URL)
//! 2. excluded phrase in `title + " " + url`
//! 3. tracked term required but absent
//! 4. neither tracked term nor keyword
//! 5. keyword-only without an inclusion-signal term
//! 6. dated before the cutoff day, or undated under strict dating

use chrono::{DateTime, Duration, NaiveDate, Utc};
use signalwatch_shared::{CandidateSignal, ScanSettings, VocabularyConfig};

use crate::conference::ConferenceCalendar;
use crate::terms::TermMatcher;

/// A title/link pair before filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCandidate {
    pub title: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Why a candidate was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Incomplete,
    Excluded,
    Untracked,
    NoMatch,
    NoSignalTerm,
    TooOld,
    Undated,
}

/// Word lists the filter matches against.
#[derive(Debug, Clone)]
pub struct FilterVocabulary {
    pub keywords: TermMatcher,
    pub exclusions: TermMatcher,
    pub signal_terms: TermMatcher,
}

impl FilterVocabulary {
    /// Vocabulary for feed and page scans.
    pub fn scan(vocab: &VocabularyConfig) -> Self {
        Self {
            keywords: TermMatcher::new(vocab.keywords.iter().cloned()),
            exclusions: TermMatcher::new(vocab.exclude_phrases.iter().cloned()),
            signal_terms: TermMatcher::new(vocab.include_signal_terms.iter().cloned()),
        }
    }

    /// Vocabulary for manual URL scans: the manual signal list doubles as
    /// the keyword list.
    pub fn manual(vocab: &VocabularyConfig) -> Self {
        Self {
            keywords: TermMatcher::new(vocab.manual_signal_terms.iter().cloned()),
            exclusions: TermMatcher::new(vocab.manual_exclude_phrases.iter().cloned()),
            signal_terms: TermMatcher::new(vocab.manual_signal_terms.iter().cloned()),
        }
    }
}

/// Run-level switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterPolicy {
    pub require_tracked: bool,
    pub strict_date: bool,
    /// Earliest accepted publication day.
    pub cutoff: NaiveDate,
}

impl FilterPolicy {
    pub fn new(now: DateTime<Utc>, days: u32, require_tracked: bool, strict_date: bool) -> Self {
        Self {
            require_tracked,
            strict_date,
            cutoff: cutoff_day(now, days),
        }
    }

    /// Tracked terms are required unless keyword-only matches are allowed
    /// or a conference window is active.
    pub fn for_scan(
        settings: &ScanSettings,
        calendar: &ConferenceCalendar,
        now: DateTime<Utc>,
    ) -> Self {
        let require_tracked = tracked_required(
            settings.allow_keyword_only,
            settings.conference_mode,
            calendar,
            now.date_naive(),
        );
        Self::new(now, settings.days, require_tracked, settings.strict_date)
    }
}

/// First day inside a `days`-long lookback window ending at `now`.
///
/// Windows reaching past the representable range clamp to the earliest date.
pub fn cutoff_day(now: DateTime<Utc>, days: u32) -> NaiveDate {
    now.checked_sub_signed(Duration::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
        .date_naive()
}

/// Whether a run must match a tracked term, given its switches and the day.
pub fn tracked_required(
    allow_keyword_only: bool,
    conference_mode: bool,
    calendar: &ConferenceCalendar,
    day: NaiveDate,
) -> bool {
    let conference_active = conference_mode && calendar.is_active(day);
    !allow_keyword_only && !conference_active
}

/// The relevance filter.
#[derive(Debug, Clone)]
pub struct SignalFilter {
    terms: TermMatcher,
    vocabulary: FilterVocabulary,
    policy: FilterPolicy,
}

impl SignalFilter {
    pub fn new(terms: TermMatcher, vocabulary: FilterVocabulary, policy: FilterPolicy) -> Self {
        Self {
            terms,
            vocabulary,
            policy,
        }
    }

    pub fn policy(&self) -> &FilterPolicy {
        &self.policy
    }

    pub fn classify(&self, candidate: RawCandidate) -> Result<CandidateSignal, Rejection> {
        let title = candidate.title.trim();
        let url = candidate.url.trim();
        if title.is_empty() || url.is_empty() {
            return Err(Rejection::Incomplete);
        }

        let haystack = format!("{title} {url}").to_lowercase();
        if self.vocabulary.exclusions.any_lowered(&haystack) {
            return Err(Rejection::Excluded);
        }

        let tracked = self.terms.find_lowered(&haystack);
        let keyword = self.vocabulary.keywords.find_lowered(&haystack);

        if self.policy.require_tracked && tracked.is_none() {
            return Err(Rejection::Untracked);
        }
        let Some(matched) = tracked.or(keyword) else {
            return Err(Rejection::NoMatch);
        };
        if tracked.is_none() && !self.vocabulary.signal_terms.any_lowered(&haystack) {
            return Err(Rejection::NoSignalTerm);
        }

        match candidate.published_at {
            Some(date) if date.date_naive() < self.policy.cutoff => return Err(Rejection::TooOld),
            None if self.policy.strict_date => return Err(Rejection::Undated),
            _ => {}
        }

        Ok(CandidateSignal {
            title: title.to_string(),
            url: url.to_string(),
            matched_term: matched.to_string(),
            published_at: candidate.published_at,
        })
    }
}
