//! Tracked match terms and case-insensitive substring matching.

use std::collections::HashSet;

use signalwatch_shared::TrackedItem;

/// Ordered term list matched as case-insensitive substrings.
///
/// The first term (in list order) contained in the haystack wins. Empty terms
/// are dropped since they would match everything.
#[derive(Debug, Clone, Default)]
pub struct TermMatcher {
    terms: Vec<String>,
    lowered: Vec<String>,
}

impl TermMatcher {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let terms: Vec<String> = terms
            .into_iter()
            .map(Into::into)
            .filter(|t| !t.trim().is_empty())
            .collect();
        let lowered = terms.iter().map(|t| t.to_lowercase()).collect();
        Self { terms, lowered }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// First term contained in `haystack`.
    pub fn find(&self, haystack: &str) -> Option<&str> {
        self.find_lowered(&haystack.to_lowercase())
    }

    /// Like [`find`](Self::find) for a haystack that is already lowercase.
    pub fn find_lowered(&self, haystack: &str) -> Option<&str> {
        self.lowered
            .iter()
            .position(|t| haystack.contains(t.as_str()))
            .map(|i| self.terms[i].as_str())
    }

    pub fn any_lowered(&self, haystack: &str) -> bool {
        self.find_lowered(haystack).is_some()
    }
}

/// Match terms derived from the tracked-item dataset.
#[derive(Debug, Clone, Default)]
pub struct TermRegistry {
    matcher: TermMatcher,
}

impl TermRegistry {
    /// Build from tracked items: each item's name then company, cleaned,
    /// first occurrence kept.
    pub fn from_items(items: &[TrackedItem]) -> Self {
        let raw = items
            .iter()
            .flat_map(|item| [item.name.as_str(), item.company.as_str()]);
        Self::from_raw(raw)
    }

    /// Build from raw term strings (cleaned and deduplicated).
    pub fn from_raw<'a>(raw: impl IntoIterator<Item = &'a str>) -> Self {
        let mut seen = HashSet::new();
        let terms: Vec<String> = raw
            .into_iter()
            .map(clean_term)
            .filter(|t| !t.is_empty())
            .filter(|t| seen.insert(t.clone()))
            .collect();
        Self {
            matcher: TermMatcher::new(terms),
        }
    }

    pub fn terms(&self) -> &[String] {
        self.matcher.terms()
    }

    pub fn len(&self) -> usize {
        self.matcher.terms().len()
    }

    pub fn is_empty(&self) -> bool {
        self.matcher.is_empty()
    }

    pub fn matcher(&self) -> &TermMatcher {
        &self.matcher
    }

    pub fn find(&self, haystack: &str) -> Option<&str> {
        self.matcher.find(haystack)
    }
}

/// Strip parentheses and double quotes, then trim.
pub fn clean_term(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '(' | ')' | '"'))
        .collect::<String>()
        .trim()
        .to_string()
}
