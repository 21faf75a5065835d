//! RSS 2.0 / Atom payload parser.
//!
//! Built on `feed-rs`, which sniffs the format from the document root:
//! - RSS: `channel/item` with `title`, `link`, `pubDate`
//! - Atom: `entry` with `title`, `link/@href`, `updated` (falling back to `published`)

use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, FeedType, Link};
use signalwatch_shared::{Result, SignalWatchError};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One item/entry of a parsed feed.
///
/// Missing titles and links come back empty; callers drop incomplete entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse raw feed bytes into entries, in document order.
///
/// Malformed XML (or a document that is neither RSS nor Atom) is a
/// [`SignalWatchError::Parse`].
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedEntry>> {
    let feed = feed_rs::parser::parse(bytes)
        .map_err(|e| SignalWatchError::parse(format!("failed to parse feed: {e}")))?;

    let atom = feed.feed_type == FeedType::Atom;
    let entries = feed
        .entries
        .into_iter()
        .map(|entry| to_entry(entry, atom))
        .collect();

    Ok(entries)
}

fn to_entry(entry: Entry, atom: bool) -> FeedEntry {
    let published = if atom {
        entry.updated.or(entry.published)
    } else {
        entry.published.or(entry.updated)
    };

    FeedEntry {
        title: entry
            .title
            .map(|t| t.content.trim().to_string())
            .unwrap_or_default(),
        link: primary_link(&entry.links).unwrap_or_default(),
        published,
    }
}

/// Prefer the `alternate` link (Atom), otherwise the first one listed.
fn primary_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|l| l.rel.as_deref().is_none_or(|rel| rel == "alternate"))
        .or_else(|| links.first())
        .map(|l| l.href.trim().to_string())
}
