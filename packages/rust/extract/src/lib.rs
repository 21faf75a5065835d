//! HTML link extraction and free-text date resolution.
//!
//! This crate provides:
//! - [`extract_links`]: anchors of an HTML page as `(text, absolute URL)` pairs
//! - [`document_title`]: the page `<title>`
//! - [`resolve_date`]: best-effort publication date from titles, URLs and feed text

mod dates;
mod links;

pub use dates::resolve_date;
pub use links::{ExtractedLink, document_title, extract_links};
