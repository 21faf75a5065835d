//! Anchor extraction from press-room and pipeline pages.
//!
//! Hrefs resolve against the page URL. Only `http`/`https` targets survive;
//! same-page `#` anchors are dropped.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

static LINK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("anchor selector"));

static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("title selector"));

/// An anchor found in a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLink {
    /// Whitespace-collapsed anchor text, or its `aria-label`. May be empty.
    pub text: String,
    /// Absolute `http`/`https` URL.
    pub url: String,
}

/// Extract every anchor from `html`, resolving relative hrefs against `base_url`.
///
/// `mailto:`, `javascript:`, in-page `#` anchors and non-http(s) targets are
/// discarded. Anchors with no text are still returned.
pub fn extract_links(html: &str, base_url: &Url) -> Vec<ExtractedLink> {
    let doc = Html::parse_document(html);
    let mut links = Vec::new();

    for el in doc.select(&LINK_SEL) {
        let Some(href) = el.value().attr("href").map(str::trim) else {
            continue;
        };
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
        {
            continue;
        }

        let Ok(resolved) = base_url.join(href) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }

        links.push(ExtractedLink {
            text: anchor_text(&el),
            url: resolved.to_string(),
        });
    }

    links
}

/// The document `<title>`, whitespace-collapsed. `None` when missing or blank.
pub fn document_title(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let title = doc.select(&TITLE_SEL).next().map(|el| collapse(el.text()))?;
    (!title.is_empty()).then_some(title)
}

fn anchor_text(el: &ElementRef<'_>) -> String {
    let text = collapse(el.text());
    if !text.is_empty() {
        return text;
    }
    el.value()
        .attr("aria-label")
        .map(|label| collapse(std::iter::once(label)))
        .unwrap_or_default()
}

fn collapse<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    let joined = parts.collect::<Vec<_>>().join(" ");
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}
