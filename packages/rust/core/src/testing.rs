//! In-memory fetcher for pipeline tests.

use std::sync::Mutex;

use async_trait::async_trait;
use signalwatch_feeds::{FetchStrategy, Fetcher};
use signalwatch_shared::{Result, SignalWatchError};

/// Serves canned bodies for URLs containing a pattern; first match wins.
/// Unmatched URLs and routes without a body fail with a network error.
#[derive(Default)]
pub struct MockFetcher {
    routes: Vec<(String, Option<Vec<u8>>)>,
    calls: Mutex<Vec<(String, FetchStrategy)>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, pattern: &str, body: impl Into<Vec<u8>>) -> Self {
        self.routes.push((pattern.to_string(), Some(body.into())));
        self
    }

    pub fn fail(mut self, pattern: &str) -> Self {
        self.routes.push((pattern.to_string(), None));
        self
    }

    pub fn calls(&self) -> Vec<(String, FetchStrategy)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str, strategy: FetchStrategy) -> Result<Vec<u8>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((url.to_string(), strategy));
        }
        let route = self.routes.iter().find(|(pattern, _)| url.contains(pattern.as_str()));
        match route {
            Some((_, Some(body))) => Ok(body.clone()),
            Some((_, None)) => Err(SignalWatchError::Network(format!("{url}: HTTP 503"))),
            None => Err(SignalWatchError::Network(format!("{url}: HTTP 404"))),
        }
    }
}

/// A minimal RSS document with `(title, link, pubDate)` items.
pub fn rss(items: &[(&str, &str, Option<&str>)]) -> String {
    let body: String = items
        .iter()
        .map(|(title, link, date)| {
            let date = date
                .map(|d| format!("<pubDate>{d}</pubDate>"))
                .unwrap_or_default();
            format!("<item><title>{title}</title><link>{link}</link>{date}</item>")
        })
        .collect();
    format!(
        "<?xml version=\"1.0\"?><rss version=\"2.0\"><channel><title>t</title>\
         <link>https://feed.example.com/</link><description>d</description>{body}</channel></rss>"
    )
}
