//! Source fetching and feed parsing.
//!
//! Every source, whether a search-result feed, a publisher feed or a plain
//! HTML page, is fetched through the [`Fetcher`] trait. The strategy picks
//! request headers and the timeout; what the bytes mean is decided by the
//! caller ([`parse_feed`] for feeds, the link extractor for pages).

mod parser;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use signalwatch_shared::{AppConfig, Result, SignalWatchError};
use tracing::{debug, instrument};

pub use parser::{FeedEntry, parse_feed};

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Maximum response size we accept (10 MB).
const MAX_RESPONSE_SIZE: u64 = 10 * 1024 * 1024;

/// User-Agent string for all requests.
const USER_AGENT: &str = concat!("SignalWatch/", env!("CARGO_PKG_VERSION"));

const FEED_ACCEPT: &str =
    "application/rss+xml, application/atom+xml, application/xml;q=0.9, */*;q=0.8";
const PAGE_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

// ---------------------------------------------------------------------------
// Fetch strategy
// ---------------------------------------------------------------------------

/// How a source is fetched. Feeds and pages differ only in headers and timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    Feed,
    Page,
}

impl FetchStrategy {
    /// Request headers for this strategy.
    pub fn headers(self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let accept = match self {
            FetchStrategy::Feed => FEED_ACCEPT,
            FetchStrategy::Page => PAGE_ACCEPT,
        };
        headers.insert(ACCEPT, HeaderValue::from_static(accept));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers
    }
}

/// Per-strategy request timeouts.
#[derive(Debug, Clone, Copy)]
pub struct FetchTimeouts {
    pub feed: Duration,
    pub page: Duration,
}

impl FetchTimeouts {
    pub fn for_strategy(&self, strategy: FetchStrategy) -> Duration {
        match strategy {
            FetchStrategy::Feed => self.feed,
            FetchStrategy::Page => self.page,
        }
    }
}

impl From<&AppConfig> for FetchTimeouts {
    fn from(config: &AppConfig) -> Self {
        Self {
            feed: Duration::from_secs(config.scan.feed_timeout_secs),
            page: Duration::from_secs(config.scan.page_timeout_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// Fetcher trait
// ---------------------------------------------------------------------------

/// Fetches raw source bytes. Implementations must fail with
/// [`SignalWatchError::Network`] on transport failure, timeout, or non-2xx.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, strategy: FetchStrategy) -> Result<Vec<u8>>;
}

/// `reqwest`-backed fetcher used by the CLI.
pub struct HttpFetcher {
    client: Client,
    timeouts: FetchTimeouts,
}

impl HttpFetcher {
    pub fn new(timeouts: FetchTimeouts) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| {
                SignalWatchError::Network(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self { client, timeouts })
    }

    /// GET `url` with the given headers and timeout, returning the body bytes.
    #[instrument(skip(self, headers), fields(timeout_ms = timeout.as_millis() as u64))]
    pub async fn fetch_bytes(
        &self,
        url: &str,
        headers: &HeaderMap,
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .headers(headers.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| SignalWatchError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SignalWatchError::Network(format!("{url}: HTTP {status}")));
        }

        if let Some(len) = response.content_length() {
            if len > MAX_RESPONSE_SIZE {
                return Err(SignalWatchError::Network(format!(
                    "{url}: response too large ({len} bytes, max {MAX_RESPONSE_SIZE})"
                )));
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SignalWatchError::Network(format!("{url}: failed to read body: {e}")))?;

        debug!(bytes = body.len(), "fetched");
        Ok(body.to_vec())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, strategy: FetchStrategy) -> Result<Vec<u8>> {
        let timeout = self.timeouts.for_strategy(strategy);
        self.fetch_bytes(url, &strategy.headers(), timeout).await
    }
}
