//! webwalk: a polite, extensible web crawler.
//!
//! Seed it with URLs and it fetches pages, discovers links, and keeps
//! crawling: one worker per host, each respecting robots.txt and a
//! per-host crawl delay, all coordinated by a central dispatcher. Every
//! stage of the pipeline is open to the caller through an [`Extender`]:
//! filter candidates, replace the transport, react to visits and errors,
//! or push new URLs into a live crawl.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use webwalk::{Crawler, DefaultExtender};
//!
//! # async fn example() {
//! let mut crawler = Crawler::new(Some(Arc::new(DefaultExtender::new())));
//! crawler.options.max_visits = Some(100);
//! let reason = crawler.run("https://example.com/").await;
//! println!("crawl ended: {reason:?}");
//! # }
//! ```

pub mod config;
pub mod crawler;
pub mod extender;
pub mod robots;
pub mod url;

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// URL parsing and normalization errors.
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("failed to parse URL: {0}")]
    Parse(String),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("URL has no host")]
    MissingHost,
}

/// Errors from the fetch hook (transport level).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to read response body: {0}")]
    Body(reqwest::Error),

    #[error("HTTP client unavailable: {0}")]
    Client(String),

    #[error("{0}")]
    Other(String),
}

/// Link harvesting failure.
#[derive(Debug, Error)]
#[error("link extraction failed: {0}")]
pub struct LinkExtractError(pub String);

/// Classification of a [`CrawlError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlErrorKind {
    /// A seed or harvested link could not be parsed.
    Parse,
    /// robots.txt could not be fetched or parsed.
    Robots,
    /// A HEAD/GET failed at the transport level or returned an error
    /// status.
    Fetch,
    /// The response body could not be read.
    ReadBody,
    /// Link harvesting failed.
    LinkExtract,
    /// An enqueue payload carried a URL that could not be used.
    Enqueue,
}

impl fmt::Display for CrawlErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Parse => "parse",
            Self::Robots => "robots",
            Self::Fetch => "fetch",
            Self::ReadBody => "read",
            Self::LinkExtract => "link extraction",
            Self::Enqueue => "enqueue",
        };
        f.write_str(name)
    }
}

/// An internal crawl error, delivered to the error hook.
///
/// Carries the offending URL context when one exists, so a hook can react
/// to it, typically by re-enqueueing the URL to retry. The crawl itself
/// continues past any single URL's failure.
#[derive(Debug, Error)]
#[error("{kind} error: {message}")]
pub struct CrawlError {
    /// What stage failed.
    pub kind: CrawlErrorKind,
    /// The URL being processed when the error occurred, if any.
    pub ctx: Option<Arc<crate::url::UrlContext>>,
    /// Human-readable description.
    pub message: String,
    /// The underlying cause, when one exists.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CrawlError {
    /// Creates an error without an underlying cause.
    pub fn new(
        kind: CrawlErrorKind,
        ctx: Option<Arc<crate::url::UrlContext>>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            ctx,
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error wrapping an underlying cause.
    pub fn with_source(
        kind: CrawlErrorKind,
        ctx: Option<Arc<crate::url::UrlContext>>,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self {
            kind,
            ctx,
            message: message.into(),
            source: Some(source),
        }
    }
}

/// Result alias for URL operations.
pub type UrlResult<T> = std::result::Result<T, UrlError>;

/// Result alias for fetch hook implementations.
pub type FetchResult = std::result::Result<extender::FetchResponse, FetchError>;

// Re-export the commonly used types at the crate root.
pub use crate::config::{LogFlags, Options};
pub use crate::crawler::{build_http_client, extract_links, Crawler, StopHandle};
pub use crate::extender::{
    DefaultExtender, DelayInfo, EndReason, EnqueuePayload, EnqueueSender, Extender, FetchInfo,
    FetchResponse, Seeds,
};
pub use crate::robots::RobotsPolicy;
pub use crate::url::{normalize, NormalizeFlags, UrlContext, UserState};
