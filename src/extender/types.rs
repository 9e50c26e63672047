use crate::url::{UrlContext, UserState};
use reqwest::header::HeaderMap;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

/// Write half of the runtime enqueue channel.
///
/// Offered to the extender at run start via
/// [`Extender::bind_enqueue`](crate::Extender::bind_enqueue); anything sent
/// on it flows into the dispatcher exactly like a harvested link.
pub type EnqueueSender = mpsc::Sender<EnqueuePayload>;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// All queued work drained.
    Done,
    /// The configured visit bound was reached.
    MaxVisits,
    /// A stop request arrived (payload or `Crawler::stop`).
    Stopped,
}

/// A unit of work pushed onto the enqueue channel at runtime.
pub enum EnqueuePayload {
    /// A single URL string, parsed and normalized on receipt.
    Url(String),
    /// A single pre-parsed URL.
    Parsed(Url),
    /// A batch of URL strings.
    Urls(Vec<String>),
    /// A batch of pre-parsed URLs.
    ParsedUrls(Vec<Url>),
    /// A URL with caller state attached to its resulting context.
    WithState(Url, UserState),
    /// A batch of URLs with attached state.
    WithStates(Vec<(Url, UserState)>),
    /// Links harvested from a visited page; carries the producing context
    /// as the source of each. Sent internally by workers, but available to
    /// callers that want to attribute provenance.
    Harvest {
        /// The context whose visit produced these links.
        source: Arc<UrlContext>,
        /// The harvested absolute URLs.
        urls: Vec<Url>,
    },
    /// Request graceful termination once outstanding work drains.
    Stop,
}

impl fmt::Debug for EnqueuePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(raw) => f.debug_tuple("Url").field(raw).finish(),
            Self::Parsed(url) => f.debug_tuple("Parsed").field(&url.as_str()).finish(),
            Self::Urls(raws) => f.debug_tuple("Urls").field(&raws.len()).finish(),
            Self::ParsedUrls(urls) => f.debug_tuple("ParsedUrls").field(&urls.len()).finish(),
            Self::WithState(url, _) => f.debug_tuple("WithState").field(&url.as_str()).finish(),
            Self::WithStates(pairs) => f.debug_tuple("WithStates").field(&pairs.len()).finish(),
            Self::Harvest { source, urls } => f
                .debug_struct("Harvest")
                .field("source", &source.url().as_str())
                .field("urls", &urls.len())
                .finish(),
            Self::Stop => f.write_str("Stop"),
        }
    }
}

/// Seed URLs handed to [`Crawler::run`](crate::Crawler::run).
///
/// Built through `From` conversions so a run can start from a single
/// string, a batch, pre-parsed URLs, stateful pairs, or nothing at all.
#[derive(Default)]
pub struct Seeds {
    entries: Vec<(String, Option<UserState>)>,
}

impl Seeds {
    /// No seeds; the run drains immediately unless the extender enqueues.
    pub fn none() -> Self {
        Self::default()
    }

    /// Appends a seed URL.
    pub fn push(&mut self, raw: impl Into<String>) {
        self.entries.push((raw.into(), None));
    }

    /// Appends a seed URL with caller state attached.
    pub fn push_with_state(&mut self, url: Url, state: UserState) {
        self.entries.push((url.to_string(), Some(state)));
    }

    /// Number of seeds.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no seeds.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<(String, Option<UserState>)> {
        self.entries
    }
}

impl From<()> for Seeds {
    fn from(_: ()) -> Self {
        Self::none()
    }
}

impl From<&str> for Seeds {
    fn from(raw: &str) -> Self {
        let mut seeds = Self::none();
        seeds.push(raw);
        seeds
    }
}

impl From<String> for Seeds {
    fn from(raw: String) -> Self {
        let mut seeds = Self::none();
        seeds.push(raw);
        seeds
    }
}

impl From<Url> for Seeds {
    fn from(url: Url) -> Self {
        let mut seeds = Self::none();
        seeds.push(url.to_string());
        seeds
    }
}

impl From<Vec<&str>> for Seeds {
    fn from(raws: Vec<&str>) -> Self {
        let mut seeds = Self::none();
        for raw in raws {
            seeds.push(raw);
        }
        seeds
    }
}

impl From<Vec<String>> for Seeds {
    fn from(raws: Vec<String>) -> Self {
        let mut seeds = Self::none();
        for raw in raws {
            seeds.push(raw);
        }
        seeds
    }
}

impl From<Vec<Url>> for Seeds {
    fn from(urls: Vec<Url>) -> Self {
        let mut seeds = Self::none();
        for url in urls {
            seeds.push(url.to_string());
        }
        seeds
    }
}

impl From<Vec<(Url, UserState)>> for Seeds {
    fn from(pairs: Vec<(Url, UserState)>) -> Self {
        let mut seeds = Self::none();
        for (url, state) in pairs {
            seeds.push_with_state(url, state);
        }
        seeds
    }
}

/// Inputs to the compute-delay hook. Immutable per call.
#[derive(Debug, Clone, Copy)]
pub struct DelayInfo {
    /// The delay configured in [`Options`](crate::Options).
    pub opts_delay: Duration,
    /// The delay advertised by the host's robots.txt, or zero.
    pub robots_delay: Duration,
    /// The delay most recently applied on this host, or zero.
    pub last_delay: Duration,
}

/// Description of the most recent fetch on a host. Immutable per call.
#[derive(Debug, Clone, Copy)]
pub struct FetchInfo {
    /// Wall time the fetch took.
    pub elapsed: Duration,
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
    /// Whether the fetch was a HEAD.
    pub is_head: bool,
}

/// A fetched HTTP response as consumed by the crawler.
///
/// The fetch hook returns one of these with the body fully read; the core
/// owns it from there.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body; empty for HEAD responses.
    pub body: Vec<u8>,
    /// Final URL after any transport-level redirects.
    pub final_url: Option<Url>,
}

impl FetchResponse {
    /// Creates a response with the given status, no headers, and an empty
    /// body.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
            final_url: None,
        }
    }

    /// Replaces the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body decoded as UTF-8, lossily.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}
