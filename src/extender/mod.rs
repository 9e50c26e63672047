//! Extension points.
//!
//! An [`Extender`] is the caller-supplied bundle of hooks invoked at fixed
//! pipeline stages. Every hook has a default, so implementations override
//! only what they need; composition (wrapping a [`DefaultExtender`] or
//! another extender and delegating) replaces inheritance.
//!
//! Threading: `filter`, `enqueued`, `start`, `end`, and `error` run on the
//! dispatcher task; `compute_delay`, `fetch`, `request_get`,
//! `request_robots`, `fetched_robots`, `visit`, `visited`, and
//! `disallowed` run on the worker task of the URL's host. Per host,
//! worker-side hooks are serialized; nothing else about threads may be
//! assumed.

mod types;

pub use types::{
    DelayInfo, EndReason, EnqueuePayload, EnqueueSender, FetchInfo, FetchResponse, Seeds,
};

use crate::crawler::fetcher;
use crate::url::UrlContext;
use crate::{CrawlError, FetchError};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

/// The closed set of crawl hooks.
///
/// Returning the deny value from a gate hook (`false` from `filter` or
/// `request_get`, `false` in `visit`'s follow flag) short-circuits the rest
/// of that URL's processing. Hooks must not block the thread for long; the
/// two that naturally wait (`fetch`, `visit`) are async.
#[async_trait]
pub trait Extender: Send + Sync {
    /// Offers the runtime enqueue channel to this extender before the
    /// first enqueue. Return `true` to accept; the default declines, which
    /// disables runtime enqueue for the run.
    fn bind_enqueue(&self, _chan: EnqueueSender) -> bool {
        false
    }

    /// Called with the seed set before the first enqueue; may rewrite it.
    fn start(&self, seeds: Seeds) -> Seeds {
        seeds
    }

    /// Called once per run, after the last worker has retired.
    fn end(&self, _reason: EndReason) {}

    /// Receives every internal error. The crawl continues regardless; an
    /// implementation may re-enqueue the offending URL to retry it.
    fn error(&self, _err: &CrawlError) {}

    /// Computes the delay preceding a fetch on `host`.
    fn compute_delay(
        &self,
        _host: &str,
        info: &DelayInfo,
        _last_fetch: Option<&FetchInfo>,
    ) -> Duration {
        info.opts_delay.max(info.robots_delay)
    }

    /// Performs one HTTP fetch. The default delegates to a shared
    /// `reqwest` client with `agent` as the user agent.
    async fn fetch(
        &self,
        ctx: &UrlContext,
        agent: &str,
        is_head: bool,
    ) -> Result<FetchResponse, FetchError> {
        fetcher::fetch(ctx.url(), agent, is_head).await
    }

    /// After a successful HEAD, decides whether the GET should follow.
    fn request_get(&self, _ctx: &UrlContext, head: &FetchResponse) -> bool {
        head.status < 400
    }

    /// Before a robots.txt fetch. Return pre-supplied robots bytes to skip
    /// the fetch, or `(None, false)` to skip it and permit everything.
    fn request_robots(&self, _ctx: &UrlContext, _agent: &str) -> (Option<Vec<u8>>, bool) {
        (None, true)
    }

    /// After a successful robots.txt fetch.
    fn fetched_robots(&self, _ctx: &UrlContext, _res: &FetchResponse) {}

    /// Pre-enqueue gate. `is_visited` is true when the URL was already
    /// accepted this run (whether or not processing finished).
    fn filter(&self, _ctx: &UrlContext, is_visited: bool) -> bool {
        !is_visited
    }

    /// Just after a URL is accepted into a worker queue.
    fn enqueued(&self, _ctx: &UrlContext) {}

    /// After a successful GET. Returns harvested URLs and whether the core
    /// should extract links itself; with the default `(None, true)` the
    /// core harvests every `<a href>` in the body.
    async fn visit(
        &self,
        _ctx: &UrlContext,
        _res: &FetchResponse,
    ) -> (Option<Vec<Url>>, bool) {
        (None, true)
    }

    /// After `visit` returns, with the links that will be submitted.
    fn visited(&self, _ctx: &UrlContext, _harvested: &[Url]) {}

    /// When robots.txt blocks a URL.
    fn disallowed(&self, _ctx: &UrlContext) {}
}

/// An extender that performs every default behavior and accepts the
/// enqueue channel.
///
/// Useful on its own for a plain polite crawl, or composed into a custom
/// extender that delegates [`bind_enqueue`](Extender::bind_enqueue) to get
/// the channel wired through.
#[derive(Default)]
pub struct DefaultExtender {
    enqueue: Mutex<Option<EnqueueSender>>,
}

impl DefaultExtender {
    /// Creates a default extender with no channel bound yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// The enqueue channel bound by the current or most recent run.
    pub fn enqueue_chan(&self) -> Option<EnqueueSender> {
        self.enqueue.lock().expect("enqueue lock poisoned").clone()
    }
}

#[async_trait]
impl Extender for DefaultExtender {
    fn bind_enqueue(&self, chan: EnqueueSender) -> bool {
        *self.enqueue.lock().expect("enqueue lock poisoned") = Some(chan);
        true
    }
}
