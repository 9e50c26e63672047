//! A counting extender for scenario tests.
//!
//! Every hook bumps a per-hook counter and then either runs a test-supplied
//! override or falls back to the default behavior, with fetches served from
//! the in-memory [`Site`]. Fetch start times are recorded for delay
//! assertions.

use super::site::Site;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use url::Url;
use webwalk::{
    CrawlError, DelayInfo, EndReason, EnqueueSender, Extender, FetchError, FetchInfo,
    FetchResponse, Seeds, UrlContext,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    Start,
    End,
    Error,
    ComputeDelay,
    Fetch,
    RequestGet,
    RequestRobots,
    FetchedRobots,
    Filter,
    Enqueued,
    Visit,
    Visited,
    Disallowed,
}

type FilterFn = Box<dyn Fn(&UrlContext, bool) -> bool + Send + Sync>;
type EnqueuedFn = Box<dyn Fn(&UrlContext) + Send + Sync>;
type ErrorFn = Box<dyn Fn(&CrawlError) + Send + Sync>;
type DelayFn = Box<dyn Fn(&DelayInfo, usize) -> Duration + Send + Sync>;
type VisitFn = Box<dyn Fn(&UrlContext, &FetchResponse) -> (Option<Vec<Url>>, bool) + Send + Sync>;

pub struct SpyExtender {
    site: Site,
    counts: Mutex<HashMap<Hook, usize>>,
    chan: Arc<Mutex<Option<EnqueueSender>>>,
    fetch_times: Mutex<Vec<Instant>>,
    filter_fn: Option<FilterFn>,
    enqueued_fn: Option<EnqueuedFn>,
    error_fn: Option<ErrorFn>,
    delay_fn: Option<DelayFn>,
    visit_fn: Option<VisitFn>,
}

impl SpyExtender {
    pub fn new(site: Site) -> Self {
        Self {
            site,
            counts: Mutex::new(HashMap::new()),
            chan: Arc::new(Mutex::new(None)),
            fetch_times: Mutex::new(Vec::new()),
            filter_fn: None,
            enqueued_fn: None,
            error_fn: None,
            delay_fn: None,
            visit_fn: None,
        }
    }

    pub fn with_filter(
        mut self,
        f: impl Fn(&UrlContext, bool) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.filter_fn = Some(Box::new(f));
        self
    }

    pub fn with_enqueued(mut self, f: impl Fn(&UrlContext) + Send + Sync + 'static) -> Self {
        self.enqueued_fn = Some(Box::new(f));
        self
    }

    pub fn with_error(mut self, f: impl Fn(&CrawlError) + Send + Sync + 'static) -> Self {
        self.error_fn = Some(Box::new(f));
        self
    }

    /// Delay override; receives the compute-delay call number, 1-based.
    pub fn with_delay(
        mut self,
        f: impl Fn(&DelayInfo, usize) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.delay_fn = Some(Box::new(f));
        self
    }

    pub fn with_visit(
        mut self,
        f: impl Fn(&UrlContext, &FetchResponse) -> (Option<Vec<Url>>, bool) + Send + Sync + 'static,
    ) -> Self {
        self.visit_fn = Some(Box::new(f));
        self
    }

    /// The slot the run's enqueue channel lands in; clone before moving the
    /// spy so hook closures can push URLs at runtime.
    pub fn chan_slot(&self) -> Arc<Mutex<Option<EnqueueSender>>> {
        self.chan.clone()
    }

    pub fn enqueue_chan(&self) -> Option<EnqueueSender> {
        self.chan.lock().unwrap().clone()
    }

    pub fn count(&self, hook: Hook) -> usize {
        *self.counts.lock().unwrap().get(&hook).unwrap_or(&0)
    }

    pub fn fetch_times(&self) -> Vec<Instant> {
        self.fetch_times.lock().unwrap().clone()
    }

    fn bump(&self, hook: Hook) -> usize {
        let mut counts = self.counts.lock().unwrap();
        let count = counts.entry(hook).or_insert(0);
        *count += 1;
        *count
    }
}

#[async_trait]
impl Extender for SpyExtender {
    fn bind_enqueue(&self, chan: EnqueueSender) -> bool {
        *self.chan.lock().unwrap() = Some(chan);
        true
    }

    fn start(&self, seeds: Seeds) -> Seeds {
        self.bump(Hook::Start);
        seeds
    }

    fn end(&self, _reason: EndReason) {
        self.bump(Hook::End);
    }

    fn error(&self, err: &CrawlError) {
        self.bump(Hook::Error);
        if let Some(f) = &self.error_fn {
            f(err);
        }
    }

    fn compute_delay(
        &self,
        _host: &str,
        info: &DelayInfo,
        _last_fetch: Option<&FetchInfo>,
    ) -> Duration {
        let call = self.bump(Hook::ComputeDelay);
        match &self.delay_fn {
            Some(f) => f(info, call),
            None => info.opts_delay.max(info.robots_delay),
        }
    }

    async fn fetch(
        &self,
        ctx: &UrlContext,
        agent: &str,
        is_head: bool,
    ) -> Result<FetchResponse, FetchError> {
        self.bump(Hook::Fetch);
        self.fetch_times.lock().unwrap().push(Instant::now());
        self.site.fetch(ctx, agent, is_head)
    }

    fn request_get(&self, _ctx: &UrlContext, head: &FetchResponse) -> bool {
        self.bump(Hook::RequestGet);
        head.status < 400
    }

    fn request_robots(&self, _ctx: &UrlContext, _agent: &str) -> (Option<Vec<u8>>, bool) {
        self.bump(Hook::RequestRobots);
        (None, true)
    }

    fn fetched_robots(&self, _ctx: &UrlContext, _res: &FetchResponse) {
        self.bump(Hook::FetchedRobots);
    }

    fn filter(&self, ctx: &UrlContext, is_visited: bool) -> bool {
        self.bump(Hook::Filter);
        match &self.filter_fn {
            Some(f) => f(ctx, is_visited),
            None => !is_visited,
        }
    }

    fn enqueued(&self, ctx: &UrlContext) {
        self.bump(Hook::Enqueued);
        if let Some(f) = &self.enqueued_fn {
            f(ctx);
        }
    }

    async fn visit(
        &self,
        ctx: &UrlContext,
        res: &FetchResponse,
    ) -> (Option<Vec<Url>>, bool) {
        self.bump(Hook::Visit);
        match &self.visit_fn {
            Some(f) => f(ctx, res),
            None => (None, true),
        }
    }

    fn visited(&self, _ctx: &UrlContext, _harvested: &[Url]) {
        self.bump(Hook::Visited);
    }

    fn disallowed(&self, _ctx: &UrlContext) {
        self.bump(Hook::Disallowed);
    }
}
