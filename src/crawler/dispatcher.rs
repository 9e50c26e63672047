//! Central crawl coordinator.
//!
//! The dispatcher is the only mutator of shared crawl state: the visited
//! map, the host→worker table, and the outstanding-work counter. It owns
//! the receive side of three channels (runtime enqueues, completions, and
//! worker signals) and drains the enqueue channel with priority so caller
//! pushes never back up behind completion handling. Workers are spawned
//! lazily per host and never block the dispatcher: deliveries that do not
//! fit a worker's inbound queue overflow into a per-host buffer flushed as
//! that host completes work.

use crate::config::{LogFlags, Options};
use crate::crawler::worker::{Completion, Worker, WorkerSignal};
use crate::extender::{EndReason, EnqueuePayload, EnqueueSender, Extender, Seeds};
use crate::robots::RobotsPolicy;
use crate::url::{normalize, UrlContext, UserState};
use crate::{CrawlError, CrawlErrorKind};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use url::Url;

/// Capacity of the runtime enqueue channel.
const ENQUEUE_CAPACITY: usize = 128;

/// Capacity of the completion and worker-signal channels.
const EVENT_CAPACITY: usize = 64;

struct HostEntry {
    tx: mpsc::Sender<Arc<UrlContext>>,
    overflow: VecDeque<Arc<UrlContext>>,
}

pub(crate) struct Dispatcher {
    opts: Arc<Options>,
    ext: Arc<dyn Extender>,

    /// canonical URL → processed flag. Present-but-false means enqueued.
    visited: HashMap<String, bool>,
    hosts: HashMap<String, HostEntry>,
    /// Robots policies recovered from retired workers, so a respawned
    /// worker never refetches robots.txt within a run.
    robots_cache: HashMap<String, RobotsPolicy>,

    outstanding: usize,
    visits: usize,
    draining: bool,
    reason: EndReason,

    enqueue_tx: EnqueueSender,
    enqueue_rx: mpsc::Receiver<EnqueuePayload>,
    completions_tx: mpsc::Sender<Completion>,
    completions_rx: mpsc::Receiver<Completion>,
    signals_tx: mpsc::Sender<WorkerSignal>,
    signals_rx: mpsc::Receiver<WorkerSignal>,
    cancel_tx: watch::Sender<bool>,
}

impl Dispatcher {
    pub(crate) fn new(opts: Arc<Options>, ext: Arc<dyn Extender>) -> Self {
        let (enqueue_tx, enqueue_rx) = mpsc::channel(ENQUEUE_CAPACITY);
        let (completions_tx, completions_rx) = mpsc::channel(EVENT_CAPACITY);
        let (signals_tx, signals_rx) = mpsc::channel(EVENT_CAPACITY);
        let (cancel_tx, _) = watch::channel(false);

        Self {
            opts,
            ext,
            visited: HashMap::new(),
            hosts: HashMap::new(),
            robots_cache: HashMap::new(),
            outstanding: 0,
            visits: 0,
            draining: false,
            reason: EndReason::Done,
            enqueue_tx,
            enqueue_rx,
            completions_tx,
            completions_rx,
            signals_tx,
            signals_rx,
            cancel_tx,
        }
    }

    /// A sender for the runtime enqueue channel (used by the stop handle).
    pub(crate) fn enqueue_sender(&self) -> EnqueueSender {
        self.enqueue_tx.clone()
    }

    /// Drives one complete crawl: bind the enqueue channel, ingest seeds,
    /// then loop over events until all work drains and every worker has
    /// retired.
    pub(crate) async fn run(mut self, seeds: Seeds) -> EndReason {
        if !self.ext.bind_enqueue(self.enqueue_tx.clone()) {
            self.info("extender does not accept an enqueue channel; runtime enqueue is disabled");
        }

        let seeds = self.ext.start(seeds);
        for (raw, state) in seeds.into_entries() {
            self.submit_raw(&raw, state, None, CrawlErrorKind::Parse);
        }

        loop {
            // Runtime enqueues take priority over completion handling.
            while let Ok(payload) = self.enqueue_rx.try_recv() {
                self.handle_payload(payload);
            }

            // All accepted work has completed and the channel is drained.
            if !self.draining && self.outstanding == 0 {
                self.begin_drain(EndReason::Done);
            }
            if self.draining && self.hosts.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                Some(payload) = self.enqueue_rx.recv() => self.handle_payload(payload),
                Some(signal) = self.signals_rx.recv() => self.handle_signal(signal),
                Some(done) = self.completions_rx.recv() => self.handle_completion(done),
                else => break,
            }
        }

        let reason = self.reason;
        self.ext.end(reason);
        reason
    }

    /// Switches to draining: no new work is accepted, cancellation is
    /// broadcast, and the run ends once every worker has retired. The
    /// first cause wins.
    fn begin_drain(&mut self, reason: EndReason) {
        if self.draining {
            return;
        }
        self.draining = true;
        self.reason = reason;
        let _ = self.cancel_tx.send(true);
    }

    fn handle_payload(&mut self, payload: EnqueuePayload) {
        if self.draining {
            return;
        }
        match payload {
            EnqueuePayload::Stop => self.begin_drain(EndReason::Stopped),
            EnqueuePayload::Url(raw) => {
                self.submit_raw(&raw, None, None, CrawlErrorKind::Enqueue)
            }
            EnqueuePayload::Parsed(url) => {
                self.submit_raw(url.as_str(), None, None, CrawlErrorKind::Enqueue)
            }
            EnqueuePayload::Urls(raws) => {
                for raw in raws {
                    self.submit_raw(&raw, None, None, CrawlErrorKind::Enqueue);
                }
            }
            EnqueuePayload::ParsedUrls(urls) => {
                for url in urls {
                    self.submit_raw(url.as_str(), None, None, CrawlErrorKind::Enqueue);
                }
            }
            EnqueuePayload::WithState(url, state) => {
                self.submit_raw(url.as_str(), Some(state), None, CrawlErrorKind::Enqueue)
            }
            EnqueuePayload::WithStates(pairs) => {
                for (url, state) in pairs {
                    self.submit_raw(url.as_str(), Some(state), None, CrawlErrorKind::Enqueue);
                }
            }
            EnqueuePayload::Harvest { source, urls } => {
                for url in urls {
                    self.submit_raw(
                        url.as_str(),
                        None,
                        Some(source.url().clone()),
                        CrawlErrorKind::Parse,
                    );
                }
            }
        }
    }

    /// Normalizes one raw URL into a context and runs it through the
    /// filter gate. `kind` is the error kind reported when the URL cannot
    /// be parsed (seeds and links differ from runtime payloads).
    fn submit_raw(
        &mut self,
        raw: &str,
        state: Option<UserState>,
        source: Option<Url>,
        kind: CrawlErrorKind,
    ) {
        match normalize(raw, source.as_ref(), self.opts.normalize_flags) {
            Ok(url) => {
                let ctx = Arc::new(UrlContext::new(url, raw.to_string(), source));
                if let Some(state) = state {
                    ctx.set_state(Some(state));
                }
                self.submit(ctx);
            }
            Err(err) => self.report(CrawlError::with_source(
                kind,
                None,
                format!("cannot enqueue {raw}"),
                Box::new(err),
            )),
        }
    }

    fn submit(&mut self, ctx: Arc<UrlContext>) {
        let key = ctx.url().to_string();
        let is_visited = self.visited.contains_key(&key);

        if !self.ext.filter(&ctx, is_visited) {
            self.log_ignored(&ctx, "rejected by filter");
            return;
        }
        if self.opts.same_host_only && !ctx.same_host_as_source() {
            self.log_ignored(&ctx, "not on the source host");
            return;
        }

        // Re-enqueue of a processed URL is allowed when the filter said so;
        // the flag drops back to pending either way.
        self.visited.insert(key, false);
        self.outstanding += 1;
        self.ext.enqueued(&ctx);
        self.log_enqueued(&ctx);
        self.route(ctx);
    }

    /// Delivers a context to its host worker, spawning one lazily. A fresh
    /// host's first queued item is its robots context, unless the policy is
    /// already cached from a retired worker.
    fn route(&mut self, ctx: Arc<UrlContext>) {
        let host = ctx.host().to_string();

        if !self.hosts.contains_key(&host) {
            let mut entry = self.make_worker(&host);
            if !self.robots_cache.contains_key(&host) && !ctx.is_robots() {
                if let Some(rctx) = UrlContext::robots(ctx.url()) {
                    let rctx = Arc::new(rctx);
                    self.outstanding += 1;
                    self.ext.enqueued(&rctx);
                    self.log_enqueued(&rctx);
                    Self::deliver(&mut entry, rctx);
                }
            }
            self.hosts.insert(host.clone(), entry);
        }

        let entry = self
            .hosts
            .get_mut(&host)
            .expect("host entry ensured above");
        Self::deliver(entry, ctx);
    }

    fn make_worker(&mut self, host: &str) -> HostEntry {
        let (tx, rx) = mpsc::channel(self.opts.host_buffer());
        let worker = Worker::new(
            host.to_string(),
            self.opts.clone(),
            self.ext.clone(),
            rx,
            self.enqueue_tx.clone(),
            self.completions_tx.clone(),
            self.signals_tx.clone(),
            self.cancel_tx.subscribe(),
            self.robots_cache.get(host).cloned(),
        );
        let handle = tokio::spawn(worker.run());

        // Hook panics on the worker task must reach the caller of run, not
        // strand the dispatcher waiting on a completion that never comes.
        let signals = self.signals_tx.clone();
        let panicked_host = host.to_string();
        tokio::spawn(async move {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    let _ = signals
                        .send(WorkerSignal::Panicked {
                            host: panicked_host,
                            payload: err.into_panic(),
                        })
                        .await;
                }
            }
        });

        if self.opts.log_flags.contains(LogFlags::TRACE) {
            tracing::trace!(host = %host, "worker spawned");
        }

        HostEntry {
            tx,
            overflow: VecDeque::new(),
        }
    }

    /// Queues a context for a worker without ever blocking the dispatcher.
    fn deliver(entry: &mut HostEntry, ctx: Arc<UrlContext>) {
        entry.overflow.push_back(ctx);
        Self::flush_overflow(entry);
    }

    fn flush_overflow(entry: &mut HostEntry) {
        while let Some(ctx) = entry.overflow.pop_front() {
            match entry.tx.try_send(ctx) {
                Ok(()) => {}
                Err(TrySendError::Full(ctx)) | Err(TrySendError::Closed(ctx)) => {
                    entry.overflow.push_front(ctx);
                    break;
                }
            }
        }
    }

    fn handle_completion(&mut self, done: Completion) {
        self.outstanding = self.outstanding.saturating_sub(1);

        if !done.ctx.is_robots() {
            self.visited.insert(done.ctx.url().to_string(), true);
        }

        if done.visited {
            self.visits += 1;
            if let Some(max) = self.opts.max_visits {
                if self.visits >= max {
                    self.begin_drain(EndReason::MaxVisits);
                }
            }
        }

        if !self.draining {
            if let Some(entry) = self.hosts.get_mut(&done.host) {
                Self::flush_overflow(entry);
            }
        }
    }

    fn handle_signal(&mut self, signal: WorkerSignal) {
        match signal {
            WorkerSignal::Returned(ctx) => {
                if self.draining {
                    self.outstanding = self.outstanding.saturating_sub(1);
                } else if ctx.is_robots() && self.robots_cache.contains_key(ctx.host()) {
                    // The retiring worker resolved robots before handing
                    // this back; nothing left to do for it.
                    self.outstanding = self.outstanding.saturating_sub(1);
                } else {
                    self.route(ctx);
                }
            }
            WorkerSignal::Panicked { host, payload } => {
                if self.opts.log_flags.contains(LogFlags::ERROR) {
                    tracing::error!(host = %host, "worker hook panicked");
                }
                std::panic::resume_unwind(payload);
            }
            WorkerSignal::Retired { host, robots } => {
                if let Some(policy) = robots {
                    self.robots_cache.insert(host.clone(), policy);
                }
                let Some(old) = self.hosts.remove(&host) else {
                    return;
                };
                if self.draining {
                    self.outstanding = self.outstanding.saturating_sub(old.overflow.len());
                    return;
                }
                if old.overflow.is_empty() {
                    return;
                }
                // The worker retired with buffered work left; hand it to a
                // fresh worker for the host.
                let mut entry = self.make_worker(&host);
                let needs_robots = !self.robots_cache.contains_key(&host)
                    && !old.overflow.iter().any(|c| c.is_robots());
                if needs_robots {
                    let robots_ctx = old
                        .overflow
                        .front()
                        .and_then(|c| UrlContext::robots(c.url()));
                    if let Some(rctx) = robots_ctx {
                        let rctx = Arc::new(rctx);
                        self.outstanding += 1;
                        self.ext.enqueued(&rctx);
                        self.log_enqueued(&rctx);
                        Self::deliver(&mut entry, rctx);
                    }
                }
                for ctx in old.overflow {
                    Self::deliver(&mut entry, ctx);
                }
                self.hosts.insert(host, entry);
            }
        }
    }

    fn report(&self, err: CrawlError) {
        if self.opts.log_flags.contains(LogFlags::ERROR) {
            tracing::error!("{err}");
        }
        self.ext.error(&err);
    }

    fn info(&self, message: &str) {
        if self.opts.log_flags.contains(LogFlags::INFO) {
            tracing::info!("{message}");
        }
    }

    fn log_enqueued(&self, ctx: &UrlContext) {
        if self.opts.log_flags.contains(LogFlags::ENQUEUED) {
            tracing::debug!(url = %ctx, "enqueued");
        }
    }

    fn log_ignored(&self, ctx: &UrlContext, why: &str) {
        if self.opts.log_flags.contains(LogFlags::IGNORED) {
            tracing::debug!(url = %ctx, "ignored: {why}");
        }
    }
}
