//! Per-host worker task.
//!
//! One worker exists per host with pending work. It owns that host's fetch
//! ordering: robots.txt resolution first, then every URL in arrival order,
//! each preceded by the computed crawl delay. Workers never touch shared
//! crawl state; everything flows back to the dispatcher over channels
//! (completions, returned contexts, retirement).

use crate::config::{LogFlags, Options};
use crate::crawler::parser;
use crate::extender::{DelayInfo, EnqueuePayload, Extender, FetchInfo, FetchResponse};
use crate::robots::RobotsPolicy;
use crate::url::UrlContext;
use crate::{CrawlError, CrawlErrorKind, FetchError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::time;

/// One fully-processed URL, reported back to the dispatcher.
pub(crate) struct Completion {
    pub host: String,
    pub ctx: Arc<UrlContext>,
    /// Whether a visit hook completed for this URL.
    pub visited: bool,
}

/// Worker lifecycle notifications.
pub(crate) enum WorkerSignal {
    /// A context that was queued but never processed; the dispatcher
    /// re-routes or drops it.
    Returned(Arc<UrlContext>),
    /// The worker exited. Carries the resolved robots policy so a respawn
    /// for the same host does not refetch robots.txt.
    Retired {
        host: String,
        robots: Option<RobotsPolicy>,
    },
    /// A hook panicked on the worker task. The dispatcher resumes the
    /// unwind so the panic surfaces to the caller of `run`.
    Panicked {
        host: String,
        payload: Box<dyn std::any::Any + Send>,
    },
}

pub(crate) struct Worker {
    host: String,
    opts: Arc<Options>,
    ext: Arc<dyn Extender>,
    inbound: mpsc::Receiver<Arc<UrlContext>>,
    enqueue: mpsc::Sender<EnqueuePayload>,
    completions: mpsc::Sender<Completion>,
    signals: mpsc::Sender<WorkerSignal>,
    cancel: watch::Receiver<bool>,
    robots: Option<RobotsPolicy>,
    robots_delay: Duration,
    last_delay: Duration,
    last_fetch: Option<FetchInfo>,
    last_fetch_end: Option<Instant>,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        host: String,
        opts: Arc<Options>,
        ext: Arc<dyn Extender>,
        inbound: mpsc::Receiver<Arc<UrlContext>>,
        enqueue: mpsc::Sender<EnqueuePayload>,
        completions: mpsc::Sender<Completion>,
        signals: mpsc::Sender<WorkerSignal>,
        cancel: watch::Receiver<bool>,
        robots: Option<RobotsPolicy>,
    ) -> Self {
        let robots_delay = robots
            .as_ref()
            .and_then(|r| r.crawl_delay(&opts.robot_user_agent))
            .unwrap_or(Duration::ZERO);
        Self {
            host,
            opts,
            ext,
            inbound,
            enqueue,
            completions,
            signals,
            cancel,
            robots,
            robots_delay,
            last_delay: Duration::ZERO,
            last_fetch: None,
            last_fetch_end: None,
        }
    }

    /// The worker loop: block on inbound work until cancelled or idle for
    /// the configured TTL. The idle timer is only armed here, so a long
    /// crawl delay inside `process` can never retire the worker.
    pub(crate) async fn run(mut self) {
        loop {
            if *self.cancel.borrow() {
                break;
            }
            enum Event {
                Process(Arc<UrlContext>),
                Cancelled,
                Closed,
                Idle,
            }
            let event = tokio::select! {
                biased;
                res = self.cancel.wait_for(|c| *c) => {
                    let _ = res;
                    Event::Cancelled
                }
                maybe = self.inbound.recv() => match maybe {
                    Some(ctx) => Event::Process(ctx),
                    None => Event::Closed,
                },
                _ = time::sleep(self.opts.worker_idle_ttl) => Event::Idle,
            };
            match event {
                Event::Process(ctx) => self.process(ctx).await,
                Event::Cancelled | Event::Closed => break,
                Event::Idle => {
                    self.trace("idle timeout");
                    break;
                }
            }
        }
        self.retire().await;
    }

    /// Hands back anything still queued, then announces retirement.
    async fn retire(mut self) {
        self.inbound.close();
        while let Ok(ctx) = self.inbound.try_recv() {
            if self
                .signals
                .send(WorkerSignal::Returned(ctx))
                .await
                .is_err()
            {
                break;
            }
        }
        let host = std::mem::take(&mut self.host);
        let robots = self.robots.take();
        let _ = self.signals.send(WorkerSignal::Retired { host, robots }).await;
    }

    async fn process(&mut self, ctx: Arc<UrlContext>) {
        if ctx.is_robots() {
            self.resolve_robots(&ctx).await;
            self.complete(ctx, false).await;
            return;
        }

        if let Some(robots) = &self.robots {
            if !robots.allowed(ctx.url().as_str(), &self.opts.robot_user_agent) {
                self.trace("disallowed by robots.txt");
                self.ext.disallowed(&ctx);
                self.complete(ctx, false).await;
                return;
            }
        }

        let visited = self.request(&ctx).await;
        self.complete(ctx, visited).await;
    }

    /// Runs the HEAD/GET pipeline for one URL. Returns whether a visit
    /// hook completed.
    async fn request(&mut self, ctx: &Arc<UrlContext>) -> bool {
        let head_first = ctx.head_before_get().unwrap_or(self.opts.head_before_get);
        if head_first {
            let head = match self.throttled_fetch(ctx, true).await {
                Some(Ok(res)) => res,
                Some(Err(err)) => {
                    self.report_fetch_error(ctx, err, true);
                    return false;
                }
                None => return false,
            };
            if !self.ext.request_get(ctx, &head) {
                self.trace("GET declined after HEAD");
                return false;
            }
        }

        let res = match self.throttled_fetch(ctx, false).await {
            Some(Ok(res)) => res,
            Some(Err(err)) => {
                self.report_fetch_error(ctx, err, false);
                return false;
            }
            None => return false,
        };

        if res.status >= 400 {
            self.report(CrawlError::new(
                CrawlErrorKind::Fetch,
                Some(ctx.clone()),
                format!("fetch of {} returned status {}", ctx, res.status),
            ));
            return false;
        }

        self.visit(ctx, res).await
    }

    async fn visit(&mut self, ctx: &Arc<UrlContext>, res: FetchResponse) -> bool {
        let (harvested, follow) = self.ext.visit(ctx, &res).await;

        let links = if follow {
            let base = res.final_url.clone().unwrap_or_else(|| ctx.url().clone());
            match parser::extract_links(&res.text(), &base) {
                Ok(links) => links,
                Err(err) => {
                    self.report(CrawlError::with_source(
                        CrawlErrorKind::LinkExtract,
                        Some(ctx.clone()),
                        format!("link extraction failed for {ctx}"),
                        Box::new(err),
                    ));
                    Vec::new()
                }
            }
        } else {
            harvested.unwrap_or_default()
        };

        self.ext.visited(ctx, &links);

        if !links.is_empty() {
            let _ = self
                .enqueue
                .send(EnqueuePayload::Harvest {
                    source: ctx.clone(),
                    urls: links,
                })
                .await;
        }

        true
    }

    /// Resolves the host's robots policy: caller-supplied bytes win, then
    /// a fetch with the robot user agent, falling back to permit-all on
    /// any failure or non-success status.
    async fn resolve_robots(&mut self, ctx: &Arc<UrlContext>) {
        let (data, do_request) = self.ext.request_robots(ctx, &self.opts.robot_user_agent);

        let policy = if let Some(data) = data {
            RobotsPolicy::from_bytes(&data)
        } else if do_request {
            match self.throttled_fetch(ctx, false).await {
                Some(Ok(res)) if res.is_success() => {
                    self.ext.fetched_robots(ctx, &res);
                    RobotsPolicy::from_bytes(&res.body)
                }
                Some(Ok(_)) => RobotsPolicy::permit_all(),
                Some(Err(err)) => {
                    self.report(CrawlError::with_source(
                        CrawlErrorKind::Robots,
                        Some(ctx.clone()),
                        format!("robots.txt fetch failed for host {}", self.host),
                        Box::new(err),
                    ));
                    RobotsPolicy::permit_all()
                }
                None => RobotsPolicy::permit_all(),
            }
        } else {
            RobotsPolicy::permit_all()
        };

        self.robots_delay = policy
            .crawl_delay(&self.opts.robot_user_agent)
            .unwrap_or(Duration::ZERO);
        self.robots = Some(policy);
    }

    /// One fetch preceded by its computed delay. `None` means the run was
    /// cancelled while waiting.
    async fn throttled_fetch(
        &mut self,
        ctx: &Arc<UrlContext>,
        is_head: bool,
    ) -> Option<Result<FetchResponse, FetchError>> {
        let info = DelayInfo {
            opts_delay: self.opts.crawl_delay,
            robots_delay: self.robots_delay,
            last_delay: self.last_delay,
        };
        let delay = self
            .ext
            .compute_delay(&self.host, &info, self.last_fetch.as_ref());
        self.last_delay = delay;

        if let Some(end) = self.last_fetch_end {
            let wait = delay.saturating_sub(end.elapsed());
            if !wait.is_zero() && self.pause(wait).await {
                return None;
            }
        }

        let agent = if ctx.is_robots() {
            &self.opts.robot_user_agent
        } else {
            &self.opts.user_agent
        };

        self.trace(if is_head { "HEAD" } else { "GET" });
        let started = Instant::now();
        let result = self.ext.fetch(ctx, agent, is_head).await;
        self.last_fetch = Some(FetchInfo {
            elapsed: started.elapsed(),
            status: result.as_ref().ok().map(|r| r.status),
            is_head,
        });
        self.last_fetch_end = Some(Instant::now());

        Some(result)
    }

    /// Cancellation-aware sleep. Returns true when cancelled.
    async fn pause(&mut self, wait: Duration) -> bool {
        tokio::select! {
            _ = time::sleep(wait) => false,
            res = self.cancel.wait_for(|c| *c) => {
                let _ = res;
                true
            }
        }
    }

    fn report_fetch_error(&self, ctx: &Arc<UrlContext>, err: FetchError, is_head: bool) {
        let kind = match &err {
            FetchError::Body(_) => CrawlErrorKind::ReadBody,
            _ => CrawlErrorKind::Fetch,
        };
        let method = if is_head { "HEAD" } else { "GET" };
        self.report(CrawlError::with_source(
            kind,
            Some(ctx.clone()),
            format!("{method} {ctx} failed"),
            Box::new(err),
        ));
    }

    fn report(&self, err: CrawlError) {
        if self.opts.log_flags.contains(LogFlags::ERROR) {
            tracing::error!(host = %self.host, "{err}");
        }
        self.ext.error(&err);
    }

    async fn complete(&self, ctx: Arc<UrlContext>, visited: bool) {
        let _ = self
            .completions
            .send(Completion {
                host: self.host.clone(),
                ctx,
                visited,
            })
            .await;
    }

    fn trace(&self, step: &str) {
        if self.opts.log_flags.contains(LogFlags::TRACE) {
            tracing::trace!(host = %self.host, "{step}");
        }
    }
}
