//! Crawl orchestration.
//!
//! [`Crawler`] is the entry point: give it [`Options`] with an extender,
//! call [`run`](Crawler::run) with seeds, get back the [`EndReason`]. The
//! heavy lifting lives in the dispatcher (coordination, visited set,
//! termination) and the per-host workers (robots, delay, fetching).

mod dispatcher;
pub(crate) mod fetcher;
mod parser;
mod worker;

pub use fetcher::build_http_client;
pub use parser::extract_links;

use crate::config::Options;
use crate::extender::{EndReason, EnqueuePayload, EnqueueSender, Extender, Seeds};
use dispatcher::Dispatcher;
use std::sync::{Arc, Mutex};

/// A polite, extensible web crawler.
///
/// One instance may run any number of times; per-run state (visited set,
/// workers) is re-initialized on each entry while `options` persists and
/// may be reconfigured between runs.
pub struct Crawler {
    /// Configuration for subsequent runs. Replacing the extender between
    /// runs is supported.
    pub options: Options,
    live: Arc<Mutex<Option<EnqueueSender>>>,
}

impl Crawler {
    /// Creates a crawler with default options around the given extender.
    pub fn new(extender: Option<Arc<dyn Extender>>) -> Self {
        Self::with_options(Options::new(extender))
    }

    /// Creates a crawler from fully-specified options.
    pub fn with_options(options: Options) -> Self {
        Self {
            options,
            live: Arc::new(Mutex::new(None)),
        }
    }

    /// Runs one complete crawl from `seeds` and returns why it ended.
    ///
    /// Seeds convert from nothing (`()`), single URLs (`&str`, `String`,
    /// `Url`), batches (`Vec` of those), or `(Url, UserState)` pairs.
    ///
    /// # Panics
    ///
    /// Panics when `options.extender` is `None`, and propagates any panic
    /// raised inside a hook.
    pub async fn run(&mut self, seeds: impl Into<Seeds>) -> EndReason {
        let opts = Arc::new(self.options.clone());
        let Some(ext) = opts.extender.clone() else {
            panic!("webwalk: Options.extender is required to run a crawl");
        };

        let dispatcher = Dispatcher::new(opts, ext);
        *self.live.lock().expect("stop lock poisoned") = Some(dispatcher.enqueue_sender());

        let reason = dispatcher.run(seeds.into()).await;

        *self.live.lock().expect("stop lock poisoned") = None;
        reason
    }

    /// Requests graceful termination of the in-progress run, equivalent to
    /// sending [`EnqueuePayload::Stop`] on the enqueue channel.
    ///
    /// # Returns
    ///
    /// `true` when a live run accepted the request.
    pub fn stop(&self) -> bool {
        self.stop_handle().stop()
    }

    /// A cloneable handle for stopping this crawler from another task.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            live: self.live.clone(),
        }
    }
}

/// Requests termination of a [`Crawler`]'s in-progress run from anywhere.
#[derive(Clone)]
pub struct StopHandle {
    live: Arc<Mutex<Option<EnqueueSender>>>,
}

impl StopHandle {
    /// Sends the stop request. Returns `true` when a live run accepted it;
    /// `false` when no run is in progress (idempotent otherwise).
    pub fn stop(&self) -> bool {
        let live = self.live.lock().expect("stop lock poisoned");
        match live.as_ref() {
            Some(tx) => tx.try_send(EnqueuePayload::Stop).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extender::DefaultExtender;

    #[test]
    fn test_stop_without_live_run() {
        let crawler = Crawler::new(Some(Arc::new(DefaultExtender::new())));
        assert!(!crawler.stop());
        assert!(!crawler.stop_handle().stop());
    }

    #[tokio::test]
    async fn test_empty_run_completes() {
        let mut crawler = Crawler::new(Some(Arc::new(DefaultExtender::new())));
        crawler.options.crawl_delay = std::time::Duration::ZERO;
        let reason = crawler.run(()).await;
        assert_eq!(reason, EndReason::Done);
    }

    #[tokio::test]
    async fn test_handle_outlives_run() {
        let mut crawler = Crawler::new(Some(Arc::new(DefaultExtender::new())));
        let handle = crawler.stop_handle();
        crawler.run(()).await;
        assert!(!handle.stop());
    }
}
