//! Crawler configuration.
//!
//! [`Options`] is the user-facing configuration bag handed to a
//! [`Crawler`](crate::Crawler). Unlike a config file it is plain code: set
//! the fields you care about, leave the rest at their defaults. The
//! defaults favor politeness (5 s delay, same-host only).

use crate::extender::Extender;
use crate::url::NormalizeFlags;
use std::sync::Arc;
use std::time::Duration;

/// Default user agent for page fetches.
pub const DEFAULT_USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; webwalk/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Default user agent for robots.txt fetches and rule matching.
pub const DEFAULT_ROBOT_USER_AGENT: &str =
    concat!("webwalk/", env!("CARGO_PKG_VERSION"));

/// Default delay between fetches on one host.
pub const DEFAULT_CRAWL_DELAY: Duration = Duration::from_secs(5);

/// Default idle duration after which a host worker retires.
pub const DEFAULT_WORKER_IDLE_TTL: Duration = Duration::from_secs(10);

/// Default per-host inbound channel capacity.
pub const DEFAULT_HOST_BUFFER_FACTOR: usize = 10;

/// Bitmask selecting which crawl events are emitted through `tracing`.
///
/// The crawler always routes messages through `tracing`; these flags gate
/// emission so an embedding application can keep its subscriber quiet
/// without filtering by target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogFlags(u32);

impl LogFlags {
    /// Emit nothing.
    pub const NONE: LogFlags = LogFlags(0);
    /// Internal errors (also delivered to the error hook).
    pub const ERROR: LogFlags = LogFlags(1 << 0);
    /// Run lifecycle and diagnostics.
    pub const INFO: LogFlags = LogFlags(1 << 1);
    /// Each URL accepted into a worker queue.
    pub const ENQUEUED: LogFlags = LogFlags(1 << 2);
    /// Each URL rejected by the filter or the same-host rule.
    pub const IGNORED: LogFlags = LogFlags(1 << 3);
    /// Worker pipeline steps (robots, delay, fetch).
    pub const TRACE: LogFlags = LogFlags(1 << 4);
    /// Everything.
    pub const ALL: LogFlags = LogFlags(u32::MAX);

    /// Checks whether every flag in `other` is set.
    pub fn contains(self, other: LogFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for LogFlags {
    fn default() -> Self {
        Self::ERROR
    }
}

impl std::ops::BitOr for LogFlags {
    type Output = LogFlags;

    fn bitor(self, rhs: LogFlags) -> LogFlags {
        LogFlags(self.0 | rhs.0)
    }
}

/// User-facing crawler configuration.
///
/// Persistent across runs of one [`Crawler`](crate::Crawler) instance; any
/// field may be replaced between runs.
#[derive(Clone)]
pub struct Options {
    /// The hook bundle participating in the crawl. Running without one
    /// panics.
    pub extender: Option<Arc<dyn Extender>>,

    /// User agent sent on page fetches.
    pub user_agent: String,

    /// User agent for robots.txt fetches and robots rule matching.
    pub robot_user_agent: String,

    /// Upper bound on completed visits; `None` means unbounded. When the
    /// bound is reached the crawler drains in-flight work and stops.
    pub max_visits: Option<usize>,

    /// Minimum delay between fetches on one host, before robots.txt
    /// advertisements are taken into account.
    pub crawl_delay: Duration,

    /// Idle duration after which a host worker exits. A pending crawl
    /// delay does not count as idleness.
    pub worker_idle_ttl: Duration,

    /// Restrict the crawl to URLs on the same host as the page that
    /// produced them.
    pub same_host_only: bool,

    /// Issue a HEAD and consult the request-get hook before each GET.
    pub head_before_get: bool,

    /// Normalization steps applied to every URL before deduplication.
    pub normalize_flags: NormalizeFlags,

    /// Which crawl events are logged.
    pub log_flags: LogFlags,

    /// Capacity of each per-host inbound queue. Values below 1 are
    /// treated as 1.
    pub host_buffer_factor: usize,
}

impl Options {
    /// Creates options with the given extender and default settings.
    pub fn new(extender: Option<Arc<dyn Extender>>) -> Self {
        Self {
            extender,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            robot_user_agent: DEFAULT_ROBOT_USER_AGENT.to_string(),
            max_visits: None,
            crawl_delay: DEFAULT_CRAWL_DELAY,
            worker_idle_ttl: DEFAULT_WORKER_IDLE_TTL,
            same_host_only: true,
            head_before_get: false,
            normalize_flags: NormalizeFlags::default(),
            log_flags: LogFlags::default(),
            host_buffer_factor: DEFAULT_HOST_BUFFER_FACTOR,
        }
    }

    /// Checks the options for values that cannot work.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The options are usable
    /// * `Err(Vec<String>)` - One message per problem found
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        if self.user_agent.trim().is_empty() {
            problems.push("user_agent must not be empty".to_string());
        }
        if self.robot_user_agent.trim().is_empty() {
            problems.push("robot_user_agent must not be empty".to_string());
        }
        if self.host_buffer_factor == 0 {
            problems.push("host_buffer_factor must be at least 1".to_string());
        }
        if self.max_visits == Some(0) {
            problems.push("max_visits of 0 would end every run immediately".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }

    /// The effective per-host inbound queue capacity.
    pub(crate) fn host_buffer(&self) -> usize {
        self.host_buffer_factor.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = Options::new(None);
        assert_eq!(opts.crawl_delay, Duration::from_secs(5));
        assert_eq!(opts.worker_idle_ttl, Duration::from_secs(10));
        assert!(opts.same_host_only);
        assert!(!opts.head_before_get);
        assert_eq!(opts.max_visits, None);
        assert_eq!(opts.log_flags, LogFlags::ERROR);
        assert_eq!(opts.host_buffer_factor, 10);
        assert!(opts.user_agent.contains("webwalk"));
    }

    #[test]
    fn test_validate_ok() {
        assert!(Options::new(None).validate().is_ok());
    }

    #[test]
    fn test_validate_reports_each_problem() {
        let mut opts = Options::new(None);
        opts.user_agent = String::new();
        opts.robot_user_agent = "  ".to_string();
        opts.host_buffer_factor = 0;
        opts.max_visits = Some(0);

        let problems = opts.validate().unwrap_err();
        assert_eq!(problems.len(), 4);
    }

    #[test]
    fn test_host_buffer_clamps_to_one() {
        let mut opts = Options::new(None);
        opts.host_buffer_factor = 0;
        assert_eq!(opts.host_buffer(), 1);
    }

    #[test]
    fn test_log_flags_combine() {
        let flags = LogFlags::ERROR | LogFlags::ENQUEUED;
        assert!(flags.contains(LogFlags::ERROR));
        assert!(flags.contains(LogFlags::ENQUEUED));
        assert!(!flags.contains(LogFlags::TRACE));
        assert!(LogFlags::ALL.contains(flags));
    }
}
