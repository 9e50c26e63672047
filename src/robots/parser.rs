//! robots.txt policy evaluation, built on the robotstxt crate.

use robotstxt::DefaultMatcher;
use std::time::Duration;

/// A host's parsed robots.txt decision function.
///
/// Holds the raw file content and answers allow/deny per agent on demand;
/// an empty or permissive policy allows everything. Workers cache one of
/// these per host, and the dispatcher keeps a spare copy so a respawned
/// worker never refetches the file within a run.
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    content: String,
    permit_all: bool,
}

impl RobotsPolicy {
    /// Builds a policy from raw robots.txt bytes.
    ///
    /// Content that is not valid UTF-8 is interpreted lossily; the matcher
    /// treats unparseable lines as absent rules.
    pub fn from_bytes(content: &[u8]) -> Self {
        Self {
            content: String::from_utf8_lossy(content).into_owned(),
            permit_all: false,
        }
    }

    /// A policy that allows every URL.
    ///
    /// Used when the robots.txt fetch fails or returns a non-success
    /// status.
    pub fn permit_all() -> Self {
        Self {
            content: String::new(),
            permit_all: true,
        }
    }

    /// Whether `url` may be fetched by `agent`.
    pub fn allowed(&self, url: &str, agent: &str) -> bool {
        if self.permit_all || self.content.is_empty() {
            return true;
        }
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, agent, url)
    }

    /// The Crawl-delay advertised for `agent`, when present.
    ///
    /// A delay under a `User-agent` group matching `agent` wins over one
    /// under the wildcard group.
    pub fn crawl_delay(&self, agent: &str) -> Option<Duration> {
        if self.permit_all || self.content.is_empty() {
            return None;
        }

        let agent_lower = agent.to_lowercase();
        let mut group: Vec<String> = Vec::new();
        let mut wildcard: Option<f64> = None;
        let mut specific: Option<f64> = None;
        let mut in_directives = false;

        for line in self.content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_lowercase().as_str() {
                "user-agent" => {
                    // A user-agent line after other directives starts a new
                    // group.
                    if in_directives {
                        group.clear();
                        in_directives = false;
                    }
                    group.push(value.to_lowercase());
                }
                "crawl-delay" => {
                    in_directives = true;
                    let Ok(delay) = value.parse::<f64>() else {
                        continue;
                    };
                    if group.iter().any(|g| g != "*" && agent_lower.contains(g.as_str())) {
                        specific = Some(delay);
                    } else if group.iter().any(|g| g == "*") {
                        wildcard = Some(delay);
                    }
                }
                _ => in_directives = true,
            }
        }

        specific
            .or(wildcard)
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(Duration::from_secs_f64)
    }
}
