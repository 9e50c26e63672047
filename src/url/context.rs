use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex};
use url::Url;

/// Opaque caller-attached state carried by a [`UrlContext`].
///
/// The crawler never inspects it; hooks downcast it back to whatever type
/// they stored.
pub type UserState = Arc<dyn Any + Send + Sync>;

/// One normalized crawl target and its provenance.
///
/// A context is created when a URL is accepted into the queue and travels
/// with it through every pipeline stage, so hooks can correlate a fetch or
/// an error with the link that produced it. Identity for deduplication is
/// the canonical URL string.
pub struct UrlContext {
    url: Url,
    raw: String,
    source: Option<Url>,
    state: Mutex<Option<UserState>>,
    head_override: Mutex<Option<bool>>,
    robots: bool,
}

impl UrlContext {
    /// Creates a context for a seed or harvested URL.
    pub(crate) fn new(url: Url, raw: String, source: Option<Url>) -> Self {
        Self {
            url,
            raw,
            source,
            state: Mutex::new(None),
            head_override: Mutex::new(None),
            robots: false,
        }
    }

    /// Creates the robots.txt context for the host of `sample`.
    pub(crate) fn robots(sample: &Url) -> Option<Self> {
        let mut url = sample.clone();
        url.set_path("/robots.txt");
        url.set_query(None);
        url.set_fragment(None);
        sample.host_str()?;
        Some(Self {
            raw: url.to_string(),
            url,
            source: None,
            state: Mutex::new(None),
            head_override: Mutex::new(None),
            robots: true,
        })
    }

    /// The canonical, normalized URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The URL string as originally received, before normalization.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The URL of the page that produced this one; `None` for seeds.
    pub fn source_url(&self) -> Option<&Url> {
        self.source.as_ref()
    }

    /// The host component of the canonical URL.
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Whether this context targets a robots.txt resource.
    pub fn is_robots(&self) -> bool {
        self.robots
    }

    /// Returns a clone of the caller-attached state, if any.
    pub fn state(&self) -> Option<UserState> {
        self.state.lock().expect("state lock poisoned").clone()
    }

    /// Attaches or replaces the caller state slot.
    pub fn set_state(&self, state: Option<UserState>) {
        *self.state.lock().expect("state lock poisoned") = state;
    }

    /// Per-context HEAD-before-GET override: `None` inherits the option,
    /// `Some(true)` forces a HEAD, `Some(false)` skips it.
    pub fn head_before_get(&self) -> Option<bool> {
        *self.head_override.lock().expect("head lock poisoned")
    }

    /// Sets the per-context HEAD-before-GET override.
    pub fn set_head_before_get(&self, mode: Option<bool>) {
        *self.head_override.lock().expect("head lock poisoned") = mode;
    }

    /// Whether this URL is on the same host as the page that produced it.
    /// Seeds have no source and always pass.
    pub fn same_host_as_source(&self) -> bool {
        match &self.source {
            Some(source) => source.host_str() == self.url.host_str(),
            None => true,
        }
    }
}

impl fmt::Debug for UrlContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlContext")
            .field("url", &self.url.as_str())
            .field("source", &self.source.as_ref().map(Url::as_str))
            .field("robots", &self.robots)
            .finish()
    }
}

impl fmt::Display for UrlContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(url: &str, source: Option<&str>) -> UrlContext {
        UrlContext::new(
            Url::parse(url).unwrap(),
            url.to_string(),
            source.map(|s| Url::parse(s).unwrap()),
        )
    }

    #[test]
    fn test_seed_has_no_source() {
        let c = ctx("http://hosta/page1.html", None);
        assert!(c.source_url().is_none());
        assert!(c.same_host_as_source());
    }

    #[test]
    fn test_same_host_as_source() {
        let same = ctx("http://hosta/page2.html", Some("http://hosta/page1.html"));
        assert!(same.same_host_as_source());

        let cross = ctx("http://hostb/page1.html", Some("http://hosta/page1.html"));
        assert!(!cross.same_host_as_source());
    }

    #[test]
    fn test_state_roundtrip() {
        let c = ctx("http://hosta/page1.html", None);
        assert!(c.state().is_none());

        c.set_state(Some(Arc::new("Error".to_string())));
        let state = c.state().unwrap();
        assert_eq!(state.downcast_ref::<String>().unwrap(), "Error");

        c.set_state(None);
        assert!(c.state().is_none());
    }

    #[test]
    fn test_head_override() {
        let c = ctx("http://hosta/page1.html", None);
        assert_eq!(c.head_before_get(), None);
        c.set_head_before_get(Some(false));
        assert_eq!(c.head_before_get(), Some(false));
    }

    #[test]
    fn test_robots_context() {
        let sample = Url::parse("http://hosta/deep/page1.html?q=1").unwrap();
        let robots = UrlContext::robots(&sample).unwrap();
        assert!(robots.is_robots());
        assert_eq!(robots.url().as_str(), "http://hosta/robots.txt");
    }
}
