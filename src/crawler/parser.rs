//! Link harvesting from fetched HTML.
//!
//! The default visit behavior hands the page body here; every `<a href>`
//! is resolved against the page URL and returned absolute. Links the
//! crawler can never fetch (javascript:, mailto:, tel:, data:, bare
//! fragments, non-HTTP schemes) are dropped silently.

use crate::LinkExtractError;
use scraper::{Html, Selector};
use url::Url;

/// Extracts the followable links from an HTML document.
///
/// # Arguments
///
/// * `html` - The page body
/// * `base` - The page URL, used to resolve relative references
///
/// # Returns
///
/// * `Ok(Vec<Url>)` - Absolute harvested URLs, in document order
/// * `Err(LinkExtractError)` - The anchor selector failed to build
pub fn extract_links(html: &str, base: &Url) -> Result<Vec<Url>, LinkExtractError> {
    let document = Html::parse_document(html);
    let anchors = Selector::parse("a[href]")
        .map_err(|e| LinkExtractError(e.to_string()))?;

    let mut links = Vec::new();
    for element in document.select(&anchors) {
        if let Some(href) = element.value().attr("href") {
            if let Some(url) = resolve_link(href, base) {
                links.push(url);
            }
        }
    }

    Ok(links)
}

/// Resolves one href to an absolute URL, or drops it.
fn resolve_link(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let scheme_blocked = ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|prefix| href.len() >= prefix.len() && href[..prefix.len()].eq_ignore_ascii_case(prefix));
    if scheme_blocked {
        return None;
    }

    let url = base.join(href).ok()?;
    match url.scheme() {
        "http" | "https" => Some(url),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://hosta/dir/page1.html").unwrap()
    }

    fn links(html: &str) -> Vec<String> {
        extract_links(html, &base())
            .unwrap()
            .into_iter()
            .map(|u| u.to_string())
            .collect()
    }

    #[test]
    fn test_absolute_link() {
        let found = links(r#"<a href="http://hostb/page1.html">b</a>"#);
        assert_eq!(found, vec!["http://hostb/page1.html"]);
    }

    #[test]
    fn test_relative_links_resolve_against_base() {
        let found = links(r#"<a href="page2.html">2</a><a href="/page3.html">3</a>"#);
        assert_eq!(
            found,
            vec!["http://hosta/dir/page2.html", "http://hosta/page3.html"]
        );
    }

    #[test]
    fn test_document_order_preserved() {
        let found = links(
            r#"<body><a href="/b.html">b</a><p><a href="/a.html">a</a></p></body>"#,
        );
        assert_eq!(found, vec!["http://hosta/b.html", "http://hosta/a.html"]);
    }

    #[test]
    fn test_skips_unfetchable_schemes() {
        let found = links(
            r#"
            <a href="javascript:void(0)">js</a>
            <a href="MAILTO:x@hosta">mail</a>
            <a href="tel:+15555550100">tel</a>
            <a href="data:text/plain,hi">data</a>
            <a href="ftp://hosta/file">ftp</a>
            "#,
        );
        assert!(found.is_empty());
    }

    #[test]
    fn test_skips_fragment_only() {
        let found = links(r##"<a href="#section">jump</a><a href="page2.html#x">2</a>"##);
        assert_eq!(found, vec!["http://hosta/dir/page2.html#x"]);
    }

    #[test]
    fn test_skips_empty_href() {
        let found = links(r#"<a href="">nothing</a><a href="  ">space</a>"#);
        assert!(found.is_empty());
    }

    #[test]
    fn test_malformed_html_still_yields_links() {
        let found = links(r#"<div><a href="page2.html">ok<div></a>"#);
        assert_eq!(found, vec!["http://hosta/dir/page2.html"]);
    }

    #[test]
    fn test_anchors_without_href_ignored() {
        let found = links(r#"<a name="top">top</a>"#);
        assert!(found.is_empty());
    }
}
