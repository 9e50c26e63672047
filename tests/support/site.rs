//! In-memory site served through the fetch hook.
//!
//! Three small hosts with a fixed link graph, so scenario tests can assert
//! exact hook call counts without touching the network. Paths absent from
//! the map answer 404, including robots.txt unless a test adds one.

use std::collections::HashMap;
use webwalk::{FetchError, FetchResponse, UrlContext};

pub struct Site {
    pages: HashMap<String, String>,
}

impl Site {
    /// The standard fixture:
    ///
    /// ```text
    /// hosta/page1 -> page2, hostb/page1, hostc/page1
    /// hosta/page2 -> page1, page3
    /// hosta/page3 -> page2
    /// hosta/page4 -> page5, page1
    /// hosta/page5 -> page4, page2, page3
    /// hostb/page1 -> page2, page3          hostb/page2, page3, pageunlinked: leaves
    /// hostc/page1 -> page2, page3, hosta/page2
    /// hostc/page2, page3: leaves
    /// ```
    pub fn small() -> Self {
        let mut pages = HashMap::new();

        pages.insert(
            "hosta/page1.html".to_string(),
            page(
                "Page 1",
                &[
                    "page2.html",
                    "http://hostb/page1.html",
                    "http://hostc/page1.html",
                ],
            ),
        );
        pages.insert(
            "hosta/page2.html".to_string(),
            page("Page 2", &["page1.html", "page3.html"]),
        );
        pages.insert("hosta/page3.html".to_string(), page("Page 3", &["page2.html"]));
        pages.insert(
            "hosta/page4.html".to_string(),
            page("Page 4", &["page5.html", "page1.html"]),
        );
        pages.insert(
            "hosta/page5.html".to_string(),
            page("Page 5", &["page4.html", "page2.html", "page3.html"]),
        );

        pages.insert(
            "hostb/page1.html".to_string(),
            page("B1", &["page2.html", "page3.html"]),
        );
        pages.insert("hostb/page2.html".to_string(), page("B2", &[]));
        pages.insert("hostb/page3.html".to_string(), page("B3", &[]));
        pages.insert("hostb/pageunlinked.html".to_string(), page("B unlinked", &[]));

        pages.insert(
            "hostc/page1.html".to_string(),
            page(
                "C1",
                &["page2.html", "page3.html", "http://hosta/page2.html"],
            ),
        );
        pages.insert("hostc/page2.html".to_string(), page("C2", &[]));
        pages.insert("hostc/page3.html".to_string(), page("C3", &[]));

        Self { pages }
    }

    /// Adds or replaces a resource, e.g. a robots.txt.
    pub fn with_page(mut self, key: &str, body: &str) -> Self {
        self.pages.insert(key.to_string(), body.to_string());
        self
    }

    /// Serves a context from the map; unknown paths answer 404.
    pub fn fetch(
        &self,
        ctx: &UrlContext,
        _agent: &str,
        is_head: bool,
    ) -> Result<FetchResponse, FetchError> {
        let key = format!("{}{}", ctx.host(), ctx.url().path());
        match self.pages.get(&key) {
            Some(_) if is_head => Ok(FetchResponse::new(200)),
            Some(body) => Ok(FetchResponse::new(200).with_body(body.as_str())),
            None => Ok(FetchResponse::new(404)),
        }
    }
}

fn page(title: &str, hrefs: &[&str]) -> String {
    let mut body = format!("<html><head><title>{title}</title></head><body>\n");
    for href in hrefs {
        body.push_str(&format!("<a href=\"{href}\">{href}</a>\n"));
    }
    body.push_str("</body></html>\n");
    body
}
