//! Default HTTP transport for the fetch hook.
//!
//! One lazily-built `reqwest` client is shared by every crawl in the
//! process; the user agent varies per request because page fetches and
//! robots.txt fetches identify themselves differently.

use crate::extender::FetchResponse;
use crate::FetchError;
use reqwest::header;
use reqwest::{Client, Response};
use std::sync::OnceLock;
use std::time::Duration;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the HTTP client used by the default fetch hook.
pub fn build_http_client() -> reqwest::Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .gzip(true)
        .build()
}

fn shared_client() -> Result<&'static Client, FetchError> {
    static CLIENT: OnceLock<reqwest::Result<Client>> = OnceLock::new();
    CLIENT
        .get_or_init(build_http_client)
        .as_ref()
        .map_err(|e| FetchError::Client(e.to_string()))
}

/// Performs one HEAD or GET against `url` with the given user agent.
///
/// Transport-level redirects are followed by the client (up to its default
/// hop limit); the response carries the final URL. The body is read
/// eagerly so the returned [`FetchResponse`] is self-contained.
///
/// # Arguments
///
/// * `url` - The target URL
/// * `agent` - Value for the `User-Agent` header
/// * `is_head` - Issue a HEAD instead of a GET
///
/// # Returns
///
/// * `Ok(FetchResponse)` - A response was received (any status)
/// * `Err(FetchError)` - The transport failed or the body could not be read
pub async fn fetch(url: &Url, agent: &str, is_head: bool) -> Result<FetchResponse, FetchError> {
    let client = shared_client()?;

    let request = if is_head {
        client.head(url.clone())
    } else {
        client.get(url.clone())
    };

    let response = request.header(header::USER_AGENT, agent).send().await?;
    read_response(response, is_head).await
}

async fn read_response(response: Response, is_head: bool) -> Result<FetchResponse, FetchError> {
    let status = response.status().as_u16();
    let final_url = response.url().clone();
    let headers = response.headers().clone();

    let body = if is_head {
        Vec::new()
    } else {
        response.bytes().await.map_err(FetchError::Body)?.to_vec()
    };

    Ok(FetchResponse {
        status,
        headers,
        body,
        final_url: Some(final_url),
    })
}
