//! Async HTTP fetcher wrapping reqwest.
//!
//! Not a browser — just measured HTTP requests. Redirects are followed
//! manually (the underlying client has redirects disabled) so every response
//! carries its hop count and probes can opt out of following entirely. Every
//! request is timed: time-to-first-byte is the span until the final hop's
//! headers arrive, elapsed is the span until the body is fully read.

use reqwest::header::{HeaderMap, ACCEPT, LOCATION};
use reqwest::Method;
use std::time::{Duration, Instant};
use url::Url;

/// Maximum redirect hops followed before the 3xx response is returned as-is.
const MAX_REDIRECTS: u32 = 5;

/// A completed, timed HTTP response.
#[derive(Debug, Clone)]
pub struct MeasuredResponse {
    /// Originally requested URL.
    pub url: Url,
    /// URL of the final hop.
    pub final_url: Url,
    pub status: u16,
    pub headers: HeaderMap,
    /// Response body; `None` for HEAD requests.
    pub body: Option<Vec<u8>>,
    /// Time until the final hop's status and headers were received.
    pub ttfb: Duration,
    /// Total time including reading the body.
    pub elapsed: Duration,
    /// Number of redirects followed.
    pub redirects: u32,
}

impl MeasuredResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Raw content-type header value, as sent by the server.
    pub fn content_type(&self) -> Option<String> {
        self.headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }

    /// Media type: the content-type with any parameters stripped, lowercased.
    pub fn media_type(&self) -> String {
        self.content_type()
            .map(|ct| {
                ct.split(';')
                    .next()
                    .unwrap_or("")
                    .trim()
                    .to_ascii_lowercase()
            })
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Declared content-length, if the server sent one.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok())
    }

    pub fn body_len(&self) -> u64 {
        self.body.as_ref().map(|b| b.len() as u64).unwrap_or(0)
    }
}

/// HTTP client for the discovery engine.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    /// Create a client with the given user agent. Redirect handling is
    /// manual, so the builder policy is `none`.
    pub fn new(user_agent: &str) -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(user_agent)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// HEAD request, following redirects.
    pub async fn head(
        &self,
        url: &Url,
        timeout: Duration,
        api_mode: bool,
    ) -> reqwest::Result<MeasuredResponse> {
        self.execute(Method::HEAD, url, timeout, api_mode, true).await
    }

    /// GET request, following redirects and reading the full body.
    pub async fn get(
        &self,
        url: &Url,
        timeout: Duration,
        api_mode: bool,
    ) -> reqwest::Result<MeasuredResponse> {
        self.execute(Method::GET, url, timeout, api_mode, true).await
    }

    /// GET request that does not follow redirects. Used by the endpoint
    /// prober, where a 3xx answer is itself the signal.
    pub async fn get_no_redirect(
        &self,
        url: &Url,
        timeout: Duration,
    ) -> reqwest::Result<MeasuredResponse> {
        self.execute(Method::GET, url, timeout, false, false).await
    }

    async fn execute(
        &self,
        method: Method,
        url: &Url,
        timeout: Duration,
        api_mode: bool,
        follow_redirects: bool,
    ) -> reqwest::Result<MeasuredResponse> {
        let start = Instant::now();
        let mut current = url.clone();
        let mut hops = 0u32;

        loop {
            let mut request = self
                .client
                .request(method.clone(), current.clone())
                .timeout(timeout);
            if api_mode {
                request = request
                    .header(ACCEPT, "application/json, application/xml, */*")
                    .header("x-requested-with", "XMLHttpRequest");
            }

            let resp = request.send().await?;
            let status = resp.status();

            if follow_redirects && status.is_redirection() && hops < MAX_REDIRECTS {
                let next = resp
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|loc| current.join(loc).ok());
                if let Some(next) = next {
                    hops += 1;
                    current = next;
                    continue;
                }
                // Redirect without a resolvable location: treat as final.
            }

            let ttfb = start.elapsed();
            let headers = resp.headers().clone();
            let final_url = resp.url().clone();
            let body = if method == Method::HEAD {
                None
            } else {
                Some(resp.bytes().await?.to_vec())
            };
            let elapsed = start.elapsed();

            return Ok(MeasuredResponse {
                url: url.clone(),
                final_url,
                status: status.as_u16(),
                headers,
                body,
                ttfb,
                elapsed,
                redirects: hops,
            });
        }
    }
}
