//! Speculative probing of well-known API paths.
//!
//! Some backends are never referenced in the page or its scripts. This pass
//! requests a fixed list of well-known relative paths against the site root,
//! without following redirects. Most probes will 404 or fail outright —
//! that is expected noise, surfaced as a typed outcome and never as an error.

use crate::analysis::CancelToken;
use crate::client::HttpClient;
use crate::model::{ApiCandidate, ApiCategory, ApiCollection, DetectionMethod, JsonShape, Measurement};
use crate::stats::{self, FetchRecord, SharedStats};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Well-known relative paths: generic and versioned API roots, REST/GraphQL/
/// data/service roots, the WordPress REST root, and catalog/product/showcase
/// paths in English and Portuguese.
pub const WELL_KNOWN_PATHS: &[&str] = &[
    "/api",
    "/api/v1",
    "/api/v2",
    "/v1",
    "/v2",
    "/rest",
    "/graphql",
    "/data",
    "/service",
    "/services",
    "/wp-json",
    "/produtos",
    "/products",
    "/product",
    "/catalog",
    "/catalogo",
    "/vitrine",
    "/showcase",
];

/// What one probe found.
#[derive(Debug)]
pub enum ProbeOutcome {
    /// The path answered like an API; carries the fully measured candidate.
    Confirmed(Box<ApiCandidate>),
    /// The path answered, but not like an API.
    NotPresent,
    /// The request itself failed.
    NetworkError(String),
}

/// Probe one URL and decide whether it hosts an API.
///
/// A probe confirms when the declared content type is JSON or XML, or when
/// the status is success and the body parses as JSON.
pub async fn probe_one(
    client: &HttpClient,
    http_stats: &SharedStats,
    url: &Url,
    timeout: Duration,
) -> ProbeOutcome {
    let resp = match client.get_no_redirect(url, timeout).await {
        Ok(resp) => resp,
        Err(e) => {
            stats::record(http_stats, &FetchRecord::Failure);
            return ProbeOutcome::NetworkError(e.to_string());
        }
    };
    stats::record(http_stats, &FetchRecord::from_response(&resp));

    let content_type = resp.content_type().unwrap_or_default().to_ascii_lowercase();
    let declared_api =
        content_type.contains("application/json") || content_type.contains("application/xml");
    let parsed = resp
        .body
        .as_deref()
        .and_then(|b| serde_json::from_slice::<serde_json::Value>(b).ok());

    if !declared_api && !(resp.is_success() && parsed.is_some()) {
        return ProbeOutcome::NotPresent;
    }

    let category = if content_type.contains("json") {
        ApiCategory::Rest
    } else {
        ApiCategory::Xhr
    };
    let mut measurement = Measurement::from_response(&resp, resp.body_len());
    measurement.json = parsed
        .as_ref()
        .map(JsonShape::of_value)
        .unwrap_or(JsonShape::NotJson);

    ProbeOutcome::Confirmed(Box::new(ApiCandidate {
        url: url.clone(),
        category,
        detection: DetectionMethod::WellKnownPath,
        source_script: None,
        analyzed: true,
        measurement: Some(measurement),
    }))
}

/// Probe every well-known path and insert the confirmed candidates.
/// Returns how many candidates were newly inserted.
pub async fn probe_well_known(
    client: &HttpClient,
    http_stats: &SharedStats,
    site: &Url,
    timeout: Duration,
    apis: &mut ApiCollection,
    cancel: &CancelToken,
) -> usize {
    let mut inserted = 0;
    for path in WELL_KNOWN_PATHS {
        if cancel.is_cancelled() {
            break;
        }
        let Ok(url) = site.join(path) else { continue };
        match probe_one(client, http_stats, &url, timeout).await {
            ProbeOutcome::Confirmed(candidate) => {
                if apis.insert(*candidate) {
                    inserted += 1;
                }
            }
            ProbeOutcome::NotPresent => {}
            ProbeOutcome::NetworkError(e) => {
                debug!("probe {url} failed: {e}");
            }
        }
    }
    inserted
}
