//! Path-shape classification of already-extracted resource URLs.
//!
//! Scripts are not the only place endpoints hide: an API URL often sits in
//! the page as an ordinary resource link. This pass re-scans every extracted
//! resource URL against a second battery of path-shape patterns, independent
//! of script content.

use crate::model::{ApiCandidate, ApiCategory, ApiCollection, DetectionMethod, ResourceSet};
use regex::Regex;
use std::sync::OnceLock;

/// One alternation of every path shape that suggests an API:
/// a `.json` suffix, api/rest/graphql/data/service roots, versioned path
/// segments, product and catalog segments in two languages, PHP scripts with
/// a query string, and camel-case get/fetch/search/query verb prefixes.
fn api_shape_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\.json($|\?)|/api/|/rest/|/graphql|/v\d+/|/product(?:s|os)?/|/catalog(?:o)?/|/data/|/services?/|/[^/]+\.php\?|/(?:get|fetch|search|query)[A-Z]",
        )
        .expect("valid regex")
    })
}

/// Classify a URL that already matched the API shape battery.
pub fn classify_url(url: &str) -> ApiCategory {
    let lower = url.to_ascii_lowercase();
    if lower.contains("graphql") {
        ApiCategory::Graphql
    } else if lower.contains("product") || lower.contains("produto") || lower.contains("catalog") {
        ApiCategory::Products
    } else if lower.contains(".json") {
        ApiCategory::Json
    } else {
        ApiCategory::Rest
    }
}

/// Scan every resource URL and insert the API-shaped ones as candidates.
/// Returns how many candidates were newly inserted.
pub fn classify_resources(resources: &ResourceSet, apis: &mut ApiCollection) -> usize {
    let mut inserted = 0;
    for resource in resources.iter() {
        let url_str = resource.url.as_str();
        if !api_shape_re().is_match(url_str) {
            continue;
        }
        let candidate = ApiCandidate {
            url: resource.url.clone(),
            category: classify_url(url_str),
            detection: DetectionMethod::UrlShape,
            source_script: None,
            analyzed: false,
            measurement: None,
        };
        if apis.insert(candidate) {
            inserted += 1;
        }
    }
    inserted
}
