//! Script-text API sniffing.
//!
//! Regex-scans JavaScript source — inline blocks and fetched external
//! bundles — for URL-shaped string literals, using a fixed, ordered battery
//! of named heuristics. Every match is resolved against the document URL and
//! classified into exactly one API category by a first-match-wins precedence
//! chain. A literal already present in the target category is dropped, so
//! the earliest detection of a URL is the one that sticks.

use crate::model::{ApiCandidate, ApiCategory, ApiCollection, DetectionMethod, ScriptPattern};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// The heuristic battery, in match order.
fn patterns() -> &'static [(ScriptPattern, Regex)] {
    static PATTERNS: OnceLock<Vec<(ScriptPattern, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let compile = |p: ScriptPattern, re: &str| (p, Regex::new(re).expect("valid regex"));
        vec![
            compile(ScriptPattern::Fetch, r#"fetch\(\s*['"]([^'"]+)['"]"#),
            compile(
                ScriptPattern::XhrOpen,
                r#"\.open\(\s*['"](?:GET|POST|PUT|DELETE)['"]\s*,\s*['"]([^'"]+)['"]"#,
            ),
            compile(
                ScriptPattern::Ajax,
                r#"\.ajax\(\s*\{\s*url\s*:\s*['"]([^'"]+)['"]"#,
            ),
            compile(
                ScriptPattern::Axios,
                r#"axios\.(?:get|post|put|delete)\(\s*['"]([^'"]+)['"]"#,
            ),
            compile(
                ScriptPattern::ApiUrlAssignment,
                r#"(?:api_url|apiUrl|API_URL|url|URL)['"]?\s*[=:]\s*['"]([^'"]+)['"]"#,
            ),
            compile(
                ScriptPattern::EndpointAssignment,
                r#"(?:endpoint|Endpoint|ENDPOINT)['"]?\s*[=:]\s*['"]([^'"]+)['"]"#,
            ),
            compile(
                ScriptPattern::ServiceUrlAssignment,
                r#"(?:service|serviceUrl|service_url)['"]?\s*[=:]\s*['"]([^'"]+)['"]"#,
            ),
            compile(
                ScriptPattern::GraphqlAssignment,
                r#"(?:graphql|GraphQL)['"]?\s*[=:]\s*['"]([^'"]+)['"]"#,
            ),
            compile(
                ScriptPattern::ProductAssignment,
                r#"(?:products|product|productId|productIds)['"]?\s*[=:]\s*['"]([^'"]+)['"]"#,
            ),
        ]
    })
}

fn version_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/v\d+/").expect("valid regex"))
}

/// Classify a matched literal into exactly one API category.
///
/// First matching rule wins; the originating heuristic only matters once the
/// literal itself is inconclusive.
pub fn classify_literal(literal: &str, pattern: ScriptPattern) -> ApiCategory {
    let lower = literal.to_ascii_lowercase();
    if lower.contains("product") || lower.contains("sku") || lower.contains("catalog") {
        ApiCategory::Products
    } else if lower.contains("json") || lower.contains("api") {
        ApiCategory::Json
    } else if literal.contains("/api/")
        || literal.contains("/rest/")
        || version_path_re().is_match(literal)
    {
        ApiCategory::Rest
    } else if lower.contains("/graphql") || lower.contains("/gql") {
        ApiCategory::Graphql
    } else if pattern == ScriptPattern::Fetch {
        ApiCategory::Fetch
    } else if pattern == ScriptPattern::ProductAssignment {
        ApiCategory::Products
    } else {
        ApiCategory::Xhr
    }
}

/// Scan one block of script text and insert every new candidate found.
///
/// `source_script` names the external script URL when the text was fetched
/// rather than inline. Returns how many candidates were newly inserted.
pub fn scan_script(
    js: &str,
    base: &Url,
    source_script: Option<&str>,
    apis: &mut ApiCollection,
) -> usize {
    let mut inserted = 0;
    for (pattern, re) in patterns() {
        for cap in re.captures_iter(js) {
            let literal = &cap[1];
            let Ok(resolved) = base.join(literal) else {
                continue;
            };
            let category = classify_literal(literal, *pattern);
            let candidate = ApiCandidate {
                url: resolved,
                category,
                detection: DetectionMethod::ScriptPattern(*pattern),
                source_script: source_script.map(|s| s.to_string()),
                analyzed: false,
                measurement: None,
            };
            if apis.insert(candidate) {
                inserted += 1;
            }
        }
    }
    inserted
}
