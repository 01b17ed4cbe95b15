//! Read-side aggregate views over a completed analysis.
//!
//! Everything here is a pure computation over an [`AnalysisResult`] — no
//! network I/O. The summary feeds chart/HTML-rendering collaborators; the
//! row formats are the tabular/CSV-style projection per item.

use crate::analysis::AnalysisResult;
use crate::model::{ApiCategory, ElementCategory, JsonShape, Measurement};
use crate::stats::TimingSummary;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Entries kept in the slowest/largest rankings.
pub const RANKING_SIZE: usize = 10;

/// Load-time threshold above which a resource counts as slow.
const SLOW_THRESHOLD: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Serialize)]
pub struct StatusCount {
    pub status: u16,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentTypeCount {
    pub content_type: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormatCount {
    pub format: String,
    pub count: u64,
}

/// Per-element-category totals, with category-specific extras.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryStats {
    pub category: ElementCategory,
    pub count: usize,
    pub total_size_bytes: u64,
    pub avg_load_time_s: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_formats: Option<Vec<FormatCount>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images_missing_alt: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub async_scripts: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defer_scripts: Option<usize>,
}

/// Per-API-category totals over analyzed candidates.
#[derive(Debug, Clone, Serialize)]
pub struct ApiCategoryStats {
    pub category: ApiCategory,
    pub count: usize,
    pub avg_load_time_s: f64,
}

/// One entry of the slowest/largest rankings.
#[derive(Debug, Clone, Serialize)]
pub struct RankedResource {
    pub category: ElementCategory,
    pub url: String,
    pub load_time_s: f64,
    pub size_bytes: u64,
    pub status: u16,
}

/// Structured summary of a whole run, for rendering collaborators.
#[derive(Debug, Clone, Serialize)]
pub struct SiteSummary {
    pub url: String,
    pub domain: String,
    pub generated_at: DateTime<Utc>,
    pub total_time_s: f64,
    pub total_resources: usize,
    pub total_apis_analyzed: usize,
    /// Page bytes plus every measured resource's bytes.
    pub total_size_bytes: u64,
    pub total_requests: u64,
    pub failed_requests: u64,
    pub response_times: TimingSummary,
    /// Ascending by status code.
    pub status_codes: Vec<StatusCount>,
    /// Descending by count.
    pub content_types: Vec<ContentTypeCount>,
    /// Non-empty element categories, in category order.
    pub categories: Vec<CategoryStats>,
    /// Non-empty API categories, analyzed candidates only.
    pub api_categories: Vec<ApiCategoryStats>,
    pub slowest: Vec<RankedResource>,
    pub largest: Vec<RankedResource>,
    /// Fraction of resources whose cache-control carries a max-age directive.
    pub cache_coverage: f64,
    /// Fraction of resources with a real content-encoding.
    pub compression_coverage: f64,
    /// Resources slower than half a second.
    pub slow_resources: usize,
}

/// Compute the structured summary for one completed run.
pub fn summary(result: &AnalysisResult) -> SiteSummary {
    let total_resources = result.resources.len();

    let total_size_bytes = result.page_size
        + result
            .resources
            .iter()
            .filter_map(|r| r.measurement.as_ref())
            .map(|m| m.size)
            .sum::<u64>();

    let status_codes = result
        .stats
        .status_codes
        .iter()
        .map(|(&status, &count)| StatusCount { status, count })
        .collect();

    let mut content_types: Vec<ContentTypeCount> = result
        .stats
        .content_types
        .iter()
        .map(|(ct, &count)| ContentTypeCount {
            content_type: ct.clone(),
            count,
        })
        .collect();
    content_types.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.content_type.cmp(&b.content_type))
    });

    let categories = ElementCategory::ALL
        .iter()
        .filter_map(|&category| category_stats(result, category))
        .collect();

    let api_categories = ApiCategory::ALL
        .iter()
        .filter_map(|&category| {
            let analyzed: Vec<&Measurement> = result
                .apis
                .category(category)
                .iter()
                .filter(|c| c.analyzed)
                .filter_map(|c| c.measurement.as_ref())
                .collect();
            if analyzed.is_empty() {
                return None;
            }
            let total: f64 = analyzed.iter().map(|m| m.load_time.as_secs_f64()).sum();
            Some(ApiCategoryStats {
                category,
                count: analyzed.len(),
                avg_load_time_s: total / analyzed.len() as f64,
            })
        })
        .collect();

    let mut ranked: Vec<RankedResource> = result
        .resources
        .iter()
        .filter_map(|r| {
            let m = r.measurement.as_ref()?;
            Some(RankedResource {
                category: r.category,
                url: r.url.as_str().to_string(),
                load_time_s: m.load_time.as_secs_f64(),
                size_bytes: m.size,
                status: m.status,
            })
        })
        .collect();

    let mut slowest = ranked.clone();
    slowest.sort_by(|a, b| {
        b.load_time_s
            .partial_cmp(&a.load_time_s)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    slowest.truncate(RANKING_SIZE);

    ranked.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
    ranked.truncate(RANKING_SIZE);

    let cached = result
        .resources
        .iter()
        .filter_map(|r| r.measurement.as_ref())
        .filter(|m| {
            m.headers
                .cache_control
                .as_deref()
                .is_some_and(|cc| cc.contains("max-age"))
        })
        .count();
    let compressed = result
        .resources
        .iter()
        .filter_map(|r| r.measurement.as_ref())
        .filter(|m| {
            m.headers
                .content_encoding
                .as_deref()
                .is_some_and(|enc| !enc.is_empty() && enc != "none")
        })
        .count();
    let coverage = |n: usize| {
        if total_resources == 0 {
            0.0
        } else {
            n as f64 / total_resources as f64
        }
    };

    let slow_resources = result
        .resources
        .iter()
        .filter_map(|r| r.measurement.as_ref())
        .filter(|m| m.load_time > SLOW_THRESHOLD)
        .count();

    SiteSummary {
        url: result.url.as_str().to_string(),
        domain: result.url.host_str().unwrap_or_default().to_string(),
        generated_at: result.started_at,
        total_time_s: result.total_time.as_secs_f64(),
        total_resources,
        total_apis_analyzed: result.apis.analyzed_count(),
        total_size_bytes,
        total_requests: result.stats.total_requests,
        failed_requests: result.stats.failed_requests,
        response_times: result.stats.timing(),
        status_codes,
        content_types,
        categories,
        api_categories,
        slowest,
        largest: ranked,
        cache_coverage: coverage(cached),
        compression_coverage: coverage(compressed),
        slow_resources,
    }
}

fn category_stats(result: &AnalysisResult, category: ElementCategory) -> Option<CategoryStats> {
    let items = result.resources.category(category);
    if items.is_empty() {
        return None;
    }
    let total_size_bytes: u64 = items
        .iter()
        .filter_map(|r| r.measurement.as_ref())
        .map(|m| m.size)
        .sum();
    let total_time: f64 = items
        .iter()
        .filter_map(|r| r.measurement.as_ref())
        .map(|m| m.load_time.as_secs_f64())
        .sum();

    let mut stats = CategoryStats {
        category,
        count: items.len(),
        total_size_bytes,
        avg_load_time_s: total_time / items.len() as f64,
        image_formats: None,
        images_missing_alt: None,
        async_scripts: None,
        defer_scripts: None,
    };

    match category {
        ElementCategory::Image => {
            let mut formats: HashMap<String, u64> = HashMap::new();
            for r in items {
                let format = r
                    .measurement
                    .as_ref()
                    .and_then(|m| m.image.as_ref())
                    .map(|i| i.format.clone())
                    .unwrap_or_else(|| "Unknown".to_string());
                *formats.entry(format).or_insert(0) += 1;
            }
            let mut formats: Vec<FormatCount> = formats
                .into_iter()
                .map(|(format, count)| FormatCount { format, count })
                .collect();
            formats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.format.cmp(&b.format)));
            stats.image_formats = Some(formats);
            stats.images_missing_alt = Some(
                items
                    .iter()
                    .filter(|r| {
                        r.meta
                            .alt_text
                            .as_deref()
                            .map(str::trim)
                            .filter(|alt| !alt.is_empty())
                            .is_none()
                    })
                    .count(),
            );
        }
        ElementCategory::Script => {
            stats.async_scripts = Some(items.iter().filter(|r| r.meta.is_async).count());
            stats.defer_scripts = Some(items.iter().filter(|r| r.meta.is_defer).count());
        }
        _ => {}
    }

    Some(stats)
}

/// Tabular projection of one resource.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceRow {
    pub category: ElementCategory,
    pub url: String,
    pub size_bytes: u64,
    pub load_time_ms: f64,
    pub ttfb_ms: f64,
    pub status: u16,
    pub redirects: u32,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub content_encoding: Option<String>,
    pub alt_text: Option<String>,
    pub is_async: bool,
    pub is_defer: bool,
    pub media: Option<String>,
    pub image_format: Option<String>,
    pub error: Option<String>,
}

/// Tabular projection of one analyzed API candidate.
#[derive(Debug, Clone, Serialize)]
pub struct ApiRow {
    pub category: ApiCategory,
    pub url: String,
    pub detection: String,
    pub source_script: Option<String>,
    pub size_bytes: u64,
    pub load_time_ms: f64,
    pub ttfb_ms: f64,
    pub status: u16,
    pub redirects: u32,
    pub content_type: Option<String>,
    pub is_json: Option<bool>,
    pub json_structure: Option<String>,
    pub json_keys: Option<String>,
    pub json_length: Option<usize>,
    pub cache_control: Option<String>,
    pub server: Option<String>,
    pub access_control_allow_origin: Option<String>,
    pub error: Option<String>,
}

fn ms(d: Duration) -> f64 {
    (d.as_secs_f64() * 100_000.0).round() / 100.0
}

/// Row per resource, measured or not, in category order.
pub fn resource_rows(result: &AnalysisResult) -> Vec<ResourceRow> {
    result
        .resources
        .iter()
        .map(|r| {
            let m = r.measurement.as_ref();
            ResourceRow {
                category: r.category,
                url: r.url.as_str().to_string(),
                size_bytes: m.map(|m| m.size).unwrap_or(0),
                load_time_ms: m.map(|m| ms(m.load_time)).unwrap_or(0.0),
                ttfb_ms: m.map(|m| ms(m.ttfb)).unwrap_or(0.0),
                status: m.map(|m| m.status).unwrap_or(0),
                redirects: m.map(|m| m.redirects).unwrap_or(0),
                content_type: m.and_then(|m| m.content_type.clone()),
                cache_control: m.and_then(|m| m.headers.cache_control.clone()),
                content_encoding: m.and_then(|m| m.headers.content_encoding.clone()),
                alt_text: r.meta.alt_text.clone(),
                is_async: r.meta.is_async,
                is_defer: r.meta.is_defer,
                media: r.meta.media.clone(),
                image_format: m.and_then(|m| m.image.as_ref()).map(|i| i.format.clone()),
                error: m.and_then(|m| m.error.clone()),
            }
        })
        .collect()
}

/// Row per analyzed API candidate, in category order.
pub fn api_rows(result: &AnalysisResult) -> Vec<ApiRow> {
    result
        .apis
        .iter()
        .filter(|c| c.analyzed)
        .map(|c| {
            let m = c.measurement.as_ref();
            let (json_structure, json_keys, json_length) = match m.map(|m| &m.json) {
                Some(JsonShape::Object { keys }) => (
                    Some("object".to_string()),
                    Some(keys.join(", ")),
                    None,
                ),
                Some(JsonShape::Array { len }) => {
                    (Some("array".to_string()), None, Some(*len))
                }
                Some(JsonShape::Scalar) => (Some("scalar".to_string()), None, None),
                _ => (None, None, None),
            };
            ApiRow {
                category: c.category,
                url: c.url.as_str().to_string(),
                detection: c.detection.label(),
                source_script: c.source_script.clone(),
                size_bytes: m.map(|m| m.size).unwrap_or(0),
                load_time_ms: m.map(|m| ms(m.load_time)).unwrap_or(0.0),
                ttfb_ms: m.map(|m| ms(m.ttfb)).unwrap_or(0.0),
                status: m.map(|m| m.status).unwrap_or(0),
                redirects: m.map(|m| m.redirects).unwrap_or(0),
                content_type: m.and_then(|m| m.content_type.clone()),
                is_json: m.and_then(|m| m.json.is_json()),
                json_structure,
                json_keys,
                json_length,
                cache_control: m.and_then(|m| m.headers.cache_control.clone()),
                server: m.and_then(|m| m.headers.server.clone()),
                access_control_allow_origin: m
                    .and_then(|m| m.headers.access_control_allow_origin.clone()),
                error: m.and_then(|m| m.error.clone()),
            }
        })
        .collect()
}
