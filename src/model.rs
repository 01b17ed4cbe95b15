//! Core data types for discovered resources, API candidates, and their
//! transport measurements.
//!
//! Element and API categories are closed enums rather than free-form strings,
//! and the per-category collections keep a URL index so duplicate detections
//! are dropped in O(1) instead of scanning the bucket.

use crate::client::MeasuredResponse;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

/// Category of a page sub-resource, by the structural pattern that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementCategory {
    Image,
    Stylesheet,
    Script,
    Font,
    Video,
    Other,
}

impl ElementCategory {
    pub const COUNT: usize = 6;

    /// All categories in report order.
    pub const ALL: [ElementCategory; Self::COUNT] = [
        Self::Image,
        Self::Stylesheet,
        Self::Script,
        Self::Font,
        Self::Video,
        Self::Other,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Image => 0,
            Self::Stylesheet => 1,
            Self::Script => 2,
            Self::Font => 3,
            Self::Video => 4,
            Self::Other => 5,
        }
    }

    /// Short label used in tabular output.
    pub fn label(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Stylesheet => "css",
            Self::Script => "js",
            Self::Font => "font",
            Self::Video => "video",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ElementCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Category of a suspected programmatic endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiCategory {
    /// Ajax-style request (the default classification).
    Xhr,
    /// Fetch-style call.
    Fetch,
    /// JSON document endpoint.
    Json,
    /// REST resource.
    Rest,
    /// Product-catalog resource.
    Products,
    /// GraphQL endpoint.
    Graphql,
}

impl ApiCategory {
    pub const COUNT: usize = 6;

    pub const ALL: [ApiCategory; Self::COUNT] = [
        Self::Xhr,
        Self::Fetch,
        Self::Json,
        Self::Rest,
        Self::Products,
        Self::Graphql,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Xhr => 0,
            Self::Fetch => 1,
            Self::Json => 2,
            Self::Rest => 3,
            Self::Products => 4,
            Self::Graphql => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Xhr => "xhr",
            Self::Fetch => "fetch",
            Self::Json => "json",
            Self::Rest => "rest",
            Self::Products => "products",
            Self::Graphql => "graphql",
        }
    }
}

impl std::fmt::Display for ApiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Named textual heuristic that surfaced an API candidate from script source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptPattern {
    Fetch,
    XhrOpen,
    Ajax,
    Axios,
    ApiUrlAssignment,
    EndpointAssignment,
    ServiceUrlAssignment,
    GraphqlAssignment,
    ProductAssignment,
}

impl ScriptPattern {
    pub fn label(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::XhrOpen => "xhr-open",
            Self::Ajax => "ajax",
            Self::Axios => "axios",
            Self::ApiUrlAssignment => "api-url-assignment",
            Self::EndpointAssignment => "endpoint-assignment",
            Self::ServiceUrlAssignment => "service-url-assignment",
            Self::GraphqlAssignment => "graphql-assignment",
            Self::ProductAssignment => "product-assignment",
        }
    }
}

/// How an API candidate was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// One of the script-text heuristics matched.
    ScriptPattern(ScriptPattern),
    /// An already-extracted resource URL matched a path-shape pattern.
    UrlShape,
    /// A well-known relative path answered like an API.
    WellKnownPath,
    /// The fetched body parsed as product-shaped JSON.
    JsonBody,
}

impl DetectionMethod {
    pub fn label(self) -> String {
        match self {
            Self::ScriptPattern(p) => format!("script:{}", p.label()),
            Self::UrlShape => "url-shape".to_string(),
            Self::WellKnownPath => "well-known-path".to_string(),
            Self::JsonBody => "json-body".to_string(),
        }
    }
}

/// Element-level metadata captured at extraction time.
///
/// Which fields are populated depends on the element category; everything
/// else stays at its default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementMeta {
    pub alt_text: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub loading: Option<String>,
    pub media: Option<String>,
    pub integrity: Option<String>,
    pub is_async: bool,
    pub is_defer: bool,
    pub mime_hint: Option<String>,
    /// The reference came from an `@import` rule inside an inline style block.
    pub style_import: bool,
}

/// One reference discovered in the document.
///
/// `measurement == None` means the resource has not been analyzed yet.
#[derive(Debug, Clone)]
pub struct Resource {
    pub url: Url,
    pub category: ElementCategory,
    pub meta: ElementMeta,
    pub measurement: Option<Measurement>,
}

impl Resource {
    pub fn new(url: Url, category: ElementCategory, meta: ElementMeta) -> Self {
        Self {
            url,
            category,
            meta,
            measurement: None,
        }
    }
}

/// A URL suspected of being a programmatic endpoint.
#[derive(Debug, Clone)]
pub struct ApiCandidate {
    pub url: Url,
    pub category: ApiCategory,
    pub detection: DetectionMethod,
    /// URL of the external script the candidate was sniffed from, if any.
    pub source_script: Option<String>,
    pub analyzed: bool,
    pub measurement: Option<Measurement>,
}

/// Structural shape of a JSON body, if one was inspected.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum JsonShape {
    /// The body was never inspected as JSON.
    #[default]
    NotChecked,
    /// Inspection was attempted but the body did not parse as JSON.
    NotJson,
    /// Top-level object; carries up to the first ten key names.
    Object { keys: Vec<String> },
    /// Top-level array; carries the element count.
    Array { len: usize },
    /// Valid JSON but a bare scalar (string, number, bool, null).
    Scalar,
}

impl JsonShape {
    /// Number of top-level keys retained for an object shape.
    pub const MAX_KEYS: usize = 10;

    /// Summarize a parsed JSON value.
    pub fn of_value(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => Self::Object {
                keys: map.keys().take(Self::MAX_KEYS).cloned().collect(),
            },
            serde_json::Value::Array(items) => Self::Array { len: items.len() },
            _ => Self::Scalar,
        }
    }

    /// Whether the body parsed as JSON, if inspection happened at all.
    pub fn is_json(&self) -> Option<bool> {
        match self {
            Self::NotChecked => None,
            Self::NotJson => Some(false),
            Self::Object { .. } | Self::Array { .. } | Self::Scalar => Some(true),
        }
    }
}

/// Approximate distinct-color count of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorCount {
    Exact(u32),
    /// Counting stopped at the cap; the true count is open-ended beyond it.
    AtLeast(u32),
}

/// Cap on distinct-color counting during image inspection.
pub const MAX_COLOR_COUNT: u32 = 65_536;

/// Pixel-level facts recovered by decoding an image body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub color_mode: String,
    pub colors: ColorCount,
    pub aspect_ratio: f64,
}

impl ImageInfo {
    /// Decode an image body and measure it.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, image::ImageError> {
        let format = image::guess_format(bytes)
            .map(|f| format!("{f:?}"))
            .unwrap_or_else(|_| "Unknown".to_string());
        let img = image::load_from_memory(bytes)?;
        let color_mode = format!("{:?}", img.color());
        let (width, height) = (img.width(), img.height());

        let rgba = img.to_rgba8();
        let mut seen: HashSet<[u8; 4]> = HashSet::new();
        let mut capped = false;
        for pixel in rgba.pixels() {
            seen.insert(pixel.0);
            if seen.len() as u32 > MAX_COLOR_COUNT {
                capped = true;
                break;
            }
        }
        let colors = if capped {
            ColorCount::AtLeast(MAX_COLOR_COUNT)
        } else {
            ColorCount::Exact(seen.len() as u32)
        };

        let aspect_ratio = if height > 0 {
            (f64::from(width) / f64::from(height) * 100.0).round() / 100.0
        } else {
            0.0
        };

        Ok(Self {
            width,
            height,
            format,
            color_mode,
            colors,
            aspect_ratio,
        })
    }
}

/// Header-derived fields kept for every measured item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderInfo {
    pub server: Option<String>,
    pub cache_control: Option<String>,
    pub etag: Option<String>,
    pub expires: Option<String>,
    pub last_modified: Option<String>,
    pub content_encoding: Option<String>,
    pub access_control_allow_origin: Option<String>,
    pub x_content_type_options: Option<String>,
    pub strict_transport_security: Option<String>,
    pub connection: Option<String>,
}

impl HeaderInfo {
    pub fn from_headers(headers: &reqwest::header::HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        };
        Self {
            server: get("server"),
            cache_control: get("cache-control"),
            etag: get("etag"),
            expires: get("expires"),
            last_modified: get("last-modified"),
            content_encoding: get("content-encoding"),
            access_control_allow_origin: get("access-control-allow-origin"),
            x_content_type_options: get("x-content-type-options"),
            strict_transport_security: get("strict-transport-security"),
            connection: get("connection"),
        }
    }
}

/// Transport measurement of one fetched item.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub size: u64,
    pub load_time: Duration,
    pub ttfb: Duration,
    pub status: u16,
    pub redirects: u32,
    pub content_type: Option<String>,
    pub headers: HeaderInfo,
    pub json: JsonShape,
    pub image: Option<ImageInfo>,
    /// Image decode failed; the rest of the measurement stands.
    pub image_error: Option<String>,
    /// The fetch itself failed; all transport fields are zeroed.
    pub error: Option<String>,
}

impl Measurement {
    /// Measurement of a fetch that never completed.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            size: 0,
            load_time: Duration::ZERO,
            ttfb: Duration::ZERO,
            status: 0,
            redirects: 0,
            content_type: None,
            headers: HeaderInfo::default(),
            json: JsonShape::NotChecked,
            image: None,
            image_error: None,
            error: Some(error.into()),
        }
    }

    /// Measurement seeded from a completed response; body-derived fields are
    /// filled in by the caller.
    pub fn from_response(resp: &MeasuredResponse, size: u64) -> Self {
        Self {
            size,
            load_time: resp.elapsed,
            ttfb: resp.ttfb,
            status: resp.status,
            redirects: resp.redirects,
            content_type: resp.content_type(),
            headers: HeaderInfo::from_headers(&resp.headers),
            json: JsonShape::NotChecked,
            image: None,
            image_error: None,
            error: None,
        }
    }
}

/// Per-category store of discovered resources.
///
/// Insertion order is preserved within a category; iteration visits
/// categories in `ElementCategory::ALL` order. A URL may appear in more than
/// one category but never twice in the same one.
#[derive(Debug, Default, Clone)]
pub struct ResourceSet {
    buckets: [Vec<Resource>; ElementCategory::COUNT],
    seen: [HashSet<String>; ElementCategory::COUNT],
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resource unless its URL is already present in the category.
    /// Returns whether it was inserted.
    pub fn push(&mut self, resource: Resource) -> bool {
        let idx = resource.category.index();
        if !self.seen[idx].insert(resource.url.as_str().to_string()) {
            return false;
        }
        self.buckets[idx].push(resource);
        true
    }

    pub fn category(&self, category: ElementCategory) -> &[Resource] {
        &self.buckets[category.index()]
    }

    pub fn category_mut(&mut self, category: ElementCategory) -> &mut Vec<Resource> {
        &mut self.buckets[category.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.buckets.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-category store of API candidates with O(1) duplicate detection.
///
/// Categories are independent sets, not a partition: the same URL may live
/// under several categories, but a second detection within one category is
/// silently dropped.
#[derive(Debug, Default, Clone)]
pub struct ApiCollection {
    buckets: [Vec<ApiCandidate>; ApiCategory::COUNT],
    seen: [HashSet<String>; ApiCategory::COUNT],
}

impl ApiCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a candidate unless its URL already exists in the category.
    /// Returns whether it was inserted.
    pub fn insert(&mut self, candidate: ApiCandidate) -> bool {
        let idx = candidate.category.index();
        if !self.seen[idx].insert(candidate.url.as_str().to_string()) {
            return false;
        }
        self.buckets[idx].push(candidate);
        true
    }

    pub fn contains(&self, category: ApiCategory, url: &Url) -> bool {
        self.seen[category.index()].contains(url.as_str())
    }

    pub fn category(&self, category: ApiCategory) -> &[ApiCandidate] {
        &self.buckets[category.index()]
    }

    pub fn category_mut(&mut self, category: ApiCategory) -> &mut Vec<ApiCandidate> {
        &mut self.buckets[category.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ApiCandidate> {
        self.buckets.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count of candidates that have completed measurement.
    pub fn analyzed_count(&self) -> usize {
        self.iter().filter(|c| c.analyzed).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_resource_set_dedup_within_category() {
        let mut set = ResourceSet::new();
        let r = Resource::new(
            url("https://example.com/a.png"),
            ElementCategory::Image,
            ElementMeta::default(),
        );
        assert!(set.push(r.clone()));
        assert!(!set.push(r));
        assert_eq!(set.category(ElementCategory::Image).len(), 1);
    }

    #[test]
    fn test_resource_set_same_url_different_category() {
        let mut set = ResourceSet::new();
        let u = url("https://example.com/thing");
        set.push(Resource::new(
            u.clone(),
            ElementCategory::Image,
            ElementMeta::default(),
        ));
        assert!(set.push(Resource::new(
            u,
            ElementCategory::Other,
            ElementMeta::default(),
        )));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_resource_set_iteration_order() {
        let mut set = ResourceSet::new();
        set.push(Resource::new(
            url("https://example.com/s.js"),
            ElementCategory::Script,
            ElementMeta::default(),
        ));
        set.push(Resource::new(
            url("https://example.com/a.png"),
            ElementCategory::Image,
            ElementMeta::default(),
        ));
        let cats: Vec<ElementCategory> = set.iter().map(|r| r.category).collect();
        assert_eq!(cats, vec![ElementCategory::Image, ElementCategory::Script]);
    }

    #[test]
    fn test_api_collection_dedup() {
        let mut apis = ApiCollection::new();
        let candidate = ApiCandidate {
            url: url("https://example.com/api/items"),
            category: ApiCategory::Rest,
            detection: DetectionMethod::UrlShape,
            source_script: None,
            analyzed: false,
            measurement: None,
        };
        assert!(apis.insert(candidate.clone()));
        assert!(!apis.insert(ApiCandidate {
            detection: DetectionMethod::ScriptPattern(ScriptPattern::Fetch),
            ..candidate.clone()
        }));
        assert_eq!(apis.category(ApiCategory::Rest).len(), 1);
        // First detection wins.
        assert_eq!(
            apis.category(ApiCategory::Rest)[0].detection,
            DetectionMethod::UrlShape
        );

        // Same URL in a different category is a separate membership.
        assert!(apis.insert(ApiCandidate {
            category: ApiCategory::Products,
            ..candidate
        }));
        assert_eq!(apis.len(), 2);
    }

    #[test]
    fn test_json_shape_object_keeps_first_ten_keys() {
        let mut map = serde_json::Map::new();
        for i in 0..15 {
            map.insert(format!("k{i:02}"), serde_json::Value::Null);
        }
        let shape = JsonShape::of_value(&serde_json::Value::Object(map));
        match shape {
            JsonShape::Object { keys } => {
                assert_eq!(keys.len(), 10);
                assert_eq!(keys[0], "k00");
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn test_json_shape_array_len() {
        let value = serde_json::json!([1, 2, 3]);
        assert_eq!(JsonShape::of_value(&value), JsonShape::Array { len: 3 });
        assert_eq!(JsonShape::of_value(&value).is_json(), Some(true));
        assert_eq!(JsonShape::NotJson.is_json(), Some(false));
        assert_eq!(JsonShape::NotChecked.is_json(), None);
    }

    #[test]
    fn test_failed_measurement_is_zeroed() {
        let m = Measurement::failed("connection reset");
        assert_eq!(m.size, 0);
        assert_eq!(m.status, 0);
        assert_eq!(m.load_time, Duration::ZERO);
        assert_eq!(m.error.as_deref(), Some("connection reset"));
    }

    #[test]
    fn test_image_info_from_png() {
        // 2x1 PNG with two distinct colors.
        let mut png = Vec::new();
        let img = image::RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 255, 0, 255])
            }
        });
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let info = ImageInfo::from_bytes(&png).unwrap();
        assert_eq!(info.width, 2);
        assert_eq!(info.height, 1);
        assert_eq!(info.format, "Png");
        assert_eq!(info.colors, ColorCount::Exact(2));
        assert_eq!(info.aspect_ratio, 2.0);
    }

    #[test]
    fn test_image_info_rejects_garbage() {
        assert!(ImageInfo::from_bytes(b"not an image at all").is_err());
    }

    #[test]
    fn test_detection_method_labels() {
        assert_eq!(
            DetectionMethod::ScriptPattern(ScriptPattern::Fetch).label(),
            "script:fetch"
        );
        assert_eq!(DetectionMethod::WellKnownPath.label(), "well-known-path");
    }
}
