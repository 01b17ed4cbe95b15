//! End-to-end engine tests against mock HTTP servers.
//!
//! Covers the discovery → measurement → aggregation pipeline: HEAD/GET
//! fallback, JSON sniffing and product promotion, well-known path probing,
//! cross-method dedup, per-item failure degradation, and stats accounting.

use sitegauge::analysis::content_type;
use sitegauge::model::{ApiCategory, DetectionMethod, ElementCategory, JsonShape, ScriptPattern};
use sitegauge::{stats, AnalysisError, AnalyzerConfig, CancelToken, SiteAnalyzer};
use std::time::Duration;
use url::Url;
use wiremock::matchers::path;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn analyzer() -> SiteAnalyzer {
    SiteAnalyzer::new(AnalyzerConfig {
        timeout: Duration::from_secs(5),
        probe_timeout: Duration::from_secs(2),
        concurrency: 4,
        ..Default::default()
    })
}

fn png_bytes() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 255]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

async fn mount(server: &MockServer, at: &str, template: ResponseTemplate) {
    // No method matcher: the same mock answers HEAD and GET.
    Mock::given(path(at))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_analysis_discovers_and_measures() {
    let server = MockServer::start().await;

    let html = r#"<html><head>
        <link rel="stylesheet" href="/css/site.css">
        <script src="/js/app.js"></script>
    </head><body>
        <img src="/img/logo.png" alt="logo">
    </body></html>"#;

    mount(
        &server,
        "/",
        ResponseTemplate::new(200)
            .set_body_string(html)
            .insert_header("content-type", "text/html"),
    )
    .await;
    mount(
        &server,
        "/css/site.css",
        ResponseTemplate::new(200)
            .set_body_string("body { margin: 0 }")
            .insert_header("content-type", "text/css")
            .insert_header("cache-control", "public, max-age=86400"),
    )
    .await;
    mount(
        &server,
        "/js/app.js",
        ResponseTemplate::new(200)
            .set_body_string(r#"fetch("/api/v2/products/42").then(r => r.json());"#)
            .insert_header("content-type", "application/javascript"),
    )
    .await;
    mount(
        &server,
        "/img/logo.png",
        ResponseTemplate::new(200)
            .set_body_bytes(png_bytes())
            .insert_header("content-type", "image/png"),
    )
    .await;
    mount(
        &server,
        "/api/v2/products/42",
        ResponseTemplate::new(200)
            .set_body_string(r#"{"id": 42, "name": "Widget", "price": 9.9}"#)
            .insert_header("content-type", "application/json"),
    )
    .await;

    let result = analyzer().analyze(&server.uri()).await.unwrap();

    // Structural extraction.
    assert_eq!(result.resources.category(ElementCategory::Image).len(), 1);
    assert_eq!(
        result.resources.category(ElementCategory::Stylesheet).len(),
        1
    );
    assert_eq!(result.resources.category(ElementCategory::Script).len(), 1);

    // The product keyword wins over the REST-path signal: exactly one
    // candidate, in the product-catalog category, detected by the fetch
    // pattern.
    let products = result.apis.category(ApiCategory::Products);
    assert_eq!(products.len(), 1);
    let candidate = &products[0];
    assert!(candidate.url.as_str().ends_with("/api/v2/products/42"));
    assert_eq!(
        candidate.detection,
        DetectionMethod::ScriptPattern(ScriptPattern::Fetch)
    );
    assert!(candidate.analyzed);
    let measurement = candidate.measurement.as_ref().unwrap();
    assert_eq!(measurement.status, 200);
    assert!(matches!(measurement.json, JsonShape::Object { .. }));

    // Image measurement decoded pixel facts.
    let img = &result.resources.category(ElementCategory::Image)[0];
    let m = img.measurement.as_ref().unwrap();
    let info = m.image.as_ref().unwrap();
    assert_eq!(info.width, 4);
    assert_eq!(info.height, 2);
    assert_eq!(info.format, "Png");

    // Stats accounting: every status observation plus every failure is one
    // recorded fetch.
    let observed: u64 = result.stats.status_codes.values().sum();
    assert_eq!(
        observed + result.stats.failed_requests,
        result.stats.total_requests
    );
    assert_eq!(result.stats.failed_requests, 0);
}

#[tokio::test]
async fn test_wp_json_probe_yields_analyzed_rest_candidate() {
    let server = MockServer::start().await;

    mount(
        &server,
        "/",
        ResponseTemplate::new(200)
            .set_body_string("<html><body>hello</body></html>")
            .insert_header("content-type", "text/html"),
    )
    .await;
    mount(
        &server,
        "/wp-json",
        ResponseTemplate::new(200)
            .set_body_raw(r#"{"name": "Example", "routes": {}}"#.as_bytes(), "application/json"),
    )
    .await;

    let result = analyzer().analyze(&server.uri()).await.unwrap();

    let rest = result.apis.category(ApiCategory::Rest);
    let wp = rest
        .iter()
        .find(|c| c.url.as_str().ends_with("/wp-json"))
        .expect("wp-json candidate");
    assert!(wp.analyzed);
    assert_eq!(wp.detection, DetectionMethod::WellKnownPath);
    let m = wp.measurement.as_ref().unwrap();
    assert_eq!(m.status, 200);
    assert_eq!(m.json.is_json(), Some(true));
}

#[tokio::test]
async fn test_plain_resource_promoted_by_product_array_body() {
    let server = MockServer::start().await;

    // Referenced as an image, but the body is a product-shaped JSON array.
    mount(
        &server,
        "/",
        ResponseTemplate::new(200)
            .set_body_string(r#"<html><img src="/catalog-feed"></html>"#)
            .insert_header("content-type", "text/html"),
    )
    .await;
    mount(
        &server,
        "/catalog-feed",
        ResponseTemplate::new(200)
            .set_body_raw(r#"[{"id": 1, "name": "a", "price": 2.5}]"#.as_bytes(), "application/json"),
    )
    .await;

    let result = analyzer().analyze(&server.uri()).await.unwrap();

    let products = result.apis.category(ApiCategory::Products);
    let promoted = products
        .iter()
        .find(|c| c.url.as_str().ends_with("/catalog-feed"))
        .expect("promoted candidate");
    assert_eq!(promoted.detection, DetectionMethod::JsonBody);
    assert!(promoted.analyzed);
    let m = promoted.measurement.as_ref().unwrap();
    assert_eq!(m.json, JsonShape::Array { len: 1 });

    // The originating resource is still a measured image-category Resource.
    let img = &result.resources.category(ElementCategory::Image)[0];
    assert!(img.measurement.is_some());
}

#[tokio::test]
async fn test_cross_method_detection_deduplicates() {
    let server = MockServer::start().await;

    // The same URL is referenced as a stylesheet (URL-shape pass) and called
    // from an inline script (sniffer pass). Both classify it as a JSON
    // endpoint; only the first detection survives.
    let html = r#"<html><head>
        <link rel="stylesheet" href="/api/items.json">
        <script>fetch("/api/items.json");</script>
    </head></html>"#;
    mount(
        &server,
        "/",
        ResponseTemplate::new(200)
            .set_body_string(html)
            .insert_header("content-type", "text/html"),
    )
    .await;
    mount(
        &server,
        "/api/items.json",
        ResponseTemplate::new(200)
            .set_body_string("[]")
            .insert_header("content-type", "application/json"),
    )
    .await;

    let result = analyzer().analyze(&server.uri()).await.unwrap();

    let json_candidates: Vec<_> = result
        .apis
        .category(ApiCategory::Json)
        .iter()
        .filter(|c| c.url.as_str().ends_with("/api/items.json"))
        .collect();
    assert_eq!(json_candidates.len(), 1);
    // The sniffer runs before the URL-shape pass.
    assert_eq!(
        json_candidates[0].detection,
        DetectionMethod::ScriptPattern(ScriptPattern::Fetch)
    );
}

#[tokio::test]
async fn test_non_json_body_with_api_flag_sets_not_json() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/pretend-api",
        ResponseTemplate::new(200)
            .set_body_string("<html>not json</html>")
            .insert_header("content-type", "text/html"),
    )
    .await;

    let http_stats = stats::shared();
    let client = sitegauge::client::HttpClient::new("sitegauge-test");
    let url = Url::parse(&format!("{}/pretend-api", server.uri())).unwrap();
    let output = content_type::measure_item(
        &client,
        &http_stats,
        &url,
        true,
        None,
        Duration::from_secs(5),
    )
    .await;

    assert_eq!(output.measurement.json, JsonShape::NotJson);
    assert_eq!(output.measurement.json.is_json(), Some(false));
    assert!(!output.product_shaped);
    assert!(output.measurement.error.is_none());
}

#[tokio::test]
async fn test_measurement_is_idempotent_for_stable_responses() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/stable.json",
        ResponseTemplate::new(200)
            .set_body_string(r#"{"a": 1, "b": 2}"#)
            .insert_header("content-type", "application/json")
            .insert_header("cache-control", "max-age=60")
            .insert_header("server", "mock"),
    )
    .await;

    let http_stats = stats::shared();
    let client = sitegauge::client::HttpClient::new("sitegauge-test");
    let url = Url::parse(&format!("{}/stable.json", server.uri())).unwrap();
    let timeout = Duration::from_secs(5);

    let first = content_type::measure_item(&client, &http_stats, &url, true, None, timeout).await;
    let second = content_type::measure_item(&client, &http_stats, &url, true, None, timeout).await;

    let (a, b) = (first.measurement, second.measurement);
    assert_eq!(a.size, b.size);
    assert_eq!(a.status, b.status);
    assert_eq!(a.redirects, b.redirects);
    assert_eq!(a.content_type, b.content_type);
    assert_eq!(a.headers, b.headers);
    assert_eq!(a.json, b.json);
    assert_eq!(a.error, b.error);
}

#[tokio::test]
async fn test_size_falls_back_to_body_when_content_length_missing() {
    // Minimal raw HTTP server that never sends content-length.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                use tokio::io::{AsyncReadExt, AsyncWriteExt};
                let mut buf = [0u8; 2048];
                let Ok(n) = socket.read(&mut buf).await else {
                    return;
                };
                let request = String::from_utf8_lossy(&buf[..n]);
                let head_only = request.starts_with("HEAD");
                let mut response = String::from(
                    "HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\nconnection: close\r\n\r\n",
                );
                if !head_only {
                    response.push_str("ten bytes!");
                }
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    let http_stats = stats::shared();
    let client = sitegauge::client::HttpClient::new("sitegauge-test");
    let url = Url::parse(&format!("http://{addr}/no-length")).unwrap();
    let output = content_type::measure_item(
        &client,
        &http_stats,
        &url,
        false,
        None,
        Duration::from_secs(5),
    )
    .await;

    assert!(output.measurement.error.is_none());
    assert_eq!(output.measurement.status, 200);
    assert_eq!(output.measurement.size, 10);
}

#[tokio::test]
async fn test_failed_subresource_degrades_without_aborting() {
    let server = MockServer::start().await;
    // Port 9 is discard; nothing listens there in the test environment.
    let html = r#"<html>
        <img src="http://127.0.0.1:9/unreachable.png">
        <link rel="stylesheet" href="/ok.css">
    </html>"#;
    mount(
        &server,
        "/",
        ResponseTemplate::new(200)
            .set_body_string(html)
            .insert_header("content-type", "text/html"),
    )
    .await;
    mount(
        &server,
        "/ok.css",
        ResponseTemplate::new(200)
            .set_body_string("body{}")
            .insert_header("content-type", "text/css"),
    )
    .await;

    let result = analyzer().analyze(&server.uri()).await.unwrap();

    let img = &result.resources.category(ElementCategory::Image)[0];
    let failed = img.measurement.as_ref().unwrap();
    assert_eq!(failed.status, 0);
    assert_eq!(failed.size, 0);
    assert!(failed.error.is_some());

    let css = &result.resources.category(ElementCategory::Stylesheet)[0];
    assert_eq!(css.measurement.as_ref().unwrap().status, 200);

    assert!(result.stats.failed_requests >= 1);
    assert!(result.stats.failed_requests <= result.stats.total_requests);
}

#[tokio::test]
async fn test_initial_fetch_failure_is_fatal() {
    let err = analyzer()
        .analyze("http://127.0.0.1:9/")
        .await
        .expect_err("unreachable site must fail the run");
    assert!(matches!(err, AnalysisError::Fetch(_)));
}

#[tokio::test]
async fn test_initial_non_success_status_is_fatal() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/",
        ResponseTemplate::new(503).set_body_string("down"),
    )
    .await;

    let err = analyzer()
        .analyze(&server.uri())
        .await
        .expect_err("5xx document must fail the run");
    assert!(matches!(err, AnalysisError::Status(503)));
}

#[tokio::test]
async fn test_invalid_url_is_rejected() {
    let err = analyzer().analyze("definitely not a url").await;
    assert!(matches!(err, Err(AnalysisError::InvalidUrl(_))));
}

#[tokio::test]
async fn test_cancelled_run_returns_partial_result() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/",
        ResponseTemplate::new(200)
            .set_body_string(r#"<html><img src="/a.png"><img src="/b.png"></html>"#)
            .insert_header("content-type", "text/html"),
    )
    .await;

    let cancel = CancelToken::new();
    cancel.cancel();
    let result = analyzer()
        .analyze_with(&server.uri(), None, cancel)
        .await
        .unwrap();

    // Extraction still happened, but no probe or measurement fetches ran.
    assert_eq!(result.resources.category(ElementCategory::Image).len(), 2);
    assert!(result
        .resources
        .iter()
        .all(|r| r.measurement.is_none()));
    // Only the document fetch was recorded.
    assert_eq!(result.stats.total_requests, 1);
}

#[tokio::test]
async fn test_redirected_resource_counts_hops() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/",
        ResponseTemplate::new(200)
            .set_body_string(r#"<html><link rel="stylesheet" href="/moved.css"></html>"#)
            .insert_header("content-type", "text/html"),
    )
    .await;
    mount(
        &server,
        "/moved.css",
        ResponseTemplate::new(301).insert_header("location", "/final.css"),
    )
    .await;
    mount(
        &server,
        "/final.css",
        ResponseTemplate::new(200)
            .set_body_string("body{}")
            .insert_header("content-type", "text/css"),
    )
    .await;

    let result = analyzer().analyze(&server.uri()).await.unwrap();
    let css = &result.resources.category(ElementCategory::Stylesheet)[0];
    let m = css.measurement.as_ref().unwrap();
    assert_eq!(m.status, 200);
    assert_eq!(m.redirects, 1);
}
