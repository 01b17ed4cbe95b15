//! Analysis orchestration: one entry point that runs the full discovery and
//! measurement pipeline against a site URL.
//!
//! The run is staged:
//!
//! 1. Fetch and time the root document (the only fatal fetch).
//! 2. Extract sub-resource references from the parsed document.
//! 3. Sniff inline and external script text for API calls.
//! 4. Re-scan resource URLs against API path shapes.
//! 5. Probe well-known endpoint paths.
//! 6. Measure every discovered item through a bounded worker pool.
//!
//! Within the measurement stage items are independent, so workers run
//! concurrently; candidate insertion (including mid-measurement promotion)
//! is serialized through the task draining the worker stream, which keeps
//! the per-category check-then-insert free of races.

pub mod content_type;

use crate::client::HttpClient;
use crate::discovery::{probe, resources, script_api, url_patterns};
use crate::error::AnalysisError;
use crate::model::{
    ApiCandidate, ApiCategory, ApiCollection, DetectionMethod, ElementCategory, Measurement,
    ResourceSet,
};
use crate::progress::{self, Phase, ProgressEvent, ProgressSender};
use crate::stats::{self, FetchRecord, HttpStats};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use url::Url;

/// Tunables for one analyzer instance.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Timeout applied to every non-probe fetch.
    pub timeout: Duration,
    /// Timeout applied to well-known-path probes.
    pub probe_timeout: Duration,
    /// Measurement worker-pool size.
    pub concurrency: usize,
    pub user_agent: String,
    /// Cap on external scripts fetched for API sniffing.
    pub max_external_scripts: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(5),
            concurrency: 8,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                         AppleWebKit/537.36 (KHTML, like Gecko) \
                         Chrome/131.0.0.0 Safari/537.36"
                .to_string(),
            max_external_scripts: 20,
        }
    }
}

/// Cooperative cancellation flag for an analysis run.
///
/// Cancelling stops new fetches from being issued; in-flight ones finish or
/// time out, and `analyze` returns the partial result accumulated so far.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Everything one analysis run produced.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// The analyzed document URL.
    pub url: Url,
    pub started_at: DateTime<Utc>,
    /// Wall time of the whole run.
    pub total_time: Duration,
    /// Byte size of the root document.
    pub page_size: u64,
    /// Measurement of the root document fetch.
    pub document: Measurement,
    pub resources: ResourceSet,
    pub apis: ApiCollection,
    pub stats: HttpStats,
}

enum ItemRef {
    Resource(ElementCategory, usize),
    Api(ApiCategory, usize),
}

struct WorkItem {
    item: ItemRef,
    url: Url,
    is_api: bool,
    element_category: Option<ElementCategory>,
}

/// The discovery engine. One instance can run any number of analyses; each
/// run owns its own resource, candidate, and stats sets.
pub struct SiteAnalyzer {
    config: AnalyzerConfig,
    client: HttpClient,
}

impl SiteAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        let client = HttpClient::new(&config.user_agent);
        Self { config, client }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze a site with no progress reporting and no external cancellation.
    pub async fn analyze(&self, url: &str) -> Result<AnalysisResult, AnalysisError> {
        self.analyze_with(url, None, CancelToken::new()).await
    }

    /// Analyze a site, emitting progress events and honoring cancellation.
    pub async fn analyze_with(
        &self,
        url: &str,
        progress: Option<ProgressSender>,
        cancel: CancelToken,
    ) -> Result<AnalysisResult, AnalysisError> {
        let site_url = Url::parse(url)?;
        let started_at = Utc::now();
        let run_start = Instant::now();
        let http_stats = stats::shared();

        // ── Root document (the only fatal fetch) ──
        self.emit(&progress, 2, Phase::DocumentFetch, format!("GET {site_url}"), 0, 0, 0, 0);
        let document_resp = match self.client.get(&site_url, self.config.timeout, false).await {
            Ok(resp) => {
                stats::record(&http_stats, &FetchRecord::from_response(&resp));
                resp
            }
            Err(e) => {
                stats::record(&http_stats, &FetchRecord::Failure);
                return Err(AnalysisError::Fetch(e.to_string()));
            }
        };
        if !document_resp.is_success() {
            return Err(AnalysisError::Status(document_resp.status));
        }
        let page_size = document_resp.body_len();
        let document = Measurement::from_response(&document_resp, page_size);
        let html = document_resp
            .body
            .as_deref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default();
        info!(
            "document loaded: {} bytes in {:.2}s",
            page_size,
            document.load_time.as_secs_f64()
        );

        // ── Structural extraction (scraper types are !Send) ──
        let base = site_url.clone();
        let extracted =
            tokio::task::spawn_blocking(move || resources::extract(&html, &base))
                .await
                .unwrap_or_default();
        let mut resources = extracted.resources;
        let mut apis = ApiCollection::new();
        info!("extracted {} resources", resources.len());
        self.emit(
            &progress,
            15,
            Phase::ResourceExtraction,
            format!("{} resources found", resources.len()),
            resources.len(),
            0,
            0,
            0,
        );

        // ── Script sniffing: inline blocks, then external bundles ──
        for js in &extracted.inline_scripts {
            script_api::scan_script(js, &site_url, None, &mut apis);
        }
        let script_urls: Vec<Url> = resources
            .category(ElementCategory::Script)
            .iter()
            .map(|r| r.url.clone())
            .collect();
        if script_urls.len() > self.config.max_external_scripts {
            warn!(
                "scanning first {} of {} external scripts",
                self.config.max_external_scripts,
                script_urls.len()
            );
        }
        for script_url in script_urls.iter().take(self.config.max_external_scripts) {
            if cancel.is_cancelled() {
                break;
            }
            match self.client.get(script_url, self.config.timeout, false).await {
                Ok(resp) => {
                    stats::record(&http_stats, &FetchRecord::from_response(&resp));
                    if resp.is_success() {
                        if let Some(body) = resp.body.as_deref() {
                            let text = String::from_utf8_lossy(body);
                            script_api::scan_script(
                                &text,
                                &site_url,
                                Some(script_url.as_str()),
                                &mut apis,
                            );
                        }
                    }
                }
                Err(e) => {
                    stats::record(&http_stats, &FetchRecord::Failure);
                    warn!("external script {script_url} not scannable: {e}");
                }
            }
        }
        self.emit(
            &progress,
            30,
            Phase::ScriptScan,
            format!("{} API candidates from scripts", apis.len()),
            resources.len(),
            apis.len(),
            0,
            0,
        );

        // ── Path-shape classification over extracted resource URLs ──
        let from_urls = url_patterns::classify_resources(&resources, &mut apis);
        info!("url patterns added {from_urls} candidates");
        self.emit(
            &progress,
            35,
            Phase::UrlClassification,
            format!("{} API candidates total", apis.len()),
            resources.len(),
            apis.len(),
            0,
            0,
        );

        // ── Well-known path probing ──
        let confirmed = probe::probe_well_known(
            &self.client,
            &http_stats,
            &site_url,
            self.config.probe_timeout,
            &mut apis,
            &cancel,
        )
        .await;
        info!("probing confirmed {confirmed} endpoints");
        self.emit(
            &progress,
            45,
            Phase::Probing,
            format!("{confirmed} well-known endpoints confirmed"),
            resources.len(),
            apis.len(),
            0,
            0,
        );

        // ── Measurement: bounded worker pool over every unanalyzed item ──
        let mut work: Vec<WorkItem> = Vec::new();
        for category in ElementCategory::ALL {
            for (index, resource) in resources.category(category).iter().enumerate() {
                work.push(WorkItem {
                    item: ItemRef::Resource(category, index),
                    url: resource.url.clone(),
                    is_api: false,
                    element_category: Some(category),
                });
            }
        }
        for category in ApiCategory::ALL {
            for (index, candidate) in apis.category(category).iter().enumerate() {
                if candidate.analyzed {
                    continue;
                }
                work.push(WorkItem {
                    item: ItemRef::Api(category, index),
                    url: candidate.url.clone(),
                    is_api: true,
                    element_category: None,
                });
            }
        }
        let total_items = work.len();
        info!("measuring {total_items} items");

        let timeout = self.config.timeout;
        let mut measured = 0usize;
        let mut outcomes = stream::iter(work.into_iter().map(|item| {
            let client = self.client.clone();
            let http_stats = http_stats.clone();
            let cancel = cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    return None;
                }
                let output = content_type::measure_item(
                    &client,
                    &http_stats,
                    &item.url,
                    item.is_api,
                    item.element_category,
                    timeout,
                )
                .await;
                Some((item, output))
            }
        }))
        .buffer_unordered(self.config.concurrency.max(1));

        while let Some(entry) = outcomes.next().await {
            let Some((item, output)) = entry else { continue };
            measured += 1;
            let measurement = output.measurement;
            if output.product_shaped {
                apis.insert(ApiCandidate {
                    url: item.url.clone(),
                    category: ApiCategory::Products,
                    detection: DetectionMethod::JsonBody,
                    source_script: None,
                    analyzed: true,
                    measurement: Some(measurement.clone()),
                });
            }
            match item.item {
                ItemRef::Resource(category, index) => {
                    resources.category_mut(category)[index].measurement = Some(measurement);
                }
                ItemRef::Api(category, index) => {
                    let candidate = &mut apis.category_mut(category)[index];
                    candidate.measurement = Some(measurement);
                    candidate.analyzed = true;
                }
            }
            if measured % 10 == 0 || measured == total_items {
                let percent = 45 + (measured * 50 / total_items.max(1)) as u8;
                self.emit(
                    &progress,
                    percent,
                    Phase::Measurement,
                    format!("{measured}/{total_items} items measured"),
                    resources.len(),
                    apis.len(),
                    measured,
                    total_items,
                );
            }
        }
        drop(outcomes);

        // ── Final snapshot ──
        let stats_snapshot = stats::snapshot(&http_stats);
        let total_time = run_start.elapsed();
        info!(
            "analysis complete: {} resources, {} candidates, {} requests ({} failed) in {:.2}s",
            resources.len(),
            apis.len(),
            stats_snapshot.total_requests,
            stats_snapshot.failed_requests,
            total_time.as_secs_f64()
        );
        self.emit(
            &progress,
            100,
            Phase::Aggregation,
            "analysis complete".to_string(),
            resources.len(),
            apis.len(),
            measured,
            total_items,
        );

        Ok(AnalysisResult {
            url: site_url,
            started_at,
            total_time,
            page_size,
            document,
            resources,
            apis,
            stats: stats_snapshot,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn emit(
        &self,
        progress: &Option<ProgressSender>,
        percent: u8,
        phase: Phase,
        message: String,
        resources_found: usize,
        apis_found: usize,
        items_measured: usize,
        items_total: usize,
    ) {
        progress::emit(
            progress,
            ProgressEvent {
                percent,
                phase,
                message,
                resources_found,
                apis_found,
                items_measured,
                items_total,
            },
        );
    }
}
