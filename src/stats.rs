//! Run-scoped HTTP statistics accumulator.
//!
//! Every fetch outcome anywhere in the engine — probe, HEAD, or GET — is
//! folded in through [`HttpStats::record`], the sole mutation path. The
//! accumulator is shared across measurement workers behind a mutex; lock
//! scope is a single `record` call.

use crate::client::MeasuredResponse;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Outcome of one fetch, as fed to the accumulator.
#[derive(Debug, Clone)]
pub enum FetchRecord {
    Success {
        status: u16,
        content_type: String,
        elapsed: Duration,
    },
    Failure,
}

impl FetchRecord {
    pub fn from_response(resp: &MeasuredResponse) -> Self {
        Self::Success {
            status: resp.status,
            content_type: resp.media_type(),
            elapsed: resp.elapsed,
        }
    }
}

/// Process-scoped accumulator for one analysis run. Never reset mid-run.
#[derive(Debug, Default, Clone)]
pub struct HttpStats {
    /// Status code → observation count.
    pub status_codes: BTreeMap<u16, u64>,
    /// Media type → observation count.
    pub content_types: HashMap<String, u64>,
    /// Observed response times, in arrival order.
    pub response_times: Vec<Duration>,
    pub total_requests: u64,
    pub failed_requests: u64,
}

impl HttpStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one fetch outcome into the counters.
    pub fn record(&mut self, record: &FetchRecord) {
        self.total_requests += 1;
        match record {
            FetchRecord::Success {
                status,
                content_type,
                elapsed,
            } => {
                *self.status_codes.entry(*status).or_insert(0) += 1;
                *self
                    .content_types
                    .entry(content_type.clone())
                    .or_insert(0) += 1;
                self.response_times.push(*elapsed);
            }
            FetchRecord::Failure => {
                self.failed_requests += 1;
            }
        }
    }

    /// Response-time summary over everything recorded so far.
    pub fn timing(&self) -> TimingSummary {
        TimingSummary::of(&self.response_times)
    }
}

/// Aggregate response-time statistics, in seconds.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct TimingSummary {
    pub avg_s: f64,
    pub min_s: f64,
    pub max_s: f64,
    /// Sample standard deviation; zero when fewer than two observations.
    pub stddev_s: f64,
}

impl TimingSummary {
    pub fn of(times: &[Duration]) -> Self {
        if times.is_empty() {
            return Self::default();
        }
        let secs: Vec<f64> = times.iter().map(Duration::as_secs_f64).collect();
        let n = secs.len() as f64;
        let avg = secs.iter().sum::<f64>() / n;
        let min = secs.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = secs.iter().cloned().fold(0.0_f64, f64::max);
        let stddev = if secs.len() > 1 {
            let var = secs.iter().map(|t| (t - avg).powi(2)).sum::<f64>() / (n - 1.0);
            var.sqrt()
        } else {
            0.0
        };
        Self {
            avg_s: avg,
            min_s: min,
            max_s: max,
            stddev_s: stddev,
        }
    }
}

/// Handle shared by all measurement workers within one run.
pub type SharedStats = Arc<Mutex<HttpStats>>;

pub fn shared() -> SharedStats {
    Arc::new(Mutex::new(HttpStats::new()))
}

/// Record through the shared handle. A poisoned lock still records; the
/// accumulator holds plain counters and stays coherent.
pub fn record(stats: &SharedStats, record: &FetchRecord) {
    stats
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .record(record);
}

/// Take a snapshot of the accumulator.
pub fn snapshot(stats: &SharedStats) -> HttpStats {
    stats
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}
