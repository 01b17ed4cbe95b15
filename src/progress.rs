// Copyright 2026 Sitegauge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Progress event types and broadcast channel for live analysis telemetry.
//!
//! The analyzer emits [`ProgressEvent`]s at phase boundaries and periodically
//! during measurement. Events flow through a `tokio::sync::broadcast` channel
//! to any subscriber (the CLI progress bar, a polling front-end). With no
//! subscriber, events are silently dropped.

use serde::Serialize;

/// Phase of an analysis run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Fetching and timing the root document.
    DocumentFetch,
    /// Walking the parsed document for sub-resource references.
    ResourceExtraction,
    /// Scanning inline and external script text for API calls.
    ScriptScan,
    /// Re-scanning resource URLs against path-shape patterns.
    UrlClassification,
    /// Requesting well-known API paths against the site root.
    Probing,
    /// Fetching and measuring every discovered item.
    Measurement,
    /// Computing the final aggregate views.
    Aggregation,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DocumentFetch => write!(f, "Fetching document"),
            Self::ResourceExtraction => write!(f, "Extracting resources"),
            Self::ScriptScan => write!(f, "Scanning scripts"),
            Self::UrlClassification => write!(f, "Classifying URLs"),
            Self::Probing => write!(f, "Probing endpoints"),
            Self::Measurement => write!(f, "Measuring items"),
            Self::Aggregation => write!(f, "Aggregating"),
        }
    }
}

/// A progress snapshot emitted during analysis.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    /// Coarse completion estimate, 0–100.
    pub percent: u8,
    pub phase: Phase,
    /// Human-readable status line.
    pub message: String,
    /// Resources discovered so far.
    pub resources_found: usize,
    /// API candidates discovered so far.
    pub apis_found: usize,
    /// Items measured so far (measurement phase only).
    pub items_measured: usize,
    /// Total items queued for measurement (measurement phase only).
    pub items_total: usize,
}

/// Sender handle for emitting progress events.
pub type ProgressSender = tokio::sync::broadcast::Sender<ProgressEvent>;

/// Receiver handle for consuming progress events.
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<ProgressEvent>;

/// Create a progress broadcast channel with a bounded buffer.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Emit an event, silently ignoring the error raised when nobody listens.
pub fn emit(tx: &Option<ProgressSender>, event: ProgressEvent) {
    if let Some(sender) = tx {
        let _ = sender.send(event);
    }
}
