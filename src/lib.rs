// Copyright 2026 Sitegauge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sitegauge library — resource & API discovery engine for web pages.
//!
//! Fetches a page, discovers every referenced sub-resource and every
//! inferable backend endpoint through structural and heuristic analysis,
//! measures each candidate over HTTP, and folds the outcomes into running
//! aggregate statistics and reportable views.

pub mod analysis;
pub mod client;
pub mod discovery;
pub mod error;
pub mod model;
pub mod progress;
pub mod report;
pub mod stats;

pub use analysis::{AnalysisResult, AnalyzerConfig, CancelToken, SiteAnalyzer};
pub use error::AnalysisError;
