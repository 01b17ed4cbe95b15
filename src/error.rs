//! Error type for the analysis entry point.
//!
//! Only the root document fetch can fail a run. Everything downstream —
//! sub-resource fetches, probes, decodes — degrades to per-item failure
//! records and never surfaces here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The site URL could not be parsed.
    #[error("invalid site url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The initial document fetch failed at the transport level.
    #[error("failed to fetch document: {0}")]
    Fetch(String),

    /// The initial document fetch returned a non-success status.
    #[error("document fetch returned status {0}")]
    Status(u16),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = AnalysisError::Status(503);
        assert_eq!(err.to_string(), "document fetch returned status 503");

        let err = AnalysisError::Fetch("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_invalid_url_conversion() {
        let parse_err = url::Url::parse("not a url").unwrap_err();
        let err: AnalysisError = parse_err.into();
        assert!(matches!(err, AnalysisError::InvalidUrl(_)));
    }
}
