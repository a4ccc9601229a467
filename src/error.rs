//! Error taxonomy for the valuation run.
//!
//! Only [`ScreenerError::UniverseUnavailable`] is allowed to stop a run. The
//! per-company failures ([`ApiError`], [`ValuationError`]) are recovered as
//! absent values at the point they occur and only show up in the logs.

use thiserror::Error;

/// Errors that abort a run
#[derive(Debug, Error)]
pub enum ScreenerError {
    /// The company universe could not be located or parsed.
    #[error("company universe unavailable: {0}")]
    UniverseUnavailable(String),

    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Failures of the on-disk EPS cache
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache file is not valid CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("cache header is malformed: {0}")]
    Header(String),
}

/// Failures talking to an upstream data source
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("blocked by upstream (HTTP {status}) after {attempts} attempts")]
    Blocked { status: u16, attempts: u32 },

    #[error("failed to parse JSON response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("{0}")]
    MissingData(String),
}

/// Reasons an EPS pair cannot be valued
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValuationError {
    #[error("invalid EPS pair: {reason}")]
    InvalidEpsPair { reason: String },
}

/// Failures writing report files
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("report CSV failed: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T, E = ScreenerError> = std::result::Result<T, E>;
