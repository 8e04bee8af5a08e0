//! Error types for the news feed pipeline.
//!
//! Only [`PipelineError`] ever reaches the caller of
//! [`NewsService::load`](crate::pipeline::NewsService::load). The other two
//! types describe failures of a single external call; the component that owns
//! the call logs them and degrades its output instead of propagating.

use std::time::Duration;
use thiserror::Error;

/// Errors that abort a pipeline request before any external call is made.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required credential is absent.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Latitude or longitude out of range (or not finite).
    #[error("invalid coordinate: lat={lat}, lon={lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },
}

/// Failure of one news search call.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (DNS, TLS, connection reset, ...).
    #[error("request failed: {0}")]
    Request(String),

    /// Upstream answered with a non-success status.
    #[error("upstream returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// Body could not be decoded into the expected shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// The call did not finish within the per-call budget.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure of one reverse-geocoding call.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("geocoder returned status {0}")]
    Status(u16),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The response had none of the address fields we select from.
    #[error("no usable address fields")]
    NoAddress,
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FetchError::Parse(e.to_string())
        } else {
            FetchError::Request(e.to_string())
        }
    }
}

impl From<reqwest::Error> for GeocodeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            GeocodeError::Parse(e.to_string())
        } else {
            GeocodeError::Request(e.to_string())
        }
    }
}
