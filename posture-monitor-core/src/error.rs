//! Error handling for the posture monitor
//!
//! This module provides the error type shared by the element model, the
//! backend client and the detection controller. Errors from the underlying
//! libraries are converted with `thiserror`.
//!
//! ## Error Handling Patterns
//!
//! ### Error Propagation
//!
//! Use `?` for automatic conversion:
//!
//! ```rust
//! use posture_monitor_core::{MetricsSample, Result};
//!
//! fn parse_sample(body: &[u8]) -> Result<MetricsSample> {
//!     let sample = serde_json::from_slice(body)?;  // JSON errors auto-converted
//!     Ok(sample)
//! }
//! ```
//!
//! ### Logging Errors
//!
//! Failures inside the controller are never surfaced to the user, they are
//! logged with `tracing` and the view degrades to the idle state:
//!
//! ```rust,ignore
//! if let Err(e) = backend.stop_camera().await {
//!     warn!("Error stopping detection: {}", e);
//! }
//! ```
//!
//! ## Error Categories
//!
//! ### Transport Errors
//! HTTP client failures, converted from `reqwest::Error`. Timeouts and
//! refused connections get their own variants through
//! [`MonitorError::from_reqwest`].
//!
//! ### Serialization Errors
//! Malformed metrics bodies, converted from `serde_json::Error`.
//!
//! ### Page Errors
//! `MissingElement` when the host page lacks one of the bound ids.

use thiserror::Error;

/// Result type for posture monitor operations
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors that can occur while driving a detection session
///
/// # Examples
///
/// ```rust
/// use posture_monitor_core::MonitorError;
///
/// let error = MonitorError::MissingElement("videoFeed".to_string());
/// assert_eq!(error.to_string(), "Missing element: #videoFeed");
///
/// let error = MonitorError::Status(503, "/stop_camera".to_string());
/// assert_eq!(error.to_string(), "Unexpected HTTP status 503 from /stop_camera");
/// ```
#[derive(Error, Debug)]
pub enum MonitorError {
    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error (malformed metrics body)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error not covered by a more specific variant
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("Unexpected HTTP status {0} from {1}")]
    Status(u16, String),

    /// Request did not finish in time
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Backend could not be reached
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    /// Host page does not provide an element the controller binds to
    #[error("Missing element: #{0}")]
    MissingElement(String),

    /// Endpoint URL could not be built
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Operation not valid in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl MonitorError {
    /// Classify a `reqwest` error, attaching the request context
    ///
    /// Timeouts and connection failures get dedicated variants so callers can
    /// tell an unreachable backend from a malformed response.
    pub fn from_reqwest(error: reqwest::Error, context: &str) -> Self {
        if error.is_timeout() {
            MonitorError::Timeout(format!("{}: {}", context, error))
        } else if error.is_connect() {
            MonitorError::ConnectionRefused(format!("{}: {}", context, error))
        } else if let Some(status) = error.status() {
            MonitorError::Status(status.as_u16(), context.to_string())
        } else if error.is_decode() {
            MonitorError::InvalidState(format!("{}: undecodable body ({})", context, error))
        } else {
            MonitorError::Http(error)
        }
    }

    /// Whether a later attempt of the same request could succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MonitorError::Timeout(_)
                | MonitorError::ConnectionRefused(_)
                | MonitorError::Http(_)
                | MonitorError::Io(_)
                | MonitorError::Json(_)
                | MonitorError::Status(500..=599, _)
        )
    }

    /// Get a short, user-facing description of the error
    pub fn user_message(&self) -> String {
        match self {
            MonitorError::Timeout(_) => {
                "The posture service did not answer in time.".to_string()
            }
            MonitorError::ConnectionRefused(_) => {
                "Could not reach the posture service. Is it running?".to_string()
            }
            MonitorError::Status(code, path) => {
                format!("The posture service rejected {} (HTTP {}).", path, code)
            }
            MonitorError::Json(_) => "The posture service sent unreadable metrics.".to_string(),
            MonitorError::MissingElement(id) => {
                format!("The page has no element with id '{}'.", id)
            }
            MonitorError::InvalidUrl(msg) | MonitorError::Configuration(msg) => {
                format!("Configuration error: {}. Check your settings.", msg)
            }
            MonitorError::InvalidState(msg) => format!("Invalid state: {}.", msg),
            MonitorError::Http(e) => format!("Network error: {}.", e),
            MonitorError::Io(e) => format!("I/O error: {}.", e),
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        MonitorError::Configuration(msg.into())
    }
}
