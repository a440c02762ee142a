//! Error types for the dashboard client

use std::fmt;

pub type Result<T> = std::result::Result<T, DashboardError>;

#[derive(Debug)]
pub enum DashboardError {
    /// HTTP request failed before a response body was read
    Http(reqwest::Error),

    /// Response body was not the expected JSON shape
    Json(serde_json::Error),

    /// Request did not complete within the configured timeout
    Timeout(String),

    /// Backend answered with a status the caller treats as a failure
    Status { status: u16, body: String },

    /// Configuration error
    Config(String),

    /// Generic error with message
    Other(String),
}

impl fmt::Display for DashboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DashboardError::Http(err) => write!(f, "HTTP error: {}", err),
            DashboardError::Json(err) => write!(f, "JSON error: {}", err),
            DashboardError::Timeout(what) => write!(f, "Timed out: {}", what),
            DashboardError::Status { status, body } => {
                write!(f, "Unexpected status {}: {}", status, body)
            }
            DashboardError::Config(msg) => write!(f, "Configuration error: {}", msg),
            DashboardError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for DashboardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DashboardError::Http(err) => Some(err),
            DashboardError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for DashboardError {
    fn from(err: reqwest::Error) -> Self {
        DashboardError::Http(err)
    }
}

impl From<serde_json::Error> for DashboardError {
    fn from(err: serde_json::Error) -> Self {
        DashboardError::Json(err)
    }
}
