//! Probe result data structures as served by the monitoring backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Endpoint name -> latest probe result
pub type EndpointMetrics = HashMap<String, MetricData>;

/// Service name -> endpoint name -> latest probe result
pub type Metrics = HashMap<String, EndpointMetrics>;

/// Result of a single probe, in the backend's wire naming.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricData {
    /// Probe duration in milliseconds
    #[serde(rename = "Duration")]
    pub duration: f64,

    #[serde(rename = "Success")]
    pub success: bool,

    #[serde(rename = "Message")]
    pub message: String,

    #[serde(rename = "StatusCode")]
    pub status_code: i64,

    /// Response size in bytes
    #[serde(rename = "ContentLength")]
    pub content_length: i64,

    /// Empty when the endpoint is not served over TLS
    #[serde(rename = "TLSVersion")]
    pub tls_version: String,

    /// Days until the certificate expires; negative once expired
    #[serde(rename = "CertExpiryDays")]
    pub cert_expiry_days: i64,
}

impl MetricData {
    pub fn has_tls(&self) -> bool {
        !self.tls_version.is_empty()
    }

    /// Whether the certificate expires within `threshold_days`
    pub fn cert_expires_within(&self, threshold_days: i64) -> bool {
        self.has_tls() && self.cert_expiry_days <= threshold_days
    }
}

/// Sorted, de-duplicated target names of a snapshot
pub fn target_names(metrics: &Metrics) -> Vec<String> {
    let mut names: Vec<String> = metrics.keys().cloned().collect();
    names.sort();
    names
}

/// One row of the backend's `/timeseries` response
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TimeSeriesPoint {
    pub time: DateTime<Utc>,
    pub target: String,
    pub check_type: String,
    pub duration: f64,
    pub success: bool,
}

/// Filter for a `/timeseries` query; empty fields are left off the request
#[derive(Clone, Debug, Default)]
pub struct TimeSeriesQuery {
    pub target: Option<String>,
    pub check_type: Option<String>,
    /// Look-back window in the backend's duration syntax, e.g. `1h` or `15m`
    pub duration: Option<String>,
}

impl TimeSeriesQuery {
    pub fn for_target(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Default::default()
        }
    }

    pub fn with_check_type(mut self, check_type: impl Into<String>) -> Self {
        self.check_type = Some(check_type.into());
        self
    }

    pub fn with_duration(mut self, duration: impl Into<String>) -> Self {
        self.duration = Some(duration.into());
        self
    }

    /// Query string pairs, skipping unset or empty values
    pub fn params(&self) -> Vec<(&'static str, String)> {
        [
            ("target", &self.target),
            ("check_type", &self.check_type),
            ("duration", &self.duration),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_ref()
                .filter(|v| !v.is_empty())
                .map(|v| (key, v.clone()))
        })
        .collect()
    }
}
