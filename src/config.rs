//! Configuration management for the dashboard client

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which backend path serves the metrics snapshot.
///
/// Backends expose one or the other; a deployment picks exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricsEndpoint {
    /// `/probe-metrics`
    ProbeMetrics,
    /// `/metrics/data`
    MetricsData,
}

impl MetricsEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            MetricsEndpoint::ProbeMetrics => "/probe-metrics",
            MetricsEndpoint::MetricsData => "/metrics/data",
        }
    }
}

impl fmt::Display for MetricsEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for MetricsEndpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "probe-metrics" | "/probe-metrics" => Ok(MetricsEndpoint::ProbeMetrics),
            "metrics-data" | "metrics/data" | "/metrics/data" => Ok(MetricsEndpoint::MetricsData),
            other => Err(format!("unknown metrics endpoint: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the monitoring backend, without trailing slash
    pub api_url: String,

    /// Path the metrics snapshot is fetched from
    pub metrics_endpoint: MetricsEndpoint,

    /// Path the standalone target listing is fetched from; the metrics
    /// endpoint when unset
    pub targets_endpoint: Option<String>,

    /// Derive the target list from each metrics snapshot
    pub derive_targets: bool,

    /// Interval between polls of the metrics endpoint
    pub poll_interval: Duration,

    /// HTTP timeout for backend requests
    pub http_timeout: Duration,

    /// Interval between fetch statistics reports
    pub stats_interval: Duration,

    /// Certificates expiring within this many days are flagged
    pub cert_expiry_warning_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".to_string(),
            metrics_endpoint: MetricsEndpoint::ProbeMetrics,
            targets_endpoint: None,
            derive_targets: true,
            poll_interval: Duration::from_secs(10),
            http_timeout: Duration::from_secs(10),
            stats_interval: Duration::from_secs(60),
            cert_expiry_warning_days: 14,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(api_url) = lookup("API_URL") {
            config.api_url = api_url;
        }

        if let Some(endpoint) = lookup("METRICS_ENDPOINT") {
            if let Ok(endpoint) = endpoint.parse() {
                config.metrics_endpoint = endpoint;
            }
        }

        if let Some(targets_endpoint) = lookup("TARGETS_ENDPOINT") {
            if !targets_endpoint.trim().is_empty() {
                config.targets_endpoint = Some(targets_endpoint.trim().to_string());
            }
        }

        if let Some(derive) = lookup("DERIVE_TARGETS") {
            config.derive_targets = derive.to_lowercase() == "true";
        }

        if let Some(poll_interval) = lookup("POLL_INTERVAL_SECONDS") {
            if let Ok(seconds) = poll_interval.parse::<u64>() {
                config.poll_interval = Duration::from_secs(seconds);
            }
        }

        if let Some(timeout) = lookup("HTTP_TIMEOUT_SECONDS") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.http_timeout = Duration::from_secs(seconds);
            }
        }

        if let Some(stats_interval) = lookup("STATS_INTERVAL_SECONDS") {
            if let Ok(seconds) = stats_interval.parse::<u64>() {
                config.stats_interval = Duration::from_secs(seconds);
            }
        }

        if let Some(days) = lookup("CERT_EXPIRY_WARNING_DAYS") {
            if let Ok(days) = days.parse() {
                config.cert_expiry_warning_days = days;
            }
        }

        config.normalize();
        config
    }

    /// Strip the trailing slash so paths can be appended verbatim
    pub fn normalize(&mut self) {
        let trimmed = self.api_url.trim().trim_end_matches('/');
        self.api_url = trimmed.to_string();
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.api_url.is_empty() {
            return Err("api_url cannot be empty".to_string());
        }

        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(format!("api_url must be an http(s) URL, got {}", self.api_url));
        }

        if let Some(targets_endpoint) = &self.targets_endpoint {
            if !targets_endpoint.starts_with('/') {
                return Err("targets_endpoint must start with '/'".to_string());
            }
        }

        if self.poll_interval.is_zero() {
            return Err("poll_interval must be greater than 0".to_string());
        }

        if self.http_timeout.is_zero() {
            return Err("http_timeout must be greater than 0".to_string());
        }

        if self.stats_interval.is_zero() {
            return Err("stats_interval must be greater than 0".to_string());
        }

        Ok(())
    }

    pub fn metrics_url(&self) -> String {
        format!("{}{}", self.api_url, self.metrics_endpoint.path())
    }

    /// Path the target listing is read from
    pub fn targets_path(&self) -> &str {
        self.targets_endpoint
            .as_deref()
            .unwrap_or_else(|| self.metrics_endpoint.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(|_| None);

        assert_eq!(config.api_url, "http://localhost:8080");
        assert_eq!(config.metrics_endpoint, MetricsEndpoint::ProbeMetrics);
        assert!(config.derive_targets);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.targets_endpoint, None);
        assert_eq!(config.targets_path(), "/probe-metrics");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_from_lookup() {
        let config = Config::from_lookup(lookup_from(&[
            ("API_URL", "https://status.example.com/api/"),
            ("METRICS_ENDPOINT", "metrics-data"),
            ("DERIVE_TARGETS", "false"),
            ("POLL_INTERVAL_SECONDS", "30"),
            ("HTTP_TIMEOUT_SECONDS", "not-a-number"),
        ]));

        assert_eq!(config.api_url, "https://status.example.com/api");
        assert_eq!(config.metrics_endpoint, MetricsEndpoint::MetricsData);
        assert!(!config.derive_targets);
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.metrics_url(), "https://status.example.com/api/metrics/data");
        assert_eq!(config.targets_path(), "/metrics/data");

        let config = Config::from_lookup(lookup_from(&[("TARGETS_ENDPOINT", "/targets")]));
        assert_eq!(config.targets_path(), "/targets");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.api_url = String::new();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.api_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.targets_endpoint = Some("metrics/data".to_string());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_metrics_endpoint_parsing() {
        assert_eq!("probe-metrics".parse::<MetricsEndpoint>(), Ok(MetricsEndpoint::ProbeMetrics));
        assert_eq!("/metrics/data".parse::<MetricsEndpoint>(), Ok(MetricsEndpoint::MetricsData));
        assert!("/metrics".parse::<MetricsEndpoint>().is_err());
    }
}
