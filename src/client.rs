//! HTTP client for the monitoring backend

use crate::config::Config;
use crate::errors::{DashboardError, Result};
use crate::models::{Metrics, TimeSeriesPoint, TimeSeriesQuery};
use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Anything that can produce a metrics payload for a backend path.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// GET `path` and decode the body as a metrics payload
    async fn get_metrics(&self, path: &str) -> Result<Metrics>;
}

/// reqwest-backed client for the backend's JSON endpoints
#[derive(Debug)]
pub struct MetricsClient {
    client: Client,
    api_url: String,
    timeout: Duration,
    stats: FetchStats,
}

impl MetricsClient {
    /// Create a new client for `api_url`
    pub fn new(api_url: impl Into<String>, http_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(http_timeout)
            .user_agent(format!("probe_dashboard/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(DashboardError::Http)?;

        let api_url: String = api_url.into();

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            timeout: http_timeout,
            stats: FetchStats::new(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.api_url.clone(), config.http_timeout)
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// Single GET with the client timeout applied
    async fn get(&self, url: &str, what: &str) -> Result<Response> {
        timeout(self.timeout, self.client.get(url).send())
            .await
            .map_err(|_| DashboardError::Timeout(format!("{} request to {}", what, url)))?
            .map_err(DashboardError::Http)
    }

    async fn get_metrics_attempt(&self, url: &str) -> Result<Metrics> {
        let response = self.get(url, "metrics").await?;
        let status = response.status();

        // Error statuses are not rejected outright; the body decides.
        if !status.is_success() {
            warn!("Metrics endpoint {} answered {}, parsing body anyway", url, status);
        }

        let body = response.text().await.map_err(DashboardError::Http)?;
        let metrics: Metrics = serde_json::from_str(&body)?;

        debug!(
            "Decoded {} services from {} ({} bytes)",
            metrics.len(),
            url,
            body.len()
        );

        Ok(metrics)
    }

    /// Check the backend's `/health` endpoint, returning its body
    pub async fn health_check(&self) -> Result<String> {
        let url = self.url("/health");

        debug!("Performing health check against {}", url);

        let response = self.get(&url, "health check").await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(DashboardError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body.trim().to_string())
    }

    /// Test connectivity to the backend
    pub async fn test_connectivity(&self) -> bool {
        match self.health_check().await {
            Ok(body) => {
                info!("Backend connectivity test successful: {}", body);
                true
            }
            Err(e) => {
                warn!("Backend connectivity test failed: {}", e);
                false
            }
        }
    }

    /// Query the backend's stored probe history
    pub async fn fetch_time_series(&self, query: &TimeSeriesQuery) -> Result<Vec<TimeSeriesPoint>> {
        let url = self.url("/timeseries");
        let params = query.params();

        debug!("Fetching time series from {} with {:?}", url, params);

        let response = timeout(self.timeout, self.client.get(&url).query(&params).send())
            .await
            .map_err(|_| DashboardError::Timeout(format!("time series request to {}", url)))?
            .map_err(DashboardError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DashboardError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        let body = response.text().await.map_err(DashboardError::Http)?;
        // The backend encodes an empty result set as `null`.
        let points: Option<Vec<TimeSeriesPoint>> = serde_json::from_str(&body)?;

        Ok(points.unwrap_or_default())
    }

    /// Get fetch statistics
    pub async fn stats(&self) -> FetchStatsSnapshot {
        self.stats.snapshot().await
    }
}

#[async_trait]
impl MetricsSource for MetricsClient {
    async fn get_metrics(&self, path: &str) -> Result<Metrics> {
        let url = self.url(path);
        let start_time = Instant::now();

        debug!("Fetching metrics from {}", url);

        match self.get_metrics_attempt(&url).await {
            Ok(metrics) => {
                self.stats.record_success(start_time.elapsed()).await;
                Ok(metrics)
            }
            Err(e) => {
                self.stats.record_failure(start_time.elapsed()).await;
                Err(e)
            }
        }
    }
}

#[derive(Debug, Default)]
struct FetchCounters {
    attempts: u64,
    successes: u64,
    failures: u64,
    total_duration: Duration,
    min_duration: Option<Duration>,
    max_duration: Option<Duration>,
}

/// Fetch outcome tracking
#[derive(Debug)]
struct FetchStats {
    counters: RwLock<FetchCounters>,
}

impl FetchStats {
    fn new() -> Self {
        Self {
            counters: RwLock::new(FetchCounters::default()),
        }
    }

    async fn record_success(&self, duration: Duration) {
        let mut counters = self.counters.write().await;
        counters.successes += 1;
        Self::record_attempt(&mut counters, duration);
    }

    async fn record_failure(&self, duration: Duration) {
        let mut counters = self.counters.write().await;
        counters.failures += 1;
        Self::record_attempt(&mut counters, duration);
    }

    fn record_attempt(counters: &mut FetchCounters, duration: Duration) {
        counters.attempts += 1;
        counters.total_duration += duration;
        counters.min_duration = Some(counters.min_duration.map_or(duration, |m| m.min(duration)));
        counters.max_duration = Some(counters.max_duration.map_or(duration, |m| m.max(duration)));
    }

    async fn snapshot(&self) -> FetchStatsSnapshot {
        let counters = self.counters.read().await;

        let success_rate = if counters.attempts > 0 {
            (counters.successes as f64 / counters.attempts as f64) * 100.0
        } else {
            0.0
        };

        let avg_duration = average_duration(counters.total_duration, counters.attempts);

        FetchStatsSnapshot {
            attempts: counters.attempts,
            successes: counters.successes,
            failures: counters.failures,
            success_rate,
            avg_duration_ms: avg_duration.as_millis() as u64,
            min_duration_ms: counters.min_duration.map(|d| d.as_millis() as u64),
            max_duration_ms: counters.max_duration.map(|d| d.as_millis() as u64),
        }
    }
}

/// Mean of `count` samples summing to `total`, in whole nanoseconds
fn average_duration(total: Duration, count: u64) -> Duration {
    if count == 0 {
        return Duration::ZERO;
    }
    let nanos = total.as_nanos() / u128::from(count);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// Snapshot of fetch statistics
#[derive(Debug, Clone)]
pub struct FetchStatsSnapshot {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub success_rate: f64,
    pub avg_duration_ms: u64,
    pub min_duration_ms: Option<u64>,
    pub max_duration_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> MetricsClient {
        MetricsClient::new(server.uri(), Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn test_client_creation_trims_slash() {
        let client = MetricsClient::new("http://localhost:8080/", Duration::from_secs(10));

        assert!(client.is_ok());
        let client = client.unwrap();
        assert_eq!(client.api_url(), "http://localhost:8080");
        assert_eq!(client.url("/probe-metrics"), "http://localhost:8080/probe-metrics");
    }

    #[tokio::test]
    async fn test_get_metrics_decodes_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/probe-metrics"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"web":{"/":{"Duration":8.5,"Success":true,"Message":"OK","StatusCode":200,"ContentLength":512,"TLSVersion":"","CertExpiryDays":0}}}"#,
            ))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let metrics = assert_ok!(client.get_metrics("/probe-metrics").await);

        assert_eq!(metrics["web"]["/"].content_length, 512);

        let stats = client.stats().await;
        assert_eq!(stats.attempts, 1);
        assert_eq!(stats.successes, 1);
        assert_eq!(stats.success_rate, 100.0);
    }

    #[tokio::test]
    async fn test_get_metrics_rejects_empty_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/probe-metrics"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = assert_err!(client.get_metrics("/probe-metrics").await);

        assert!(matches!(err, DashboardError::Json(_)));
        assert_eq!(client.stats().await.failures, 1);
    }

    #[tokio::test]
    async fn test_get_metrics_connection_refused() {
        // Nothing listens on the discard port.
        let client = MetricsClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();

        let err = assert_err!(client.get_metrics("/probe-metrics").await);
        assert!(matches!(err, DashboardError::Http(_) | DashboardError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_get_metrics_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/probe-metrics"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{}")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = MetricsClient::new(server.uri(), Duration::from_millis(50)).unwrap();
        assert_err!(client.get_metrics("/probe-metrics").await);
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(assert_ok!(client.health_check().await), "OK");
        assert!(client.test_connectivity().await);
    }

    #[tokio::test]
    async fn test_health_check_failure_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503).set_body_string("database unreachable"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        match client.health_check().await {
            Err(DashboardError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "database unreachable");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!client.test_connectivity().await);
    }

    #[tokio::test]
    async fn test_fetch_time_series() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/timeseries"))
            .and(query_param("target", "auth-service"))
            .and(query_param("duration", "15m"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"time":"2024-05-01T12:00:00Z","target":"auth-service","check_type":"http","duration":40.5,"success":true},
                    {"time":"2024-05-01T12:00:30Z","target":"auth-service","check_type":"http","duration":0,"success":false}]"#,
            ))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let query = TimeSeriesQuery::for_target("auth-service").with_duration("15m");
        let points = assert_ok!(client.fetch_time_series(&query).await);

        assert_eq!(points.len(), 2);
        assert!(points[0].success);
        assert!(!points[1].success);
    }

    #[tokio::test]
    async fn test_fetch_time_series_null_and_bad_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/timeseries"))
            .and(query_param("duration", "forever"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Invalid duration\n"))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/timeseries"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null\n"))
            .mount(&server)
            .await;

        let client = client_for(&server);

        let points = assert_ok!(client.fetch_time_series(&TimeSeriesQuery::default()).await);
        assert!(points.is_empty());

        let bad = TimeSeriesQuery::default().with_duration("forever");
        match client.fetch_time_series(&bad).await {
            Err(DashboardError::Status { status, body }) => {
                assert_eq!(status, 400);
                assert_eq!(body, "Invalid duration");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_average_duration() {
        assert_eq!(average_duration(Duration::ZERO, 0), Duration::ZERO);
        assert_eq!(
            average_duration(Duration::from_millis(30), 4),
            Duration::from_micros(7500)
        );

        // Attempt counts past u32::MAX must not wrap the divisor.
        let attempts = 1u64 << 32;
        assert_eq!(
            average_duration(Duration::from_millis(5 * attempts), attempts),
            Duration::from_millis(5)
        );
    }
}
