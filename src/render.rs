//! Plain-text rendering of a metrics snapshot

use crate::models::{MetricData, Metrics};
use std::fmt::Write;

/// Aggregate view of a snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotSummary {
    pub services: usize,
    pub endpoints: usize,
    pub healthy: usize,
    pub failing: usize,
    /// (service, endpoint, days left), soonest first
    pub expiring_certs: Vec<(String, String, i64)>,
}

impl SnapshotSummary {
    pub fn availability(&self) -> f64 {
        if self.endpoints == 0 {
            return 0.0;
        }
        (self.healthy as f64 / self.endpoints as f64) * 100.0
    }
}

pub fn summarize(metrics: &Metrics, cert_warning_days: i64) -> SnapshotSummary {
    let mut summary = SnapshotSummary {
        services: metrics.len(),
        ..Default::default()
    };

    for (service, endpoints) in metrics {
        for (endpoint, data) in endpoints {
            summary.endpoints += 1;
            if data.success {
                summary.healthy += 1;
            } else {
                summary.failing += 1;
            }

            if data.cert_expires_within(cert_warning_days) {
                summary.expiring_certs.push((
                    service.clone(),
                    endpoint.clone(),
                    data.cert_expiry_days,
                ));
            }
        }
    }

    summary
        .expiring_certs
        .sort_by(|a, b| a.2.cmp(&b.2).then_with(|| a.0.cmp(&b.0)).then_with(|| a.1.cmp(&b.1)));

    summary
}

/// Fixed-width table of every endpoint, sorted by service then endpoint
pub fn render_snapshot(metrics: &Metrics) -> String {
    let mut rows: Vec<(&String, &String, &MetricData)> = metrics
        .iter()
        .flat_map(|(service, endpoints)| {
            endpoints
                .iter()
                .map(move |(endpoint, data)| (service, endpoint, data))
        })
        .collect();

    if rows.is_empty() {
        return "No probe results yet\n".to_string();
    }

    rows.sort_by(|a, b| a.0.cmp(b.0).then_with(|| a.1.cmp(b.1)));

    let service_width = column_width("SERVICE", rows.iter().map(|r| r.0.as_str()));
    let endpoint_width = column_width("ENDPOINT", rows.iter().map(|r| r.1.as_str()));

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<sw$}  {:<ew$}  {:<6}  {:>4}  {:>10}  {:<7}  {:>6}  {}",
        "SERVICE",
        "ENDPOINT",
        "STATUS",
        "CODE",
        "DURATION",
        "TLS",
        "CERT",
        "MESSAGE",
        sw = service_width,
        ew = endpoint_width,
    );

    for (service, endpoint, data) in rows {
        let _ = writeln!(
            out,
            "{:<sw$}  {:<ew$}  {:<6}  {:>4}  {:>10}  {:<7}  {:>6}  {}",
            service,
            endpoint,
            if data.success { "UP" } else { "DOWN" },
            data.status_code,
            format_duration_ms(data.duration),
            if data.has_tls() { data.tls_version.as_str() } else { "-" },
            format_cert_expiry(data),
            data.message,
            sw = service_width,
            ew = endpoint_width,
        );
    }

    out
}

fn column_width<'a>(header: &str, values: impl Iterator<Item = &'a str>) -> usize {
    values.map(str::len).fold(header.len(), usize::max)
}

fn format_duration_ms(ms: f64) -> String {
    if ms >= 1000.0 {
        format!("{:.2}s", ms / 1000.0)
    } else {
        format!("{:.1}ms", ms)
    }
}

fn format_cert_expiry(data: &MetricData) -> String {
    if !data.has_tls() {
        "-".to_string()
    } else if data.cert_expiry_days < 0 {
        "EXPIRED".to_string()
    } else {
        format!("{}d", data.cert_expiry_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EndpointMetrics;

    fn probe(success: bool, tls: &str, cert_days: i64) -> MetricData {
        MetricData {
            duration: 12.0,
            success,
            message: if success { "OK" } else { "connection refused" }.to_string(),
            status_code: if success { 200 } else { 0 },
            content_length: 2,
            tls_version: tls.to_string(),
            cert_expiry_days: cert_days,
        }
    }

    fn sample() -> Metrics {
        let mut auth = EndpointMetrics::new();
        auth.insert("/health".to_string(), probe(true, "TLS1.3", 45));
        auth.insert("/login".to_string(), probe(true, "TLS1.3", 5));

        let mut billing = EndpointMetrics::new();
        billing.insert("/".to_string(), probe(false, "", 0));

        let mut metrics = Metrics::new();
        metrics.insert("auth-service".to_string(), auth);
        metrics.insert("billing".to_string(), billing);
        metrics
    }

    #[test]
    fn test_summarize() {
        let summary = summarize(&sample(), 14);

        assert_eq!(summary.services, 2);
        assert_eq!(summary.endpoints, 3);
        assert_eq!(summary.healthy, 2);
        assert_eq!(summary.failing, 1);
        assert_eq!(
            summary.expiring_certs,
            vec![("auth-service".to_string(), "/login".to_string(), 5)]
        );
        assert!((summary.availability() - 66.666).abs() < 0.01);
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize(&Metrics::new(), 14);
        assert_eq!(summary, SnapshotSummary::default());
        assert_eq!(summary.availability(), 0.0);
    }

    #[test]
    fn test_render_snapshot_rows_sorted() {
        let table = render_snapshot(&sample());
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("SERVICE"));
        assert!(lines[1].starts_with("auth-service  /health"));
        assert!(lines[2].starts_with("auth-service  /login"));
        assert!(lines[3].starts_with("billing"));
        assert!(lines[3].contains("DOWN"));
        assert!(lines[1].contains("45d"));
        assert!(lines[1].contains("12.0ms"));
    }

    #[test]
    fn test_render_empty_snapshot() {
        assert_eq!(render_snapshot(&Metrics::new()), "No probe results yet\n");
    }

    #[test]
    fn test_formatting_helpers() {
        assert_eq!(format_duration_ms(1500.0), "1.50s");
        assert_eq!(format_duration_ms(8.04), "8.0ms");
        assert_eq!(format_cert_expiry(&probe(true, "TLS1.2", -2)), "EXPIRED");
        assert_eq!(format_cert_expiry(&probe(true, "", 0)), "-");
    }
}
