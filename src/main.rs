//! Probe Metrics Dashboard Binary

use clap::Parser;
use probe_dashboard::render::{render_snapshot, summarize};
use probe_dashboard::{Config, Dashboard, MetricsEndpoint, Result, TimeSeriesQuery};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "probe_dashboard", version, about = "Poll a probe backend and render its latest results")]
struct Cli {
    /// Base URL of the monitoring backend
    #[arg(long, env = "API_URL")]
    api_url: Option<String>,

    /// Metrics path: probe-metrics or metrics-data
    #[arg(long, env = "METRICS_ENDPOINT")]
    endpoint: Option<MetricsEndpoint>,

    /// Seconds between polls
    #[arg(long, env = "POLL_INTERVAL_SECONDS")]
    interval: Option<u64>,

    /// Fetch one snapshot, print it and exit
    #[arg(long)]
    once: bool,

    /// Print the stored probe history of a target and exit
    #[arg(long, value_name = "TARGET")]
    history: Option<String>,

    /// Look-back window for --history, e.g. 15m or 24h
    #[arg(long, default_value = "1h", requires = "history")]
    window: String,

    /// Only show one kind of check in --history, e.g. http or tls
    #[arg(long, value_name = "TYPE", requires = "history")]
    check_type: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(api_url) = &self.api_url {
            config.api_url = api_url.clone();
        }
        if let Some(endpoint) = self.endpoint {
            config.metrics_endpoint = endpoint;
        }
        if let Some(seconds) = self.interval {
            config.poll_interval = Duration::from_secs(seconds);
        }
        config.normalize();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    initialize_tracing();

    info!("Starting probe dashboard v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();

    let mut config = Config::from_env();
    cli.apply(&mut config);

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    info!(
        "Dashboard configuration - Metrics URL: {}, Poll interval: {}s",
        config.metrics_url(),
        config.poll_interval.as_secs()
    );

    let cert_warning_days = config.cert_expiry_warning_days;
    let dashboard = Dashboard::new(config)?;

    if let Some(target) = &cli.history {
        let mut query = TimeSeriesQuery::for_target(target.clone()).with_duration(cli.window.clone());
        if let Some(check_type) = &cli.check_type {
            query = query.with_check_type(check_type.clone());
        }
        let points = dashboard.client().fetch_time_series(&query).await?;

        for point in &points {
            println!(
                "{}  {:<8}  {:>8.1}ms  {}",
                point.time.to_rfc3339(),
                point.check_type,
                point.duration,
                if point.success { "UP" } else { "DOWN" }
            );
        }
        info!("Printed {} history points for {}", points.len(), target);
        return Ok(());
    }

    if cli.once {
        let metrics = dashboard.fetch_metrics().await?;
        print!("{}", render_snapshot(&metrics));
        return Ok(());
    }

    let _render = dashboard.metrics().subscribe(move |metrics| {
        print!("{}", render_snapshot(metrics));

        let summary = summarize(metrics, cert_warning_days);
        for (service, endpoint, days) in &summary.expiring_certs {
            warn!("Certificate for {}{} expires in {} days", service, endpoint, days);
        }
    });

    if let Err(e) = dashboard.run().await {
        error!("Dashboard failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Initialize structured logging
fn initialize_tracing() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .json();

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
