//! Dashboard state: the two stores and the fetch operations that feed them

use crate::client::{FetchStatsSnapshot, MetricsClient, MetricsSource};
use crate::config::{Config, MetricsEndpoint};
use crate::errors::{DashboardError, Result};
use crate::models::{Metrics, target_names};
use crate::render::summarize;
use crate::store::{MetricStore, Store, TargetStore};

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Owns the metric and target stores and keeps them in step with the backend.
///
/// Each fetch draws a sequence number from a counter shared by
/// [`Dashboard::fetch_metrics`] and [`Dashboard::fetch_targets`]. A response is
/// only published if no later-issued fetch has already been applied, so a slow
/// response can never overwrite newer data.
pub struct Dashboard<S = MetricsClient> {
    config: Config,
    source: Arc<S>,
    metrics: MetricStore,
    targets: TargetStore,
    next_seq: AtomicU64,
    dashboard_id: String,
}

impl Dashboard<MetricsClient> {
    /// Create a dashboard backed by an HTTP client for `config.api_url`
    pub fn new(config: Config) -> Result<Self> {
        config.validate().map_err(DashboardError::Config)?;
        let client = MetricsClient::from_config(&config)?;
        Ok(Self::with_source(config, client))
    }

    /// Start polling until Ctrl-C
    pub async fn run(&self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to wait for shutdown signal: {}", e);
            }
        })
        .await
    }

    /// Poll on `poll_interval` until `shutdown` resolves
    #[instrument(skip(self, shutdown), fields(dashboard = %self.dashboard_id))]
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            "Starting dashboard {} against {}{}",
            self.dashboard_id,
            self.config.api_url,
            self.config.metrics_endpoint.path()
        );

        if !self.source.test_connectivity().await {
            warn!("Backend connectivity test failed, but continuing anyway");
        }

        let mut poll_interval = interval(self.config.poll_interval);
        poll_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut stats_interval = interval(self.config.stats_interval);
        // The first tick fires immediately; there is nothing to report yet.
        stats_interval.tick().await;

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = poll_interval.tick() => self.poll_once().await,
                _ = stats_interval.tick() => self.report_stats().await,
            }
        }

        info!("Shutting down dashboard");
        let stats = self.stats().await;
        info!(
            "Final fetch stats - Success rate: {:.1}%, Total attempts: {}, Avg duration: {}ms",
            stats.fetch.success_rate, stats.fetch.attempts, stats.fetch.avg_duration_ms
        );

        Ok(())
    }

    /// Get dashboard statistics
    pub async fn stats(&self) -> DashboardStats {
        DashboardStats {
            dashboard_id: self.dashboard_id.clone(),
            api_url: self.config.api_url.clone(),
            metrics_endpoint: self.config.metrics_endpoint,
            known_targets: self.targets.get().len(),
            last_applied_seq: self.metrics.applied_seq().max(self.targets.applied_seq()),
            fetch: self.source.stats().await,
        }
    }

    pub fn client(&self) -> &MetricsClient {
        &self.source
    }

    async fn report_stats(&self) {
        let stats = self.stats().await;
        let summary = summarize(&self.metrics.get(), self.config.cert_expiry_warning_days);

        info!(
            "Dashboard stats - Targets: {}, Endpoints: {} ({:.1}% available, {} failing, {} expiring certs), Fetch: {:.1}% success rate, {} attempts",
            stats.known_targets,
            summary.endpoints,
            summary.availability(),
            summary.failing,
            summary.expiring_certs.len(),
            stats.fetch.success_rate,
            stats.fetch.attempts
        );
    }
}

impl<S> Dashboard<S>
where
    S: MetricsSource,
{
    /// Create a dashboard over any metrics source; stores start empty
    pub fn with_source(config: Config, source: S) -> Self {
        Self {
            config,
            source: Arc::new(source),
            metrics: Store::new("metrics", Metrics::new()),
            targets: Store::new("targets", Vec::new()),
            next_seq: AtomicU64::new(0),
            dashboard_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dashboard_id(&self) -> &str {
        &self.dashboard_id
    }

    pub fn metrics(&self) -> &MetricStore {
        &self.metrics
    }

    pub fn targets(&self) -> &TargetStore {
        &self.targets
    }

    fn next_sequence(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Fetch the metrics snapshot, publish it, and return it.
    ///
    /// On success the snapshot replaces the metric store and, when target
    /// derivation is on, its key set replaces the target store. On failure
    /// neither store changes.
    #[instrument(skip(self), fields(dashboard = %self.dashboard_id))]
    pub async fn fetch_metrics(&self) -> Result<Metrics> {
        let seq = self.next_sequence();
        let metrics = self
            .source
            .get_metrics(self.config.metrics_endpoint.path())
            .await?;

        // Both stores are committed before either is notified, so a metrics
        // subscriber reading the target store sees the matching list.
        if let Some(metrics_update) = self.metrics.commit_versioned(seq, metrics.clone()) {
            let targets_update = if self.config.derive_targets {
                self.targets.commit_versioned(seq, target_names(&metrics))
            } else {
                None
            };

            metrics_update.publish();
            if let Some(targets_update) = targets_update {
                targets_update.publish();
            }
            debug!("Applied metrics snapshot {} with {} services", seq, metrics.len());
        } else {
            warn!(
                "Discarding metrics response {} that resolved after snapshot {}",
                seq,
                self.metrics.applied_seq()
            );
        }

        Ok(metrics)
    }

    /// Fetch the target listing on its own and publish it.
    ///
    /// This is a separate round-trip from [`Dashboard::fetch_metrics`]; the two
    /// stores may briefly describe different points in time.
    #[instrument(skip(self), fields(dashboard = %self.dashboard_id))]
    pub async fn fetch_targets(&self) -> Result<Vec<String>> {
        let seq = self.next_sequence();
        let payload = self.source.get_metrics(self.config.targets_path()).await?;
        let names = target_names(&payload);

        if self.targets.set_versioned(seq, names.clone()) {
            debug!("Applied target list {} with {} targets", seq, names.len());
        } else {
            warn!(
                "Discarding target response {} that resolved after list {}",
                seq,
                self.targets.applied_seq()
            );
        }

        Ok(names)
    }

    /// One polling step; failures are logged and the last snapshot stays
    pub async fn poll_once(&self) {
        match self.fetch_metrics().await {
            Ok(metrics) => {
                debug!("Poll complete, {} services", metrics.len());
            }
            Err(e) => {
                warn!("Failed to fetch metrics, keeping previous snapshot: {}", e);
            }
        }
    }
}

/// Dashboard statistics
#[derive(Debug, Clone)]
pub struct DashboardStats {
    pub dashboard_id: String,
    pub api_url: String,
    pub metrics_endpoint: MetricsEndpoint,
    pub known_targets: usize,
    pub last_applied_seq: u64,
    pub fetch: FetchStatsSnapshot,
}
