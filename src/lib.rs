//! Probe Metrics Dashboard Library
//!
//! This library polls a monitoring backend for uptime/probe results and
//! publishes the latest snapshot through observable stores that renderers
//! subscribe to.

pub mod config;
pub mod client;
pub mod dashboard;
pub mod models;
pub mod render;
pub mod store;
pub mod errors;

pub use config::{Config, MetricsEndpoint};
pub use client::{MetricsClient, MetricsSource};
pub use dashboard::{Dashboard, DashboardStats};
pub use models::{MetricData, Metrics, TimeSeriesPoint, TimeSeriesQuery};
pub use store::{MetricStore, PendingUpdate, Store, Subscription, TargetStore};
pub use errors::{DashboardError, Result};
