pub mod api;
pub mod classifier;
pub mod config;
pub mod errors;
pub mod ingestion;
pub mod intelligence;
pub mod metrics;
pub mod models;
pub mod providers;
pub mod services;
pub mod tracking;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::Scanner;
use crate::tracking::{DynamicWatchlist, StatsAggregator};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub watchlist: DynamicWatchlist,
    pub stats: StatsAggregator,
    pub scanner: Scanner,
    pub pause_flag: Arc<AtomicBool>,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}
