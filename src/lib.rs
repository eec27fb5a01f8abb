pub mod api;
pub mod chain;
pub mod config;
pub mod errors;
pub mod execution;
pub mod metrics;
pub mod models;
pub mod services;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::watch;

use crate::models::RotationSnapshot;

/// Shared state of the ops HTTP server. Read-only apart from the pause flag.
#[derive(Clone)]
pub struct OpsState {
    pub status: watch::Receiver<RotationSnapshot>,
    pub pause_flag: Arc<AtomicBool>,
    pub metrics_handle: PrometheusHandle,
    pub api_token: Option<String>,
}
