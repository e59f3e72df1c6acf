//! Drift Monitor - background model monitoring worker
//!
//! Runs the monitoring cycle on a fixed cadence, comparing recent
//! prediction traffic against the reference baseline and serving
//! health and metrics endpoints.

use anyhow::Result;
use monitor_lib::{
    health::HealthRegistry,
    monitor::LogNotifier,
    observability::{MonitorMetrics, StructuredLogger},
    DriftOrchestrator, MonitoringScheduler,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const WORKER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting drift-monitor");

    let config = config::WorkerConfig::load()?;
    let monitor_config = config.monitor_config();
    info!(
        worker_id = %config.worker_id,
        model_version = %monitor_config.model_version,
        "Worker configured"
    );

    let health_registry = HealthRegistry::new();
    let metrics = MonitorMetrics::new();
    let logger = StructuredLogger::new(&config.worker_id);
    logger.log_startup(
        WORKER_VERSION,
        &monitor_config.model_version,
        monitor_config.monitoring_interval().as_secs(),
    );

    let store = Arc::new(config.build_store());
    let baseline = config.baseline_source();

    let orchestrator = Arc::new(
        DriftOrchestrator::new(store, baseline, monitor_config)
            .with_notifier(Arc::new(LogNotifier))
            .with_logger(logger.clone()),
    );

    let scheduler = Arc::new(
        MonitoringScheduler::new(orchestrator, health_registry.clone()).with_logger(logger.clone()),
    );
    let handle = scheduler.start();

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics));
    health_registry.set_ready(true).await;

    let api_port = config.api_port;
    let api_handle = tokio::spawn(async move {
        if let Err(e) = api::serve(api_port, app_state).await {
            error!(error = %e, "API server stopped");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    health_registry.set_ready(false).await;
    handle.stop().await;
    api_handle.abort();
    info!("Shutdown complete");

    Ok(())
}
