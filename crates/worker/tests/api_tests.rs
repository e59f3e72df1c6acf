//! Integration tests for the worker API endpoints

#[path = "../src/api.rs"]
#[allow(dead_code)]
mod api;

use api::{create_router, AppState};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use monitor_lib::{
    health::components,
    store::{InMemoryStore, StaticBaseline, SyntheticGenerator},
    DriftOrchestrator, FeatureSchema, HealthRegistry, MonitorConfig, MonitorMetrics,
    MonitoringScheduler, PredictionRecord,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower::ServiceExt;

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::SCHEDULER).await;
    health_registry.register(components::STORE).await;

    let metrics = MonitorMetrics::new();
    let state = Arc::new(AppState::new(health_registry, metrics));
    let router = create_router(state.clone());

    (router, state)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let content_type = response.headers().get("content-type").cloned();
    assert!(content_type
        .map(|v| v.to_str().unwrap().contains("text/plain"))
        .unwrap_or(false));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_degraded(components::STORE, "labeled_pairs failed")
        .await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
    assert_eq!(
        health["components"]["store"]["message"],
        "labeled_pairs failed"
    );
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_unhealthy(components::STORE, "store call timed out")
        .await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_returns_503_when_not_ready() {
    let (app, _state) = setup_test_app().await;

    let (status, readiness) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);
    assert!(readiness["reason"].is_string());
}

#[tokio::test]
async fn test_readyz_returns_ok_when_ready() {
    let (app, state) = setup_test_app().await;

    state.health_registry.set_ready(true).await;

    let (status, readiness) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_readyz_returns_503_when_ready_but_unhealthy() {
    let (app, state) = setup_test_app().await;

    state.health_registry.set_ready(true).await;
    state
        .health_registry
        .set_unhealthy(components::STORE, "store call timed out")
        .await;

    let (status, readiness) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(readiness["reason"].as_str().unwrap().contains("store"));
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, state) = setup_test_app().await;

    state.metrics.inc_persistence_failure("alert");

    let (status, metrics_text) = get_text(app, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(metrics_text.contains("drift_monitor_worker_cpu_percent"));
    assert!(metrics_text.contains("drift_monitor_worker_memory_bytes"));
    assert!(metrics_text.contains("drift_monitor_worker_status"));
    assert!(metrics_text.contains("drift_monitor_persistence_failures_total"));
    assert!(metrics_text.contains("drift_monitor_cycle_duration_seconds_bucket"));
}

#[tokio::test]
async fn test_metrics_scrape_resamples_worker_usage() {
    let (app, state) = setup_test_app().await;

    state.metrics.set_worker_usage(0.0, 0);

    let (_, metrics_text) = get_text(app, "/metrics").await;
    let memory: f64 = metrics_text
        .lines()
        .find_map(|line| line.strip_prefix("drift_monitor_worker_memory_bytes "))
        .expect("memory gauge exported")
        .trim()
        .parse()
        .unwrap();
    assert!(memory > 0.0);
}

#[tokio::test]
async fn test_scheduler_cycle_is_visible_through_api() {
    let (app, state) = setup_test_app().await;

    let schema = FeatureSchema::fraud_transactions();
    let generator = SyntheticGenerator::new(7);
    let baseline = generator.generate_baseline(2_000).unwrap();
    let current = generator.generate_baseline(300).unwrap();

    let store = InMemoryStore::new(schema.clone());
    let now = Utc::now();
    for row in 0..current.features.row_count() {
        let features: BTreeMap<String, f64> = schema
            .names()
            .map(|name| {
                let value = current.features.column(name).unwrap().observations()[row].unwrap();
                (name.to_string(), value)
            })
            .collect();
        store
            .record_prediction(PredictionRecord {
                transaction_id: format!("txn-{row}"),
                model_version: "xgb_v1.0.0".to_string(),
                features,
                prediction: 0,
                probability: 0.03,
                latency_ms: Some(4.0),
                timestamp: now - Duration::minutes(5),
            })
            .await
            .unwrap();
    }

    let orchestrator = Arc::new(DriftOrchestrator::new(
        Arc::new(store),
        Arc::new(StaticBaseline::new(baseline.features)),
        MonitorConfig::default(),
    ));
    let scheduler = MonitoringScheduler::new(orchestrator, state.health_registry.clone());
    let outcome = scheduler.run_once().await;
    assert!(outcome.success, "cycle failed: {:?}", outcome.error);

    let (status, health) = get_json(app.clone(), "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["components"]["scheduler"]["status"], "healthy");
    assert_eq!(health["components"]["baseline"]["status"], "healthy");

    let (_, metrics_text) = get_text(app, "/metrics").await;
    assert!(metrics_text.contains("drift_monitor_cycles_total"));
    assert!(metrics_text.contains("drift_monitor_reports_generated_total"));
}
