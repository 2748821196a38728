//! Integration tests for the watcher API endpoints

#[allow(dead_code)]
#[path = "../src/api.rs"]
mod api;

use api::{create_router, AppState};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use std::sync::Arc;
use tower::ServiceExt;
use watcher_lib::{
    health::{components, HealthRegistry},
    model::{
        ApplicationDeployment, ApplicationId, ApplicationKind, DeploymentNotifications,
        DeploymentState, MetricsSnapshot, Project, ProjectId,
    },
    observability::WatcherMetrics,
    timeseries::Time,
    DeploymentStore, MemoryStore,
};

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::METRICS_CACHE).await;
    health_registry.register(components::STORE).await;
    health_registry.register(components::NOTIFIER).await;

    let store = MemoryStore::new();
    store.upsert_project(Project::new("p1", "prod")).await.unwrap();

    let metrics = WatcherMetrics::new();
    let state = Arc::new(AppState::new(health_registry, metrics, Arc::new(store)));
    let router = create_router(state.clone());

    (router, state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["metrics_cache"].is_object());
    assert!(health["components"]["store"].is_object());
    assert!(health["components"]["notifier"].is_object());
}

#[tokio::test]
async fn test_healthz_returns_ok_when_some_projects_fail() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .record_outcome(components::METRICS_CACHE, 1, 3, Some("cache is empty"))
        .await;

    let (status, body) = get(app, "/healthz").await;
    // Degraded still returns 200 (operational)
    assert_eq!(status, StatusCode::OK);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "degraded");
    assert_eq!(
        health["components"]["metrics_cache"]["message"],
        "1 of 3 projects failed: cache is empty"
    );
}

#[tokio::test]
async fn test_healthz_returns_503_when_every_project_fails() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .record_outcome(components::METRICS_CACHE, 2, 2, None)
        .await;

    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_returns_503_before_first_pass() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], false);
    assert_eq!(readiness["reason"], "Watcher has not completed a pass");
}

#[tokio::test]
async fn test_readyz_returns_ok_when_ready() {
    let (app, state) = setup_test_app().await;

    state.health_registry.record_pass(1, 0).await;

    let (status, body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);

    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], true);
    assert_eq!(readiness["last_pass"]["projects"], 1);
    assert_eq!(readiness["last_pass"]["failed_projects"], 0);
}

#[tokio::test]
async fn test_readyz_returns_503_when_ready_but_unhealthy() {
    let (app, state) = setup_test_app().await;

    state.health_registry.record_pass(1, 0).await;
    state
        .health_registry
        .set_unhealthy(components::STORE, "failed to get projects")
        .await;

    let (status, _body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, state) = setup_test_app().await;

    state.metrics.observe_pass_latency(0.2);
    state.metrics.set_applications_checked(12);
    state.metrics.inc_deployments_detected();
    state.metrics.inc_notifications_sent("log");

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("deploy_watcher_pass_latency_seconds_bucket"));
    assert!(metrics_text.contains("deploy_watcher_applications_checked"));
    assert!(metrics_text.contains("deploy_watcher_deployments_detected_total"));
    assert!(metrics_text.contains("deploy_watcher_notifications_total"));
}

fn api_deployment(name: &str, started_at: i64) -> ApplicationDeployment {
    let id = ApplicationId::new("default", ApplicationKind::Deployment, "api");
    ApplicationDeployment::new(id, name, Time(started_at))
}

#[tokio::test]
async fn test_project_deployments_report_states() {
    let (app, state) = setup_test_app().await;
    let project = ProjectId::from("p1");

    let mut summarized = api_deployment("api-a", 100);
    summarized.finished_at = Some(Time(160));
    summarized.metrics_snapshot = Some(MetricsSnapshot::default());
    summarized.notifications = Some(DeploymentNotifications {
        state: DeploymentState::Summary,
        ..Default::default()
    });
    let cancelled = api_deployment("api-b", 3_000);
    let mut deployed = api_deployment("api-c", 6_000);
    deployed.finished_at = Some(Time(6_060));
    for d in [&summarized, &cancelled, &deployed] {
        state.store.save_deployment(&project, d).await.unwrap();
    }
    state.store.save_metrics_snapshot(&project, &summarized).await.unwrap();
    state.store.save_notifications(&project, &summarized).await.unwrap();

    let (status, body) = get(app, "/projects/p1/deployments").await;
    assert_eq!(status, StatusCode::OK);

    let views: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let views = views.as_array().unwrap();
    assert_eq!(views.len(), 3);
    assert_eq!(views[0]["application"], "default:Deployment:api");
    assert_eq!(views[0]["name"], "api-a");
    assert_eq!(views[0]["state"], "summary");
    assert_eq!(views[0]["notified"], "summary");
    assert_eq!(views[1]["name"], "api-b");
    assert_eq!(views[1]["state"], "cancelled");
    assert!(views[1]["finished_at"].is_null());
    assert_eq!(views[2]["name"], "api-c");
    assert_eq!(views[2]["state"], "deployed");
    assert_eq!(views[2]["finished_at"], 6_060);
}

#[tokio::test]
async fn test_project_deployments_unknown_project() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/projects/missing/deployments").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let views: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(views, serde_json::json!([]));
}
