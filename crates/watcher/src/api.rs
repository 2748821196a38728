//! HTTP API: health checks, Prometheus metrics and the deployments of a project

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};
use watcher_lib::{
    deployments::calc_deployment_statuses,
    health::{ComponentStatus, HealthRegistry},
    model::{Application, ApplicationDeployment, DeploymentState, ProjectId},
    observability::WatcherMetrics,
    timeseries::Time,
    DeploymentStore,
};

#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: WatcherMetrics,
    pub store: Arc<dyn DeploymentStore>,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: WatcherMetrics,
        store: Arc<dyn DeploymentStore>,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            store,
        }
    }
}

/// A stored rollout with its current lifecycle state
#[derive(Debug, Serialize)]
pub struct DeploymentView {
    pub application: String,
    pub name: String,
    pub started_at: Time,
    pub finished_at: Option<Time>,
    pub state: DeploymentState,
    /// Last state delivered to the project's channels
    pub notified: Option<DeploymentState>,
}

/// Group stored rollouts per application and attach their states
pub fn deployment_views(
    deployments: Vec<ApplicationDeployment>,
    now: Time,
) -> Vec<DeploymentView> {
    let mut apps: BTreeMap<_, Application> = BTreeMap::new();
    for d in deployments {
        apps.entry(d.application_id.clone())
            .or_insert_with(|| Application::new(d.application_id.clone()))
            .add_deployment(d);
    }

    let mut views = Vec::new();
    for app in apps.values() {
        for status in calc_deployment_statuses(app, now) {
            let d = &app.deployments[status.index];
            views.push(DeploymentView {
                application: app.id.to_string(),
                name: d.name.clone(),
                started_at: d.started_at,
                finished_at: d.finished_at,
                state: status.state,
                notified: d.notifications.as_ref().map(|n| n.state),
            });
        }
    }
    views
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 once a pass completed, 503 otherwise
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn project_deployments(
    State(state): State<Arc<AppState>>,
    Path(project): Path<String>,
) -> impl IntoResponse {
    let project = ProjectId(project);
    let known = match state.store.get_projects().await {
        Ok(projects) => projects.iter().any(|p| p.id == project),
        Err(e) => {
            error!(error = %e, "Failed to get projects");
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(Vec::new()));
        }
    };
    if !known {
        return (StatusCode::NOT_FOUND, Json(Vec::new()));
    }

    match state.store.get_deployments(&project).await {
        Ok(deployments) => (StatusCode::OK, Json(deployment_views(deployments, Time::now()))),
        Err(e) => {
            error!(project = %project, error = %e, "Failed to get deployments");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(Vec::new()))
        }
    }
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/projects/:project/deployments", get(project_deployments))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
