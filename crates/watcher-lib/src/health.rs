//! Health of the watcher's collaborators
//!
//! Tracks the metrics cache, the deployment store and the notification
//! channels for the liveness and readiness endpoints.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is functioning normally
    Healthy,
    /// Component is experiencing issues but still operational
    Degraded,
    /// Component has failed
    Unhealthy,
}

impl ComponentStatus {
    /// Returns true if the component is at least partially operational
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

/// Information about a component's health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    pub fn healthy() -> Self {
        Self {
            status: ComponentStatus::Healthy,
            message: None,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: ComponentStatus::Degraded,
            message: Some(message.into()),
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: ComponentStatus::Unhealthy,
            message: Some(message.into()),
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Compute overall status from component statuses
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        let mut has_degraded = false;

        for health in components.values() {
            match health.status {
                ComponentStatus::Unhealthy => return ComponentStatus::Unhealthy,
                ComponentStatus::Degraded => has_degraded = true,
                ComponentStatus::Healthy => {}
            }
        }

        if has_degraded {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        }
    }
}

/// Outcome of the last completed watcher pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassRecord {
    pub finished_at: i64,
    pub projects: usize,
    pub failed_projects: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_pass: Option<PassRecord>,
}

/// Component names for health tracking
pub mod components {
    pub const METRICS_CACHE: &str = "metrics_cache";
    pub const STORE: &str = "store";
    pub const NOTIFIER: &str = "notifier";
}

/// Component health plus the watcher's pass history
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    last_pass: Arc<RwLock<Option<PassRecord>>>,
    /// Readiness is lost when no pass finished within this many seconds
    stale_after: Option<i64>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            last_pass: Arc::new(RwLock::new(None)),
            stale_after: None,
        }
    }

    /// Registry whose readiness expires when passes stop completing
    pub fn with_stale_after(stale_after: std::time::Duration) -> Self {
        Self {
            stale_after: Some(stale_after.as_secs() as i64),
            ..Self::new()
        }
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), ComponentHealth::healthy());
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Derive a component's health from one pass over `total` projects.
    ///
    /// Healthy when nothing failed, unhealthy when every project failed,
    /// degraded otherwise.
    pub async fn record_outcome(
        &self,
        name: &str,
        failed: usize,
        total: usize,
        last_error: Option<&str>,
    ) {
        let detail = |msg: String| match last_error {
            Some(e) => format!("{msg}: {e}"),
            None => msg,
        };
        let health = if failed == 0 {
            ComponentHealth::healthy()
        } else if failed >= total {
            ComponentHealth::unhealthy(detail(format!("all {total} projects failed")))
        } else {
            ComponentHealth::degraded(detail(format!("{failed} of {total} projects failed")))
        };
        self.update(name, health).await;
    }

    /// Remember a finished pass; the first one makes the watcher ready
    pub async fn record_pass(&self, projects: usize, failed_projects: usize) {
        let record = PassRecord {
            finished_at: chrono::Utc::now().timestamp(),
            projects,
            failed_projects,
        };
        *self.last_pass.write().await = Some(record);
    }

    pub async fn last_pass(&self) -> Option<PassRecord> {
        *self.last_pass.read().await
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        self.readiness_at(chrono::Utc::now().timestamp()).await
    }

    async fn readiness_at(&self, now: i64) -> ReadinessResponse {
        let last_pass = self.last_pass().await;
        let health = self.health().await;

        let reason = match last_pass {
            None => Some("Watcher has not completed a pass".to_string()),
            Some(pass) => match self.stale_after {
                Some(limit) if now - pass.finished_at > limit => Some(format!(
                    "Last pass finished {}s ago",
                    now - pass.finished_at
                )),
                _ if !health.status.is_operational() => {
                    Some("Critical component unhealthy".to_string())
                }
                _ => None,
            },
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason,
            last_pass,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_health_registry_component_registration() {
        let registry = HealthRegistry::new();
        registry.register(components::METRICS_CACHE).await;

        let health = registry.health().await;
        assert!(health.components.contains_key(components::METRICS_CACHE));
        assert_eq!(
            health.components[components::METRICS_CACHE].status,
            ComponentStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_health_registry_degraded_status() {
        let registry = HealthRegistry::new();
        registry.register(components::METRICS_CACHE).await;
        registry.register(components::STORE).await;

        registry.set_degraded(components::METRICS_CACHE, "1 of 3 projects failed").await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
    }

    #[tokio::test]
    async fn test_health_registry_unhealthy_status() {
        let registry = HealthRegistry::new();
        registry.register(components::METRICS_CACHE).await;
        registry.register(components::STORE).await;

        registry.set_unhealthy(components::METRICS_CACHE, "cache is empty").await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_record_outcome() {
        let registry = HealthRegistry::new();
        registry.record_outcome(components::STORE, 0, 2, None).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);

        registry
            .record_outcome(components::METRICS_CACHE, 1, 2, Some("cache is empty"))
            .await;
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert_eq!(
            health.components[components::METRICS_CACHE].message.as_deref(),
            Some("1 of 2 projects failed: cache is empty")
        );

        registry.record_outcome(components::METRICS_CACHE, 2, 2, None).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_readiness_not_ready_before_first_pass() {
        let registry = HealthRegistry::new();
        let readiness = registry.readiness().await;

        assert!(!readiness.ready);
        assert_eq!(
            readiness.reason.as_deref(),
            Some("Watcher has not completed a pass")
        );
        assert!(readiness.last_pass.is_none());
    }

    #[tokio::test]
    async fn test_readiness_reports_last_pass() {
        let registry = HealthRegistry::new();
        registry.record_pass(3, 1).await;

        let readiness = registry.readiness().await;
        assert!(readiness.ready);
        let pass = readiness.last_pass.unwrap();
        assert_eq!(pass.projects, 3);
        assert_eq!(pass.failed_projects, 1);
    }

    #[tokio::test]
    async fn test_readiness_expires_when_passes_stop() {
        let registry = HealthRegistry::with_stale_after(std::time::Duration::from_secs(180));
        registry.record_pass(1, 0).await;
        let finished_at = registry.last_pass().await.unwrap().finished_at;

        assert!(registry.readiness_at(finished_at + 180).await.ready);

        let readiness = registry.readiness_at(finished_at + 600).await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Last pass finished 600s ago"));
    }

    #[tokio::test]
    async fn test_readiness_not_ready_when_unhealthy() {
        let registry = HealthRegistry::new();
        registry.register(components::METRICS_CACHE).await;
        registry.record_pass(1, 1).await;
        registry.set_unhealthy(components::METRICS_CACHE, "cache is empty").await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Critical component unhealthy"));
    }
}
