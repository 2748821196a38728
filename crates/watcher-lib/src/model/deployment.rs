//! Rollout records persisted across windows

use super::ApplicationId;
use crate::timeseries::{Duration, Time, MINUTE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Default delay between a rollout finishing and its metrics window starting
pub const METRICS_SNAPSHOT_SHIFT: Duration = MINUTE;

/// Default length of the post-rollout metrics window
pub const METRICS_SNAPSHOT_WINDOW: Duration = Duration(30 * 60);

/// Lifecycle state of a rollout; later states compare greater
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentState {
    #[default]
    InProgress,
    Stuck,
    Cancelled,
    Deployed,
    Summary,
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeploymentState::InProgress => "in progress",
            DeploymentState::Stuck => "stuck",
            DeploymentState::Cancelled => "cancelled",
            DeploymentState::Deployed => "deployed",
            DeploymentState::Summary => "summary",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDeploymentDetails {
    pub container_images: Vec<String>,
}

/// Health summary of the window following a rollout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: Time,
    pub duration: Duration,
    pub requests: i64,
    pub errors: i64,
    /// Requests per latency bucket, keyed by the bucket bound with 3 decimals
    pub latency: BTreeMap<String, i64>,
    pub restarts: i64,
    /// CPU seconds consumed during the window
    pub cpu_usage: f32,
    /// Estimated memory growth per hour in bytes
    pub memory_leak: i64,
    pub oom_kills: i64,
    pub log_errors: i64,
    pub log_warnings: i64,
}

/// Notification progress, overall and per channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentNotifications {
    pub state: DeploymentState,
    #[serde(default)]
    pub channels: BTreeMap<String, DeploymentState>,
}

impl DeploymentNotifications {
    /// State already delivered through `channel`, if any
    pub fn channel_state(&self, channel: &str) -> Option<DeploymentState> {
        self.channels.get(channel).copied()
    }
}

/// One detected rollout of an application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDeployment {
    pub application_id: ApplicationId,
    /// Replica set that was rolled out
    pub name: String,
    pub started_at: Time,
    /// `None` until the rollout has been observed finishing
    pub finished_at: Option<Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ApplicationDeploymentDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_snapshot: Option<MetricsSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications: Option<DeploymentNotifications>,
}

impl ApplicationDeployment {
    pub fn new(application_id: ApplicationId, name: impl Into<String>, started_at: Time) -> Self {
        Self {
            application_id,
            name: name.into(),
            started_at,
            finished_at: None,
            details: None,
            metrics_snapshot: None,
            notifications: None,
        }
    }

    /// Deployments are identified by replica set name and start time
    pub fn is_same(&self, other: &ApplicationDeployment) -> bool {
        self.name == other.name && self.started_at == other.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ApplicationKind;

    #[test]
    fn test_state_ordering() {
        assert!(DeploymentState::InProgress < DeploymentState::Stuck);
        assert!(DeploymentState::Stuck < DeploymentState::Cancelled);
        assert!(DeploymentState::Cancelled < DeploymentState::Deployed);
        assert!(DeploymentState::Deployed < DeploymentState::Summary);
    }

    #[test]
    fn test_deployment_identity() {
        let id = ApplicationId::new("ns", ApplicationKind::Deployment, "api");
        let a = ApplicationDeployment::new(id.clone(), "api-7f9c", Time(100));
        let mut b = ApplicationDeployment::new(id.clone(), "api-7f9c", Time(100));
        b.finished_at = Some(Time(160));
        assert!(a.is_same(&b));
        assert!(!a.is_same(&ApplicationDeployment::new(id, "api-7f9c", Time(160))));
    }

    #[test]
    fn test_deployment_serialization_skips_empty_blocks() {
        let id = ApplicationId::new("ns", ApplicationKind::Deployment, "api");
        let d = ApplicationDeployment::new(id, "api-7f9c", Time(100));
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["name"], "api-7f9c");
        assert_eq!(json["started_at"], 100);
        assert!(json["finished_at"].is_null());
        assert!(json.get("metrics_snapshot").is_none());
        assert_eq!(json["application_id"]["kind"], "Deployment");
    }
}
