//! Lifecycle state of each known rollout

use crate::model::{Application, DeploymentState};
use crate::timeseries::{Duration, Time, MINUTE};

/// An unfinished rollout older than this is reported as stuck
pub const STUCK_AFTER: Duration = Duration(30 * MINUTE.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeploymentStatus {
    /// Index into the application's deployments
    pub index: usize,
    pub state: DeploymentState,
}

pub fn calc_deployment_statuses(app: &Application, now: Time) -> Vec<DeploymentStatus> {
    let last = app.deployments.len().saturating_sub(1);
    app.deployments
        .iter()
        .enumerate()
        .map(|(index, d)| {
            let state = if d.metrics_snapshot.is_some() {
                DeploymentState::Summary
            } else if d.finished_at.is_some() {
                DeploymentState::Deployed
            } else if index < last {
                DeploymentState::Cancelled
            } else if now - d.started_at > STUCK_AFTER {
                DeploymentState::Stuck
            } else {
                DeploymentState::InProgress
            };
            DeploymentStatus { index, state }
        })
        .collect()
}
