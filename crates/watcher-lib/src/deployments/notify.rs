//! Deployment notifications
//!
//! Every channel is tried independently under its own timeout; a channel
//! that fails keeps its previous state and is retried on the next pass.

use super::status::{calc_deployment_statuses, DeploymentStatus};
use crate::error::{Result, WatcherError};
use crate::model::{
    Application, ApplicationDeployment, DeploymentNotifications, DeploymentState, Project,
};
use crate::timeseries::{Duration, Time, DAY};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Default bound of a single notification send
pub const SEND_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Deployments that started longer ago than this are never notified
pub const NOTIFY_WITHIN: Duration = DAY;

/// What a channel is told about a deployment
#[derive(Debug, Clone, Copy)]
pub struct DeploymentNotification<'a> {
    pub project: &'a Project,
    pub deployment: &'a ApplicationDeployment,
    pub state: DeploymentState,
}

/// One outbound notification channel
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name, as listed in a project's `channels`
    fn channel(&self) -> &str;

    async fn send_deployment(&self, notification: &DeploymentNotification<'_>) -> Result<()>;
}

/// Emits notifications as structured log events
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub const CHANNEL: &'static str = "log";
}

#[async_trait]
impl Notifier for LogNotifier {
    fn channel(&self) -> &str {
        Self::CHANNEL
    }

    async fn send_deployment(&self, n: &DeploymentNotification<'_>) -> Result<()> {
        let d = n.deployment;
        let images = d
            .details
            .as_ref()
            .map(|details| details.container_images.join(","))
            .unwrap_or_default();
        info!(
            event = "deployment_notification",
            project = %n.project.name,
            application = %d.application_id,
            deployment = %d.name,
            state = %n.state,
            started_at = d.started_at.0,
            images = %images,
            "Deployment {}",
            n.state
        );
        Ok(())
    }
}

pub async fn send_with_timeout(
    notifier: &dyn Notifier,
    notification: &DeploymentNotification<'_>,
    timeout: std::time::Duration,
) -> Result<()> {
    match tokio::time::timeout(timeout, notifier.send_deployment(notification)).await {
        Ok(res) => res,
        Err(_) => Err(WatcherError::Timeout {
            operation: format!("{} notification", notifier.channel()),
            secs: timeout.as_secs(),
        }),
    }
}

/// Statuses of `app` that have not been notified yet and are fresh enough
pub fn pending_notifications(app: &Application, now: Time) -> Vec<DeploymentStatus> {
    calc_deployment_statuses(app, now)
        .into_iter()
        .filter(|s| {
            let d = &app.deployments[s.index];
            if now - d.started_at > NOTIFY_WITHIN {
                return false;
            }
            d.notifications
                .as_ref()
                .map_or(true, |n| n.state < s.state)
        })
        .collect()
}

/// Result of delivering one deployment state
#[derive(Debug, Default)]
pub struct Delivery {
    pub sent: Vec<String>,
    pub failed: Vec<(String, WatcherError)>,
}

impl Delivery {
    /// True if any channel state advanced and must be persisted
    pub fn advanced(&self) -> bool {
        !self.sent.is_empty()
    }
}

/// Fan-out of notifications over the configured channels
#[derive(Clone)]
pub struct NotificationSender {
    notifiers: Vec<Arc<dyn Notifier>>,
    timeout: std::time::Duration,
}

impl NotificationSender {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>, timeout: std::time::Duration) -> Self {
        Self { notifiers, timeout }
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.notifiers.iter().map(|n| n.channel())
    }

    /// Send `state` of `d` to every channel the project enables and that
    /// has not seen it yet, recording per-channel progress on `d`
    pub async fn deliver(
        &self,
        project: &Project,
        d: &mut ApplicationDeployment,
        state: DeploymentState,
    ) -> Delivery {
        let current = d.clone();
        let notification = DeploymentNotification {
            project,
            deployment: &current,
            state,
        };
        let notifications = d
            .notifications
            .get_or_insert_with(DeploymentNotifications::default);
        let mut delivery = Delivery::default();

        for notifier in &self.notifiers {
            let channel = notifier.channel();
            if !project.notifies(channel) {
                continue;
            }
            if notifications
                .channel_state(channel)
                .is_some_and(|sent| sent >= state)
            {
                continue;
            }
            match send_with_timeout(notifier.as_ref(), &notification, self.timeout).await {
                Ok(()) => {
                    notifications.channels.insert(channel.to_string(), state);
                    delivery.sent.push(channel.to_string());
                }
                Err(e) => delivery.failed.push((channel.to_string(), e)),
            }
        }

        if delivery.failed.is_empty() && delivery.advanced() {
            notifications.state = state;
        }
        delivery
    }
}
