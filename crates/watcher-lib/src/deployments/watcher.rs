//! Periodic deployment watcher
//!
//! Every tick walks the registered projects one after another: the last
//! hour of each project's metrics is turned into a world, rollouts are
//! detected and persisted, due metrics snapshots are calculated and
//! pending notifications are sent. A failing project never stops the
//! pass; it is retried on the next tick.

use super::detector::{apply, calc_deployments, calc_initial_deployment, diff, Change};
use super::notify::{pending_notifications, NotificationSender, Notifier, SEND_TIMEOUT};
use super::snapshot::{calc_metrics_snapshot, due_snapshots, SnapshotSettings};
use crate::constructor::{Constructor, MetricsCache};
use crate::error::WatcherError;
use crate::health::{components, HealthRegistry};
use crate::model::{Application, ApplicationKind, Project, World};
use crate::observability::{StructuredLogger, WatcherMetrics};
use crate::store::DeploymentStore;
use crate::timeseries::{Duration, Time, HOUR};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant};
use tracing::{debug, error, info, warn};

/// Configuration of the watcher loop
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Time between passes (default: 60 seconds)
    pub interval: std::time::Duration,
    pub snapshot: SnapshotSettings,
    /// Bound of a single notification send (default: 30 seconds)
    pub send_timeout: std::time::Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            interval: std::time::Duration::from_secs(60),
            snapshot: SnapshotSettings::default(),
            send_timeout: SEND_TIMEOUT,
        }
    }
}

/// Counters of one pass over every project
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub projects: usize,
    pub failed_projects: usize,
    pub applications: usize,
    pub deployments_detected: usize,
    pub snapshots: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    pub store_errors: usize,
}

/// Mutable state threaded through one pass
#[derive(Debug, Default)]
struct Pass {
    stats: PassStats,
    last_cache_error: Option<String>,
    last_store_error: Option<String>,
    last_notification_error: Option<String>,
}

impl Pass {
    fn store_failed(&mut self, e: &WatcherError) {
        self.stats.store_errors += 1;
        self.last_store_error = Some(e.to_string());
    }
}

pub struct DeploymentWatcher {
    store: Arc<dyn DeploymentStore>,
    cache: Arc<dyn MetricsCache>,
    sender: NotificationSender,
    config: WatcherConfig,
    metrics: WatcherMetrics,
    logger: StructuredLogger,
    health: Option<HealthRegistry>,
}

impl DeploymentWatcher {
    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Run passes until `shutdown` fires
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            channels = ?self.sender.channels().collect::<Vec<_>>(),
            "Starting deployment watcher"
        );

        let mut ticker = interval(self.config.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(stats) => debug!(
                            projects = stats.projects,
                            failed_projects = stats.failed_projects,
                            applications = stats.applications,
                            deployments = stats.deployments_detected,
                            snapshots = stats.snapshots,
                            "Watcher pass complete"
                        ),
                        Err(e) => error!(error = %e, "Watcher pass failed"),
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down deployment watcher");
                    break;
                }
            }
        }
    }

    /// One pass over every project
    pub async fn run_once(&self) -> Result<PassStats> {
        let start = Instant::now();
        let projects = match self.store.get_projects().await {
            Ok(projects) => projects,
            Err(e) => {
                self.metrics.inc_pass_errors("store");
                if let Some(health) = &self.health {
                    health
                        .set_unhealthy(components::STORE, format!("failed to get projects: {e}"))
                        .await;
                }
                return Err(e.into());
            }
        };

        let mut pass = Pass::default();
        pass.stats.projects = projects.len();
        for project in &projects {
            if let Err(e) = self.watch_project(project, &mut pass).await {
                pass.stats.failed_projects += 1;
                pass.last_cache_error = Some(e.to_string());
                self.metrics.inc_pass_errors("cache");
                error!(project = %project.id, error = %e, "Failed to check deployments");
            }
        }

        self.metrics.set_applications_checked(pass.stats.applications as i64);
        self.metrics
            .observe_pass_latency(start.elapsed().as_secs_f64());
        if pass.stats.store_errors > 0 {
            self.metrics.inc_pass_errors("store");
        }
        self.record_health(&pass).await;

        Ok(pass.stats)
    }

    async fn record_health(&self, pass: &Pass) {
        let Some(health) = &self.health else {
            return;
        };
        let stats = &pass.stats;
        health
            .record_outcome(
                components::METRICS_CACHE,
                stats.failed_projects,
                stats.projects,
                pass.last_cache_error.as_deref(),
            )
            .await;
        match &pass.last_store_error {
            Some(e) => {
                health
                    .set_degraded(
                        components::STORE,
                        format!("{} writes failed: {e}", stats.store_errors),
                    )
                    .await
            }
            None => health.set_healthy(components::STORE).await,
        }
        match &pass.last_notification_error {
            Some(e) => {
                health
                    .set_degraded(
                        components::NOTIFIER,
                        format!("{} notifications failed: {e}", stats.notifications_failed),
                    )
                    .await
            }
            None => health.set_healthy(components::NOTIFIER).await,
        }
        health
            .record_pass(stats.projects, stats.failed_projects)
            .await;
    }

    /// Only metrics cache failures abort a project; store and notification
    /// failures are recorded in `pass` and skip the affected record.
    async fn watch_project(&self, project: &Project, pass: &mut Pass) -> Result<(), WatcherError> {
        let source = self.cache.source(&project.id);
        let to = source.get_to().await?;
        if to.is_zero() {
            return Err(WatcherError::CacheEmpty);
        }
        let step = project.refresh_interval;
        let constructor = Constructor::new(source);
        let mut world = constructor.load_world(to - HOUR, to, step, &[]).await?;

        match self.store.get_deployments(&project.id).await {
            Ok(known) => attach_deployments(&mut world, known),
            Err(e) => {
                error!(project = %project.id, error = %e, "Failed to get deployments");
                pass.store_failed(&e);
                return Ok(());
            }
        }

        let mut checked = 0;
        for app in world
            .applications
            .iter_mut()
            .filter(|a| a.id.kind == ApplicationKind::Deployment)
        {
            checked += 1;
            self.discover_deployments(project, app, to, pass).await;
        }

        for app in world.applications.iter_mut() {
            self.snapshot_deployments(project, &constructor, app, to, step, pass)
                .await;
        }

        if project.notify_of_deployments && !self.sender.is_empty() {
            for app in world.applications.iter_mut() {
                self.send_notifications(project, app, to, pass).await;
            }
        }

        pass.stats.applications += checked;
        info!(project = %project.id, applications = checked, "Checked deployments");
        Ok(())
    }

    async fn discover_deployments(
        &self,
        project: &Project,
        app: &mut Application,
        now: Time,
        pass: &mut Pass,
    ) {
        let detected = calc_deployments(app);

        if app.deployments.is_empty() && detected.is_empty() {
            let d = calc_initial_deployment(app, now);
            match self.store.save_deployment(&project.id, &d).await {
                Ok(()) => app.add_deployment(d),
                Err(e) => {
                    error!(application = %app.id, error = %e, "Failed to save deployment");
                    pass.store_failed(&e);
                }
            }
            return;
        }

        for d in detected {
            let change = diff(&app.deployments, &d);
            if change == Change::Unchanged {
                continue;
            }
            if let Err(e) = self.store.save_deployment(&project.id, &d).await {
                error!(application = %app.id, deployment = %d.name, error = %e, "Failed to save deployment");
                pass.store_failed(&e);
                return;
            }
            if change == Change::New {
                pass.stats.deployments_detected += 1;
                self.metrics.inc_deployments_detected();
                self.logger.log_deployment_detected(
                    &project.id.0,
                    &app.id.to_string(),
                    &d.name,
                    d.started_at.0,
                    d.finished_at.map(|t| t.0),
                );
            }
            apply(app, change, d);
        }
    }

    async fn snapshot_deployments(
        &self,
        project: &Project,
        constructor: &Constructor,
        app: &mut Application,
        now: Time,
        step: Duration,
        pass: &mut Pass,
    ) {
        for due in due_snapshots(app, now, step, self.config.snapshot) {
            let world = match constructor.load_world(due.from, due.to, step, &[]).await {
                Ok(world) => world,
                Err(e) => {
                    warn!(application = %app.id, error = %e, "Failed to load snapshot window");
                    continue;
                }
            };
            let Some(window_app) = world.get_application(&app.id) else {
                warn!(application = %app.id, "Unknown application");
                continue;
            };
            let snapshot = calc_metrics_snapshot(window_app, due.from, due.to, step);

            let d = &mut app.deployments[due.index];
            d.metrics_snapshot = Some(snapshot);
            if let Err(e) = self.store.save_metrics_snapshot(&project.id, d).await {
                error!(application = %app.id, deployment = %d.name, error = %e, "Failed to save metrics snapshot");
                d.metrics_snapshot = None;
                pass.store_failed(&e);
                continue;
            }
            pass.stats.snapshots += 1;
            self.metrics.inc_snapshots_calculated();
            if let Some(ms) = &d.metrics_snapshot {
                self.logger.log_snapshot_calculated(
                    &project.id.0,
                    &app.id.to_string(),
                    &d.name,
                    ms.requests,
                    ms.errors,
                    ms.restarts,
                );
            }
        }
    }

    async fn send_notifications(
        &self,
        project: &Project,
        app: &mut Application,
        now: Time,
        pass: &mut Pass,
    ) {
        for status in pending_notifications(app, now) {
            let app_id = app.id.to_string();
            let d = &mut app.deployments[status.index];
            let delivery = self.sender.deliver(project, d, status.state).await;

            for channel in &delivery.sent {
                pass.stats.notifications_sent += 1;
                self.metrics.inc_notifications_sent(channel);
            }
            for (channel, e) in &delivery.failed {
                pass.stats.notifications_failed += 1;
                pass.last_notification_error = Some(e.to_string());
                self.metrics.inc_notifications_failed(channel);
                self.logger
                    .log_notification_failed(&project.id.0, &app_id, channel, &e.to_string());
            }

            if delivery.advanced() {
                if let Err(e) = self.store.save_notifications(&project.id, d).await {
                    error!(application = %app_id, deployment = %d.name, error = %e, "Failed to save notifications");
                    pass.store_failed(&e);
                }
            }
        }
    }
}

/// Attach stored deployments to the applications of `world`; records of
/// applications absent from the window are ignored
fn attach_deployments(world: &mut World, known: Vec<crate::model::ApplicationDeployment>) {
    for d in known {
        if let Some(app) = world.get_application_mut(&d.application_id) {
            app.add_deployment(d);
        }
    }
}

/// Builder for the deployment watcher
pub struct DeploymentWatcherBuilder {
    store: Option<Arc<dyn DeploymentStore>>,
    cache: Option<Arc<dyn MetricsCache>>,
    notifiers: Vec<Arc<dyn Notifier>>,
    config: WatcherConfig,
    health: Option<HealthRegistry>,
    instance: String,
}

impl DeploymentWatcherBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            store: None,
            cache: None,
            notifiers: Vec::new(),
            config: WatcherConfig::default(),
            health: None,
            instance: "deploy-watcher".to_string(),
        }
    }

    pub fn store(mut self, store: Arc<dyn DeploymentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn MetricsCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Add a notification channel
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn interval(mut self, interval: std::time::Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn snapshot(mut self, settings: SnapshotSettings) -> Self {
        self.config.snapshot = settings;
        self
    }

    pub fn send_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.send_timeout = timeout;
        self
    }

    /// Report component health to `health` after every pass
    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Instance name attached to structured log events
    pub fn instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = instance.into();
        self
    }

    pub fn build(self) -> Result<DeploymentWatcher> {
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("Store is required"))?;
        let cache = self
            .cache
            .ok_or_else(|| anyhow::anyhow!("Metrics cache is required"))?;

        Ok(DeploymentWatcher {
            store,
            cache,
            sender: NotificationSender::new(self.notifiers, self.config.send_timeout),
            config: self.config,
            metrics: WatcherMetrics::new(),
            logger: StructuredLogger::new(self.instance),
            health: self.health,
        })
    }
}

impl Default for DeploymentWatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
