//! Observability for the deployment watcher
//!
//! Provides:
//! - Prometheus metrics (pass latency, detected deployments, snapshots, notifications)
//! - Structured JSON logging of watcher events with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for pass latency (in seconds)
const PASS_LATENCY_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

static GLOBAL_METRICS: OnceLock<WatcherMetricsInner> = OnceLock::new();

struct WatcherMetricsInner {
    pass_latency_seconds: Histogram,
    applications_checked: IntGauge,
    deployments_detected: IntCounter,
    snapshots_calculated: IntCounter,
    notifications: IntCounterVec,
    pass_errors: IntCounterVec,
}

impl WatcherMetricsInner {
    fn new() -> Self {
        Self {
            pass_latency_seconds: register_histogram!(
                "deploy_watcher_pass_latency_seconds",
                "Time spent on one watcher pass over a project",
                PASS_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register pass_latency_seconds"),

            applications_checked: register_int_gauge!(
                "deploy_watcher_applications_checked",
                "Deployment applications checked in the last pass"
            )
            .expect("Failed to register applications_checked"),

            deployments_detected: register_int_counter!(
                "deploy_watcher_deployments_detected_total",
                "Total number of new deployments detected"
            )
            .expect("Failed to register deployments_detected"),

            snapshots_calculated: register_int_counter!(
                "deploy_watcher_snapshots_calculated_total",
                "Total number of post-deployment metrics snapshots calculated"
            )
            .expect("Failed to register snapshots_calculated"),

            notifications: register_int_counter_vec!(
                "deploy_watcher_notifications_total",
                "Deployment notifications by channel and outcome",
                &["channel", "outcome"]
            )
            .expect("Failed to register notifications"),

            pass_errors: register_int_counter_vec!(
                "deploy_watcher_pass_errors_total",
                "Errors during watcher passes by stage",
                &["stage"]
            )
            .expect("Failed to register pass_errors"),
        }
    }
}

/// Watcher metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct WatcherMetrics {
    _private: (),
}

impl Default for WatcherMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl WatcherMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(WatcherMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &WatcherMetricsInner {
        GLOBAL_METRICS.get_or_init(WatcherMetricsInner::new)
    }

    pub fn observe_pass_latency(&self, duration_secs: f64) {
        self.inner().pass_latency_seconds.observe(duration_secs);
    }

    pub fn set_applications_checked(&self, count: i64) {
        self.inner().applications_checked.set(count);
    }

    pub fn inc_deployments_detected(&self) {
        self.inner().deployments_detected.inc();
    }

    pub fn inc_snapshots_calculated(&self) {
        self.inner().snapshots_calculated.inc();
    }

    pub fn inc_notifications_sent(&self, channel: &str) {
        self.inner()
            .notifications
            .with_label_values(&[channel, "sent"])
            .inc();
    }

    pub fn inc_notifications_failed(&self, channel: &str) {
        self.inner()
            .notifications
            .with_label_values(&[channel, "failed"])
            .inc();
    }

    /// Count a failed pass stage (`cache`, `world`, `store`, `snapshot`)
    pub fn inc_pass_errors(&self, stage: &str) {
        self.inner().pass_errors.with_label_values(&[stage]).inc();
    }
}

/// Structured logger for watcher events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, interval_secs: u64, projects: usize) {
        info!(
            event = "watcher_started",
            instance = %self.instance,
            version = %version,
            interval_secs = interval_secs,
            projects = projects,
            "Deployment watcher started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "watcher_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Deployment watcher shutting down"
        );
    }

    pub fn log_deployment_detected(
        &self,
        project: &str,
        application: &str,
        name: &str,
        started_at: i64,
        finished_at: Option<i64>,
    ) {
        info!(
            event = "deployment_detected",
            instance = %self.instance,
            project = %project,
            application = %application,
            deployment = %name,
            started_at = started_at,
            finished_at = ?finished_at,
            "New deployment detected"
        );
    }

    pub fn log_snapshot_calculated(
        &self,
        project: &str,
        application: &str,
        name: &str,
        requests: i64,
        errors: i64,
        restarts: i64,
    ) {
        info!(
            event = "snapshot_calculated",
            instance = %self.instance,
            project = %project,
            application = %application,
            deployment = %name,
            requests = requests,
            errors = errors,
            restarts = restarts,
            "Deployment metrics snapshot calculated"
        );
    }

    pub fn log_notification_failed(
        &self,
        project: &str,
        application: &str,
        channel: &str,
        error: &str,
    ) {
        warn!(
            event = "notification_failed",
            instance = %self.instance,
            project = %project,
            application = %application,
            channel = %channel,
            error = %error,
            "Failed to send deployment notification"
        );
    }
}
