//! Deployment tracking
//!
//! Detects rollouts of `Deployment` applications from the life spans of
//! their replica sets, summarizes the window that follows each rollout and
//! keeps notification channels informed about their progress.

mod detector;
mod notify;
mod snapshot;
mod status;
mod watcher;


pub use detector::{
    apply, calc_deployments, calc_initial_deployment, detect, diff, Change,
    Detection,
};
pub use notify::{
    pending_notifications, send_with_timeout, Delivery, DeploymentNotification, LogNotifier,
    NotificationSender, Notifier, NOTIFY_WITHIN, SEND_TIMEOUT,
};
pub use snapshot::{
    calc_metrics_snapshot, due_snapshots, snapshot_window, DueSnapshot, SnapshotSettings,
};
pub use status::{calc_deployment_statuses, DeploymentStatus, STUCK_AFTER};
pub use watcher::{DeploymentWatcher, DeploymentWatcherBuilder, PassStats, WatcherConfig};
