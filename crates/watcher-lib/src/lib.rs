//! Deployment watcher library
//!
//! This crate provides the core functionality for:
//! - Fixed-step time series and their arithmetic
//! - Grouping Prometheus-style query results by catalog query
//! - Reconstructing the cluster topology (`World`) of a time window
//! - Detecting rollouts and summarizing the metrics that follow them
//! - Deployment storage, notifications, health checks and observability

pub mod cache;
pub mod constructor;
pub mod deployments;
pub mod error;
pub mod health;
pub mod ingest;
pub mod model;
pub mod observability;
pub mod store;
pub mod timeseries;

pub use cache::FileCache;
pub use constructor::{Constructor, MetricsCache, MetricsSource};
pub use deployments::{
    DeploymentWatcher, DeploymentWatcherBuilder, LogNotifier, Notifier, PassStats, WatcherConfig,
};
pub use error::{Result, WatcherError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, PassRecord,
    ReadinessResponse,
};
pub use observability::{StructuredLogger, WatcherMetrics};
pub use store::{DeploymentStore, MemoryStore};
