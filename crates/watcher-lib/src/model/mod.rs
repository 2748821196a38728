//! Topology model rebuilt for every time window

mod application;
mod deployment;
mod infra;
mod instance;
mod labels;
mod project;
mod world;

pub use application::{
    Application, ApplicationId, ApplicationKind, AvailabilitySli, HistogramBucket, LatencySli,
};
pub use deployment::{
    ApplicationDeployment, ApplicationDeploymentDetails, DeploymentNotifications, DeploymentState,
    MetricsSnapshot, METRICS_SNAPSHOT_SHIFT, METRICS_SNAPSHOT_WINDOW,
};
pub use infra::{split_addr, Connection, Node, Service, ServiceConnection};
pub use instance::{ClusterRole, Container, ContainerStatus, Instance, Listen, LogLevel, Pod};
pub use labels::{keys, Labels};
pub use project::{Project, ProjectId, DEFAULT_REFRESH_INTERVAL};
pub use world::{InstanceRef, IntegrationStatus, World};
