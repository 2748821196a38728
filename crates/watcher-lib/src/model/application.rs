//! Applications and their identity

use super::{ApplicationDeployment, Instance};
use crate::error::WatcherError;
use crate::timeseries::TimeSeries;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Workload kind owning a set of pods
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ApplicationKind {
    Deployment,
    StatefulSet,
    DaemonSet,
    ReplicaSet,
    CronJob,
    Job,
    StaticPods,
    Unknown(String),
}

impl ApplicationKind {
    pub fn as_str(&self) -> &str {
        match self {
            ApplicationKind::Deployment => "Deployment",
            ApplicationKind::StatefulSet => "StatefulSet",
            ApplicationKind::DaemonSet => "DaemonSet",
            ApplicationKind::ReplicaSet => "ReplicaSet",
            ApplicationKind::CronJob => "CronJob",
            ApplicationKind::Job => "Job",
            ApplicationKind::StaticPods => "StaticPods",
            ApplicationKind::Unknown(kind) => kind,
        }
    }
}

impl From<&str> for ApplicationKind {
    fn from(s: &str) -> Self {
        match s {
            "Deployment" => ApplicationKind::Deployment,
            "StatefulSet" => ApplicationKind::StatefulSet,
            "DaemonSet" => ApplicationKind::DaemonSet,
            "ReplicaSet" => ApplicationKind::ReplicaSet,
            "CronJob" => ApplicationKind::CronJob,
            "Job" => ApplicationKind::Job,
            "StaticPods" => ApplicationKind::StaticPods,
            other => ApplicationKind::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for ApplicationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ApplicationKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ApplicationKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ApplicationKind::from(s.as_str()))
    }
}

/// Value identity of a workload: `(namespace, kind, name)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId {
    pub namespace: String,
    pub kind: ApplicationKind,
    pub name: String,
}

impl ApplicationId {
    pub fn new(namespace: impl Into<String>, kind: ApplicationKind, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.kind, self.name)
    }
}

impl FromStr for ApplicationId {
    type Err = WatcherError;

    /// Parses `namespace:Kind:name`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(ns), Some(kind), Some(name)) if !kind.is_empty() && !name.is_empty() => {
                Ok(ApplicationId::new(ns, ApplicationKind::from(kind), name))
            }
            _ => Err(WatcherError::Parse(format!("invalid application id: {s:?}"))),
        }
    }
}

/// Request/error rate indicator
#[derive(Debug, Clone, Default)]
pub struct AvailabilitySli {
    /// Requests per second
    pub total_requests: Option<TimeSeries>,
    /// Failed requests per second
    pub failed_requests: Option<TimeSeries>,
}

#[derive(Debug, Clone)]
pub struct HistogramBucket {
    /// Bucket upper bound in seconds
    pub le: f32,
    /// Observations per second falling into the cumulative bucket
    pub series: TimeSeries,
}

#[derive(Debug, Clone, Default)]
pub struct LatencySli {
    pub histogram: Vec<HistogramBucket>,
}

/// A workload and its runtime state within one world window
#[derive(Debug, Clone)]
pub struct Application {
    pub id: ApplicationId,
    pub instances: Vec<Instance>,
    pub desired_instances: Option<TimeSeries>,
    /// Known rollouts in start-time order
    pub deployments: Vec<ApplicationDeployment>,
    pub availability_slis: Vec<AvailabilitySli>,
    pub latency_slis: Vec<LatencySli>,
}

impl Application {
    pub fn new(id: ApplicationId) -> Self {
        Self {
            id,
            instances: Vec::new(),
            desired_instances: None,
            deployments: Vec::new(),
            availability_slis: Vec::new(),
            latency_slis: Vec::new(),
        }
    }

    pub fn instance_index(&self, name: &str) -> Option<usize> {
        self.instances.iter().position(|i| i.name == name)
    }

    /// Index of the instance named `name`, creating it if needed
    pub fn get_or_create_instance(&mut self, name: &str, node: Option<&str>) -> usize {
        if let Some(idx) = self.instance_index(name) {
            let instance = &mut self.instances[idx];
            if instance.node.is_none() {
                instance.node = node.map(str::to_string);
            }
            return idx;
        }
        let mut instance = Instance::new(name);
        instance.node = node.map(str::to_string);
        self.instances.push(instance);
        self.instances.len() - 1
    }

    /// Insert a deployment keeping start-time order
    pub fn add_deployment(&mut self, deployment: ApplicationDeployment) {
        let pos = self
            .deployments
            .partition_point(|d| d.started_at <= deployment.started_at);
        self.deployments.insert(pos, deployment);
    }
}
