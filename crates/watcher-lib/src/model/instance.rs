//! Instances (pods) and their containers

use super::Connection;
use crate::timeseries::{any, merge, TimeSeries, NAN};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContainerStatus {
    #[default]
    Unknown,
    Waiting,
    Running,
    Terminated,
}

#[derive(Debug, Clone, Default)]
pub struct Container {
    pub name: String,
    pub status: ContainerStatus,
    /// Reason reported with the current status
    pub reason: String,
    pub last_terminated_reason: String,
    pub init_container: bool,
    pub ready: bool,
    pub image: String,
    /// CPU seconds consumed per second
    pub cpu_usage: Option<TimeSeries>,
    pub memory_rss: Option<TimeSeries>,
    /// Restarts per step
    pub restarts: Option<TimeSeries>,
    /// OOM kills per step
    pub oom_kills: Option<TimeSeries>,
}

impl Container {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Pod metadata attached to an instance
#[derive(Debug, Clone, Default)]
pub struct Pod {
    /// Owning replica set, empty if not owned by one
    pub replica_set: String,
    pub phase: String,
    pub scheduled: bool,
    /// Sum of every phase series; positive while the pod exists
    pub life_span: Option<TimeSeries>,
    pub running: Option<TimeSeries>,
    pub ready: Option<TimeSeries>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Listen {
    pub ip: String,
    pub port: String,
    pub proxied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Critical,
    Error,
    Warning,
    Info,
    Debug,
    Unknown,
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "critical" | "fatal" => LogLevel::Critical,
            "error" => LogLevel::Error,
            "warning" | "warn" => LogLevel::Warning,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            _ => LogLevel::Unknown,
        }
    }
}

/// Database cluster role, encoded in role series as its numeric value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterRole {
    Primary = 1,
    Replica = 2,
}

impl ClusterRole {
    pub fn parse(role: &str) -> Option<Self> {
        match role.to_ascii_lowercase().as_str() {
            "primary" | "master" => Some(ClusterRole::Primary),
            "replica" | "standby" | "slave" => Some(ClusterRole::Replica),
            _ => None,
        }
    }

    pub fn from_value(v: f32) -> Option<Self> {
        match v {
            v if v == ClusterRole::Primary as i32 as f32 => Some(ClusterRole::Primary),
            v if v == ClusterRole::Replica as i32 as f32 => Some(ClusterRole::Replica),
            _ => None,
        }
    }
}

/// One running copy of an application
#[derive(Debug, Clone)]
pub struct Instance {
    pub name: String,
    pub node: Option<String>,
    pub pod: Option<Pod>,
    pub containers: BTreeMap<String, Container>,
    /// Listen address -> whether it was active at the end of the window
    pub tcp_listens: HashMap<Listen, bool>,
    pub cluster_name: Option<String>,
    pub cluster_role: Option<TimeSeries>,
    pub log_messages_by_level: BTreeMap<LogLevel, TimeSeries>,
    pub upstreams: Vec<Connection>,
}

impl Instance {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node: None,
            pod: None,
            containers: BTreeMap::new(),
            tcp_listens: HashMap::new(),
            cluster_name: None,
            cluster_role: None,
            log_messages_by_level: BTreeMap::new(),
            upstreams: Vec::new(),
        }
    }

    pub fn get_or_create_container(&mut self, name: &str) -> &mut Container {
        self.containers
            .entry(name.to_string())
            .or_insert_with(|| Container::new(name))
    }

    /// Record the role seen while `values` was positive; unknown roles are ignored
    pub fn update_cluster_role(&mut self, role: &str, values: &TimeSeries) {
        let Some(role) = ClusterRole::parse(role) else {
            return;
        };
        let code = role as i32 as f32;
        let ts = values.map(|_, v| if v > 0.0 { code } else { NAN });
        merge(&mut self.cluster_role, &ts, any);
    }

    /// Role at the end of the window
    pub fn cluster_role(&self) -> Option<ClusterRole> {
        self.cluster_role
            .as_ref()
            .and_then(|ts| ts.last_not_null())
            .and_then(|(_, v)| ClusterRole::from_value(v))
    }

    /// Liveness series used to gate counters: the pod's running series,
    /// falling back to the lifespan
    pub fn liveness(&self) -> Option<&TimeSeries> {
        let pod = self.pod.as_ref()?;
        pod.running.as_ref().or(pod.life_span.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeseries::{Duration, Time};

    #[test]
    fn test_get_or_create_container() {
        let mut instance = Instance::new("api-1");
        instance.get_or_create_container("app").ready = true;
        assert!(instance.get_or_create_container("app").ready);
        assert_eq!(instance.containers.len(), 1);
    }

    #[test]
    fn test_cluster_role() {
        let mut instance = Instance::new("pg-0");
        let values = TimeSeries::with_data(Time(0), Duration(10), vec![1.0, 1.0]);
        instance.update_cluster_role("bootstrap", &values);
        assert!(instance.cluster_role.is_none());
        instance.update_cluster_role("master", &values);
        assert_eq!(instance.cluster_role(), Some(ClusterRole::Primary));
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::from("ERROR"), LogLevel::Error);
        assert_eq!(LogLevel::from("warn"), LogLevel::Warning);
        assert_eq!(LogLevel::from("trace"), LogLevel::Unknown);
    }
}
