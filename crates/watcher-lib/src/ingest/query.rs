//! Catalog of metric queries the constructor consumes

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// One logical query of the catalog; results are dispatched on this tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Query {
    NodeInfo,
    ServiceInfo,
    ReplicaSetOwner,
    PodInfo,
    PodLabels,
    PodStatusPhase,
    PodStatusReady,
    PodStatusScheduled,
    InitContainerInfo,
    ContainerInfo,
    ContainerStatusReady,
    ContainerStatusWaiting,
    ContainerStatusRunning,
    ContainerStatusTerminated,
    ContainerStatusWaitingReason,
    ContainerStatusTerminatedReason,
    ContainerStatusLastTerminatedReason,
    ContainerRestarts,
    DeploymentSpecReplicas,
    StatefulSetReplicas,
    DaemonSetDesiredScheduled,
    ContainerCpuUsage,
    ContainerMemoryRss,
    ContainerOomKills,
    ContainerLogMessages,
    ContainerNetTcpActiveConnections,
    SliRequestsTotal,
    SliRequestsFailed,
    SliLatencyBucket,
}

/// Family of queries sharing one handler in the constructor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryFamily {
    Nodes,
    Services,
    ReplicaSets,
    Pods,
    PodStatus,
    ContainerStatus,
    DesiredReplicas,
    ContainerResources,
    Connections,
    Sli,
}

impl Query {
    /// Every query, in the order the constructor applies them
    pub const ALL: [Query; 29] = [
        Query::NodeInfo,
        Query::ServiceInfo,
        Query::ReplicaSetOwner,
        Query::PodInfo,
        Query::PodLabels,
        Query::PodStatusPhase,
        Query::PodStatusReady,
        Query::PodStatusScheduled,
        Query::InitContainerInfo,
        Query::ContainerInfo,
        Query::ContainerStatusReady,
        Query::ContainerStatusWaiting,
        Query::ContainerStatusRunning,
        Query::ContainerStatusTerminated,
        Query::ContainerStatusWaitingReason,
        Query::ContainerStatusTerminatedReason,
        Query::ContainerStatusLastTerminatedReason,
        Query::ContainerRestarts,
        Query::DeploymentSpecReplicas,
        Query::StatefulSetReplicas,
        Query::DaemonSetDesiredScheduled,
        Query::ContainerCpuUsage,
        Query::ContainerMemoryRss,
        Query::ContainerOomKills,
        Query::ContainerLogMessages,
        Query::ContainerNetTcpActiveConnections,
        Query::SliRequestsTotal,
        Query::SliRequestsFailed,
        Query::SliLatencyBucket,
    ];

    /// Name the metrics cache stores the query result under
    pub fn name(self) -> &'static str {
        match self {
            Query::NodeInfo => "kube_node_info",
            Query::ServiceInfo => "kube_service_info",
            Query::ReplicaSetOwner => "kube_replicaset_owner",
            Query::PodInfo => "kube_pod_info",
            Query::PodLabels => "kube_pod_labels",
            Query::PodStatusPhase => "kube_pod_status_phase",
            Query::PodStatusReady => "kube_pod_status_ready",
            Query::PodStatusScheduled => "kube_pod_status_scheduled",
            Query::InitContainerInfo => "kube_pod_init_container_info",
            Query::ContainerInfo => "kube_pod_container_info",
            Query::ContainerStatusReady => "kube_pod_container_status_ready",
            Query::ContainerStatusWaiting => "kube_pod_container_status_waiting",
            Query::ContainerStatusRunning => "kube_pod_container_status_running",
            Query::ContainerStatusTerminated => "kube_pod_container_status_terminated",
            Query::ContainerStatusWaitingReason => "kube_pod_container_status_waiting_reason",
            Query::ContainerStatusTerminatedReason => "kube_pod_container_status_terminated_reason",
            Query::ContainerStatusLastTerminatedReason => {
                "kube_pod_container_status_last_terminated_reason"
            }
            Query::ContainerRestarts => "kube_pod_container_status_restarts_total",
            Query::DeploymentSpecReplicas => "kube_deployment_spec_replicas",
            Query::StatefulSetReplicas => "kube_statefulset_replicas",
            Query::DaemonSetDesiredScheduled => "kube_daemonset_status_desired_number_scheduled",
            Query::ContainerCpuUsage => "container_resources_cpu_usage_seconds_total",
            Query::ContainerMemoryRss => "container_resources_memory_rss_bytes",
            Query::ContainerOomKills => "container_oom_kills_total",
            Query::ContainerLogMessages => "container_log_messages_total",
            Query::ContainerNetTcpActiveConnections => "container_net_tcp_active_connections",
            Query::SliRequestsTotal => "sli_requests_total",
            Query::SliRequestsFailed => "sli_requests_failed",
            Query::SliLatencyBucket => "sli_latency_bucket",
        }
    }

    /// Resolve a cache name; `None` for names outside the catalog
    pub fn from_name(name: &str) -> Option<Query> {
        static BY_NAME: OnceLock<HashMap<&'static str, Query>> = OnceLock::new();
        BY_NAME
            .get_or_init(|| Query::ALL.iter().map(|q| (q.name(), *q)).collect())
            .get(name)
            .copied()
    }

    pub fn family(self) -> QueryFamily {
        match self {
            Query::NodeInfo => QueryFamily::Nodes,
            Query::ServiceInfo => QueryFamily::Services,
            Query::ReplicaSetOwner => QueryFamily::ReplicaSets,
            Query::PodInfo | Query::PodLabels => QueryFamily::Pods,
            Query::PodStatusPhase | Query::PodStatusReady | Query::PodStatusScheduled => {
                QueryFamily::PodStatus
            }
            Query::InitContainerInfo
            | Query::ContainerInfo
            | Query::ContainerStatusReady
            | Query::ContainerStatusWaiting
            | Query::ContainerStatusRunning
            | Query::ContainerStatusTerminated
            | Query::ContainerStatusWaitingReason
            | Query::ContainerStatusTerminatedReason
            | Query::ContainerStatusLastTerminatedReason
            | Query::ContainerRestarts => QueryFamily::ContainerStatus,
            Query::DeploymentSpecReplicas
            | Query::StatefulSetReplicas
            | Query::DaemonSetDesiredScheduled => QueryFamily::DesiredReplicas,
            Query::ContainerCpuUsage
            | Query::ContainerMemoryRss
            | Query::ContainerOomKills
            | Query::ContainerLogMessages => QueryFamily::ContainerResources,
            Query::ContainerNetTcpActiveConnections => QueryFamily::Connections,
            Query::SliRequestsTotal | Query::SliRequestsFailed | Query::SliLatencyBucket => {
                QueryFamily::Sli
            }
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
