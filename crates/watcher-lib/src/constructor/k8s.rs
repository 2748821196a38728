//! Kubernetes metadata: nodes, services, pods and their owners

use super::values;
use crate::ingest::{Metrics, MetricValues, Query, QueryFamily};
use crate::model::{
    keys, ApplicationId, ApplicationKind, ContainerStatus, InstanceRef, Labels, Listen, Node, Pod,
    Service, World,
};
use crate::timeseries::{any, increase, merge, nan_sum, TimeSeries};
use std::collections::HashMap;
use std::net::IpAddr;
use tracing::{debug, warn};

/// Instances created from `kube_pod_info`, addressable by pod uid or by
/// `(namespace, pod)`
#[derive(Debug, Default)]
pub struct Pods {
    by_uid: HashMap<String, InstanceRef>,
    by_name: HashMap<(String, String), InstanceRef>,
}

impl Pods {
    fn insert(&mut self, labels: &Labels, r: InstanceRef) {
        self.by_uid.insert(labels.uid().to_string(), r);
        self.by_name
            .insert((labels.namespace().to_string(), labels.pod().to_string()), r);
    }

    pub fn by_uid(&self, uid: &str) -> Option<InstanceRef> {
        self.by_uid.get(uid).copied()
    }

    pub fn by_name(&self, namespace: &str, pod: &str) -> Option<InstanceRef> {
        self.by_name
            .get(&(namespace.to_string(), pod.to_string()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.by_uid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_uid.is_empty()
    }

    /// Resolve the instance of a secondary sample by its `uid` label
    fn resolve(&self, m: &MetricValues) -> Option<InstanceRef> {
        let r = self.by_uid(m.labels.uid());
        if r.is_none() {
            warn!(
                uid = m.labels.uid(),
                pod = m.labels.pod(),
                namespace = m.labels.namespace(),
                "Unknown pod"
            );
        }
        r
    }
}

pub(super) fn load_nodes(w: &mut World, metrics: &[MetricValues]) {
    for m in metrics {
        let name = m.labels.node();
        if name.is_empty() {
            continue;
        }
        let idx = match w.nodes.iter().position(|n| n.name == name) {
            Some(idx) => idx,
            None => {
                w.nodes.push(Node::new(name));
                w.nodes.len() - 1
            }
        };
        let node = &mut w.nodes[idx];
        if node.internal_ip.is_empty() {
            node.internal_ip = m.labels.internal_ip().to_string();
        }
        merge(&mut node.up, &m.values, any);
    }
}

pub(super) fn load_kubernetes_metadata(w: &mut World, metrics: &Metrics) -> Pods {
    load_services(w, values(metrics, Query::ServiceInfo));
    let owners = replica_set_owners(values(metrics, Query::ReplicaSetOwner));
    let pods = pod_info(w, values(metrics, Query::PodInfo), &owners);
    pod_labels(w, values(metrics, Query::PodLabels), &pods);

    for query in Query::ALL {
        match query.family() {
            QueryFamily::PodStatus => pod_status(w, query, values(metrics, query), &pods),
            QueryFamily::ContainerStatus => {
                pod_container_status(w, query, values(metrics, query), &pods)
            }
            _ => {}
        }
    }
    load_applications(w, metrics);
    pods
}

fn load_services(w: &mut World, metrics: &[MetricValues]) {
    for m in metrics {
        let cluster_ip = m.labels.cluster_ip();
        if cluster_ip.is_empty() {
            continue;
        }
        let name = match m.labels.service() {
            "kubernetes" => "kube-apiserver",
            name => name,
        };
        if w.get_service_by_ip(cluster_ip).is_some() {
            continue;
        }
        w.services
            .push(Service::new(name, m.labels.namespace(), cluster_ip));
    }
}

/// `(namespace, replica set)` -> `(owner kind, owner name)`
fn replica_set_owners(metrics: &[MetricValues]) -> HashMap<(String, String), (String, String)> {
    metrics
        .iter()
        .filter(|m| !m.labels.owner_kind().is_empty() && !m.labels.owner_name().is_empty())
        .map(|m| {
            (
                (
                    m.labels.namespace().to_string(),
                    m.labels.replicaset().to_string(),
                ),
                (
                    m.labels.owner_kind().to_string(),
                    m.labels.owner_name().to_string(),
                ),
            )
        })
        .collect()
}

/// Application owning a pod, `None` when ownership is only half specified
fn pod_owner(
    labels: &Labels,
    owners: &HashMap<(String, String), (String, String)>,
) -> Option<ApplicationId> {
    let ns = labels.namespace();
    let owner_kind = labels.created_by_kind();
    let owner_name = labels.created_by_name();
    match owner_kind {
        "" | "<none>" | "Node" => {
            let node = labels.node();
            let pod = labels.pod();
            let name = pod
                .strip_suffix(&format!("-{node}"))
                .unwrap_or(pod);
            Some(ApplicationId::new(ns, ApplicationKind::StaticPods, name))
        }
        _ if owner_name.is_empty() => None,
        "ReplicaSet" => match owners.get(&(ns.to_string(), owner_name.to_string())) {
            Some((kind, name)) if kind == "Deployment" => Some(ApplicationId::new(
                ns,
                ApplicationKind::Deployment,
                name.as_str(),
            )),
            _ => Some(ApplicationId::new(ns, ApplicationKind::ReplicaSet, owner_name)),
        },
        kind => Some(ApplicationId::new(ns, ApplicationKind::from(kind), owner_name)),
    }
}

fn pod_info(
    w: &mut World,
    metrics: &[MetricValues],
    owners: &HashMap<(String, String), (String, String)>,
) -> Pods {
    let mut pods = Pods::default();
    for m in metrics {
        w.integration_status.kube_state_metrics_installed = true;
        let Some(app_id) = pod_owner(&m.labels, owners) else {
            debug!(
                pod = m.labels.pod(),
                namespace = m.labels.namespace(),
                "Skipping pod with incomplete owner"
            );
            continue;
        };
        let node = w.get_node(m.labels.node()).map(|n| n.name.clone());
        let app = w.get_or_create_application_index(app_id);
        let instance = w.applications[app].get_or_create_instance(m.labels.pod(), node.as_deref());
        let r = InstanceRef { app, instance };
        let Some(instance) = w.instance_mut(r) else {
            continue;
        };

        let pod_ip = m.labels.pod_ip();
        if !pod_ip.is_empty() && pod_ip != m.labels.host_ip() && pod_ip.parse::<IpAddr>().is_ok() {
            let listen = Listen {
                ip: pod_ip.to_string(),
                port: "0".to_string(),
                proxied: false,
            };
            instance.tcp_listens.insert(listen, m.values.last() == 1.0);
        }

        let pod = instance.pod.get_or_insert_with(Pod::default);
        if m.labels.created_by_kind() == ApplicationKind::ReplicaSet.as_str() {
            pod.replica_set = m.labels.created_by_name().to_string();
        }
        pods.insert(&m.labels, r);
    }
    pods
}

/// Database cluster name and role from operator-specific pod labels
fn cluster_labels(labels: &Labels) -> Option<(&str, &str)> {
    let crunchy = labels.get("label_postgres_operator_crunchydata_com_cluster");
    if !crunchy.is_empty() {
        return Some((crunchy, labels.get("label_postgres_operator_crunchydata_com_role")));
    }
    let zalando = labels.get("label_cluster_name");
    if !zalando.is_empty() && labels.has("label_team") {
        // poolers share the cluster label but carry no role
        let role = if labels.get("label_application") == "spilo" {
            labels.get("label_spilo_role")
        } else {
            ""
        };
        return Some((zalando, role));
    }
    let cnpg = labels.get("label_k8s_enterprisedb_io_cluster");
    if !cnpg.is_empty() {
        return Some((cnpg, labels.get("label_role")));
    }
    None
}

fn pod_labels(w: &mut World, metrics: &[MetricValues], pods: &Pods) {
    for m in metrics {
        let Some(r) = pods.resolve(m) else {
            continue;
        };
        let Some(instance) = w.instance_mut(r) else {
            continue;
        };
        let Some((cluster, role)) = cluster_labels(&m.labels) else {
            continue;
        };
        if !cluster.is_empty() {
            instance.cluster_name = Some(cluster.to_string());
        }
        instance.update_cluster_role(role, &m.values);
    }
}

fn pod_status(w: &mut World, query: Query, metrics: &[MetricValues], pods: &Pods) {
    for m in metrics {
        let Some(r) = pods.resolve(m) else {
            continue;
        };
        let Some(instance) = w.instance_mut(r) else {
            continue;
        };
        let pod = instance.pod.get_or_insert_with(Pod::default);
        match query {
            Query::PodStatusPhase => {
                merge(&mut pod.life_span, &m.values, nan_sum);
                if m.values.last() > 0.0 {
                    pod.phase = m.labels.phase().to_string();
                }
                if m.labels.phase() == "Running" {
                    merge(&mut pod.running, &m.values, any);
                }
            }
            Query::PodStatusReady => {
                if m.labels.condition() == "true" {
                    merge(&mut pod.ready, &m.values, any);
                }
            }
            Query::PodStatusScheduled => {
                if m.values.last() > 0.0 && m.labels.condition() == "true" {
                    pod.scheduled = true;
                }
            }
            _ => {}
        }
    }
}

fn pod_container_status(w: &mut World, query: Query, metrics: &[MetricValues], pods: &Pods) {
    for m in metrics {
        let Some(r) = pods.resolve(m) else {
            continue;
        };
        let Some(instance) = w.instance_mut(r) else {
            continue;
        };
        let liveness = match query {
            Query::ContainerRestarts => instance.liveness().cloned(),
            _ => None,
        };
        let container = instance.get_or_create_container(m.labels.container());
        let active = m.values.last() > 0.0;

        match query {
            Query::InitContainerInfo => container.init_container = true,
            Query::ContainerInfo => {
                if !m.labels.image().is_empty() {
                    container.image = m.labels.image().to_string();
                }
            }
            Query::ContainerStatusReady => container.ready = active,
            Query::ContainerStatusWaiting if active => container.status = ContainerStatus::Waiting,
            Query::ContainerStatusRunning if active => {
                container.status = ContainerStatus::Running;
                container.reason.clear();
            }
            Query::ContainerStatusTerminated if active => {
                container.status = ContainerStatus::Terminated
            }
            Query::ContainerStatusWaitingReason if active => {
                container.status = ContainerStatus::Waiting;
                container.reason = m.labels.reason().to_string();
            }
            Query::ContainerStatusTerminatedReason if active => {
                container.status = ContainerStatus::Terminated;
                container.reason = m.labels.reason().to_string();
            }
            Query::ContainerStatusLastTerminatedReason if active => {
                container.last_terminated_reason = m.labels.reason().to_string();
            }
            Query::ContainerRestarts => {
                let delta = counter_increase(&m.values, liveness.as_ref());
                merge(&mut container.restarts, &delta, nan_sum);
            }
            _ => {}
        }
    }
}

/// Desired replica counts of deployments, stateful sets and daemon sets
fn load_applications(w: &mut World, metrics: &Metrics) {
    let sources = [
        (Query::DeploymentSpecReplicas, ApplicationKind::Deployment, keys::DEPLOYMENT),
        (Query::StatefulSetReplicas, ApplicationKind::StatefulSet, keys::STATEFULSET),
        (Query::DaemonSetDesiredScheduled, ApplicationKind::DaemonSet, keys::DAEMONSET),
    ];
    for (query, kind, name_label) in sources {
        for m in values(metrics, query) {
            let id = ApplicationId::new(m.labels.namespace(), kind.clone(), m.labels.get(name_label));
            if let Some(app) = w.get_application_mut(&id) {
                merge(&mut app.desired_instances, &m.values, any);
            }
        }
    }
}

/// Per-step increase of a counter; without a liveness series only
/// consecutive present samples produce a value
pub(super) fn counter_increase(values: &TimeSeries, liveness: Option<&TimeSeries>) -> TimeSeries {
    match liveness {
        Some(status) => increase(values, status),
        None => increase(
            values,
            &TimeSeries::new(values.from(), values.len(), values.step()),
        ),
    }
}
