//! Container resource usage, log counters and TCP connections

use super::k8s::{counter_increase, Pods};
use super::values;
use crate::ingest::{Metrics, MetricValues, Query};
use crate::model::{split_addr, Connection, InstanceRef, LogLevel, ServiceConnection, World};
use crate::timeseries::{any, merge, nan_sum};
use tracing::warn;

pub(super) fn load_containers(w: &mut World, metrics: &Metrics, pods: &Pods) {
    for query in [
        Query::ContainerCpuUsage,
        Query::ContainerMemoryRss,
        Query::ContainerOomKills,
        Query::ContainerLogMessages,
    ] {
        let metrics = values(metrics, query);
        if !metrics.is_empty() {
            w.integration_status.node_agent_installed = true;
        }
        for m in metrics {
            let Some(r) = resolve(pods, m) else {
                continue;
            };
            container_metric(w, query, m, r);
        }
    }
    for m in values(metrics, Query::ContainerNetTcpActiveConnections) {
        let Some(r) = resolve(pods, m) else {
            continue;
        };
        connection(w, m, r);
    }
}

fn resolve(pods: &Pods, m: &MetricValues) -> Option<InstanceRef> {
    let r = pods.by_name(m.labels.namespace(), m.labels.pod());
    if r.is_none() {
        warn!(
            pod = m.labels.pod(),
            namespace = m.labels.namespace(),
            container = m.labels.container(),
            "Unknown pod"
        );
    }
    r
}

fn container_metric(w: &mut World, query: Query, m: &MetricValues, r: InstanceRef) {
    let Some(instance) = w.instance_mut(r) else {
        return;
    };
    match query {
        Query::ContainerCpuUsage => {
            let container = instance.get_or_create_container(m.labels.container());
            merge(&mut container.cpu_usage, &m.values, nan_sum);
        }
        Query::ContainerMemoryRss => {
            let container = instance.get_or_create_container(m.labels.container());
            merge(&mut container.memory_rss, &m.values, any);
        }
        Query::ContainerOomKills => {
            let delta = counter_increase(&m.values, instance.liveness());
            let container = instance.get_or_create_container(m.labels.container());
            merge(&mut container.oom_kills, &delta, nan_sum);
        }
        Query::ContainerLogMessages => {
            let delta = counter_increase(&m.values, instance.liveness());
            let level = LogLevel::from(m.labels.level());
            let mut total = instance.log_messages_by_level.remove(&level);
            merge(&mut total, &delta, nan_sum);
            if let Some(total) = total {
                instance.log_messages_by_level.insert(level, total);
            }
        }
        _ => {}
    }
}

/// Record an upstream connection of `r` and link it to the service it went through
fn connection(w: &mut World, m: &MetricValues, r: InstanceRef) {
    let (service_ip, service_port) = split_addr(m.labels.destination());
    let (actual_ip, actual_port) = split_addr(m.labels.actual_destination());
    if service_ip.is_empty() {
        return;
    }
    let Some(instance) = w.instance_mut(r) else {
        return;
    };
    let existing = instance.upstreams.iter_mut().find(|c| {
        c.service_remote_ip == service_ip
            && c.service_remote_port == service_port
            && c.actual_remote_ip == actual_ip
            && c.actual_remote_port == actual_port
    });
    match existing {
        Some(c) => merge(&mut c.active, &m.values, nan_sum),
        None => instance.upstreams.push(Connection {
            service_remote_ip: service_ip.to_string(),
            service_remote_port: service_port.to_string(),
            actual_remote_ip: actual_ip.to_string(),
            actual_remote_port: actual_port.to_string(),
            active: Some(m.values.clone()),
        }),
    }

    if actual_ip.is_empty() {
        return;
    }
    if let Some(service) = w.services.iter_mut().find(|s| s.cluster_ip == service_ip) {
        let known = service
            .connections
            .iter()
            .any(|sc| sc.instance == r && sc.actual_remote_ip == actual_ip);
        if !known {
            service.connections.push(ServiceConnection {
                actual_remote_ip: actual_ip.to_string(),
                instance: r,
            });
        }
    }
}
