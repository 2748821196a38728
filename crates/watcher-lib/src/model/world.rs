//! Topology graph of one time window

use super::{Application, ApplicationId, Connection, Instance, Node, Service};
use crate::timeseries::{Duration, Time};

/// Index of an instance inside a `World`'s application arena.
///
/// Valid only for the world it was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceRef {
    pub app: usize,
    pub instance: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntegrationStatus {
    pub kube_state_metrics_installed: bool,
    pub node_agent_installed: bool,
}

/// Nodes, services and applications reconstructed for `[from, to)` at `step`.
///
/// Lookups are linear scans; worlds are small and rebuilt for every window.
#[derive(Debug, Clone)]
pub struct World {
    pub from: Time,
    pub to: Time,
    pub step: Duration,
    pub nodes: Vec<Node>,
    pub applications: Vec<Application>,
    pub services: Vec<Service>,
    pub integration_status: IntegrationStatus,
}

impl World {
    pub fn new(from: Time, to: Time, step: Duration) -> Self {
        Self {
            from,
            to,
            step,
            nodes: Vec::new(),
            applications: Vec::new(),
            services: Vec::new(),
            integration_status: IntegrationStatus::default(),
        }
    }

    /// Number of samples in every series of this world
    pub fn points_count(&self) -> usize {
        if self.step.0 <= 0 || self.to <= self.from {
            return 0;
        }
        ((self.to - self.from).0 / self.step.0) as usize
    }

    pub fn application_index(&self, id: &ApplicationId) -> Option<usize> {
        self.applications.iter().position(|a| &a.id == id)
    }

    pub fn get_application(&self, id: &ApplicationId) -> Option<&Application> {
        self.applications.iter().find(|a| &a.id == id)
    }

    pub fn get_application_mut(&mut self, id: &ApplicationId) -> Option<&mut Application> {
        self.applications.iter_mut().find(|a| &a.id == id)
    }

    /// Index of the application with `id`, creating it if needed
    pub fn get_or_create_application_index(&mut self, id: ApplicationId) -> usize {
        if let Some(idx) = self.application_index(&id) {
            return idx;
        }
        self.applications.push(Application::new(id));
        self.applications.len() - 1
    }

    pub fn get_or_create_application(&mut self, id: ApplicationId) -> &mut Application {
        let idx = self.get_or_create_application_index(id);
        &mut self.applications[idx]
    }

    pub fn get_node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn instance(&self, r: InstanceRef) -> Option<&Instance> {
        self.applications.get(r.app)?.instances.get(r.instance)
    }

    pub fn instance_mut(&mut self, r: InstanceRef) -> Option<&mut Instance> {
        self.applications.get_mut(r.app)?.instances.get_mut(r.instance)
    }

    pub fn get_service_by_ip(&self, cluster_ip: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.cluster_ip == cluster_ip)
    }

    /// Service a connection went through: matched by cluster IP, falling back
    /// to any service that has seen the same actual destination
    pub fn get_service_for_connection(&self, c: &Connection) -> Option<&Service> {
        self.services.iter().find(|s| {
            s.cluster_ip == c.service_remote_ip
                || s
                    .connections
                    .iter()
                    .any(|sc| sc.actual_remote_ip == c.actual_remote_ip)
        })
    }
}
