//! Services, nodes and network connections

use super::InstanceRef;
use crate::timeseries::TimeSeries;

/// Outbound connection of an instance
#[derive(Debug, Clone)]
pub struct Connection {
    /// Address the client dialed (a service cluster IP for in-cluster traffic)
    pub service_remote_ip: String,
    pub service_remote_port: String,
    /// Address the connection actually landed on after NAT
    pub actual_remote_ip: String,
    pub actual_remote_port: String,
    pub active: Option<TimeSeries>,
}

/// Connection observed through a service, pointing back at its client
#[derive(Debug, Clone)]
pub struct ServiceConnection {
    pub actual_remote_ip: String,
    pub instance: InstanceRef,
}

/// Kubernetes service identified by its cluster IP
#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
    pub namespace: String,
    pub cluster_ip: String,
    pub connections: Vec<ServiceConnection>,
}

impl Service {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, cluster_ip: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            cluster_ip: cluster_ip.into(),
            connections: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub internal_ip: String,
    /// 1 while the node reports in
    pub up: Option<TimeSeries>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            internal_ip: String::new(),
            up: None,
        }
    }
}

/// Split `ip:port`, accepting bracketed IPv6
pub fn split_addr(addr: &str) -> (&str, &str) {
    if let Some(rest) = addr.strip_prefix('[') {
        if let Some((ip, port)) = rest.split_once("]:") {
            return (ip, port);
        }
        return (rest.trim_end_matches(']'), "");
    }
    match addr.rsplit_once(':') {
        Some((ip, port)) if !ip.contains(':') => (ip, port),
        _ => (addr, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_addr() {
        assert_eq!(split_addr("10.0.0.1:80"), ("10.0.0.1", "80"));
        assert_eq!(split_addr("10.0.0.1"), ("10.0.0.1", ""));
        assert_eq!(split_addr("[fd00::1]:443"), ("fd00::1", "443"));
        assert_eq!(split_addr("fd00::1"), ("fd00::1", ""));
    }
}
