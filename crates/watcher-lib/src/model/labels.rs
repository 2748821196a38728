//! Immutable label set view

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known label keys
pub mod keys {
    pub const NAMESPACE: &str = "namespace";
    pub const POD: &str = "pod";
    pub const UID: &str = "uid";
    pub const NODE: &str = "node";
    pub const CONTAINER: &str = "container";
    pub const CREATED_BY_KIND: &str = "created_by_kind";
    pub const CREATED_BY_NAME: &str = "created_by_name";
    pub const OWNER_KIND: &str = "owner_kind";
    pub const OWNER_NAME: &str = "owner_name";
    pub const REPLICASET: &str = "replicaset";
    pub const POD_IP: &str = "pod_ip";
    pub const HOST_IP: &str = "host_ip";
    pub const INTERNAL_IP: &str = "internal_ip";
    pub const CLUSTER_IP: &str = "cluster_ip";
    pub const SERVICE: &str = "service";
    pub const PHASE: &str = "phase";
    pub const CONDITION: &str = "condition";
    pub const REASON: &str = "reason";
    pub const IMAGE: &str = "image";
    pub const LEVEL: &str = "level";
    pub const LE: &str = "le";
    pub const APPLICATION: &str = "application";
    pub const DESTINATION: &str = "destination";
    pub const ACTUAL_DESTINATION: &str = "actual_destination";
    pub const DEPLOYMENT: &str = "deployment";
    pub const STATEFULSET: &str = "statefulset";
    pub const DAEMONSET: &str = "daemonset";
}

/// Label set of one metric series.
///
/// Missing keys read as the empty string, matching Prometheus semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Labels(BTreeMap<String, String>);

impl Labels {
    pub fn new(labels: BTreeMap<String, String>) -> Self {
        Self(labels)
    }

    pub fn get(&self, key: &str) -> &str {
        self.0.get(key).map(String::as_str).unwrap_or("")
    }

    /// True if the key is present with a non-empty value
    pub fn has(&self, key: &str) -> bool {
        !self.get(key).is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// True if every `(key, value)` filter matches
    pub fn matches(&self, filters: &[(String, String)]) -> bool {
        filters.iter().all(|(k, v)| self.get(k) == v)
    }

    pub fn namespace(&self) -> &str {
        self.get(keys::NAMESPACE)
    }

    pub fn pod(&self) -> &str {
        self.get(keys::POD)
    }

    pub fn uid(&self) -> &str {
        self.get(keys::UID)
    }

    pub fn node(&self) -> &str {
        self.get(keys::NODE)
    }

    pub fn container(&self) -> &str {
        self.get(keys::CONTAINER)
    }

    /// Owner kind of a pod (`created_by_kind`)
    pub fn created_by_kind(&self) -> &str {
        self.get(keys::CREATED_BY_KIND)
    }

    /// Owner name of a pod (`created_by_name`)
    pub fn created_by_name(&self) -> &str {
        self.get(keys::CREATED_BY_NAME)
    }

    /// Owner kind of a replica set
    pub fn owner_kind(&self) -> &str {
        self.get(keys::OWNER_KIND)
    }

    /// Owner name of a replica set
    pub fn owner_name(&self) -> &str {
        self.get(keys::OWNER_NAME)
    }

    pub fn replicaset(&self) -> &str {
        self.get(keys::REPLICASET)
    }

    pub fn pod_ip(&self) -> &str {
        self.get(keys::POD_IP)
    }

    pub fn host_ip(&self) -> &str {
        self.get(keys::HOST_IP)
    }

    pub fn internal_ip(&self) -> &str {
        self.get(keys::INTERNAL_IP)
    }

    pub fn cluster_ip(&self) -> &str {
        self.get(keys::CLUSTER_IP)
    }

    pub fn service(&self) -> &str {
        self.get(keys::SERVICE)
    }

    pub fn phase(&self) -> &str {
        self.get(keys::PHASE)
    }

    pub fn condition(&self) -> &str {
        self.get(keys::CONDITION)
    }

    pub fn reason(&self) -> &str {
        self.get(keys::REASON)
    }

    pub fn image(&self) -> &str {
        self.get(keys::IMAGE)
    }

    pub fn level(&self) -> &str {
        self.get(keys::LEVEL)
    }

    pub fn le(&self) -> &str {
        self.get(keys::LE)
    }

    pub fn application(&self) -> &str {
        self.get(keys::APPLICATION)
    }

    pub fn destination(&self) -> &str {
        self.get(keys::DESTINATION)
    }

    pub fn actual_destination(&self) -> &str {
        self.get(keys::ACTUAL_DESTINATION)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Labels {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, String>> for Labels {
    fn from(labels: BTreeMap<String, String>) -> Self {
        Self(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_reads_empty() {
        let labels: Labels = [("namespace", "default")].into_iter().collect();
        assert_eq!(labels.namespace(), "default");
        assert_eq!(labels.pod(), "");
        assert!(labels.has("namespace"));
        assert!(!labels.has("pod"));
    }

    #[test]
    fn test_empty_value_is_not_present() {
        let labels: Labels = [("cluster_ip", "")].into_iter().collect();
        assert!(!labels.has(keys::CLUSTER_IP));
        assert_eq!(labels.len(), 1);
    }

    #[test]
    fn test_matches_filters() {
        let labels: Labels = [("namespace", "prod"), ("pod", "api-1")].into_iter().collect();
        assert!(labels.matches(&[]));
        assert!(labels.matches(&[("namespace".to_string(), "prod".to_string())]));
        assert!(!labels.matches(&[("namespace".to_string(), "dev".to_string())]));
    }
}
