//! Host model — a physical or virtual machine running a container runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Document type discriminator for host records.
pub const HOST_DOC_TYPE: &str = "host";

/// Lifecycle status of a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    Active,
    Inactive,
    Draining,
}

impl Default for HostStatus {
    fn default() -> Self {
        HostStatus::Active
    }
}

/// A container host as persisted in the document store.
///
/// Created manually, mutated only through the host-edit path, deleted when
/// decommissioned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub id: String,
    #[serde(rename = "type", default = "host_doc_type")]
    pub doc_type: String,
    pub name: String,
    /// Stable identifier used by the integrity auditor for duplicate
    /// detection (defaults to the host name).
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub datacenter: String,
    #[serde(default)]
    pub cpu_cores: u32,
    #[serde(default)]
    pub memory_bytes: u64,
    #[serde(default)]
    pub status: HostStatus,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn host_doc_type() -> String {
    HOST_DOC_TYPE.to_string()
}

impl Host {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self {
            id: id.into(),
            doc_type: host_doc_type(),
            identifier: name.clone(),
            name,
            ip_address: String::new(),
            datacenter: String::new(),
            cpu_cores: 0,
            memory_bytes: 0,
            status: HostStatus::Active,
            labels: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == HostStatus::Active
    }
}

/// Instantaneous load on a host, derived at resolve time. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostLoad {
    /// CPU utilisation in percent, 0–100.
    pub cpu_pct: f64,
    /// Memory currently in use, in bytes.
    pub memory_bytes: u64,
    /// Containers currently placed on this host (store-derived).
    pub container_count: u64,
}

/// Resources still available on a host after accounting for placements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AvailableResources {
    pub cpu_cores: f64,
    pub memory_bytes: u64,
}

/// Runtime-computed view of a host: the record plus its reachable runtime
/// endpoint and a load snapshot. Never persisted.
#[derive(Debug, Clone)]
pub struct HostInfo {
    pub host: Host,
    /// Connection string for the host's container runtime, e.g.
    /// `unix:///var/run/docker.sock` or `tcp://10.0.0.7:2375`.
    pub endpoint: String,
    pub load: HostLoad,
    pub available_resources: AvailableResources,
}

impl HostInfo {
    pub fn id(&self) -> &str {
        &self.host.id
    }

    pub fn is_active(&self) -> bool {
        self.host.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_status_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&HostStatus::Draining).unwrap(),
            "\"draining\""
        );
        let s: HostStatus = serde_json::from_str("\"inactive\"").unwrap();
        assert_eq!(s, HostStatus::Inactive);
    }

    #[test]
    fn test_host_round_trip() {
        let mut host = Host::new("host-1", "node-a");
        host.ip_address = "10.0.0.7".into();
        host.datacenter = "dc-east".into();
        host.cpu_cores = 8;
        host.memory_bytes = 16 * 1024 * 1024 * 1024;

        let json = serde_json::to_value(&host).unwrap();
        assert_eq!(json["type"], "host");
        assert_eq!(json["status"], "active");

        let back: Host = serde_json::from_value(json).unwrap();
        assert_eq!(back.name, "node-a");
        assert_eq!(back.cpu_cores, 8);
        assert!(back.is_active());
    }

    #[test]
    fn test_host_defaults_on_sparse_document() {
        let host: Host = serde_json::from_str(
            r#"{"id": "host-2", "name": "bare"}"#,
        )
        .unwrap();
        assert_eq!(host.doc_type, HOST_DOC_TYPE);
        assert_eq!(host.status, HostStatus::Active);
        assert!(host.labels.is_empty());
        assert!(host.ip_address.is_empty());
    }
}
