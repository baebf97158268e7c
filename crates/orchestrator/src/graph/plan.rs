//! Plan types — the parser's output.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::model::{ContainerSpec, GraphNode};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("Stack definition is empty")]
    EmptyDefinition,
    #[error("Stack definition has an empty @graph")]
    EmptyGraph,
    #[error("No stack node found in graph")]
    MissingStackNode,
    #[error("Container {container} depends on unknown container {dependency}")]
    MissingDependency { container: String, dependency: String },
    #[error("Circular dependency among containers: {0:?}")]
    CircularDependency(Vec<String>),
    #[error("Invalid container spec: {0}")]
    InvalidSpec(String),
    #[error("Container {container} references unresolvable host {host_id}")]
    UnresolvedHost { container: String, host_id: String },
    #[error("Host probe failed: {0}")]
    HostProbe(String),
}

/// Network request carried on the stack node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    /// An external network is inspected, never created.
    #[serde(default)]
    pub external: bool,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub options: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_range: Option<String>,
}

/// A topology node kept for downstream visualization. Extraction is
/// best-effort and non-fatal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub hosts: Vec<TopologyNode>,
    #[serde(default)]
    pub racks: Vec<TopologyNode>,
    #[serde(default)]
    pub datacenters: Vec<TopologyNode>,
}

/// The parser's product: everything the placement engine and deployer need.
#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    pub stack_node: GraphNode,
    /// Specs in original definition order.
    pub container_specs: Vec<ContainerSpec>,
    /// container id → host id; an empty string triggers auto-placement
    /// downstream.
    pub host_map: BTreeMap<String, String>,
    pub network: Option<NetworkSpec>,
    pub topology: Topology,
    /// Ordered waves; each wave lists container names runnable in parallel.
    pub dependency_graph: Vec<Vec<String>>,
}

impl DeploymentPlan {
    pub fn spec_by_name(&self, name: &str) -> Option<&ContainerSpec> {
        self.container_specs.iter().find(|s| s.name == name)
    }

    /// Mapped host for a container, `""` meaning auto-place.
    pub fn host_for(&self, spec: &ContainerSpec) -> &str {
        let key = if spec.id.is_empty() { &spec.name } else { &spec.id };
        self.host_map.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn container_total(&self) -> usize {
        self.container_specs.len()
    }
}

/// Parser output: a plan when no errors were collected, plus diagnostics.
#[derive(Debug, Default)]
pub struct ParseResult {
    pub plan: Option<DeploymentPlan>,
    pub warnings: Vec<String>,
    pub errors: Vec<PlanError>,
}

impl ParseResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty() && self.plan.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_spec_from_stack_node_field() {
        let spec: NetworkSpec = serde_json::from_str(
            r#"{"name": "web-net", "driver": "overlay", "subnet": "10.10.0.0/16"}"#,
        )
        .unwrap();
        assert_eq!(spec.name, "web-net");
        assert!(!spec.external);
        assert_eq!(spec.subnet.as_deref(), Some("10.10.0.0/16"));
    }

    #[test]
    fn test_host_for_falls_back_to_name_key() {
        let mut plan = DeploymentPlan {
            stack_node: GraphNode::default(),
            container_specs: vec![],
            host_map: BTreeMap::new(),
            network: None,
            topology: Topology::default(),
            dependency_graph: vec![],
        };
        plan.host_map.insert("db".into(), "host-1".into());
        let spec = ContainerSpec {
            name: "db".into(),
            ..Default::default()
        };
        assert_eq!(plan.host_for(&spec), "host-1");

        let unmapped = ContainerSpec {
            name: "cache".into(),
            ..Default::default()
        };
        assert_eq!(plan.host_for(&unmapped), "");
    }
}
