//! Placement engine — decides which host runs each container.
//!
//! Four strategies behind one trait: `auto` scores hosts under affinity,
//! port, and resource pressure; `manual` follows per-container constraints;
//! `spread` balances container counts; `datacenter` is spread restricted
//! to the stack's datacenter. Unknown strategy names fall back to `manual`.

pub mod auto;
pub mod datacenter;
pub mod manual;
pub mod spread;

pub use auto::AutoStrategy;
pub use datacenter::DatacenterStrategy;
pub use manual::ManualStrategy;
pub use spread::SpreadStrategy;

use std::collections::BTreeMap;
use thiserror::Error;

use crate::graph::DeploymentPlan;
use crate::model::{HostInfo, Stack};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlacementError {
    #[error("no eligible host for container {container}: {details}")]
    NoEligibleHost { container: String, details: String },
    #[error("no host constraint defined for container {0}")]
    MissingConstraint(String),
    #[error("container {container} constrained to unknown host {host_id}")]
    UnknownHost { container: String, host_id: String },
    #[error("container {container} constraint unmet on host {host_id}: {reason}")]
    ConstraintUnmet {
        container: String,
        host_id: String,
        reason: String,
    },
    #[error("no active host available")]
    NoActiveHost,
    #[error("stack has no datacenter set; datacenter strategy requires one")]
    MissingDatacenter,
}

/// container_name → host_id.
pub type PlacementMap = BTreeMap<String, String>;

pub trait PlacementStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn place(
        &self,
        stack: &Stack,
        plan: &DeploymentPlan,
        hosts: &[HostInfo],
    ) -> Result<PlacementMap, PlacementError>;
}

/// Resolve a CLI/config strategy string. Unknown names fall back to
/// `manual`.
pub fn strategy_for(name: &str) -> Box<dyn PlacementStrategy> {
    match name {
        "auto" => Box::new(AutoStrategy::default()),
        "spread" => Box::new(SpreadStrategy),
        "datacenter" => Box::new(DatacenterStrategy),
        "manual" => Box::new(ManualStrategy),
        other => {
            tracing::warn!(strategy = other, "Unknown placement strategy, using manual");
            Box::new(ManualStrategy)
        }
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::graph::Topology;
    use crate::model::{
        AvailableResources, ContainerSpec, GraphNode, Host, HostLoad, HostStatus,
    };
    use std::collections::BTreeMap;

    pub fn host(id: &str, datacenter: &str, status: HostStatus, containers: u64) -> HostInfo {
        let mut record = Host::new(id, id);
        record.datacenter = datacenter.to_string();
        record.status = status;
        record.cpu_cores = 8;
        record.memory_bytes = 16 * 1024 * 1024 * 1024;
        HostInfo {
            host: record,
            endpoint: "unix:///var/run/docker.sock".into(),
            load: HostLoad {
                cpu_pct: 0.0,
                memory_bytes: 0,
                container_count: containers,
            },
            available_resources: AvailableResources {
                cpu_cores: 8.0,
                memory_bytes: 16 * 1024 * 1024 * 1024,
            },
        }
    }

    pub fn plan_of(specs: Vec<ContainerSpec>) -> DeploymentPlan {
        let waves = crate::graph::build_waves(&specs).unwrap();
        DeploymentPlan {
            stack_node: GraphNode::default(),
            container_specs: specs,
            host_map: BTreeMap::new(),
            network: None,
            topology: Topology::default(),
            dependency_graph: waves,
        }
    }

    pub fn spec(name: &str) -> ContainerSpec {
        ContainerSpec {
            name: name.into(),
            image: "img".into(),
            ..Default::default()
        }
    }

    pub fn stack() -> Stack {
        Stack::new("web")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_lookup_and_fallback() {
        assert_eq!(strategy_for("auto").name(), "auto");
        assert_eq!(strategy_for("spread").name(), "spread");
        assert_eq!(strategy_for("datacenter").name(), "datacenter");
        assert_eq!(strategy_for("manual").name(), "manual");
        assert_eq!(strategy_for("round-robin").name(), "manual");
    }
}
