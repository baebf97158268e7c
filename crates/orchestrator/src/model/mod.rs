//! Persisted and wire-level data model.
//!
//! Every persisted entity carries a `type` discriminator field so the
//! document store can filter by kind, and is addressed by a caller-assigned
//! string ID. Mutations go through the store's revision token.

pub mod action;
pub mod container;
pub mod deployment;
pub mod graph;
pub mod host;
pub mod stack;

pub use action::{
    ActionSchedule, ActionStatus, ActionType, AgentTask, ScheduledAction, TaskStatus,
    ACTION_DOC_TYPE, TASK_DOC_TYPE,
};
pub use container::{
    ContainerSpec, EnvVar, HealthCheckSpec, MountKind, PortMapping, ResourceLimits, ResourceSpec,
    RestartPolicy, VolumeMount,
};
pub use deployment::{
    deployment_document_id, legacy_deployment_id, ContainerPlacement, DeploymentEvent,
    DeploymentPhase, DeploymentState, DeploymentStatus, EventLevel, NetworkInfo, RollbackState,
    StackDeployment, VolumeInfo, DEPLOYMENT_DOC_TYPE,
};
pub use graph::{GraphNode, NodeRef, StackDefinition};
pub use host::{AvailableResources, Host, HostInfo, HostLoad, HostStatus, HOST_DOC_TYPE};
pub use stack::{
    stack_document_id, DeploymentConfig, HostConstraint, Stack, StackStatus, STACK_DOC_TYPE,
};

/// Generate a caller-assigned document ID with the given prefix
/// (e.g. `action-3f2a…`). Tasks and actions use this helper so IDs
/// stay uniform across creation paths.
pub fn generate_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_prefix_and_uniqueness() {
        let a = generate_id("action");
        let b = generate_id("action");
        assert!(a.starts_with("action-"));
        assert_ne!(a, b);
    }
}
