//! Runtime config construction — translate one validated container spec
//! into the runtime request the client understands.
//!
//! Cross-host service discovery happens here too: a dependency placed on a
//! different host gets an `<SERVICE>_ENDPOINT=<host_ip>:<port>` variable
//! injected, named after the dependency with `-`/`.` mapped to `_`.

use std::collections::HashMap;

use crate::graph::DeploymentPlan;
use crate::model::container::env_var_name;
use crate::model::{ContainerPlacement, ContainerSpec};
use crate::runtime::ContainerRuntimeConfig;

/// Label stamped onto every container so stack membership is recoverable
/// from the runtime alone.
pub const STACK_LABEL: &str = "graphium.stack";
/// Label carrying the unqualified container name.
pub const CONTAINER_LABEL: &str = "graphium.container";

const NANOS_PER_CPU: f64 = 1_000_000_000.0;

/// Everything `build_runtime_config` needs to know about where containers
/// have landed so far.
pub struct PlacementContext<'a> {
    /// Unqualified container name → placement, for the containers already
    /// deployed in earlier waves (or earlier in this wave).
    pub placements: &'a std::collections::BTreeMap<String, ContainerPlacement>,
    /// host_id → host IP address, for cross-host endpoint injection.
    pub host_ips: &'a HashMap<String, String>,
    /// Host this container is being placed on.
    pub host_id: &'a str,
}

pub fn build_runtime_config(
    spec: &ContainerSpec,
    plan: &DeploymentPlan,
    stack_name: &str,
    ctx: &PlacementContext<'_>,
) -> ContainerRuntimeConfig {
    let mut labels = spec.labels.clone();
    labels.insert(STACK_LABEL.to_string(), stack_name.to_string());
    labels.insert(CONTAINER_LABEL.to_string(), spec.name.clone());

    let mut env = spec.encoded_env();
    env.extend(endpoint_injections(spec, ctx));

    let mut config = ContainerRuntimeConfig {
        name: qualified_name(stack_name, &spec.name),
        image: spec.image.clone(),
        env,
        cmd: spec.command_line(),
        working_dir: spec.working_dir.clone(),
        user: spec.user.clone(),
        labels,
        restart_policy: spec.restart_policy.clone(),
        nano_cpus: spec
            .resources
            .limits
            .cpus
            .map(|cpus| (cpus * NANOS_PER_CPU) as i64),
        memory_bytes: spec.resources.limits.memory_bytes,
        memory_swap_bytes: spec.resources.limits.memory_swap_bytes,
        pids_limit: spec.resources.limits.pids,
        network: plan.network.as_ref().map(|n| n.name.clone()),
        ..Default::default()
    };

    for port in &spec.ports {
        let key = port.runtime_key();
        config.exposed_ports.push(key.clone());
        if port.host_port > 0 {
            config
                .port_bindings
                .insert(key, (port.host_ip.clone(), port.host_port));
        }
    }

    config.mounts = spec.volume_mounts.clone();
    config
}

/// `<stack_name>-<container_name>`; an empty stack name leaves the
/// container name untouched.
pub fn qualified_name(stack_name: &str, container_name: &str) -> String {
    if stack_name.is_empty() {
        container_name.to_string()
    } else {
        format!("{}-{}", stack_name, container_name)
    }
}

/// `<SERVICE>_ENDPOINT` variables for dependencies living on other hosts.
fn endpoint_injections(spec: &ContainerSpec, ctx: &PlacementContext<'_>) -> Vec<String> {
    let mut injected = Vec::new();
    for dep in &spec.depends_on {
        let Some(placement) = ctx.placements.get(dep) else {
            continue;
        };
        if placement.host_id == ctx.host_id {
            continue;
        }
        let Some(host_ip) = ctx.host_ips.get(&placement.host_id).filter(|ip| !ip.is_empty())
        else {
            continue;
        };
        let Some(port) = placement.ports.values().next() else {
            continue;
        };
        injected.push(format!("{}_ENDPOINT={}:{}", env_var_name(dep), host_ip, port));
    }
    injected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NetworkSpec, Topology};
    use crate::model::{EnvVar, GraphNode, PortMapping, ResourceLimits};
    use std::collections::BTreeMap;

    fn empty_plan(network: Option<NetworkSpec>) -> DeploymentPlan {
        DeploymentPlan {
            stack_node: GraphNode::default(),
            container_specs: vec![],
            host_map: BTreeMap::new(),
            network,
            topology: Topology::default(),
            dependency_graph: vec![],
        }
    }

    fn ctx_parts() -> (BTreeMap<String, ContainerPlacement>, HashMap<String, String>) {
        (BTreeMap::new(), HashMap::new())
    }

    #[test]
    fn test_qualified_name() {
        assert_eq!(qualified_name("web", "db"), "web-db");
        assert_eq!(qualified_name("", "db"), "db");
    }

    #[test]
    fn test_basic_config_shape() {
        let spec = ContainerSpec {
            name: "api".into(),
            image: "api:1".into(),
            environment: vec![EnvVar { name: "MODE".into(), value: "prod".into() }],
            command: vec!["serve".into()],
            args: vec!["--port".into(), "8080".into()],
            ports: vec![PortMapping {
                container_port: 8080,
                host_port: 80,
                host_ip: None,
                protocol: "tcp".into(),
            }],
            resources: crate::model::ResourceSpec {
                limits: ResourceLimits {
                    cpus: Some(1.5),
                    memory_bytes: Some(512 * 1024 * 1024),
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        };
        let plan = empty_plan(Some(NetworkSpec {
            name: "web-net".into(),
            ..Default::default()
        }));
        let (placements, host_ips) = ctx_parts();
        let config = build_runtime_config(
            &spec,
            &plan,
            "web",
            &PlacementContext {
                placements: &placements,
                host_ips: &host_ips,
                host_id: "host-1",
            },
        );

        assert_eq!(config.name, "web-api");
        assert_eq!(config.cmd, vec!["serve", "--port", "8080"]);
        assert_eq!(config.env, vec!["MODE=prod"]);
        assert_eq!(config.exposed_ports, vec!["8080/tcp"]);
        assert_eq!(config.port_bindings["8080/tcp"], (None, 80));
        assert_eq!(config.nano_cpus, Some(1_500_000_000));
        assert_eq!(config.network.as_deref(), Some("web-net"));
        assert_eq!(config.labels[STACK_LABEL], "web");
        assert_eq!(config.labels[CONTAINER_LABEL], "api");
    }

    #[test]
    fn test_unbound_port_exposed_but_not_published() {
        let spec = ContainerSpec {
            name: "api".into(),
            image: "api:1".into(),
            ports: vec![PortMapping {
                container_port: 9090,
                host_port: 0,
                host_ip: None,
                protocol: "tcp".into(),
            }],
            ..Default::default()
        };
        let plan = empty_plan(None);
        let (placements, host_ips) = ctx_parts();
        let config = build_runtime_config(
            &spec,
            &plan,
            "web",
            &PlacementContext {
                placements: &placements,
                host_ips: &host_ips,
                host_id: "host-1",
            },
        );
        assert_eq!(config.exposed_ports, vec!["9090/tcp"]);
        assert!(config.port_bindings.is_empty());
    }

    #[test]
    fn test_cross_host_dependency_injection() {
        let spec = ContainerSpec {
            name: "api".into(),
            image: "api:1".into(),
            depends_on: vec!["pg-db".into()],
            ..Default::default()
        };
        let plan = empty_plan(None);

        let mut placements = BTreeMap::new();
        let mut db_placement = ContainerPlacement {
            container_id: "ctr-1".into(),
            container_name: "web-pg-db".into(),
            host_id: "host-2".into(),
            ..Default::default()
        };
        db_placement.ports.insert(5432, 15432);
        placements.insert("pg-db".to_string(), db_placement);

        let mut host_ips = HashMap::new();
        host_ips.insert("host-2".to_string(), "10.0.0.7".to_string());

        let config = build_runtime_config(
            &spec,
            &plan,
            "web",
            &PlacementContext {
                placements: &placements,
                host_ips: &host_ips,
                host_id: "host-1",
            },
        );
        assert!(config
            .env
            .contains(&"PG_DB_ENDPOINT=10.0.0.7:15432".to_string()));
    }

    #[test]
    fn test_same_host_dependency_not_injected() {
        let spec = ContainerSpec {
            name: "api".into(),
            image: "api:1".into(),
            depends_on: vec!["db".into()],
            ..Default::default()
        };
        let plan = empty_plan(None);

        let mut placements = BTreeMap::new();
        let mut db_placement = ContainerPlacement {
            container_id: "ctr-1".into(),
            host_id: "host-1".into(),
            ..Default::default()
        };
        db_placement.ports.insert(5432, 5432);
        placements.insert("db".to_string(), db_placement);
        let host_ips = HashMap::from([("host-1".to_string(), "10.0.0.6".to_string())]);

        let config = build_runtime_config(
            &spec,
            &plan,
            "web",
            &PlacementContext {
                placements: &placements,
                host_ips: &host_ips,
                host_id: "host-1",
            },
        );
        assert!(!config.env.iter().any(|e| e.contains("_ENDPOINT=")));
    }
}
