//! Container specification — a container as named inside a stack definition.
//!
//! These types are deserialized straight out of the linked-data graph
//! document; field defaults keep sparse nodes parseable. Validation and
//! defaulting beyond serde (port ranges, protocol fill-in, health-check
//! defaults) happens in the planner, not here.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::graph::NodeRef;

/// One environment entry. Order matters (later entries may reference
/// earlier ones at container start), so environment is a list, not a map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// A single published port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub container_port: u32,
    #[serde(default)]
    pub host_port: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
    /// Defaulted to "tcp" during spec validation.
    #[serde(default)]
    pub protocol: String,
}

impl PortMapping {
    /// Runtime key in `<port>/<proto>` form, e.g. `80/tcp`.
    pub fn runtime_key(&self) -> String {
        format!("{}/{}", self.container_port, self.protocol)
    }
}

/// Mount flavours supported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountKind {
    Volume,
    Bind,
    Tmpfs,
}

impl Default for MountKind {
    fn default() -> Self {
        MountKind::Volume
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub propagation: Option<String>,
    #[serde(default)]
    pub create_host_path: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub driver_opts: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    /// Defaulted to `volume` during spec validation when absent.
    #[serde(default, rename = "type")]
    pub kind: MountKind,
    #[serde(default)]
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_options: Option<BindOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_options: Option<VolumeOptions>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckSpec {
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Seconds between probes. Defaulted to 30 during validation.
    #[serde(default)]
    pub interval: u32,
    /// Seconds before a probe is considered failed. Defaulted to 30.
    #[serde(default)]
    pub timeout: u32,
    /// Consecutive failures before unhealthy. Defaulted to 3.
    #[serde(default)]
    pub retries: u32,
}

/// Restart policies recognised by the runtime. Serialized with the
/// runtime's own spelling (`on-failure`, `unless-stopped`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestartPolicy {
    #[serde(rename = "no")]
    No,
    #[serde(rename = "always")]
    Always,
    #[serde(rename = "on-failure")]
    OnFailure,
    #[serde(rename = "unless-stopped")]
    UnlessStopped,
}

impl RestartPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "no" => Some(RestartPolicy::No),
            "always" => Some(RestartPolicy::Always),
            "on-failure" => Some(RestartPolicy::OnFailure),
            "unless-stopped" => Some(RestartPolicy::UnlessStopped),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RestartPolicy::No => "no",
            RestartPolicy::Always => "always",
            RestartPolicy::OnFailure => "on-failure",
            RestartPolicy::UnlessStopped => "unless-stopped",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Fractional CPUs, converted to nano-CPUs for the runtime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpus: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_bytes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_swap_bytes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pids: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    #[serde(default)]
    pub limits: ResourceLimits,
    #[serde(default)]
    pub reservations: ResourceLimits,
}

/// A container as named inside a stack. `id` is the node's absolute URL in
/// the graph document; `name` is unique within the stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    #[serde(default, rename = "@id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub environment: Vec<EnvVar>,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub ports: Vec<PortMapping>,
    #[serde(default)]
    pub volume_mounts: Vec<VolumeMount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheckSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<String>,
    #[serde(default)]
    pub resources: ResourceSpec,
    /// Names of other containers in the same stack that must start first.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Explicit host pin; absent means the stack-level host or auto-placement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub located_in_host: Option<NodeRef>,
}

impl ContainerSpec {
    /// Full command line: `command` followed by `args`.
    pub fn command_line(&self) -> Vec<String> {
        let mut cmd = self.command.clone();
        cmd.extend(self.args.iter().cloned());
        cmd
    }

    /// Environment encoded in `KEY=VALUE` form for the runtime.
    pub fn encoded_env(&self) -> Vec<String> {
        self.environment
            .iter()
            .map(|e| format!("{}={}", e.name, e.value))
            .collect()
    }

    /// Named volumes this spec consumes (binds and tmpfs excluded).
    pub fn named_volumes(&self) -> impl Iterator<Item = &VolumeMount> {
        self.volume_mounts
            .iter()
            .filter(|m| m.kind == MountKind::Volume && !m.source.is_empty())
    }
}

/// Normalize a container name for environment-variable matching:
/// upper-cased with `-` and `.` mapped to `_`.
pub fn env_var_name(service: &str) -> String {
    service
        .chars()
        .map(|c| match c {
            '-' | '.' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}
