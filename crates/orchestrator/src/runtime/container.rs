//! Container domain — create, start, stop, remove, inspect, list.

use std::collections::{BTreeMap, HashMap};

use bollard::models::{
    ContainerCreateBody, EndpointSettings, HostConfig, Mount, MountBindOptions,
    MountBindOptionsPropagationEnum, MountTypeEnum, MountVolumeOptions,
    MountVolumeOptionsDriverConfig, NetworkingConfig, PortBinding, RestartPolicy,
    RestartPolicyNameEnum,
};
use bollard::query_parameters::{
    CreateContainerOptions, ListContainersOptions, RemoveContainerOptions, StopContainerOptions,
};

use super::client::{RuntimeClient, RuntimeError};
use crate::model::{MountKind, VolumeMount};

/// Everything the deployer needs to hand the runtime for one container.
/// Built host-agnostically by the wave executor; the client translates it
/// into the runtime's own request shapes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerRuntimeConfig {
    pub name: String,
    pub image: String,
    /// `KEY=VALUE` encoded.
    pub env: Vec<String>,
    pub cmd: Vec<String>,
    pub working_dir: Option<String>,
    pub user: Option<String>,
    pub labels: HashMap<String, String>,
    /// `<port>/<proto>` keys to expose.
    pub exposed_ports: Vec<String>,
    pub restart_policy: Option<String>,
    /// `<container_port>/<proto>` → (host_ip, host_port).
    pub port_bindings: BTreeMap<String, (Option<String>, u32)>,
    pub mounts: Vec<VolumeMount>,
    pub nano_cpus: Option<i64>,
    pub memory_bytes: Option<i64>,
    pub memory_swap_bytes: Option<i64>,
    pub pids_limit: Option<i64>,
    /// Attach to this network only, when the plan defines one.
    pub network: Option<String>,
}

/// Runtime handle returned by a successful create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedContainer {
    pub id: String,
}

/// The slice of an inspect response the orchestrator consumes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InspectedContainer {
    pub id: String,
    pub name: String,
    pub running: bool,
    pub status: String,
    pub ip_address: String,
    /// container_port → bound host_port.
    pub ports: BTreeMap<u32, u32>,
}

fn restart_policy_enum(policy: &str) -> RestartPolicyNameEnum {
    match policy {
        "always" => RestartPolicyNameEnum::ALWAYS,
        "on-failure" => RestartPolicyNameEnum::ON_FAILURE,
        "unless-stopped" => RestartPolicyNameEnum::UNLESS_STOPPED,
        _ => RestartPolicyNameEnum::NO,
    }
}

fn propagation_enum(propagation: &str) -> Option<MountBindOptionsPropagationEnum> {
    match propagation {
        "private" => Some(MountBindOptionsPropagationEnum::PRIVATE),
        "rprivate" => Some(MountBindOptionsPropagationEnum::RPRIVATE),
        "shared" => Some(MountBindOptionsPropagationEnum::SHARED),
        "rshared" => Some(MountBindOptionsPropagationEnum::RSHARED),
        "slave" => Some(MountBindOptionsPropagationEnum::SLAVE),
        "rslave" => Some(MountBindOptionsPropagationEnum::RSLAVE),
        _ => None,
    }
}

fn convert_mount(mount: &VolumeMount) -> Mount {
    let typ = match mount.kind {
        MountKind::Volume => MountTypeEnum::VOLUME,
        MountKind::Bind => MountTypeEnum::BIND,
        MountKind::Tmpfs => MountTypeEnum::TMPFS,
    };
    let bind_options = mount.bind_options.as_ref().map(|b| MountBindOptions {
        propagation: b.propagation.as_deref().and_then(propagation_enum),
        ..Default::default()
    });
    let volume_options = mount.volume_options.as_ref().map(|v| MountVolumeOptions {
        labels: Some(v.labels.clone()),
        driver_config: v.driver.as_ref().map(|driver| MountVolumeOptionsDriverConfig {
            name: Some(driver.clone()),
            options: Some(v.driver_opts.clone()),
        }),
        ..Default::default()
    });
    Mount {
        target: Some(mount.target.clone()),
        source: if mount.source.is_empty() {
            None
        } else {
            Some(mount.source.clone())
        },
        typ: Some(typ),
        read_only: Some(mount.read_only),
        bind_options,
        volume_options,
        ..Default::default()
    }
}

impl ContainerRuntimeConfig {
    fn into_create_body(self) -> ContainerCreateBody {
        let exposed_ports = if self.exposed_ports.is_empty() {
            None
        } else {
            Some(
                self.exposed_ports
                    .iter()
                    .cloned()
                    .collect(),
            )
        };

        let port_bindings: HashMap<String, Option<Vec<PortBinding>>> = self
            .port_bindings
            .iter()
            .map(|(key, (host_ip, host_port))| {
                (
                    key.clone(),
                    Some(vec![PortBinding {
                        host_ip: host_ip.clone(),
                        host_port: Some(host_port.to_string()),
                    }]),
                )
            })
            .collect();

        let host_config = HostConfig {
            restart_policy: self.restart_policy.as_deref().map(|p| RestartPolicy {
                name: Some(restart_policy_enum(p)),
                maximum_retry_count: None,
            }),
            port_bindings: if port_bindings.is_empty() {
                None
            } else {
                Some(port_bindings)
            },
            mounts: if self.mounts.is_empty() {
                None
            } else {
                Some(self.mounts.iter().map(convert_mount).collect())
            },
            nano_cpus: self.nano_cpus,
            memory: self.memory_bytes,
            memory_swap: self.memory_swap_bytes,
            pids_limit: self.pids_limit,
            ..Default::default()
        };

        let networking_config = self.network.as_ref().map(|name| NetworkingConfig {
            endpoints_config: Some(HashMap::from([(
                name.clone(),
                EndpointSettings::default(),
            )])),
        });

        ContainerCreateBody {
            image: Some(self.image),
            env: if self.env.is_empty() { None } else { Some(self.env) },
            cmd: if self.cmd.is_empty() { None } else { Some(self.cmd) },
            working_dir: self.working_dir,
            user: self.user,
            labels: Some(self.labels),
            exposed_ports,
            host_config: Some(host_config),
            networking_config,
            ..Default::default()
        }
    }
}

fn map_not_found(container_id: &str, e: bollard::errors::Error) -> RuntimeError {
    match e {
        bollard::errors::Error::DockerResponseServerError { status_code: 404, .. } => {
            RuntimeError::ContainerNotFound(container_id.to_string())
        }
        other => RuntimeError::Api(other),
    }
}

impl RuntimeClient {
    /// Create a container under the given name. The container is not
    /// started.
    pub async fn create_container(
        &self,
        config: ContainerRuntimeConfig,
    ) -> Result<CreatedContainer, RuntimeError> {
        let options = Some(CreateContainerOptions {
            name: Some(config.name.clone()),
            ..Default::default()
        });
        let response = self
            .client
            .create_container(options, config.into_create_body())
            .await?;
        Ok(CreatedContainer { id: response.id })
    }

    pub async fn start_container(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.client
            .start_container(container_id, None)
            .await
            .map_err(|e| map_not_found(container_id, e))
    }

    /// Stop a running container with an optional timeout (in seconds).
    pub async fn stop_container(
        &self,
        container_id: &str,
        timeout_secs: Option<u32>,
    ) -> Result<(), RuntimeError> {
        let options = timeout_secs.map(|t| StopContainerOptions {
            t: Some(t as i32),
            ..Default::default()
        });
        self.client
            .stop_container(container_id, options)
            .await
            .map_err(|e| map_not_found(container_id, e))
    }

    /// Remove a container. If `force` is true, the container is killed
    /// first.
    pub async fn remove_container(
        &self,
        container_id: &str,
        force: bool,
        remove_volumes: bool,
    ) -> Result<(), RuntimeError> {
        let options = Some(RemoveContainerOptions {
            force,
            v: remove_volumes,
            ..Default::default()
        });
        self.client
            .remove_container(container_id, options)
            .await
            .map_err(|e| map_not_found(container_id, e))
    }

    pub async fn inspect_container(
        &self,
        container_id: &str,
    ) -> Result<InspectedContainer, RuntimeError> {
        let details = self
            .client
            .inspect_container(container_id, None)
            .await
            .map_err(|e| map_not_found(container_id, e))?;

        // NetworkSettings.Ports is a HashMap<String, Option<Vec<PortBinding>>>;
        // keys are "<port>/<proto>".
        let ports = details
            .network_settings
            .as_ref()
            .and_then(|ns| ns.ports.as_ref())
            .map(|port_map| {
                port_map
                    .iter()
                    .filter_map(|(key, bindings)| {
                        let container_port: u32 =
                            key.split_once('/').map(|(p, _)| p).unwrap_or(key).parse().ok()?;
                        let host_port: u32 = bindings
                            .as_deref()
                            .and_then(|b| b.first())
                            .and_then(|b| b.host_port.as_deref())
                            .and_then(|p| p.parse().ok())?;
                        Some((container_port, host_port))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let ip_address = details
            .network_settings
            .as_ref()
            .and_then(|ns| ns.networks.as_ref())
            .and_then(|nets| nets.values().find_map(|ep| ep.ip_address.clone()))
            .unwrap_or_default();

        Ok(InspectedContainer {
            id: details.id.unwrap_or_default(),
            name: details
                .name
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_default(),
            running: details
                .state
                .as_ref()
                .and_then(|s| s.running)
                .unwrap_or(false),
            status: details
                .state
                .as_ref()
                .and_then(|s| s.status.as_ref())
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown".into()),
            ip_address,
            ports,
        })
    }

    /// Count containers on this host carrying the given label.
    pub async fn list_containers_by_label(
        &self,
        label: &str,
    ) -> Result<Vec<String>, RuntimeError> {
        let options = Some(ListContainersOptions {
            all: true,
            filters: Some(HashMap::from([(
                "label".to_string(),
                vec![label.to_string()],
            )])),
            ..Default::default()
        });
        let containers = self.client.list_containers(options).await?;
        Ok(containers
            .into_iter()
            .filter_map(|c| c.id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::container::BindOptions;

    #[test]
    fn test_restart_policy_enum_mapping() {
        assert_eq!(restart_policy_enum("always"), RestartPolicyNameEnum::ALWAYS);
        assert_eq!(
            restart_policy_enum("on-failure"),
            RestartPolicyNameEnum::ON_FAILURE
        );
        assert_eq!(restart_policy_enum("no"), RestartPolicyNameEnum::NO);
        assert_eq!(restart_policy_enum("bogus"), RestartPolicyNameEnum::NO);
    }

    #[test]
    fn test_convert_bind_mount() {
        let mount = VolumeMount {
            kind: MountKind::Bind,
            source: "/etc/conf".into(),
            target: "/conf".into(),
            read_only: true,
            bind_options: Some(BindOptions {
                propagation: Some("rslave".into()),
                create_host_path: false,
            }),
            volume_options: None,
        };
        let converted = convert_mount(&mount);
        assert_eq!(converted.typ, Some(MountTypeEnum::BIND));
        assert_eq!(converted.read_only, Some(true));
        assert_eq!(
            converted.bind_options.unwrap().propagation,
            Some(MountBindOptionsPropagationEnum::RSLAVE)
        );
    }

    #[test]
    fn test_create_body_shape() {
        let mut config = ContainerRuntimeConfig {
            name: "web-api".into(),
            image: "nginx:latest".into(),
            env: vec!["PORT=8080".into()],
            exposed_ports: vec!["8080/tcp".into()],
            restart_policy: Some("always".into()),
            network: Some("web-net".into()),
            ..Default::default()
        };
        config
            .port_bindings
            .insert("8080/tcp".into(), (None, 8080));

        let body = config.into_create_body();
        assert_eq!(body.image.as_deref(), Some("nginx:latest"));
        assert!(body.exposed_ports.unwrap().contains(&"8080/tcp".to_string()));

        let host_config = body.host_config.unwrap();
        let bindings = host_config.port_bindings.unwrap();
        let binding = bindings["8080/tcp"].as_ref().unwrap();
        assert_eq!(binding[0].host_port.as_deref(), Some("8080"));
        assert_eq!(
            host_config.restart_policy.unwrap().name,
            Some(RestartPolicyNameEnum::ALWAYS)
        );

        let endpoints = body
            .networking_config
            .unwrap()
            .endpoints_config
            .unwrap();
        assert!(endpoints.contains_key("web-net"));
    }

    #[test]
    fn test_create_body_omits_empty_collections() {
        let body = ContainerRuntimeConfig {
            name: "c".into(),
            image: "busybox".into(),
            ..Default::default()
        }
        .into_create_body();
        assert!(body.env.is_none());
        assert!(body.cmd.is_none());
        assert!(body.exposed_ports.is_none());
        assert!(body.networking_config.is_none());
        let host_config = body.host_config.unwrap();
        assert!(host_config.port_bindings.is_none());
        assert!(host_config.mounts.is_none());
    }
}
