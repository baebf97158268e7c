//! Fake — test double for runtime operations.
//!
//! Provides a deterministic [`FakeRuntime`] that implements [`RuntimeOps`]
//! using in-memory state. Useful for unit-testing the deployer and
//! lifecycle paths without a running daemon. Failure injection is by
//! container name so tests can make exactly one wave member fail.

use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;

use super::client::RuntimeError;
use super::container::{ContainerRuntimeConfig, CreatedContainer, InspectedContainer};
use super::network::{NetworkRuntimeConfig, NetworkView};
use super::ops::RuntimeOps;
use super::volume::VolumeView;

/// A container held by the fake store.
#[derive(Clone, Debug)]
pub struct FakeContainer {
    pub id: String,
    pub config: ContainerRuntimeConfig,
    pub running: bool,
}

/// Mutable inner state protected by a mutex.
#[derive(Default)]
struct Inner {
    containers: HashMap<String, FakeContainer>,
    networks: HashMap<String, NetworkView>,
    volumes: HashMap<String, VolumeView>,
    pulled: Vec<String>,
    removed: Vec<String>,
    fail_create: HashSet<String>,
    fail_start: HashSet<String>,
    fail_ping: bool,
}

/// A fake runtime client for deterministic testing.
pub struct FakeRuntime {
    inner: Mutex<Inner>,
    next_id: AtomicU64,
    /// IP reported for every container, letting tests fix the host address.
    pub ip_address: String,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            next_id: AtomicU64::new(1),
            ip_address: "172.17.0.2".to_string(),
        }
    }

    /// Make `create_container` fail for the given container name.
    pub async fn fail_create_for(&self, name: &str) {
        self.inner.lock().await.fail_create.insert(name.to_string());
    }

    /// Make `start_container` fail for the given container id.
    pub async fn fail_start_for(&self, container_id: &str) {
        self.inner
            .lock()
            .await
            .fail_start
            .insert(container_id.to_string());
    }

    /// Make the daemon unreachable.
    pub async fn set_unreachable(&self) {
        self.inner.lock().await.fail_ping = true;
    }

    /// Seed an already-existing network (for `external: true` plans).
    pub async fn add_network(&self, view: NetworkView) {
        self.inner.lock().await.networks.insert(view.name.clone(), view);
    }

    // ── Test observers ──────────────────────────────────────────

    pub async fn created_names(&self) -> Vec<String> {
        let state = self.inner.lock().await;
        let mut names: Vec<_> = state
            .containers
            .values()
            .map(|c| c.config.name.clone())
            .collect();
        names.sort();
        names
    }

    pub async fn removed_ids(&self) -> Vec<String> {
        self.inner.lock().await.removed.clone()
    }

    pub async fn pulled_images(&self) -> Vec<String> {
        self.inner.lock().await.pulled.clone()
    }

    pub async fn is_running(&self, container_id: &str) -> bool {
        self.inner
            .lock()
            .await
            .containers
            .get(container_id)
            .map(|c| c.running)
            .unwrap_or(false)
    }

    pub async fn has_network(&self, name: &str) -> bool {
        self.inner.lock().await.networks.contains_key(name)
    }

    pub async fn has_volume(&self, name: &str) -> bool {
        self.inner.lock().await.volumes.contains_key(name)
    }

    pub async fn container_config(&self, container_id: &str) -> Option<ContainerRuntimeConfig> {
        self.inner
            .lock()
            .await
            .containers
            .get(container_id)
            .map(|c| c.config.clone())
    }
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

// ── RuntimeOps implementation ───────────────────────────────────

impl RuntimeOps for FakeRuntime {
    fn ping(
        &self,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), RuntimeError>> + Send + '_>> {
        Box::pin(async move {
            if self.inner.lock().await.fail_ping {
                Err(RuntimeError::Unreachable {
                    endpoint: "fake://".into(),
                    reason: "injected".into(),
                })
            } else {
                Ok(())
            }
        })
    }

    fn pull_image<'a>(
        &'a self,
        image: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), RuntimeError>> + Send + 'a>> {
        Box::pin(async move {
            self.inner.lock().await.pulled.push(image.to_string());
            Ok(())
        })
    }

    fn create_container(
        &self,
        config: ContainerRuntimeConfig,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<CreatedContainer, RuntimeError>> + Send + '_>>
    {
        Box::pin(async move {
            let mut state = self.inner.lock().await;
            if state.fail_create.contains(&config.name) {
                return Err(RuntimeError::Api(
                    bollard::errors::Error::DockerResponseServerError {
                        status_code: 500,
                        message: format!("injected create failure for {}", config.name),
                    },
                ));
            }
            let id = format!("ctr-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
            state.containers.insert(
                id.clone(),
                FakeContainer {
                    id: id.clone(),
                    config,
                    running: false,
                },
            );
            Ok(CreatedContainer { id })
        })
    }

    fn start_container<'a>(
        &'a self,
        container_id: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), RuntimeError>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.inner.lock().await;
            if state.fail_start.contains(container_id) {
                return Err(RuntimeError::Api(
                    bollard::errors::Error::DockerResponseServerError {
                        status_code: 500,
                        message: format!("injected start failure for {}", container_id),
                    },
                ));
            }
            match state.containers.get_mut(container_id) {
                Some(container) => {
                    container.running = true;
                    Ok(())
                }
                None => Err(RuntimeError::ContainerNotFound(container_id.to_string())),
            }
        })
    }

    fn stop_container<'a>(
        &'a self,
        container_id: &'a str,
        _timeout_secs: Option<u32>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), RuntimeError>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.inner.lock().await;
            match state.containers.get_mut(container_id) {
                Some(container) => {
                    container.running = false;
                    Ok(())
                }
                None => Err(RuntimeError::ContainerNotFound(container_id.to_string())),
            }
        })
    }

    fn remove_container<'a>(
        &'a self,
        container_id: &'a str,
        force: bool,
        _remove_volumes: bool,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), RuntimeError>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.inner.lock().await;
            match state.containers.get(container_id) {
                Some(container) if container.running && !force => {
                    Err(RuntimeError::Api(bollard::errors::Error::DockerResponseServerError {
                        status_code: 409,
                        message: format!("container {} is running", container_id),
                    }))
                }
                Some(_) => {
                    state.containers.remove(container_id);
                    state.removed.push(container_id.to_string());
                    Ok(())
                }
                None => Err(RuntimeError::ContainerNotFound(container_id.to_string())),
            }
        })
    }

    fn inspect_container<'a>(
        &'a self,
        container_id: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<InspectedContainer, RuntimeError>> + Send + 'a>>
    {
        Box::pin(async move {
            let state = self.inner.lock().await;
            let container = state
                .containers
                .get(container_id)
                .ok_or_else(|| RuntimeError::ContainerNotFound(container_id.to_string()))?;
            let ports = container
                .config
                .port_bindings
                .iter()
                .filter_map(|(key, (_, host_port))| {
                    let container_port: u32 =
                        key.split_once('/').map(|(p, _)| p).unwrap_or(key).parse().ok()?;
                    Some((container_port, *host_port))
                })
                .collect();
            Ok(InspectedContainer {
                id: container.id.clone(),
                name: container.config.name.clone(),
                running: container.running,
                status: if container.running { "running" } else { "created" }.to_string(),
                ip_address: self.ip_address.clone(),
                ports,
            })
        })
    }

    fn list_containers_by_label<'a>(
        &'a self,
        label: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<String>, RuntimeError>> + Send + 'a>>
    {
        Box::pin(async move {
            let (key, value) = label.split_once('=').unwrap_or((label, ""));
            let state = self.inner.lock().await;
            let mut ids: Vec<String> = state
                .containers
                .values()
                .filter(|c| {
                    c.config
                        .labels
                        .get(key)
                        .map(|v| value.is_empty() || v == value)
                        .unwrap_or(false)
                })
                .map(|c| c.id.clone())
                .collect();
            ids.sort();
            Ok(ids)
        })
    }

    fn create_network(
        &self,
        config: NetworkRuntimeConfig,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), RuntimeError>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.inner.lock().await;
            let view = NetworkView {
                id: format!("net-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
                name: config.name.clone(),
                driver: config.driver.clone().unwrap_or_else(|| "bridge".into()),
                scope: "local".into(),
                subnet: config.subnet.clone().unwrap_or_default(),
                gateway: config.gateway.clone().unwrap_or_default(),
            };
            state.networks.insert(config.name, view);
            Ok(())
        })
    }

    fn inspect_network<'a>(
        &'a self,
        name: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<NetworkView, RuntimeError>> + Send + 'a>>
    {
        Box::pin(async move {
            self.inner
                .lock()
                .await
                .networks
                .get(name)
                .cloned()
                .ok_or_else(|| RuntimeError::NetworkNotFound(name.to_string()))
        })
    }

    fn remove_network<'a>(
        &'a self,
        name: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), RuntimeError>> + Send + 'a>> {
        Box::pin(async move {
            self.inner
                .lock()
                .await
                .networks
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| RuntimeError::NetworkNotFound(name.to_string()))
        })
    }

    fn create_volume<'a>(
        &'a self,
        name: &'a str,
        driver: Option<&'a str>,
        _labels: HashMap<String, String>,
        _driver_opts: HashMap<String, String>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<VolumeView, RuntimeError>> + Send + 'a>>
    {
        Box::pin(async move {
            let view = VolumeView {
                name: name.to_string(),
                driver: driver.unwrap_or("local").to_string(),
                scope: "local".to_string(),
            };
            self.inner
                .lock()
                .await
                .volumes
                .insert(name.to_string(), view.clone());
            Ok(view)
        })
    }

    fn remove_volume<'a>(
        &'a self,
        name: &'a str,
        _force: bool,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), RuntimeError>> + Send + 'a>> {
        Box::pin(async move {
            self.inner.lock().await.volumes.remove(name);
            Ok(())
        })
    }
}
