//! Live — implements `RuntimeOps` for the real Bollard-backed `RuntimeClient`.

use std::collections::HashMap;
use std::pin::Pin;

use super::client::{RuntimeClient, RuntimeError};
use super::container::{ContainerRuntimeConfig, CreatedContainer, InspectedContainer};
use super::network::{NetworkRuntimeConfig, NetworkView};
use super::ops::RuntimeOps;
use super::volume::VolumeView;

impl RuntimeOps for RuntimeClient {
    // ── Daemon ──────────────────────────────────────────────────

    fn ping(
        &self,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), RuntimeError>> + Send + '_>> {
        Box::pin(self.ping())
    }

    // ── Images ──────────────────────────────────────────────────

    fn pull_image<'a>(
        &'a self,
        image: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), RuntimeError>> + Send + 'a>> {
        Box::pin(self.pull_image(image))
    }

    // ── Container lifecycle ─────────────────────────────────────

    fn create_container(
        &self,
        config: ContainerRuntimeConfig,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<CreatedContainer, RuntimeError>> + Send + '_>>
    {
        Box::pin(self.create_container(config))
    }

    fn start_container<'a>(
        &'a self,
        container_id: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), RuntimeError>> + Send + 'a>> {
        Box::pin(self.start_container(container_id))
    }

    fn stop_container<'a>(
        &'a self,
        container_id: &'a str,
        timeout_secs: Option<u32>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), RuntimeError>> + Send + 'a>> {
        Box::pin(self.stop_container(container_id, timeout_secs))
    }

    fn remove_container<'a>(
        &'a self,
        container_id: &'a str,
        force: bool,
        remove_volumes: bool,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), RuntimeError>> + Send + 'a>> {
        Box::pin(self.remove_container(container_id, force, remove_volumes))
    }

    fn inspect_container<'a>(
        &'a self,
        container_id: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<InspectedContainer, RuntimeError>> + Send + 'a>>
    {
        Box::pin(self.inspect_container(container_id))
    }

    fn list_containers_by_label<'a>(
        &'a self,
        label: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<String>, RuntimeError>> + Send + 'a>>
    {
        Box::pin(self.list_containers_by_label(label))
    }

    // ── Networks ────────────────────────────────────────────────

    fn create_network(
        &self,
        config: NetworkRuntimeConfig,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), RuntimeError>> + Send + '_>> {
        Box::pin(self.create_network(config))
    }

    fn inspect_network<'a>(
        &'a self,
        name: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<NetworkView, RuntimeError>> + Send + 'a>>
    {
        Box::pin(self.inspect_network(name))
    }

    fn remove_network<'a>(
        &'a self,
        name: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), RuntimeError>> + Send + 'a>> {
        Box::pin(self.remove_network(name))
    }

    // ── Volumes ─────────────────────────────────────────────────

    fn create_volume<'a>(
        &'a self,
        name: &'a str,
        driver: Option<&'a str>,
        labels: HashMap<String, String>,
        driver_opts: HashMap<String, String>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<VolumeView, RuntimeError>> + Send + 'a>>
    {
        Box::pin(self.create_volume(name, driver, labels, driver_opts))
    }

    fn remove_volume<'a>(
        &'a self,
        name: &'a str,
        force: bool,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), RuntimeError>> + Send + 'a>> {
        Box::pin(self.remove_volume(name, force))
    }
}
