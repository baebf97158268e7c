//! Runtime trait — abstract interface for all container-runtime operations.
//!
//! Every domain module accesses the runtime through this trait.
//! `live.rs` provides the real Bollard-backed implementation.
//! `fake.rs` provides a test double.

use std::collections::HashMap;
use std::pin::Pin;

use super::client::RuntimeError;
use super::container::{ContainerRuntimeConfig, CreatedContainer, InspectedContainer};
use super::network::{NetworkRuntimeConfig, NetworkView};
use super::volume::VolumeView;

/// Unified async interface over one host's container runtime.
///
/// Object-safe thanks to `Pin<Box<…>>` returns. Implementations must be
/// `Send + Sync` so they can live inside the pool's `Arc` entries.
pub trait RuntimeOps: Send + Sync {
    // ── Daemon ──────────────────────────────────────────────────

    fn ping(
        &self,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), RuntimeError>> + Send + '_>>;

    // ── Images ──────────────────────────────────────────────────

    fn pull_image<'a>(
        &'a self,
        image: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), RuntimeError>> + Send + 'a>>;

    // ── Container lifecycle ─────────────────────────────────────

    fn create_container(
        &self,
        config: ContainerRuntimeConfig,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<CreatedContainer, RuntimeError>> + Send + '_>>;

    fn start_container<'a>(
        &'a self,
        container_id: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), RuntimeError>> + Send + 'a>>;

    fn stop_container<'a>(
        &'a self,
        container_id: &'a str,
        timeout_secs: Option<u32>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), RuntimeError>> + Send + 'a>>;

    fn remove_container<'a>(
        &'a self,
        container_id: &'a str,
        force: bool,
        remove_volumes: bool,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), RuntimeError>> + Send + 'a>>;

    fn inspect_container<'a>(
        &'a self,
        container_id: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<InspectedContainer, RuntimeError>> + Send + 'a>>;

    fn list_containers_by_label<'a>(
        &'a self,
        label: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<String>, RuntimeError>> + Send + 'a>>;

    // ── Networks ────────────────────────────────────────────────

    fn create_network(
        &self,
        config: NetworkRuntimeConfig,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), RuntimeError>> + Send + '_>>;

    fn inspect_network<'a>(
        &'a self,
        name: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<NetworkView, RuntimeError>> + Send + 'a>>;

    fn remove_network<'a>(
        &'a self,
        name: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), RuntimeError>> + Send + 'a>>;

    // ── Volumes ─────────────────────────────────────────────────

    fn create_volume<'a>(
        &'a self,
        name: &'a str,
        driver: Option<&'a str>,
        labels: HashMap<String, String>,
        driver_opts: HashMap<String, String>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<VolumeView, RuntimeError>> + Send + 'a>>;

    fn remove_volume<'a>(
        &'a self,
        name: &'a str,
        force: bool,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), RuntimeError>> + Send + 'a>>;
}
