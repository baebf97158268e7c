//! Host resolver — maps host identifiers to host info plus a runtime
//! endpoint.
//!
//! The container count on a resolved host is derived from a placement
//! query on every call, never cached: placements change underneath us and
//! a stale count skews placement scoring.

use serde_json::Value;
use std::sync::Arc;

use crate::model::{
    AvailableResources, Host, HostInfo, HostLoad, DEPLOYMENT_DOC_TYPE, HOST_DOC_TYPE,
};
use crate::runtime::Endpoint;
use crate::store::{DocumentStore, Selector, StoreError, TypedStore};

/// Memory assumed reserved per placed container when sizing
/// `available_resources` (mirrors the placement engine's default
/// reservation).
const ASSUMED_CONTAINER_MEMORY: u64 = 1024 * 1024 * 1024;

#[derive(Clone)]
pub struct HostResolver {
    store: TypedStore,
}

impl HostResolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store: TypedStore::new(store),
        }
    }

    pub fn from_typed(store: TypedStore) -> Self {
        Self { store }
    }

    /// Resolve one host ID into a [`HostInfo`]. `NotFound` surfaces
    /// directly.
    pub async fn resolve(&self, host_id: &str) -> Result<HostInfo, StoreError> {
        let (host, _rev) = self.store.get::<Host>(host_id).await?;
        self.info_for(host).await
    }

    /// All hosts whose status is `active`, resolved.
    pub async fn list_active(&self) -> Result<Vec<HostInfo>, StoreError> {
        let hosts = self
            .store
            .query::<Host>(&Selector::of_type(HOST_DOC_TYPE).field("status", "active"))
            .await?;
        let mut infos = Vec::with_capacity(hosts.len());
        for (host, _rev) in hosts {
            infos.push(self.info_for(host).await?);
        }
        Ok(infos)
    }

    /// Probe whether a host ID resolves at all (the planner's host-mapping
    /// stage only cares about existence).
    pub async fn exists(&self, host_id: &str) -> Result<bool, StoreError> {
        match self.store.get::<Host>(host_id).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn info_for(&self, host: Host) -> Result<HostInfo, StoreError> {
        let endpoint = Endpoint::for_ip(&host.ip_address);
        let container_count = self.container_count(&host.id).await?;

        let reserved = container_count.saturating_mul(ASSUMED_CONTAINER_MEMORY);
        let available = AvailableResources {
            cpu_cores: f64::from(host.cpu_cores),
            memory_bytes: host.memory_bytes.saturating_sub(reserved),
        };

        Ok(HostInfo {
            endpoint: endpoint.uri(),
            load: HostLoad {
                cpu_pct: 0.0,
                memory_bytes: reserved,
                container_count,
            },
            available_resources: available,
            host,
        })
    }

    /// Containers currently placed on a host, counted across every
    /// deployment state's placement map.
    async fn container_count(&self, host_id: &str) -> Result<u64, StoreError> {
        let deployments = self
            .store
            .query_raw(&Selector::of_type(DEPLOYMENT_DOC_TYPE))
            .await?;
        let mut count = 0u64;
        for doc in deployments {
            if let Some(placements) = doc.value.get("placements").and_then(Value::as_object) {
                count += placements
                    .values()
                    .filter(|p| {
                        p.get("host_id").and_then(Value::as_str) == Some(host_id)
                            && p.get("container_id")
                                .and_then(Value::as_str)
                                .is_some_and(|id| !id.is_empty())
                    })
                    .count() as u64;
            }
        }
        Ok(count)
    }
}
