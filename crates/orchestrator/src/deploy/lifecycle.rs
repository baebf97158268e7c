//! Stack lifecycle — stop, start, remove, and deployment-record loading.
//!
//! Deployment records exist in two shapes: the current
//! `deployment-<stack>-<unix>` documents and the legacy
//! `deployment:<stack_id>` alias. Reads prefer the newest current-shape
//! record and fall back to the legacy one; writes only touch the current
//! shape.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::DeployError;
use crate::model::{
    legacy_deployment_id, DeploymentState, DeploymentStatus, Stack, StackDeployment, StackStatus,
    DEPLOYMENT_DOC_TYPE,
};
use crate::runtime::{RuntimeOps, RuntimePool};
use crate::store::{Selector, StoreError, TypedStore};

/// Seconds a container gets to stop gracefully before the runtime kills it.
pub const DEFAULT_STOP_TIMEOUT_SECS: u32 = 10;

/// Load the deployment record for a stack, newest current-shape document
/// first, legacy alias as fallback. Returns the state plus the revision
/// and ID it was loaded under (legacy records report their legacy ID).
pub async fn load_deployment_for_stack(
    store: &TypedStore,
    stack_id: &str,
) -> Result<(DeploymentState, String, String), StoreError> {
    let mut current = store
        .query::<DeploymentState>(
            &Selector::of_type(DEPLOYMENT_DOC_TYPE).field("stack_id", stack_id),
        )
        .await?;
    current.sort_by(|a, b| a.0.started_at.cmp(&b.0.started_at));
    if let Some((state, rev)) = current.pop() {
        let id = state.id.clone();
        return Ok((state, rev, id));
    }

    let legacy_id = legacy_deployment_id(stack_id);
    let (legacy, rev) = store.get::<StackDeployment>(&legacy_id).await?;
    Ok((legacy.into_state(), rev, legacy_id))
}

pub struct StackLifecycle {
    pool: Arc<RuntimePool>,
    store: TypedStore,
}

impl StackLifecycle {
    pub fn new(pool: Arc<RuntimePool>, store: TypedStore) -> Self {
        Self { pool, store }
    }

    /// Stop every placed container with a bounded timeout. Unreachable
    /// hosts are surfaced by name after the remaining hosts were attempted.
    pub async fn stop(&self, stack_id: &str, timeout_secs: Option<u32>) -> Result<(), DeployError> {
        let (mut state, rev, id) = load_deployment_for_stack(&self.store, stack_id).await?;
        let timeout = timeout_secs.unwrap_or(DEFAULT_STOP_TIMEOUT_SECS);
        let mut failures = Vec::new();

        for (name, placement) in &state.placements {
            if placement.container_id.is_empty() {
                continue;
            }
            match self.client(&placement.host_id).await {
                Ok(client) => {
                    if let Err(e) = client
                        .stop_container(&placement.container_id, Some(timeout))
                        .await
                    {
                        failures.push(format!("{} ({}): {}", placement.host_id, name, e));
                    }
                }
                Err(e) => failures.push(format!("{} ({}): {}", placement.host_id, name, e)),
            }
        }

        if !failures.is_empty() {
            return Err(DeployError::HostsFailed {
                operation: "stop",
                failures,
            });
        }

        state.status = DeploymentStatus::Stopped;
        for placement in state.placements.values_mut() {
            placement.status = "stopped".to_string();
        }
        self.store.update(&id, &rev, &state).await?;
        self.set_stack_status(stack_id, StackStatus::Stopped).await;
        info!(stack_id, "Stack stopped");
        Ok(())
    }

    /// Start every placed container again.
    pub async fn start(&self, stack_id: &str) -> Result<(), DeployError> {
        let (mut state, rev, id) = load_deployment_for_stack(&self.store, stack_id).await?;
        let mut failures = Vec::new();

        for (name, placement) in &state.placements {
            if placement.container_id.is_empty() {
                continue;
            }
            match self.client(&placement.host_id).await {
                Ok(client) => {
                    if let Err(e) = client.start_container(&placement.container_id).await {
                        failures.push(format!("{} ({}): {}", placement.host_id, name, e));
                    }
                }
                Err(e) => failures.push(format!("{} ({}): {}", placement.host_id, name, e)),
            }
        }

        if !failures.is_empty() {
            return Err(DeployError::HostsFailed {
                operation: "start",
                failures,
            });
        }

        state.status = DeploymentStatus::Running;
        for placement in state.placements.values_mut() {
            placement.status = "running".to_string();
            placement.started_at = Some(Utc::now());
        }
        self.store.update(&id, &rev, &state).await?;
        self.set_stack_status(stack_id, StackStatus::Running).await;
        info!(stack_id, "Stack started");
        Ok(())
    }

    /// Force-remove every container, delete the deployment record, and
    /// delete the stack record last.
    pub async fn remove(&self, stack_id: &str, remove_volumes: bool) -> Result<(), DeployError> {
        self.set_stack_status(stack_id, StackStatus::Deleting).await;
        let (state, rev, id) = load_deployment_for_stack(&self.store, stack_id).await?;
        let mut failures = Vec::new();

        for (name, placement) in &state.placements {
            if placement.container_id.is_empty() {
                continue;
            }
            match self.client(&placement.host_id).await {
                Ok(client) => {
                    match client
                        .remove_container(&placement.container_id, true, remove_volumes)
                        .await
                    {
                        Ok(()) | Err(crate::runtime::RuntimeError::ContainerNotFound(_)) => {}
                        Err(e) => {
                            failures.push(format!("{} ({}): {}", placement.host_id, name, e))
                        }
                    }
                }
                Err(e) => failures.push(format!("{} ({}): {}", placement.host_id, name, e)),
            }
        }

        if !failures.is_empty() {
            return Err(DeployError::HostsFailed {
                operation: "remove",
                failures,
            });
        }

        self.store.delete(&id, &rev).await?;

        // Stack record goes last so a partial removal stays discoverable.
        match self.store.get::<Stack>(stack_id).await {
            Ok((_, stack_rev)) => self.store.delete(stack_id, &stack_rev).await?,
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        info!(stack_id, "Stack removed");
        Ok(())
    }

    async fn client(&self, host_id: &str) -> Result<Arc<dyn RuntimeOps>, DeployError> {
        self.pool
            .get(host_id)
            .await
            .map_err(|e| DeployError::HostUnavailable {
                host: host_id.to_string(),
                source: e,
            })
    }

    async fn set_stack_status(&self, stack_id: &str, status: StackStatus) {
        let result = self
            .store
            .update_with_retry::<Stack, _>(stack_id, |stack| {
                stack.status = status;
                stack.updated_at = Utc::now();
                true
            })
            .await;
        if let Err(e) = result {
            if !matches!(e, StoreError::NotFound(_)) {
                warn!(stack_id, error = %e, "Stack status update failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContainerPlacement;
    use crate::runtime::FakeRuntime;
    use crate::store::{DocumentStore, MemoryStore};
    use serde_json::json;

    struct Fixture {
        lifecycle: StackLifecycle,
        store: TypedStore,
        fake: Arc<FakeRuntime>,
    }

    async fn fixture() -> Fixture {
        let raw = Arc::new(MemoryStore::new());
        let store = TypedStore::new(raw as Arc<dyn DocumentStore>);
        let pool = Arc::new(RuntimePool::new());
        let fake = Arc::new(FakeRuntime::new());
        pool.insert("host-1", fake.clone()).await;
        Fixture {
            lifecycle: StackLifecycle::new(pool, store.clone()),
            store,
            fake,
        }
    }

    /// Create a container on the fake and a matching persisted deployment.
    async fn seed_deployment(fx: &Fixture, stack_id: &str) -> String {
        let created = fx
            .fake
            .create_container(crate::runtime::ContainerRuntimeConfig {
                name: "web-db".into(),
                image: "postgres".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        fx.fake.start_container(&created.id).await.unwrap();

        let mut state = DeploymentState::new("web", stack_id);
        state.status = DeploymentStatus::Running;
        state.placements.insert(
            "db".into(),
            ContainerPlacement {
                container_id: created.id.clone(),
                container_name: "web-db".into(),
                host_id: "host-1".into(),
                ..Default::default()
            },
        );
        let state_id = state.id.clone();
        fx.store.save(&state_id, &state).await.unwrap();
        created.id
    }

    #[tokio::test]
    async fn test_stop_then_start_cycle() {
        let fx = fixture().await;
        let container_id = seed_deployment(&fx, "stack-web-1").await;

        fx.lifecycle.stop("stack-web-1", Some(5)).await.unwrap();
        assert!(!fx.fake.is_running(&container_id).await);
        let (state, _, _) = load_deployment_for_stack(&fx.store, "stack-web-1")
            .await
            .unwrap();
        assert_eq!(state.status, DeploymentStatus::Stopped);

        fx.lifecycle.start("stack-web-1").await.unwrap();
        assert!(fx.fake.is_running(&container_id).await);
        let (state, _, _) = load_deployment_for_stack(&fx.store, "stack-web-1")
            .await
            .unwrap();
        assert_eq!(state.status, DeploymentStatus::Running);
    }

    #[tokio::test]
    async fn test_remove_deletes_stack_record_last() {
        let fx = fixture().await;
        let stack = Stack::new("web");
        let stack_id = stack.id.clone();
        fx.store.save(&stack_id, &stack).await.unwrap();
        let container_id = seed_deployment(&fx, &stack_id).await;

        fx.lifecycle.remove(&stack_id, false).await.unwrap();

        assert_eq!(fx.fake.removed_ids().await, vec![container_id]);
        assert!(fx.store.get::<Stack>(&stack_id).await.is_err());
        assert!(load_deployment_for_stack(&fx.store, &stack_id).await.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_host_named_in_error() {
        let fx = fixture().await;
        seed_deployment(&fx, "stack-web-1").await;

        // Re-point the placement at a host that has no pool client.
        fx.store
            .update_with_retry::<DeploymentState, _>(
                &load_deployment_for_stack(&fx.store, "stack-web-1")
                    .await
                    .unwrap()
                    .2,
                |state| {
                    for p in state.placements.values_mut() {
                        p.host_id = "host-gone".into();
                    }
                    true
                },
            )
            .await
            .unwrap();

        let err = fx.lifecycle.stop("stack-web-1", None).await.unwrap_err();
        assert!(err.to_string().contains("host-gone"), "err: {err}");
    }

    #[tokio::test]
    async fn test_legacy_record_read() {
        let fx = fixture().await;
        fx.store
            .raw()
            .save(
                "deployment:stack-old-1",
                &json!({
                    "id": "deployment:stack-old-1",
                    "stack_id": "stack-old-1",
                    "status": "running",
                    "placements": {
                        "db": {
                            "container_id": "ctr-legacy",
                            "container_name": "old-db",
                            "host_id": "host-1"
                        }
                    }
                }),
            )
            .await
            .unwrap();

        let (state, _, id) = load_deployment_for_stack(&fx.store, "stack-old-1")
            .await
            .unwrap();
        assert_eq!(id, "deployment:stack-old-1");
        assert_eq!(state.status, DeploymentStatus::Running);
        assert_eq!(state.placements["db"].container_id, "ctr-legacy");
    }

    #[tokio::test]
    async fn test_current_shape_preferred_over_legacy() {
        let fx = fixture().await;
        seed_deployment(&fx, "stack-web-1").await;
        fx.store
            .raw()
            .save(
                "deployment:stack-web-1",
                &json!({"id": "deployment:stack-web-1", "stack_id": "stack-web-1", "status": "stopped"}),
            )
            .await
            .unwrap();

        let (state, _, id) = load_deployment_for_stack(&fx.store, "stack-web-1")
            .await
            .unwrap();
        assert_ne!(id, "deployment:stack-web-1");
        assert_eq!(state.status, DeploymentStatus::Running);
    }
}
