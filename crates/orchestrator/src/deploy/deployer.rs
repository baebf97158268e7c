//! Deployer — drives one deployment through its phases, wave by wave.
//!
//! Each deployment owns its own state document, so concurrent deployments
//! never contend on a revision. The state machine:
//! pending → deploying (initialization → network-creation → volume-creation
//! → container-deployment) → running, with any failure landing in failed
//! and, when requested, a container-only rollback. Networks and volumes
//! are never rolled back.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::build::{build_runtime_config, qualified_name, PlacementContext};
use super::{DeployError, DeployOptions, MAX_WAVE_FAILURES};
use crate::events::EventBroadcaster;
use crate::graph::DeploymentPlan;
use crate::hosts::HostResolver;
use crate::model::{
    ContainerPlacement, ContainerSpec, DeploymentEvent, DeploymentPhase, DeploymentState,
    NetworkInfo, Stack, StackStatus, VolumeInfo,
};
use crate::runtime::{Endpoint, NetworkRuntimeConfig, RuntimeError, RuntimeOps, RuntimePool};
use crate::store::{StoreError, TypedStore};

/// Bounded wave-readiness wait: attempts × interval caps the barrier.
const WAVE_READY_ATTEMPTS: u32 = 10;
const WAVE_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct Deployer {
    pool: Arc<RuntimePool>,
    store: TypedStore,
    resolver: HostResolver,
    events: Arc<dyn EventBroadcaster>,
}

impl Deployer {
    pub fn new(
        pool: Arc<RuntimePool>,
        store: TypedStore,
        resolver: HostResolver,
        events: Arc<dyn EventBroadcaster>,
    ) -> Self {
        Self {
            pool,
            store,
            resolver,
            events,
        }
    }

    /// Execute a deployment plan. Returns the final persisted state on
    /// success; on failure the state document is still persisted with
    /// status `failed` before the error surfaces.
    pub async fn deploy(
        &self,
        stack: &Stack,
        plan: &DeploymentPlan,
        options: DeployOptions,
    ) -> Result<DeploymentState, DeployError> {
        let deadline = Instant::now() + options.timeout;
        let stack_name = if options.stack_name.is_empty() {
            stack.name.clone()
        } else {
            options.stack_name.clone()
        };

        let mut state = DeploymentState::new(&stack_name, &stack.id);
        state.record_event(DeploymentEvent::info(
            "deployment_started",
            format!("deploying stack {}", stack.name),
        ));
        let mut rev = self.store.save(&state.id, &state).await?;
        self.events.broadcast_graph_event(
            "deployment_started",
            json!({"deployment_id": state.id, "stack_id": stack.id}),
        );
        self.set_stack_status(&stack.id, StackStatus::Deploying, None).await;

        let mut host_ips: HashMap<String, String> = HashMap::new();
        let outcome = self
            .run_phases(
                stack,
                plan,
                &options,
                &stack_name,
                deadline,
                &mut state,
                &mut rev,
                &mut host_ips,
            )
            .await;

        match outcome {
            Ok(()) => {
                state.complete();
                state.record_event(DeploymentEvent::info(
                    "deployment_completed",
                    format!("{} containers running", state.placements.len()),
                ));
                self.persist(&mut rev, &state).await?;
                self.events.broadcast_graph_event(
                    "deployment_completed",
                    json!({"deployment_id": state.id, "stack_id": stack.id}),
                );
                self.set_stack_status(&stack.id, StackStatus::Running, None).await;
                info!(deployment = %state.id, stack = %stack.id, "Deployment completed");
                Ok(state)
            }
            Err(e) => {
                if options.rollback_on_error {
                    self.rollback(&mut state).await;
                }
                state.fail(e.to_string());
                if let Err(persist_err) = self.persist(&mut rev, &state).await {
                    warn!(
                        deployment = %state.id,
                        error = %persist_err,
                        "Failed to persist failed deployment state"
                    );
                }
                self.events.broadcast_graph_event(
                    "deployment_failed",
                    json!({
                        "deployment_id": state.id,
                        "stack_id": stack.id,
                        "error": e.to_string(),
                    }),
                );
                self.set_stack_status(&stack.id, StackStatus::Error, Some(e.to_string()))
                    .await;
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_phases(
        &self,
        stack: &Stack,
        plan: &DeploymentPlan,
        options: &DeployOptions,
        stack_name: &str,
        deadline: Instant,
        state: &mut DeploymentState,
        rev: &mut String,
        host_ips: &mut HashMap<String, String>,
    ) -> Result<(), DeployError> {
        check_deadline(deadline)?;

        if plan.network.is_some() {
            state.phase = DeploymentPhase::NetworkCreation;
            self.persist(rev, state).await?;
            self.create_network(plan, deadline, state, host_ips).await?;
            self.persist(rev, state).await?;
        }

        state.phase = DeploymentPhase::VolumeCreation;
        self.persist(rev, state).await?;
        self.create_volumes(plan, deadline, state, host_ips).await?;
        self.persist(rev, state).await?;

        state.phase = DeploymentPhase::ContainerDeployment;
        self.persist(rev, state).await?;
        self.deploy_waves(stack, plan, options, stack_name, deadline, state, rev, host_ips)
            .await
    }

    // ── Network phase ───────────────────────────────────────────

    async fn create_network(
        &self,
        plan: &DeploymentPlan,
        deadline: Instant,
        state: &mut DeploymentState,
        host_ips: &mut HashMap<String, String>,
    ) -> Result<(), DeployError> {
        let Some(network) = &plan.network else {
            return Ok(());
        };
        check_deadline(deadline)?;

        // Primary host: the stack-level host flows through the host map,
        // so the first container's host is where the network lives.
        let Some(first) = plan.container_specs.first() else {
            state.record_event(DeploymentEvent::warning(
                "network_skipped",
                "no containers, nowhere to create the network",
            ));
            return Ok(());
        };
        let host_id = self.resolve_container_host(plan, first, host_ips).await?;
        let client = self.client_for(&host_id).await?;

        let view = if network.external {
            client
                .inspect_network(&network.name)
                .await
                .map_err(|e| DeployError::Network {
                    host: host_id.clone(),
                    reason: format!("external network {}: {}", network.name, e),
                })?
        } else {
            client
                .create_network(NetworkRuntimeConfig {
                    name: network.name.clone(),
                    driver: network.driver.clone(),
                    labels: network.labels.clone(),
                    options: network.options.clone(),
                    subnet: network.subnet.clone(),
                    gateway: network.gateway.clone(),
                    ip_range: network.ip_range.clone(),
                })
                .await
                .map_err(|e| DeployError::Network {
                    host: host_id.clone(),
                    reason: e.to_string(),
                })?;
            client
                .inspect_network(&network.name)
                .await
                .map_err(|e| DeployError::Network {
                    host: host_id.clone(),
                    reason: e.to_string(),
                })?
        };

        state.network_info = Some(NetworkInfo {
            network_id: view.id,
            name: view.name,
            driver: view.driver,
            subnet: view.subnet,
            gateway: view.gateway,
            scope: view.scope,
        });
        state.record_event(DeploymentEvent::info(
            "network_ready",
            format!("network {} on host {}", network.name, host_id),
        ));
        Ok(())
    }

    // ── Volume phase ────────────────────────────────────────────

    async fn create_volumes(
        &self,
        plan: &DeploymentPlan,
        deadline: Instant,
        state: &mut DeploymentState,
        host_ips: &mut HashMap<String, String>,
    ) -> Result<(), DeployError> {
        // First consuming container decides the volume's host.
        let mut pending: Vec<(&str, &ContainerSpec)> = Vec::new();
        for spec in &plan.container_specs {
            for mount in spec.named_volumes() {
                if !pending.iter().any(|(name, _)| *name == mount.source) {
                    pending.push((&mount.source, spec));
                }
            }
        }

        for (volume_name, spec) in pending {
            check_deadline(deadline)?;
            let host_id = match self.resolve_container_host(plan, spec, host_ips).await {
                Ok(host_id) => host_id,
                Err(e) => {
                    state.record_event(DeploymentEvent::warning(
                        "volume_skipped",
                        format!("volume {} has no resolvable host: {}", volume_name, e),
                    ));
                    continue;
                }
            };
            let client = self.client_for(&host_id).await?;

            // Merge labels and driver options from the consuming mount.
            let (driver, labels, driver_opts) = spec
                .volume_mounts
                .iter()
                .find(|m| m.source == volume_name)
                .and_then(|m| m.volume_options.as_ref())
                .map(|o| (o.driver.clone(), o.labels.clone(), o.driver_opts.clone()))
                .unwrap_or_default();

            let view = client
                .create_volume(volume_name, driver.as_deref(), labels, driver_opts)
                .await
                .map_err(|e| DeployError::Runtime {
                    container: spec.name.clone(),
                    host: host_id.clone(),
                    source: e,
                })?;

            state.volume_info.insert(
                volume_name.to_string(),
                VolumeInfo {
                    driver: view.driver,
                    scope: view.scope,
                    created_at: Utc::now(),
                },
            );
            debug!(volume = volume_name, host = %host_id, "Volume ready");
        }
        Ok(())
    }

    // ── Container waves ─────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    async fn deploy_waves(
        &self,
        _stack: &Stack,
        plan: &DeploymentPlan,
        options: &DeployOptions,
        stack_name: &str,
        deadline: Instant,
        state: &mut DeploymentState,
        rev: &mut String,
        host_ips: &mut HashMap<String, String>,
    ) -> Result<(), DeployError> {
        let total = plan.container_total();
        let mut deployed = 0usize;

        for (wave_idx, wave) in plan.dependency_graph.iter().enumerate() {
            let mut failures: Vec<DeployError> = Vec::new();

            for name in wave {
                if failures.len() > MAX_WAVE_FAILURES {
                    state.record_event(DeploymentEvent::error(
                        "wave_aborted",
                        format!("wave {} aborted after {} failures", wave_idx, failures.len()),
                    ));
                    self.persist(rev, state).await?;
                    return Err(DeployError::WaveAborted {
                        wave: wave_idx,
                        failures: failures.len(),
                    });
                }
                check_deadline(deadline)?;

                let Some(spec) = plan.spec_by_name(name) else {
                    failures.push(DeployError::NoHostForContainer(name.clone()));
                    continue;
                };

                match self
                    .deploy_container(plan, spec, options, stack_name, state, host_ips)
                    .await
                {
                    Ok(placement) => {
                        deployed += 1;
                        state.record_event(DeploymentEvent::info(
                            "container_deployed",
                            format!(
                                "{} ({}) on host {}",
                                placement.container_name, placement.container_id, placement.host_id
                            ),
                        ));
                        self.events.broadcast_graph_event(
                            "container_deployed",
                            json!({
                                "deployment_id": state.id,
                                "container": spec.name,
                                "host_id": placement.host_id,
                            }),
                        );
                        state.placements.insert(spec.name.clone(), placement);
                        state.set_progress(deployed, total);
                        self.persist(rev, state).await?;
                    }
                    Err(e) => {
                        state.record_event(DeploymentEvent::error(
                            "container_failed",
                            format!("{}: {}", spec.name, e),
                        ));
                        self.persist(rev, state).await?;
                        failures.push(e);
                    }
                }
            }

            if let Some(first) = failures.into_iter().next() {
                return Err(first);
            }

            self.wait_for_wave(wave, deadline, state).await?;
        }
        Ok(())
    }

    async fn deploy_container(
        &self,
        plan: &DeploymentPlan,
        spec: &ContainerSpec,
        options: &DeployOptions,
        stack_name: &str,
        state: &DeploymentState,
        host_ips: &mut HashMap<String, String>,
    ) -> Result<ContainerPlacement, DeployError> {
        let host_id = self.resolve_container_host(plan, spec, host_ips).await?;
        let client = self.client_for(&host_id).await?;

        let runtime_err = |source: RuntimeError| DeployError::Runtime {
            container: spec.name.clone(),
            host: host_id.clone(),
            source,
        };

        if options.pull_images {
            client.pull_image(&spec.image).await.map_err(runtime_err)?;
        }

        let config = build_runtime_config(
            spec,
            plan,
            stack_name,
            &PlacementContext {
                placements: &state.placements,
                host_ips,
                host_id: &host_id,
            },
        );

        let created = client.create_container(config).await.map_err(runtime_err)?;
        client.start_container(&created.id).await.map_err(runtime_err)?;
        let inspected = client
            .inspect_container(&created.id)
            .await
            .map_err(runtime_err)?;

        Ok(ContainerPlacement {
            container_id: created.id,
            container_name: qualified_name(stack_name, &spec.name),
            host_id,
            ip_address: inspected.ip_address,
            ports: inspected.ports,
            status: inspected.status,
            started_at: Some(Utc::now()),
        })
    }

    /// Wave barrier: poll each member until the runtime reports it running,
    /// bounded by attempts and the deployment deadline. A container that
    /// never settles is recorded as a warning, not a failure.
    async fn wait_for_wave(
        &self,
        wave: &[String],
        deadline: Instant,
        state: &mut DeploymentState,
    ) -> Result<(), DeployError> {
        for name in wave {
            let Some(placement) = state.placements.get(name) else {
                continue;
            };
            let container_id = placement.container_id.clone();
            let host_id = placement.host_id.clone();
            let client = self.client_for(&host_id).await?;

            let mut settled = false;
            for attempt in 0..WAVE_READY_ATTEMPTS {
                check_deadline(deadline)?;
                match client.inspect_container(&container_id).await {
                    Ok(inspected) if inspected.running => {
                        if let Some(p) = state.placements.get_mut(name) {
                            p.status = inspected.status;
                        }
                        settled = true;
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!(container = %name, attempt, error = %e, "Readiness probe failed");
                    }
                }
                tokio::time::sleep(WAVE_POLL_INTERVAL).await;
            }
            if !settled {
                state.record_event(DeploymentEvent::warning(
                    "container_not_ready",
                    format!("{} did not report running within the barrier window", name),
                ));
            }
        }
        Ok(())
    }

    // ── Rollback ────────────────────────────────────────────────

    /// Force-remove every container this deployment created. Best-effort:
    /// an unreachable host skips its containers. Networks and volumes stay.
    async fn rollback(&self, state: &mut DeploymentState) {
        let mut removed = Vec::new();
        for (name, placement) in &state.placements {
            if placement.container_id.is_empty() {
                continue;
            }
            let client = match self.client_for(&placement.host_id).await {
                Ok(client) => client,
                Err(e) => {
                    warn!(container = %name, host = %placement.host_id, error = %e,
                        "Rollback cannot reach host; container left behind");
                    continue;
                }
            };
            match client
                .remove_container(&placement.container_id, true, false)
                .await
            {
                Ok(()) => removed.push(placement.container_id.clone()),
                Err(e) => {
                    warn!(container = %name, error = %e, "Rollback removal failed");
                }
            }
        }

        state.phase = DeploymentPhase::Rollback;
        state.rollback_state = Some(crate::model::RollbackState {
            status: "rolled-back".to_string(),
            removed_containers: removed,
            completed_at: Some(Utc::now()),
        });
        state.record_event(DeploymentEvent::info(
            "rollback_completed",
            format!(
                "{} containers removed",
                state
                    .rollback_state
                    .as_ref()
                    .map(|r| r.removed_containers.len())
                    .unwrap_or(0)
            ),
        ));
    }

    // ── Shared helpers ──────────────────────────────────────────

    /// Mapped host for a container; an empty mapping falls back to the
    /// first active host (simplest legal auto-placement — the placement
    /// engine is preferred when the caller invokes it beforehand).
    async fn resolve_container_host(
        &self,
        plan: &DeploymentPlan,
        spec: &ContainerSpec,
        host_ips: &mut HashMap<String, String>,
    ) -> Result<String, DeployError> {
        let mapped = plan.host_for(spec);
        if !mapped.is_empty() {
            if !host_ips.contains_key(mapped) {
                if let Ok(info) = self.resolver.resolve(mapped).await {
                    host_ips.insert(mapped.to_string(), info.host.ip_address.clone());
                }
            }
            return Ok(mapped.to_string());
        }

        let active = self.resolver.list_active().await?;
        let Some(first) = active.first() else {
            return Err(DeployError::NoHostForContainer(spec.name.clone()));
        };
        host_ips.insert(first.id().to_string(), first.host.ip_address.clone());
        Ok(first.id().to_string())
    }

    /// Pool lookup with lazy registration: an unregistered host is resolved
    /// and connected on first use.
    async fn client_for(&self, host_id: &str) -> Result<Arc<dyn RuntimeOps>, DeployError> {
        match self.pool.get(host_id).await {
            Ok(client) => Ok(client),
            Err(RuntimeError::NotRegistered(_)) => {
                let info = self.resolver.resolve(host_id).await?;
                let endpoint: Endpoint =
                    info.endpoint
                        .parse()
                        .map_err(|e| DeployError::HostUnavailable {
                            host: host_id.to_string(),
                            source: e,
                        })?;
                self.pool
                    .add(host_id, &endpoint)
                    .await
                    .map_err(|e| DeployError::HostUnavailable {
                        host: host_id.to_string(),
                        source: e,
                    })?;
                self.pool
                    .get(host_id)
                    .await
                    .map_err(|e| DeployError::HostUnavailable {
                        host: host_id.to_string(),
                        source: e,
                    })
            }
            Err(e) => Err(DeployError::HostUnavailable {
                host: host_id.to_string(),
                source: e,
            }),
        }
    }

    async fn persist(&self, rev: &mut String, state: &DeploymentState) -> Result<(), DeployError> {
        *rev = self.store.update(&state.id, rev, state).await?;
        Ok(())
    }

    /// Stack status updates are best-effort: a missing or contended stack
    /// record must not fail the deployment itself.
    async fn set_stack_status(
        &self,
        stack_id: &str,
        status: StackStatus,
        error_message: Option<String>,
    ) {
        let result = self
            .store
            .update_with_retry::<Stack, _>(stack_id, |stack| {
                stack.status = status;
                stack.updated_at = Utc::now();
                match status {
                    StackStatus::Running => {
                        stack.deployed_at = Some(Utc::now());
                        stack.error_message = None;
                    }
                    StackStatus::Error => {
                        stack.error_message = error_message.clone();
                    }
                    _ => {}
                }
                true
            })
            .await;
        match result {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => {
                debug!(stack_id, "No stack record to update");
            }
            Err(e) => {
                warn!(stack_id, error = %e, "Stack status update failed");
            }
        }
    }
}

fn check_deadline(deadline: Instant) -> Result<(), DeployError> {
    if Instant::now() >= deadline {
        Err(DeployError::Cancelled)
    } else {
        Ok(())
    }
}
