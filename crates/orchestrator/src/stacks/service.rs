//! Stack service — definition document in, running stack out.
//!
//! `deploy_definition` runs the whole pipeline: parse the linked-data
//! document, persist the stack record, run the configured placement
//! strategy over the active host inventory, fold the result into the
//! plan's host map, and hand the plan to the deployer. The lifecycle
//! operations delegate to [`StackLifecycle`].

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::deploy::lifecycle::StackLifecycle;
use crate::deploy::{DeployError, DeployOptions, Deployer};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::events::EventBroadcaster;
use crate::graph::{DeploymentPlan, StackParser};
use crate::hosts::HostResolver;
use crate::model::{
    DeploymentConfig, DeploymentState, Stack, StackDefinition, StackStatus, STACK_DOC_TYPE,
};
use crate::placement::{strategy_for, PlacementMap};
use crate::runtime::RuntimePool;
use crate::store::{Selector, StoreError, TypedStore};

/// A stack together with its most recent deployment record, if any.
#[derive(Debug, Serialize)]
pub struct StackView {
    pub stack: Stack,
    pub deployment: Option<DeploymentState>,
}

pub struct StackService {
    store: TypedStore,
    resolver: HostResolver,
    parser: StackParser,
    deployer: Deployer,
    lifecycle: StackLifecycle,
}

impl StackService {
    pub fn new(
        pool: Arc<RuntimePool>,
        store: TypedStore,
        events: Arc<dyn EventBroadcaster>,
    ) -> Self {
        let resolver = HostResolver::from_typed(store.clone());
        Self {
            parser: StackParser::new(resolver.clone()),
            deployer: Deployer::new(pool.clone(), store.clone(), resolver.clone(), events),
            lifecycle: StackLifecycle::new(pool, store.clone()),
            resolver,
            store,
        }
    }

    /// Parse, persist, place, and deploy a stack definition. Parse
    /// warnings are logged; parse errors abort before anything persists.
    pub async fn deploy_definition(
        &self,
        definition: &StackDefinition,
        deployment_config: DeploymentConfig,
        options: DeployOptions,
    ) -> OrchestratorResult<(Stack, DeploymentState)> {
        let result = self.parser.parse(definition).await;
        for warning in &result.warnings {
            warn!(warning = %warning, "Stack definition diagnostic");
        }
        let Some(mut plan) = result.plan else {
            return Err(OrchestratorError::Parse(result.errors));
        };

        let mut stack = Stack::new(if plan.stack_node.name.is_empty() {
            "stack".to_string()
        } else {
            plan.stack_node.name.clone()
        });
        stack.description = plan.stack_node.description.clone().unwrap_or_default();
        stack.datacenter = plan
            .topology
            .datacenters
            .first()
            .map(|dc| dc.name.clone())
            .filter(|name| !name.is_empty());
        stack.deployment_config = deployment_config;
        stack.containers = plan
            .container_specs
            .iter()
            .map(|spec| spec.id.clone())
            .filter(|id| !id.is_empty())
            .collect();
        self.store.save(&stack.id.clone(), &stack).await?;
        info!(stack = %stack.id, containers = plan.container_specs.len(), "Stack persisted");

        if !stack.deployment_config.placement_strategy.is_empty() {
            let placement = self.place(&stack, &plan).await?;
            apply_placement(&mut plan, &placement);
        }

        let state = self.deployer.deploy(&stack, &plan, options).await?;
        let (stack, _) = self.store.get::<Stack>(&stack.id).await?;
        Ok((stack, state))
    }

    /// Run the stack's configured placement strategy over the active host
    /// inventory.
    pub async fn place(
        &self,
        stack: &Stack,
        plan: &DeploymentPlan,
    ) -> OrchestratorResult<PlacementMap> {
        let hosts = self.resolver.list_active().await?;
        let strategy = strategy_for(&stack.deployment_config.placement_strategy);
        let map = strategy.place(stack, plan, &hosts)?;
        info!(strategy = strategy.name(), placements = map.len(), "Placement computed");
        Ok(map)
    }

    pub async fn stop(&self, stack_id: &str, timeout_secs: Option<u32>) -> Result<(), DeployError> {
        self.lifecycle.stop(stack_id, timeout_secs).await
    }

    pub async fn start(&self, stack_id: &str) -> Result<(), DeployError> {
        self.lifecycle.start(stack_id).await
    }

    pub async fn remove(&self, stack_id: &str, remove_volumes: bool) -> Result<(), DeployError> {
        self.lifecycle.remove(stack_id, remove_volumes).await
    }

    pub async fn get(&self, stack_id: &str) -> Result<StackView, StoreError> {
        let (stack, _) = self.store.get::<Stack>(stack_id).await?;
        let deployment =
            match crate::deploy::load_deployment_for_stack(&self.store, stack_id).await {
                Ok((state, _, _)) => Some(state),
                Err(StoreError::NotFound(_)) => None,
                Err(e) => return Err(e),
            };
        Ok(StackView { stack, deployment })
    }

    pub async fn list(&self) -> Result<Vec<Stack>, StoreError> {
        let stacks = self
            .store
            .query::<Stack>(&Selector::of_type(STACK_DOC_TYPE))
            .await?;
        Ok(stacks.into_iter().map(|(stack, _)| stack).collect())
    }

    pub async fn list_by_status(&self, status: StackStatus) -> Result<Vec<Stack>, StoreError> {
        let status_value = serde_json::to_value(status)
            .map_err(|e| StoreError::InvalidDocument(e.to_string()))?;
        let stacks = self
            .store
            .query::<Stack>(&Selector::of_type(STACK_DOC_TYPE).field("status", status_value))
            .await?;
        Ok(stacks.into_iter().map(|(stack, _)| stack).collect())
    }
}

/// Fold a placement map (container name → host) into the plan's host map
/// (container id → host).
pub fn apply_placement(plan: &mut DeploymentPlan, placement: &PlacementMap) {
    for spec in &plan.container_specs {
        if let Some(host_id) = placement.get(&spec.name) {
            let key = if spec.id.is_empty() {
                spec.name.clone()
            } else {
                spec.id.clone()
            };
            plan.host_map.insert(key, host_id.clone());
        }
    }
}
