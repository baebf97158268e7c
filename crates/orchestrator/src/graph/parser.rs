//! Stack parser — drives the full parse pipeline.

use std::collections::BTreeMap;

use tracing::debug;

use super::plan::{DeploymentPlan, NetworkSpec, ParseResult, PlanError, Topology, TopologyNode};
use super::validate::validate_specs;
use super::waves::build_waves;
use crate::hosts::HostResolver;
use crate::model::{GraphNode, StackDefinition};

pub struct StackParser {
    resolver: HostResolver,
}

/// Host references arrive as absolute URLs; host documents are keyed by
/// bare IDs. Probe the raw reference first, then its trailing path
/// segment.
fn host_ref_candidates(reference: &str) -> Vec<&str> {
    let mut candidates = vec![reference];
    if reference.contains("://") {
        if let Some(tail) = reference.rsplit('/').next() {
            if !tail.is_empty() && tail != reference {
                candidates.push(tail);
            }
        }
    }
    candidates
}

impl StackParser {
    pub fn new(resolver: HostResolver) -> Self {
        Self { resolver }
    }

    pub async fn parse(&self, definition: &StackDefinition) -> ParseResult {
        let mut result = ParseResult::default();

        // ── Shape validation ────────────────────────────────────
        if definition.graph.is_empty() {
            result.errors.push(PlanError::EmptyGraph);
            return result;
        }
        if definition.context.is_none() {
            result
                .warnings
                .push("definition has no @context block".to_string());
        }

        // ── Stack extraction ────────────────────────────────────
        let Some(stack_node) = definition.graph.iter().find(|n| n.is_stack_node()) else {
            result.errors.push(PlanError::MissingStackNode);
            return result;
        };
        let stack_node = stack_node.clone();
        let mut specs = stack_node.has_part.clone();
        if specs.is_empty() {
            result
                .warnings
                .push(format!("stack {} defines no containers", stack_node.name));
        }

        // ── Host mapping ────────────────────────────────────────
        let stack_host = match &stack_node.located_in_host {
            Some(reference) => match self.resolve_host_ref(&reference.id).await {
                Ok(Some(host_id)) => Some(host_id),
                Ok(None) => {
                    result.warnings.push(format!(
                        "stack host {} does not resolve; containers without a host fall back to auto-placement",
                        reference.id
                    ));
                    None
                }
                Err(e) => {
                    result.errors.push(e);
                    None
                }
            },
            None => None,
        };

        let mut host_map: BTreeMap<String, String> = BTreeMap::new();
        for spec in &specs {
            let key = if spec.id.is_empty() {
                spec.name.clone()
            } else {
                spec.id.clone()
            };
            match &spec.located_in_host {
                Some(reference) => match self.resolve_host_ref(&reference.id).await {
                    Ok(Some(host_id)) => {
                        host_map.insert(key, host_id);
                    }
                    Ok(None) => {
                        result.errors.push(PlanError::UnresolvedHost {
                            container: spec.name.clone(),
                            host_id: reference.id.clone(),
                        });
                    }
                    Err(e) => result.errors.push(e),
                },
                None => match &stack_host {
                    Some(host_id) => {
                        host_map.insert(key, host_id.clone());
                    }
                    None => {
                        result.warnings.push(format!(
                            "container {} has no host; will be auto-placed",
                            spec.name
                        ));
                        host_map.insert(key, String::new());
                    }
                },
            }
        }

        // ── Topology extraction (non-fatal) ─────────────────────
        let topology = extract_topology(&definition.graph);
        debug!(
            hosts = topology.hosts.len(),
            racks = topology.racks.len(),
            datacenters = topology.datacenters.len(),
            "Extracted topology"
        );

        // ── Dependency graph ────────────────────────────────────
        let dependency_graph = match build_waves(&specs) {
            Ok(waves) => waves,
            Err(e) => {
                result.errors.push(e);
                Vec::new()
            }
        };

        // ── Spec validation ─────────────────────────────────────
        let (warnings, errors) = validate_specs(&mut specs);
        result.warnings.extend(warnings);
        result.errors.extend(errors);

        // ── Network spec ────────────────────────────────────────
        let network = match stack_node.extra.get("network") {
            Some(value) => match serde_json::from_value::<NetworkSpec>(value.clone()) {
                Ok(spec) if !spec.name.is_empty() => Some(spec),
                Ok(_) => {
                    result
                        .warnings
                        .push("stack network block has no name; ignored".to_string());
                    None
                }
                Err(e) => {
                    result
                        .warnings
                        .push(format!("stack network block does not parse: {}", e));
                    None
                }
            },
            None => None,
        };

        if result.errors.is_empty() {
            result.plan = Some(DeploymentPlan {
                stack_node,
                container_specs: specs,
                host_map,
                network,
                topology,
                dependency_graph,
            });
        }
        result
    }

    /// `Ok(Some(id))` when the reference resolves, `Ok(None)` when no
    /// candidate exists, `Err` when the store itself failed.
    async fn resolve_host_ref(&self, reference: &str) -> Result<Option<String>, PlanError> {
        for candidate in host_ref_candidates(reference) {
            match self.resolver.exists(candidate).await {
                Ok(true) => return Ok(Some(candidate.to_string())),
                Ok(false) => continue,
                Err(e) => return Err(PlanError::HostProbe(e.to_string())),
            }
        }
        Ok(None)
    }
}

fn extract_topology(graph: &[GraphNode]) -> Topology {
    let mut topology = Topology::default();
    for node in graph {
        if node.is_stack_node() {
            continue;
        }
        let entry = TopologyNode {
            id: node.id.clone(),
            name: node.name.clone(),
            kind: node.types.first().cloned().unwrap_or_default(),
        };
        if node.has_type_containing("Datacenter") {
            topology.datacenters.push(entry);
        } else if node.has_type_containing("Rack") {
            topology.racks.push(entry);
        } else if node.has_type_containing("Host") {
            topology.hosts.push(entry);
        }
    }
    topology
}
