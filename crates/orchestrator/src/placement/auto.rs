//! Auto placement — affinity-aware scored placement.
//!
//! Containers are ordered so inferred dependencies place first, then every
//! eligible host is scored per container. Reservations (ports, memory,
//! projected container counts) accumulate as containers are assigned, so
//! later containers see the pressure earlier ones created.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::{PlacementError, PlacementMap, PlacementStrategy};
use crate::graph::DeploymentPlan;
use crate::model::container::env_var_name;
use crate::model::{ContainerSpec, HostInfo, Stack};

const BASE_SCORE: f64 = 100.0;
const DATACENTER_MISMATCH_PENALTY: f64 = 20.0;
const CPU_WEIGHT: f64 = 30.0;
const MEMORY_WEIGHT: f64 = 30.0;
const SPREAD_BONUS: f64 = 10.0;
const SPREAD_PENALTY: f64 = 10.0;
const LOW_MEMORY_PENALTY: f64 = 30.0;
const TIGHT_MEMORY_PENALTY: f64 = 15.0;
const SAME_HOST_AFFINITY: f64 = 25.0;
const SAME_DATACENTER_AFFINITY: f64 = 10.0;
const OVERLOAD_PENALTY: f64 = 20.0;
const BUSY_PENALTY: f64 = 10.0;

const MIB_512: u64 = 512 * 1024 * 1024;
const GIB_1: u64 = 1024 * 1024 * 1024;

/// Per-host running tally while the strategy assigns containers.
struct Reservations {
    reserved_ports: HashSet<u32>,
    reserved_memory: u64,
    projected_container_count: u64,
}

#[derive(Default)]
pub struct AutoStrategy;

impl PlacementStrategy for AutoStrategy {
    fn name(&self) -> &'static str {
        "auto"
    }

    fn place(
        &self,
        stack: &Stack,
        plan: &DeploymentPlan,
        hosts: &[HostInfo],
    ) -> Result<PlacementMap, PlacementError> {
        let affinities = infer_affinities(&plan.container_specs);
        let order = affinity_order(&plan.container_specs, &affinities);

        let mut reservations: HashMap<&str, Reservations> = hosts
            .iter()
            .map(|h| {
                (
                    h.id(),
                    Reservations {
                        reserved_ports: HashSet::new(),
                        reserved_memory: 0,
                        projected_container_count: h.load.container_count,
                    },
                )
            })
            .collect();

        let mut placements = PlacementMap::new();

        for idx in order {
            let spec = &plan.container_specs[idx];
            let deps = affinities.get(&spec.name).cloned().unwrap_or_default();

            let mut best: Option<(&HostInfo, f64)> = None;
            let mut rejections: Vec<String> = Vec::new();

            for host in hosts {
                match score_host(stack, spec, host, &reservations, &deps, &placements, hosts) {
                    Ok(score) => {
                        debug!(container = %spec.name, host = host.id(), score, "Scored host");
                        if best.map(|(_, s)| score > s).unwrap_or(true) {
                            best = Some((host, score));
                        }
                    }
                    Err(reason) => rejections.push(format!("{}: {}", host.id(), reason)),
                }
            }

            let Some((host, _)) = best else {
                return Err(PlacementError::NoEligibleHost {
                    container: spec.name.clone(),
                    details: if rejections.is_empty() {
                        "no hosts provided".to_string()
                    } else {
                        rejections.join("; ")
                    },
                });
            };

            if let Some(tally) = reservations.get_mut(host.id()) {
                for port in &spec.ports {
                    if port.host_port > 0 {
                        tally.reserved_ports.insert(port.host_port);
                    }
                }
                tally.reserved_memory += requested_memory(spec);
                tally.projected_container_count += 1;
            }

            placements.insert(spec.name.clone(), host.id().to_string());
        }

        Ok(placements)
    }
}

/// Memory a container is assumed to reserve: its declared reservation, or
/// 1 GiB when the spec omits one.
fn requested_memory(spec: &ContainerSpec) -> u64 {
    spec.resources
        .reservations
        .memory_bytes
        .filter(|m| *m > 0)
        .map(|m| m as u64)
        .unwrap_or(GIB_1)
}

/// Score one host for one container, or explain why it is ineligible.
#[allow(clippy::too_many_arguments)]
fn score_host(
    stack: &Stack,
    spec: &ContainerSpec,
    host: &HostInfo,
    reservations: &HashMap<&str, Reservations>,
    deps: &[String],
    placements: &PlacementMap,
    hosts: &[HostInfo],
) -> Result<f64, String> {
    if !host.is_active() {
        return Err("host is not active".to_string());
    }
    let tally = &reservations[host.id()];

    for port in &spec.ports {
        if port.host_port > 0 && tally.reserved_ports.contains(&port.host_port) {
            return Err(format!("port conflict on host_port {}", port.host_port));
        }
    }

    let mut score = BASE_SCORE;

    if let Some(dc) = stack.datacenter.as_deref() {
        if !dc.is_empty() && host.host.datacenter != dc {
            score -= DATACENTER_MISMATCH_PENALTY;
        }
    }

    score += (1.0 - host.load.cpu_pct / 100.0) * CPU_WEIGHT;

    if host.host.memory_bytes > 0 {
        let ratio =
            host.available_resources.memory_bytes as f64 / host.host.memory_bytes as f64;
        score += ratio * MEMORY_WEIGHT;
    }

    if tally.projected_container_count < 5 {
        score += SPREAD_BONUS;
    } else if tally.projected_container_count > 10 {
        score -= SPREAD_PENALTY;
    }

    let remaining = host
        .available_resources
        .memory_bytes
        .saturating_sub(tally.reserved_memory);
    if remaining < MIB_512 {
        score -= LOW_MEMORY_PENALTY;
    } else if remaining < GIB_1 {
        score -= TIGHT_MEMORY_PENALTY;
    }

    for dep in deps {
        if let Some(dep_host_id) = placements.get(dep) {
            if dep_host_id == host.id() {
                score += SAME_HOST_AFFINITY;
            } else if hosts
                .iter()
                .find(|h| h.id() == dep_host_id)
                .is_some_and(|dep_host| {
                    !dep_host.host.datacenter.is_empty()
                        && dep_host.host.datacenter == host.host.datacenter
                })
            {
                score += SAME_DATACENTER_AFFINITY;
            }
        }
    }

    if tally.projected_container_count >= 8 {
        score -= OVERLOAD_PENALTY;
    } else if tally.projected_container_count >= 5 {
        score -= BUSY_PENALTY;
    }

    Ok(score)
}

/// Scan each container's environment for any other container's name
/// (case-insensitive, `-`/`.` normalized to `_`); a hit records a soft
/// dependency on that service.
fn infer_affinities(specs: &[ContainerSpec]) -> HashMap<String, Vec<String>> {
    let normalized: Vec<(usize, String)> = specs
        .iter()
        .enumerate()
        .map(|(i, s)| (i, env_var_name(&s.name)))
        .collect();

    let mut affinities: HashMap<String, Vec<String>> = HashMap::new();
    for spec in specs {
        let haystacks: Vec<String> = spec
            .environment
            .iter()
            .flat_map(|e| [env_var_name(&e.name), env_var_name(&e.value)])
            .collect();

        let mut deps = Vec::new();
        for (other_idx, other_norm) in &normalized {
            let other = &specs[*other_idx];
            if other.name == spec.name || other_norm.is_empty() {
                continue;
            }
            if haystacks.iter().any(|h| h.contains(other_norm)) {
                deps.push(other.name.clone());
            }
        }
        if !deps.is_empty() {
            affinities.insert(spec.name.clone(), deps);
        }
    }
    affinities
}

/// Order container indices so affinity dependencies come first. Affinity
/// cycles are tolerated: whatever remains is appended in definition order.
fn affinity_order(
    specs: &[ContainerSpec],
    affinities: &HashMap<String, Vec<String>>,
) -> Vec<usize> {
    let index_of: HashMap<&str, usize> = specs
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.as_str(), i))
        .collect();

    let mut order = Vec::with_capacity(specs.len());
    let mut placed = vec![false; specs.len()];

    loop {
        let mut progressed = false;
        for (i, spec) in specs.iter().enumerate() {
            if placed[i] {
                continue;
            }
            let ready = affinities
                .get(&spec.name)
                .map(|deps| {
                    deps.iter().all(|d| {
                        index_of.get(d.as_str()).map(|&j| placed[j]).unwrap_or(true)
                    })
                })
                .unwrap_or(true);
            if ready {
                placed[i] = true;
                order.push(i);
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
    for (i, flag) in placed.iter().enumerate() {
        if !flag {
            order.push(i);
        }
    }
    order
}
