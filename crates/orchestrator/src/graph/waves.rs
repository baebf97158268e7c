//! Wave construction — Kahn's algorithm over `depends_on` edges.
//!
//! Each iteration emits the set of containers whose in-degree has reached
//! zero as one wave, preserving the order in which the in-degree dropped;
//! ties fall back to original definition order. Containers left over after
//! the queue drains form a cycle and fail the parse.

use std::collections::HashMap;

use super::plan::PlanError;
use crate::model::ContainerSpec;

pub fn build_waves(specs: &[ContainerSpec]) -> Result<Vec<Vec<String>>, PlanError> {
    if specs.is_empty() {
        return Ok(Vec::new());
    }

    let index_of: HashMap<&str, usize> = specs
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.as_str(), i))
        .collect();

    // dependency → dependents, in definition order.
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); specs.len()];
    let mut in_degree: Vec<usize> = vec![0; specs.len()];

    for (i, spec) in specs.iter().enumerate() {
        for dep in &spec.depends_on {
            let Some(&dep_idx) = index_of.get(dep.as_str()) else {
                return Err(PlanError::MissingDependency {
                    container: spec.name.clone(),
                    dependency: dep.clone(),
                });
            };
            dependents[dep_idx].push(i);
            in_degree[i] += 1;
        }
    }

    let mut waves: Vec<Vec<String>> = Vec::new();
    let mut emitted = vec![false; specs.len()];

    // First wave: dependency-free containers in definition order.
    let mut current: Vec<usize> = (0..specs.len()).filter(|&i| in_degree[i] == 0).collect();

    while !current.is_empty() {
        let mut next: Vec<usize> = Vec::new();
        for &i in &current {
            emitted[i] = true;
            for &dependent in &dependents[i] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }
        waves.push(current.iter().map(|&i| specs[i].name.clone()).collect());
        current = next;
    }

    let remaining: Vec<String> = specs
        .iter()
        .enumerate()
        .filter(|(i, _)| !emitted[*i])
        .map(|(_, s)| s.name.clone())
        .collect();
    if !remaining.is_empty() {
        return Err(PlanError::CircularDependency(remaining));
    }

    Ok(waves)
}
