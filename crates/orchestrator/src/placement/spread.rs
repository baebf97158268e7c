//! Spread placement — greedy balancing on container counts.

use super::{PlacementError, PlacementMap, PlacementStrategy};
use crate::graph::DeploymentPlan;
use crate::model::{HostInfo, Stack};

pub struct SpreadStrategy;

impl PlacementStrategy for SpreadStrategy {
    fn name(&self) -> &'static str {
        "spread"
    }

    fn place(
        &self,
        _stack: &Stack,
        plan: &DeploymentPlan,
        hosts: &[HostInfo],
    ) -> Result<PlacementMap, PlacementError> {
        // (host, running tally) seeded from current container counts;
        // inactive hosts are never candidates.
        let mut counters: Vec<(&HostInfo, u64)> = hosts
            .iter()
            .filter(|h| h.is_active())
            .map(|h| (h, h.load.container_count))
            .collect();
        if counters.is_empty() {
            return Err(PlacementError::NoActiveHost);
        }

        let mut placements = PlacementMap::new();
        for spec in &plan.container_specs {
            let Some((host, count)) = counters.iter_mut().min_by_key(|(_, count)| *count) else {
                return Err(PlacementError::NoActiveHost);
            };
            placements.insert(spec.name.clone(), host.id().to_string());
            *count += 1;
        }
        Ok(placements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HostStatus;
    use crate::placement::testutil::{host, plan_of, spec, stack};

    #[test]
    fn test_three_containers_two_uneven_hosts() {
        // host1 has 3 containers, host2 has 1: the first two land on
        // host2, the tie at 3 falls to host1 → {host1: 4, host2: 3}.
        let hosts = vec![
            host("host1", "", HostStatus::Active, 3),
            host("host2", "", HostStatus::Active, 1),
        ];
        let plan = plan_of(vec![spec("a"), spec("b"), spec("c")]);
        let map = SpreadStrategy.place(&stack(), &plan, &hosts).unwrap();

        assert_eq!(map["a"], "host2");
        assert_eq!(map["b"], "host2");
        assert_eq!(map["c"], "host1");
    }

    #[test]
    fn test_inactive_hosts_excluded() {
        let hosts = vec![
            host("host1", "", HostStatus::Inactive, 0),
            host("host2", "", HostStatus::Active, 10),
        ];
        let plan = plan_of(vec![spec("a")]);
        let map = SpreadStrategy.place(&stack(), &plan, &hosts).unwrap();
        assert_eq!(map["a"], "host2");
    }

    #[test]
    fn test_no_active_host() {
        let hosts = vec![host("host1", "", HostStatus::Draining, 0)];
        let plan = plan_of(vec![spec("a")]);
        assert_eq!(
            SpreadStrategy.place(&stack(), &plan, &hosts),
            Err(PlacementError::NoActiveHost)
        );
    }

    #[test]
    fn test_ties_go_to_first_host() {
        let hosts = vec![
            host("host1", "", HostStatus::Active, 2),
            host("host2", "", HostStatus::Active, 2),
        ];
        let plan = plan_of(vec![spec("a")]);
        let map = SpreadStrategy.place(&stack(), &plan, &hosts).unwrap();
        assert_eq!(map["a"], "host1");
    }
}
