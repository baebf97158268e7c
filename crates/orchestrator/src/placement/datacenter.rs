//! Datacenter placement — spread restricted to the stack's datacenter.

use super::{PlacementError, PlacementMap, PlacementStrategy, SpreadStrategy};
use crate::graph::DeploymentPlan;
use crate::model::{HostInfo, Stack};

pub struct DatacenterStrategy;

impl PlacementStrategy for DatacenterStrategy {
    fn name(&self) -> &'static str {
        "datacenter"
    }

    fn place(
        &self,
        stack: &Stack,
        plan: &DeploymentPlan,
        hosts: &[HostInfo],
    ) -> Result<PlacementMap, PlacementError> {
        let datacenter = stack
            .datacenter
            .as_deref()
            .filter(|dc| !dc.is_empty())
            .ok_or(PlacementError::MissingDatacenter)?;

        let local: Vec<HostInfo> = hosts
            .iter()
            .filter(|h| h.host.datacenter == datacenter)
            .cloned()
            .collect();

        SpreadStrategy.place(stack, plan, &local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HostStatus;
    use crate::placement::testutil::{host, plan_of, spec, stack};

    #[test]
    fn test_requires_stack_datacenter() {
        let hosts = vec![host("host1", "east", HostStatus::Active, 0)];
        let plan = plan_of(vec![spec("a")]);
        assert_eq!(
            DatacenterStrategy.place(&stack(), &plan, &hosts),
            Err(PlacementError::MissingDatacenter)
        );
    }

    #[test]
    fn test_filters_to_datacenter_then_spreads() {
        let mut s = stack();
        s.datacenter = Some("east".into());
        let hosts = vec![
            host("host-west", "west", HostStatus::Active, 0),
            host("host-east-1", "east", HostStatus::Active, 2),
            host("host-east-2", "east", HostStatus::Active, 0),
        ];
        let plan = plan_of(vec![spec("a"), spec("b")]);
        let map = DatacenterStrategy.place(&s, &plan, &hosts).unwrap();
        assert_eq!(map["a"], "host-east-2");
        assert_eq!(map["b"], "host-east-2");
        assert!(!map.values().any(|h| h == "host-west"));
    }

    #[test]
    fn test_empty_datacenter_is_no_active_host() {
        let mut s = stack();
        s.datacenter = Some("mars".into());
        let hosts = vec![host("host1", "east", HostStatus::Active, 0)];
        let plan = plan_of(vec![spec("a")]);
        assert_eq!(
            DatacenterStrategy.place(&s, &plan, &hosts),
            Err(PlacementError::NoActiveHost)
        );
    }
}
