//! Manual placement — every container must have a matching host
//! constraint.

use super::{PlacementError, PlacementMap, PlacementStrategy};
use crate::graph::DeploymentPlan;
use crate::model::{HostConstraint, HostInfo, Stack};

pub struct ManualStrategy;

impl PlacementStrategy for ManualStrategy {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn place(
        &self,
        stack: &Stack,
        plan: &DeploymentPlan,
        hosts: &[HostInfo],
    ) -> Result<PlacementMap, PlacementError> {
        let constraints = &stack.deployment_config.host_constraints;
        let mut placements = PlacementMap::new();

        for spec in &plan.container_specs {
            let constraint = constraints
                .iter()
                .find(|c| c.container_name == spec.name)
                .ok_or_else(|| PlacementError::MissingConstraint(spec.name.clone()))?;

            if constraint.host_id.is_empty() {
                return Err(PlacementError::ConstraintUnmet {
                    container: spec.name.clone(),
                    host_id: String::new(),
                    reason: "constraint has no target host".to_string(),
                });
            }

            let host = hosts
                .iter()
                .find(|h| h.id() == constraint.host_id)
                .ok_or_else(|| PlacementError::UnknownHost {
                    container: spec.name.clone(),
                    host_id: constraint.host_id.clone(),
                })?;

            check_constraint(&spec.name, constraint, host)?;
            placements.insert(spec.name.clone(), constraint.host_id.clone());
        }

        Ok(placements)
    }
}

fn check_constraint(
    container: &str,
    constraint: &HostConstraint,
    host: &HostInfo,
) -> Result<(), PlacementError> {
    let unmet = |reason: String| PlacementError::ConstraintUnmet {
        container: container.to_string(),
        host_id: constraint.host_id.clone(),
        reason,
    };

    if !host.is_active() {
        return Err(unmet("host is not active".to_string()));
    }
    if let Some(dc) = &constraint.required_datacenter {
        if &host.host.datacenter != dc {
            return Err(unmet(format!(
                "host is in datacenter {:?}, constraint requires {:?}",
                host.host.datacenter, dc
            )));
        }
    }
    if let Some(min_cpu) = constraint.min_cpu {
        if host.host.cpu_cores < min_cpu {
            return Err(unmet(format!(
                "host has {} cores, constraint requires {}",
                host.host.cpu_cores, min_cpu
            )));
        }
    }
    if let Some(min_memory) = constraint.min_memory {
        if host.host.memory_bytes < min_memory {
            return Err(unmet(format!(
                "host has {} bytes of memory, constraint requires {}",
                host.host.memory_bytes, min_memory
            )));
        }
    }
    for (key, value) in &constraint.required_labels {
        if host.host.labels.get(key) != Some(value) {
            return Err(unmet(format!("host is missing label {}={}", key, value)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HostStatus;
    use crate::placement::testutil::{host, plan_of, spec, stack};

    fn constrained_stack(constraints: Vec<HostConstraint>) -> Stack {
        let mut s = stack();
        s.deployment_config.host_constraints = constraints;
        s
    }

    fn constraint(container: &str, host_id: &str) -> HostConstraint {
        HostConstraint {
            container_name: container.into(),
            host_id: host_id.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_happy_path() {
        let s = constrained_stack(vec![constraint("db", "host-1"), constraint("web", "host-2")]);
        let hosts = vec![
            host("host-1", "", HostStatus::Active, 0),
            host("host-2", "", HostStatus::Active, 0),
        ];
        let plan = plan_of(vec![spec("db"), spec("web")]);
        let map = ManualStrategy.place(&s, &plan, &hosts).unwrap();
        assert_eq!(map["db"], "host-1");
        assert_eq!(map["web"], "host-2");
    }

    #[test]
    fn test_missing_constraint_message() {
        let s = constrained_stack(vec![constraint("db", "host-1")]);
        let hosts = vec![host("host-1", "", HostStatus::Active, 0)];
        let plan = plan_of(vec![spec("db"), spec("web")]);
        let err = ManualStrategy.place(&s, &plan, &hosts).unwrap_err();
        assert_eq!(
            err.to_string(),
            "no host constraint defined for container web"
        );
    }

    #[test]
    fn test_unknown_host_is_fatal() {
        let s = constrained_stack(vec![constraint("db", "host-ghost")]);
        let hosts = vec![host("host-1", "", HostStatus::Active, 0)];
        let plan = plan_of(vec![spec("db")]);
        assert!(matches!(
            ManualStrategy.place(&s, &plan, &hosts),
            Err(PlacementError::UnknownHost { .. })
        ));
    }

    #[test]
    fn test_empty_target_is_fatal() {
        let s = constrained_stack(vec![constraint("db", "")]);
        let hosts = vec![host("host-1", "", HostStatus::Active, 0)];
        let plan = plan_of(vec![spec("db")]);
        assert!(matches!(
            ManualStrategy.place(&s, &plan, &hosts),
            Err(PlacementError::ConstraintUnmet { .. })
        ));
    }

    #[test]
    fn test_inactive_host_rejected() {
        let s = constrained_stack(vec![constraint("db", "host-1")]);
        let hosts = vec![host("host-1", "", HostStatus::Inactive, 0)];
        let plan = plan_of(vec![spec("db")]);
        assert!(matches!(
            ManualStrategy.place(&s, &plan, &hosts),
            Err(PlacementError::ConstraintUnmet { .. })
        ));
    }

    #[test]
    fn test_datacenter_cpu_memory_and_labels() {
        let mut c = constraint("db", "host-1");
        c.required_datacenter = Some("east".into());
        c.min_cpu = Some(4);
        c.min_memory = Some(1024);
        c.required_labels.insert("ssd".into(), "true".into());
        let s = constrained_stack(vec![c]);

        let mut good = host("host-1", "east", HostStatus::Active, 0);
        good.host.labels.insert("ssd".into(), "true".into());
        let plan = plan_of(vec![spec("db")]);
        assert!(ManualStrategy.place(&s, &plan, &[good.clone()]).is_ok());

        let mut wrong_dc = good.clone();
        wrong_dc.host.datacenter = "west".into();
        assert!(ManualStrategy.place(&s, &plan, &[wrong_dc]).is_err());

        let mut small = good.clone();
        small.host.cpu_cores = 2;
        assert!(ManualStrategy.place(&s, &plan, &[small]).is_err());

        let mut unlabeled = good;
        unlabeled.host.labels.clear();
        assert!(ManualStrategy.place(&s, &plan, &[unlabeled]).is_err());
    }
}
