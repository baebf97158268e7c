//! Spec validation — required fields, range checks, and in-place
//! defaulting.
//!
//! Out-of-range ports and unknown restart policies are diagnostics, not
//! failures; a missing name or image is fatal. Defaults are written back
//! into the specs so every consumer downstream sees fully-populated
//! records.

use std::collections::HashSet;

use super::plan::PlanError;
use crate::model::{ContainerSpec, RestartPolicy};

pub const DEFAULT_HEALTH_INTERVAL: u32 = 30;
pub const DEFAULT_HEALTH_TIMEOUT: u32 = 30;
pub const DEFAULT_HEALTH_RETRIES: u32 = 3;

pub fn validate_specs(specs: &mut [ContainerSpec]) -> (Vec<String>, Vec<PlanError>) {
    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    let mut seen_names: HashSet<String> = HashSet::new();
    for spec in specs.iter() {
        if !spec.name.is_empty() && !seen_names.insert(spec.name.clone()) {
            errors.push(PlanError::InvalidSpec(format!(
                "duplicate container name {}",
                spec.name
            )));
        }
    }

    for spec in specs.iter_mut() {
        let label = if spec.name.is_empty() {
            spec.id.clone()
        } else {
            spec.name.clone()
        };

        if spec.name.is_empty() {
            errors.push(PlanError::InvalidSpec(format!(
                "container {} has no name",
                if label.is_empty() { "<unnamed>" } else { &label }
            )));
        }
        if spec.image.is_empty() {
            errors.push(PlanError::InvalidSpec(format!(
                "container {} has no image",
                label
            )));
        }

        for port in &mut spec.ports {
            if port.protocol.is_empty() {
                port.protocol = "tcp".to_string();
            }
            if port.container_port < 1 || port.container_port > 65535 {
                warnings.push(format!(
                    "container {}: container_port {} out of range [1,65535]",
                    label, port.container_port
                ));
            }
            if port.host_port > 65535 {
                warnings.push(format!(
                    "container {}: host_port {} out of range [0,65535]",
                    label, port.host_port
                ));
            }
        }

        for mount in &mut spec.volume_mounts {
            // `kind` already defaults to volume at deserialization.
            if mount.target.is_empty() {
                errors.push(PlanError::InvalidSpec(format!(
                    "container {}: volume mount has no target",
                    label
                )));
            }
        }

        if let Some(health) = &mut spec.health_check {
            if health.interval == 0 {
                health.interval = DEFAULT_HEALTH_INTERVAL;
            }
            if health.timeout == 0 {
                health.timeout = DEFAULT_HEALTH_TIMEOUT;
            }
            if health.retries == 0 {
                health.retries = DEFAULT_HEALTH_RETRIES;
            }
        }

        if let Some(policy) = &spec.restart_policy {
            if RestartPolicy::parse(policy).is_none() {
                warnings.push(format!(
                    "container {}: unknown restart_policy {:?}",
                    label, policy
                ));
            }
        }
    }

    (warnings, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HealthCheckSpec, PortMapping, VolumeMount};

    fn minimal(name: &str) -> ContainerSpec {
        ContainerSpec {
            name: name.to_string(),
            image: "img".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_spec_passes_clean() {
        let mut specs = vec![minimal("db")];
        let (warnings, errors) = validate_specs(&mut specs);
        assert!(warnings.is_empty());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_missing_name_and_image_are_fatal() {
        let mut specs = vec![ContainerSpec::default()];
        let (_, errors) = validate_specs(&mut specs);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_protocol_defaulted_to_tcp() {
        let mut specs = vec![minimal("web")];
        specs[0].ports.push(PortMapping {
            container_port: 80,
            host_port: 8080,
            host_ip: None,
            protocol: String::new(),
        });
        let (warnings, errors) = validate_specs(&mut specs);
        assert!(warnings.is_empty() && errors.is_empty());
        assert_eq!(specs[0].ports[0].protocol, "tcp");
    }

    #[test]
    fn test_port_zero_and_65536_warn_not_error() {
        let mut specs = vec![minimal("web")];
        specs[0].ports.push(PortMapping {
            container_port: 0,
            host_port: 0,
            host_ip: None,
            protocol: "tcp".into(),
        });
        specs[0].ports.push(PortMapping {
            container_port: 65536,
            host_port: 70000,
            host_ip: None,
            protocol: "tcp".into(),
        });
        let (warnings, errors) = validate_specs(&mut specs);
        assert!(errors.is_empty());
        // container_port 0, container_port 65536, host_port 70000.
        assert_eq!(warnings.len(), 3);
    }

    #[test]
    fn test_mount_without_target_is_fatal() {
        let mut specs = vec![minimal("db")];
        specs[0].volume_mounts.push(VolumeMount {
            kind: Default::default(),
            source: "data".into(),
            target: String::new(),
            read_only: false,
            bind_options: None,
            volume_options: None,
        });
        let (_, errors) = validate_specs(&mut specs);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_health_check_defaults() {
        let mut specs = vec![minimal("api")];
        specs[0].health_check = Some(HealthCheckSpec {
            kind: "http".into(),
            interval: 0,
            timeout: 10,
            retries: 0,
        });
        validate_specs(&mut specs);
        let health = specs[0].health_check.as_ref().unwrap();
        assert_eq!(health.interval, DEFAULT_HEALTH_INTERVAL);
        assert_eq!(health.timeout, 10);
        assert_eq!(health.retries, DEFAULT_HEALTH_RETRIES);
    }

    #[test]
    fn test_unknown_restart_policy_warns() {
        let mut specs = vec![minimal("api")];
        specs[0].restart_policy = Some("sometimes".into());
        let (warnings, errors) = validate_specs(&mut specs);
        assert!(errors.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("sometimes"));
    }

    #[test]
    fn test_duplicate_names_are_fatal() {
        let mut specs = vec![minimal("db"), minimal("db")];
        let (_, errors) = validate_specs(&mut specs);
        assert!(errors
            .iter()
            .any(|e| e.to_string().contains("duplicate container name")));
    }
}
