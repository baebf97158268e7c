//! Deployment state — the durable record of one deployment attempt.
//!
//! Two on-disk encodings exist for one logical entity: the current
//! [`DeploymentState`] under `deployment-<stack>-<unix>` and the legacy
//! [`StackDeployment`] under `deployment:<stack_id>`. Reads prefer the new
//! shape; writes only ever produce it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Document type discriminator for deployment-state records.
pub const DEPLOYMENT_DOC_TYPE: &str = "deployment";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Pending,
    Deploying,
    Running,
    Stopped,
    Failed,
}

impl Default for DeploymentStatus {
    fn default() -> Self {
        DeploymentStatus::Pending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentPhase {
    #[serde(rename = "initialization")]
    Initialization,
    #[serde(rename = "network-creation")]
    NetworkCreation,
    #[serde(rename = "volume-creation")]
    VolumeCreation,
    #[serde(rename = "container-deployment")]
    ContainerDeployment,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "rollback")]
    Rollback,
}

impl Default for DeploymentPhase {
    fn default() -> Self {
        DeploymentPhase::Initialization
    }
}

/// The binding of one deployed container to its host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerPlacement {
    /// Runtime-assigned container ID.
    pub container_id: String,
    /// Stack-qualified container name (`<stack>-<name>`).
    pub container_name: String,
    pub host_id: String,
    #[serde(default)]
    pub ip_address: String,
    /// container_port → host_port as read back from the runtime.
    #[serde(default)]
    pub ports: BTreeMap<u32, u32>,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub network_id: String,
    pub name: String,
    #[serde(default)]
    pub driver: String,
    #[serde(default)]
    pub subnet: String,
    #[serde(default)]
    pub gateway: String,
    #[serde(default)]
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeInfo {
    #[serde(default)]
    pub driver: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Warning,
    Error,
}

/// One append-only entry in a deployment's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentEvent {
    pub level: EventLevel,
    pub event_type: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl DeploymentEvent {
    pub fn info(event_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: EventLevel::Info,
            event_type: event_type.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn warning(event_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: EventLevel::Warning,
            event_type: event_type.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn error(event_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: EventLevel::Error,
            event_type: event_type.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollbackState {
    #[serde(default)]
    pub status: String,
    /// Runtime IDs of every container removed during rollback.
    #[serde(default)]
    pub removed_containers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Durable record of one deployment attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentState {
    pub id: String,
    #[serde(rename = "type", default = "deployment_doc_type")]
    pub doc_type: String,
    pub stack_id: String,
    #[serde(default)]
    pub status: DeploymentStatus,
    #[serde(default)]
    pub phase: DeploymentPhase,
    /// 0–100.
    #[serde(default)]
    pub progress: u8,
    /// container_name → placement; keys equal the plan's container names.
    #[serde(default)]
    pub placements: BTreeMap<String, ContainerPlacement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_info: Option<NetworkInfo>,
    /// volume name → info.
    #[serde(default)]
    pub volume_info: BTreeMap<String, VolumeInfo>,
    #[serde(default)]
    pub events: Vec<DeploymentEvent>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_state: Option<RollbackState>,
}

fn deployment_doc_type() -> String {
    DEPLOYMENT_DOC_TYPE.to_string()
}

impl DeploymentState {
    pub fn new(stack_name: &str, stack_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: deployment_document_id(stack_name, now),
            doc_type: deployment_doc_type(),
            stack_id: stack_id.into(),
            status: DeploymentStatus::Deploying,
            phase: DeploymentPhase::Initialization,
            progress: 0,
            placements: BTreeMap::new(),
            network_info: None,
            volume_info: BTreeMap::new(),
            events: Vec::new(),
            started_at: now,
            completed_at: None,
            error_message: None,
            rollback_state: None,
        }
    }

    /// Append an event to the log. The log is append-only; events are never
    /// mutated or removed.
    pub fn record_event(&mut self, event: DeploymentEvent) {
        self.events.push(event);
    }

    /// Mark this deployment failed in its current phase.
    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.status = DeploymentStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error_message = Some(message.clone());
        self.record_event(DeploymentEvent::error("error", message));
    }

    /// Mark this deployment complete and running.
    pub fn complete(&mut self) {
        self.status = DeploymentStatus::Running;
        self.phase = DeploymentPhase::Completed;
        self.progress = 100;
        self.completed_at = Some(Utc::now());
    }

    pub fn set_progress(&mut self, deployed: usize, total: usize) {
        self.progress = if total == 0 {
            100
        } else {
            ((deployed * 100) / total).min(100) as u8
        };
    }
}

/// Current-shape document ID: `deployment-<stack>-<unix>`.
pub fn deployment_document_id(stack_name: &str, at: DateTime<Utc>) -> String {
    format!("deployment-{}-{}", stack_name, at.timestamp())
}

/// Legacy-shape document ID: `deployment:<stack_id>`.
pub fn legacy_deployment_id(stack_id: &str) -> String {
    format!("deployment:{}", stack_id)
}

/// Legacy deployment record kept readable for old documents. Only the
/// fields the core consumes survive here; everything else was dropped with
/// the old shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackDeployment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub stack_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub placements: BTreeMap<String, ContainerPlacement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl StackDeployment {
    /// Lift a legacy record into the current shape.
    pub fn into_state(self) -> DeploymentState {
        let status = match self.status.as_str() {
            "running" | "completed" => DeploymentStatus::Running,
            "stopped" => DeploymentStatus::Stopped,
            "failed" | "error" => DeploymentStatus::Failed,
            "deploying" => DeploymentStatus::Deploying,
            _ => DeploymentStatus::Pending,
        };
        DeploymentState {
            id: self.id,
            doc_type: deployment_doc_type(),
            stack_id: self.stack_id,
            status,
            phase: DeploymentPhase::Completed,
            progress: 100,
            placements: self.placements,
            network_info: None,
            volume_info: BTreeMap::new(),
            events: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
            error_message: self.error_message,
            rollback_state: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids() {
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(
            deployment_document_id("web", at),
            "deployment-web-1700000000"
        );
        assert_eq!(legacy_deployment_id("stack-web-1"), "deployment:stack-web-1");
    }

    #[test]
    fn test_phase_serde_spelling() {
        assert_eq!(
            serde_json::to_string(&DeploymentPhase::NetworkCreation).unwrap(),
            "\"network-creation\""
        );
        assert_eq!(
            serde_json::to_string(&DeploymentPhase::ContainerDeployment).unwrap(),
            "\"container-deployment\""
        );
    }

    #[test]
    fn test_progress_rounding() {
        let mut state = DeploymentState::new("web", "stack-web-1");
        state.set_progress(1, 3);
        assert_eq!(state.progress, 33);
        state.set_progress(3, 3);
        assert_eq!(state.progress, 100);
        state.set_progress(0, 0);
        assert_eq!(state.progress, 100);
    }

    #[test]
    fn test_fail_populates_error_and_event() {
        let mut state = DeploymentState::new("web", "stack-web-1");
        state.phase = DeploymentPhase::ContainerDeployment;
        state.fail("image pull failed on host-1");
        assert_eq!(state.status, DeploymentStatus::Failed);
        assert_eq!(state.phase, DeploymentPhase::ContainerDeployment);
        assert!(state.completed_at.is_some());
        let last = state.events.last().unwrap();
        assert_eq!(last.level, EventLevel::Error);
        assert_eq!(last.event_type, "error");
    }

    #[test]
    fn test_legacy_lift() {
        let legacy = StackDeployment {
            id: "deployment:stack-web-1".into(),
            stack_id: "stack-web-1".into(),
            status: "running".into(),
            ..Default::default()
        };
        let state = legacy.into_state();
        assert_eq!(state.status, DeploymentStatus::Running);
        assert_eq!(state.phase, DeploymentPhase::Completed);
    }
}
