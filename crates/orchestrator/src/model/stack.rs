//! Stack model — a named set of containers deployed as a unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Document type discriminator for stack records.
pub const STACK_DOC_TYPE: &str = "stack";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackStatus {
    Pending,
    Deploying,
    Running,
    Stopped,
    Error,
    Deleting,
}

impl Default for StackStatus {
    fn default() -> Self {
        StackStatus::Pending
    }
}

/// A manual-placement constraint for one container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostConstraint {
    pub container_name: String,
    #[serde(default)]
    pub host_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_datacenter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_cpu: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_memory: Option<u64>,
    #[serde(default)]
    pub required_labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    #[serde(default)]
    pub mode: String,
    /// `auto`, `manual`, `spread`, or `datacenter`; unknown strings fall
    /// back to `manual` at strategy resolution.
    #[serde(default)]
    pub placement_strategy: String,
    #[serde(default)]
    pub network_mode: String,
    #[serde(default)]
    pub host_constraints: Vec<HostConstraint>,
}

/// The persisted stack record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stack {
    pub id: String,
    #[serde(rename = "type", default = "stack_doc_type")]
    pub doc_type: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: StackStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacenter: Option<String>,
    #[serde(default)]
    pub deployment_config: DeploymentConfig,
    /// IDs of the containers belonging to this stack.
    #[serde(default)]
    pub containers: Vec<String>,
    #[serde(default)]
    pub owner: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

fn stack_doc_type() -> String {
    STACK_DOC_TYPE.to_string()
}

impl Stack {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self {
            id: stack_document_id(&name, now),
            doc_type: stack_doc_type(),
            name,
            description: String::new(),
            status: StackStatus::Pending,
            datacenter: None,
            deployment_config: DeploymentConfig::default(),
            containers: Vec::new(),
            owner: String::new(),
            created_at: now,
            updated_at: now,
            deployed_at: None,
            error_message: None,
        }
    }
}

/// Caller-assigned stack document ID used on the deployment path.
pub fn stack_document_id(name: &str, at: DateTime<Utc>) -> String {
    format!("stack-{}-{}", name, at.timestamp())
}
