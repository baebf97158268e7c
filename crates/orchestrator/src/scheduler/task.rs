//! Task construction — turn a due action into a concrete agent task.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::model::{generate_id, AgentTask, ScheduledAction, TaskStatus, TASK_DOC_TYPE};

/// Task type for actions whose instrument bag carries a composite marker.
pub const WORKFLOW_TASK_TYPE: &str = "workflow";

pub fn build_task(action: &ScheduledAction, now: DateTime<Utc>) -> AgentTask {
    let task_type = if action.is_composite() {
        WORKFLOW_TASK_TYPE.to_string()
    } else {
        action.action_type.task_type().to_string()
    };

    let mut payload = action.instrument.clone();
    if let Some(object) = &action.object {
        payload.insert("object".to_string(), Value::String(object.clone()));
    }

    AgentTask {
        id: generate_id("task"),
        doc_type: TASK_DOC_TYPE.to_string(),
        host_id: action.agent.clone(),
        agent_id: action.agent.clone(),
        task_type,
        scheduled_by: action.id.clone(),
        status: TaskStatus::Pending,
        payload,
        created_at: now,
        claimed_at: None,
        completed_at: None,
        result: None,
    }
}
