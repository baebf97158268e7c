//! Scheduled actions and the agent tasks they produce.
//!
//! An action is a declarative recurring job; the scheduler turns due
//! actions into concrete [`AgentTask`] records that host-side agents drain
//! from the store. `instrument` and `payload` are open, per-action-type
//! JSON bags rather than typed structs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Document type discriminators.
pub const ACTION_DOC_TYPE: &str = "action";
pub const TASK_DOC_TYPE: &str = "task";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    Check,
    Control,
    Create,
    Update,
    Transfer,
}

impl ActionType {
    /// Base task type for this action kind. A composite marker in the
    /// instrument bag promotes the task to `workflow` regardless.
    pub fn task_type(&self) -> &'static str {
        match self {
            ActionType::Check => "check",
            ActionType::Control => "control",
            ActionType::Create => "create",
            ActionType::Update => "update",
            ActionType::Transfer => "transfer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Potential,
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl Default for ActionStatus {
    fn default() -> Self {
        ActionStatus::Potential
    }
}

/// Recurrence description: an ISO-8601 interval plus calendar constraints,
/// all interpreted in `timezone`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionSchedule {
    /// `PT30S`-style duration, or a cron expression (detected by
    /// whitespace; parsing is not implemented and such actions never fire).
    #[serde(default)]
    pub repeat_frequency: String,
    /// IANA zone name; empty means UTC.
    #[serde(default)]
    pub timezone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    /// Checked against zero to disable; never decremented on fire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_count: Option<i64>,
    /// `YYYY-MM-DD`-prefixed dates on which the action must not fire.
    #[serde(default)]
    pub except_dates: Vec<String>,
    /// Three-letter weekday names (`Mon`..`Sun`), matched in `timezone`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_day: Option<Vec<String>>,
    /// Month numbers 1–12.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_month: Option<Vec<u32>>,
    /// Day-of-month numbers 1–31.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_month_day: Option<Vec<u32>>,
}

/// A declarative recurring job definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledAction {
    pub id: String,
    #[serde(rename = "type", default = "action_doc_type")]
    pub doc_type: String,
    pub action_type: ActionType,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub action_status: ActionStatus,
    /// Host or agent this action targets.
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub schedule: ActionSchedule,
    /// Type-specific parameter bag, copied verbatim into task payloads.
    #[serde(default)]
    pub instrument: Map<String, Value>,
    /// Optional object reference the action operates on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    /// Last fire time; `None` means the action has never fired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn action_doc_type() -> String {
    ACTION_DOC_TYPE.to_string()
}

impl ScheduledAction {
    pub fn new(name: impl Into<String>, action_type: ActionType) -> Self {
        let now = Utc::now();
        Self {
            id: super::generate_id("action"),
            doc_type: action_doc_type(),
            action_type,
            name: name.into(),
            description: String::new(),
            action_status: ActionStatus::Potential,
            agent: String::new(),
            schedule: ActionSchedule::default(),
            instrument: Map::new(),
            object: None,
            enabled: false,
            start_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The instrument bag's composite marker promotes the derived task to
    /// a workflow task.
    pub fn is_composite(&self) -> bool {
        self.instrument
            .get("composite")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Claimed,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// A single concrete work item created from a scheduled action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTask {
    pub id: String,
    #[serde(rename = "type", default = "task_doc_type")]
    pub doc_type: String,
    #[serde(default)]
    pub host_id: String,
    #[serde(default)]
    pub agent_id: String,
    pub task_type: String,
    /// ID of the scheduled action that produced this task.
    pub scheduled_by: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub payload: Map<String, Value>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

fn task_doc_type() -> String {
    TASK_DOC_TYPE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_type_mapping() {
        assert_eq!(ActionType::Check.task_type(), "check");
        assert_eq!(ActionType::Transfer.task_type(), "transfer");
    }

    #[test]
    fn test_composite_marker() {
        let mut action = ScheduledAction::new("nightly", ActionType::Control);
        assert!(!action.is_composite());
        action.instrument.insert("composite".into(), json!(true));
        assert!(action.is_composite());
        action.instrument.insert("composite".into(), json!("yes"));
        assert!(!action.is_composite());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Claimed.is_terminal());
    }

    #[test]
    fn test_action_round_trip() {
        let mut action = ScheduledAction::new("disk-check", ActionType::Check);
        action.schedule.repeat_frequency = "PT1M".into();
        action.enabled = true;
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "action");
        assert_eq!(json["action_status"], "potential");
        let back: ScheduledAction = serde_json::from_value(json).unwrap();
        assert_eq!(back.schedule.repeat_frequency, "PT1M");
        assert!(back.start_time.is_none());
    }
}
