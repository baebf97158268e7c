//! Outcome aggregation — per-action success/failure tallies for the
//! statistics surfaces.
//!
//! An action's outcome is its most recent terminal task (`completed` or
//! `failed`); actions with no terminal task yet contribute to neither
//! count.

use serde::Serialize;

use crate::model::{AgentTask, ScheduledAction, TaskStatus, ACTION_DOC_TYPE, TASK_DOC_TYPE};
use crate::store::{Selector, StoreError, TypedStore};

#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub action_id: String,
    pub action_name: String,
    pub last_status: TaskStatus,
    pub last_task_id: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStats {
    pub successful_actions: u64,
    pub failed_actions: u64,
    pub outcomes: Vec<ActionOutcome>,
}

pub async fn aggregate_outcomes(store: &TypedStore) -> Result<SchedulerStats, StoreError> {
    let actions = store
        .query::<ScheduledAction>(&Selector::of_type(ACTION_DOC_TYPE))
        .await?;

    let mut stats = SchedulerStats::default();
    for (action, _) in actions {
        let tasks = store
            .query::<AgentTask>(
                &Selector::of_type(TASK_DOC_TYPE).field("scheduled_by", action.id.clone()),
            )
            .await?;

        let latest_terminal = tasks
            .iter()
            .map(|(t, _)| t)
            .filter(|t| t.status.is_terminal())
            .max_by_key(|t| t.completed_at.unwrap_or(t.created_at));

        if let Some(task) = latest_terminal {
            match task.status {
                TaskStatus::Completed => stats.successful_actions += 1,
                TaskStatus::Failed => stats.failed_actions += 1,
                _ => {}
            }
            stats.outcomes.push(ActionOutcome {
                action_id: action.id.clone(),
                action_name: action.name.clone(),
                last_status: task.status,
                last_task_id: task.id.clone(),
            });
        }
    }
    Ok(stats)
}
