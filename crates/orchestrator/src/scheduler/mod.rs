//! Action scheduler — a cooperative periodic evaluator.
//!
//! One long-running worker wakes on a fixed tick, loads every enabled
//! action, and turns the due ones into agent tasks. One action's failure
//! never blocks the rest of the tick; schedule parse errors are logged and
//! skipped. Start/stop is guarded so the process-wide singleton cannot be
//! started twice, and stop is idempotent.

pub mod evaluate;
pub mod frequency;
pub mod stats;
pub mod task;

pub use evaluate::should_execute;
pub use frequency::{parse_frequency, Frequency, ScheduleError};
pub use stats::{aggregate_outcomes, ActionOutcome, SchedulerStats};
pub use task::build_task;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::model::{ActionStatus, ScheduledAction, ACTION_DOC_TYPE};
use crate::store::{Selector, TypedStore};

/// The evaluator wakes this often.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(30);

pub struct ActionScheduler {
    store: TypedStore,
    tick_interval: Duration,
    started: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    worker: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ActionScheduler {
    pub fn new(store: TypedStore) -> Self {
        Self::with_interval(store, DEFAULT_TICK_INTERVAL)
    }

    pub fn with_interval(store: TypedStore, tick_interval: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            store,
            tick_interval,
            started: AtomicBool::new(false),
            shutdown_tx,
            worker: Mutex::new(None),
        }
    }

    /// Spawn the evaluator worker. A second start is a no-op.
    pub async fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already started");
            return;
        }
        info!(interval_secs = self.tick_interval.as_secs(), "Starting action scheduler");

        let scheduler = self.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            let mut interval = time::interval(scheduler.tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        scheduler.run_tick(Utc::now()).await;
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("Received shutdown signal, stopping scheduler");
                            break;
                        }
                    }
                }
            }
        });
        *self.worker.lock().await = Some(handle);
    }

    /// Signal the worker and wait for it. Safe to call repeatedly.
    pub async fn stop(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.worker.lock().await.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Scheduler worker join failed");
            }
        }
        let _ = self.shutdown_tx.send(false);
        info!("Action scheduler stopped");
    }

    /// One evaluation pass. Public so callers (and tests) can drive the
    /// scheduler with an explicit clock.
    pub async fn run_tick(&self, now: DateTime<Utc>) -> usize {
        let actions = match self
            .store
            .query::<ScheduledAction>(&Selector::of_type(ACTION_DOC_TYPE).field("enabled", true))
            .await
        {
            Ok(actions) => actions,
            Err(e) => {
                error!(error = %e, "Scheduler could not load actions");
                return 0;
            }
        };

        let mut fired = 0;
        for (action, _rev) in actions {
            // Actions an agent is currently executing are skipped; the
            // agent flips the status back when the run finishes.
            if action.action_status == ActionStatus::Active {
                continue;
            }
            match should_execute(&action, now) {
                Ok(true) => {
                    if let Err(e) = self.fire(&action, now).await {
                        error!(action = %action.id, error = %e, "Action fire failed");
                    } else {
                        fired += 1;
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    // Parse errors skip this tick for this action only.
                    warn!(action = %action.id, error = %e, "Schedule did not evaluate");
                }
            }
        }
        debug!(fired, "Scheduler tick complete");
        fired
    }

    async fn fire(&self, action: &ScheduledAction, now: DateTime<Utc>) -> Result<(), crate::store::StoreError> {
        let task = build_task(action, now);
        self.store.save(&task.id, &task).await?;
        info!(action = %action.id, task = %task.id, task_type = %task.task_type, "Scheduled task created");

        self.store
            .update_with_retry::<ScheduledAction, _>(&action.id, |a| {
                a.start_time = Some(now);
                a.updated_at = now;
                true
            })
            .await
    }
}
