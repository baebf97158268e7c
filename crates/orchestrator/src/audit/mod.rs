//! Integrity auditor — duplicate detection, repair plans, and the audit
//! trail.
//!
//! The auditor scans persisted documents for semantically-identical records
//! hiding under distinct store IDs, groups them by semantic ID, and turns
//! groups into issues with repair plans. Every scan, plan, and execution
//! appends to a daily-rotated JSONL audit log.

pub mod log;
pub mod repair;
pub mod scan;

pub use log::AuditLogger;
pub use repair::{build_repair_plan, execute_repair_plan, RepairOp, RepairPlan, RepairStrategy};
pub use scan::{semantic_id, IntegrityAuditor, Issue, IssueSeverity};

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info};

use crate::store::StoreError;

/// Repair execution aborts past this many failed operations.
pub const MAX_REPAIR_FAILURES: usize = 10;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("audit log write failed: {0}")]
    Write(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("repair execution aborted after {failures} failures")]
    Aborted { failures: usize },
}

/// Periodic scan worker, same shape as the scheduler loop: a tick interval
/// raced against a shutdown signal.
pub async fn run_audit_loop(
    auditor: IntegrityAuditor,
    logger: Arc<AuditLogger>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!(interval_secs = interval.as_secs(), "Starting integrity audit loop");
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match auditor.scan(&logger).await {
                    Ok(issues) => {
                        if !issues.is_empty() {
                            info!(count = issues.len(), "Integrity scan found issues");
                        }
                    }
                    Err(e) => error!(error = %e, "Integrity scan failed"),
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("Received shutdown signal, stopping audit loop");
                    break;
                }
            }
        }
    }
    if let Err(e) = logger.flush() {
        error!(error = %e, "Final audit log flush failed");
    }
}
