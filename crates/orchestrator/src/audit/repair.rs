//! Repair plans — survivor selection and duplicate cleanup.
//!
//! Four strategies: `latest-wins` keeps the most recently modified
//! document, `highest-rev` the one with the largest revision sequence,
//! `merge` keeps the latest and fills its missing fields from the peers,
//! and `manual` plans nothing and leaves the decision to an operator.
//! Plans are dry-run by default; execution is abort-aware.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use super::scan::Issue;
use super::{AuditError, AuditLogger, MAX_REPAIR_FAILURES};
use crate::store::{Document, DocumentStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepairStrategy {
    LatestWins,
    HighestRev,
    Merge,
    Manual,
}

impl RepairStrategy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "latest-wins" => Some(RepairStrategy::LatestWins),
            "highest-rev" => Some(RepairStrategy::HighestRev),
            "merge" => Some(RepairStrategy::Merge),
            "manual" => Some(RepairStrategy::Manual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum RepairOp {
    /// Replace the surviving document's body.
    Update { id: String, document: Value },
    Delete { id: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RepairPlan {
    pub issue_id: String,
    pub semantic_id: String,
    pub strategy: RepairStrategy,
    /// Store ID of the surviving document; empty for `manual`.
    pub keep: String,
    pub operations: Vec<RepairOp>,
    /// Plans are born dry-run; executing for real is an explicit opt-in.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairSummary {
    pub applied: usize,
    pub failed: usize,
    pub dry_run: bool,
}

/// Modification timestamp used by latest-wins and merge. Documents store
/// it as `updated_at`; foreign records may carry `dateModified` instead.
fn modified_at(doc: &Document) -> DateTime<Utc> {
    for field in ["updated_at", "dateModified"] {
        if let Some(ts) = doc
            .value
            .get(field)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        {
            return ts.with_timezone(&Utc);
        }
    }
    DateTime::<Utc>::MIN_UTC
}

pub fn build_repair_plan(
    issue: &Issue,
    documents: &[Document],
    strategy: RepairStrategy,
) -> RepairPlan {
    let mut plan = RepairPlan {
        issue_id: issue.id.clone(),
        semantic_id: issue.semantic_id.clone(),
        strategy,
        keep: String::new(),
        operations: Vec::new(),
        dry_run: true,
    };
    if documents.len() < 2 {
        return plan;
    }

    let survivor = match strategy {
        RepairStrategy::Manual => return plan,
        RepairStrategy::LatestWins | RepairStrategy::Merge => documents
            .iter()
            .max_by_key(|d| modified_at(d)),
        RepairStrategy::HighestRev => documents.iter().max_by_key(|d| d.rev_seq()),
    };
    let Some(survivor) = survivor else {
        return plan;
    };
    plan.keep = survivor.id.clone();

    if strategy == RepairStrategy::Merge {
        let mut merged = survivor.value.clone();
        if let Some(base) = merged.as_object_mut() {
            for peer in documents.iter().filter(|d| d.id != survivor.id) {
                if let Some(fields) = peer.value.as_object() {
                    for (key, value) in fields {
                        let missing = match base.get(key) {
                            None | Some(Value::Null) => true,
                            Some(Value::String(s)) => s.is_empty(),
                            Some(_) => false,
                        };
                        if missing {
                            base.insert(key.clone(), value.clone());
                        }
                    }
                }
            }
        }
        if merged != survivor.value {
            plan.operations.push(RepairOp::Update {
                id: survivor.id.clone(),
                document: merged,
            });
        }
    }

    for doc in documents.iter().filter(|d| d.id != survivor.id) {
        plan.operations.push(RepairOp::Delete { id: doc.id.clone() });
    }
    plan
}

/// Apply a plan. Dry-run plans only log what would happen. Real execution
/// reloads each target's current revision, tolerates individual failures,
/// and aborts past the failure budget.
pub async fn execute_repair_plan(
    plan: &RepairPlan,
    store: &Arc<dyn DocumentStore>,
    logger: &AuditLogger,
) -> Result<RepairSummary, AuditError> {
    logger.append(&serde_json::json!({ "entry": "plan", "plan": plan }))?;

    let mut summary = RepairSummary {
        dry_run: plan.dry_run,
        ..Default::default()
    };
    if plan.dry_run {
        return Ok(summary);
    }

    for op in &plan.operations {
        let result = match op {
            RepairOp::Update { id, document } => match store.get(id).await {
                Ok(current) => store
                    .update(id, &current.rev, document)
                    .await
                    .map(|_| ()),
                Err(e) => Err(e),
            },
            RepairOp::Delete { id } => match store.get(id).await {
                Ok(current) => store.delete(id, &current.rev).await,
                Err(e) => Err(e),
            },
        };

        match result {
            Ok(()) => {
                summary.applied += 1;
                logger.append(&serde_json::json!({ "entry": "executed", "operation": op }))?;
            }
            Err(e) => {
                summary.failed += 1;
                logger.append(&serde_json::json!({
                    "entry": "execution_failed",
                    "operation": op,
                    "error": e.to_string(),
                }))?;
                if summary.failed > MAX_REPAIR_FAILURES {
                    return Err(AuditError::Aborted {
                        failures: summary.failed,
                    });
                }
            }
        }
    }
    Ok(summary)
}
