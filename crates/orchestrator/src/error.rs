//! Top-level error type — the daemon boundary's view of every domain
//! failure. Domain modules keep their own error enums; this aggregation
//! exists for callers that cross domains.

use thiserror::Error;

use crate::deploy::DeployError;
use crate::graph::PlanError;
use crate::placement::PlacementError;
use crate::runtime::RuntimeError;
use crate::scheduler::ScheduleError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("parse failed: {}", errors_summary(.0))]
    Parse(Vec<PlanError>),
    #[error(transparent)]
    Placement(#[from] PlacementError),
    #[error(transparent)]
    Deploy(#[from] DeployError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Audit(#[from] crate::audit::AuditError),
}

fn errors_summary(errors: &[PlanError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_errors_joined() {
        let err = OrchestratorError::Parse(vec![
            PlanError::EmptyGraph,
            PlanError::MissingStackNode,
        ]);
        let message = err.to_string();
        assert!(message.contains("empty @graph"));
        assert!(message.contains("No stack node"));
    }

    #[test]
    fn test_store_error_transparent() {
        let err: OrchestratorError = StoreError::NotFound("host-1".into()).into();
        assert_eq!(err.to_string(), "Document not found: host-1");
    }
}
