//! Duplicate scan — semantic IDs and issue construction.
//!
//! Two documents are semantic duplicates when they share a type-specific
//! canonical identifier even though their store IDs differ: containers and
//! hosts key on `identifier`, stacks on `name`. Groups larger than one
//! become issues whose severity scales with group size.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{AuditError, AuditLogger};
use crate::store::{Document, DocumentStore, Selector};

/// Document types the auditor knows how to canonicalize.
pub const AUDITED_TYPES: &[&str] = &["container", "host", "stack"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Medium,
    High,
    Critical,
}

impl IssueSeverity {
    pub fn for_group_size(count: usize) -> Self {
        if count >= 5 {
            IssueSeverity::Critical
        } else if count >= 3 {
            IssueSeverity::High
        } else {
            IssueSeverity::Medium
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Issue {
    pub id: String,
    pub kind: &'static str,
    pub semantic_id: String,
    pub document_ids: Vec<String>,
    pub document_count: usize,
    pub severity: IssueSeverity,
}

/// Type-specific canonical identifier, or `None` for types the auditor
/// does not canonicalize.
pub fn semantic_id(value: &Value) -> Option<String> {
    let doc_type = value.get("type").and_then(Value::as_str)?;
    let key_field = match doc_type {
        "container" | "host" => "identifier",
        "stack" => "name",
        _ => return None,
    };
    let key = value
        .get(key_field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())?;
    Some(format!("{}:{}", doc_type, key))
}

pub struct IntegrityAuditor {
    store: Arc<dyn DocumentStore>,
}

impl IntegrityAuditor {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// One full scan over every audited type. The scan itself and each
    /// issue found are appended to the audit log.
    pub async fn scan(&self, logger: &AuditLogger) -> Result<Vec<Issue>, AuditError> {
        let mut issues = Vec::new();
        for doc_type in AUDITED_TYPES {
            let docs = self.store.query(&Selector::of_type(*doc_type)).await?;
            issues.extend(find_duplicates(&docs));
        }

        logger.append(&serde_json::json!({
            "entry": "scan",
            "at": chrono::Utc::now(),
            "issues": issues.len(),
        }))?;
        for issue in &issues {
            logger.append(&serde_json::json!({ "entry": "issue", "issue": issue }))?;
        }
        Ok(issues)
    }

    /// Documents belonging to one issue, for repair planning.
    pub async fn documents_for(&self, issue: &Issue) -> Result<Vec<Document>, AuditError> {
        let mut docs = Vec::with_capacity(issue.document_ids.len());
        for id in &issue.document_ids {
            docs.push(self.store.get(id).await?);
        }
        Ok(docs)
    }
}

fn find_duplicates(docs: &[Document]) -> Vec<Issue> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for doc in docs {
        if let Some(sid) = semantic_id(&doc.value) {
            groups.entry(sid).or_default().push(doc.id.clone());
        }
    }

    groups
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(semantic_id, document_ids)| {
            let count = document_ids.len();
            Issue {
                id: crate::model::generate_id("issue"),
                kind: "duplicate",
                semantic_id,
                document_ids,
                document_count: count,
                severity: IssueSeverity::for_group_size(count),
            }
        })
        .collect()
}
