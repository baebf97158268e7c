//! Document store adapter.
//!
//! The core consumes a key-value store with MVCC revisions; this module
//! pins down exactly the surface it requires: CRUD with optimistic
//! concurrency, a selector query sufficient to filter by type and field
//! equality, and a primitive graph traversal. [`MemoryStore`] backs tests
//! and the standalone daemon.
//!
//! The trait is object-safe via `Pin<Box<…>>` returns so implementations
//! can live behind `Arc<dyn DocumentStore>`.

pub mod memory;
pub mod typed;

pub use memory::MemoryStore;
pub use typed::TypedStore;

use serde_json::Value;
use std::collections::BTreeMap;
use std::pin::Pin;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),
    /// The supplied revision no longer matches the stored document.
    /// Callers reload the current revision and retry.
    #[error("Revision conflict on document {id}: expected {expected}, got {actual}")]
    RevisionConflict {
        id: String,
        expected: String,
        actual: String,
    },
    #[error("Document already exists: {0}")]
    AlreadyExists(String),
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::RevisionConflict { .. })
    }
}

/// A stored document together with its ID and current revision token.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    /// Opaque revision; must be echoed back on update/delete. Carries a
    /// numeric prefix (`<n>-…`) the auditor's highest-rev strategy reads.
    pub rev: String,
    pub value: Value,
}

impl Document {
    /// Numeric prefix of the revision token, or 0 when malformed.
    pub fn rev_seq(&self) -> u64 {
        rev_seq(&self.rev)
    }
}

/// Parse the numeric prefix out of a `<n>-<hash>` revision token.
pub fn rev_seq(rev: &str) -> u64 {
    rev.split('-')
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

/// Equality-only selector: document type plus field/value clauses. This is
/// the entire query language the core needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selector {
    /// Matches the document's `type` field when set.
    pub doc_type: Option<String>,
    /// Every clause must match; keys may be dotted paths (`a.b`).
    pub fields: BTreeMap<String, Value>,
}

impl Selector {
    pub fn of_type(doc_type: impl Into<String>) -> Self {
        Self {
            doc_type: Some(doc_type.into()),
            fields: BTreeMap::new(),
        }
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// Direction of a graph traversal over a relation field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Follow references the start document holds.
    Outbound,
    /// Find documents whose relation field references the current one.
    Inbound,
}

type StoreFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Async interface over the document store.
///
/// Implementations must be `Send + Sync` so they can live inside an `Arc`
/// shared across the deployer, scheduler, and auditor.
pub trait DocumentStore: Send + Sync {
    /// Create a document under a caller-assigned ID. Returns the initial
    /// revision. Fails with `AlreadyExists` when the ID is taken.
    fn save<'a>(&'a self, id: &'a str, value: &'a Value) -> StoreFuture<'a, String>;

    fn get<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Document>;

    /// Replace a document. `rev` must be the current revision or the call
    /// fails with `RevisionConflict`. Returns the new revision.
    fn update<'a>(&'a self, id: &'a str, rev: &'a str, value: &'a Value) -> StoreFuture<'a, String>;

    fn delete<'a>(&'a self, id: &'a str, rev: &'a str) -> StoreFuture<'a, ()>;

    fn query<'a>(&'a self, selector: &'a Selector) -> StoreFuture<'a, Vec<Document>>;

    /// Walk relation references starting from `start_id`, up to `max_depth`
    /// hops, breadth-first. The start document is not included.
    fn traverse<'a>(
        &'a self,
        start_id: &'a str,
        relation_field: &'a str,
        direction: Direction,
        max_depth: usize,
    ) -> StoreFuture<'a, Vec<Document>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rev_seq() {
        assert_eq!(rev_seq("7-abcdef"), 7);
        assert_eq!(rev_seq("1-x"), 1);
        assert_eq!(rev_seq("garbage"), 0);
        assert_eq!(rev_seq(""), 0);
    }

    #[test]
    fn test_selector_builder() {
        let sel = Selector::of_type("host").field("status", json!("active"));
        assert_eq!(sel.doc_type.as_deref(), Some("host"));
        assert_eq!(sel.fields["status"], json!("active"));
    }
}
