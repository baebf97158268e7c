//! Typed store — serde-aware convenience layer over the raw document store.
//!
//! Conflict policy lives here: `update_with_retry` reloads the current
//! revision and reapplies the caller's mutation a bounded number of times,
//! surfacing the final conflict distinctly when the budget runs out.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::{Document, DocumentStore, Selector, StoreError};

/// Attempts made by [`TypedStore::update_with_retry`] before giving up.
const CONFLICT_RETRY_BUDGET: usize = 3;

#[derive(Clone)]
pub struct TypedStore {
    inner: Arc<dyn DocumentStore>,
}

impl TypedStore {
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        Self { inner }
    }

    pub fn raw(&self) -> &Arc<dyn DocumentStore> {
        &self.inner
    }

    pub async fn save<T: Serialize>(&self, id: &str, doc: &T) -> Result<String, StoreError> {
        let value = to_value(doc)?;
        self.inner.save(id, &value).await
    }

    /// Fetch and decode a document, returning its revision alongside.
    pub async fn get<T: DeserializeOwned>(&self, id: &str) -> Result<(T, String), StoreError> {
        let doc = self.inner.get(id).await?;
        Ok((from_value(&doc.id, doc.value)?, doc.rev))
    }

    pub async fn update<T: Serialize>(
        &self,
        id: &str,
        rev: &str,
        doc: &T,
    ) -> Result<String, StoreError> {
        let value = to_value(doc)?;
        self.inner.update(id, rev, &value).await
    }

    pub async fn delete(&self, id: &str, rev: &str) -> Result<(), StoreError> {
        self.inner.delete(id, rev).await
    }

    /// Decode every document matching the selector, skipping records that
    /// no longer parse as `T` (old shapes live alongside new ones).
    pub async fn query<T: DeserializeOwned>(
        &self,
        selector: &Selector,
    ) -> Result<Vec<(T, String)>, StoreError> {
        let docs = self.inner.query(selector).await?;
        let mut out = Vec::with_capacity(docs.len());
        for doc in docs {
            match from_value::<T>(&doc.id, doc.value) {
                Ok(decoded) => out.push((decoded, doc.rev)),
                Err(e) => debug!(id = %doc.id, error = %e, "Skipping undecodable document"),
            }
        }
        Ok(out)
    }

    pub async fn query_raw(&self, selector: &Selector) -> Result<Vec<Document>, StoreError> {
        self.inner.query(selector).await
    }

    /// Read-modify-write with bounded conflict retries. `mutate` receives
    /// the freshly loaded document on every attempt; returning `false`
    /// abandons the write (no error).
    pub async fn update_with_retry<T, F>(&self, id: &str, mut mutate: F) -> Result<(), StoreError>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(&mut T) -> bool,
    {
        let mut last_conflict = None;
        for attempt in 0..CONFLICT_RETRY_BUDGET {
            let (mut doc, rev) = self.get::<T>(id).await?;
            if !mutate(&mut doc) {
                return Ok(());
            }
            match self.update(id, &rev, &doc).await {
                Ok(_) => return Ok(()),
                Err(e) if e.is_conflict() => {
                    debug!(id, attempt, "Revision conflict, reloading");
                    last_conflict = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_conflict.unwrap_or_else(|| StoreError::Backend("retry budget exhausted".into())))
    }
}

fn to_value<T: Serialize>(doc: &T) -> Result<Value, StoreError> {
    serde_json::to_value(doc).map_err(|e| StoreError::InvalidDocument(e.to_string()))
}

fn from_value<T: DeserializeOwned>(id: &str, value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value)
        .map_err(|e| StoreError::InvalidDocument(format!("{}: {}", id, e)))
}
