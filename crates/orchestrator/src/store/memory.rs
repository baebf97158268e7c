//! Memory store — in-process MVCC implementation of [`DocumentStore`].
//!
//! Deterministic test double and standalone-daemon backend. Revisions are
//! `<seq>-<fnv of body>`; every successful write bumps the sequence, so a
//! stale revision is always detectable.

use dashmap::DashMap;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};

use super::{Direction, Document, DocumentStore, Selector, StoreError};

#[derive(Debug, Clone)]
struct Stored {
    seq: u64,
    rev: String,
    value: Value,
}

#[derive(Default)]
pub struct MemoryStore {
    docs: DashMap<String, Stored>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    fn make_rev(seq: u64, value: &Value) -> String {
        // FNV-1a over the serialized body; cheap and stable.
        let body = value.to_string();
        let mut hash: u64 = 0xcbf29ce484222325;
        for b in body.as_bytes() {
            hash ^= u64::from(*b);
            hash = hash.wrapping_mul(0x100000001b3);
        }
        format!("{}-{:016x}", seq, hash)
    }
}

/// Look up a possibly dotted path (`a.b.c`) inside a JSON value.
fn lookup_path<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

fn matches_selector(value: &Value, selector: &Selector) -> bool {
    if let Some(doc_type) = &selector.doc_type {
        match value.get("type").and_then(Value::as_str) {
            Some(t) if t == doc_type => {}
            _ => return false,
        }
    }
    selector
        .fields
        .iter()
        .all(|(path, expected)| lookup_path(value, path) == Some(expected))
}

/// Collect every `@id`/string reference held under a relation field.
fn relation_targets(value: &Value, relation_field: &str) -> Vec<String> {
    let mut out = Vec::new();
    let Some(field) = value.get(relation_field) else {
        return out;
    };
    let mut push = |v: &Value| match v {
        Value::String(s) => out.push(s.clone()),
        Value::Object(map) => {
            if let Some(Value::String(s)) = map.get("@id") {
                out.push(s.clone());
            }
        }
        _ => {}
    };
    match field {
        Value::Array(items) => items.iter().for_each(&mut push),
        other => push(other),
    }
    out
}

impl DocumentStore for MemoryStore {
    fn save<'a>(
        &'a self,
        id: &'a str,
        value: &'a Value,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String, StoreError>> + Send + 'a>>
    {
        Box::pin(async move {
            use dashmap::mapref::entry::Entry;
            match self.docs.entry(id.to_string()) {
                Entry::Occupied(_) => Err(StoreError::AlreadyExists(id.to_string())),
                Entry::Vacant(slot) => {
                    let rev = Self::make_rev(1, value);
                    slot.insert(Stored {
                        seq: 1,
                        rev: rev.clone(),
                        value: value.clone(),
                    });
                    Ok(rev)
                }
            }
        })
    }

    fn get<'a>(
        &'a self,
        id: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Document, StoreError>> + Send + 'a>>
    {
        Box::pin(async move {
            let entry = self
                .docs
                .get(id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            Ok(Document {
                id: id.to_string(),
                rev: entry.rev.clone(),
                value: entry.value.clone(),
            })
        })
    }

    fn update<'a>(
        &'a self,
        id: &'a str,
        rev: &'a str,
        value: &'a Value,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String, StoreError>> + Send + 'a>>
    {
        Box::pin(async move {
            let mut entry = self
                .docs
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            if entry.rev != rev {
                return Err(StoreError::RevisionConflict {
                    id: id.to_string(),
                    expected: entry.rev.clone(),
                    actual: rev.to_string(),
                });
            }
            let seq = entry.seq + 1;
            let new_rev = Self::make_rev(seq, value);
            *entry = Stored {
                seq,
                rev: new_rev.clone(),
                value: value.clone(),
            };
            Ok(new_rev)
        })
    }

    fn delete<'a>(
        &'a self,
        id: &'a str,
        rev: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), StoreError>> + Send + 'a>>
    {
        Box::pin(async move {
            let current = {
                let entry = self
                    .docs
                    .get(id)
                    .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
                entry.rev.clone()
            };
            if current != rev {
                return Err(StoreError::RevisionConflict {
                    id: id.to_string(),
                    expected: current,
                    actual: rev.to_string(),
                });
            }
            self.docs.remove(id);
            Ok(())
        })
    }

    fn query<'a>(
        &'a self,
        selector: &'a Selector,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<Document>, StoreError>> + Send + 'a>,
    > {
        Box::pin(async move {
            let mut out: Vec<Document> = self
                .docs
                .iter()
                .filter(|entry| matches_selector(&entry.value().value, selector))
                .map(|entry| Document {
                    id: entry.key().clone(),
                    rev: entry.value().rev.clone(),
                    value: entry.value().value.clone(),
                })
                .collect();
            // DashMap iteration order is nondeterministic; stable output
            // keeps query consumers and tests honest.
            out.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(out)
        })
    }

    fn traverse<'a>(
        &'a self,
        start_id: &'a str,
        relation_field: &'a str,
        direction: Direction,
        max_depth: usize,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<Document>, StoreError>> + Send + 'a>,
    > {
        Box::pin(async move {
            if !self.docs.contains_key(start_id) {
                return Err(StoreError::NotFound(start_id.to_string()));
            }
            let mut visited: HashSet<String> = HashSet::from([start_id.to_string()]);
            let mut frontier: VecDeque<(String, usize)> =
                VecDeque::from([(start_id.to_string(), 0)]);
            let mut out = Vec::new();

            while let Some((id, depth)) = frontier.pop_front() {
                if depth >= max_depth {
                    continue;
                }
                let neighbors: Vec<String> = match direction {
                    Direction::Outbound => self
                        .docs
                        .get(&id)
                        .map(|e| relation_targets(&e.value, relation_field))
                        .unwrap_or_default(),
                    Direction::Inbound => {
                        let mut ids: Vec<String> = self
                            .docs
                            .iter()
                            .filter(|e| {
                                relation_targets(&e.value().value, relation_field)
                                    .contains(&id)
                            })
                            .map(|e| e.key().clone())
                            .collect();
                        ids.sort();
                        ids
                    }
                };
                for neighbor in neighbors {
                    if !visited.insert(neighbor.clone()) {
                        continue;
                    }
                    if let Some(entry) = self.docs.get(&neighbor) {
                        out.push(Document {
                            id: neighbor.clone(),
                            rev: entry.rev.clone(),
                            value: entry.value.clone(),
                        });
                    }
                    frontier.push_back((neighbor, depth + 1));
                }
            }
            Ok(out)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_get_update_delete() {
        let store = MemoryStore::new();
        let doc = json!({"type": "host", "name": "a"});

        let rev1 = store.save("host-1", &doc).await.unwrap();
        assert!(rev1.starts_with("1-"));

        let fetched = store.get("host-1").await.unwrap();
        assert_eq!(fetched.rev, rev1);
        assert_eq!(fetched.value["name"], "a");

        let rev2 = store
            .update("host-1", &rev1, &json!({"type": "host", "name": "b"}))
            .await
            .unwrap();
        assert!(rev2.starts_with("2-"));

        store.delete("host-1", &rev2).await.unwrap();
        assert!(matches!(
            store.get("host-1").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_save_twice_is_already_exists() {
        let store = MemoryStore::new();
        store.save("x", &json!({})).await.unwrap();
        assert!(matches!(
            store.save("x", &json!({})).await,
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_stale_revision_conflicts() {
        let store = MemoryStore::new();
        let rev1 = store.save("x", &json!({"v": 1})).await.unwrap();
        store.update("x", &rev1, &json!({"v": 2})).await.unwrap();

        let err = store.update("x", &rev1, &json!({"v": 3})).await.unwrap_err();
        assert!(err.is_conflict());

        let err = store.delete("x", &rev1).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_query_by_type_and_field() {
        let store = MemoryStore::new();
        store
            .save("h1", &json!({"type": "host", "status": "active"}))
            .await
            .unwrap();
        store
            .save("h2", &json!({"type": "host", "status": "inactive"}))
            .await
            .unwrap();
        store
            .save("s1", &json!({"type": "stack", "status": "active"}))
            .await
            .unwrap();

        let hosts = store.query(&Selector::of_type("host")).await.unwrap();
        assert_eq!(hosts.len(), 2);

        let active = store
            .query(&Selector::of_type("host").field("status", "active"))
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "h1");
    }

    #[tokio::test]
    async fn test_query_dotted_path() {
        let store = MemoryStore::new();
        store
            .save("d1", &json!({"type": "deployment", "nested": {"status": "failed"}}))
            .await
            .unwrap();
        let found = store
            .query(&Selector::of_type("deployment").field("nested.status", "failed"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_traverse_outbound_depth_limited() {
        let store = MemoryStore::new();
        store
            .save("a", &json!({"part_of": {"@id": "b"}}))
            .await
            .unwrap();
        store
            .save("b", &json!({"part_of": {"@id": "c"}}))
            .await
            .unwrap();
        store.save("c", &json!({})).await.unwrap();

        let one_hop = store
            .traverse("a", "part_of", Direction::Outbound, 1)
            .await
            .unwrap();
        assert_eq!(one_hop.len(), 1);
        assert_eq!(one_hop[0].id, "b");

        let two_hops = store
            .traverse("a", "part_of", Direction::Outbound, 4)
            .await
            .unwrap();
        assert_eq!(two_hops.len(), 2);
    }

    #[tokio::test]
    async fn test_traverse_inbound() {
        let store = MemoryStore::new();
        store.save("host-1", &json!({})).await.unwrap();
        store
            .save("c1", &json!({"located_in_host": {"@id": "host-1"}}))
            .await
            .unwrap();
        store
            .save("c2", &json!({"located_in_host": "host-1"}))
            .await
            .unwrap();

        let inbound = store
            .traverse("host-1", "located_in_host", Direction::Inbound, 1)
            .await
            .unwrap();
        assert_eq!(inbound.len(), 2);
    }

    #[tokio::test]
    async fn test_traverse_tolerates_cycles() {
        let store = MemoryStore::new();
        store.save("a", &json!({"next": "b"})).await.unwrap();
        store.save("b", &json!({"next": "a"})).await.unwrap();

        let out = store
            .traverse("a", "next", Direction::Outbound, 10)
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
    }
}
