//! Runtime client pool — one client per host, shared process-wide.
//!
//! Readers (the deployer acquiring a client per container) vastly outnumber
//! writers (host registration and decommissioning), so the map sits behind
//! a read/write lock; `add`, `remove`, and `close_all` take the writer side.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::client::{Endpoint, RuntimeClient, RuntimeError};
use super::ops::RuntimeOps;

pub struct RuntimePool {
    clients: RwLock<HashMap<String, Arc<dyn RuntimeOps>>>,
}

impl RuntimePool {
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Connect a client for the host and register it, replacing any
    /// existing client. The replaced client is closed (dropped) before the
    /// new one is pinged, so replacement holds even when the ping fails.
    pub async fn add(&self, host_id: &str, endpoint: &Endpoint) -> Result<(), RuntimeError> {
        let replaced = {
            let mut clients = self.clients.write().await;
            clients.remove(host_id)
        };
        if replaced.is_some() {
            debug!(host_id, "Closed replaced runtime client");
        }

        let client = RuntimeClient::connect(endpoint)?;
        client.ping().await?;

        let mut clients = self.clients.write().await;
        clients.insert(host_id.to_string(), Arc::new(client));
        info!(host_id, endpoint = %endpoint.uri(), "Runtime client registered");
        Ok(())
    }

    /// Register a pre-built client (test doubles, pre-pinged clients).
    pub async fn insert(&self, host_id: &str, client: Arc<dyn RuntimeOps>) {
        let mut clients = self.clients.write().await;
        clients.insert(host_id.to_string(), client);
    }

    pub async fn get(&self, host_id: &str) -> Result<Arc<dyn RuntimeOps>, RuntimeError> {
        let clients = self.clients.read().await;
        clients
            .get(host_id)
            .cloned()
            .ok_or_else(|| RuntimeError::NotRegistered(host_id.to_string()))
    }

    pub async fn remove(&self, host_id: &str) {
        let removed = {
            let mut clients = self.clients.write().await;
            clients.remove(host_id)
        };
        if removed.is_some() {
            info!(host_id, "Runtime client removed");
        } else {
            warn!(host_id, "Attempted to remove unregistered runtime client");
        }
    }

    pub async fn list(&self) -> Vec<String> {
        let clients = self.clients.read().await;
        let mut ids: Vec<String> = clients.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Drop every client. Called once at process shutdown.
    pub async fn close_all(&self) {
        let mut clients = self.clients.write().await;
        let count = clients.len();
        clients.clear();
        info!(count, "Closed all runtime clients");
    }
}

impl Default for RuntimePool {
    fn default() -> Self {
        Self::new()
    }
}
