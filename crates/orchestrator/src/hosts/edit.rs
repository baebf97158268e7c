//! Host edit path — the only route through which host records mutate.

use chrono::Utc;

use crate::model::Host;
use crate::store::{StoreError, TypedStore};

/// Fields a host edit may change. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct HostPatch {
    pub name: Option<String>,
    pub ip_address: Option<String>,
    pub datacenter: Option<String>,
    pub cpu_cores: Option<u32>,
    pub memory_bytes: Option<u64>,
    pub status: Option<crate::model::HostStatus>,
    pub labels: Option<std::collections::HashMap<String, String>>,
}

impl HostPatch {
    fn apply(&self, host: &mut Host) -> bool {
        let mut changed = false;
        macro_rules! set {
            ($field:ident) => {
                if let Some(v) = &self.$field {
                    if &host.$field != v {
                        host.$field = v.clone();
                        changed = true;
                    }
                }
            };
        }
        set!(name);
        set!(ip_address);
        set!(datacenter);
        set!(labels);
        if let Some(v) = self.cpu_cores {
            changed |= host.cpu_cores != v;
            host.cpu_cores = v;
        }
        if let Some(v) = self.memory_bytes {
            changed |= host.memory_bytes != v;
            host.memory_bytes = v;
        }
        if let Some(v) = self.status {
            changed |= host.status != v;
            host.status = v;
        }
        if changed {
            host.updated_at = Utc::now();
        }
        changed
    }
}

pub async fn create_host(store: &TypedStore, host: &Host) -> Result<String, StoreError> {
    store.save(&host.id, host).await
}

/// Apply a patch under the store's conflict-retry policy. A no-op patch
/// does not bump the revision.
pub async fn update_host(store: &TypedStore, host_id: &str, patch: HostPatch) -> Result<(), StoreError> {
    store
        .update_with_retry::<Host, _>(host_id, |host| patch.apply(host))
        .await
}

pub async fn delete_host(store: &TypedStore, host_id: &str) -> Result<(), StoreError> {
    let (_, rev) = store.get::<Host>(host_id).await?;
    store.delete(host_id, &rev).await
}
