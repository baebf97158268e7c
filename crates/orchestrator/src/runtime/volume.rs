//! Volume domain — create, remove.

use std::collections::HashMap;

use bollard::models::VolumeCreateRequest;
use bollard::query_parameters::RemoveVolumeOptions;

use super::client::{RuntimeClient, RuntimeError};

/// The slice of a created volume the orchestrator records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeView {
    pub name: String,
    pub driver: String,
    pub scope: String,
}

impl RuntimeClient {
    /// Create a named volume. Driver defaults to `local`.
    pub async fn create_volume(
        &self,
        name: &str,
        driver: Option<&str>,
        labels: HashMap<String, String>,
        driver_opts: HashMap<String, String>,
    ) -> Result<VolumeView, RuntimeError> {
        let request = VolumeCreateRequest {
            name: Some(name.to_string()),
            driver: Some(driver.unwrap_or("local").to_string()),
            driver_opts: if driver_opts.is_empty() {
                None
            } else {
                Some(driver_opts)
            },
            labels: Some(labels),
            ..Default::default()
        };

        let volume = self
            .client
            .create_volume(request)
            .await
            .map_err(RuntimeError::from)?;

        Ok(VolumeView {
            name: volume.name,
            driver: volume.driver,
            scope: volume
                .scope
                .map(|s| s.to_string())
                .unwrap_or_else(|| "local".to_string()),
        })
    }

    pub async fn remove_volume(&self, name: &str, force: bool) -> Result<(), RuntimeError> {
        let options = Some(RemoveVolumeOptions { force });
        self.client
            .remove_volume(name, options)
            .await
            .map_err(RuntimeError::from)
    }
}
