//! Network domain — create, inspect, remove.

use std::collections::HashMap;

use bollard::models::{Ipam, IpamConfig, NetworkCreateRequest};

use super::client::{RuntimeClient, RuntimeError};

/// Network request as the plan describes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkRuntimeConfig {
    pub name: String,
    pub driver: Option<String>,
    pub labels: HashMap<String, String>,
    pub options: HashMap<String, String>,
    pub subnet: Option<String>,
    pub gateway: Option<String>,
    pub ip_range: Option<String>,
}

/// The slice of a network inspect the orchestrator records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkView {
    pub id: String,
    pub name: String,
    pub driver: String,
    pub scope: String,
    pub subnet: String,
    pub gateway: String,
}

impl RuntimeClient {
    /// Create a network. Driver defaults to `bridge`; IPAM is attached only
    /// when at least one of subnet/gateway/ip_range is given.
    pub async fn create_network(&self, config: NetworkRuntimeConfig) -> Result<(), RuntimeError> {
        let ipam = if config.subnet.is_some() || config.gateway.is_some() || config.ip_range.is_some()
        {
            Some(Ipam {
                config: Some(vec![IpamConfig {
                    subnet: config.subnet.clone(),
                    gateway: config.gateway.clone(),
                    ip_range: config.ip_range.clone(),
                    ..Default::default()
                }]),
                ..Default::default()
            })
        } else {
            None
        };

        let request = NetworkCreateRequest {
            name: config.name.clone(),
            driver: Some(config.driver.clone().unwrap_or_else(|| "bridge".to_string())),
            options: if config.options.is_empty() {
                None
            } else {
                Some(config.options.clone())
            },
            ipam,
            labels: Some(config.labels.clone()),
            ..Default::default()
        };

        self.client
            .create_network(request)
            .await
            .map_err(RuntimeError::from)?;
        Ok(())
    }

    /// Inspect a network by name or ID; 404 maps to [`RuntimeError::NetworkNotFound`].
    pub async fn inspect_network(&self, name: &str) -> Result<NetworkView, RuntimeError> {
        let net = self
            .client
            .inspect_network(name, None::<bollard::query_parameters::InspectNetworkOptions>)
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError { status_code: 404, .. } => {
                    RuntimeError::NetworkNotFound(name.to_string())
                }
                other => RuntimeError::Api(other),
            })?;

        let first_ipam = net
            .ipam
            .as_ref()
            .and_then(|ipam| ipam.config.as_ref())
            .and_then(|configs| configs.first());

        Ok(NetworkView {
            id: net.id.unwrap_or_default(),
            name: net.name.unwrap_or_else(|| name.to_string()),
            driver: net.driver.unwrap_or_default(),
            scope: net.scope.unwrap_or_default(),
            subnet: first_ipam
                .and_then(|c| c.subnet.clone())
                .unwrap_or_default(),
            gateway: first_ipam
                .and_then(|c| c.gateway.clone())
                .unwrap_or_default(),
        })
    }

    pub async fn remove_network(&self, name: &str) -> Result<(), RuntimeError> {
        self.client
            .remove_network(name)
            .await
            .map_err(RuntimeError::from)
    }
}
