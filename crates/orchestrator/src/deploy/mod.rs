//! Deployer / wave executor — turns a plan plus placement into live
//! containers and a durable deployment state record.

pub mod build;
pub mod deployer;
pub mod lifecycle;

pub use build::build_runtime_config;
pub use deployer::Deployer;
pub use lifecycle::load_deployment_for_stack;

use std::time::Duration;
use thiserror::Error;

use crate::runtime::RuntimeError;
use crate::store::StoreError;

/// Default overall deployment deadline.
pub const DEFAULT_DEPLOY_TIMEOUT: Duration = Duration::from_secs(300);
/// Per-container failures tolerated within one wave before the wave aborts.
pub const MAX_WAVE_FAILURES: usize = 10;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("deployment cancelled")]
    Cancelled,
    #[error("runtime failure for container {container} on host {host}: {source}")]
    Runtime {
        container: String,
        host: String,
        #[source]
        source: RuntimeError,
    },
    #[error("host {host} unavailable: {source}")]
    HostUnavailable {
        host: String,
        #[source]
        source: RuntimeError,
    },
    #[error("no host available for container {0}")]
    NoHostForContainer(String),
    #[error("network setup failed on host {host}: {reason}")]
    Network { host: String, reason: String },
    #[error("wave {wave} aborted after {failures} container failures")]
    WaveAborted { wave: usize, failures: usize },
    #[error("{operation} failed on: {}", failures.join(", "))]
    HostsFailed {
        operation: &'static str,
        failures: Vec<String>,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Options controlling one deployment run.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Overall deadline; the deployment is cancelled beyond it.
    pub timeout: Duration,
    /// Remove every created container when the deployment fails.
    pub rollback_on_error: bool,
    /// Prefix for container names (`<stack_name>-<container_name>`).
    pub stack_name: String,
    /// Pull each image before creating its container.
    pub pull_images: bool,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_DEPLOY_TIMEOUT,
            rollback_on_error: false,
            stack_name: String::new(),
            pull_images: false,
        }
    }
}
