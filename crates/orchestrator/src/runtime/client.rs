//! Runtime client — core struct, endpoint handling, error types.
//!
//! Domain methods live in sibling modules (`container`, `image`, `volume`,
//! `network`) which add `impl RuntimeClient` blocks.

use bollard::Docker;
use thiserror::Error;

/// Well-known local daemon socket.
pub const LOCAL_SOCKET: &str = "/var/run/docker.sock";
/// Conventional unencrypted daemon port for remote hosts.
pub const REMOTE_PORT: u16 = 2375;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Runtime connection failed: {0}")]
    ConnectionFailed(String),
    /// The daemon did not answer a ping; the host is skipped in multi-host
    /// operations and the pool refuses to register it.
    #[error("Runtime unreachable at {endpoint}: {reason}")]
    Unreachable { endpoint: String, reason: String },
    #[error("No runtime client registered for host: {0}")]
    NotRegistered(String),
    #[error("Container not found: {0}")]
    ContainerNotFound(String),
    #[error("Network not found: {0}")]
    NetworkNotFound(String),
    #[error("Runtime API error: {0}")]
    Api(#[from] bollard::errors::Error),
}

/// Where a host's daemon listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Unix-domain socket path on the local machine.
    Unix(String),
    /// `<ip>:<port>` TCP address of a remote daemon.
    Tcp(String),
}

impl Endpoint {
    /// Derive the endpoint from a host record's IP address: empty,
    /// `localhost`, and `127.0.0.1` mean the local socket; anything else
    /// is a TCP daemon on the conventional port.
    pub fn for_ip(ip_address: &str) -> Self {
        match ip_address {
            "" | "localhost" | "127.0.0.1" => Endpoint::Unix(LOCAL_SOCKET.to_string()),
            ip => Endpoint::Tcp(format!("{}:{}", ip, REMOTE_PORT)),
        }
    }

    /// Connection string form, e.g. `unix:///var/run/docker.sock`.
    pub fn uri(&self) -> String {
        match self {
            Endpoint::Unix(path) => format!("unix://{}", path),
            Endpoint::Tcp(addr) => format!("tcp://{}", addr),
        }
    }
}

impl std::str::FromStr for Endpoint {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(path) = s.strip_prefix("unix://") {
            Ok(Endpoint::Unix(path.to_string()))
        } else if let Some(addr) = s.strip_prefix("tcp://") {
            Ok(Endpoint::Tcp(addr.to_string()))
        } else if s.starts_with('/') {
            Ok(Endpoint::Unix(s.to_string()))
        } else {
            Err(RuntimeError::ConnectionFailed(format!(
                "Unrecognized endpoint: {}",
                s
            )))
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeClient {
    /// The bollard client. `pub(super)` so that domain modules in sibling
    /// files can call the runtime API directly.
    pub(super) client: Docker,
    pub(super) endpoint: Endpoint,
}

impl RuntimeClient {
    pub fn connect(endpoint: &Endpoint) -> Result<Self, RuntimeError> {
        let client = match endpoint {
            Endpoint::Unix(path) => {
                Docker::connect_with_socket(path, 120, &bollard::API_DEFAULT_VERSION)
                    .map_err(|e| RuntimeError::ConnectionFailed(e.to_string()))?
            }
            Endpoint::Tcp(addr) => {
                Docker::connect_with_http(addr, 120, &bollard::API_DEFAULT_VERSION)
                    .map_err(|e| RuntimeError::ConnectionFailed(e.to_string()))?
            }
        };
        Ok(RuntimeClient {
            client,
            endpoint: endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Verify the daemon answers. Failures map to [`RuntimeError::Unreachable`].
    pub async fn ping(&self) -> Result<(), RuntimeError> {
        self.client
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| RuntimeError::Unreachable {
                endpoint: self.endpoint.uri(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_for_local_addresses() {
        for ip in ["", "localhost", "127.0.0.1"] {
            assert_eq!(
                Endpoint::for_ip(ip),
                Endpoint::Unix(LOCAL_SOCKET.to_string()),
                "ip={ip:?}"
            );
        }
    }

    #[test]
    fn test_endpoint_for_remote_ip() {
        assert_eq!(
            Endpoint::for_ip("10.0.0.7"),
            Endpoint::Tcp("10.0.0.7:2375".to_string())
        );
    }

    #[test]
    fn test_endpoint_uri_round_trip() {
        let unix: Endpoint = "unix:///var/run/docker.sock".parse().unwrap();
        assert_eq!(unix.uri(), "unix:///var/run/docker.sock");

        let tcp: Endpoint = "tcp://10.0.0.7:2375".parse().unwrap();
        assert_eq!(tcp.uri(), "tcp://10.0.0.7:2375");

        let bare: Endpoint = "/var/run/docker.sock".parse().unwrap();
        assert_eq!(bare, Endpoint::Unix("/var/run/docker.sock".into()));

        assert!("ftp://nope".parse::<Endpoint>().is_err());
    }
}
