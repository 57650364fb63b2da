//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::registry::RegistryConfig;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Hold ceiling: a held request is answered with the reconnect signal
    /// after this long with no publish. Keep below upstream idle timeouts so
    /// a hold ends with a clean close rather than an abrupt severance.
    pub hold_timeout: Duration,

    /// Maximum concurrent holds (0 = unlimited); over the ceiling a hold is
    /// shed with the reconnect signal
    pub max_holds: usize,

    /// Channel registry configuration
    pub registry: RegistryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().unwrap(),
            hold_timeout: Duration::from_secs(20),
            max_holds: 0, // Unlimited
            registry: RegistryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the hold ceiling
    pub fn hold_timeout(mut self, timeout: Duration) -> Self {
        self.hold_timeout = timeout;
        self
    }

    /// Set the maximum concurrent holds
    pub fn max_holds(mut self, max: usize) -> Self {
        self.max_holds = max;
        self
    }

    /// Set the registry configuration
    pub fn registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }
}
