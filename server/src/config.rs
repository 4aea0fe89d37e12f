//! Server configuration

use shared::DEFAULT_PORT;

/// Hard cap on simultaneous connections, the size of the id pool
pub const MAX_CONNECTIONS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// `host:port` to listen on. Port 0 lets the OS pick one.
    pub address: String,
    /// Simultaneous connections accepted, never more than [`MAX_CONNECTIONS`]
    pub max_clients: usize,
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            address: format!("{}:{}", host, port),
            ..Self::default()
        }
    }

    pub fn with_max_clients(mut self, max_clients: usize) -> Self {
        self.max_clients = max_clients.clamp(1, MAX_CONNECTIONS);
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: format!("0.0.0.0:{}", DEFAULT_PORT),
            max_clients: MAX_CONNECTIONS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.address, "0.0.0.0:7777");
        assert_eq!(config.max_clients, 15);
    }

    #[test]
    fn test_max_clients_is_capped() {
        let config = ServerConfig::new("127.0.0.1", 0).with_max_clients(40);
        assert_eq!(config.address, "127.0.0.1:0");
        assert_eq!(config.max_clients, MAX_CONNECTIONS);
        assert_eq!(ServerConfig::default().with_max_clients(0).max_clients, 1);
    }
}
