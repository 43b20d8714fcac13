//! Client configuration.

use nanolink_core::ReconnectDelay;
use nanolink_protocol::MAX_FRAME_SIZE;
use nanolink_transport::Endpoint;
use serde::Deserialize;

/// Port used when no endpoint is configured.
pub const DEFAULT_PORT: u16 = 3333;

/// Client construction parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Where to connect.
    #[serde(default = "default_endpoint")]
    pub endpoint: Endpoint,

    /// Reconnect automatically after an unexpected close.
    #[serde(default = "default_true")]
    pub reconnect: bool,

    /// Delay policy between reconnect attempts.
    #[serde(default)]
    pub reconnect_delay: ReconnectDelay,

    /// Maximum frame size in bytes, for both directions.
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
}

fn default_endpoint() -> Endpoint {
    Endpoint::tcp("127.0.0.1", DEFAULT_PORT)
}

fn default_true() -> bool {
    true
}

fn default_max_frame_size() -> usize {
    MAX_FRAME_SIZE
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            reconnect: default_true(),
            reconnect_delay: ReconnectDelay::default(),
            max_frame_size: default_max_frame_size(),
        }
    }
}

impl ClientConfig {
    /// Configuration for the given endpoint, with defaults for the rest.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            ..Self::default()
        }
    }

    /// Enable or disable automatic reconnection.
    #[must_use]
    pub fn reconnect(mut self, enabled: bool) -> Self {
        self.reconnect = enabled;
        self
    }

    /// Set the reconnect delay policy.
    #[must_use]
    pub fn reconnect_delay(mut self, delay: ReconnectDelay) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the maximum frame size.
    #[must_use]
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint, Endpoint::tcp("127.0.0.1", 3333));
        assert!(config.reconnect);
        assert_eq!(config.max_frame_size, MAX_FRAME_SIZE);
        assert_eq!(config.reconnect_delay.delay(0), Duration::from_millis(500));
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
            reconnect = false

            [endpoint]
            host = "example.com"
            port = 4000

            [reconnect_delay]
            policy = "fixed"
            delay_ms = 250
        "#;

        let config: ClientConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.endpoint, Endpoint::tcp("example.com", 4000));
        assert!(!config.reconnect);
        assert_eq!(config.reconnect_delay.delay(7), Duration::from_millis(250));
    }

    #[test]
    fn test_parse_unix_endpoint() {
        let config: ClientConfig = toml::from_str(
            r#"
            [endpoint]
            path = "/run/nanolink.sock"
        "#,
        )
        .unwrap();
        assert_eq!(config.endpoint, Endpoint::unix("/run/nanolink.sock"));
        assert!(config.reconnect);
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::new(Endpoint::tcp("localhost", 1))
            .reconnect(false)
            .reconnect_delay(ReconnectDelay::fixed(Duration::from_secs(1)))
            .max_frame_size(1024);
        assert!(!config.reconnect);
        assert_eq!(config.max_frame_size, 1024);
    }
}
