use std::time::Duration;

/// Environment variable holding the relay WebSocket URL.
pub const RELAY_URL_ENV: &str = "JOBLOG_RELAY_URL";

/// Configuration for the relay client.
#[derive(Debug, Clone)]
pub struct RelayClientConfig {
    /// e.g. `wss://host/ws`. `None` disables the client.
    pub relay_url: Option<String>,
    pub heartbeat_interval: Duration,
    pub max_reconnect_delay: Duration,
}

impl Default for RelayClientConfig {
    fn default() -> Self {
        Self {
            relay_url: std::env::var(RELAY_URL_ENV)
                .ok()
                .filter(|url| !url.trim().is_empty()),
            heartbeat_interval: Duration::from_secs(30),
            max_reconnect_delay: Duration::from_secs(30),
        }
    }
}

impl RelayClientConfig {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.relay_url = Some(url.into());
        self
    }
}
