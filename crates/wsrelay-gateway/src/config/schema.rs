use std::time::Duration;

use serde::Deserialize;
use wsrelay_core::error::{RelayError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    pub version: u32,

    pub relay: RelaySection,

    #[serde(default)]
    pub backend: BackendSection,

    #[serde(default)]
    pub hub: HubSection,
}

impl RelayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(RelayError::UnsupportedVersion);
        }
        self.relay.validate()?;
        self.backend.validate()?;
        self.hub.validate()?;
        Ok(())
    }
}

/// Upstream session settings (heartbeat, timeouts, reconnect).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelaySection {
    pub url: String,

    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,

    /// When set, backoff doubles per failed dial up to this cap.
    #[serde(default)]
    pub reconnect_max_backoff_ms: Option<u64>,

    #[serde(default = "default_max_inflight")]
    pub max_inflight: usize,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub strict_liveness: bool,

    #[serde(default)]
    pub reply_on_handler_error: bool,
}

impl RelaySection {
    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(RelayError::Config(
                "relay.url must start with ws:// or wss://".into(),
            ));
        }
        if !(1000..=300_000).contains(&self.heartbeat_interval_ms) {
            return Err(RelayError::Config(
                "relay.heartbeat_interval_ms must be between 1000 and 300000".into(),
            ));
        }
        if self.read_timeout_ms <= self.heartbeat_interval_ms {
            return Err(RelayError::Config(
                "relay.read_timeout_ms must be greater than heartbeat_interval_ms".into(),
            ));
        }
        if self.reconnect_backoff_ms == 0 {
            return Err(RelayError::Config(
                "relay.reconnect_backoff_ms must be positive".into(),
            ));
        }
        if let Some(max) = self.reconnect_max_backoff_ms {
            if max < self.reconnect_backoff_ms {
                return Err(RelayError::Config(
                    "relay.reconnect_max_backoff_ms must not be below reconnect_backoff_ms".into(),
                ));
            }
        }
        if !(1..=1024).contains(&self.max_inflight) {
            return Err(RelayError::Config(
                "relay.max_inflight must be between 1 and 1024".into(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(RelayError::Config(
                "relay.request_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    pub fn reconnect_max_backoff(&self) -> Option<Duration> {
        self.reconnect_max_backoff_ms.map(Duration::from_millis)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Model backend (Ollama HTTP API).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendSection {
    #[serde(default = "default_backend_url")]
    pub base_url: String,

    #[serde(default = "default_backend_timeout_ms")]
    pub request_timeout_ms: u64,

    /// 0 disables caching of the model list.
    #[serde(default = "default_list_cache_ttl_ms")]
    pub list_cache_ttl_ms: u64,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            request_timeout_ms: default_backend_timeout_ms(),
            list_cache_ttl_ms: default_list_cache_ttl_ms(),
        }
    }
}

impl BackendSection {
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(RelayError::Config(
                "backend.base_url must start with http:// or https://".into(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(RelayError::Config(
                "backend.request_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Optional broadcast hub listener.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HubSection {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for HubSection {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_listen(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl HubSection {
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(RelayError::Config(
                "hub.listen must be a valid socket address".into(),
            ));
        }
        if self.heartbeat_interval_ms < 1000 {
            return Err(RelayError::Config(
                "hub.heartbeat_interval_ms must be at least 1000".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(RelayError::Config("hub.queue_capacity must be positive".into()));
        }
        Ok(())
    }
}

fn default_heartbeat_interval_ms() -> u64 {
    30000
}
fn default_read_timeout_ms() -> u64 {
    40000
}
fn default_reconnect_backoff_ms() -> u64 {
    5000
}
fn default_max_inflight() -> usize {
    8
}
fn default_request_timeout_ms() -> u64 {
    30000
}
fn default_backend_url() -> String {
    "http://127.0.0.1:11434".into()
}
fn default_backend_timeout_ms() -> u64 {
    120000
}
fn default_list_cache_ttl_ms() -> u64 {
    120000
}
fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_queue_capacity() -> usize {
    256
}
