//! Configuration - Type-safe, validated config
//!
//! Loads from `aleph-ws.toml`; every field has a default so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::core::{Error, Result};

pub const DEFAULT_ENDPOINT: &str = "wss://socket.etherdelta.com/socket.io/?EIO=3&transport=websocket";

/// Socket client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Socket.IO websocket endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Deadline for a correlated reply
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// How long callers wait for the readiness event
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Ping cadence override; the server handshake value is used otherwise
    #[serde(default)]
    pub ping_interval_ms: Option<u64>,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}
fn default_request_timeout() -> u64 {
    60
}
fn default_connect_timeout() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            ping_interval_ms: None,
        }
    }
}

impl Config {
    /// Load from TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the default location, falling back to built-in defaults.
    pub fn load_default() -> Self {
        let candidates = [
            "aleph-ws.toml",
            concat!(env!("CARGO_MANIFEST_DIR"), "/aleph-ws.toml"),
        ];

        for path in &candidates {
            match Self::load(Path::new(path)) {
                Ok(cfg) => {
                    tracing::info!("📋 Loaded config from {}", path);
                    return cfg;
                }
                Err(e) if Path::new(path).exists() => {
                    tracing::warn!("Ignoring {}: {}", path, e);
                }
                Err(_) => {}
            }
        }

        tracing::warn!("⚠️ No aleph-ws.toml found, using defaults");
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.endpoint)
            .map_err(|e| Error::Config(format!("Invalid endpoint {}: {}", self.endpoint, e)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::Config(format!(
                "Endpoint must be ws:// or wss://, got {}",
                url.scheme()
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be > 0".to_string()));
        }
        if self.connect_timeout_secs == 0 {
            return Err(Error::Config("connect_timeout_secs must be > 0".to_string()));
        }
        if self.ping_interval_ms == Some(0) {
            return Err(Error::Config("ping_interval_ms must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn ping_interval(&self) -> Option<Duration> {
        self.ping_interval_ms.map(Duration::from_millis)
    }
}
