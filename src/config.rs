//! Server configuration: built-in defaults, optionally overlaid by a TOML
//! file, then by explicit command-line flags.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::cli::Args;
use crate::error::{Result, SmartOpsError};
use crate::hub::DEFAULT_CHANNEL_CAPACITY;

pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Kept off the usual 8000/8080 so it does not collide with a local frontend.
pub const DEFAULT_PORT: u16 = 8081;
pub const DEFAULT_INTERVAL_MS: u64 = 2000;
/// One day.
pub const MAX_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;
pub const DEFAULT_SERVICE_NAME: &str = "Arbor Technologies SmartOps";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub broadcast_interval_ms: u64,
    pub service_name: String,
    /// Per-connection backlog of undelivered ticks.
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            broadcast_interval_ms: DEFAULT_INTERVAL_MS,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Parse TOML text. `origin` names the source in error messages.
    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| SmartOpsError::Config {
            path: origin.to_string(),
            detail: e.to_string(),
        })?;
        config.validate(origin)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let origin = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|e| SmartOpsError::Config {
            path: origin.clone(),
            detail: e.to_string(),
        })?;
        Self::from_toml_str(&text, &origin)
    }

    /// Resolve the effective configuration for a run of the binary.
    pub fn from_args(args: &Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if let Some(host) = &args.host {
            config.host = host.clone();
        }
        if let Some(port) = args.port {
            config.port = port;
        }
        if let Some(ms) = args.interval_ms {
            config.broadcast_interval_ms = ms;
        }
        if let Some(name) = &args.service_name {
            config.service_name = name.clone();
        }
        config.validate("command line")?;
        Ok(config)
    }

    pub fn validate(&self, origin: &str) -> Result<()> {
        let fail = |detail: &str| SmartOpsError::Config {
            path: origin.to_string(),
            detail: detail.to_string(),
        };
        if self.broadcast_interval_ms == 0 {
            return Err(fail("broadcast_interval_ms must be greater than zero"));
        }
        if self.broadcast_interval_ms > MAX_INTERVAL_MS {
            return Err(fail("broadcast_interval_ms must be at most one day (86400000)"));
        }
        if self.channel_capacity == 0 {
            return Err(fail("channel_capacity must be greater than zero"));
        }
        if self.host.trim().is_empty() {
            return Err(fail("host must not be empty"));
        }
        Ok(())
    }

    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Text returned by `GET /api/health`.
    pub fn health_message(&self) -> String {
        format!("{} Core Online", self.service_name)
    }
}
