//! Server configuration.
//!
//! Loaded from an optional YAML file named by `HEARTH_CONFIG`; every field
//! has a default. `LISTEN` overrides the listen address.
//!
//! ```yaml
//! server:
//!   listen_addr: "0.0.0.0:8080"
//! connection:
//!   idle_timeout_ms: 5000
//!   max_header_bytes: 16384
//!   max_body_bytes: 1048576
//!   max_pipelined: 16
//!   read_buffer_size: 8192
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::Deserialize;

use crate::http::connection::Settings;
use crate::http::parser::Limits;

pub const CONFIG_ENV: &str = "HEARTH_CONFIG";
pub const LISTEN_ENV: &str = "LISTEN";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub connection: ConnectionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub listen_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Idle keep-alive connections are closed after this long.
    pub idle_timeout_ms: u64,
    pub max_header_bytes: usize,
    pub max_body_bytes: u64,
    pub max_pipelined: usize,
    pub read_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        let settings = Settings::default();
        Self {
            idle_timeout_ms: settings.idle_timeout.as_millis() as u64,
            max_header_bytes: settings.limits.max_header_bytes,
            max_body_bytes: settings.limits.max_body_bytes,
            max_pipelined: settings.max_pipelined,
            read_buffer_size: settings.read_buffer_size,
        }
    }
}

impl Config {
    /// Loads the file named by `HEARTH_CONFIG` if set, then applies `LISTEN`.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };

        if let Ok(listen_addr) = std::env::var(LISTEN_ENV) {
            config.server.listen_addr = listen_addr;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        // an empty document means "all defaults"
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.listen_addr.is_empty() {
            bail!("server.listen_addr must not be empty");
        }
        let c = &self.connection;
        if c.idle_timeout_ms == 0 {
            bail!("connection.idle_timeout_ms must be greater than zero");
        }
        if c.max_header_bytes == 0 {
            bail!("connection.max_header_bytes must be greater than zero");
        }
        if c.max_pipelined == 0 {
            bail!("connection.max_pipelined must be greater than zero");
        }
        if c.read_buffer_size == 0 {
            bail!("connection.read_buffer_size must be greater than zero");
        }
        Ok(())
    }
}

impl ConnectionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn settings(&self) -> Settings {
        Settings {
            idle_timeout: self.idle_timeout(),
            limits: Limits {
                max_header_bytes: self.max_header_bytes,
                max_body_bytes: self.max_body_bytes,
            },
            max_pipelined: self.max_pipelined,
            read_buffer_size: self.read_buffer_size,
        }
    }
}
