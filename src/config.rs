//! Configuration management
//!
//! Handles loading and validating the channel fleet configuration from TOML
//! files. A fleet is an ordered list of per-endpoint channel configs; the
//! order is significant, it decides election tie-breaks.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Ordered list of channel endpoints
    pub channels: Vec<ChannelConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Per-endpoint channel configuration
///
/// Immutable after construction; the multiplexer never mutates it.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    /// Unique endpoint identity (address the transport connects to)
    pub endpoint: String,
    /// Event names this connection is permitted to emit
    #[serde(default)]
    pub emit_list: Vec<String>,
    /// Event names this connection is permitted to deliver
    #[serde(default)]
    pub listen_list: Vec<String>,
    /// Opaque authentication payload attached to connect attempts
    #[serde(default)]
    pub credential: Option<HashMap<String, String>>,
    /// Whether the transport should use a secure link
    #[serde(default = "default_true")]
    pub secure: bool,
    /// Whether the transport may reconnect on its own
    #[serde(default = "default_true")]
    pub reconnection: bool,
}

impl ChannelConfig {
    /// Create a config with allow-lists and defaults for the rest
    pub fn new(
        endpoint: impl Into<String>,
        emit_list: Vec<String>,
        listen_list: Vec<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            emit_list,
            listen_list,
            credential: None,
            secure: default_true(),
            reconnection: default_true(),
        }
    }

    /// Check whether this endpoint may emit `event`
    pub fn emits(&self, event: &str) -> bool {
        self.emit_list.iter().any(|e| e == event)
    }

    /// Check whether this endpoint may deliver `event`
    pub fn listens(&self, event: &str) -> bool {
        self.listen_list.iter().any(|e| e == event)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config =
            toml::from_str(&contents).with_context(|| "Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.channels.is_empty() {
            anyhow::bail!("at least one [[channels]] entry is required");
        }
        for channel in &self.channels {
            if channel.endpoint.is_empty() {
                anyhow::bail!("channels.endpoint must not be empty");
            }
        }
        Ok(())
    }
}
