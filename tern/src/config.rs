//! Configuration file handling for tern.

use std::path::Path;

use serde::Deserialize;

/// Main configuration structure.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Broker connection settings. Command-line flags take precedence.
#[derive(Debug, Default, Deserialize)]
pub struct BrokerConfig {
    pub host: Option<String>,

    pub port: Option<u16>,

    /// Generated per run when absent
    pub client_id: Option<String>,

    pub username: Option<String>,

    pub password: Option<String>,

    /// Keep-alive interval in seconds
    pub keep_alive: Option<u16>,

    pub clean_session: Option<bool>,

    /// Connect over TLS
    #[serde(default)]
    pub tls: bool,

    /// Path to a PEM CA certificate for TLS
    pub ca_path: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    pub level: Option<String>,
}
