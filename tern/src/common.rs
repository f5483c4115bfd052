//! Shared utilities for the tern subcommands.

use std::path::PathBuf;

use clap::Args;
use rand::{distributions::Alphanumeric, Rng};
use tern_client::ConnectOptions;

use crate::config::{BrokerConfig, Config, LoggingConfig};

/// Connection arguments shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// MQTT broker hostname [default: localhost]
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// MQTT broker port [default: 1883]
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Client ID (random if not specified)
    #[arg(short = 'i', long)]
    pub client_id: Option<String>,

    /// Username for authentication
    #[arg(short = 'u', long)]
    pub username: Option<String>,

    /// Password for authentication
    #[arg(short = 'P', long)]
    pub password: Option<String>,

    /// Keep-alive interval in seconds, 0 to disable [default: 15]
    #[arg(short = 'k', long)]
    pub keep_alive: Option<u16>,

    /// Ask the broker to resume a stored session instead of starting clean
    #[arg(long)]
    pub persistent: bool,

    /// Connect over TLS
    #[arg(long)]
    pub tls: bool,

    /// PEM CA certificate used to verify the broker
    #[arg(long)]
    pub ca_path: Option<String>,

    /// Skip broker certificate verification
    #[arg(long)]
    pub insecure: bool,

    /// Configuration file (TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl ConnectionArgs {
    /// Read the configuration file, if one was given.
    pub fn load_config(&self) -> Result<Config, Box<dyn std::error::Error>> {
        match &self.config {
            Some(path) => Config::from_file(path),
            None => Ok(Config::default()),
        }
    }

    /// Merge arguments over the file's broker settings.
    pub fn to_connect_options(&self, broker: &BrokerConfig) -> ConnectOptions {
        let host = self
            .host
            .clone()
            .or_else(|| broker.host.clone())
            .unwrap_or_else(|| String::from("localhost"));
        let port = self.port.or(broker.port).unwrap_or(1883);

        let client_id = self
            .client_id
            .clone()
            .or_else(|| broker.client_id.clone())
            .unwrap_or_else(generate_client_id);

        let clean_session = !self.persistent && broker.clean_session.unwrap_or(true);

        let mut opts = ConnectOptions::new(host, port)
            .client_id(client_id)
            .keep_alive(self.keep_alive.or(broker.keep_alive).unwrap_or(15))
            .clean_session(clean_session)
            .tls(self.tls || broker.tls)
            .danger_skip_tls_verify(self.insecure);

        if let Some(ca_path) = self.ca_path.as_ref().or(broker.ca_path.as_ref()) {
            opts = opts.ca_path(ca_path);
        }

        if let Some(user) = self.username.as_ref().or(broker.username.as_ref()) {
            opts = opts.username(user);
        }

        if let Some(pass) = self.password.as_ref().or(broker.password.as_ref()) {
            opts = opts.password(pass.clone());
        }

        opts
    }
}

/// A random five character alphanumeric client ID.
pub fn generate_client_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(5)
        .map(char::from)
        .collect()
}

/// Initialize tracing/logging based on verbosity and the config file.
pub fn init_logging(verbose: bool, logging: &LoggingConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if verbose {
        "debug"
    } else {
        logging.level.as_deref().unwrap_or("warn")
    };

    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
