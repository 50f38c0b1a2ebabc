//! Agent configuration

use anyhow::Result;
use serde::Deserialize;

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Remote backend base URL
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Loopback port for the health/status endpoint
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Client-process discovery poll interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Rank-info and identity refresh interval in seconds
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Optional startup login; normally the persisted credential pair is
    /// reused instead.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_server_url() -> String {
    "https://api.riftsync.app".to_string()
}

fn default_api_port() -> u16 {
    8642
}

fn default_poll_interval() -> u64 {
    5
}

fn default_refresh_interval() -> u64 {
    300
}

impl AgentConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("riftsync").required(false))
            .add_source(config::Environment::with_prefix("RIFTSYNC"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|_| AgentConfig {
            server_url: default_server_url(),
            api_port: default_api_port(),
            poll_interval_secs: default_poll_interval(),
            refresh_interval_secs: default_refresh_interval(),
            username: None,
            password: None,
        }))
    }
}
