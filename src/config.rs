use std::{env, time::Duration};

use thiserror::Error;

pub const DEFAULT_SERVER_NAME: &str = "calendar-mcp";
pub const DEFAULT_SERVER_VERSION: &str = "1.0.0";
pub const DEFAULT_CAPABILITIES: [&str; 2] = ["calendar-query", "availability-check"];
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub bind_port: u16,
    pub server_name: String,
    pub server_version: String,
    pub capabilities: Vec<String>,
    pub heartbeat_interval: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BIND_ADDR must not be empty")]
    EmptyBindAddr,
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("MCP_SERVER_NAME must not be empty")]
    EmptyServerName,
    #[error("MCP_HEARTBEAT_SECS must be a positive integer")]
    InvalidHeartbeatInterval,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            bind_port: 8080,
            server_name: DEFAULT_SERVER_NAME.to_string(),
            server_version: DEFAULT_SERVER_VERSION.to_string(),
            capabilities: DEFAULT_CAPABILITIES.iter().map(|c| c.to_string()).collect(),
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind_addr = match lookup("BIND_ADDR") {
            Some(value) if value.trim().is_empty() => return Err(ConfigError::EmptyBindAddr),
            Some(value) => value.trim().to_string(),
            None => defaults.bind_addr,
        };
        let bind_port = lookup("BIND_PORT")
            .map(|value| {
                value
                    .trim()
                    .parse::<u16>()
                    .map_err(|_| ConfigError::InvalidPort)
            })
            .transpose()?
            .unwrap_or(defaults.bind_port);

        let server_name = match lookup("MCP_SERVER_NAME") {
            Some(value) if value.trim().is_empty() => return Err(ConfigError::EmptyServerName),
            Some(value) => value.trim().to_string(),
            None => defaults.server_name,
        };
        let server_version = lookup("MCP_SERVER_VERSION")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.server_version);
        let capabilities = lookup("MCP_CAPABILITIES")
            .map(|value| parse_capabilities(&value))
            .unwrap_or(defaults.capabilities);

        let heartbeat_interval = lookup("MCP_HEARTBEAT_SECS")
            .map(|value| {
                value
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs)
                    .ok_or(ConfigError::InvalidHeartbeatInterval)
            })
            .transpose()?
            .unwrap_or(defaults.heartbeat_interval);

        Ok(Self {
            bind_addr,
            bind_port,
            server_name,
            server_version,
            capabilities,
            heartbeat_interval,
        })
    }
}

fn parse_capabilities(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
