// Configuration - environment variables, read once at startup

use crate::parser::Grammar;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_DATA_FILE: &str = "sales.json";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_HOST: &str = "0.0.0.0";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{name}=`{value}` is invalid: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings shared by every entry point
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_file: PathBuf,
    pub grammar: Grammar,
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source (tests pass a map)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let data_file = lookup("SALES_DATA_FILE")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATA_FILE.to_string());

        let grammar = match lookup("SALES_GRAMMAR") {
            Some(raw) if !raw.trim().is_empty() => {
                raw.parse::<Grammar>()
                    .map_err(|reason| ConfigError::Invalid {
                        name: "SALES_GRAMMAR",
                        value: raw.clone(),
                        reason,
                    })?
            }
            _ => Grammar::default(),
        };

        let log_json = parse_bool("SALES_LOG_JSON", lookup("SALES_LOG_JSON"), false)?;

        Ok(Config {
            data_file: PathBuf::from(data_file),
            grammar,
            log_json,
        })
    }
}

/// Settings for the web server process, which also hosts the bot webhook
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub base: Config,
    pub host: String,
    pub port: u16,
    pub telegram_token: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base = Config::from_lookup(&lookup)?;

        // No placeholder token: the bot adapter cannot run without one
        let telegram_token = lookup("TELEGRAM_TOKEN")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::Missing("TELEGRAM_TOKEN"))?;

        let port = match lookup("PORT") {
            Some(raw) if !raw.trim().is_empty() => {
                raw.trim()
                    .parse::<u16>()
                    .map_err(|e| ConfigError::Invalid {
                        name: "PORT",
                        value: raw.clone(),
                        reason: e.to_string(),
                    })?
            }
            _ => DEFAULT_PORT,
        };

        let host = lookup("SALES_BIND_HOST")
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        Ok(ServerConfig {
            base,
            host,
            port,
            telegram_token,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_bool(name: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(default),
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw,
            reason: "expected true or false".to_string(),
        }),
    }
}
