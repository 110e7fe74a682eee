//! Configuration management
//!
//! Layering (lowest to highest precedence): built-in defaults, an optional
//! `config.{toml,json,yaml}` in the config directory, `YAMAHA_BRIDGE_*`
//! environment variables (nested keys separated by `__`).

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::adapters::yamaha::poller::poll_interval_from_millis;

const ENV_PREFIX: &str = "YAMAHA_BRIDGE";
const APP_DIR_NAME: &str = "yamaha-bridge";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port of the host HTTP API
    #[serde(default = "default_port")]
    pub port: u16,

    /// Poll period in milliseconds; 0 means the default (1000)
    #[serde(default)]
    pub poll_interval: u64,

    /// Timeout in milliseconds for every Extended Control request; 0 means the default
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        poll_interval_from_millis(self.poll_interval)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            poll_interval: 0,
            request_timeout_ms: default_request_timeout_ms(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

fn default_port() -> u16 {
    8089
}

fn default_request_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_search_interval_secs")]
    pub search_interval_secs: u64,
    #[serde(default = "default_search_window_secs")]
    pub search_window_secs: u64,
    /// 0 means the default
    #[serde(default = "default_description_timeout_ms")]
    pub description_timeout_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            search_interval_secs: default_search_interval_secs(),
            search_window_secs: default_search_window_secs(),
            description_timeout_ms: default_description_timeout_ms(),
        }
    }
}

fn default_search_interval_secs() -> u64 {
    30
}

fn default_search_window_secs() -> u64 {
    3
}

fn default_description_timeout_ms() -> u64 {
    5000
}

/// Get config directory (env override, XDG_CONFIG_HOME, or platform default)
pub fn get_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("YAMAHA_BRIDGE_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library/Application Support")
                .join(APP_DIR_NAME);
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join(APP_DIR_NAME);
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".config").join(APP_DIR_NAME);
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join(APP_DIR_NAME);
        }
    }

    // Fallback to current directory
    PathBuf::from(".")
}

pub fn load_config() -> Result<Config> {
    let config_dir = get_config_dir();

    let mut builder = ::config::Config::builder()
        .set_default("port", default_port() as i64)?
        .add_source(
            ::config::File::with_name(&config_dir.join("config").to_string_lossy()).required(false),
        )
        .add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    // Legacy PORT fallback when the prefixed variable is absent
    if std::env::var(format!("{}_PORT", ENV_PREFIX)).is_err() {
        if let Ok(port) = std::env::var("PORT") {
            match port.parse::<u16>() {
                Ok(port_num) => builder = builder.set_override("port", port_num as i64)?,
                Err(_) => tracing::warn!("Ignoring invalid PORT value: {}", port),
            }
        }
    }

    let config: Config = builder.build()?.try_deserialize()?;
    tracing::debug!("Loaded config from {}: {:?}", config_dir.display(), config);
    Ok(config)
}
