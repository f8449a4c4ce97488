//! Configuration management for the uptime monitor

use crate::errors::{MonitorError, Result};
use crate::notify::MessageTemplates;
use crate::service::{ServiceKind, ServiceSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Dashboard page settings
    pub page: PageSettings,

    /// Services to monitor
    pub services: Vec<ServiceSpec>,

    /// Notification message templates
    #[serde(default)]
    pub webhook_messages: MessageTemplates,

    /// Status color tokens, shared by the dashboard and webhook embeds
    #[serde(default)]
    pub status_colors: StatusColors,

    /// Path of the persisted history document
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,

    /// Path of the persisted lastUpdated scalar
    #[serde(default = "default_last_updated_path")]
    pub last_updated_path: PathBuf,

    /// Path of the append-only diagnostic log
    #[serde(default = "default_diag_log_path")]
    pub diag_log_path: PathBuf,

    /// Base URL of the game-server status query API
    #[serde(default = "default_game_status_api")]
    pub game_status_api: String,

    /// Probe timeout in seconds (TCP connect, ping, HTTP requests)
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSettings {
    /// Display name, also used as the webhook username
    pub name: String,

    /// Logo URL, also used as the webhook avatar
    #[serde(default)]
    pub logo: String,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Poll interval as a human duration string, e.g. "30s" or "5m"
    #[serde(default = "default_update_interval")]
    pub update_interval: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusColors {
    pub online: String,
    pub offline: String,
    pub partial: String,
}

impl Default for StatusColors {
    fn default() -> Self {
        Self {
            online: "#43b581".to_string(),
            offline: "#f04747".to_string(),
            partial: "#faa61a".to_string(),
        }
    }
}

fn default_history_path() -> PathBuf {
    PathBuf::from("history.json")
}

fn default_last_updated_path() -> PathBuf {
    PathBuf::from("lastUpdated.json")
}

fn default_diag_log_path() -> PathBuf {
    PathBuf::from("logs.txt")
}

fn default_game_status_api() -> String {
    "https://api.mcstatus.io/v2/status/java".to_string()
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_update_interval() -> String {
    "60s".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page: PageSettings {
                name: "Uptime Monitor".to_string(),
                logo: String::new(),
                bind_address: default_bind_address(),
                port: default_port(),
                update_interval: default_update_interval(),
            },
            services: Vec::new(),
            webhook_messages: MessageTemplates::default(),
            status_colors: StatusColors::default(),
            history_path: default_history_path(),
            last_updated_path: default_last_updated_path(),
            diag_log_path: default_diag_log_path(),
            game_status_api: default_game_status_api(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&raw)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides for scalar settings
    fn apply_env_overrides(&mut self) {
        if let Ok(address) = env::var("MONITOR_BIND_ADDRESS") {
            self.page.bind_address = address;
        }

        if let Ok(port) = env::var("MONITOR_PORT") {
            if let Ok(port) = port.parse() {
                self.page.port = port;
            }
        }

        if let Ok(interval) = env::var("MONITOR_UPDATE_INTERVAL") {
            self.page.update_interval = interval;
        }

        if let Ok(path) = env::var("MONITOR_HISTORY_PATH") {
            self.history_path = path.into();
        }

        if let Ok(path) = env::var("MONITOR_LAST_UPDATED_PATH") {
            self.last_updated_path = path.into();
        }

        if let Ok(path) = env::var("MONITOR_DIAG_LOG_PATH") {
            self.diag_log_path = path.into();
        }

        if let Ok(api) = env::var("MONITOR_GAME_STATUS_API") {
            self.game_status_api = api;
        }

        if let Ok(timeout) = env::var("MONITOR_PROBE_TIMEOUT_SECONDS") {
            if let Ok(secs) = timeout.parse() {
                self.probe_timeout_secs = secs;
            }
        }
    }

    /// The poll interval as a parsed duration
    pub fn update_interval(&self) -> Result<Duration> {
        parse_interval(&self.page.update_interval).map_err(MonitorError::Config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.page.name.is_empty() {
            return Err("page.name cannot be empty".to_string());
        }

        if self.page.port == 0 {
            return Err("page.port must be greater than 0".to_string());
        }

        if self.services.is_empty() {
            return Err("at least one service must be configured".to_string());
        }

        let mut names = HashSet::new();
        for service in &self.services {
            if service.name.is_empty() {
                return Err("service name cannot be empty".to_string());
            }

            if service.address.is_empty() {
                return Err(format!("service {} has an empty address", service.name));
            }

            if !names.insert(service.name.as_str()) {
                return Err(format!("duplicate service name: {}", service.name));
            }

            if matches!(service.kind, ServiceKind::Tcp | ServiceKind::Udp) && service.port.is_none()
            {
                return Err(format!(
                    "service {} is {} but has no port",
                    service.name, service.kind
                ));
            }
        }

        let interval = parse_interval(&self.page.update_interval)?;
        if interval.is_zero() {
            return Err("page.update_interval must be greater than zero".to_string());
        }

        if self.probe_timeout_secs == 0 {
            return Err("probe_timeout_secs must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Parse a human duration string ("250ms", "30s", "5m", "1h", "2d").
/// A bare number is treated as seconds.
pub fn parse_interval(value: &str) -> std::result::Result<Duration, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("empty duration".to_string());
    }

    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);

    let number: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration: {}", value))?;

    match unit.trim() {
        "ms" => Ok(Duration::from_millis(number)),
        "" | "s" => Ok(Duration::from_secs(number)),
        "m" => Ok(Duration::from_secs(number * 60)),
        "h" => Ok(Duration::from_secs(number * 3600)),
        "d" => Ok(Duration::from_secs(number * 86400)),
        other => Err(format!("unknown duration unit: {}", other)),
    }
}
