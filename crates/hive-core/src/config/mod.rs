mod defaults;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::HiveError;
use defaults::*;

/// Top-level Hive configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub hive: HiveConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
}

/// General settings and on-disk layout.
///
/// Everything Hive writes lives under `data_dir`:
/// `sessions/{id}/` for credentials, `uploads/` for pending images,
/// `public/` for rendered QR codes and `logs/` for log files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HiveConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Also write logs to a daily rolling file under `{data_dir}/logs`.
    #[serde(default)]
    pub log_to_file: bool,
}

impl Default for HiveConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            log_to_file: false,
        }
    }
}

impl HiveConfig {
    fn dir(&self, name: &str) -> PathBuf {
        PathBuf::from(shellexpand(&self.data_dir)).join(name)
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.dir("sessions")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.dir("uploads")
    }

    pub fn public_dir(&self) -> PathBuf {
        self.dir("public")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.dir("logs")
    }
}

/// HTTP API server config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Bearer token for API authentication. Empty = no auth (for local-only use).
    #[serde(default)]
    pub api_key: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            api_key: String::new(),
        }
    }
}

/// Session supervisor config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Fixed delay between a dropped connection and the next attempt.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    /// Recreate a session for every persisted credential directory at startup.
    #[serde(default)]
    pub restore_on_start: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_secs: default_reconnect_delay_secs(),
            restore_on_start: false,
        }
    }
}

impl SupervisorConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

/// Image upload limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

impl Config {
    /// Apply a `PORT` override (as read from the environment).
    pub fn with_port_override(mut self, port: Option<&str>) -> Result<Self, HiveError> {
        if let Some(raw) = port.map(str::trim).filter(|p| !p.is_empty()) {
            self.api.port = raw
                .parse()
                .map_err(|e| HiveError::Config(format!("invalid PORT '{raw}': {e}")))?;
        }
        Ok(self)
    }
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, HiveError> {
    let path = Path::new(path);
    if !path.exists() {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| HiveError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| HiveError::Config(format!("failed to parse config: {}", e)))?;

    Ok(config)
}
