use crate::history::{DisplayMode, DEFAULT_CAPACITY};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tzkt: TzktConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub vote_log: VoteLogConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TzktConfig {
    /// Events hub WebSocket URL
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Client keep-alive period in seconds (0 = off)
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// ALL, ON_OFF or OFF_ONLY
    #[serde(default)]
    pub mode: DisplayMode,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoteLogConfig {
    /// Export OFF votes to the JSONL log.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_log_path")]
    pub path: PathBuf,
    /// Legacy JSON-array log migrated on first start. Empty disables.
    #[serde(default = "default_legacy_path")]
    pub legacy_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    /// Log file. Empty logs to stderr when stderr is redirected; on a
    /// terminal the dashboard would overwrite it, so the default file is used.
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

fn default_ws_url() -> String {
    "wss://api.tzkt.io/v1/ws".to_string()
}
fn default_keepalive_secs() -> u64 {
    15
}
fn default_history_capacity() -> usize {
    DEFAULT_CAPACITY
}
fn default_true() -> bool {
    true
}
fn default_log_path() -> PathBuf {
    PathBuf::from("off_votes.jsonl")
}
fn default_legacy_path() -> PathBuf {
    PathBuf::from("off_votes.json")
}
fn default_log_level() -> String {
    "info".to_string()
}
pub(crate) fn default_log_file() -> PathBuf {
    PathBuf::from("lbwatch.log")
}

impl Default for TzktConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            keepalive_secs: default_keepalive_secs(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            mode: DisplayMode::default(),
            history_capacity: default_history_capacity(),
        }
    }
}

impl Default for VoteLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_log_path(),
            legacy_path: default_legacy_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file: default_log_file(),
        }
    }
}

fn env_truthy(value: &str) -> bool {
    !matches!(value.trim().to_ascii_lowercase().as_str(), "" | "0" | "false" | "no" | "off")
}

impl Config {
    /// Load config from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides (no file needed).
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(url) = var("LBWATCH_WS_URL") {
            self.tzkt.ws_url = url;
        }
        if let Some(mode) = var("LBWATCH_DISPLAY_MODE") {
            self.display.mode = mode.parse().map_err(|reason| ConfigError::Invalid {
                field: "display.mode",
                reason,
            })?;
        }
        if let Some(export) = var("LBWATCH_EXPORT") {
            self.vote_log.enabled = env_truthy(&export);
        }
        if let Some(path) = var("LBWATCH_LOG_PATH") {
            self.vote_log.path = PathBuf::from(path);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.tzkt.ws_url).map_err(|e| ConfigError::Invalid {
            field: "tzkt.ws_url",
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConfigError::Invalid {
                field: "tzkt.ws_url",
                reason: format!("expected ws:// or wss://, got {}://", url.scheme()),
            });
        }
        if self.display.history_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "display.history_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.vote_log.enabled && self.vote_log.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "vote_log.path",
                reason: "must not be empty while the vote log is enabled".to_string(),
            });
        }
        Ok(())
    }

    pub fn keepalive(&self) -> Option<Duration> {
        match self.tzkt.keepalive_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn legacy_log_path(&self) -> Option<&Path> {
        let path = self.vote_log.legacy_path.as_path();
        (!path.as_os_str().is_empty()).then_some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.tzkt.ws_url, "wss://api.tzkt.io/v1/ws");
        assert_eq!(config.display.mode, DisplayMode::All);
        assert_eq!(config.display.history_capacity, 10);
        assert!(config.vote_log.enabled);
        assert_eq!(config.keepalive(), Some(Duration::from_secs(15)));
        assert_eq!(config.legacy_log_path(), Some(Path::new("off_votes.json")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_file() {
        let config: Config = toml::from_str(
            r#"
            [tzkt]
            ws_url = "ws://localhost:5000/v1/ws"
            keepalive_secs = 0

            [display]
            mode = "OFF_ONLY"

            [vote_log]
            enabled = false
            legacy_path = ""
            "#,
        )
        .unwrap();
        assert_eq!(config.display.mode, DisplayMode::OffOnly);
        assert_eq!(config.keepalive(), None);
        assert!(!config.vote_log.enabled);
        assert_eq!(config.legacy_log_path(), None);
    }

    #[test]
    fn test_bad_mode_rejected() {
        assert!(toml::from_str::<Config>("[display]\nmode = \"SOME\"").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("LBWATCH_DISPLAY_MODE", "on_off"),
            ("LBWATCH_EXPORT", "false"),
            ("LBWATCH_LOG_PATH", "/tmp/votes.jsonl"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.display.mode, DisplayMode::OnOff);
        assert!(!config.vote_log.enabled);
        assert_eq!(config.vote_log.path, PathBuf::from("/tmp/votes.jsonl"));
    }

    #[test]
    fn test_validate_rejects_http_url() {
        let mut config = Config::default();
        config.tzkt.ws_url = "https://api.tzkt.io/v1/ws".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "tzkt.ws_url", .. })
        ));
    }
}
