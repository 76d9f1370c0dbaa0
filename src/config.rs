use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::nutrition::schedule::is_valid_time;
use crate::nutrition::SCHEDULE_TIMES;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "NUTRIWARD_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub snapshot: SnapshotConfig,
    pub requisition: RequisitionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub path: PathBuf,
    pub ttl_secs: u64,
}

impl SnapshotConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RequisitionConfig {
    /// Times offered when a request selects none explicitly
    pub schedule_times: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`
    pub filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api: ApiConfig::default(),
            snapshot: SnapshotConfig::default(),
            requisition: RequisitionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        SnapshotConfig {
            path: PathBuf::from("./data/snapshot.json"),
            ttl_secs: 300,
        }
    }
}

impl Default for RequisitionConfig {
    fn default() -> Self {
        RequisitionConfig {
            schedule_times: SCHEDULE_TIMES.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.port == 0 {
            return Err(ConfigError::Invalid("api.port must be non-zero".to_string()));
        }
        if self.snapshot.ttl_secs == 0 {
            return Err(ConfigError::Invalid("snapshot.ttl_secs must be non-zero".to_string()));
        }
        if let Some(bad) = self
            .requisition
            .schedule_times
            .iter()
            .find(|t| !is_valid_time(t))
        {
            return Err(ConfigError::Invalid(format!(
                "requisition.schedule_times: '{}' is not HH:MM",
                bad
            )));
        }
        Ok(())
    }
}

pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_yaml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Loads and validates the YAML config at `path`
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Config file location: `NUTRIWARD_CONFIG` or `config.yaml`
pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = parse_config(
            r#"
api:
  port: 8080
snapshot:
  path: /var/lib/nutriward/snapshot.json
"#,
        )
        .unwrap();

        assert_eq!(config.api.port, 8080);
        assert_eq!(config.api.host, "127.0.0.1");
        assert_eq!(config.snapshot.ttl(), Duration::from_secs(300));
        assert_eq!(config.requisition.schedule_times.len(), 8);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_rejects_bad_schedule_time() {
        let err = parse_config(
            r#"
requisition:
  schedule_times: ["06:00", "3h"]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("3h")));
    }

    #[test]
    fn test_rejects_zero_ttl() {
        assert!(parse_config("snapshot:\n  ttl_secs: 0\n").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/config.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
