//! Node configuration, read from a TOML file

use serde::Deserialize;
use thiserror::Error;

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use crate::blockchain::chain::{DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD, MAX_DIFFICULTY};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "POWLEDGER_CONFIG";

/// File read when the environment variable is unset
pub const DEFAULT_CONFIG_PATH: &str = "powledger.toml";

/// Errors that can occur while loading the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub mining: MiningConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_difficulty")]
    pub difficulty: usize,
    #[serde(default = "default_mining_reward")]
    pub mining_reward: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MiningConfig {
    /// Upper bound for one mining request before it is cancelled
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            mining_reward: default_mining_reward(),
        }
    }
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl MiningConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_difficulty() -> usize {
    DEFAULT_DIFFICULTY
}

fn default_mining_reward() -> i64 {
    DEFAULT_MINING_REWARD
}

fn default_timeout_secs() -> u64 {
    60
}

impl Config {
    /// Parses and validates a configuration document
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration from `path`, falling back to defaults when
    /// the file does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match fs::read_to_string(path.as_ref()) {
            Ok(source) => Self::from_toml(&source),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Loads the file named by `POWLEDGER_CONFIG`, or `powledger.toml`
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(path)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::Invalid(format!(
                "ledger.difficulty must be at most {}",
                MAX_DIFFICULTY
            )));
        }

        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be set".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.ledger.difficulty, 2);
        assert_eq!(config.ledger.mining_reward, 100);
        assert_eq!(config.mining.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_toml(
            r#"
            [ledger]
            difficulty = 4

            [mining]
            timeout_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.ledger.difficulty, 4);
        assert_eq!(config.ledger.mining_reward, 100);
        assert_eq!(config.mining.timeout_secs, 5);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_validation() {
        let result = Config::from_toml("[ledger]\ndifficulty = 65\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = Config::from_toml("[server]\nport = 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = Config::from_toml("[ledger]\ndifficulty = \"hard\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load("does/not/exist/powledger.toml").unwrap();
        assert_eq!(config.ledger.difficulty, DEFAULT_DIFFICULTY);
    }
}
