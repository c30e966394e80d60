use bikeshare_schema::Variant;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Server settings, read from a TOML file and overridable from the command line.
///
/// ```toml
/// bind = "0.0.0.0"
/// port = 8080
/// variant = "validated-hash"
/// data_dir = "/var/lib/bikeshare"
/// workers = 8
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Absent keeps all data in memory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_variant")]
    pub variant: Variant,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            data_dir: None,
            variant: default_variant(),
            workers: default_workers(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    8080
}

fn default_variant() -> Variant {
    Variant::Document
}

fn default_workers() -> usize {
    4
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind.trim().is_empty() {
            return Err(ConfigError::Invalid("bind address must not be empty".to_owned()));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".to_owned()));
        }
        Ok(())
    }
}

pub fn parse_config_str(input: &str) -> Result<ServerConfig, ConfigError> {
    let config: ServerConfig = toml::from_str(input)?;
    config.validate()?;
    Ok(config)
}

pub fn load_config_file(path: impl AsRef<Path>) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config_str(&content)
}
