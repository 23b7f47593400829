//! Configuration management for naivechain

use crate::blockchain::{ValidationPolicy, PROOF_OF_WORK_DIFFICULTY};
use crate::error::ChainError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub miner: MinerConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NetworkConfig {
    #[serde(default = "default_network_id")]
    pub network_id: String,
    /// Buffered messages per topic before slow readers start lagging.
    #[serde(default = "default_topic_capacity")]
    pub topic_capacity: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            network_id: default_network_id(),
            topic_capacity: default_topic_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MinerConfig {
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,
    #[serde(default)]
    pub enabled: bool,
    /// PKCS#8 PEM signing key; generated on first start when missing.
    #[serde(default)]
    pub key_path: Option<String>,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            enabled: false,
            key_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ValidationConfig {
    /// Require proof-of-work on every block during chain validation, not only when mining.
    #[serde(default = "default_enforce_pow")]
    pub enforce_pow: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enforce_pow: default_enforce_pow(),
        }
    }
}

impl Config {
    pub fn validation_policy(&self) -> ValidationPolicy {
        if self.validation.enforce_pow {
            ValidationPolicy::with_difficulty(self.miner.difficulty)
        } else {
            ValidationPolicy::linkage_only()
        }
    }

    fn check(&self) -> Result<(), ChainError> {
        if self.miner.difficulty > 256 {
            return Err(ChainError::Config(format!(
                "miner.difficulty must be at most 256, got {}",
                self.miner.difficulty
            )));
        }
        if self.network.topic_capacity == 0 {
            return Err(ChainError::Config(
                "network.topic_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parses a TOML document, filling in defaults for missing values.
pub fn parse_config(config_str: &str) -> Result<Config, ChainError> {
    let config: Config = toml::from_str(config_str)?;
    config.check()?;
    Ok(config)
}

/// Loads `path`, or the defaults when the file does not exist.
pub fn load_config_from(path: &Path) -> Result<Config, ChainError> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let config_str = fs::read_to_string(path)?;
    parse_config(&config_str)
}

pub fn load_config() -> Result<Config, ChainError> {
    load_config_from(Path::new(DEFAULT_CONFIG_PATH))
}

fn default_network_id() -> String {
    "devnet".to_string()
}

fn default_topic_capacity() -> usize {
    64
}

fn default_difficulty() -> u32 {
    PROOF_OF_WORK_DIFFICULTY
}

fn default_enforce_pow() -> bool {
    true
}
