//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! The game API token is referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;

use crate::strategy::sleep::SleepConfig;
use crate::strategy::{ActionsConfig, EngineConfig};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub sleep: SleepConfig,
    #[serde(default)]
    pub actions: ActionsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    pub name: String,
    /// Coins always kept in the balance.
    #[serde(default)]
    pub min_balance: f64,
    /// Pause between cycles that ended in an action.
    #[serde(default = "default_action_pause_secs")]
    pub action_pause_secs: u64,
    /// Decide and log, but never send commands.
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub token_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_action_pause_secs() -> u64 {
    2
}

fn default_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// The game API bearer token.
    pub fn api_token(&self) -> Result<SecretString> {
        Self::resolve_env(&self.api.token_env).map(SecretString::new)
    }
}

impl From<&AppConfig> for EngineConfig {
    fn from(cfg: &AppConfig) -> Self {
        EngineConfig {
            min_balance: cfg.agent.min_balance,
            sleep: cfg.sleep.clone(),
            actions: cfg.actions.clone(),
        }
    }
}
