use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::llm::tokens::{CacheBilling, ModelPricing};

pub const DEFAULT_MAX_ITERATIONS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Missing configuration: {0}")]
    MissingConfig(String),
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Settings for one agent's tool loop.
///
/// ```toml
/// max_iterations = 5
/// stream = true
/// stop = ["Observation:"]
///
/// [pricing]
/// input_per_million = 3.0
/// output_per_million = 15.0
/// currency = "USD"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Upper bound on model rounds per run.
    pub max_iterations: usize,
    /// Ask providers for streamed responses.
    pub stream: bool,
    pub stop: Vec<String>,
    /// Dispatch the tool calls of one round concurrently. Results are still
    /// recorded in the order the model emitted the calls.
    pub parallel_tool_calls: bool,
    pub cache_billing: CacheBilling,
    pub pricing: ModelPricing,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            stream: true,
            stop: Vec::new(),
            parallel_tool_calls: false,
            cache_billing: CacheBilling::default(),
            pricing: ModelPricing::default(),
        }
    }
}

impl AgentConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: AgentConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidConfig("max_iterations must be at least 1".into()));
        }
        let billing = &self.cache_billing;
        if billing.write_multiplier < 0.0 || billing.read_multiplier < 0.0 {
            return Err(ConfigError::InvalidConfig("cache billing multipliers must not be negative".into()));
        }
        if self.pricing.currency.trim().is_empty() {
            return Err(ConfigError::MissingConfig("pricing.currency".into()));
        }
        Ok(())
    }
}

/// Read a required environment variable.
pub(crate) fn env_var(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingConfig(name.to_string()))
}
