//! Console configuration
//!
//! Built from defaults plus environment overrides. The API key is the only
//! value without a usable default; its absence only disables the agent
//! client, the rest of the console still runs.

use crate::agent::ModelTier;
use crate::gemini::DEFAULT_BASE_URL;
use crate::logging::DEFAULT_LOG_CAPACITY;

pub const DEFAULT_FAST_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_ADVANCED_MODEL: &str = "gemini-3-pro-preview";

/// Configuration for the console core
#[derive(Clone)]
pub struct NexusConfig {
    /// Credential for the generation service
    pub api_key: Option<String>,
    /// API root of the generation service
    pub base_url: String,
    /// Model used for [`ModelTier::Fast`]
    pub fast_model: String,
    /// Model used for [`ModelTier::Advanced`]
    pub advanced_model: String,
    /// Tier a new chat session starts with
    pub default_tier: ModelTier,
    /// Custom system instruction (uses the built-in one if None)
    pub system_instruction: Option<String>,
    /// Number of entries kept by the system log
    pub log_capacity: usize,
    /// OTLP collector endpoint; trace export is off when unset
    pub otlp_endpoint: Option<String>,
}

impl Default for NexusConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            fast_model: DEFAULT_FAST_MODEL.to_string(),
            advanced_model: DEFAULT_ADVANCED_MODEL.to_string(),
            default_tier: ModelTier::Fast,
            system_instruction: None,
            log_capacity: DEFAULT_LOG_CAPACITY,
            otlp_endpoint: None,
        }
    }
}

impl std::fmt::Debug for NexusConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NexusConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("fast_model", &self.fast_model)
            .field("advanced_model", &self.advanced_model)
            .field("default_tier", &self.default_tier)
            .field("system_instruction", &self.system_instruction.is_some())
            .field("log_capacity", &self.log_capacity)
            .field("otlp_endpoint", &self.otlp_endpoint)
            .finish()
    }
}

impl NexusConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        config.api_key = get("GEMINI_API_KEY").or_else(|| get("API_KEY"));

        if let Some(url) = get("NEXUS_API_BASE_URL") {
            config.base_url = url;
        }
        if let Some(model) = get("NEXUS_FAST_MODEL") {
            config.fast_model = model;
        }
        if let Some(model) = get("NEXUS_ADVANCED_MODEL") {
            config.advanced_model = model;
        }
        if let Some(tier) = get("NEXUS_MODEL_TIER") {
            config.default_tier = tier.parse().map_err(|_| ConfigError::Invalid {
                key: "NEXUS_MODEL_TIER".to_string(),
                value: tier.clone(),
            })?;
        }
        if let Some(capacity) = get("NEXUS_LOG_CAPACITY") {
            config.log_capacity = capacity
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|c| *c > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    key: "NEXUS_LOG_CAPACITY".to_string(),
                    value: capacity.clone(),
                })?;
        }
        config.otlp_endpoint = get("NEXUS_OTLP_ENDPOINT");

        Ok(config)
    }
}

/// Error type for configuration loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Invalid { key: String, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid { key, value } => {
                write!(f, "Invalid value for {}: {:?}", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
