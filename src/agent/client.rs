//! Agent Client - one best-effort generation call per prompt
//!
//! Transport failures never reach the caller: they are logged and replaced
//! by [`FALLBACK_REPLY`]. Only a missing credential (or a blank prompt) is
//! raised as an error.

use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::config::NexusConfig;
use crate::gemini::{BackendError, Content, GeminiClient, GenerateRequest, ModelBackend};
use crate::logging::{LogLevel, LogSink};
use crate::metrics::{AGENT_REQUESTS, AGENT_REQUEST_DURATION};

/// Log source used for every entry this client records
pub const LOG_SOURCE: &str = "GEMINI";

/// Reply handed back whenever the remote call fails
pub const FALLBACK_REPLY: &str =
    "Error: Unable to connect to Nexus Core. Check API Key or Network.";

/// Default system instruction for the Nexus agent
///
/// Documents the two output channels the response parser understands.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = r#"You are Nexus, a super-advanced AI agent.
You have access to a simulated environment with:
1. A Web Development Workspace (You can write HTML/CSS/JS).
2. A Terminal (You can suggest bash commands).

FORMATTING RULES:
- If you write code for the web workspace, wrap it in ```html``` (include CSS/JS in the HTML for simplicity).
- If you suggest a terminal command to run, wrap it in ```bash```.
- Be concise, technical, and professional.
- Analyze the user's request and determine the best tool to use."#;

/// Which of the two configured models to call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// Low-latency model ("Flash")
    Fast,
    /// Higher-quality model ("Pro"), the client's default
    #[default]
    Advanced,
}

impl ModelTier {
    pub fn label(&self) -> &'static str {
        match self {
            ModelTier::Fast => "Flash",
            ModelTier::Advanced => "Pro",
        }
    }
}

impl FromStr for ModelTier {
    type Err = ParseTierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" | "flash" => Ok(ModelTier::Fast),
            "advanced" | "pro" => Ok(ModelTier::Advanced),
            _ => Err(ParseTierError(s.to_string())),
        }
    }
}

/// Error returned when a string names no model tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTierError(pub String);

impl std::fmt::Display for ParseTierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown model tier: {:?} (expected fast|flash|advanced|pro)", self.0)
    }
}

impl std::error::Error for ParseTierError {}

/// Author of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

impl Role {
    /// Role name on the wire ("user" / "model")
    pub fn wire_name(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "model",
        }
    }
}

/// One prior turn passed as history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub role: Role,
    pub text: String,
}

impl ContextMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            text: text.into(),
        }
    }

    fn to_content(&self) -> Content {
        match self.role {
            Role::User => Content::user(self.text.clone()),
            Role::Agent => Content::model(self.text.clone()),
        }
    }
}

/// Ordered history rebuilt from the transcript on every send
pub type ConversationContext = Vec<ContextMessage>;

/// Error type for agent client operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// The client is not configured to reach the service (missing API key)
    Configuration(String),
    /// The prompt was empty or whitespace only
    EmptyPrompt,
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            AgentError::EmptyPrompt => write!(f, "Prompt must not be empty"),
        }
    }
}

impl std::error::Error for AgentError {}

/// Stateless wrapper around a single remote generation call
pub struct AgentClient<B = GeminiClient> {
    backend: B,
    api_key: Option<String>,
    fast_model: String,
    advanced_model: String,
    system_instruction: String,
    log: LogSink,
}

impl AgentClient<GeminiClient> {
    /// Create a client talking to the configured Gemini endpoint
    pub fn from_config(config: &NexusConfig, log: LogSink) -> Self {
        Self::with_backend(GeminiClient::new(config.base_url.clone()), config, log)
    }
}

impl<B: ModelBackend> AgentClient<B> {
    /// Create a client over an arbitrary backend
    ///
    /// # Arguments
    /// * `backend` - Transport performing the round trip
    /// * `config` - Supplies the credential, model names and system instruction
    /// * `log` - System log handle
    pub fn with_backend(backend: B, config: &NexusConfig, log: LogSink) -> Self {
        Self {
            backend,
            api_key: config.api_key.clone(),
            fast_model: config.fast_model.clone(),
            advanced_model: config.advanced_model.clone(),
            system_instruction: config
                .system_instruction
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.to_string()),
            log,
        }
    }

    /// Remote model identifier for a tier
    pub fn model_id(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Fast => &self.fast_model,
            ModelTier::Advanced => &self.advanced_model,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Generate a reply to `prompt` given the prior conversation
    ///
    /// # Returns
    /// The model's text verbatim, or [`FALLBACK_REPLY`] if the remote call
    /// failed for any reason. `Err` is only returned for a blank prompt or a
    /// missing API key, in both cases before any network I/O.
    pub async fn generate(
        &self,
        prompt: &str,
        history: &[ContextMessage],
        tier: ModelTier,
    ) -> Result<String, AgentError> {
        if prompt.trim().is_empty() {
            return Err(AgentError::EmptyPrompt);
        }

        let model = self.model_id(tier).to_string();
        let request_id = Uuid::now_v7().to_string();
        let span = info_span!(
            "agent_generate",
            request_id = %request_id,
            model = %model,
            history_len = history.len(),
            otel.name = "agent_generate"
        );

        async {
            let api_key = match &self.api_key {
                Some(key) => key.clone(),
                None => {
                    self.log.log("API key missing", LogLevel::Error, LOG_SOURCE);
                    AGENT_REQUESTS
                        .with_label_values(&[&model, "config_error"])
                        .inc();
                    return Err(AgentError::Configuration("API key not found".to_string()));
                }
            };

            self.log.log(
                format!("Generating response with model: {}", model),
                LogLevel::Info,
                LOG_SOURCE,
            );

            let request = GenerateRequest {
                api_key,
                model: model.clone(),
                system_instruction: self.system_instruction.clone(),
                history: history.iter().map(ContextMessage::to_content).collect(),
                message: prompt.to_string(),
            };

            let call_start = Instant::now();
            let result = self
                .backend
                .generate(&request)
                .await
                .and_then(|text| {
                    if text.is_empty() {
                        Err(BackendError::EmptyResponse)
                    } else {
                        Ok(text)
                    }
                });
            AGENT_REQUEST_DURATION
                .with_label_values(&[&model])
                .observe(call_start.elapsed().as_secs_f64());

            match result {
                Ok(text) => {
                    self.log
                        .log("Response generated successfully", LogLevel::Info, LOG_SOURCE);
                    AGENT_REQUESTS.with_label_values(&[&model, "success"]).inc();
                    Ok(text)
                }
                Err(e) => {
                    self.log.log(
                        format!("Error generating response: {}", e),
                        LogLevel::Error,
                        LOG_SOURCE,
                    );
                    AGENT_REQUESTS.with_label_values(&[&model, "fallback"]).inc();
                    Ok(FALLBACK_REPLY.to_string())
                }
            }
        }
        .instrument(span)
        .await
    }
}
