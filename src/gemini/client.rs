//! Client for the Gemini `generateContent` REST endpoint

use std::future::Future;

use serde::{Deserialize, Serialize};

/// Default endpoint for the hosted Gemini API
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// One text fragment of a content block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: String,
}

/// A block of content with an optional author role ("user" or "model")
///
/// The system instruction is sent as a content block without a role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self::with_role("user", text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::with_role("model", text)
    }

    /// Content without a role, as used for `systemInstruction`
    pub fn instruction(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part { text: text.into() }],
        }
    }

    fn with_role(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![Part { text: text.into() }],
        }
    }
}

/// Everything needed for a single generation round trip
#[derive(Clone)]
pub struct GenerateRequest {
    pub api_key: String,
    /// Model identifier (e.g., "gemini-3-flash-preview")
    pub model: String,
    pub system_instruction: String,
    /// Prior turns, oldest first
    pub history: Vec<Content>,
    /// The new user message
    pub message: String,
}

impl std::fmt::Debug for GenerateRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerateRequest")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("history_len", &self.history.len())
            .field("message", &self.message)
            .finish()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody<'a> {
    system_instruction: Content,
    contents: Vec<&'a Content>,
}

/// Response body of `generateContent`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, or `None` if there is none
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content.parts.iter().map(|p| p.text.as_str()).collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Why the first candidate stopped (e.g. "STOP", "SAFETY", "MAX_TOKENS")
    pub fn finish_reason(&self) -> Option<&str> {
        self.candidates.first()?.finish_reason.as_deref()
    }
}

/// Error type for transport operations
#[derive(Debug)]
pub enum BackendError {
    Request(reqwest::Error),
    Status { status: u16, body: String },
    Parse(serde_json::Error),
    EmptyResponse,
    /// The model stopped without producing text (e.g. blocked for safety)
    NoText { finish_reason: String },
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::Request(e) => write!(f, "Request error: {}", e),
            BackendError::Status { status, body } => {
                write!(f, "Unexpected status {}: {}", status, body)
            }
            BackendError::Parse(e) => write!(f, "Parse error: {}", e),
            BackendError::EmptyResponse => write!(f, "Empty response from model"),
            BackendError::NoText { finish_reason } => {
                write!(f, "Model returned no text (finish reason: {})", finish_reason)
            }
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::Request(e) => Some(e),
            BackendError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        BackendError::Request(e)
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::Parse(e)
    }
}

/// A remote text generation service
///
/// The agent client is generic over this so tests can swap the HTTP
/// transport for an in-process stub.
pub trait ModelBackend: Send + Sync {
    /// Perform one request/response round trip and return the reply text
    fn generate(
        &self,
        request: &GenerateRequest,
    ) -> impl Future<Output = Result<String, BackendError>> + Send;
}

/// Client for the `generateContent` endpoint
#[derive(Clone)]
pub struct GeminiClient {
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - API root (e.g., "https://generativelanguage.googleapis.com")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one `generateContent` request
    ///
    /// The history is sent as-is followed by the new message as a user turn.
    /// The system instruction travels in its own field.
    pub async fn generate_content(
        &self,
        request: &GenerateRequest,
    ) -> Result<GenerateContentResponse, BackendError> {
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, request.model
        );

        let message = Content::user(request.message.clone());
        let mut contents: Vec<&Content> = request.history.iter().collect();
        contents.push(&message);

        let body = GenerateContentBody {
            system_instruction: Content::instruction(request.system_instruction.clone()),
            contents,
        };

        let response = self
            .client
            .post(&endpoint)
            .header("x-goog-api-key", &request.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.is_empty() {
            return Err(BackendError::EmptyResponse);
        }

        Ok(serde_json::from_str(&text)?)
    }
}

impl ModelBackend for GeminiClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, BackendError> {
        let response = self.generate_content(request).await?;
        match response.text() {
            Some(text) => Ok(text),
            None => Err(match response.finish_reason() {
                Some(reason) => BackendError::NoText {
                    finish_reason: reason.to_string(),
                },
                None => BackendError::EmptyResponse,
            }),
        }
    }
}
