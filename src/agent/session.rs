//! Chat session - transcript plus the Idle/AwaitingResponse state machine
//!
//! ```text
//!            submit (non-blank)
//!   Idle ─────────────────────────→ AwaitingResponse
//!    ↑                                     │
//!    └──────── agent call settles ─────────┘
//!          (reply, fallback or error)
//! ```
//!
//! Submits made while a response is pending are rejected, never queued.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::client::{AgentClient, AgentError, ContextMessage, ConversationContext, ModelTier, Role};
use super::parser::{ParsedDirective, ResponseParser};
use crate::gemini::{GeminiClient, ModelBackend};
use crate::logging::{LogLevel, LogSink};
use crate::metrics::{CHAT_TURNS, SUBMITS_REJECTED};

/// Log source used for every entry the session records
pub const LOG_SOURCE: &str = "CHAT";

/// Opening agent turn shown when a console session starts
pub const GREETING: &str = "Nexus Online. I am capable of advanced web development and system administration. How can I assist you?";

/// Characters of the user input included in the "query sent" log entry
const QUERY_PREVIEW_CHARS: usize = 50;

/// Whether the session can accept a new submit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    AwaitingResponse,
}

/// One immutable entry of the transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub id: String,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Result of a submit that was accepted or ignored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The input was blank; nothing happened
    Ignored,
    /// The agent turn appended to the transcript and what the parser found in it
    Replied {
        reply: ChatTurn,
        directive: ParsedDirective,
    },
}

/// Error type for session operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A response is still pending
    Busy,
    /// The agent client refused the call (e.g. missing API key)
    Agent(AgentError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Busy => write!(f, "Agent response still pending"),
            SessionError::Agent(e) => write!(f, "Agent error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<AgentError> for SessionError {
    fn from(e: AgentError) -> Self {
        SessionError::Agent(e)
    }
}

struct SessionInner {
    state: SessionState,
    tier: ModelTier,
    transcript: Vec<ChatTurn>,
}

/// Conversation with the Nexus agent
///
/// The transcript is append-only and is the only source of the context sent
/// with each call; the agent client keeps nothing between calls.
pub struct ChatSession<B = GeminiClient> {
    id: String,
    agent: AgentClient<B>,
    parser: ResponseParser,
    log: LogSink,
    inner: Mutex<SessionInner>,
}

impl<B: ModelBackend> ChatSession<B> {
    /// Create an idle session with an empty transcript
    ///
    /// # Arguments
    /// * `agent` - Client used for every send
    /// * `parser` - Parser (with its consumers) run over every agent turn
    /// * `log` - System log handle
    /// * `tier` - Model tier used until changed with [`ChatSession::set_tier`]
    pub fn new(agent: AgentClient<B>, parser: ResponseParser, log: LogSink, tier: ModelTier) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            agent,
            parser,
            log,
            inner: Mutex::new(SessionInner {
                state: SessionState::Idle,
                tier,
                transcript: Vec::new(),
            }),
        }
    }

    /// Seed the transcript with the [`GREETING`] agent turn
    pub fn with_greeting(self) -> Self {
        self.lock().transcript.push(ChatTurn::new(Role::Agent, GREETING));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn tier(&self) -> ModelTier {
        self.lock().tier
    }

    /// Remote model identifier for the current tier
    pub fn model_id(&self) -> &str {
        self.agent.model_id(self.tier())
    }

    /// Switch the model tier used by subsequent sends
    pub fn set_tier(&self, tier: ModelTier) {
        self.lock().tier = tier;
        self.log.log(
            format!("Model switched to {} ({})", tier.label(), self.agent.model_id(tier)),
            LogLevel::Info,
            LOG_SOURCE,
        );
    }

    /// Copy of the transcript, oldest first
    pub fn transcript(&self) -> Vec<ChatTurn> {
        self.lock().transcript.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().transcript.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Conversation context derived from the whole transcript
    pub fn context(&self) -> ConversationContext {
        to_context(&self.lock().transcript)
    }

    /// Submit user input and wait for the agent's reply
    ///
    /// The user turn is appended immediately. The context sent along is the
    /// transcript as it was before this turn; the input itself travels as the
    /// request message. When the call settles the session returns to `Idle`,
    /// the agent turn (real reply or fallback text) is appended and the
    /// parser runs over it.
    ///
    /// # Returns
    /// * `Ok(SubmitOutcome::Ignored)` for blank input
    /// * `Err(SessionError::Busy)` while another submit is pending
    /// * `Err(SessionError::Agent(_))` if the client refused the call; no
    ///   agent turn is appended in that case
    pub async fn submit(&self, input: &str) -> Result<SubmitOutcome, SessionError> {
        if input.trim().is_empty() {
            return Ok(SubmitOutcome::Ignored);
        }

        let accepted = {
            let mut inner = self.lock();
            if inner.state == SessionState::Idle {
                inner.state = SessionState::AwaitingResponse;
                let context = to_context(&inner.transcript);
                inner.transcript.push(ChatTurn::new(Role::User, input));
                Some((context, inner.tier))
            } else {
                None
            }
        };

        let Some((context, tier)) = accepted else {
            SUBMITS_REJECTED.inc();
            self.log.log(
                "Submit rejected: agent response pending",
                LogLevel::Warn,
                LOG_SOURCE,
            );
            return Err(SessionError::Busy);
        };

        CHAT_TURNS.with_label_values(&["user"]).inc();
        self.log.log(
            format!("User query sent: {}...", preview(input, QUERY_PREVIEW_CHARS)),
            LogLevel::Info,
            LOG_SOURCE,
        );

        // Returns the session to Idle even if this future is dropped mid-call
        let pending = PendingGuard { inner: &self.inner };
        let result = self.agent.generate(input, &context, tier).await;

        match result {
            Ok(text) => {
                let reply = ChatTurn::new(Role::Agent, text);
                {
                    let mut inner = self.lock();
                    inner.transcript.push(reply.clone());
                    inner.state = SessionState::Idle;
                }
                drop(pending);
                CHAT_TURNS.with_label_values(&["agent"]).inc();

                let directive = self.parser.parse(&reply.text);
                Ok(SubmitOutcome::Replied { reply, directive })
            }
            Err(e) => {
                drop(pending);
                self.log.log(
                    "Failed to receive response from agent",
                    LogLevel::Error,
                    LOG_SOURCE,
                );
                Err(SessionError::Agent(e))
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        lock(&self.inner)
    }
}

/// Puts the session back to `Idle` when dropped
struct PendingGuard<'a> {
    inner: &'a Mutex<SessionInner>,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.inner).state = SessionState::Idle;
    }
}

fn lock(inner: &Mutex<SessionInner>) -> MutexGuard<'_, SessionInner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn to_context(transcript: &[ChatTurn]) -> ConversationContext {
    transcript
        .iter()
        .map(|turn| ContextMessage {
            role: turn.role,
            text: turn.text.clone(),
        })
        .collect()
}

/// First `max_chars` characters of `s`
fn preview(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
