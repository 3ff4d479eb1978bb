//! Agent module for the Nexus chat console
//!
//! This module ties the generation call to the conversation:
//!
//! ```text
//! User input → ChatSession (Idle → AwaitingResponse)
//!                  ↓ transcript → ConversationContext
//!             AgentClient → ModelBackend (one round trip)
//!                  ↓ reply text or fallback
//!             ChatSession (→ Idle), agent turn appended
//!                  ↓
//!             ResponseParser → markup consumer / command consumer
//! ```

pub mod client;
pub mod parser;
pub mod session;

pub use client::{
    AgentClient, AgentError, ContextMessage, ConversationContext, ModelTier, ParseTierError, Role,
    DEFAULT_SYSTEM_INSTRUCTION, FALLBACK_REPLY,
};
pub use parser::{extract_directives, ParsedDirective, ResponseParser};
pub use session::{ChatSession, ChatTurn, SessionError, SessionState, SubmitOutcome, GREETING};
