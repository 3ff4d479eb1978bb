//! Nexus - core of an agent-driven developer operations console
//!
//! The console forwards chat input to a hosted generative model and routes
//! the code it gets back: web markup to the workspace, shell commands to the
//! terminal panel. This crate holds the non-visual parts.
//!
//! # Modules
//!
//! - `logging` - Shared system log (ring buffer + subscribers)
//! - `gemini` - HTTP transport for the `generateContent` API
//! - `agent` - Agent client, response parser and chat session
//! - `config` - Defaults and environment overrides
//! - `metrics` - Prometheus metrics
//! - `tracing` - Tracing subscriber setup with optional OTLP export
//!
//! # Quick Start
//!
//! ```ignore
//! use nexus::{AgentClient, ChatSession, LogSink, NexusConfig, ResponseParser};
//!
//! let config = NexusConfig::from_env()?;
//! let log = LogSink::with_capacity(config.log_capacity);
//! let agent = AgentClient::from_config(&config, log.clone());
//! let parser = ResponseParser::new(log.clone()).on_command(|cmd| println!("$ {}", cmd));
//! let session = ChatSession::new(agent, parser, log, config.default_tier).with_greeting();
//!
//! session.submit("Create a landing page").await?;
//! ```

pub mod agent;
pub mod config;
pub mod gemini;
pub mod logging;
pub mod metrics;
pub mod tracing;

// Re-export commonly used types at crate root for convenience
pub use agent::{AgentClient, ChatSession, ModelTier, ResponseParser};
pub use config::NexusConfig;
pub use logging::{LogLevel, LogSink};
