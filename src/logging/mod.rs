//! System log for the Nexus console
//!
//! Every component records its diagnostic events into one shared [`LogSink`].
//! The sink is created once at startup and a handle is passed to whoever
//! needs it; there is no module-level instance.
//!
//! ```text
//! AgentClient ─┐
//! ResponseParser ─┼─→ LogSink (ring buffer, 1000 entries) ─→ subscribers (views)
//! ChatSession ─┘                    │
//!                                   └─→ tracing events
//! ```

pub mod sink;

pub use sink::{LogEntry, LogLevel, LogSink, Subscription, DEFAULT_LOG_CAPACITY};
