//! Prometheus metrics for the agent console
//!
//! All metrics live in the default registry so `gather_text()` can render
//! them without threading a registry handle around.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec, Encoder,
    HistogramVec, TextEncoder,
};

lazy_static! {
    /// Agent generation calls by model and outcome
    /// (success, fallback, config_error)
    pub static ref AGENT_REQUESTS: CounterVec = register_counter_vec!(
        "nexus_agent_requests_total",
        "Agent generation calls by model and outcome",
        &["model", "outcome"]
    )
    .expect("nexus_agent_requests_total registers once");

    /// Round-trip time of the remote generation call
    pub static ref AGENT_REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "nexus_agent_request_duration_seconds",
        "Round-trip time of the remote generation call",
        &["model"],
        vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .expect("nexus_agent_request_duration_seconds registers once");

    /// Directives extracted from agent replies by kind (markup, command)
    pub static ref DIRECTIVES_EXTRACTED: CounterVec = register_counter_vec!(
        "nexus_directives_extracted_total",
        "Directives extracted from agent replies",
        &["kind"]
    )
    .expect("nexus_directives_extracted_total registers once");

    /// Turns appended to chat transcripts by role
    pub static ref CHAT_TURNS: CounterVec = register_counter_vec!(
        "nexus_chat_turns_total",
        "Turns appended to chat transcripts",
        &["role"]
    )
    .expect("nexus_chat_turns_total registers once");

    /// Submits rejected because a response was still pending
    pub static ref SUBMITS_REJECTED: Counter = register_counter!(
        "nexus_submits_rejected_total",
        "Submits rejected while awaiting a response"
    )
    .expect("nexus_submits_rejected_total registers once");
}

/// Render every registered metric in the Prometheus text format
pub fn gather_text() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
