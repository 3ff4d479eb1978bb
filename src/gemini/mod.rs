//! Gemini text generation integration
//!
//! This module provides the HTTP transport used by the agent client:
//! a single `generateContent` round trip per call, no streaming.

pub mod client;

// Re-export so callers can `use crate::gemini::GeminiClient`
pub use client::{
    BackendError, Content, GenerateContentResponse, GenerateRequest, GeminiClient, ModelBackend,
    Part, DEFAULT_BASE_URL,
};
