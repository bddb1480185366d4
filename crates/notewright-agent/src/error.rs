//! Fatal error kinds for the caller-facing API.
//!
//! Tool-level failures (missing note, occupied path, unrecognized tool,
//! malformed arguments) never appear here: they are contained to a single
//! failed tool result inside a round and reported back to the model. What
//! remains is fatal to the current run or rewrite call, propagates to the
//! caller unmodified, and is never retried by the core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key configured. Surfaced before any service call is made.
    #[error("no API key configured (set NOTEWRIGHT_API_KEY or ANTHROPIC_API_KEY)")]
    ConfigurationMissing,

    /// The completion service was unreachable or rejected the request.
    /// Per-call timeouts surface here too (the HTTP client enforces them).
    #[error("completion service failure: {0}")]
    Transport(String),

    /// The single-note rewrite received a response with no text segments.
    #[error("completion service returned no text")]
    EmptyResponse,

    /// The model declined a single-note rewrite because the request needs
    /// vault-wide capabilities only the agent loop has.
    #[error("request requires agent mode: {0}")]
    AgentModeRequired(String),
}
