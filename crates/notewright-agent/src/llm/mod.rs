//! Completion-service abstraction and HTTP client.
//!
//! The core talks to the model through [`CompletionService`]: submit the
//! conversation plus tool schemas, get back text and/or tool invocations.
//! [`LlmClient`] is the production implementation against the Claude
//! native `/v1/messages` API; tests substitute scripted services.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::AgentError;
use crate::types::{AgentConfig, ChatMessage, ToolCall, ToolDefinition};

mod claude;


/// Black-box capability: one conversation in, one structured reply out.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ChatCompletionResponse, AgentError>;
}

/// HTTP client for the Claude messages API.
pub struct LlmClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    temperature: Option<f64>,
}

impl LlmClient {
    /// Build a client from configuration. Fails with
    /// `ConfigurationMissing` before any request when no credential is
    /// set, so configuration errors surface ahead of the first round.
    pub fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        if config.api_key.trim().is_empty() {
            return Err(AgentError::ConfigurationMissing);
        }
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| AgentError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl CompletionService for LlmClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ChatCompletionResponse, AgentError> {
        self.claude_completion(messages, tools).await
    }
}

// ─── Response types ─────────────────────────────────────────────────────────
// id/model/usage are carried for logging and API completeness.

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub role: String,
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl ChatCompletionResponse {
    /// Convenience used by the loop and rewriter: the single choice.
    pub fn into_choice(self) -> Result<Choice, AgentError> {
        self.choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Transport("no choices in completion response".to_string()))
    }
}
