//! Shared types for the agent core: conversation model, tool schemas,
//! configuration.

use serde::{Deserialize, Serialize};

// ─── UTF-8 safe string helpers ──────────────────────────────────────────────

/// Truncate a string at a safe UTF-8 char boundary (from the start).
/// Returns a &str of at most `max_bytes` bytes, never splitting a multi-byte
/// character.
pub fn safe_truncate(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ─── Configuration ──────────────────────────────────────────────────────────

/// Configuration for one agent run or rewrite call.
///
/// Explicit struct passed into each entry point — never ambient state.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Completion API base URL (e.g. "https://api.anthropic.com").
    pub api_base: String,
    /// API key. Checked before any service call; empty is a
    /// `ConfigurationMissing` error.
    pub api_key: String,
    /// Model name.
    pub model: String,
    /// Hard cap on agent-loop rounds.
    pub max_iterations: usize,
    /// Per-tool-result size cap before it is appended to the conversation.
    pub max_result_chars: usize,
    /// Offer the delete tool to the model. Off by default; when off the
    /// tool is absent from the registry entirely.
    pub enable_delete: bool,
    /// Offer the server-side web_search / web_fetch capabilities.
    pub enable_web_tools: bool,
    /// Sampling temperature (None = provider default).
    pub temperature: Option<f64>,
    /// System prompt override for the agent loop.
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.anthropic.com".to_string(),
            api_key: String::new(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_iterations: 50,
            max_result_chars: 12_000,
            enable_delete: false,
            enable_web_tools: true,
            temperature: None,
            system_prompt: None,
        }
    }
}

fn env_or(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .or_else(|_| std::env::var(fallback))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => !matches!(v.to_lowercase().as_str(), "0" | "false" | "no" | "off"),
        Err(_) => default,
    }
}

impl AgentConfig {
    /// Load from environment variables with sensible defaults.
    /// `NOTEWRIGHT_*` wins; `ANTHROPIC_*` is accepted for the credential
    /// and endpoint so existing shells keep working.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_base: env_or("NOTEWRIGHT_API_BASE", "ANTHROPIC_BASE_URL")
                .unwrap_or(defaults.api_base),
            api_key: env_or("NOTEWRIGHT_API_KEY", "ANTHROPIC_API_KEY").unwrap_or_default(),
            model: env_or("NOTEWRIGHT_MODEL", "ANTHROPIC_MODEL").unwrap_or(defaults.model),
            max_iterations: env_usize("NOTEWRIGHT_MAX_ITERATIONS", defaults.max_iterations),
            max_result_chars: env_usize("NOTEWRIGHT_RESULT_MAX_CHARS", defaults.max_result_chars),
            enable_delete: env_bool("NOTEWRIGHT_ALLOW_DELETE", defaults.enable_delete),
            enable_web_tools: env_bool("NOTEWRIGHT_WEB_TOOLS", defaults.enable_web_tools),
            temperature: std::env::var("NOTEWRIGHT_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse().ok()),
            system_prompt: None,
        }
    }
}

// ─── Conversation model ─────────────────────────────────────────────────────

/// One conversation turn. Internally we keep the flat role-based shape;
/// the Claude converter regroups it into content blocks at the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: "assistant".to_string(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant_with_tool_calls(content: Option<&str>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.map(|s| s.to_string()),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: &str, content: &str) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.to_string()),
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Opaque correlation id; binds the eventual result to this call.
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON argument string; validated per-operation at dispatch.
    pub arguments: String,
}

/// Declared schema for one tool offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// "function" for locally dispatched tools; a provider server-tool
    /// type string (e.g. "web_search_20250305") for capabilities the
    /// completion service executes itself.
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    pub fn function(name: &str, description: &str, parameters: serde_json::Value) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDef {
                name: name.to_string(),
                description: description.to_string(),
                parameters,
            },
        }
    }

    /// A capability the completion service executes server-side. The loop
    /// never dispatches these; their results come back folded into
    /// assistant text.
    pub fn server_tool(server_type: &str, name: &str) -> Self {
        Self {
            tool_type: server_type.to_string(),
            function: FunctionDef {
                name: name.to_string(),
                description: String::new(),
                parameters: serde_json::json!({}),
            },
        }
    }

    pub fn is_server_tool(&self) -> bool {
        self.tool_type != "function"
    }

    /// Convert to the Claude tools-array entry shape.
    pub fn to_claude_format(&self) -> serde_json::Value {
        if self.is_server_tool() {
            serde_json::json!({
                "type": self.tool_type,
                "name": self.function.name,
            })
        } else {
            serde_json::json!({
                "name": self.function.name,
                "description": self.function.description,
                "input_schema": self.function.parameters,
            })
        }
    }
}

/// Outcome of executing one tool invocation. Failures travel the same
/// path as successes — back to the model, never up the stack.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub content: String,
    pub is_error: bool,
}
