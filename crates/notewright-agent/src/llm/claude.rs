//! Claude native messages API: conversion, request, response parsing.

use serde_json::{json, Value};

use crate::error::AgentError;
use crate::types::{ChatMessage, FunctionCall, ToolCall, ToolDefinition};

use super::{ChatCompletionResponse, Choice, ChoiceMessage, LlmClient, Usage};

const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Server-side web fetch is still a beta capability.
const WEB_FETCH_BETA: &str = "web-fetch-2025-09-10";

impl LlmClient {
    pub(super) async fn claude_completion(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ChatCompletionResponse, AgentError> {
        let url = format!("{}/v1/messages", self.api_base.trim_end_matches("/v1"));

        let (system_prompt, claude_messages) = convert_messages_for_claude(messages);

        let mut body = json!({
            "model": self.model,
            "max_tokens": 8192,
            "messages": claude_messages,
        });
        if let Some(system) = &system_prompt {
            body["system"] = json!(system);
        }
        if let Some(temp) = self.temperature {
            body["temperature"] = json!(temp);
        }
        let mut needs_fetch_beta = false;
        if let Some(tools) = tools {
            if !tools.is_empty() {
                let claude_tools: Vec<Value> =
                    tools.iter().map(|t| t.to_claude_format()).collect();
                body["tools"] = json!(claude_tools);
                needs_fetch_beta = tools
                    .iter()
                    .any(|t| t.tool_type.starts_with("web_fetch"));
            }
        }

        let mut request = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json");
        if needs_fetch_beta {
            request = request.header("anthropic-beta", WEB_FETCH_BETA);
        }

        let resp = request
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::Transport(format!("Claude API request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(AgentError::Transport(format!(
                "Claude API error ({status}): {body_text}"
            )));
        }

        let response: Value = resp
            .json()
            .await
            .map_err(|e| AgentError::Transport(format!("failed to parse Claude response: {e}")))?;
        Ok(convert_claude_response(response, &self.model))
    }
}

/// Convert the internal conversation into `(system, messages)` for the
/// Claude wire format. Consecutive tool-result turns are batched into a
/// single `user` message of `tool_result` blocks, which is how one round's
/// results become one user turn on the wire.
pub(super) fn convert_messages_for_claude(
    messages: &[ChatMessage],
) -> (Option<String>, Vec<Value>) {
    let mut system_prompt: Option<String> = None;
    let mut claude_messages: Vec<Value> = Vec::new();
    let mut pending_tool_results: Vec<Value> = Vec::new();

    for msg in messages {
        // Flush pending tool results before any non-tool message
        if msg.role != "tool" && !pending_tool_results.is_empty() {
            claude_messages.push(json!({
                "role": "user",
                "content": pending_tool_results.clone(),
            }));
            pending_tool_results.clear();
        }

        match msg.role.as_str() {
            "system" => {
                if let Some(content) = &msg.content {
                    system_prompt = Some(match system_prompt {
                        Some(existing) => format!("{existing}\n\n{content}"),
                        None => content.clone(),
                    });
                }
            }
            "user" => {
                claude_messages.push(json!({
                    "role": "user",
                    "content": msg.content.as_deref().unwrap_or(""),
                }));
            }
            "assistant" => {
                let mut blocks: Vec<Value> = Vec::new();
                if let Some(text) = &msg.content {
                    if !text.is_empty() {
                        blocks.push(json!({"type": "text", "text": text}));
                    }
                }
                if let Some(tool_calls) = &msg.tool_calls {
                    for tc in tool_calls {
                        let input: Value =
                            serde_json::from_str(&tc.function.arguments).unwrap_or(json!({}));
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": tc.id,
                            "name": tc.function.name,
                            "input": input,
                        }));
                    }
                }
                if !blocks.is_empty() {
                    claude_messages.push(json!({"role": "assistant", "content": blocks}));
                }
            }
            "tool" => {
                let tool_call_id = msg.tool_call_id.as_deref().unwrap_or("");
                pending_tool_results.push(json!({
                    "type": "tool_result",
                    "tool_use_id": tool_call_id,
                    "content": msg.content.as_deref().unwrap_or(""),
                }));
            }
            _ => {}
        }
    }

    if !pending_tool_results.is_empty() {
        claude_messages.push(json!({
            "role": "user",
            "content": pending_tool_results,
        }));
    }

    (system_prompt, claude_messages)
}

/// Parse `tool_use` blocks out of a Claude content array.
pub(super) fn parse_claude_tool_calls(content_blocks: &[Value]) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    for block in content_blocks {
        if block.get("type").and_then(|v| v.as_str()) == Some("tool_use") {
            let id = block
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let name = block
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let input = block.get("input").cloned().unwrap_or(json!({}));
            let arguments = serde_json::to_string(&input).unwrap_or_else(|_| "{}".to_string());
            calls.push(ToolCall {
                id,
                call_type: "function".to_string(),
                function: FunctionCall { name, arguments },
            });
        }
    }
    calls
}

/// Convert a Claude response into the unified shape. Text blocks are
/// concatenated directly — no inserted separators — so prose interleaved
/// with citation fragments reads as continuous text.
pub(super) fn convert_claude_response(response: Value, model: &str) -> ChatCompletionResponse {
    let content_blocks = response
        .get("content")
        .and_then(|c| c.as_array())
        .cloned()
        .unwrap_or_default();

    let mut text_content = String::new();
    let mut tool_calls = Vec::new();

    for block in &content_blocks {
        match block.get("type").and_then(|t| t.as_str()) {
            Some("text") => {
                if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                    text_content.push_str(text);
                }
            }
            Some("tool_use") => {
                tool_calls.extend(parse_claude_tool_calls(std::slice::from_ref(block)));
            }
            _ => {}
        }
    }

    let finish_reason = response
        .get("stop_reason")
        .and_then(|s| s.as_str())
        .map(|s| match s {
            "end_turn" => "stop",
            "tool_use" => "tool_calls",
            other => other,
        })
        .map(String::from);

    let usage = response.get("usage").and_then(|u| {
        Some(Usage {
            prompt_tokens: u.get("input_tokens")?.as_u64()?,
            completion_tokens: u.get("output_tokens")?.as_u64()?,
        })
    });

    ChatCompletionResponse {
        id: response
            .get("id")
            .and_then(|i| i.as_str())
            .unwrap_or("")
            .to_string(),
        model: model.to_string(),
        choices: vec![Choice {
            message: ChoiceMessage {
                role: "assistant".to_string(),
                content: if text_content.is_empty() {
                    None
                } else {
                    Some(text_content)
                },
                tool_calls: if tool_calls.is_empty() {
                    None
                } else {
                    Some(tool_calls)
                },
            },
            finish_reason,
        }],
        usage,
    }
}
