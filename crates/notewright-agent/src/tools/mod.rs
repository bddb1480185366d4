//! Vault tool registry and dispatch.
//!
//! Submodules:
//! - `note_ops`: the eight vault operations (read/write/create/rename/
//!   delete plus list/search/metadata) — definitions and handlers
//!
//! This module owns the per-run registry (delete gating, server-side web
//! capabilities), the dispatch layer, and argument-level error
//! containment: a malformed or unknown invocation becomes a failed
//! `ToolResult`, never a process error.

pub mod note_ops;


use notewright_vault::VaultStore;
use serde_json::Value;

use crate::types::{safe_truncate, AgentConfig, ToolDefinition, ToolResult};

/// Build the tool registry for one run. The delete entry is present only
/// when the configuration allows it — the sole run-time conditional. The
/// two web capabilities are appended when enabled; they execute inside the
/// completion service and the loop never dispatches them.
pub fn vault_tool_definitions(config: &AgentConfig) -> Vec<ToolDefinition> {
    let mut tools = note_ops::tool_definitions(config.enable_delete);
    if config.enable_web_tools {
        tools.push(ToolDefinition::server_tool("web_search_20250305", "web_search"));
        tools.push(ToolDefinition::server_tool("web_fetch_20250910", "web_fetch"));
    }
    tools
}

/// Dispatch one tool invocation against the vault.
///
/// Every failure mode — unknown name, gated delete, malformed arguments,
/// handler error — is folded into the returned `ToolResult` so the model
/// can decide how to recover. The caller fills in `tool_call_id`.
pub fn execute_vault_tool(
    tool_name: &str,
    arguments: &str,
    store: &dyn VaultStore,
    enable_delete: bool,
) -> ToolResult {
    let failure = |content: String| ToolResult {
        tool_call_id: String::new(),
        tool_name: tool_name.to_string(),
        content,
        is_error: true,
    };

    if !is_vault_tool(tool_name, enable_delete) {
        return failure(format!("Unrecognized tool: {tool_name}"));
    }

    let args = match serde_json::from_str::<Value>(arguments) {
        Ok(v) => v,
        Err(e) => {
            // Content-bearing writes can arrive with the argument JSON cut
            // off at the model's output token limit; try to salvage them.
            if matches!(tool_name, "write_note" | "create_note") {
                match recover_truncated_write_args(arguments) {
                    Some(recovered) => {
                        tracing::warn!(
                            "recovered truncated JSON arguments for {}",
                            tool_name
                        );
                        recovered
                    }
                    None => return failure(format!("Invalid arguments JSON: {e}")),
                }
            } else {
                return failure(format!("Invalid arguments JSON: {e}"));
            }
        }
    };

    let result = match tool_name {
        "read_note" => note_ops::execute_read_note(&args, store),
        "write_note" => note_ops::execute_write_note(&args, store),
        "create_note" => note_ops::execute_create_note(&args, store),
        "rename_note" => note_ops::execute_rename_note(&args, store),
        "delete_note" => note_ops::execute_delete_note(&args, store),
        "list_notes" => note_ops::execute_list_notes(&args, store),
        "search_notes" => note_ops::execute_search_notes(&args, store),
        "get_note_metadata" => note_ops::execute_get_note_metadata(&args, store),
        _ => unreachable!("is_vault_tool checked above"),
    };

    match result {
        Ok(content) => ToolResult {
            tool_call_id: String::new(),
            tool_name: tool_name.to_string(),
            content,
            is_error: false,
        },
        Err(e) => failure(format!("Error: {e}")),
    }
}

fn is_vault_tool(name: &str, enable_delete: bool) -> bool {
    match name {
        "read_note" | "write_note" | "create_note" | "rename_note" | "list_notes"
        | "search_notes" | "get_note_metadata" => true,
        "delete_note" => enable_delete,
        _ => false,
    }
}

/// Cap an oversized tool result before it joins the conversation. This is
/// the growth-bound answer for long runs: individual results are trimmed,
/// history is never summarized away.
pub fn truncate_tool_result(content: String, max_chars: usize) -> String {
    if content.len() <= max_chars {
        return content;
    }
    format!(
        "{}\n\n[Result truncated: {} chars total, showing first {}. Use a narrower query for the rest.]",
        safe_truncate(&content, max_chars),
        content.len(),
        max_chars
    )
}

// ─── Truncated JSON recovery ─────────────────────────────────────────────────

/// Best-effort recovery of `path` + `content` from argument JSON that was
/// cut off mid-string. Returns `None` when nothing usable can be pulled
/// out.
fn recover_truncated_write_args(arguments: &str) -> Option<Value> {
    if arguments.is_empty() {
        return None;
    }
    let mut result = serde_json::Map::new();

    let path_re = regex::Regex::new(r#""path"\s*:\s*"((?:[^"\\]|\\.)*)""#).ok()?;
    if let Some(caps) = path_re.captures(arguments) {
        result.insert(
            "path".to_string(),
            Value::String(unescape_json_string(caps.get(1)?.as_str())),
        );
    }

    let content_complete_re = regex::Regex::new(r#""content"\s*:\s*"((?:[^"\\]|\\.)*)""#).ok()?;
    if let Some(caps) = content_complete_re.captures(arguments) {
        result.insert(
            "content".to_string(),
            Value::String(unescape_json_string(caps.get(1)?.as_str())),
        );
    } else {
        let content_trunc_re = regex::Regex::new(r#""content"\s*:\s*"(.*)$"#).ok()?;
        if let Some(caps) = content_trunc_re.captures(arguments) {
            let mut raw = caps.get(1)?.as_str().to_string();
            if raw.ends_with("\"}") {
                raw.truncate(raw.len() - 2);
            } else if raw.ends_with('"') && !raw.ends_with("\\\"") {
                raw.truncate(raw.len() - 1);
            }
            result.insert(
                "content".to_string(),
                Value::String(unescape_json_string(&raw)),
            );
        }
    }

    if result.contains_key("path") && result.contains_key("content") {
        Some(Value::Object(result))
    } else {
        None
    }
}

fn unescape_json_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('"') => result.push('"'),
                Some('\\') => result.push('\\'),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }
    result
}
