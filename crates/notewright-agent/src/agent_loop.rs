//! Core agent loop: completion ↔ tool execution cycle.
//!
//! One round = submit the accumulated conversation plus the tool registry,
//! append the reply verbatim, dispatch any requested tool calls against
//! the vault, feed the results back, repeat. The loop is bounded by a hard
//! iteration cap and records every attempted read/write/create/rename/
//! delete in the audit log — failures included, because the caller's
//! summary must reflect what was attempted, not just what stuck.

use notewright_vault::VaultStore;

use crate::audit::{recorded_kind, AuditLog, OperationKind, OperationRecord};
use crate::error::AgentError;
use crate::llm::CompletionService;
use crate::prompt;
use crate::tools::{execute_vault_tool, truncate_tool_result, vault_tool_definitions};
use crate::types::{AgentConfig, ChatMessage};

/// The note the run was launched from, when any.
#[derive(Debug, Clone)]
pub struct NoteContext {
    pub path: String,
    pub body: String,
}

/// How a run ended. Both variants carry the full audit log back to the
/// caller; a transport failure is the only way to get nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentOutcome {
    /// The service stopped issuing tool calls or signaled natural
    /// completion.
    Completed,
    /// The iteration cap was hit; work already done is kept.
    AbortedMaxIterations,
}

#[derive(Debug)]
pub struct AgentRunResult {
    pub outcome: AgentOutcome,
    /// Every attempted primitive operation, in dispatch order.
    pub operations: Vec<OperationRecord>,
    /// Trailing assistant text from the final round, if any.
    pub final_text: Option<String>,
    pub iterations: usize,
}

/// Run the agent loop to completion, abort, or fatal error.
pub async fn run_agent_loop(
    service: &dyn CompletionService,
    store: &dyn VaultStore,
    config: &AgentConfig,
    instruction: &str,
    context: Option<&NoteContext>,
) -> Result<AgentRunResult, AgentError> {
    let tools = vault_tool_definitions(config);

    let mut messages = Vec::new();
    messages.push(ChatMessage::system(&prompt::build_agent_system_prompt(config)));
    messages.push(ChatMessage::user(&seed_user_message(instruction, context)));

    let mut audit = AuditLog::new();
    let mut final_text: Option<String> = None;
    let mut iterations = 0usize;
    let mut completed = false;

    while iterations < config.max_iterations {
        iterations += 1;

        // Transport failures are fatal: no retry, propagate as-is.
        let response = service.complete(&messages, Some(&tools)).await?;
        let choice = response.into_choice()?;
        let assistant_content = choice.message.content.clone();
        let tool_calls = choice.message.tool_calls.unwrap_or_default();
        let natural_stop = choice.finish_reason.as_deref() == Some("stop");

        // Append the assistant turn verbatim — text and tool calls
        // together, so later rounds keep the full record of what was said
        // and what was invoked.
        if tool_calls.is_empty() {
            if let Some(content) = &assistant_content {
                messages.push(ChatMessage::assistant(content));
            }
        } else {
            messages.push(ChatMessage::assistant_with_tool_calls(
                assistant_content.as_deref(),
                tool_calls.clone(),
            ));
        }

        if tool_calls.is_empty() || natural_stop {
            final_text = assistant_content;
            completed = true;
            break;
        }

        for tc in &tool_calls {
            let name = tc.function.name.as_str();
            let arguments = tc.function.arguments.as_str();

            // Audit the attempt before execution; success does not matter.
            // A delete while the capability is off is not an operation of
            // this run — it is an unrecognized tool.
            let audited = recorded_kind(name)
                .filter(|kind| *kind != OperationKind::Delete || config.enable_delete);
            if let Some(kind) = audited {
                let (path, destination) = audit_paths(arguments);
                audit.record(kind, path, destination);
            }

            let mut result = execute_vault_tool(name, arguments, store, config.enable_delete);
            result.tool_call_id = tc.id.clone();
            if result.is_error {
                tracing::warn!("tool {} failed: {}", name, result.content);
            } else {
                tracing::debug!("tool {} ok", name);
            }

            let content = truncate_tool_result(result.content, config.max_result_chars);
            messages.push(ChatMessage::tool_result(&result.tool_call_id, &content));
        }
    }

    if !completed {
        tracing::warn!(
            "agent loop aborted at max iterations ({})",
            config.max_iterations
        );
    }

    Ok(AgentRunResult {
        outcome: if completed {
            AgentOutcome::Completed
        } else {
            AgentOutcome::AbortedMaxIterations
        },
        operations: audit.into_records(),
        final_text,
        iterations,
    })
}

/// First user turn: the instruction, prefixed with the current note when
/// the run was launched from inside one.
fn seed_user_message(instruction: &str, context: Option<&NoteContext>) -> String {
    match context {
        Some(ctx) => format!(
            "Current note: {}\n\n{}\n\n---\n\n{}",
            ctx.path, ctx.body, instruction
        ),
        None => instruction.to_string(),
    }
}

/// Best-effort path extraction for the audit record. Arguments may be
/// malformed — the record is still written, with what could be salvaged.
fn audit_paths(arguments: &str) -> (String, Option<String>) {
    let parsed: serde_json::Value = serde_json::from_str(arguments).unwrap_or_default();
    let path = parsed
        .get("path")
        .and_then(|v| v.as_str())
        .unwrap_or("(unknown)")
        .to_string();
    let destination = parsed
        .get("new_path")
        .and_then(|v| v.as_str())
        .map(String::from);
    (path, destination)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use notewright_vault::{MemoryVault, VaultStore};

    use super::*;
    use crate::llm::{ChatCompletionResponse, Choice, ChoiceMessage};
    use crate::types::{FunctionCall, ToolCall, ToolDefinition};

    // ── Scripted service ────────────────────────────────────────────────

    struct ScriptedService {
        responses: Mutex<VecDeque<ChatCompletionResponse>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
        seen_tools: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedService {
        fn new(responses: Vec<ChatCompletionResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                seen: Mutex::new(Vec::new()),
                seen_tools: Mutex::new(Vec::new()),
            }
        }

        fn conversations(&self) -> Vec<Vec<ChatMessage>> {
            self.seen.lock().unwrap().clone()
        }

        fn offered_tools(&self) -> Vec<Vec<String>> {
            self.seen_tools.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionService for ScriptedService {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            tools: Option<&[ToolDefinition]>,
        ) -> Result<ChatCompletionResponse, AgentError> {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.seen_tools.lock().unwrap().push(
                tools
                    .unwrap_or_default()
                    .iter()
                    .map(|t| t.function.name.clone())
                    .collect(),
            );
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AgentError::Transport("script exhausted".to_string()))
        }
    }

    struct FailingService;

    #[async_trait]
    impl CompletionService for FailingService {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _tools: Option<&[ToolDefinition]>,
        ) -> Result<ChatCompletionResponse, AgentError> {
            Err(AgentError::Transport("connection refused".to_string()))
        }
    }

    fn response(
        content: Option<&str>,
        calls: Vec<(&str, &str, serde_json::Value)>,
        finish: &str,
    ) -> ChatCompletionResponse {
        let tool_calls: Vec<ToolCall> = calls
            .into_iter()
            .map(|(id, name, args)| ToolCall {
                id: id.to_string(),
                call_type: "function".to_string(),
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: args.to_string(),
                },
            })
            .collect();
        ChatCompletionResponse {
            id: "msg".to_string(),
            model: "scripted".to_string(),
            choices: vec![Choice {
                message: ChoiceMessage {
                    role: "assistant".to_string(),
                    content: content.map(String::from),
                    tool_calls: if tool_calls.is_empty() {
                        None
                    } else {
                        Some(tool_calls)
                    },
                },
                finish_reason: Some(finish.to_string()),
            }],
            usage: None,
        }
    }

    fn text_done(content: &str) -> ChatCompletionResponse {
        response(Some(content), vec![], "stop")
    }

    // ── Tests ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn immediate_text_reply_completes_with_no_operations() {
        let service = ScriptedService::new(vec![text_done("Nothing to do.")]);
        let vault = MemoryVault::new();
        let config = AgentConfig::default();

        let result = run_agent_loop(&service, &vault, &config, "say hi", None)
            .await
            .unwrap();
        assert_eq!(result.outcome, AgentOutcome::Completed);
        assert!(result.operations.is_empty());
        assert_eq!(result.final_text.as_deref(), Some("Nothing to do."));
        assert_eq!(result.iterations, 1);
    }

    #[tokio::test]
    async fn failed_read_then_create_recovers_and_audits_both() {
        // Round 1: read a missing note (fails, contained). Round 2: the
        // model recovers by creating it. Round 3: done.
        let service = ScriptedService::new(vec![
            response(
                None,
                vec![("call_1", "read_note", json!({"path": "missing.md"}))],
                "tool_calls",
            ),
            response(
                None,
                vec![(
                    "call_2",
                    "create_note",
                    json!({"path": "missing.md", "content": "x"}),
                )],
                "tool_calls",
            ),
            text_done("Created missing.md."),
        ]);
        let vault = MemoryVault::new();
        let config = AgentConfig::default();

        let result = run_agent_loop(&service, &vault, &config, "ensure missing.md", None)
            .await
            .unwrap();

        assert_eq!(result.outcome, AgentOutcome::Completed);
        assert_eq!(result.operations.len(), 2);
        assert_eq!(result.operations[0].kind, OperationKind::Read);
        assert_eq!(result.operations[0].path, "missing.md");
        assert_eq!(result.operations[1].kind, OperationKind::Create);
        assert_eq!(vault.read("missing.md").unwrap(), "x");

        // The failed read came back to the model as a tool result, not an
        // aborted run: round 2's conversation carries it.
        let round_two = &service.conversations()[1];
        let tool_turn = round_two
            .iter()
            .find(|m| m.role == "tool")
            .expect("tool result fed back");
        assert_eq!(tool_turn.tool_call_id.as_deref(), Some("call_1"));
        assert!(tool_turn.content.as_deref().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn exploration_tools_are_not_audited() {
        let service = ScriptedService::new(vec![
            response(
                None,
                vec![
                    ("call_1", "list_notes", json!({})),
                    ("call_2", "search_notes", json!({"query": "x"})),
                    ("call_3", "read_note", json!({"path": "a.md"})),
                ],
                "tool_calls",
            ),
            text_done("done"),
        ]);
        let vault = MemoryVault::with_documents([("a.md", "x here")]);
        let config = AgentConfig::default();

        let result = run_agent_loop(&service, &vault, &config, "look around", None)
            .await
            .unwrap();
        assert_eq!(result.operations.len(), 1);
        assert_eq!(result.operations[0].kind, OperationKind::Read);
    }

    #[tokio::test]
    async fn rename_record_carries_destination() {
        let service = ScriptedService::new(vec![
            response(
                None,
                vec![(
                    "call_1",
                    "rename_note",
                    json!({"path": "a.md", "new_path": "b.md"}),
                )],
                "tool_calls",
            ),
            text_done("renamed"),
        ]);
        let vault = MemoryVault::with_documents([("a.md", "body")]);
        let config = AgentConfig::default();

        let result = run_agent_loop(&service, &vault, &config, "rename it", None)
            .await
            .unwrap();
        assert_eq!(result.operations.len(), 1);
        assert_eq!(result.operations[0].kind, OperationKind::Rename);
        assert_eq!(result.operations[0].destination.as_deref(), Some("b.md"));
        assert!(vault.exists("b.md"));
    }

    #[tokio::test]
    async fn iteration_cap_aborts_but_keeps_records() {
        // The script always asks for another read; the loop must stop at
        // the cap, not when the script runs dry.
        let responses: Vec<_> = (0..10)
            .map(|i| {
                response(
                    None,
                    vec![(
                        "call",
                        "read_note",
                        json!({"path": format!("n{i}.md")}),
                    )],
                    "tool_calls",
                )
            })
            .collect();
        let service = ScriptedService::new(responses);
        let vault = MemoryVault::new();
        let config = AgentConfig {
            max_iterations: 3,
            ..AgentConfig::default()
        };

        let result = run_agent_loop(&service, &vault, &config, "loop forever", None)
            .await
            .unwrap();
        assert_eq!(result.outcome, AgentOutcome::AbortedMaxIterations);
        assert_eq!(result.iterations, 3);
        assert_eq!(result.operations.len(), 3);
    }

    #[tokio::test]
    async fn delete_with_flag_off_is_unrecognized_and_unaudited() {
        let service = ScriptedService::new(vec![
            response(
                None,
                vec![("call_1", "delete_note", json!({"path": "keep.md"}))],
                "tool_calls",
            ),
            text_done("tried"),
        ]);
        let vault = MemoryVault::with_documents([("keep.md", "body")]);
        let config = AgentConfig::default(); // enable_delete: false

        let result = run_agent_loop(&service, &vault, &config, "delete keep.md", None)
            .await
            .unwrap();

        assert!(vault.exists("keep.md"));
        assert!(result.operations.is_empty());
        // The registry never offered the tool…
        assert!(!service.offered_tools()[0].contains(&"delete_note".to_string()));
        // …and the dispatch reported it as unrecognized.
        let round_two = &service.conversations()[1];
        let tool_turn = round_two.iter().find(|m| m.role == "tool").unwrap();
        assert!(tool_turn
            .content
            .as_deref()
            .unwrap()
            .contains("Unrecognized tool"));
    }

    #[tokio::test]
    async fn delete_with_flag_on_is_audited_even_when_it_fails() {
        let service = ScriptedService::new(vec![
            response(
                None,
                vec![("call_1", "delete_note", json!({"path": "ghost.md"}))],
                "tool_calls",
            ),
            text_done("tried"),
        ]);
        let vault = MemoryVault::new();
        let config = AgentConfig {
            enable_delete: true,
            ..AgentConfig::default()
        };

        let result = run_agent_loop(&service, &vault, &config, "delete ghost.md", None)
            .await
            .unwrap();
        // Attempted, failed, still in the log.
        assert_eq!(result.operations.len(), 1);
        assert_eq!(result.operations[0].kind, OperationKind::Delete);
    }

    #[tokio::test]
    async fn context_prefixes_the_seed_turn() {
        let service = ScriptedService::new(vec![text_done("ok")]);
        let vault = MemoryVault::new();
        let config = AgentConfig::default();
        let ctx = NoteContext {
            path: "journal/today.md".to_string(),
            body: "dear diary".to_string(),
        };

        run_agent_loop(&service, &vault, &config, "summarize", Some(&ctx))
            .await
            .unwrap();

        let first = &service.conversations()[0];
        let user_turn = first.iter().find(|m| m.role == "user").unwrap();
        let content = user_turn.content.as_deref().unwrap();
        assert!(content.contains("journal/today.md"));
        assert!(content.contains("dear diary"));
        assert!(content.ends_with("summarize"));
    }

    #[tokio::test]
    async fn transport_failure_is_fatal_and_unretried() {
        let vault = MemoryVault::new();
        let config = AgentConfig::default();
        let err = run_agent_loop(&FailingService, &vault, &config, "anything", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Transport(_)));
    }

    #[tokio::test]
    async fn natural_stop_with_trailing_text_ends_the_run() {
        // Two rounds: one real operation, then a plain-text wrap-up.
        let service = ScriptedService::new(vec![
            response(
                Some("Updating now."),
                vec![(
                    "call_1",
                    "write_note",
                    json!({"path": "a.md", "content": "new body"}),
                )],
                "tool_calls",
            ),
            text_done("Updated a.md for you."),
        ]);
        let vault = MemoryVault::with_documents([("a.md", "old body")]);
        let config = AgentConfig::default();

        let result = run_agent_loop(&service, &vault, &config, "update a.md", None)
            .await
            .unwrap();
        assert_eq!(result.outcome, AgentOutcome::Completed);
        assert_eq!(result.final_text.as_deref(), Some("Updated a.md for you."));
        assert_eq!(vault.read("a.md").unwrap(), "new body");
        assert_eq!(result.iterations, 2);
    }
}
