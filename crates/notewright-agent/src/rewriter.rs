//! Single-note rewriter: one round trip, no tool dispatch loop.
//!
//! Send the full note body plus the instruction, receive the complete
//! replacement body, clean it up structurally, and hand it back. The
//! service may use the server-side web capabilities within its single
//! turn; their output arrives already folded into the reply text.

use crate::error::AgentError;
use crate::llm::CompletionService;
use crate::prompt;
use crate::tools;
use crate::types::{AgentConfig, ChatMessage};

/// Reserved escape marker: the model leads with this when the request
/// needs cross-note capabilities the rewrite mode does not have. Hosts
/// match on this exact prefix; it is part of the rewrite protocol.
pub const AGENT_MODE_MARKER: &str = "[AGENT_MODE_REQUIRED]";

/// Produce the complete replacement body for one note.
///
/// `note_name` is the note's identifier (file stem) used in the prompt
/// mandate; `body` may be empty. On any error the caller must leave the
/// note untouched.
pub async fn rewrite_document(
    service: &dyn CompletionService,
    config: &AgentConfig,
    note_name: &str,
    body: &str,
    instruction: &str,
) -> Result<String, AgentError> {
    let messages = vec![
        ChatMessage::system(&prompt::build_rewrite_system_prompt(note_name)),
        ChatMessage::user(&build_rewrite_request(body, instruction)),
    ];

    let web_tools = config.enable_web_tools.then(|| {
        tools::vault_tool_definitions(config)
            .into_iter()
            .filter(|t| t.is_server_tool())
            .collect::<Vec<_>>()
    });

    let response = service.complete(&messages, web_tools.as_deref()).await?;
    let choice = response.into_choice()?;

    let text = choice.message.content.unwrap_or_default();
    if text.trim().is_empty() {
        return Err(AgentError::EmptyResponse);
    }

    if let Some(rest) = text.trim_start().strip_prefix(AGENT_MODE_MARKER) {
        return Err(AgentError::AgentModeRequired(rest.trim().to_string()));
    }

    Ok(cleanup_rewrite_output(&text))
}

fn build_rewrite_request(body: &str, instruction: &str) -> String {
    if body.trim().is_empty() {
        format!("The note is currently empty.\n\nInstruction: {instruction}")
    } else {
        format!("Current note content:\n\n{body}\n\nInstruction: {instruction}")
    }
}

/// Structural cleanup before the replacement is applied: unwrap a fence
/// around the whole body (the mandate forbids it, but mandates slip) and
/// drop trailing whitespace noise.
fn cleanup_rewrite_output(text: &str) -> String {
    let trimmed = text.trim_end();
    if let Some(unwrapped) = unwrap_full_fence(trimmed) {
        return unwrapped.trim_end().to_string();
    }
    trimmed.to_string()
}

/// If the entire text is a single fenced code block, return its interior.
fn unwrap_full_fence(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("```")?;
    // Skip an optional language tag on the opening fence line
    let interior_start = rest.find('\n')? + 1;
    let interior = &rest[interior_start..];
    let interior = interior.strip_suffix("```")?;
    // A fence inside the interior means the wrap is not the whole body
    if interior.contains("```") {
        return None;
    }
    Some(interior)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::llm::{ChatCompletionResponse, Choice, ChoiceMessage, CompletionService};
    use crate::types::ToolDefinition;

    struct ScriptedService {
        responses: Mutex<VecDeque<ChatCompletionResponse>>,
        seen_tools: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedService {
        fn replying(text: Option<&str>) -> Self {
            Self {
                responses: Mutex::new(VecDeque::from([text_response(text)])),
                seen_tools: Mutex::new(Vec::new()),
            }
        }
    }

    fn text_response(text: Option<&str>) -> ChatCompletionResponse {
        ChatCompletionResponse {
            id: "msg".to_string(),
            model: "scripted".to_string(),
            choices: vec![Choice {
                message: ChoiceMessage {
                    role: "assistant".to_string(),
                    content: text.map(String::from),
                    tool_calls: None,
                },
                finish_reason: Some("stop".to_string()),
            }],
            usage: None,
        }
    }

    #[async_trait]
    impl CompletionService for ScriptedService {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            tools: Option<&[ToolDefinition]>,
        ) -> Result<ChatCompletionResponse, AgentError> {
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

    #[tokio::test]
    async fn empty_note_generates_fresh_content() {
        let service = ScriptedService::replying(Some("Soft rain on tin\nroofs"));
        let config = AgentConfig::default();
        let out = rewrite_document(&service, &config, "Haiku", "", "write a haiku about rain")
            .await
            .unwrap();
        assert!(!out.is_empty());
        assert!(!out.contains("```"));
    }

    #[tokio::test]
    async fn empty_response_is_a_hard_failure() {
        let service = ScriptedService::replying(None);
        let config = AgentConfig::default();
        let err = rewrite_document(&service, &config, "Note", "body", "do nothing")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::EmptyResponse));

        let service = ScriptedService::replying(Some("   \n"));
        let err = rewrite_document(&service, &config, "Note", "body", "do nothing")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::EmptyResponse));
    }

    #[tokio::test]
    async fn agent_mode_marker_is_a_distinct_failure_not_content() {
        let service = ScriptedService::replying(Some(
            "[AGENT_MODE_REQUIRED] this needs to read other notes",
        ));
        let config = AgentConfig::default();
        let err = rewrite_document(&service, &config, "Note", "body", "merge all notes")
            .await
            .unwrap_err();
        match err {
            AgentError::AgentModeRequired(reason) => {
                assert!(reason.contains("other notes"));
            }
            other => panic!("expected AgentModeRequired, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn full_fence_wrap_is_unwrapped() {
        let service = ScriptedService::replying(Some("```markdown\n# Title\n\nbody\n```"));
        let config = AgentConfig::default();
        let out = rewrite_document(&service, &config, "Note", "", "write")
            .await
            .unwrap();
        assert_eq!(out, "# Title\n\nbody");
    }

    #[tokio::test]
    async fn interior_fences_are_left_alone() {
        let text = "intro\n```rust\nfn main() {}\n```\noutro";
        let service = ScriptedService::replying(Some(text));
        let config = AgentConfig::default();
        let out = rewrite_document(&service, &config, "Note", "", "write")
            .await
            .unwrap();
        assert_eq!(out, text);
    }

    #[tokio::test]
    async fn offers_only_server_tools() {
        let service = ScriptedService::replying(Some("done"));
        let config = AgentConfig::default();
        rewrite_document(&service, &config, "Note", "", "write")
            .await
            .unwrap();
        let offered = &service.seen_tools.lock().unwrap()[0];
        assert_eq!(
            offered,
            &vec!["web_search".to_string(), "web_fetch".to_string()]
        );

        let service = ScriptedService::replying(Some("done"));
        let config = AgentConfig {
            enable_web_tools: false,
            ..AgentConfig::default()
        };
        rewrite_document(&service, &config, "Note", "", "write")
            .await
            .unwrap();
        assert!(service.seen_tools.lock().unwrap()[0].is_empty());
    }
}
