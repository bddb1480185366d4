mod cli;
mod observability;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;

use cli::{Cli, Commands};
use notewright_agent::{
    rewrite_document, run_agent_loop, AgentConfig, AgentError, AgentOutcome, LlmClient,
    NoteContext,
};
use notewright_vault::{FsVault, VaultError, VaultStore};

fn main() -> Result<()> {
    observability::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Agent {
            instruction,
            vault,
            context,
            max_iterations,
            allow_delete,
            json,
        } => {
            let mut config = AgentConfig::from_env();
            if let Some(cap) = max_iterations {
                config.max_iterations = cap;
            }
            if allow_delete {
                config.enable_delete = true;
            }

            let client = LlmClient::from_config(&config)?;
            let store = FsVault::open(&vault)
                .with_context(|| format!("failed to open vault at {vault}"))?;

            let note_context = match context {
                Some(path) => Some(NoteContext {
                    body: store
                        .read(&path)
                        .with_context(|| format!("failed to read context note {path}"))?,
                    path,
                }),
                None => None,
            };

            let rt = tokio::runtime::Runtime::new().context("failed to create tokio runtime")?;
            let result = rt.block_on(run_agent_loop(
                &client,
                &store,
                &config,
                &instruction,
                note_context.as_ref(),
            ))?;

            if json {
                let outcome = match result.outcome {
                    AgentOutcome::Completed => "completed",
                    AgentOutcome::AbortedMaxIterations => "aborted_max_iterations",
                };
                let payload = json!({
                    "outcome": outcome,
                    "iterations": result.iterations,
                    "operations": result.operations,
                    "final_text": result.final_text,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                if let Some(text) = &result.final_text {
                    println!("{text}");
                }
                if !result.operations.is_empty() {
                    eprintln!("\nOperations ({}):", result.operations.len());
                    for op in &result.operations {
                        match &op.destination {
                            Some(dest) => eprintln!("  {:<7} {} -> {}", op.kind, op.path, dest),
                            None => eprintln!("  {:<7} {}", op.kind, op.path),
                        }
                    }
                }
                if result.outcome == AgentOutcome::AbortedMaxIterations {
                    eprintln!(
                        "\nStopped after {} rounds without finishing; the operations above were still applied.",
                        result.iterations
                    );
                }
            }
        }

        Commands::Rewrite {
            note,
            instruction,
            vault,
            stdout,
        } => {
            let config = AgentConfig::from_env();
            let client = LlmClient::from_config(&config)?;
            let store = FsVault::open(&vault)
                .with_context(|| format!("failed to open vault at {vault}"))?;

            // A missing note rewrites from empty and is created on success.
            let body = match store.read(&note) {
                Ok(body) => body,
                Err(VaultError::NotFound(_)) => String::new(),
                Err(e) => return Err(e).with_context(|| format!("failed to read {note}")),
            };
            let name = notewright_vault::document::name_of(&note).to_string();

            let rt = tokio::runtime::Runtime::new().context("failed to create tokio runtime")?;
            let rewritten = match rt.block_on(rewrite_document(
                &client,
                &config,
                &name,
                &body,
                &instruction,
            )) {
                Ok(text) => text,
                Err(AgentError::AgentModeRequired(reason)) => {
                    // The note is untouched; tell the user which mode to use.
                    anyhow::bail!(
                        "this request needs vault-wide capabilities not available in rewrite mode \
                         ({reason}); run it with `notewright agent` instead"
                    );
                }
                Err(e) => return Err(e.into()),
            };

            if stdout {
                println!("{rewritten}");
            } else {
                if store.exists(&note) {
                    store.write(&note, &rewritten)?;
                } else {
                    store.create_document(&note, &rewritten)?;
                }
                tracing::info!("rewrote {}", note);
                eprintln!("Updated {note}");
            }
        }
    }

    Ok(())
}
