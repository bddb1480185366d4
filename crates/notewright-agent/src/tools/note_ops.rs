//! Vault operations: definitions and handlers.
//!
//! Handlers are pure functions of `(store, arguments)`: they validate the
//! argument shape, run the operation, and return either an
//! operation-specific payload (raw text for reads, confirmation strings
//! for mutations, JSON for listings) or an error the dispatch layer folds
//! into a failed tool result.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use notewright_vault::document::name_of;
use notewright_vault::VaultStore;

use crate::types::ToolDefinition;

/// Per-note excerpt cap in `search_notes`.
const MAX_EXCERPTS_PER_NOTE: usize = 5;
/// Excerpt line length cap, in characters.
const MAX_EXCERPT_CHARS: usize = 200;
/// Default cap on matched notes per search.
const DEFAULT_SEARCH_MAX_RESULTS: usize = 50;

// ─── Tool definitions ───────────────────────────────────────────────────────

pub(super) fn tool_definitions(enable_delete: bool) -> Vec<ToolDefinition> {
    let mut tools = vec![
        ToolDefinition::function(
            "read_note",
            "Read the full contents of a note. Fails if the note does not exist.",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Vault-relative note path, e.g. 'projects/roadmap.md'"
                    }
                },
                "required": ["path"]
            }),
        ),
        ToolDefinition::function(
            "write_note",
            "Overwrite the contents of an EXISTING note. Fails if the note does not exist — use create_note for new notes.",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Vault-relative note path"
                    },
                    "content": {
                        "type": "string",
                        "description": "Complete replacement content for the note"
                    }
                },
                "required": ["path", "content"]
            }),
        ),
        ToolDefinition::function(
            "create_note",
            "Create a new note. Missing parent folders are created automatically. Fails if a note already exists at the path.",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Vault-relative path for the new note"
                    },
                    "content": {
                        "type": "string",
                        "description": "Initial note content"
                    }
                },
                "required": ["path", "content"]
            }),
        ),
        ToolDefinition::function(
            "rename_note",
            "Move or rename a note. Wiki links in other notes that point at the old path are updated automatically.",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Current vault-relative path"
                    },
                    "new_path": {
                        "type": "string",
                        "description": "New vault-relative path"
                    }
                },
                "required": ["path", "new_path"]
            }),
        ),
        ToolDefinition::function(
            "list_notes",
            "List notes in the vault, optionally filtered by folder and/or a case-insensitive path pattern.",
            json!({
                "type": "object",
                "properties": {
                    "folder": {
                        "type": "string",
                        "description": "Only list notes under this folder"
                    },
                    "pattern": {
                        "type": "string",
                        "description": "Case-insensitive substring to match against note paths"
                    },
                    "include_metadata": {
                        "type": "boolean",
                        "description": "Include size and timestamps per note. Default: false."
                    }
                },
                "required": []
            }),
        ),
        ToolDefinition::function(
            "search_notes",
            "Search note contents. Returns matching lines per note (up to 5, truncated to 200 chars) and stops after max_results matching notes.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Text to search for"
                    },
                    "folder": {
                        "type": "string",
                        "description": "Restrict the search to this folder"
                    },
                    "case_sensitive": {
                        "type": "boolean",
                        "description": "Match case exactly. Default: false."
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Stop after this many notes have matched. Default: 50."
                    }
                },
                "required": ["query"]
            }),
        ),
        ToolDefinition::function(
            "get_note_metadata",
            "Get metadata for a note: size, timestamps, and optionally front matter, outgoing links, and tags.",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Vault-relative note path"
                    },
                    "include_frontmatter": {
                        "type": "boolean",
                        "description": "Include the front-matter mapping. Default: true."
                    },
                    "include_links": {
                        "type": "boolean",
                        "description": "Include outgoing wiki-link targets. Default: false."
                    },
                    "include_tags": {
                        "type": "boolean",
                        "description": "Include tags. Default: false."
                    }
                },
                "required": ["path"]
            }),
        ),
    ];

    if enable_delete {
        tools.push(ToolDefinition::function(
            "delete_note",
            "Move a note to the vault trash (reversible). Fails if the note does not exist.",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Vault-relative note path"
                    }
                },
                "required": ["path"]
            }),
        ));
    }

    tools
}

// ─── Argument shapes ────────────────────────────────────────────────────────
// One typed struct per operation; serde does the validation, so a wrong
// shape is a local failure rather than a handler panic.

#[derive(Debug, Deserialize)]
struct PathArgs {
    path: String,
}

#[derive(Debug, Deserialize)]
struct WriteArgs {
    path: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct RenameArgs {
    path: String,
    new_path: String,
}

#[derive(Debug, Deserialize)]
struct ListArgs {
    #[serde(default)]
    folder: Option<String>,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    folder: Option<String>,
    #[serde(default)]
    case_sensitive: bool,
    #[serde(default)]
    max_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct MetadataArgs {
    path: String,
    #[serde(default = "default_true")]
    include_frontmatter: bool,
    #[serde(default)]
    include_links: bool,
    #[serde(default)]
    include_tags: bool,
}

fn default_true() -> bool {
    true
}

fn parse_args<'a, T: Deserialize<'a>>(tool: &str, args: &'a Value) -> Result<T> {
    T::deserialize(args).map_err(|e| anyhow!("Invalid arguments for {tool}: {e}"))
}

// ─── Heading deduplication ──────────────────────────────────────────────────

/// Remove a leading level-1 heading that merely restates the note's own
/// identifier. Hosting UIs already display the identifier as the title, so
/// the model re-adding it produces a visible duplicate; stripping here is
/// more reliable than instructing the model not to write it.
pub fn strip_duplicate_heading(content: &str, identifier: &str) -> String {
    let mut lines = content.lines();
    let mut leading_blanks = 0usize;
    let first_content_line = loop {
        match lines.next() {
            Some(line) if line.trim().is_empty() => leading_blanks += 1,
            other => break other,
        }
    };
    let Some(first) = first_content_line else {
        return content.to_string();
    };
    let Some(heading) = first.trim().strip_prefix("# ") else {
        return content.to_string();
    };
    if heading.trim() != identifier {
        return content.to_string();
    }

    // Drop blank lines and the heading line, keep the remainder verbatim.
    content
        .lines()
        .skip(leading_blanks + 1)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_start_matches('\n')
        .to_string()
}

// ─── Handlers ───────────────────────────────────────────────────────────────

pub(super) fn execute_read_note(args: &Value, store: &dyn VaultStore) -> Result<String> {
    let args: PathArgs = parse_args("read_note", args)?;
    Ok(store.read(&args.path)?)
}

pub(super) fn execute_write_note(args: &Value, store: &dyn VaultStore) -> Result<String> {
    let args: WriteArgs = parse_args("write_note", args)?;
    if !store.exists(&args.path) {
        return Err(anyhow!(
            "not found: {} (use create_note for new notes)",
            args.path
        ));
    }
    let filtered = strip_duplicate_heading(&args.content, name_of(&args.path));
    store.write(&args.path, &filtered)?;
    Ok(format!("Wrote {} bytes to {}", filtered.len(), args.path))
}

pub(super) fn execute_create_note(args: &Value, store: &dyn VaultStore) -> Result<String> {
    let args: WriteArgs = parse_args("create_note", args)?;
    store.create_document(&args.path, &args.content)?;
    Ok(format!("Created {}", args.path))
}

pub(super) fn execute_rename_note(args: &Value, store: &dyn VaultStore) -> Result<String> {
    let args: RenameArgs = parse_args("rename_note", args)?;
    store.rename_with_link_rewrite(&args.path, &args.new_path)?;
    Ok(format!("Renamed {} to {}", args.path, args.new_path))
}

pub(super) fn execute_delete_note(args: &Value, store: &dyn VaultStore) -> Result<String> {
    let args: PathArgs = parse_args("delete_note", args)?;
    store.trash(&args.path)?;
    Ok(format!("Moved {} to trash", args.path))
}

#[derive(Debug, Serialize)]
struct FileEntry {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    modified: Option<DateTime<Utc>>,
}

pub(super) fn execute_list_notes(args: &Value, store: &dyn VaultStore) -> Result<String> {
    let args: ListArgs = parse_args("list_notes", args)?;
    let folder_prefix = args
        .folder
        .as_deref()
        .filter(|f| !f.trim().is_empty())
        .map(normalize_folder);
    let pattern_lower = args.pattern.as_ref().map(|p| p.to_lowercase());

    let files: Vec<FileEntry> = store
        .list_all()?
        .into_iter()
        .filter(|doc| {
            folder_prefix
                .as_deref()
                .map_or(true, |prefix| doc.path.starts_with(prefix))
        })
        .filter(|doc| {
            pattern_lower
                .as_deref()
                .map_or(true, |pattern| doc.path.to_lowercase().contains(pattern))
        })
        .map(|doc| FileEntry {
            size: args.include_metadata.then_some(doc.size),
            created: args.include_metadata.then_some(doc.created),
            modified: args.include_metadata.then_some(doc.modified),
            path: doc.path,
        })
        .collect();

    let count = files.len();
    let report = json!({
        "files": files,
        "count": count,
    });
    Ok(serde_json::to_string_pretty(&report)?)
}

#[derive(Debug, Serialize)]
struct MatchLine {
    line: usize,
    content: String,
}

#[derive(Debug, Serialize)]
struct SearchHit {
    path: String,
    matches: Vec<MatchLine>,
}

pub(super) fn execute_search_notes(args: &Value, store: &dyn VaultStore) -> Result<String> {
    let args: SearchArgs = parse_args("search_notes", args)?;
    let folder_prefix = args
        .folder
        .as_deref()
        .filter(|f| !f.trim().is_empty())
        .map(normalize_folder);
    let max_results = args.max_results.unwrap_or(DEFAULT_SEARCH_MAX_RESULTS).max(1);
    let needle = if args.case_sensitive {
        args.query.clone()
    } else {
        args.query.to_lowercase()
    };

    let mut results: Vec<SearchHit> = Vec::new();
    let mut total_files_searched = 0usize;

    for doc in store.list_all()? {
        if results.len() >= max_results {
            break;
        }
        if let Some(prefix) = folder_prefix.as_deref() {
            if !doc.path.starts_with(prefix) {
                continue;
            }
        }
        total_files_searched += 1;
        let Ok(body) = store.read(&doc.path) else {
            continue; // listed but unreadable; skip rather than abort the scan
        };

        let mut matches: Vec<MatchLine> = Vec::new();
        for (index, line) in body.lines().enumerate() {
            let haystack;
            let line_ref = if args.case_sensitive {
                line
            } else {
                haystack = line.to_lowercase();
                &haystack
            };
            if line_ref.contains(&needle) {
                if matches.len() < MAX_EXCERPTS_PER_NOTE {
                    matches.push(MatchLine {
                        line: index + 1,
                        content: line.chars().take(MAX_EXCERPT_CHARS).collect(),
                    });
                } else {
                    break;
                }
            }
        }
        if !matches.is_empty() {
            results.push(SearchHit {
                path: doc.path,
                matches,
            });
        }
    }

    let files_with_matches = results.len();
    let truncated = files_with_matches >= max_results;
    let report = json!({
        "results": results,
        "total_files_searched": total_files_searched,
        "files_with_matches": files_with_matches,
        "truncated": truncated,
    });
    Ok(serde_json::to_string_pretty(&report)?)
}

pub(super) fn execute_get_note_metadata(args: &Value, store: &dyn VaultStore) -> Result<String> {
    let args: MetadataArgs = parse_args("get_note_metadata", args)?;
    let doc = store.stat(&args.path)?;
    let name = doc.name().to_string();

    let mut report = json!({
        "path": doc.path,
        "name": name,
        "size": doc.size,
        "created": doc.created,
        "modified": doc.modified,
    });

    if args.include_frontmatter || args.include_links || args.include_tags {
        let derived = store.derived_metadata(&args.path)?;
        let map = report.as_object_mut().expect("object literal above");
        if args.include_frontmatter {
            map.insert("frontmatter".to_string(), json!(derived.frontmatter));
        }
        if args.include_links {
            map.insert("links".to_string(), json!(derived.links));
        }
        if args.include_tags {
            map.insert("tags".to_string(), json!(derived.tags));
        }
    }

    Ok(serde_json::to_string_pretty(&report)?)
}

/// Normalize a folder filter to end with exactly one separator.
fn normalize_folder(folder: &str) -> String {
    let trimmed = folder.trim_end_matches('/');
    format!("{trimmed}/")
}
