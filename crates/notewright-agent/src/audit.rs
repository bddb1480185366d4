//! Audit log: ordered record of every vault operation the loop attempted.
//!
//! A record means "this operation was dispatched", not "this operation
//! succeeded" — a failed write still appears, because the model may report
//! it as an attempted change and the caller's summary must match.
//! Exploration tools (list/search/metadata) are never recorded.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Read,
    Write,
    Create,
    Rename,
    Delete,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            OperationKind::Read => "read",
            OperationKind::Write => "write",
            OperationKind::Create => "create",
            OperationKind::Rename => "rename",
            OperationKind::Delete => "delete",
        };
        f.write_str(label)
    }
}

/// One attempted primitive operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    pub kind: OperationKind,
    pub path: String,
    /// Destination path — present for renames only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

/// Ordered log accumulated during one agent run.
#[derive(Debug, Default)]
pub struct AuditLog {
    records: Vec<OperationRecord>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: OperationKind, path: String, destination: Option<String>) {
        self.records.push(OperationRecord {
            kind,
            path,
            destination,
        });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[OperationRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<OperationRecord> {
        self.records
    }
}

/// Which audit kind a tool name maps to. `None` for exploration tools and
/// anything unrecognized.
pub fn recorded_kind(tool_name: &str) -> Option<OperationKind> {
    match tool_name {
        "read_note" => Some(OperationKind::Read),
        "write_note" => Some(OperationKind::Write),
        "create_note" => Some(OperationKind::Create),
        "rename_note" => Some(OperationKind::Rename),
        "delete_note" => Some(OperationKind::Delete),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exploration_tools_are_not_recorded() {
        assert!(recorded_kind("list_notes").is_none());
        assert!(recorded_kind("search_notes").is_none());
        assert!(recorded_kind("get_note_metadata").is_none());
        assert!(recorded_kind("web_search").is_none());
        assert!(recorded_kind("no_such_tool").is_none());
    }

    #[test]
    fn records_keep_insertion_order() {
        let mut log = AuditLog::new();
        log.record(OperationKind::Read, "a.md".to_string(), None);
        log.record(
            OperationKind::Rename,
            "a.md".to_string(),
            Some("b.md".to_string()),
        );
        let records = log.into_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, OperationKind::Read);
        assert_eq!(records[1].destination.as_deref(), Some("b.md"));
    }
}
