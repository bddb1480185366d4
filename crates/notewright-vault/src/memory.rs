//! In-memory vault, used by tests and in-process embedders.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::document::{parent_of, DerivedMetadata, Document};
use crate::error::VaultError;
use crate::meta;
use crate::store::{validate_path, VaultStore};

#[derive(Debug, Clone)]
struct StoredDoc {
    body: String,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    docs: BTreeMap<String, StoredDoc>,
    folders: BTreeSet<String>,
    trashed: BTreeMap<String, StoredDoc>,
}

/// A vault held entirely in memory behind one mutex, so every
/// check-then-mutate pair is atomic.
#[derive(Debug, Default)]
pub struct MemoryVault {
    state: Mutex<State>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a vault from `(path, body)` pairs. Panics on invalid paths —
    /// callers are test fixtures and embedders with literal paths.
    pub fn with_documents<I, P, B>(documents: I) -> Self
    where
        I: IntoIterator<Item = (P, B)>,
        P: Into<String>,
        B: Into<String>,
    {
        let vault = Self::new();
        for (path, body) in documents {
            vault
                .create_document(&path.into(), &body.into())
                .expect("valid fixture document");
        }
        vault
    }

    /// Folder nodes currently materialized, in path order.
    pub fn folders(&self) -> Vec<String> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.folders.iter().cloned().collect()
    }

    /// Paths sitting in the trash, in path order.
    pub fn trashed_paths(&self) -> Vec<String> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.trashed.keys().cloned().collect()
    }

    fn materialize_folders(state: &mut State, path: &str) {
        let mut folder = parent_of(path);
        while !folder.is_empty() {
            state.folders.insert(folder.to_string());
            folder = parent_of(folder);
        }
    }
}

/// Rewrite wiki links targeting `old_path` so they point at `new_path`.
/// Targets may be written with or without the `.md` extension.
pub(crate) fn rewrite_links(body: &str, old_path: &str, new_path: &str) -> String {
    let old_bare = old_path.strip_suffix(".md").unwrap_or(old_path);
    let new_bare = new_path.strip_suffix(".md").unwrap_or(new_path);

    let mut out = String::with_capacity(body.len());
    let mut rest = body;
    while let Some(start) = rest.find("[[") {
        let (before, link_on) = rest.split_at(start);
        out.push_str(before);
        let Some(end) = link_on.find("]]") else {
            out.push_str(link_on);
            return out;
        };
        let inner = &link_on[2..end];
        let target_end = inner
            .find(['|', '#'])
            .unwrap_or(inner.len());
        let (target, suffix) = inner.split_at(target_end);
        let rewritten = if target.trim() == old_path {
            Some(new_path)
        } else if target.trim() == old_bare {
            Some(new_bare)
        } else {
            None
        };
        match rewritten {
            Some(new_target) => {
                out.push_str("[[");
                out.push_str(new_target);
                out.push_str(suffix);
                out.push_str("]]");
            }
            None => out.push_str(&link_on[..end + 2]),
        }
        rest = &link_on[end + 2..];
    }
    out.push_str(rest);
    out
}

impl VaultStore for MemoryVault {
    fn exists(&self, path: &str) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.docs.contains_key(path)
    }

    fn read(&self, path: &str) -> Result<String, VaultError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .docs
            .get(path)
            .map(|d| d.body.clone())
            .ok_or_else(|| VaultError::NotFound(path.to_string()))
    }

    fn write(&self, path: &str, body: &str) -> Result<(), VaultError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let doc = state
            .docs
            .get_mut(path)
            .ok_or_else(|| VaultError::NotFound(path.to_string()))?;
        doc.body = body.to_string();
        doc.modified = Utc::now();
        Ok(())
    }

    fn create_document(&self, path: &str, body: &str) -> Result<(), VaultError> {
        validate_path(path)?;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.docs.contains_key(path) {
            return Err(VaultError::AlreadyExists(path.to_string()));
        }
        Self::materialize_folders(&mut state, path);
        let now = Utc::now();
        state.docs.insert(
            path.to_string(),
            StoredDoc {
                body: body.to_string(),
                created: now,
                modified: now,
            },
        );
        Ok(())
    }

    fn create_directory(&self, path: &str) -> Result<(), VaultError> {
        validate_path(path)?;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.folders.insert(path.to_string());
        Self::materialize_folders(&mut state, &format!("{path}/x"));
        Ok(())
    }

    fn rename_with_link_rewrite(&self, old_path: &str, new_path: &str) -> Result<(), VaultError> {
        validate_path(new_path)?;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.docs.contains_key(old_path) {
            return Err(VaultError::NotFound(old_path.to_string()));
        }
        if state.docs.contains_key(new_path) {
            return Err(VaultError::AlreadyExists(new_path.to_string()));
        }
        let doc = state.docs.remove(old_path).expect("checked above");
        Self::materialize_folders(&mut state, new_path);
        state.docs.insert(new_path.to_string(), doc);

        let referrers: Vec<String> = state.docs.keys().cloned().collect();
        for path in referrers {
            if path == new_path {
                continue;
            }
            let doc = state.docs.get_mut(&path).expect("key from same map");
            let rewritten = rewrite_links(&doc.body, old_path, new_path);
            if rewritten != doc.body {
                doc.body = rewritten;
                doc.modified = Utc::now();
            }
        }
        Ok(())
    }

    fn trash(&self, path: &str) -> Result<(), VaultError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let doc = state
            .docs
            .remove(path)
            .ok_or_else(|| VaultError::NotFound(path.to_string()))?;
        state.trashed.insert(path.to_string(), doc);
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<Document>, VaultError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state
            .docs
            .iter()
            .map(|(path, doc)| Document {
                path: path.clone(),
                size: doc.body.len() as u64,
                created: doc.created,
                modified: doc.modified,
            })
            .collect())
    }

    fn stat(&self, path: &str) -> Result<Document, VaultError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .docs
            .get(path)
            .map(|doc| Document {
                path: path.to_string(),
                size: doc.body.len() as u64,
                created: doc.created,
                modified: doc.modified,
            })
            .ok_or_else(|| VaultError::NotFound(path.to_string()))
    }

    fn derived_metadata(&self, path: &str) -> Result<DerivedMetadata, VaultError> {
        let body = self.read(path)?;
        Ok(meta::extract(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let vault = MemoryVault::with_documents([("a.md", "one")]);
        vault.write("a.md", "two").unwrap();
        assert_eq!(vault.read("a.md").unwrap(), "two");
    }

    #[test]
    fn write_missing_never_creates() {
        let vault = MemoryVault::new();
        assert!(matches!(
            vault.write("ghost.md", "x"),
            Err(VaultError::NotFound(_))
        ));
        assert!(!vault.exists("ghost.md"));
    }

    #[test]
    fn create_existing_fails_without_mutation() {
        let vault = MemoryVault::with_documents([("a.md", "original")]);
        assert!(matches!(
            vault.create_document("a.md", "clobber"),
            Err(VaultError::AlreadyExists(_))
        ));
        assert_eq!(vault.read("a.md").unwrap(), "original");
    }

    #[test]
    fn create_materializes_ancestor_folders() {
        let vault = MemoryVault::new();
        vault.create_document("a/b/c.md", "deep").unwrap();
        assert_eq!(vault.folders(), vec!["a".to_string(), "a/b".to_string()]);
    }

    #[test]
    fn rename_moves_body_and_rewrites_links() {
        let vault = MemoryVault::with_documents([
            ("old.md", "the body"),
            ("refers.md", "see [[old]] and [[old.md|alias]] and [[other]]"),
        ]);
        vault.rename_with_link_rewrite("old.md", "new/fresh.md").unwrap();

        assert_eq!(vault.read("new/fresh.md").unwrap(), "the body");
        assert!(matches!(
            vault.read("old.md"),
            Err(VaultError::NotFound(_))
        ));
        assert_eq!(
            vault.read("refers.md").unwrap(),
            "see [[new/fresh]] and [[new/fresh.md|alias]] and [[other]]"
        );
    }

    #[test]
    fn rename_onto_occupied_path_fails() {
        let vault = MemoryVault::with_documents([("a.md", "a"), ("b.md", "b")]);
        assert!(matches!(
            vault.rename_with_link_rewrite("a.md", "b.md"),
            Err(VaultError::AlreadyExists(_))
        ));
        assert_eq!(vault.read("a.md").unwrap(), "a");
    }

    #[test]
    fn trash_is_reversible_storage_not_erasure() {
        let vault = MemoryVault::with_documents([("a.md", "kept")]);
        vault.trash("a.md").unwrap();
        assert!(!vault.exists("a.md"));
        assert_eq!(vault.trashed_paths(), vec!["a.md".to_string()]);
    }

    #[test]
    fn stat_reports_size() {
        let vault = MemoryVault::with_documents([("a.md", "12345")]);
        assert_eq!(vault.stat("a.md").unwrap().size, 5);
    }
}
