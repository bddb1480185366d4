//! Directory-backed vault.
//!
//! Documents live under a root directory; vault paths map 1:1 onto
//! relative file paths. `trash` moves documents into a `.trash/` subtree
//! instead of erasing them, and renames rewrite wiki links across the
//! vault. All mutations go through `validate_path`, so a model-supplied
//! path can never escape the root.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::document::{DerivedMetadata, Document};
use crate::error::VaultError;
use crate::memory::rewrite_links;
use crate::meta;
use crate::store::{validate_path, VaultStore};

const TRASH_DIR: &str = ".trash";

/// A vault rooted at a directory on disk.
///
/// The mutex serializes check-then-mutate sequences (create, rename) so
/// two in-process callers cannot race the same occupancy check; plain
/// reads go straight to the filesystem.
pub struct FsVault {
    root: PathBuf,
    mutate_lock: Mutex<()>,
}

impl FsVault {
    /// Open a vault rooted at `root`, creating the directory if missing.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, VaultError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            mutate_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, VaultError> {
        validate_path(path)?;
        if path == TRASH_DIR || path.starts_with(".trash/") {
            return Err(VaultError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(path))
    }

    fn collect_documents(
        &self,
        dir: &Path,
        out: &mut Vec<Document>,
    ) -> Result<(), VaultError> {
        let mut entries: Vec<_> = fs::read_dir(dir)?.filter_map(|e| e.ok()).collect();
        entries.sort_by_key(|e| e.file_name());
        for entry in entries {
            let name = entry.file_name().to_string_lossy().to_string();
            let path = entry.path();
            if path.is_dir() {
                if name.starts_with('.') {
                    continue;
                }
                self.collect_documents(&path, out)?;
            } else if !name.starts_with('.') {
                out.push(self.document_at(&path)?);
            }
        }
        Ok(())
    }

    fn document_at(&self, absolute: &Path) -> Result<Document, VaultError> {
        let metadata = fs::metadata(absolute)?;
        let rel = absolute
            .strip_prefix(&self.root)
            .unwrap_or(absolute)
            .to_string_lossy()
            .replace('\\', "/");
        Ok(Document {
            path: rel,
            size: metadata.len(),
            created: system_time_utc(metadata.created().or_else(|_| metadata.modified())?),
            modified: system_time_utc(metadata.modified()?),
        })
    }
}

fn system_time_utc(time: std::time::SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

impl VaultStore for FsVault {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_file()).unwrap_or(false)
    }

    fn read(&self, path: &str) -> Result<String, VaultError> {
        let resolved = self.resolve(path)?;
        if !resolved.is_file() {
            return Err(VaultError::NotFound(path.to_string()));
        }
        Ok(fs::read_to_string(resolved)?)
    }

    fn write(&self, path: &str, body: &str) -> Result<(), VaultError> {
        let resolved = self.resolve(path)?;
        let _guard = self.mutate_lock.lock().unwrap_or_else(|e| e.into_inner());
        if !resolved.is_file() {
            return Err(VaultError::NotFound(path.to_string()));
        }
        fs::write(resolved, body)?;
        Ok(())
    }

    fn create_document(&self, path: &str, body: &str) -> Result<(), VaultError> {
        let resolved = self.resolve(path)?;
        let _guard = self.mutate_lock.lock().unwrap_or_else(|e| e.into_inner());
        if resolved.exists() {
            return Err(VaultError::AlreadyExists(path.to_string()));
        }
        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(resolved, body)?;
        Ok(())
    }

    fn create_directory(&self, path: &str) -> Result<(), VaultError> {
        let resolved = self.resolve(path)?;
        fs::create_dir_all(resolved)?;
        Ok(())
    }

    fn rename_with_link_rewrite(&self, old_path: &str, new_path: &str) -> Result<(), VaultError> {
        let old_resolved = self.resolve(old_path)?;
        let new_resolved = self.resolve(new_path)?;
        let _guard = self.mutate_lock.lock().unwrap_or_else(|e| e.into_inner());
        if !old_resolved.is_file() {
            return Err(VaultError::NotFound(old_path.to_string()));
        }
        if new_resolved.exists() {
            return Err(VaultError::AlreadyExists(new_path.to_string()));
        }
        if let Some(parent) = new_resolved.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&old_resolved, &new_resolved)?;

        let mut documents = Vec::new();
        self.collect_documents(&self.root, &mut documents)?;
        for doc in documents {
            if doc.path == new_path {
                continue;
            }
            let absolute = self.root.join(&doc.path);
            let Ok(body) = fs::read_to_string(&absolute) else {
                continue; // binary or unreadable, nothing to rewrite
            };
            let rewritten = rewrite_links(&body, old_path, new_path);
            if rewritten != body {
                fs::write(&absolute, rewritten)?;
                tracing::debug!("rewrote links in {} after rename", doc.path);
            }
        }
        Ok(())
    }

    fn trash(&self, path: &str) -> Result<(), VaultError> {
        let resolved = self.resolve(path)?;
        let _guard = self.mutate_lock.lock().unwrap_or_else(|e| e.into_inner());
        if !resolved.is_file() {
            return Err(VaultError::NotFound(path.to_string()));
        }
        let mut target = self.root.join(TRASH_DIR).join(path);
        if target.exists() {
            // Keep prior trashed generations around under a timestamp suffix.
            let suffix = Utc::now().timestamp_millis();
            target = target.with_file_name(format!(
                "{}.{}",
                target.file_name().unwrap_or_default().to_string_lossy(),
                suffix
            ));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(resolved, target)?;
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<Document>, VaultError> {
        let mut documents = Vec::new();
        self.collect_documents(&self.root, &mut documents)?;
        Ok(documents)
    }

    fn stat(&self, path: &str) -> Result<Document, VaultError> {
        let resolved = self.resolve(path)?;
        if !resolved.is_file() {
            return Err(VaultError::NotFound(path.to_string()));
        }
        self.document_at(&resolved)
    }

    fn derived_metadata(&self, path: &str) -> Result<DerivedMetadata, VaultError> {
        let body = self.read(path)?;
        Ok(meta::extract(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_vault() -> (tempfile::TempDir, FsVault) {
        let tmp = tempfile::tempdir().unwrap();
        let vault = FsVault::open(tmp.path()).unwrap();
        (tmp, vault)
    }

    #[test]
    fn create_write_read_round_trip() {
        let (_tmp, vault) = open_vault();
        vault.create_document("notes/daily.md", "morning").unwrap();
        vault.write("notes/daily.md", "evening").unwrap();
        assert_eq!(vault.read("notes/daily.md").unwrap(), "evening");
    }

    #[test]
    fn create_makes_ancestor_directories() {
        let (tmp, vault) = open_vault();
        vault.create_document("a/b/c.md", "deep").unwrap();
        assert!(tmp.path().join("a/b").is_dir());
    }

    #[test]
    fn write_missing_is_not_found() {
        let (_tmp, vault) = open_vault();
        assert!(matches!(
            vault.write("missing.md", "x"),
            Err(VaultError::NotFound(_))
        ));
        assert!(!vault.exists("missing.md"));
    }

    #[test]
    fn path_escape_is_rejected() {
        let (_tmp, vault) = open_vault();
        assert!(matches!(
            vault.read("../outside.md"),
            Err(VaultError::InvalidPath(_))
        ));
        assert!(matches!(
            vault.create_document("/abs.md", "x"),
            Err(VaultError::InvalidPath(_))
        ));
    }

    #[test]
    fn trash_moves_into_trash_dir() {
        let (tmp, vault) = open_vault();
        vault.create_document("gone.md", "bye").unwrap();
        vault.trash("gone.md").unwrap();
        assert!(!vault.exists("gone.md"));
        assert_eq!(
            fs::read_to_string(tmp.path().join(".trash/gone.md")).unwrap(),
            "bye"
        );
    }

    #[test]
    fn trash_is_not_listed_or_addressable() {
        let (_tmp, vault) = open_vault();
        vault.create_document("gone.md", "bye").unwrap();
        vault.trash("gone.md").unwrap();
        assert!(vault.list_all().unwrap().is_empty());
        assert!(matches!(
            vault.read(".trash/gone.md"),
            Err(VaultError::InvalidPath(_))
        ));
    }

    #[test]
    fn rename_rewrites_links_on_disk() {
        let (_tmp, vault) = open_vault();
        vault.create_document("old.md", "body").unwrap();
        vault
            .create_document("ref.md", "see [[old]] today")
            .unwrap();
        vault.rename_with_link_rewrite("old.md", "new.md").unwrap();
        assert_eq!(vault.read("new.md").unwrap(), "body");
        assert_eq!(vault.read("ref.md").unwrap(), "see [[new]] today");
    }

    #[test]
    fn list_all_skips_hidden_and_orders_by_path() {
        let (_tmp, vault) = open_vault();
        vault.create_document("b.md", "b").unwrap();
        vault.create_document("a/x.md", "x").unwrap();
        vault.create_document("keep.md", "k").unwrap();
        vault.trash("keep.md").unwrap();

        let paths: Vec<String> = vault.list_all().unwrap().into_iter().map(|d| d.path).collect();
        assert_eq!(paths, vec!["a/x.md".to_string(), "b.md".to_string()]);
    }
}
