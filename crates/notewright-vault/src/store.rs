//! The `VaultStore` capability interface.

use crate::document::{DerivedMetadata, Document};
use crate::error::VaultError;

/// Narrow interface the agent core uses to touch the document tree.
///
/// Existence checks and mutations are atomic with respect to the store's
/// own consistency: `write` on a missing path fails with `NotFound` inside
/// the store rather than relying on a separate `exists` round trip, and
/// `create_document` / `rename_with_link_rewrite` perform their occupancy
/// checks under the same lock (or syscall) as the mutation.
pub trait VaultStore: Send + Sync {
    /// Whether a document exists at `path`.
    fn exists(&self, path: &str) -> bool;

    /// Full body of the document at `path`.
    fn read(&self, path: &str) -> Result<String, VaultError>;

    /// Replace the body of an existing document. Fails with `NotFound` if
    /// no document is at `path`; never creates one.
    fn write(&self, path: &str, body: &str) -> Result<(), VaultError>;

    /// Create a new document, materializing any missing ancestor folders.
    /// Fails with `AlreadyExists` if `path` is occupied.
    fn create_document(&self, path: &str, body: &str) -> Result<(), VaultError>;

    /// Create a folder node (and missing ancestors). Idempotent.
    fn create_directory(&self, path: &str) -> Result<(), VaultError>;

    /// Move a document and rewrite `[[wiki links]]` in every other
    /// document that referenced the old path. Fails with `NotFound` /
    /// `AlreadyExists` on the respective occupancy violations.
    fn rename_with_link_rewrite(&self, old_path: &str, new_path: &str) -> Result<(), VaultError>;

    /// Reversible delete. Fails with `NotFound` if absent.
    fn trash(&self, path: &str) -> Result<(), VaultError>;

    /// All documents in the vault, in path order.
    fn list_all(&self) -> Result<Vec<Document>, VaultError>;

    /// Size and timestamps for one document.
    fn stat(&self, path: &str) -> Result<Document, VaultError>;

    /// Front matter, links, and tags derived from the body.
    fn derived_metadata(&self, path: &str) -> Result<DerivedMetadata, VaultError>;
}

/// Validate a vault-relative path: non-empty, `/`-delimited, no absolute
/// prefixes, no `.`/`..` segments, no backslashes.
pub fn validate_path(path: &str) -> Result<(), VaultError> {
    if path.is_empty() || path.starts_with('/') || path.ends_with('/') {
        return Err(VaultError::InvalidPath(path.to_string()));
    }
    if path.contains('\\') {
        return Err(VaultError::InvalidPath(path.to_string()));
    }
    for segment in path.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(VaultError::InvalidPath(path.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_path_rejects_escapes() {
        assert!(validate_path("notes/daily.md").is_ok());
        assert!(validate_path("/etc/passwd").is_err());
        assert!(validate_path("a/../b.md").is_err());
        assert!(validate_path("a//b.md").is_err());
        assert!(validate_path("").is_err());
        assert!(validate_path("folder/").is_err());
        assert!(validate_path("a\\b.md").is_err());
    }
}
