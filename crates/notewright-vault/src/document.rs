//! Document data model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One document in the vault, as seen by listings and metadata queries.
///
/// The body is not carried here — it is read separately through the store,
/// so listing a large vault stays cheap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// `/`-delimited vault-relative path, e.g. `projects/roadmap.md`.
    pub path: String,
    /// Body size in bytes.
    pub size: u64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Document {
    /// File name without the trailing extension — the identifier hosting
    /// UIs display as the note title.
    pub fn name(&self) -> &str {
        name_of(&self.path)
    }
}

/// Metadata derived from a document's body rather than stored alongside it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DerivedMetadata {
    /// Front-matter key/value mapping (YAML between leading `---` fences).
    pub frontmatter: BTreeMap<String, serde_json::Value>,
    /// Outgoing wiki-link targets, in order of first appearance.
    pub links: Vec<String>,
    /// Tag strings without the leading `#`, deduplicated.
    pub tags: Vec<String>,
}

/// File name without extension for a vault path.
pub fn name_of(path: &str) -> &str {
    let base = path.rsplit('/').next().unwrap_or(path);
    match base.rfind('.') {
        Some(dot) if dot > 0 => &base[..dot],
        _ => base,
    }
}

/// Parent folder of a vault path, without trailing separator. Empty for
/// root-level documents.
pub fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(sep) => &path[..sep],
        None => "",
    }
}
