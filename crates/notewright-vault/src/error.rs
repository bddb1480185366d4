//! Vault error type.

use thiserror::Error;

/// Failures a vault operation can produce.
///
/// `NotFound` and `AlreadyExists` are the two conditions the agent core
/// reports back to the model as recoverable tool failures; `Io` and
/// `InvalidPath` surface the same way but indicate host-side trouble.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid vault path: {0}")]
    InvalidPath(String),

    #[error("vault I/O error: {0}")]
    Io(#[from] std::io::Error),
}
