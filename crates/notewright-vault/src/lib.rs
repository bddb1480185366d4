//! Markdown vault abstraction for Notewright.
//!
//! A vault is a tree of text documents addressed by `/`-delimited paths,
//! plus purely organizational folder nodes. This crate defines:
//!
//! - the data model (`Document`, `DerivedMetadata`)
//! - the narrow capability interface the agent core consumes (`VaultStore`)
//! - two implementations: `MemoryVault` (tests, embedders) and `FsVault`
//!   (directory-backed, reversible delete via `.trash/`)
//! - derived-metadata extraction (front-matter, wiki links, tags)

pub mod document;
pub mod error;
pub mod fs;
pub mod memory;
pub mod meta;
pub mod store;

pub use document::{DerivedMetadata, Document};
pub use error::VaultError;
pub use fs::FsVault;
pub use memory::MemoryVault;
pub use store::VaultStore;
