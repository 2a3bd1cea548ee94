//! Core types and configuration for gitlayer.
//!
//! This crate defines the `gitlayer.toml` schema ([`GitlayerConfig`]), the
//! data model shared by the layering engine (commits, tree entries, deltas),
//! path filter resolution ([`PathFilter`]) and the two collaborator traits
//! the engine is driven through: [`Repository`] and [`Stage`].

pub mod config;
pub mod error;
pub mod filter;
pub mod quote;
pub mod repository;
pub mod stage;
pub mod types;

pub use config::{
    ArchiveStrategy, ArtifactConfig, BuildSettings, GitlayerConfig, RepositoryConfig,
    StorageConfig, ToolsConfig,
};
pub use error::{Error, Result};
pub use filter::PathFilter;
pub use repository::Repository;
pub use stage::Stage;
pub use types::{
    ArchiveKind, CommitId, CommitRef, Delta, DeltaKind, DiffFile, DiffLine, DiffOptions,
    EntryKind, Hunk, LineOrigin, ObjectId, TreeEntry,
};
