//! A git CLI backed [`Repository`](gitlayer_core::Repository).
//!
//! Committed snapshots are read with `git ls-tree` / `git diff` / `git cat-file`.
//! The working tree is captured as a tree object through a temporary
//! `GIT_INDEX_FILE` (`git add -A` + `git write-tree`), so live and committed
//! snapshots go through the same listing and diff code.

pub mod error;
pub mod executor;
pub mod parse;
pub mod repository;

pub use error::GitError;
pub use executor::{GitExecutor, RealExecutor};
pub use repository::GitRepository;
