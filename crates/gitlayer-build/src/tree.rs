use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use gitlayer_core::{CommitId, CommitRef, PathFilter, Repository, TreeEntry};

/// Memoized tree listings.
///
/// Listings at a commit are cached by `(commit, filter)` for the reader's
/// lifetime. Working tree listings are always recomputed. Not shared between
/// threads.
#[derive(Debug, Default)]
pub struct TreeReader {
    cache: RefCell<HashMap<(CommitId, PathFilter), Arc<[TreeEntry]>>>,
}

impl TreeReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filtered entries at `at`, ordered by `(root, name)`.
    pub fn list<R: Repository + ?Sized>(
        &self,
        repo: &R,
        at: &CommitRef,
        filter: &PathFilter,
    ) -> gitlayer_core::Result<Arc<[TreeEntry]>> {
        let CommitRef::Commit(commit) = at else {
            return Ok(sorted(repo.list_entries(at, filter)?));
        };

        let key = (commit.clone(), filter.clone());
        let cached = self.cache.borrow().get(&key).cloned();
        if let Some(entries) = cached {
            tracing::debug!(commit = %commit, entries = entries.len(), "tree listing cache hit");
            return Ok(entries);
        }

        let entries = sorted(repo.list_entries(at, filter)?);
        self.cache.borrow_mut().insert(key, Arc::clone(&entries));
        Ok(entries)
    }
}

fn sorted(mut entries: Vec<TreeEntry>) -> Arc<[TreeEntry]> {
    entries.sort_by(|a, b| (&a.root, &a.name).cmp(&(&b.root, &b.name)));
    entries.into()
}
