use std::sync::Arc;

use crate::filter::PathFilter;
use crate::types::{CommitId, CommitRef, Delta, DiffOptions, ObjectId, TreeEntry};

/// Version-control collaborator consumed by the layering engine.
///
/// Implementations apply `filter` themselves (see [`PathFilter::matches`]) and
/// return deltas in their own traversal order.
pub trait Repository {
    /// Short repository name, the first component of an artifact's full name.
    fn name(&self) -> String;

    /// Repository-level excludes applied to every artifact.
    fn exclude_paths(&self) -> Vec<String>;

    /// Whether [`CommitRef::WorkingTree`] may be queried. Only the repository
    /// owned by the build itself has a working tree.
    fn supports_working_tree(&self) -> bool;

    /// Resolve a reference (commit id, tag, branch) to a commit.
    fn resolve(&self, reference: &str) -> crate::Result<CommitId>;

    /// Tip of the given branch.
    fn latest_commit(&self, branch: &str) -> crate::Result<CommitId>;

    /// Non-tree entries of the snapshot that pass `filter`.
    fn list_entries(&self, at: &CommitRef, filter: &PathFilter) -> crate::Result<Vec<TreeEntry>>;

    /// Per-file deltas from `from` to `to` for paths passing `filter`.
    fn diff(
        &self,
        from: &CommitId,
        to: &CommitRef,
        filter: &PathFilter,
        options: &DiffOptions,
    ) -> crate::Result<Vec<Delta>>;

    fn read_blob(&self, id: &ObjectId) -> crate::Result<Vec<u8>>;
}

macro_rules! forward_repository {
    ($($ty:ty),*) => {$(
        impl<T: Repository + ?Sized> Repository for $ty {
            fn name(&self) -> String {
                (**self).name()
            }

            fn exclude_paths(&self) -> Vec<String> {
                (**self).exclude_paths()
            }

            fn supports_working_tree(&self) -> bool {
                (**self).supports_working_tree()
            }

            fn resolve(&self, reference: &str) -> crate::Result<CommitId> {
                (**self).resolve(reference)
            }

            fn latest_commit(&self, branch: &str) -> crate::Result<CommitId> {
                (**self).latest_commit(branch)
            }

            fn list_entries(&self, at: &CommitRef, filter: &PathFilter) -> crate::Result<Vec<TreeEntry>> {
                (**self).list_entries(at, filter)
            }

            fn diff(
                &self,
                from: &CommitId,
                to: &CommitRef,
                filter: &PathFilter,
                options: &DiffOptions,
            ) -> crate::Result<Vec<Delta>> {
                (**self).diff(from, to, filter, options)
            }

            fn read_blob(&self, id: &ObjectId) -> crate::Result<Vec<u8>> {
                (**self).read_blob(id)
            }
        }
    )*};
}

forward_repository!(&T, Box<T>, Arc<T>);
