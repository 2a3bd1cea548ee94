use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use gitlayer_core::{CommitId, CommitRef, Delta, DiffOptions, LineOrigin, PathFilter, Repository};

type DiffKey = (CommitId, CommitId, PathFilter, DiffOptions);

/// Memoized delta ranges.
///
/// Text diffs are always forced so every delta carries hunks. In live mode
/// untracked files are included. Ranges ending at the working tree are never
/// cached.
#[derive(Debug, Default)]
pub struct DiffEngine {
    live: bool,
    cache: RefCell<HashMap<DiffKey, Arc<[Delta]>>>,
}

impl DiffEngine {
    pub fn new(live: bool) -> Self {
        Self {
            live,
            cache: RefCell::default(),
        }
    }

    pub fn options(&self) -> DiffOptions {
        DiffOptions {
            force_text: true,
            include_untracked: self.live,
            recurse_untracked_dirs: self.live,
        }
    }

    /// Deltas from `from` to `to` in the repository's traversal order.
    pub fn diff<R: Repository + ?Sized>(
        &self,
        repo: &R,
        from: &CommitId,
        to: &CommitRef,
        filter: &PathFilter,
    ) -> gitlayer_core::Result<Arc<[Delta]>> {
        let options = self.options();
        let CommitRef::Commit(to_commit) = to else {
            return Ok(repo.diff(from, to, filter, &options)?.into());
        };

        let key = (from.clone(), to_commit.clone(), filter.clone(), options);
        let cached = self.cache.borrow().get(&key).cloned();
        if let Some(deltas) = cached {
            tracing::debug!(from = %from, to = %to_commit, deltas = deltas.len(), "diff cache hit");
            return Ok(deltas);
        }

        let deltas: Arc<[Delta]> = repo.diff(from, to, filter, &options)?.into();
        self.cache.borrow_mut().insert(key, Arc::clone(&deltas));
        Ok(deltas)
    }
}

/// Bytes a patch adds or removes.
///
/// Added, deleted and binary lines count their content length; a changed
/// trailing newline counts one. Context and headers count nothing.
pub fn patch_size(deltas: &[Delta]) -> u64 {
    deltas
        .iter()
        .flat_map(|delta| &delta.hunks)
        .flat_map(|hunk| &hunk.lines)
        .map(|line| match line.origin {
            LineOrigin::EofNewlineAdded | LineOrigin::EofNewlineRemoved => 1,
            LineOrigin::Addition | LineOrigin::Deletion | LineOrigin::Binary => {
                line.content.len() as u64
            }
            LineOrigin::Context | LineOrigin::EofNoNewline => 0,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitlayer_core::{DeltaKind, DiffFile, DiffLine, Hunk};

    fn line(origin: LineOrigin, content: &str) -> DiffLine {
        DiffLine {
            origin,
            content: content.as_bytes().to_vec(),
        }
    }

    fn delta(lines: Vec<DiffLine>) -> Delta {
        Delta {
            kind: DeltaKind::Modified,
            old_file: DiffFile {
                path: "f".to_owned(),
                mode: 0o100644,
            },
            new_file: DiffFile {
                path: "f".to_owned(),
                mode: 0o100644,
            },
            header: vec![],
            hunks: vec![Hunk {
                header: "@@ -1,2 +1,2 @@".to_owned(),
                lines,
            }],
        }
    }

    #[test]
    fn patch_size_counts_changed_bytes() {
        let deltas = [delta(vec![
            line(LineOrigin::Context, "same\n"),
            line(LineOrigin::Deletion, "old\n"),
            line(LineOrigin::Addition, "newer\n"),
        ])];
        assert_eq!(patch_size(&deltas), 4 + 6);
    }

    #[test]
    fn patch_size_counts_newline_markers_once() {
        let deltas = [delta(vec![
            line(LineOrigin::Deletion, "x"),
            line(LineOrigin::EofNewlineAdded, "\n"),
            line(LineOrigin::Addition, "x\n"),
            line(LineOrigin::EofNoNewline, "\n"),
        ])];
        assert_eq!(patch_size(&deltas), 1 + 1 + 2);
    }

    #[test]
    fn patch_size_of_nothing_is_zero() {
        assert_eq!(patch_size(&[]), 0);
    }

    #[test]
    fn live_engine_includes_untracked_files() {
        let options = DiffEngine::new(true).options();
        assert!(options.force_text && options.include_untracked && options.recurse_untracked_dirs);

        let options = DiffEngine::new(false).options();
        assert!(options.force_text);
        assert!(!options.include_untracked);
    }
}
