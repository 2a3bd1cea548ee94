use std::path::{Path, PathBuf};

use gitlayer_core::{
    CommitId, CommitRef, Delta, DiffOptions, ObjectId, PathFilter, Repository, TreeEntry,
};

use crate::error::GitError;
use crate::executor::{GitExecutor, RealExecutor};
use crate::parse;

/// A [`Repository`] backed by the git CLI, parameterized over the executor
/// for testability.
pub struct GitRepository<E: GitExecutor = RealExecutor> {
    workdir: PathBuf,
    name: String,
    exclude_paths: Vec<String>,
    working_tree: bool,
    executor: E,
}

impl GitRepository<RealExecutor> {
    /// Opens the repository whose working tree is rooted at `workdir`.
    pub fn open(workdir: impl Into<PathBuf>) -> Self {
        Self::with_executor(workdir, RealExecutor::default())
    }
}

impl<E: GitExecutor> GitRepository<E> {
    pub fn with_executor(workdir: impl Into<PathBuf>, executor: E) -> Self {
        let workdir = workdir.into();
        let name = workdir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "repo".to_owned());
        Self {
            workdir,
            name,
            exclude_paths: Vec::new(),
            working_tree: true,
            executor,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn excluding(mut self, paths: Vec<String>) -> Self {
        self.exclude_paths = paths;
        self
    }

    /// Marks the repository as a read-only clone: the working tree is never
    /// consulted.
    pub fn read_only(mut self) -> Self {
        self.working_tree = false;
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn git(&self, args: &[&str]) -> Result<Vec<u8>, GitError> {
        self.git_with_env(args, &[])
    }

    fn git_with_env(&self, args: &[&str], env: &[(String, String)]) -> Result<Vec<u8>, GitError> {
        let args: Vec<String> = args.iter().map(|s| (*s).to_owned()).collect();
        self.executor.exec(&self.workdir, &args, env)
    }

    /// Tree-ish naming the requested snapshot. The working tree is captured
    /// as a tree object through a throwaway index.
    fn tree_ish(&self, at: &CommitRef, include_untracked: bool) -> gitlayer_core::Result<String> {
        match at {
            CommitRef::Commit(id) => Ok(id.as_str().to_owned()),
            CommitRef::WorkingTree if self.working_tree => {
                Ok(self.snapshot_working_tree(include_untracked)?)
            }
            CommitRef::WorkingTree => Err(gitlayer_core::Error::WorkingTreeUnsupported {
                repository: self.name.clone(),
            }),
        }
    }

    fn snapshot_working_tree(&self, include_untracked: bool) -> Result<String, GitError> {
        let scratch = tempfile::TempDir::new().map_err(|e| GitError::Io {
            path: std::env::temp_dir(),
            source: e,
        })?;
        let index = scratch.path().join("index");

        let real_index = stdout_line(self.git(&["rev-parse", "--git-path", "index"])?)?;
        let real_index = self.workdir.join(real_index);
        if real_index.exists() {
            std::fs::copy(&real_index, &index).map_err(|e| GitError::Io {
                path: real_index.clone(),
                source: e,
            })?;
        }

        let env = [(
            "GIT_INDEX_FILE".to_owned(),
            index.to_string_lossy().into_owned(),
        )];
        let stage = if include_untracked { "-A" } else { "-u" };
        self.git_with_env(&["add", stage, "--", "."], &env)?;
        let tree = stdout_line(self.git_with_env(&["write-tree"], &env)?)?;

        tracing::debug!(tree = %tree, untracked = include_untracked, "captured working tree");
        Ok(tree)
    }
}

fn stdout_line(output: Vec<u8>) -> Result<String, GitError> {
    let text = String::from_utf8(output).map_err(|e| GitError::Parse {
        detail: format!("git output is not valid UTF-8: {e}"),
    })?;
    let line = text.trim();
    if line.is_empty() {
        return Err(GitError::Parse {
            detail: "git produced no output".to_owned(),
        });
    }
    Ok(line.to_owned())
}

impl<E: GitExecutor> Repository for GitRepository<E> {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn exclude_paths(&self) -> Vec<String> {
        self.exclude_paths.clone()
    }

    fn supports_working_tree(&self) -> bool {
        self.working_tree
    }

    fn resolve(&self, reference: &str) -> gitlayer_core::Result<CommitId> {
        let revision = format!("{reference}^{{commit}}");
        match self.git(&["rev-parse", "--verify", "--quiet", &revision]) {
            Ok(output) => Ok(CommitId::new(stdout_line(output)?)),
            Err(GitError::CommandFailed { .. }) => Err(gitlayer_core::Error::NotFound {
                reference: format!("revision '{reference}'"),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn latest_commit(&self, branch: &str) -> gitlayer_core::Result<CommitId> {
        self.resolve(branch)
    }

    fn list_entries(
        &self,
        at: &CommitRef,
        filter: &PathFilter,
    ) -> gitlayer_core::Result<Vec<TreeEntry>> {
        let tree = self.tree_ish(at, true)?;
        let output = match self.git(&["ls-tree", "-r", "-z", "--full-tree", &tree]) {
            Ok(output) => output,
            Err(GitError::CommandFailed { .. }) => {
                return Err(gitlayer_core::Error::NotFound {
                    reference: format!("tree '{tree}'"),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let mut entries = parse::parse_ls_tree(&output, |path| filter.matches(path))?;
        entries.sort_by(|a, b| (&a.root, &a.name).cmp(&(&b.root, &b.name)));
        Ok(entries)
    }

    fn diff(
        &self,
        from: &CommitId,
        to: &CommitRef,
        filter: &PathFilter,
        options: &DiffOptions,
    ) -> gitlayer_core::Result<Vec<Delta>> {
        let include_untracked = options.include_untracked && options.recurse_untracked_dirs;
        let to = self.tree_ish(to, include_untracked)?;

        let mut args = vec![
            "-c",
            "core.quotePath=false",
            "diff",
            "--no-color",
            "--no-ext-diff",
            "--no-textconv",
            "--no-renames",
            "--src-prefix=a/",
            "--dst-prefix=b/",
        ];
        if options.force_text {
            args.push("--text");
        }
        args.push(from.as_str());
        args.push(&to);

        let output = match self.git(&args) {
            Ok(output) => output,
            Err(GitError::CommandFailed { .. }) => {
                return Err(gitlayer_core::Error::NotFound {
                    reference: format!("range {from}..{to}"),
                });
            }
            Err(e) => return Err(e.into()),
        };

        Ok(parse::parse_diff(&output, |path| filter.matches(path))?)
    }

    fn read_blob(&self, id: &ObjectId) -> gitlayer_core::Result<Vec<u8>> {
        match self.git(&["cat-file", "blob", id.as_str()]) {
            Ok(content) => Ok(content),
            Err(GitError::CommandFailed { .. }) => Err(gitlayer_core::Error::NotFound {
                reference: format!("blob {id}"),
            }),
            Err(e) => Err(e.into()),
        }
    }
}
