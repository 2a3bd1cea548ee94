use std::cell::{OnceCell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use gitlayer_core::stage::inherited_label;
use gitlayer_core::{
    ArchiveKind, ArchiveStrategy, ArtifactConfig, CommitId, CommitRef, Delta, EntryKind, Error,
    GitlayerConfig, PathFilter, Repository, Stage, ToolsConfig, TreeEntry,
};

use crate::archive;
use crate::checksum;
use crate::commands::CommandBuilder;
use crate::diff::{self, DiffEngine};
use crate::layout::{self, Destination};
use crate::patch::PatchRewriter;
use crate::storage::{PayloadKind, PayloadStore};
use crate::tree::TreeReader;

/// Build-wide settings shared by every artifact.
#[derive(Debug, Clone)]
pub struct LayerOptions {
    /// Layer the working tree on top of the last committed state.
    pub dev_mode: bool,
    pub archive_strategy: ArchiveStrategy,
    pub tools: ToolsConfig,
    pub store: PayloadStore,
}

impl LayerOptions {
    pub fn from_config(project_dir: &Path, config: &GitlayerConfig) -> Self {
        Self {
            dev_mode: config.build.dev_mode,
            archive_strategy: config.build.archive_strategy,
            tools: config.tools.clone(),
            store: PayloadStore::from_config(project_dir, &config.storage),
        }
    }
}

/// One artifact synchronized into a sequence of build stages.
///
/// The first stage receives a full archive and records the archive kind as
/// a label on its image; later stages receive patches relocated according
/// to that label. Tree listings and diffs are memoized per instance, which
/// makes an instance single-threaded.
pub struct GitArtifact<R: Repository> {
    repo: R,
    config: ArtifactConfig,
    options: LayerOptions,
    workdir: String,
    filter: PathFilter,
    full_name: String,
    paramshash: String,
    live: bool,
    trees: TreeReader,
    diffs: DiffEngine,
    latest: OnceCell<CommitId>,
    dependency_checksums: RefCell<HashMap<(String, CommitId), String>>,
}

impl<R: Repository> GitArtifact<R> {
    pub fn new(repo: R, config: ArtifactConfig, options: LayerOptions) -> gitlayer_core::Result<Self> {
        config.validate()?;

        let workdir = config.workdir();
        let filter = PathFilter::resolve(
            &workdir,
            &config.include_paths,
            &config.exclude_paths,
            &repo.exclude_paths(),
        );
        let full_name = match &config.name {
            Some(name) => format!("{}_{name}", repo.name()),
            None => repo.name(),
        };
        let paramshash = checksum::paramshash(&full_name, &config);
        let live = options.dev_mode && repo.supports_working_tree();

        tracing::debug!(
            artifact = %full_name,
            paramshash = %paramshash,
            live,
            "configured git artifact"
        );

        Ok(Self {
            repo,
            config,
            options,
            workdir,
            filter,
            full_name,
            paramshash,
            live,
            trees: TreeReader::new(),
            diffs: DiffEngine::new(live),
            latest: OnceCell::new(),
            dependency_checksums: RefCell::default(),
        })
    }

    /// Repository name, suffixed with `_<name>` for named artifacts.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn paramshash(&self) -> &str {
        &self.paramshash
    }

    pub fn filter(&self) -> &PathFilter {
        &self.filter
    }

    /// Whether patches are taken against the working tree.
    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Stage label holding the archive kind.
    pub fn label_key(&self) -> String {
        format!("gitlayer-git-{}-type", self.paramshash)
    }

    /// The pinned commit, or the tip of the followed branch (`HEAD` when
    /// none is configured). Resolved once per instance.
    pub fn latest_commit(&self) -> gitlayer_core::Result<CommitId> {
        if let Some(commit) = self.latest.get() {
            return Ok(commit.clone());
        }

        let commit = match (&self.config.commit, &self.config.branch) {
            (Some(commit), _) => self.repo.resolve(commit)?,
            (None, branch) => self
                .repo
                .latest_commit(branch.as_deref().unwrap_or("HEAD"))?,
        };
        tracing::debug!(artifact = %self.full_name, commit = %commit, "resolved latest commit");
        Ok(self.latest.get_or_init(|| commit).clone())
    }

    /// Filtered entries at `at`, ordered by `(root, name)`.
    pub fn entries(&self, at: &CommitRef) -> gitlayer_core::Result<Arc<[TreeEntry]>> {
        self.trees.list(&self.repo, at, &self.filter)
    }

    /// Filtered deltas from `from` to `to`.
    pub fn deltas(&self, from: &CommitId, to: &CommitRef) -> gitlayer_core::Result<Arc<[Delta]>> {
        self.diffs.diff(&self.repo, from, to, &self.filter)
    }

    /// Classification of the filtered tree at `at`.
    pub fn archive_kind(&self, at: &CommitRef) -> gitlayer_core::Result<ArchiveKind> {
        Ok(layout::classify(&self.workdir, &self.entries(at)?))
    }

    /// Archive kind recorded by the archive stage on `stage` or one of its
    /// predecessors.
    pub fn recorded_archive_kind(&self, stage: &dyn Stage) -> gitlayer_core::Result<ArchiveKind> {
        let label = self.label_key();
        let value = inherited_label(stage, &label).ok_or_else(|| Error::MissingArchiveKind {
            label: label.clone(),
        })?;
        ArchiveKind::from_label(&value).ok_or_else(|| Error::Integrity {
            detail: format!("label {label} holds unknown archive kind '{value}'"),
        })
    }

    pub fn archive_any_changes(&self, stage: &dyn Stage) -> gitlayer_core::Result<bool> {
        let commit = self.stage_commit(stage)?;
        Ok(!self.entries(&commit.into())?.is_empty())
    }

    pub fn patch_any_changes(&self, stage: &dyn Stage) -> gitlayer_core::Result<bool> {
        let (from, to) = self.patch_range(stage)?;
        Ok(!self.deltas(&from, &to)?.is_empty())
    }

    /// Bytes changed between `from` and `to` under the artifact's filter.
    pub fn patch_size(&self, from: &CommitId, to: &CommitRef) -> gitlayer_core::Result<u64> {
        Ok(diff::patch_size(&self.deltas(from, to)?))
    }

    /// Commands extracting the full archive at the stage's commit.
    ///
    /// Records the archive kind on `stage`. Nothing is emitted when the
    /// filtered tree is empty.
    pub fn apply_archive_command(&self, stage: &mut dyn Stage) -> gitlayer_core::Result<Vec<String>> {
        let commit = self.stage_commit(stage)?;
        let entries = self.entries(&CommitRef::from(commit.clone()))?;
        if entries.is_empty() {
            tracing::debug!(artifact = %self.full_name, commit = %commit, "nothing to archive");
            return Ok(Vec::new());
        }

        let kind = layout::classify(&self.workdir, &entries);
        let label = self.label_key();
        match stage.get_label(&label) {
            Some(recorded) if recorded != kind.as_label() => {
                return Err(Error::Integrity {
                    detail: format!(
                        "stage {} already records {label}={recorded}, archive at {commit} is {}",
                        stage.name(),
                        kind.as_label()
                    ),
                });
            }
            Some(_) => {}
            None => stage.set_label(&label, kind.as_label()),
        }

        let destination = Destination::new(&self.workdir, &self.config.to, kind);
        let file_name = format!("{}_{commit}.tar", self.paramshash);
        let archive = self.store_archive(&file_name, &entries, &destination)?;

        let commands = self.commands();
        let dir = destination.target_dir();
        Ok(vec![
            commands.create_dir(dir),
            commands.extract_archive(&archive, dir),
        ])
    }

    /// Commands bringing the destination from the previous stage's commit
    /// to this stage's commit (or the working tree in live mode).
    ///
    /// Fails with [`Error::MissingArchiveKind`] when no archive stage has
    /// run. Nothing is emitted when the range has no changes.
    pub fn apply_patch_command(&self, stage: &dyn Stage) -> gitlayer_core::Result<Vec<String>> {
        let kind = self.recorded_archive_kind(stage)?;
        let destination = Destination::new(&self.workdir, &self.config.to, kind);
        let (from, to) = self.patch_range(stage)?;

        let deltas = self.deltas(&from, &to)?;
        if deltas.is_empty() {
            tracing::debug!(artifact = %self.full_name, from = %from, to = %to, "no changes to patch");
            return Ok(Vec::new());
        }

        let patches = PatchRewriter::new(&destination).rewrite_all(&deltas)?;
        match to {
            CommitRef::Commit(to) => {
                let file_name = format!("{}_{from}_{to}.patch", self.paramshash);
                let patch = self
                    .options
                    .store
                    .store(PayloadKind::Patch, &file_name, |file| {
                        use std::io::Write;
                        for patch in &patches {
                            file.write_all(patch).map_err(|e| Error::Payload {
                                path: file.path().to_path_buf(),
                                source: e,
                            })?;
                        }
                        Ok(())
                    })?;

                let commands = self.commands();
                let dir = destination.target_dir();
                Ok(vec![
                    commands.create_dir(dir),
                    commands.apply_patch(&patch, dir),
                ])
            }
            CommitRef::WorkingTree => self.live_commands(&from, &deltas, &patches, &destination),
        }
    }

    /// Fingerprint of the live patch from the latest commit to the working
    /// tree; `None` outside live mode or when the working tree is clean.
    pub fn dev_patch_hash(&self, stage: &dyn Stage) -> gitlayer_core::Result<Option<String>> {
        if !self.live {
            return Ok(None);
        }

        let from = self.latest_commit()?;
        let deltas = self.deltas(&from, &CommitRef::WorkingTree)?;
        if deltas.is_empty() {
            return Ok(None);
        }

        let kind = match self.recorded_archive_kind(stage) {
            Ok(kind) => kind,
            Err(Error::MissingArchiveKind { .. }) => self.archive_kind(&from.clone().into())?,
            Err(e) => return Err(e),
        };
        let destination = Destination::new(&self.workdir, &self.config.to, kind);
        let patches = PatchRewriter::new(&destination).rewrite_all(&deltas)?;
        Ok(checksum::patches_fingerprint(&patches))
    }

    /// Fingerprint of the files `stage` declares as dependencies, taken at
    /// the latest commit (the working tree in live mode).
    ///
    /// `None` when the stage declares no dependencies.
    pub fn stage_dependencies_checksum(&self, stage: &dyn Stage) -> gitlayer_core::Result<Option<String>> {
        let Some(paths) = self
            .config
            .stage_dependencies
            .get(stage.name())
            .filter(|paths| !paths.is_empty())
        else {
            return Ok(None);
        };

        let at = if self.live {
            CommitRef::WorkingTree
        } else {
            CommitRef::from(self.latest_commit()?)
        };
        let key = match &at {
            CommitRef::Commit(commit) => Some((stage.name().to_owned(), commit.clone())),
            CommitRef::WorkingTree => None,
        };
        if let Some(key) = &key {
            if let Some(checksum) = self.dependency_checksums.borrow().get(key) {
                return Ok(Some(checksum.clone()));
            }
        }

        let filter = PathFilter::for_paths(
            &self.workdir,
            paths,
            &self.config.exclude_paths,
            &self.repo.exclude_paths(),
        );
        self.reject_submodule_dependencies(&at, filter.include())?;
        let entries = self.trees.list(&self.repo, &at, &filter)?;
        if entries.is_empty() {
            tracing::warn!(
                artifact = %self.full_name,
                stage = stage.name(),
                dependencies = %paths.join(", "),
                "stage dependencies match no files"
            );
        }

        let checksum = checksum::tree_fingerprint(&self.repo, &entries)?;
        if let Some(key) = key {
            self.dependency_checksums
                .borrow_mut()
                .insert(key, checksum.clone());
        }
        Ok(Some(checksum))
    }

    /// Gitlinks have no content to fingerprint, whether a dependency names
    /// one directly or a path inside it.
    fn reject_submodule_dependencies(
        &self,
        at: &CommitRef,
        dependencies: &[String],
    ) -> gitlayer_core::Result<()> {
        let tree = self.trees.list(&self.repo, at, &PathFilter::default())?;
        for entry in tree.iter().filter(|entry| entry.kind == EntryKind::Submodule) {
            let path = entry.path();
            let inside = format!("{path}/");
            if dependencies
                .iter()
                .any(|dependency| *dependency == path || dependency.starts_with(&inside))
            {
                return Err(Error::SubmoduleNotSupported { path });
            }
        }
        Ok(())
    }

    fn stage_commit(&self, stage: &dyn Stage) -> gitlayer_core::Result<CommitId> {
        match stage.bound_commit(&self.paramshash) {
            Some(commit) => Ok(commit),
            None => self.latest_commit(),
        }
    }

    fn patch_range(&self, stage: &dyn Stage) -> gitlayer_core::Result<(CommitId, CommitRef)> {
        let previous = stage
            .previous_stage()
            .ok_or_else(|| Error::MissingArchiveKind {
                label: self.label_key(),
            })?;
        let from = self.stage_commit(previous)?;
        let to = if self.live {
            CommitRef::WorkingTree
        } else {
            CommitRef::from(self.stage_commit(stage)?)
        };
        Ok((from, to))
    }

    /// Live edits are shipped as an archive of the changed files: changed
    /// paths are removed first, so deletions and type changes need no patch.
    fn live_commands(
        &self,
        from: &CommitId,
        deltas: &[Delta],
        patches: &[Vec<u8>],
        destination: &Destination<'_>,
    ) -> gitlayer_core::Result<Vec<String>> {
        let Some(fingerprint) = checksum::patches_fingerprint(patches) else {
            return Ok(Vec::new());
        };

        let changed: BTreeSet<&str> = deltas.iter().map(Delta::path).collect();
        let removed: Vec<String> = match destination.kind() {
            ArchiveKind::Directory => changed
                .iter()
                .filter_map(|path| destination.native_path(path))
                .map(|native| format!("{}/{native}", self.config.to.trim_end_matches('/')))
                .collect(),
            ArchiveKind::File => vec![self.config.to.clone()],
        };

        let entries: Vec<TreeEntry> = self
            .entries(&CommitRef::WorkingTree)?
            .iter()
            .filter(|entry| changed.contains(entry.path().as_str()))
            .cloned()
            .collect();
        let file_name = format!("{}_{from}_live-{fingerprint}.tar", self.paramshash);
        let archive = self.store_archive(&file_name, &entries, destination)?;

        let commands = self.commands();
        let dir = destination.target_dir();
        Ok(vec![
            commands.remove(&removed),
            commands.create_dir(dir),
            commands.extract_archive(&archive, dir),
        ])
    }

    fn store_archive(
        &self,
        file_name: &str,
        entries: &[TreeEntry],
        destination: &Destination<'_>,
    ) -> gitlayer_core::Result<String> {
        self.options
            .store
            .store(PayloadKind::Archive, file_name, |file| {
                let archived = archive::collect_entries(&self.repo, entries, destination)?;
                archive::write_archive(self.options.archive_strategy, &archived, file)
                    .map_err(|e| e.into_error(file.path()))
            })
    }

    fn commands(&self) -> CommandBuilder<'_> {
        CommandBuilder::new(
            &self.options.tools,
            self.config.owner.as_deref(),
            self.config.group.as_deref(),
        )
    }
}
