use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use gitlayer_build::ImageStage;
use gitlayer_core::{CommitId, Stage};
use serde::{Deserialize, Serialize};

const STATE_FILE: &str = "stages.json";

/// What a finished stage left behind: the commit bound per artifact and the
/// labels set on its image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    #[serde(default)]
    pub commits: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Stage records persisted between invocations in `<host_dir>/stages.json`.
#[derive(Debug)]
pub struct StageStore {
    path: PathBuf,
    stages: BTreeMap<String, StageRecord>,
}

impl StageStore {
    pub fn load(host_dir: &Path) -> anyhow::Result<Self> {
        let path = host_dir.join(STATE_FILE);
        let stages = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, stages })
    }

    /// Rebuilds a recorded stage. Unknown names yield an empty stage.
    pub fn stage(&self, name: &str) -> ImageStage {
        let record = self.stages.get(name).cloned().unwrap_or_default();
        record
            .commits
            .into_iter()
            .fold(
                ImageStage::new(name).with_labels(record.labels),
                |stage, (paramshash, commit)| stage.bind(&paramshash, CommitId::new(commit)),
            )
    }

    /// Records that `stage` ran for `paramshash` at `commit`.
    pub fn save(
        &mut self,
        stage: &ImageStage,
        paramshash: &str,
        commit: &CommitId,
    ) -> anyhow::Result<()> {
        let record = self.stages.entry(stage.name().to_owned()).or_default();
        record
            .commits
            .insert(paramshash.to_owned(), commit.as_str().to_owned());
        record
            .labels
            .extend(stage.labels().iter().map(|(k, v)| (k.clone(), v.clone())));

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(&self.stages)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        tracing::debug!(stage = stage.name(), path = %self.path.display(), "stage recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_stage_round_trips() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut store = StageStore::load(tmp.path()).unwrap();

        let mut stage = ImageStage::new("archive");
        stage.set_label("gitlayer-git-p-type", "file");
        store.save(&stage, "p", &CommitId::new("c1")).unwrap();

        let reloaded = StageStore::load(tmp.path()).unwrap();
        let stage = reloaded.stage("archive");
        assert_eq!(stage.bound_commit("p"), Some(CommitId::new("c1")));
        assert_eq!(stage.get_label("gitlayer-git-p-type").as_deref(), Some("file"));
    }

    #[test]
    fn unknown_stage_is_empty() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = StageStore::load(tmp.path()).unwrap();
        let stage = store.stage("setup");
        assert_eq!(stage.name(), "setup");
        assert!(stage.labels().is_empty());
        assert_eq!(stage.bound_commit("p"), None);
    }
}
