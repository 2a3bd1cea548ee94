use std::collections::{BTreeMap, HashMap};

use gitlayer_core::{CommitId, Stage};

/// An in-memory [`Stage`]: bound commits per artifact, image labels and the
/// previous stage in the chain.
#[derive(Debug, Clone, Default)]
pub struct ImageStage {
    name: String,
    commits: HashMap<String, CommitId>,
    labels: BTreeMap<String, String>,
    previous: Option<Box<ImageStage>>,
}

impl ImageStage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Binds `commit` for the artifact identified by `paramshash`.
    pub fn bind(mut self, paramshash: &str, commit: CommitId) -> Self {
        self.commits.insert(paramshash.to_owned(), commit);
        self
    }

    pub fn after(mut self, previous: ImageStage) -> Self {
        self.previous = Some(Box::new(previous));
        self
    }

    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    /// Labels set on this stage's image, not including inherited ones.
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }
}

impl Stage for ImageStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn bound_commit(&self, artifact: &str) -> Option<CommitId> {
        self.commits.get(artifact).cloned()
    }

    fn previous_stage(&self) -> Option<&dyn Stage> {
        self.previous.as_deref().map(|s| s as &dyn Stage)
    }

    fn get_label(&self, key: &str) -> Option<String> {
        self.labels.get(key).cloned()
    }

    fn set_label(&mut self, key: &str, value: &str) {
        self.labels.insert(key.to_owned(), value.to_owned());
    }
}
