use crate::types::CommitId;

/// A build stage as seen by an artifact: a bound commit per artifact, a
/// link to the previous stage and the label store of the stage's image.
pub trait Stage {
    fn name(&self) -> &str;

    /// Commit this stage is bound to for the artifact identified by
    /// `artifact` (its parameter fingerprint).
    fn bound_commit(&self, artifact: &str) -> Option<CommitId>;

    fn previous_stage(&self) -> Option<&dyn Stage>;

    fn get_label(&self, key: &str) -> Option<String>;

    fn set_label(&mut self, key: &str, value: &str);
}

/// Looks `key` up on `stage` and then on each previous stage, mirroring how
/// images inherit the labels of their parents.
pub fn inherited_label(stage: &dyn Stage, key: &str) -> Option<String> {
    let mut current = Some(stage);
    while let Some(s) = current {
        if let Some(value) = s.get_label(key) {
            return Some(value);
        }
        current = s.previous_stage();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeStage {
        name: String,
        labels: HashMap<String, String>,
        previous: Option<Box<FakeStage>>,
    }

    impl Stage for FakeStage {
        fn name(&self) -> &str {
            &self.name
        }

        fn bound_commit(&self, _artifact: &str) -> Option<CommitId> {
            None
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

    fn stage(name: &str, previous: Option<FakeStage>) -> FakeStage {
        FakeStage {
            name: name.to_owned(),
            labels: HashMap::new(),
            previous: previous.map(Box::new),
        }
    }

    #[test]
    fn label_is_found_on_an_ancestor() {
        let mut archive = stage("archive", None);
        archive.set_label("kind", "file");
        let install = stage("install", Some(archive));
        let setup = stage("setup", Some(install));

        assert_eq!(setup.name(), "setup");
        assert_eq!(inherited_label(&setup, "kind").as_deref(), Some("file"));
        assert_eq!(inherited_label(&setup, "missing"), None);
    }

    #[test]
    fn nearest_label_wins() {
        let mut archive = stage("archive", None);
        archive.set_label("kind", "file");
        let mut install = stage("install", Some(archive));
        install.set_label("kind", "directory");

        assert_eq!(inherited_label(&install, "kind").as_deref(), Some("directory"));
    }
}
