use gitlayer_core::{CommitId, CommitRef, DiffOptions, Error, PathFilter, Repository};
use gitlayer_git::executor::GitExecutor;
use gitlayer_git::{GitError, GitRepository};
use mockall::mock;
use std::path::Path;

mock! {
    Executor {}

    impl GitExecutor for Executor {
        fn exec(
            &self,
            dir: &Path,
            args: &[String],
            env: &[(String, String)],
        ) -> Result<Vec<u8>, GitError>;
    }
}

fn has(args: &[String], word: &str) -> bool {
    args.iter().any(|a| a == word)
}

fn failed() -> GitError {
    GitError::CommandFailed {
        args: vec![],
        stderr: "fatal: bad revision".to_owned(),
    }
}

// ── resolve ──

#[test]
fn resolve_returns_commit_id() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|_, args, _| has(args, "rev-parse") && has(args, "main^{commit}"))
        .returning(|_, _, _| Ok(b"0123abcd\n".to_vec()));

    let repo = GitRepository::with_executor("/repo", mock);
    assert_eq!(repo.resolve("main").unwrap(), CommitId::new("0123abcd"));
}

#[test]
fn resolve_unknown_reference_is_not_found() {
    let mut mock = MockExecutor::new();
    mock.expect_exec().returning(|_, _, _| Err(failed()));

    let repo = GitRepository::with_executor("/repo", mock);
    let result = repo.latest_commit("ghost");

    assert!(matches!(result, Err(Error::NotFound { ref reference }) if reference.contains("ghost")));
}

#[test]
fn missing_git_binary_is_a_backend_error() {
    let mut mock = MockExecutor::new();
    mock.expect_exec().returning(|_, _, _| {
        Err(GitError::NotFound {
            program: "git".to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        })
    });

    let repo = GitRepository::with_executor("/repo", mock);
    assert!(matches!(repo.resolve("HEAD"), Err(Error::Backend(_))));
}

// ── list_entries ──

#[test]
fn list_entries_filters_and_sorts() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|dir, args, _| dir.ends_with("repo") && has(args, "ls-tree") && has(args, "c1"))
        .returning(|_, _, _| {
            Ok(b"100644 blob b1\tz/data.txt\0100644 blob b2\tx/data.txt\0100755 blob b3\tx/y/run.sh\0"
                .to_vec())
        });

    let repo = GitRepository::with_executor("/repo", mock);
    let filter = PathFilter::resolve("", &["x/y".to_owned(), "z".to_owned()], &[], &[]);
    let entries = repo
        .list_entries(&CommitRef::Commit(CommitId::new("c1")), &filter)
        .unwrap();

    let paths: Vec<String> = entries.iter().map(|e| e.path()).collect();
    assert_eq!(paths, vec!["x/y/run.sh", "z/data.txt"]);
    assert_eq!(entries[0].mode, 0o100755);
}

#[test]
fn list_entries_of_unknown_commit_is_not_found() {
    let mut mock = MockExecutor::new();
    mock.expect_exec().returning(|_, _, _| Err(failed()));

    let repo = GitRepository::with_executor("/repo", mock);
    let result = repo.list_entries(
        &CommitRef::Commit(CommitId::new("deadbeef")),
        &PathFilter::default(),
    );
    assert!(matches!(result, Err(Error::NotFound { .. })));
}

#[test]
fn read_only_repository_rejects_working_tree() {
    let mock = MockExecutor::new();
    let repo = GitRepository::with_executor("/repo", mock)
        .named("remote")
        .read_only();

    assert!(!repo.supports_working_tree());
    let result = repo.list_entries(&CommitRef::WorkingTree, &PathFilter::default());
    assert!(matches!(
        result,
        Err(Error::WorkingTreeUnsupported { ref repository }) if repository == "remote"
    ));
}

#[test]
fn working_tree_is_captured_through_a_temporary_index() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|_, args, env| has(args, "--git-path") && env.is_empty())
        .returning(|_, _, _| Ok(b"/nonexistent/index\n".to_vec()));
    mock.expect_exec()
        .withf(|_, args, env| {
            has(args, "add") && has(args, "-A") && env.iter().any(|(k, _)| k == "GIT_INDEX_FILE")
        })
        .times(1)
        .returning(|_, _, _| Ok(Vec::new()));
    mock.expect_exec()
        .withf(|_, args, env| has(args, "write-tree") && !env.is_empty())
        .returning(|_, _, _| Ok(b"tree123\n".to_vec()));
    mock.expect_exec()
        .withf(|_, args, _| has(args, "ls-tree") && has(args, "tree123"))
        .returning(|_, _, _| Ok(b"100644 blob b1\tuntracked.txt\0".to_vec()));

    let repo = GitRepository::with_executor("/repo", mock);
    let entries = repo
        .list_entries(&CommitRef::WorkingTree, &PathFilter::default())
        .unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "untracked.txt");
}

// ── diff ──

#[test]
fn diff_forces_text_and_filters_deltas() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|_, args, _| {
            has(args, "diff")
                && has(args, "--text")
                && has(args, "--no-renames")
                && has(args, "c1")
                && has(args, "c2")
        })
        .returning(|_, _, _| {
            Ok(b"diff --git a/a/data.txt b/a/data.txt
index 1..2 100644
--- a/a/data.txt
+++ b/a/data.txt
@@ -1 +1 @@
-x
+y
diff --git a/b/other.txt b/b/other.txt
index 3..4 100644
--- a/b/other.txt
+++ b/b/other.txt
@@ -1 +1 @@
-x
+y
"
            .to_vec())
        });

    let repo = GitRepository::with_executor("/repo", mock);
    let options = DiffOptions {
        force_text: true,
        ..Default::default()
    };
    let deltas = repo
        .diff(
            &CommitId::new("c1"),
            &CommitRef::Commit(CommitId::new("c2")),
            &PathFilter::resolve("a", &[], &[], &[]),
            &options,
        )
        .unwrap();

    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].path(), "a/data.txt");
}

#[test]
fn malformed_diff_is_an_integrity_error() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .returning(|_, _, _| Ok(b"garbage without header\n".to_vec()));

    let repo = GitRepository::with_executor("/repo", mock);
    let result = repo.diff(
        &CommitId::new("c1"),
        &CommitRef::Commit(CommitId::new("c2")),
        &PathFilter::default(),
        &DiffOptions::default(),
    );
    assert!(matches!(result, Err(Error::Integrity { .. })));
}

#[test]
fn read_blob_of_unknown_object_is_not_found() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|_, args, _| has(args, "cat-file"))
        .returning(|_, _, _| Err(failed()));

    let repo = GitRepository::with_executor("/repo", mock);
    let result = repo.read_blob(&gitlayer_core::ObjectId::new("ffff"));
    assert!(matches!(result, Err(Error::NotFound { .. })));
}
