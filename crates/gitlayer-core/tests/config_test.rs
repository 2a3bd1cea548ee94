use gitlayer_core::{ArchiveStrategy, ArtifactConfig, Error, GitlayerConfig};
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn load_returns_defaults_when_no_config_file() {
    let tmp = TempDir::new().unwrap();
    let config = GitlayerConfig::load(tmp.path()).unwrap();

    assert!(config.repository.name.is_none());
    assert_eq!(config.repository.path, PathBuf::from("."));
    assert!(config.repository.exclude_paths.is_empty());
    assert!(!config.build.dev_mode);
    assert_eq!(config.build.archive_strategy, ArchiveStrategy::Builtin);
    assert_eq!(config.storage.host_dir, PathBuf::from(".gitlayer/tmp"));
    assert_eq!(config.storage.container_dir, "/.gitlayer/tmp");
    assert_eq!(config.tools.install, "install");
    assert_eq!(config.tools.tar, "tar");
    assert_eq!(config.tools.git, "git");
    assert_eq!(config.tools.rm, "rm");
    assert_eq!(config.tools.sudo, "sudo");
    assert!(config.artifacts.is_empty());
}

#[test]
fn load_parses_full_config() {
    let tmp = TempDir::new().unwrap();
    let toml = r#"
[repository]
name = "app"
path = "src-repo"
exclude_paths = [".gitlayer"]

[build]
dev_mode = true
archive_strategy = "system-tar"

[storage]
host_dir = "/var/tmp/gitlayer"
container_dir = "/.build/tmp"

[tools]
install = "/usr/bin/install"
tar = "/bin/tar"
git = "/usr/bin/git"
rm = "/bin/rm"
sudo = "/usr/bin/sudo"

[[artifacts]]
name = "assets"
to = "/app/assets"
cwd = "web/assets/"
include_paths = ["css", "js"]
exclude_paths = ["js/vendor"]
owner = "app"
group = "app"
branch = "main"

[artifacts.stage_dependencies]
install = ["package.json", "yarn.lock"]

[[artifacts]]
to = "/app"
commit = "0123abcd"
"#;
    std::fs::write(tmp.path().join("gitlayer.toml"), toml).unwrap();

    let config = GitlayerConfig::load(tmp.path()).unwrap();

    assert_eq!(config.repository.name.as_deref(), Some("app"));
    assert_eq!(config.repository.path, PathBuf::from("src-repo"));
    assert_eq!(config.repository.exclude_paths, vec![".gitlayer"]);
    assert!(config.build.dev_mode);
    assert_eq!(config.build.archive_strategy, ArchiveStrategy::SystemTar);
    assert_eq!(config.storage.host_dir, PathBuf::from("/var/tmp/gitlayer"));
    assert_eq!(config.storage.container_dir, "/.build/tmp");
    assert_eq!(config.tools.sudo, "/usr/bin/sudo");

    assert_eq!(config.artifacts.len(), 2);
    let assets = config.artifact(Some("assets")).unwrap();
    assert_eq!(assets.to, "/app/assets");
    assert_eq!(assets.workdir(), "web/assets");
    assert_eq!(assets.include_paths, vec!["css", "js"]);
    assert_eq!(assets.exclude_paths, vec!["js/vendor"]);
    assert_eq!(assets.owner.as_deref(), Some("app"));
    assert_eq!(assets.branch.as_deref(), Some("main"));
    assert_eq!(
        assets.stage_dependencies["install"],
        vec!["package.json", "yarn.lock"]
    );

    let unnamed = config.artifact(None).unwrap();
    assert_eq!(unnamed.commit.as_deref(), Some("0123abcd"));
    assert_eq!(unnamed.workdir(), "");
}

#[test]
fn load_partial_config_fills_defaults() {
    let tmp = TempDir::new().unwrap();
    let toml = r#"
[build]
dev_mode = true
"#;
    std::fs::write(tmp.path().join("gitlayer.toml"), toml).unwrap();

    let config = GitlayerConfig::load(tmp.path()).unwrap();

    assert!(config.build.dev_mode);
    // Defaults preserved
    assert_eq!(config.build.archive_strategy, ArchiveStrategy::Builtin);
    assert_eq!(config.storage.container_dir, "/.gitlayer/tmp");
    assert_eq!(config.tools.git, "git");
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("gitlayer.toml"), "not valid {{{{ toml").unwrap();

    let result = GitlayerConfig::load(tmp.path());
    assert!(result.is_err());

    let err = result.unwrap_err().to_string();
    assert!(err.contains("parse"));
}

#[test]
fn load_empty_config_returns_defaults() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("gitlayer.toml"), "").unwrap();

    let config = GitlayerConfig::load(tmp.path()).unwrap();
    assert!(config.artifacts.is_empty());
}

#[test]
fn load_rejects_invalid_artifact() {
    let tmp = TempDir::new().unwrap();
    let toml = r#"
[[artifacts]]
name = "bad name"
to = "/app"
"#;
    std::fs::write(tmp.path().join("gitlayer.toml"), toml).unwrap();

    let result = GitlayerConfig::load(tmp.path());
    assert!(matches!(result, Err(Error::Config { .. })));
}

// ── Artifact validation ──

fn artifact(to: &str) -> ArtifactConfig {
    ArtifactConfig {
        to: to.to_owned(),
        ..Default::default()
    }
}

#[test]
fn validate_accepts_minimal_artifact() {
    assert!(artifact("/dest").validate().is_ok());
}

#[test]
fn validate_requires_absolute_destination() {
    let err = artifact("dest").validate().unwrap_err();
    assert!(err.to_string().contains("absolute"));
}

#[test]
fn validate_rejects_malformed_names() {
    for name in ["", "a b", "a/b", "a:::b"] {
        let config = ArtifactConfig {
            name: Some(name.to_owned()),
            ..artifact("/dest")
        };
        assert!(
            matches!(config.validate(), Err(Error::Config { .. })),
            "name {name:?} should be rejected"
        );
    }

    let config = ArtifactConfig {
        name: Some("web-assets_v1.2".to_owned()),
        ..artifact("/dest")
    };
    assert!(config.validate().is_ok());
}

#[test]
fn validate_rejects_empty_owner_or_group() {
    let owner = ArtifactConfig {
        owner: Some(String::new()),
        ..artifact("/dest")
    };
    assert!(owner.validate().is_err());

    let group = ArtifactConfig {
        group: Some(String::new()),
        ..artifact("/dest")
    };
    assert!(group.validate().is_err());
}
