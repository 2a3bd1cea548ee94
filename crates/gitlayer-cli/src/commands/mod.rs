mod inspect;
mod layer;

use std::path::Path;

use anyhow::Context;
use gitlayer_build::{GitArtifact, LayerOptions};
use gitlayer_core::GitlayerConfig;
use gitlayer_git::GitRepository;

pub use inspect::{deps_checksum, dev_hash, paramshash};
pub use layer::{archive, patch};

/// The selected artifact of a loaded project.
struct Project {
    artifact: GitArtifact<GitRepository>,
    options: LayerOptions,
}

fn open_project(project_dir: &Path, artifact: Option<&str>) -> anyhow::Result<Project> {
    let project_dir = std::fs::canonicalize(project_dir)
        .with_context(|| format!("project directory not found: {}", project_dir.display()))?;
    let config = GitlayerConfig::load(&project_dir)?;
    let artifact_config = config.artifact(artifact).cloned().ok_or_else(|| match artifact {
        Some(name) => anyhow::anyhow!("artifact '{name}' is not declared in gitlayer.toml"),
        None => anyhow::anyhow!("no unnamed artifact declared in gitlayer.toml"),
    })?;

    let repo_path = project_dir.join(&config.repository.path);
    let repo_path = std::fs::canonicalize(&repo_path)
        .with_context(|| format!("repository not found at {}", repo_path.display()))?;
    let options = LayerOptions::from_config(&project_dir, &config);

    let mut exclude_paths = config.repository.exclude_paths.clone();
    // Payloads written inside the repository must not show up as working tree changes.
    if let Ok(payloads) = options.store.host_dir().strip_prefix(&repo_path) {
        exclude_paths.push(payloads.to_string_lossy().into_owned());
    }

    let mut repo = GitRepository::open(repo_path).excluding(exclude_paths);
    if let Some(name) = &config.repository.name {
        repo = repo.named(name);
    }

    let artifact = GitArtifact::new(repo, artifact_config, options.clone())?;
    Ok(Project { artifact, options })
}
