use std::path::Path;

use gitlayer_build::ImageStage;
use gitlayer_core::{CommitId, Repository, Stage};

use super::{Project, open_project};
use crate::state::StageStore;

fn stage_commit(project: &Project, commit: Option<&str>) -> anyhow::Result<CommitId> {
    Ok(match commit {
        Some(reference) => project.artifact.repository().resolve(reference)?,
        None => project.artifact.latest_commit()?,
    })
}

pub fn archive(
    project_dir: &Path,
    artifact: Option<&str>,
    stage_name: &str,
    commit: Option<&str>,
) -> anyhow::Result<()> {
    let project = open_project(project_dir, artifact)?;
    let mut stages = StageStore::load(project.options.store.host_dir())?;
    let paramshash = project.artifact.paramshash();

    let commit = stage_commit(&project, commit)?;
    let mut stage = ImageStage::new(stage_name).bind(paramshash, commit.clone());

    let commands = project.artifact.apply_archive_command(&mut stage)?;
    if commands.is_empty() {
        tracing::info!(artifact = project.artifact.full_name(), commit = %commit, "artifact is empty");
    }
    for command in &commands {
        println!("{command}");
    }

    stages.save(&stage, paramshash, &commit)?;
    Ok(())
}

pub fn patch(
    project_dir: &Path,
    artifact: Option<&str>,
    stage_name: &str,
    after: &str,
    commit: Option<&str>,
) -> anyhow::Result<()> {
    let project = open_project(project_dir, artifact)?;
    let mut stages = StageStore::load(project.options.store.host_dir())?;
    let paramshash = project.artifact.paramshash();

    let previous = stages.stage(after);
    if previous.bound_commit(paramshash).is_none() {
        anyhow::bail!(
            "stage '{after}' has not run for artifact {}; run `gitlayer archive --stage {after}` first",
            project.artifact.full_name()
        );
    }

    let commit = stage_commit(&project, commit)?;
    // Images inherit their parent's labels.
    let stage = ImageStage::new(stage_name)
        .with_labels(previous.labels().clone())
        .bind(paramshash, commit.clone())
        .after(previous);

    let commands = project.artifact.apply_patch_command(&stage)?;
    if commands.is_empty() {
        tracing::info!(artifact = project.artifact.full_name(), stage = stage_name, "no changes");
    }
    for command in &commands {
        println!("{command}");
    }

    stages.save(&stage, paramshash, &commit)?;
    Ok(())
}
