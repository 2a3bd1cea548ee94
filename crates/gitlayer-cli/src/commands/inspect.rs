use std::path::Path;

use gitlayer_build::ImageStage;

use super::open_project;
use crate::state::StageStore;

pub fn paramshash(project_dir: &Path, artifact: Option<&str>) -> anyhow::Result<()> {
    let project = open_project(project_dir, artifact)?;
    println!("{}", project.artifact.paramshash());
    Ok(())
}

pub fn deps_checksum(
    project_dir: &Path,
    artifact: Option<&str>,
    stage_name: &str,
) -> anyhow::Result<()> {
    let project = open_project(project_dir, artifact)?;
    let stage = ImageStage::new(stage_name);

    match project.artifact.stage_dependencies_checksum(&stage)? {
        Some(checksum) => println!("{checksum}"),
        None => tracing::info!(stage = stage_name, "stage declares no dependencies"),
    }
    Ok(())
}

pub fn dev_hash(
    project_dir: &Path,
    artifact: Option<&str>,
    stage_name: Option<&str>,
) -> anyhow::Result<()> {
    let project = open_project(project_dir, artifact)?;
    if !project.artifact.is_live() {
        tracing::info!("dev mode is off; set build.dev_mode in gitlayer.toml");
    }

    let stage = match stage_name {
        Some(name) => StageStore::load(project.options.store.host_dir())?.stage(name),
        None => ImageStage::new("dev"),
    };
    match project.artifact.dev_patch_hash(&stage)? {
        Some(hash) => println!("{hash}"),
        None => tracing::info!("working tree is clean"),
    }
    Ok(())
}
