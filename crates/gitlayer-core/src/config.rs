use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::filter::normalize_workdir;

/// gitlayer.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitlayerConfig {
    #[serde(default)]
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub build: BuildSettings,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub artifacts: Vec<ArtifactConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Repository name used in artifact names (defaults to the directory name)
    pub name: Option<String>,
    /// Path of the repository, relative to the config file
    #[serde(default = "default_repository_path")]
    pub path: PathBuf,
    /// Paths excluded from every artifact of this repository
    #[serde(default)]
    pub exclude_paths: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveStrategy {
    /// Stream tar entries from memory
    #[default]
    Builtin,
    /// Materialize entries in a scratch directory and run the system `tar`
    SystemTar,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Layer uncommitted working tree changes on top of the latest commit
    #[serde(default)]
    pub dev_mode: bool,
    #[serde(default)]
    pub archive_strategy: ArchiveStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory on the build host where payloads are written
    #[serde(default = "default_host_dir")]
    pub host_dir: PathBuf,
    /// Directory where the build container sees `host_dir`
    #[serde(default = "default_container_dir")]
    pub container_dir: String,
}

/// Executables referenced by the emitted shell commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_install")]
    pub install: String,
    #[serde(default = "default_tar")]
    pub tar: String,
    #[serde(default = "default_git")]
    pub git: String,
    #[serde(default = "default_rm")]
    pub rm: String,
    #[serde(default = "default_sudo")]
    pub sudo: String,
}

/// One declared git artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Optional artifact name, appended to the repository name
    pub name: Option<String>,
    /// Absolute destination path inside the image
    pub to: String,
    /// Source directory (or file) inside the repository
    #[serde(default)]
    pub cwd: String,
    #[serde(default)]
    pub include_paths: Vec<String>,
    #[serde(default)]
    pub exclude_paths: Vec<String>,
    pub owner: Option<String>,
    pub group: Option<String>,
    /// Branch followed when no commit is pinned (defaults to HEAD)
    pub branch: Option<String>,
    /// Pinned commit
    pub commit: Option<String>,
    /// Stage name -> paths whose content invalidates that stage
    #[serde(default)]
    pub stage_dependencies: HashMap<String, Vec<String>>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            name: None,
            path: default_repository_path(),
            exclude_paths: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            host_dir: default_host_dir(),
            container_dir: default_container_dir(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            install: default_install(),
            tar: default_tar(),
            git: default_git(),
            rm: default_rm(),
            sudo: default_sudo(),
        }
    }
}

impl GitlayerConfig {
    /// Load from gitlayer.toml at the given path, or return defaults if not found.
    pub fn load(project_dir: &Path) -> crate::Result<Self> {
        let config_path = project_dir.join("gitlayer.toml");
        if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            let config: Self =
                toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                    path: config_path,
                    source: e,
                })?;
            for artifact in &config.artifacts {
                artifact.validate()?;
            }
            tracing::debug!(artifacts = config.artifacts.len(), "loaded gitlayer.toml");
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Find an artifact by name; `None` selects the unnamed artifact.
    pub fn artifact(&self, name: Option<&str>) -> Option<&ArtifactConfig> {
        self.artifacts.iter().find(|a| a.name.as_deref() == name)
    }
}

impl ArtifactConfig {
    /// Working directory prefix with slashes and dot segments normalized.
    pub fn workdir(&self) -> String {
        normalize_workdir(&self.cwd)
    }

    pub fn validate(&self) -> crate::Result<()> {
        let label = self.name.clone().unwrap_or_else(|| self.to.clone());
        let invalid = |reason: &str| crate::Error::Config {
            artifact: label.clone(),
            reason: reason.to_owned(),
        };

        if let Some(name) = &self.name {
            let valid = !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
            if !valid {
                return Err(invalid(
                    "name must be non-empty and use only [A-Za-z0-9._-]",
                ));
            }
        }
        if !self.to.starts_with('/') {
            return Err(invalid("`to` must be an absolute path"));
        }
        if self.owner.as_deref().is_some_and(str::is_empty) {
            return Err(invalid("`owner` must not be empty"));
        }
        if self.group.as_deref().is_some_and(str::is_empty) {
            return Err(invalid("`group` must not be empty"));
        }
        Ok(())
    }
}

fn default_repository_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_host_dir() -> PathBuf {
    PathBuf::from(".gitlayer/tmp")
}

fn default_container_dir() -> String {
    "/.gitlayer/tmp".to_owned()
}

fn default_install() -> String {
    "install".to_owned()
}

fn default_tar() -> String {
    "tar".to_owned()
}

fn default_git() -> String {
    "git".to_owned()
}

fn default_rm() -> String {
    "rm".to_owned()
}

fn default_sudo() -> String {
    "sudo".to_owned()
}
