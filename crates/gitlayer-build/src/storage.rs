use std::path::{Path, PathBuf};

use gitlayer_core::{Error, StorageConfig};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Archive,
    Patch,
}

impl PayloadKind {
    fn dir(self) -> &'static str {
        match self {
            Self::Archive => "archives",
            Self::Patch => "patches",
        }
    }
}

/// Scratch area shared between the build host and the build container.
///
/// Payloads are written under `<host_dir>/<archives|patches>/` and referenced
/// from emitted commands as `<container_dir>/<archives|patches>/`. A payload
/// only ever appears at its final path complete: it is written to a
/// temporary file in the same directory and renamed into place.
#[derive(Debug, Clone)]
pub struct PayloadStore {
    host_dir: PathBuf,
    container_dir: String,
}

impl PayloadStore {
    pub fn new(host_dir: impl Into<PathBuf>, container_dir: impl Into<String>) -> Self {
        Self {
            host_dir: host_dir.into(),
            container_dir: container_dir.into(),
        }
    }

    /// Resolves a relative `host_dir` against the project directory.
    pub fn from_config(project_dir: &Path, storage: &StorageConfig) -> Self {
        Self::new(
            project_dir.join(&storage.host_dir),
            storage.container_dir.clone(),
        )
    }

    pub fn host_dir(&self) -> &Path {
        &self.host_dir
    }

    pub fn host_path(&self, kind: PayloadKind, file_name: &str) -> PathBuf {
        self.host_dir.join(kind.dir()).join(file_name)
    }

    pub fn container_path(&self, kind: PayloadKind, file_name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.container_dir.trim_end_matches('/'),
            kind.dir(),
            file_name
        )
    }

    /// Ensures the payload `file_name` exists and returns its container path.
    ///
    /// `write` fills a temporary file that is then renamed into place. An
    /// existing payload is reused as is: names are derived from content
    /// fingerprints.
    pub fn store<F>(
        &self,
        kind: PayloadKind,
        file_name: &str,
        write: F,
    ) -> gitlayer_core::Result<String>
    where
        F: FnOnce(&mut NamedTempFile) -> gitlayer_core::Result<()>,
    {
        let path = self.host_path(kind, file_name);
        if path.exists() {
            tracing::debug!(path = %path.display(), "payload already present");
            return Ok(self.container_path(kind, file_name));
        }

        let dir = self.host_dir.join(kind.dir());
        std::fs::create_dir_all(&dir).map_err(|e| Error::Payload {
            path: dir.clone(),
            source: e,
        })?;
        let mut file = NamedTempFile::new_in(&dir).map_err(|e| Error::Payload {
            path: dir.clone(),
            source: e,
        })?;

        write(&mut file)?;

        file.persist(&path).map_err(|e| Error::Payload {
            path: path.clone(),
            source: e.error,
        })?;
        tracing::info!(path = %path.display(), "payload written");
        Ok(self.container_path(kind, file_name))
    }
}
