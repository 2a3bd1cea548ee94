use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("git executable not found: {program}")]
    NotFound {
        program: String,
        source: std::io::Error,
    },

    #[error("git command failed: {args:?}\n{stderr}")]
    CommandFailed { args: Vec<String>, stderr: String },

    #[error("failed to prepare {path}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unexpected git output: {detail}")]
    Parse { detail: String },
}

impl From<GitError> for gitlayer_core::Error {
    fn from(e: GitError) -> Self {
        match e {
            GitError::Parse { detail } => gitlayer_core::Error::Integrity { detail },
            other => gitlayer_core::Error::Backend(Box::new(other)),
        }
    }
}
