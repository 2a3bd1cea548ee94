use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid artifact configuration {artifact:?}: {reason}")]
    Config { artifact: String, reason: String },

    // ── Repository ──
    #[error("{reference} not found")]
    NotFound { reference: String },

    #[error("repository '{repository}' has no working tree to read from")]
    WorkingTreeUnsupported { repository: String },

    #[error("repository backend failed")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    // ── Layering ──
    #[error("unsupported patch format: {paths:?} resolve to more than one path\n{patch}")]
    UnsupportedPatchFormat { paths: Vec<String>, patch: String },

    #[error("submodules are not supported: {path}")]
    SubmoduleNotSupported { path: String },

    #[error("failed to write archive entry {path:?}: {reason}")]
    ArchiveWrite { path: String, reason: String },

    #[error("no archive kind recorded under label {label}; the archive stage must run before any patch stage")]
    MissingArchiveKind { label: String },

    #[error("integrity error: {detail}")]
    Integrity { detail: String },

    #[error("failed to stage payload at {path}")]
    Payload {
        path: PathBuf,
        source: std::io::Error,
    },
}
