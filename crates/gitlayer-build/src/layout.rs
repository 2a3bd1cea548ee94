use gitlayer_core::{ArchiveKind, TreeEntry};

/// Where an artifact's repository paths land inside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination<'a> {
    workdir: &'a str,
    to: &'a str,
    kind: ArchiveKind,
}

impl<'a> Destination<'a> {
    pub fn new(workdir: &'a str, to: &'a str, kind: ArchiveKind) -> Self {
        Self { workdir, to, kind }
    }

    pub fn kind(&self) -> ArchiveKind {
        self.kind
    }

    /// Destination-relative path of a repository path, `None` when the path
    /// is not below the working directory.
    ///
    /// Directory artifacts drop the working directory prefix; file artifacts
    /// always land under the destination's base name.
    pub fn native_path(&self, path: &str) -> Option<String> {
        let rest = if self.workdir.is_empty() {
            path
        } else if path == self.workdir {
            ""
        } else {
            path.strip_prefix(self.workdir)?.strip_prefix('/')?
        };

        match self.kind {
            ArchiveKind::Directory if rest.is_empty() => None,
            ArchiveKind::Directory => Some(rest.to_owned()),
            ArchiveKind::File => Some(basename(self.to).to_owned()),
        }
    }

    /// Directory payloads are extracted into: `to` itself for directory
    /// artifacts, its parent for file artifacts.
    pub fn target_dir(&self) -> &'a str {
        match self.kind {
            ArchiveKind::Directory => self.to,
            ArchiveKind::File => dirname(self.to),
        }
    }
}

/// Classifies an artifact from its filtered entries: a single blob sitting
/// exactly at the working directory is a file, anything else a directory.
pub fn classify(workdir: &str, entries: &[TreeEntry]) -> ArchiveKind {
    match entries {
        [entry] if !workdir.is_empty() && entry.kind.has_content() && entry.path() == workdir => {
            ArchiveKind::File
        }
        _ => ArchiveKind::Directory,
    }
}

/// Final component of a destination path.
pub fn basename(to: &str) -> &str {
    let trimmed = to.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

fn dirname(to: &str) -> &str {
    match to.trim_end_matches('/').rsplit_once('/') {
        Some(("", _)) => "/",
        Some((parent, _)) => parent,
        None => ".",
    }
}
