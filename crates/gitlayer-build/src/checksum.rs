//! Content fingerprints used as cache keys.
//!
//! Every fingerprint is a SHA-256 hex digest over an ordered list of parts
//! joined with `:::`. Absent parts are skipped, so `[None, "a"]` and `["a"]`
//! digest identically.

use gitlayer_core::filter::base_paths;
use gitlayer_core::{ArtifactConfig, Repository, TreeEntry};
use sha2::{Digest, Sha256};

const SEPARATOR: &[u8] = b":::";

/// An ordered list of digest parts.
#[derive(Debug, Clone, Default)]
pub struct Fingerprint {
    parts: Vec<Vec<u8>>,
}

impl Fingerprint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn part(mut self, part: impl AsRef<[u8]>) -> Self {
        self.parts.push(part.as_ref().to_vec());
        self
    }

    pub fn optional(self, part: Option<impl AsRef<[u8]>>) -> Self {
        match part {
            Some(part) => self.part(part),
            None => self,
        }
    }

    pub fn hexdigest(&self) -> String {
        let mut hasher = Sha256::new();
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                hasher.update(SEPARATOR);
            }
            hasher.update(part);
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Parameter fingerprint of an artifact.
///
/// Paths are hashed in resolved form, so spellings that select the same
/// files (`src/` and `src`) share a digest. List lengths and missing
/// owner/group are tagged so that moving a value from one field to another
/// always changes the digest.
pub fn paramshash(full_name: &str, artifact: &ArtifactConfig) -> String {
    let include = base_paths(&artifact.include_paths, "");
    let exclude = base_paths(&artifact.exclude_paths, "");
    let mut fp = Fingerprint::new()
        .part(full_name)
        .part(&artifact.to)
        .part(artifact.workdir())
        .part(format!("include={}", include.len()));
    for path in &include {
        fp = fp.part(path);
    }
    fp = fp.part(format!("exclude={}", exclude.len()));
    for path in &exclude {
        fp = fp.part(path);
    }
    fp.part(tagged("owner", artifact.owner.as_deref()))
        .part(tagged("group", artifact.group.as_deref()))
        .hexdigest()
}

fn tagged(field: &str, value: Option<&str>) -> String {
    match value {
        Some(value) => format!("{field}={value}"),
        None => format!("{field}!"),
    }
}

/// Folds a digest over tree entries, sorted by `(root, name)`.
///
/// Each step digests `(previous, path, mode, content)`; the mode is rendered
/// in decimal and content is only read for entries that carry it. An empty
/// listing yields the digest of empty input.
pub fn tree_fingerprint<R: Repository + ?Sized>(
    repo: &R,
    entries: &[TreeEntry],
) -> gitlayer_core::Result<String> {
    let mut sorted: Vec<&TreeEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| (&a.root, &a.name).cmp(&(&b.root, &b.name)));

    let mut previous: Option<String> = None;
    for entry in sorted {
        let content = if entry.kind.has_content() {
            Some(repo.read_blob(&entry.object_id)?)
        } else {
            None
        };
        let digest = Fingerprint::new()
            .optional(previous.as_deref())
            .part(entry.path())
            .part(entry.mode.to_string())
            .optional(content.as_deref())
            .hexdigest();
        previous = Some(digest);
    }

    Ok(previous.unwrap_or_else(|| Fingerprint::new().hexdigest()))
}

/// Digest of rendered patches, `None` when there is nothing to digest.
pub fn patches_fingerprint(patches: &[Vec<u8>]) -> Option<String> {
    if patches.is_empty() {
        return None;
    }
    let fp = patches
        .iter()
        .fold(Fingerprint::new(), |fp, patch| fp.part(patch));
    Some(fp.hexdigest())
}
