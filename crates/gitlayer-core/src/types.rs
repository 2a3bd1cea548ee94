use std::fmt;

/// Git file mode for regular files.
pub const MODE_FILE: u32 = 0o100644;
/// Git file mode for executable files.
pub const MODE_EXECUTABLE: u32 = 0o100755;
/// Git file mode reserved for symbolic links.
pub const MODE_SYMLINK: u32 = 0o120000;
/// Git file mode of a gitlink (submodule) entry.
pub const MODE_SUBMODULE: u32 = 0o160000;
/// Git file mode for trees.
pub const MODE_TREE: u32 = 0o040000;

/// A resolved commit identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommitId(String);

impl CommitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One side of a tree query: a committed snapshot or the live working tree.
///
/// The working tree is only meaningful for the repository owned by the build
/// itself; repositories report this via
/// [`Repository::supports_working_tree`](crate::Repository::supports_working_tree).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommitRef {
    Commit(CommitId),
    WorkingTree,
}

impl CommitRef {
    pub fn is_working_tree(&self) -> bool {
        matches!(self, Self::WorkingTree)
    }
}

impl From<CommitId> for CommitRef {
    fn from(id: CommitId) -> Self {
        Self::Commit(id)
    }
}

impl fmt::Display for CommitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Commit(id) => id.fmt(f),
            Self::WorkingTree => f.write_str("working-tree"),
        }
    }
}

/// Opaque object identifier handed out by a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Blob,
    Tree,
    Symlink,
    Submodule,
}

impl EntryKind {
    /// Classifies a raw git file mode.
    pub fn from_mode(mode: u32) -> Self {
        match mode & 0o170000 {
            MODE_SYMLINK => Self::Symlink,
            MODE_SUBMODULE => Self::Submodule,
            MODE_TREE => Self::Tree,
            _ => Self::Blob,
        }
    }

    /// Whether the entry carries content readable through `read_blob`.
    pub fn has_content(self) -> bool {
        matches!(self, Self::Blob | Self::Symlink)
    }
}

/// A single entry of a filtered tree listing.
///
/// `root` is the directory part of the repository-relative path (empty at the
/// top level) and `name` the final component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub root: String,
    pub name: String,
    pub object_id: ObjectId,
    pub kind: EntryKind,
    pub mode: u32,
}

impl TreeEntry {
    /// Builds an entry from a repository-relative path, splitting off the root.
    pub fn from_path(path: &str, object_id: ObjectId, mode: u32) -> Self {
        let (root, name) = match path.rsplit_once('/') {
            Some((root, name)) => (root.to_owned(), name.to_owned()),
            None => (String::new(), path.to_owned()),
        };
        Self {
            root,
            name,
            object_id,
            kind: EntryKind::from_mode(mode),
            mode,
        }
    }

    /// Repository-relative path of the entry.
    pub fn path(&self) -> String {
        if self.root.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.root, self.name)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaKind {
    Added,
    Deleted,
    Modified,
}

/// One side of a delta. `mode` is zero for the missing side of an
/// addition or deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffFile {
    pub path: String,
    pub mode: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOrigin {
    Context,
    Addition,
    Deletion,
    Binary,
    /// `\ No newline at end of file` after a context line.
    EofNoNewline,
    /// The old side lacked a trailing newline that the new side has.
    EofNewlineAdded,
    /// The new side lacks the trailing newline the old side had.
    EofNewlineRemoved,
}

impl LineOrigin {
    /// Prefix byte used when rendering the line in unified diff format.
    /// `None` for eof markers, which are rendered as a full marker line.
    fn prefix(self) -> Option<u8> {
        match self {
            Self::Context => Some(b' '),
            Self::Addition => Some(b'+'),
            Self::Deletion => Some(b'-'),
            Self::Binary => Some(b'+'),
            Self::EofNoNewline | Self::EofNewlineAdded | Self::EofNewlineRemoved => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub origin: LineOrigin,
    /// Line content including its trailing newline, without the origin prefix.
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// The `@@ -a,b +c,d @@` line, without trailing newline.
    pub header: String,
    pub lines: Vec<DiffLine>,
}

/// A per-file change between two snapshots.
///
/// `header` holds the raw file header lines in unified diff order
/// (`diff --git`, mode lines, `index`, `---`, `+++`) without newlines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    pub kind: DeltaKind,
    pub old_file: DiffFile,
    pub new_file: DiffFile,
    pub header: Vec<String>,
    pub hunks: Vec<Hunk>,
}

const EOF_MARKER: &[u8] = b"\\ No newline at end of file\n";

impl Delta {
    /// Whether the file mode differs between both sides of a modification.
    pub fn mode_changed(&self) -> bool {
        self.kind == DeltaKind::Modified && self.old_file.mode != self.new_file.mode
    }

    /// The path this delta is reported under: the old path for deletions,
    /// the new path otherwise.
    pub fn path(&self) -> &str {
        match self.kind {
            DeltaKind::Deleted => &self.old_file.path,
            DeltaKind::Added | DeltaKind::Modified => &self.new_file.path,
        }
    }

    /// Renders the delta as a unified diff section.
    pub fn to_patch(&self) -> Vec<u8> {
        self.to_patch_with_header(&self.header)
    }

    /// Renders the delta's hunks under a replacement file header.
    pub fn to_patch_with_header(&self, header: &[String]) -> Vec<u8> {
        render(header, &self.hunks)
    }
}

fn render(header: &[String], hunks: &[Hunk]) -> Vec<u8> {
    let mut out = Vec::new();
    for line in header {
        out.extend_from_slice(line.as_bytes());
        out.push(b'\n');
    }
    for hunk in hunks {
        out.extend_from_slice(hunk.header.as_bytes());
        out.push(b'\n');
        for line in &hunk.lines {
            match line.origin.prefix() {
                Some(prefix) => {
                    out.push(prefix);
                    out.extend_from_slice(&line.content);
                }
                None => out.extend_from_slice(EOF_MARKER),
            }
        }
    }
    out
}

/// Options passed to [`Repository::diff`](crate::Repository::diff).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DiffOptions {
    /// Treat every file as text so hunks are always produced.
    pub force_text: bool,
    /// Include untracked files when diffing against the working tree.
    pub include_untracked: bool,
    /// Descend into untracked directories.
    pub recurse_untracked_dirs: bool,
}

/// How an artifact lands in the destination: as a directory tree or as a
/// single file renamed to the destination's base name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    Directory,
    File,
}

impl ArchiveKind {
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::File => "file",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value {
            "directory" => Some(Self::Directory),
            "file" => Some(Self::File),
            _ => None,
        }
    }
}
