//! Parsers for `git ls-tree -z` and `git diff` output.

use gitlayer_core::quote::{decode_path, unquote};
use gitlayer_core::{Delta, DeltaKind, DiffFile, DiffLine, Hunk, LineOrigin, ObjectId, TreeEntry};

use crate::error::GitError;

/// Parses NUL-terminated `ls-tree` records: `<mode> SP <type> SP <oid> TAB <path>`.
///
/// Only records whose path passes `keep` are returned. A kept path that is
/// not valid UTF-8 is an error.
pub fn parse_ls_tree(
    output: &[u8],
    keep: impl Fn(&str) -> bool,
) -> Result<Vec<TreeEntry>, GitError> {
    let mut entries = Vec::new();
    for record in output.split(|b| *b == 0).filter(|r| !r.is_empty()) {
        let text = String::from_utf8_lossy(record);
        let (meta, path) = text.split_once('\t').ok_or_else(|| GitError::Parse {
            detail: format!("ls-tree record without path: {text:?}"),
        })?;

        let mut fields = meta.split(' ');
        let (Some(mode), Some(kind), Some(oid)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(GitError::Parse {
                detail: format!("malformed ls-tree record: {text:?}"),
            });
        };
        if kind == "tree" || !keep(path) {
            continue;
        }
        if std::str::from_utf8(record).is_err() {
            return Err(non_utf8_path(path));
        }
        let mode = parse_mode(mode)?;
        entries.push(TreeEntry::from_path(path, ObjectId::new(oid), mode));
    }
    Ok(entries)
}

fn non_utf8_path(lossy: &str) -> GitError {
    GitError::Parse {
        detail: format!("path is not valid UTF-8: {lossy:?}"),
    }
}

fn parse_mode(raw: &str) -> Result<u32, GitError> {
    u32::from_str_radix(raw, 8).map_err(|_| GitError::Parse {
        detail: format!("invalid file mode {raw:?}"),
    })
}

/// Splits `git diff` output into per-file deltas.
/// Parses `git diff` output into per-file deltas whose path passes `keep`.
///
/// File header lines of kept deltas must be valid UTF-8: paths are carried
/// as strings and a lossy conversion would name a different file.
pub fn parse_diff(output: &[u8], keep: impl Fn(&str) -> bool) -> Result<Vec<Delta>, GitError> {
    let mut deltas = Vec::new();
    let mut current: Option<DeltaBuilder> = None;
    let mut finish = |builder: DeltaBuilder| -> Result<(), GitError> {
        let valid = builder.valid_utf8;
        let delta = builder.finish()?;
        if keep(delta.path()) {
            if !valid {
                return Err(non_utf8_path(delta.path()));
            }
            deltas.push(delta);
        }
        Ok(())
    };

    for raw in output.split_inclusive(|b| *b == b'\n') {
        if raw.starts_with(b"diff --git ") {
            if let Some(builder) = current.take() {
                finish(builder)?;
            }
            current = Some(DeltaBuilder::new(raw));
            continue;
        }

        let Some(builder) = current.as_mut() else {
            return Err(GitError::Parse {
                detail: format!(
                    "diff output does not start with a file header: {:?}",
                    String::from_utf8_lossy(raw)
                ),
            });
        };
        builder.push_line(raw)?;
    }

    if let Some(builder) = current.take() {
        finish(builder)?;
    }
    Ok(deltas)
}

fn header_line(raw: &[u8]) -> String {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    String::from_utf8_lossy(line).into_owned()
}

struct DeltaBuilder {
    kind: DeltaKind,
    old_path: Option<String>,
    new_path: Option<String>,
    old_mode: u32,
    new_mode: u32,
    index_mode: Option<u32>,
    header: Vec<String>,
    hunks: Vec<Hunk>,
    valid_utf8: bool,
}

impl DeltaBuilder {
    fn new(first_line: &[u8]) -> Self {
        Self {
            valid_utf8: std::str::from_utf8(first_line).is_ok(),
            kind: DeltaKind::Modified,
            old_path: None,
            new_path: None,
            old_mode: 0,
            new_mode: 0,
            index_mode: None,
            header: vec![header_line(first_line)],
            hunks: Vec::new(),
        }
    }

    fn push_line(&mut self, raw: &[u8]) -> Result<(), GitError> {
        if raw.starts_with(b"@@") {
            // The section heading after the second `@@` is ignored by `git apply`.
            self.hunks.push(Hunk {
                header: header_line(raw),
                lines: Vec::new(),
            });
            return Ok(());
        }

        let Some(hunk) = self.hunks.last_mut() else {
            self.valid_utf8 &= std::str::from_utf8(raw).is_ok();
            return self.push_header(header_line(raw));
        };

        let origin = match raw.first() {
            Some(b' ') => LineOrigin::Context,
            Some(b'+') => LineOrigin::Addition,
            Some(b'-') => LineOrigin::Deletion,
            Some(b'\\') => {
                let origin = match hunk.lines.last().map(|l| l.origin) {
                    Some(LineOrigin::Deletion) => LineOrigin::EofNewlineAdded,
                    Some(LineOrigin::Addition) => LineOrigin::EofNewlineRemoved,
                    _ => LineOrigin::EofNoNewline,
                };
                hunk.lines.push(DiffLine {
                    origin,
                    content: Vec::new(),
                });
                return Ok(());
            }
            _ => {
                return Err(GitError::Parse {
                    detail: format!(
                        "unexpected hunk line {:?}",
                        String::from_utf8_lossy(raw)
                    ),
                });
            }
        };
        hunk.lines.push(DiffLine {
            origin,
            content: raw[1..].to_vec(),
        });
        Ok(())
    }

    fn push_header(&mut self, line: String) -> Result<(), GitError> {
        if let Some(mode) = line.strip_prefix("new file mode ") {
            self.kind = DeltaKind::Added;
            self.new_mode = parse_mode(mode)?;
        } else if let Some(mode) = line.strip_prefix("deleted file mode ") {
            self.kind = DeltaKind::Deleted;
            self.old_mode = parse_mode(mode)?;
        } else if let Some(mode) = line.strip_prefix("old mode ") {
            self.old_mode = parse_mode(mode)?;
        } else if let Some(mode) = line.strip_prefix("new mode ") {
            self.new_mode = parse_mode(mode)?;
        } else if let Some(rest) = line.strip_prefix("index ") {
            if let Some(mode) = rest.split(' ').nth(1) {
                self.index_mode = Some(parse_mode(mode)?);
            }
        } else if let Some(path) = line.strip_prefix("--- ") {
            self.old_path = side_path(path, "a/");
        } else if let Some(path) = line.strip_prefix("+++ ") {
            self.new_path = side_path(path, "b/");
        }
        self.header.push(line);
        Ok(())
    }

    fn finish(mut self) -> Result<Delta, GitError> {
        if let Some(mode) = self.index_mode {
            if self.old_mode == 0 && self.kind != DeltaKind::Added {
                self.old_mode = mode;
            }
            if self.new_mode == 0 && self.kind != DeltaKind::Deleted {
                self.new_mode = mode;
            }
        }

        let fallback = git_header_path(&self.header[0]);
        let old_path = self.old_path.or_else(|| fallback.clone());
        let new_path = self.new_path.or(fallback);
        let path = match self.kind {
            DeltaKind::Deleted => old_path.clone(),
            DeltaKind::Added | DeltaKind::Modified => new_path.clone(),
        }
        .ok_or_else(|| GitError::Parse {
            detail: format!("cannot determine path of {:?}", self.header[0]),
        })?;

        Ok(Delta {
            kind: self.kind,
            old_file: DiffFile {
                path: old_path.unwrap_or_else(|| path.clone()),
                mode: self.old_mode,
            },
            new_file: DiffFile {
                path: new_path.unwrap_or(path),
                mode: self.new_mode,
            },
            header: self.header,
            hunks: self.hunks,
        })
    }
}

/// Path of a `---`/`+++` line, `None` for `/dev/null`.
fn side_path(raw: &str, prefix: &str) -> Option<String> {
    // git appends a tab when the name contains a space
    let raw = raw.strip_suffix('\t').unwrap_or(raw);
    decode_path(raw)?.strip_prefix(prefix).map(str::to_owned)
}

/// Path named by `diff --git a/<p> b/<p>`. Without renames both sides name
/// the same path, so an unquoted line splits in the middle.
fn git_header_path(line: &str) -> Option<String> {
    let rest = line.strip_prefix("diff --git ")?;
    if rest.starts_with('"') {
        let (old, _) = unquote(rest)?;
        return old.strip_prefix("a/").map(str::to_owned);
    }
    if rest.len() < 5 || (rest.len() - 5) % 2 != 0 {
        return None;
    }
    let n = (rest.len() - 5) / 2;
    let old = rest.get(2..2 + n)?;
    let new = rest.get(5 + n..)?;
    (rest.starts_with("a/") && rest.get(2 + n..5 + n) == Some(" b/") && old == new)
        .then(|| old.to_owned())
}
