//! Tar payloads for full artifact snapshots.
//!
//! Entries are regular files (permission bits from the git mode) and
//! symlinks (target read from the blob). Directories are never emitted;
//! `tar -x` creates them on extraction.
//!
//! Two strategies produce equivalent archives:
//! - [`ArchiveStrategy::Builtin`] streams ustar records from memory.
//! - [`ArchiveStrategy::SystemTar`] materializes the entries in a scratch
//!   directory and runs `tar -C <scratch> -cf <archive> .`.

use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process::Command;

use gitlayer_core::types::MODE_SYMLINK;
use gitlayer_core::{ArchiveStrategy, EntryKind, Error, Repository, TreeEntry};
use tempfile::NamedTempFile;

use crate::layout::Destination;

const BLOCK: usize = 512;
const NAME_LEN: usize = 100;
const PREFIX_LEN: usize = 155;
const SYSTEM_TAR: &str = "tar";

/// A blob ready to be archived under its destination-relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub mode: u32,
    pub content: Vec<u8>,
}

impl ArchiveEntry {
    pub fn is_symlink(&self) -> bool {
        self.mode & 0o170000 == MODE_SYMLINK
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("file name too long for tar: {path}")]
    NameTooLong { path: String },

    #[error("symlink target too long for tar: {path} -> {target}")]
    LinkTooLong { path: String, target: String },

    #[error("entry too large for tar: {path}")]
    TooLarge { path: String },

    #[error("failed to write archive")]
    Io(#[from] io::Error),

    #[error("failed to run {program}")]
    Spawn {
        program: String,
        source: io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    ToolFailed {
        program: String,
        status: String,
        stderr: String,
    },
}

impl ArchiveError {
    /// Converts into the engine error, attributing I/O failures to `archive`.
    pub fn into_error(self, archive: &Path) -> Error {
        match self {
            Self::NameTooLong { ref path }
            | Self::LinkTooLong { ref path, .. }
            | Self::TooLarge { ref path } => Error::ArchiveWrite {
                path: path.clone(),
                reason: self.to_string(),
            },
            Self::Io(source) | Self::Spawn { source, .. } => Error::Payload {
                path: archive.to_path_buf(),
                source,
            },
            Self::ToolFailed { .. } => Error::ArchiveWrite {
                path: archive.display().to_string(),
                reason: self.to_string(),
            },
        }
    }
}

/// Reads the content of `entries` and relocates them into `destination`.
///
/// Submodule entries fail with [`Error::SubmoduleNotSupported`]. Entries
/// outside the working directory are skipped.
pub fn collect_entries<R: Repository + ?Sized>(
    repo: &R,
    entries: &[TreeEntry],
    destination: &Destination<'_>,
) -> gitlayer_core::Result<Vec<ArchiveEntry>> {
    let mut archived = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry.kind {
            EntryKind::Submodule => {
                return Err(Error::SubmoduleNotSupported { path: entry.path() });
            }
            EntryKind::Tree => continue,
            EntryKind::Blob | EntryKind::Symlink => {}
        }

        let path = entry.path();
        let Some(native) = destination.native_path(&path) else {
            tracing::debug!(path = %path, "entry outside working directory skipped");
            continue;
        };
        archived.push(ArchiveEntry {
            path: native,
            mode: entry.mode,
            content: repo.read_blob(&entry.object_id)?,
        });
    }
    Ok(archived)
}

/// Writes `entries` into `file` with the selected strategy.
pub fn write_archive(
    strategy: ArchiveStrategy,
    entries: &[ArchiveEntry],
    file: &mut NamedTempFile,
) -> Result<(), ArchiveError> {
    match strategy {
        ArchiveStrategy::Builtin => {
            let mut tar = TarWriter::new(BufWriter::new(file.as_file_mut()));
            for entry in entries {
                tar.append(entry)?;
            }
            tar.finish()?.flush()?;
            Ok(())
        }
        ArchiveStrategy::SystemTar => write_with_system_tar(SYSTEM_TAR, entries, file.path()),
    }
}

/// Streaming ustar writer.
pub struct TarWriter<W: Write> {
    out: W,
}

impl<W: Write> TarWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn append(&mut self, entry: &ArchiveEntry) -> Result<(), ArchiveError> {
        if entry.is_symlink() {
            let record = header(&entry.path, 0o777, 0, b'2', &entry.content)?;
            self.out.write_all(&record)?;
            return Ok(());
        }

        let data = entry.content.as_slice();
        let record = header(&entry.path, entry.mode & 0o7777, data.len() as u64, b'0', &[])?;
        self.out.write_all(&record)?;
        self.out.write_all(data)?;
        let padding = (BLOCK - data.len() % BLOCK) % BLOCK;
        self.out.write_all(&[0u8; BLOCK][..padding])?;
        Ok(())
    }

    /// Writes the end-of-archive marker and hands the writer back.
    pub fn finish(mut self) -> Result<W, ArchiveError> {
        self.out.write_all(&[0u8; BLOCK * 2])?;
        Ok(self.out)
    }
}

fn header(
    path: &str,
    mode: u32,
    size: u64,
    typeflag: u8,
    linkname: &[u8],
) -> Result<[u8; BLOCK], ArchiveError> {
    let (prefix, name) = split_name(path).ok_or_else(|| ArchiveError::NameTooLong {
        path: path.to_owned(),
    })?;
    if linkname.len() > NAME_LEN {
        return Err(ArchiveError::LinkTooLong {
            path: path.to_owned(),
            target: String::from_utf8_lossy(linkname).into_owned(),
        });
    }
    if size >= 1 << 33 {
        return Err(ArchiveError::TooLarge {
            path: path.to_owned(),
        });
    }

    let mut buf = [0u8; BLOCK];
    buf[..name.len()].copy_from_slice(name.as_bytes());
    octal(&mut buf[100..108], u64::from(mode));
    octal(&mut buf[108..116], 0);
    octal(&mut buf[116..124], 0);
    octal(&mut buf[124..136], size);
    octal(&mut buf[136..148], 0);
    buf[148..156].fill(b' ');
    buf[156] = typeflag;
    buf[157..157 + linkname.len()].copy_from_slice(linkname);
    buf[257..263].copy_from_slice(b"ustar\0");
    buf[263..265].copy_from_slice(b"00");
    buf[345..345 + prefix.len()].copy_from_slice(prefix.as_bytes());

    let sum: u32 = buf.iter().map(|&b| u32::from(b)).sum();
    buf[148..156].copy_from_slice(format!("{sum:06o}\0 ").as_bytes());
    Ok(buf)
}

/// Zero-padded octal, NUL terminated, filling `field`.
fn octal(field: &mut [u8], value: u64) {
    let digits = format!("{value:0width$o}", width = field.len() - 1);
    let start = digits.len().saturating_sub(field.len() - 1);
    let last = field.len() - 1;
    field[..last].copy_from_slice(&digits.as_bytes()[start..]);
    field[last] = 0;
}

/// Splits a path into ustar `(prefix, name)` fields, `None` when it cannot
/// be represented.
fn split_name(path: &str) -> Option<(&str, &str)> {
    if path.len() <= NAME_LEN {
        return Some(("", path));
    }
    path.match_indices('/')
        .map(|(i, _)| (&path[..i], &path[i + 1..]))
        .find(|(_, name)| name.len() <= NAME_LEN)
        .filter(|(prefix, name)| !name.is_empty() && prefix.len() <= PREFIX_LEN)
}

fn write_with_system_tar(
    program: &str,
    entries: &[ArchiveEntry],
    archive: &Path,
) -> Result<(), ArchiveError> {
    let scratch = tempfile::TempDir::new()?;
    materialize(scratch.path(), entries)?;

    let output = Command::new(program)
        .arg("-C")
        .arg(scratch.path())
        .arg("-cf")
        .arg(archive)
        .arg(".")
        .output()
        .map_err(|e| ArchiveError::Spawn {
            program: program.to_owned(),
            source: e,
        })?;

    if !output.status.success() {
        return Err(ArchiveError::ToolFailed {
            program: program.to_owned(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }
    tracing::debug!(archive = %archive.display(), entries = entries.len(), "system tar finished");
    Ok(())
}

fn materialize(root: &Path, entries: &[ArchiveEntry]) -> io::Result<()> {
    use std::os::unix::fs::{PermissionsExt, symlink};

    for entry in entries {
        let target = root.join(&entry.path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if entry.is_symlink() {
            symlink(String::from_utf8_lossy(&entry.content).as_ref(), &target)?;
        } else {
            std::fs::write(&target, &entry.content)?;
            std::fs::set_permissions(
                &target,
                std::fs::Permissions::from_mode(entry.mode & 0o7777),
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitlayer_core::types::{MODE_EXECUTABLE, MODE_FILE};

    fn file(path: &str, mode: u32, content: &str) -> ArchiveEntry {
        ArchiveEntry {
            path: path.to_owned(),
            mode,
            content: content.as_bytes().to_vec(),
        }
    }

    fn build(entries: &[ArchiveEntry]) -> Vec<u8> {
        let mut tar = TarWriter::new(Vec::new());
        for entry in entries {
            tar.append(entry).unwrap();
        }
        tar.finish().unwrap()
    }

    fn field(block: &[u8], range: std::ops::Range<usize>) -> String {
        String::from_utf8_lossy(&block[range])
            .trim_end_matches('\0')
            .to_owned()
    }

    #[test]
    fn regular_file_record() {
        let bytes = build(&[file("bin/run.sh", MODE_EXECUTABLE, "#!/bin/sh\n")]);

        assert_eq!(bytes.len(), BLOCK * 4);
        assert_eq!(field(&bytes, 0..100), "bin/run.sh");
        assert_eq!(field(&bytes, 100..108), "0000755");
        assert_eq!(field(&bytes, 124..136), "00000000012");
        assert_eq!(bytes[156], b'0');
        assert_eq!(&bytes[257..263], b"ustar\0");
        assert_eq!(&bytes[BLOCK..BLOCK + 10], b"#!/bin/sh\n");
        assert!(bytes[BLOCK * 2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn symlink_record_carries_target() {
        let bytes = build(&[file("current", MODE_SYMLINK, "releases/v2")]);

        assert_eq!(bytes.len(), BLOCK * 3);
        assert_eq!(bytes[156], b'2');
        assert_eq!(field(&bytes, 157..257), "releases/v2");
        assert_eq!(field(&bytes, 124..136), "00000000000");
    }

    #[test]
    fn checksum_matches_header_sum() {
        let bytes = build(&[file("a.txt", MODE_FILE, "x")]);
        let mut block = bytes[..BLOCK].to_vec();
        let recorded = u32::from_str_radix(field(&block, 148..154).trim(), 8).unwrap();
        block[148..156].fill(b' ');
        let sum: u32 = block.iter().map(|&b| u32::from(b)).sum();
        assert_eq!(recorded, sum);
    }

    #[test]
    fn long_path_is_split_into_prefix() {
        let dir = "d".repeat(120);
        let path = format!("{dir}/file.txt");
        let bytes = build(&[file(&path, MODE_FILE, "")]);

        assert_eq!(field(&bytes, 0..100), "file.txt");
        assert_eq!(field(&bytes, 345..500), dir);
    }

    #[test]
    fn unsplittable_path_is_an_archive_write_error() {
        let path = "n".repeat(101);
        let mut tar = TarWriter::new(Vec::new());
        let err = tar.append(&file(&path, MODE_FILE, "")).unwrap_err();
        assert!(matches!(err, ArchiveError::NameTooLong { .. }));

        let converted = err.into_error(Path::new("/tmp/out.tar"));
        assert!(matches!(converted, Error::ArchiveWrite { ref path, .. } if path.len() == 101));
    }

    #[test]
    fn overlong_prefix_is_rejected() {
        let path = format!("{}/{}", "p".repeat(160), "f");
        assert_eq!(split_name(&path), None);
    }

    #[test]
    fn overlong_symlink_target_is_rejected() {
        let mut tar = TarWriter::new(Vec::new());
        let err = tar
            .append(&file("link", MODE_SYMLINK, &"t".repeat(101)))
            .unwrap_err();
        assert!(matches!(err, ArchiveError::LinkTooLong { .. }));
    }

    #[test]
    fn octal_fields_are_nul_terminated() {
        let mut field = [0xffu8; 8];
        octal(&mut field, 0o644);
        assert_eq!(&field, b"0000644\0");
    }

    #[test]
    fn system_tar_materializes_modes_and_links() {
        let dir = tempfile::TempDir::new().unwrap();
        let entries = [
            file("bin/run.sh", MODE_EXECUTABLE, "#!/bin/sh\n"),
            file("link", MODE_SYMLINK, "bin/run.sh"),
        ];
        materialize(dir.path(), &entries).unwrap();

        use std::os::unix::fs::PermissionsExt;
        let meta = std::fs::metadata(dir.path().join("bin/run.sh")).unwrap();
        assert_eq!(meta.permissions().mode() & 0o7777, 0o755);
        assert_eq!(
            std::fs::read_link(dir.path().join("link")).unwrap(),
            Path::new("bin/run.sh")
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn rel_path() -> impl Strategy<Value = String> {
            proptest::collection::vec("[a-z0-9_]{1,40}", 1..8).prop_map(|v| v.join("/"))
        }

        proptest! {
            #[test]
            fn split_name_reassembles_path(path in rel_path()) {
                if let Some((prefix, name)) = split_name(&path) {
                    prop_assert!(name.len() <= NAME_LEN);
                    prop_assert!(prefix.len() <= PREFIX_LEN);
                    let joined = if prefix.is_empty() {
                        name.to_owned()
                    } else {
                        format!("{prefix}/{name}")
                    };
                    prop_assert_eq!(joined, path);
                } else {
                    prop_assert!(path.len() > NAME_LEN);
                }
            }

            #[test]
            fn archives_are_whole_blocks(
                contents in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..1500), 0..5),
            ) {
                let entries: Vec<ArchiveEntry> = contents
                    .into_iter()
                    .enumerate()
                    .map(|(i, content)| ArchiveEntry {
                        path: format!("dir/file{i}"),
                        mode: MODE_FILE,
                        content,
                    })
                    .collect();
                let bytes = build(&entries);
                prop_assert_eq!(bytes.len() % BLOCK, 0);
                prop_assert!(bytes[bytes.len() - 2 * BLOCK..].iter().all(|&b| b == 0));
            }
        }
    }
}
