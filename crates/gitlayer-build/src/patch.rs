//! Relocation of per-file patches into the destination layout.
//!
//! A patch produced against the repository root names paths such as
//! `a/src/app/main.rs`. Inside the image the patch is applied with
//! `git apply --directory=<to>`, so every path must be relative to the
//! artifact's destination:
//!
//! ```text
//! cwd = "src/app", kind = directory   a/src/app/main.rs  ->  a/main.rs
//! cwd = "etc/app.conf", kind = file   a/etc/app.conf     ->  a/<basename of to>
//! ```
//!
//! Which header lines carry the `---` / `+++` paths depends on the delta
//! shape (git always emits them in the same order):
//!
//! | delta                   | lines (0-based) |
//! |-------------------------|-----------------|
//! | deleted                 | 3 (`a`)         |
//! | added                   | 4 (`b`)         |
//! | modified                | 2 (`a`), 3 (`b`) |
//! | modified, mode changed  | 4 (`a`), 5 (`b`) |

use gitlayer_core::quote::{decode_path, quote_path};
use gitlayer_core::types::MODE_SUBMODULE;
use gitlayer_core::{Delta, DeltaKind, Error};

use crate::layout::Destination;

pub struct PatchRewriter<'a> {
    destination: &'a Destination<'a>,
}

impl<'a> PatchRewriter<'a> {
    pub fn new(destination: &'a Destination<'a>) -> Self {
        Self { destination }
    }

    /// Renders `delta` with its header relocated.
    ///
    /// Fails with [`Error::UnsupportedPatchFormat`] when the header sides
    /// resolve to more than one native path and with
    /// [`Error::SubmoduleNotSupported`] for gitlink entries.
    pub fn rewrite(&self, delta: &Delta) -> gitlayer_core::Result<Vec<u8>> {
        if delta.old_file.mode == MODE_SUBMODULE || delta.new_file.mode == MODE_SUBMODULE {
            return Err(Error::SubmoduleNotSupported {
                path: delta.path().to_owned(),
            });
        }

        let slots: &[(usize, &str)] = match delta.kind {
            DeltaKind::Deleted => &[(3, "a")],
            DeltaKind::Added => &[(4, "b")],
            DeltaKind::Modified if delta.mode_changed() => &[(4, "a"), (5, "b")],
            DeltaKind::Modified => &[(2, "a"), (3, "b")],
        };

        let mut header = delta.header.clone();
        let mut native_paths: Vec<String> = Vec::new();
        for &(slot, side) in slots {
            if let Some(native) = self.rewrite_line(&mut header, slot, side) {
                if !native_paths.contains(&native) {
                    native_paths.push(native);
                }
            }
        }

        let native = match native_paths.as_slice() {
            [native] => native.clone(),
            [] => match self.destination.native_path(delta.path()) {
                // Headers without `---`/`+++` lines (mode-only changes, empty
                // files) still name the file on the first line.
                Some(native) => native,
                None => return Ok(delta.to_patch()),
            },
            _ => {
                return Err(Error::UnsupportedPatchFormat {
                    paths: native_paths,
                    patch: String::from_utf8_lossy(&delta.to_patch()).into_owned(),
                });
            }
        };

        if let Some(first) = header.first_mut() {
            *first = format!(
                "diff --git {} {}",
                quote_path(&format!("a/{native}")),
                quote_path(&format!("b/{native}"))
            );
        }
        Ok(delta.to_patch_with_header(&header))
    }

    /// Rewrites every delta, in order.
    pub fn rewrite_all(&self, deltas: &[Delta]) -> gitlayer_core::Result<Vec<Vec<u8>>> {
        deltas.iter().map(|delta| self.rewrite(delta)).collect()
    }

    fn rewrite_line(&self, header: &mut [String], slot: usize, side: &str) -> Option<String> {
        let line = header.get(slot)?;
        let (action, raw) = line.split_once(' ')?;
        if action != "---" && action != "+++" {
            return None;
        }
        // git terminates names containing spaces with a tab
        let (raw, tab) = match raw.strip_suffix('\t') {
            Some(raw) => (raw, "\t"),
            None => (raw, ""),
        };
        let path = decode_path(raw)?;
        let path = path.strip_prefix(side)?.strip_prefix('/')?;
        let native = self.destination.native_path(path)?;
        let rewritten = format!("{action} {}{tab}", quote_path(&format!("{side}/{native}")));

        header[slot] = rewritten;
        Some(native)
    }
}
