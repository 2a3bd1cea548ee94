//! Archive and patch layering for git artifacts.
//!
//! # Stage sequence
//!
//! ```text
//! archive stage   tree at C1  ── tar ──▶ <paramshash>_C1.tar
//!                 label gitlayer-git-<paramshash>-type = directory | file
//! patch stage     diff C1..C2 ── rewrite ──▶ <paramshash>_C1_C2.patch
//! patch stage     diff C2..C3 ── rewrite ──▶ <paramshash>_C2_C3.patch
//! live stage      diff C3..working tree ──▶ <paramshash>_C3_live-<hash>.tar
//! ```
//!
//! Every payload name starts with the artifact's parameter fingerprint, so
//! artifacts with different configurations never share files. Payloads are
//! extracted in the container with `tar -x` or `git apply --directory`.
//!
//! # Relocation
//!
//! Repository paths are reduced by the artifact's working directory
//! (`directory` kind) or renamed to the destination's base name (`file`
//! kind). The kind is decided by the archive stage and read back from the
//! stage label by every later stage.

pub mod archive;
pub mod artifact;
pub mod checksum;
pub mod commands;
pub mod diff;
pub mod layout;
pub mod patch;
pub mod stage;
pub mod storage;
pub mod tree;

pub use artifact::{GitArtifact, LayerOptions};
pub use checksum::Fingerprint;
pub use layout::Destination;
pub use patch::PatchRewriter;
pub use stage::ImageStage;
pub use storage::{PayloadKind, PayloadStore};
