//! File identity and classification for context assembly (spec §3, §4.4).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A file referenced by a tool call, somewhere between "seen on disk" and
/// "classified and scored" by the context assembler.
///
/// Identity across calls is the pair `(abs_path, mtime+size)` (cheap,
/// no I/O beyond `stat`); content identity is [`FileRef::content_hash`],
/// computed lazily only when two calls disagree on `(mtime, size)` or when
/// a vector-store upload needs dedup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRef {
    /// Absolute path.
    pub abs_path: PathBuf,
    /// Size in bytes at the time of the scan.
    pub size_bytes: u64,
    /// Modification time, as a Unix timestamp.
    pub mtime_epoch: i64,
    /// Content hash (sha256, hex), filled in once computed.
    pub content_hash: Option<String>,
    /// Estimated token count for this file's text content.
    pub token_estimate: u64,
    /// Whether the file was classified as text or binary.
    pub kind: FileKind,
}

/// Classification of a [`FileRef`] (spec §3, §4.4 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// UTF-8 decodable within tolerance, no null bytes in the sniffed prefix.
    Text,
    /// Anything else. Dropped from the prompt; may still be attached as an
    /// image if the tool has [`crate::tool::Capability::Vision`] and the
    /// extension is on the image allow-list.
    Binary,
}

impl FileRef {
    /// Identity used for "has this exact file changed" comparisons (spec
    /// P6): the path plus size and mtime, not content.
    pub fn identity_key(&self) -> (PathBuf, u64, i64) {
        (self.abs_path.clone(), self.size_bytes, self.mtime_epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(path: &str, size: u64, mtime: i64) -> FileRef {
        FileRef {
            abs_path: PathBuf::from(path),
            size_bytes: size,
            mtime_epoch: mtime,
            content_hash: None,
            token_estimate: size / 4,
            kind: FileKind::Text,
        }
    }

    #[test]
    fn identity_key_changes_with_mtime_or_size() {
        let a = make("/a.rs", 100, 1000);
        let b = make("/a.rs", 100, 1001);
        let c = make("/a.rs", 101, 1000);
        assert_ne!(a.identity_key(), b.identity_key());
        assert_ne!(a.identity_key(), c.identity_key());
    }

    #[test]
    fn identity_key_stable_across_clones() {
        let a = make("/a.rs", 100, 1000);
        assert_eq!(a.identity_key(), a.clone().identity_key());
    }
}
