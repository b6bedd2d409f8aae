//! Step 3: score — estimate token counts and content hashes for gathered
//! files (spec §4.4 step 3).

use crate::error::ContextError;
use broker_types::{FileKind, FileRef};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Pluggable token counter. The default fallback (4 chars per token) is
/// the same ratio the teacher's `SlidingWindow::with_ratio` default uses.
pub trait Tokenizer: Send + Sync {
    /// Estimate the number of tokens `text` would consume.
    fn estimate(&self, text: &str) -> u64;
}

/// Fallback tokenizer: one token per [`CHARS_PER_TOKEN`] characters,
/// rounded up.
pub struct CharRatioTokenizer {
    chars_per_token: usize,
}

/// Default chars-per-token ratio used when no real tokenizer is
/// configured, matching the teacher's `SlidingWindow::new()` default.
pub const CHARS_PER_TOKEN: usize = 4;

impl CharRatioTokenizer {
    /// Build the tokenizer with the default 4-chars-per-token ratio.
    pub fn new() -> Self {
        Self {
            chars_per_token: CHARS_PER_TOKEN,
        }
    }

    /// Build with a custom ratio (minimum 1).
    pub fn with_ratio(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl Default for CharRatioTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer for CharRatioTokenizer {
    fn estimate(&self, text: &str) -> u64 {
        ((text.len() + self.chars_per_token - 1) / self.chars_per_token) as u64
    }
}

/// Score one gathered file: classify it, estimate its token count if text,
/// and compute its content hash.
///
/// Returns `None` if the file could not be read (caller should record a
/// warning and drop the file per spec.md §4.4's edge-case handling).
pub fn score_file(path: &Path) -> Result<FileRef, ContextError> {
    let metadata = std::fs::metadata(path).map_err(|e| ContextError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let mtime_epoch = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    let kind = crate::classify::classify(path)?;
    let bytes = std::fs::read(path).map_err(|e| ContextError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let content_hash = hex::encode(Sha256::digest(&bytes));

    let token_estimate = match kind {
        FileKind::Text => {
            let text = String::from_utf8_lossy(&bytes);
            CharRatioTokenizer::new().estimate(&text)
        }
        FileKind::Binary => 0,
    };

    Ok(FileRef {
        abs_path: path.to_path_buf(),
        size_bytes: metadata.len(),
        mtime_epoch,
        content_hash: Some(content_hash),
        token_estimate,
        kind,
    })
}
