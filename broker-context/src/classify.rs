//! Step 2: classify — sniff a file's prefix to decide text vs binary
//! (spec §4.4 step 2).

use crate::error::ContextError;
use broker_types::FileKind;
use std::io::Read;
use std::path::Path;

/// Bytes read from the head of each file when classifying.
pub const SNIFF_PREFIX_LEN: usize = 8192;

/// Fraction of the sniffed prefix allowed to be invalid UTF-8 before a file
/// is classified as binary. A file with a single stray byte (e.g. a BOM
/// remnant, one mis-encoded comment) should still read as text.
pub const MAX_INVALID_BYTE_FRACTION: f64 = 0.01;

/// Classify a file as [`FileKind::Text`] or [`FileKind::Binary`] by reading
/// up to [`SNIFF_PREFIX_LEN`] bytes from its start.
///
/// Text requires: no null byte in the prefix, and the fraction of bytes
/// that are not part of a valid UTF-8 sequence is at most
/// [`MAX_INVALID_BYTE_FRACTION`]. Anything else is binary.
pub fn classify(path: &Path) -> Result<FileKind, ContextError> {
    let mut file = std::fs::File::open(path).map_err(|e| ContextError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let mut buf = vec![0u8; SNIFF_PREFIX_LEN];
    let mut total_read = 0usize;
    loop {
        let n = file
            .read(&mut buf[total_read..])
            .map_err(|e| ContextError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
        if n == 0 {
            break;
        }
        total_read += n;
        if total_read == buf.len() {
            break;
        }
    }
    buf.truncate(total_read);

    Ok(classify_bytes(&buf))
}

fn classify_bytes(prefix: &[u8]) -> FileKind {
    if prefix.is_empty() {
        return FileKind::Text;
    }
    if prefix.contains(&0u8) {
        return FileKind::Binary;
    }

    let invalid_count = count_invalid_utf8_bytes(prefix);
    let fraction = invalid_count as f64 / prefix.len() as f64;
    if fraction <= MAX_INVALID_BYTE_FRACTION {
        FileKind::Text
    } else {
        FileKind::Binary
    }
}

fn count_invalid_utf8_bytes(bytes: &[u8]) -> usize {
    let mut invalid = 0;
    let mut rest = bytes;
    loop {
        match std::str::from_utf8(rest) {
            Ok(_) => break,
            Err(e) => {
                let valid_up_to = e.valid_up_to();
                let bad_len = e.error_len().unwrap_or(rest.len() - valid_up_to);
                invalid += bad_len;
                let consumed = valid_up_to + bad_len;
                if consumed >= rest.len() {
                    break;
                }
                rest = &rest[consumed..];
            }
        }
    }
    invalid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_classifies_as_text() {
        assert_eq!(classify_bytes(b"fn main() {}\n"), FileKind::Text);
    }

    #[test]
    fn empty_file_classifies_as_text() {
        assert_eq!(classify_bytes(b""), FileKind::Text);
    }

    #[test]
    fn null_byte_classifies_as_binary() {
        assert_eq!(classify_bytes(b"abc\0def"), FileKind::Binary);
    }

    #[test]
    fn mostly_invalid_utf8_classifies_as_binary() {
        let bytes: Vec<u8> = (0u8..=255).filter(|b| *b >= 0x80).collect();
        assert_eq!(classify_bytes(&bytes), FileKind::Binary);
    }

    #[test]
    fn single_stray_byte_still_classifies_as_text() {
        let mut bytes = "a".repeat(1000).into_bytes();
        bytes.push(0xFF);
        assert_eq!(classify_bytes(&bytes), FileKind::Text);
    }

    #[test]
    fn classify_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.rs");
        std::fs::write(&path, "fn a() {}").unwrap();
        assert_eq!(classify(&path).unwrap(), FileKind::Text);
    }
}
