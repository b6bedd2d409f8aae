//! Step 4: split — greedily choose which scored files go inline versus to
//! the overflow (vector-store) set (spec §4.4 step 4, invariant P4).

use broker_types::{FileKind, FileRef};
use std::collections::HashSet;
use std::path::PathBuf;

/// Output of [`split`]: the inline set, the overflow set, and binary files
/// eligible only as image attachments (spec §4.4 step 2).
#[derive(Debug, Default)]
pub struct SplitResult {
    /// Files to render directly into the prompt.
    pub inline: Vec<FileRef>,
    /// Files that did not fit inline; routed to the vector store.
    pub overflow: Vec<FileRef>,
    /// Binary files, kept aside for the caller to attach as images if the
    /// tool declares the vision capability and the extension qualifies.
    pub image_candidates: Vec<FileRef>,
}

/// Greedily split `files` into inline and overflow sets.
///
/// `priority_paths` forces membership in the inline set regardless of
/// size (spec invariant P4): if the priority set alone exceeds
/// `inline_budget_tokens`, the inline set is defined to be exactly the
/// priority set and everything else overflows. Otherwise, after the
/// priority set is seated, remaining budget is filled preferring (a)
/// files already in `stable_hashes` (the session's previous inline set),
/// then (b) smaller files, per spec.md §4.4 step 4.
pub fn split(
    files: Vec<FileRef>,
    priority_paths: &HashSet<PathBuf>,
    stable_hashes: &HashSet<String>,
    inline_budget_tokens: u64,
) -> SplitResult {
    let mut result = SplitResult::default();

    let (text_files, binaries): (Vec<FileRef>, Vec<FileRef>) =
        files.into_iter().partition(|f| f.kind == FileKind::Text);
    result.image_candidates = binaries;

    let (priority, rest): (Vec<FileRef>, Vec<FileRef>) = text_files
        .into_iter()
        .partition(|f| priority_paths.contains(&f.abs_path));

    let priority_tokens: u64 = priority.iter().map(|f| f.token_estimate).sum();

    if priority_tokens > inline_budget_tokens {
        result.inline = priority;
        result.overflow = rest;
        return result;
    }

    let mut remaining_budget = inline_budget_tokens - priority_tokens;
    result.inline = priority;

    let mut candidates = rest;
    candidates.sort_by(|a, b| {
        let a_stable = a
            .content_hash
            .as_deref()
            .is_some_and(|h| stable_hashes.contains(h));
        let b_stable = b
            .content_hash
            .as_deref()
            .is_some_and(|h| stable_hashes.contains(h));
        b_stable
            .cmp(&a_stable)
            .then_with(|| a.token_estimate.cmp(&b.token_estimate))
    });

    for file in candidates {
        if file.token_estimate <= remaining_budget {
            remaining_budget -= file.token_estimate;
            result.inline.push(file);
        } else {
            result.overflow.push(file);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file(path: &str, tokens: u64, hash: &str) -> FileRef {
        FileRef {
            abs_path: PathBuf::from(path),
            size_bytes: tokens * 4,
            mtime_epoch: 0,
            content_hash: Some(hash.to_string()),
            token_estimate: tokens,
            kind: FileKind::Text,
        }
    }

    #[test]
    fn inline_never_exceeds_budget_without_priority_overflow() {
        let files = vec![file("/a", 40, "a"), file("/b", 40, "b"), file("/c", 40, "c")];
        let result = split(files, &HashSet::new(), &HashSet::new(), 100);
        let inline_tokens: u64 = result.inline.iter().map(|f| f.token_estimate).sum();
        assert!(inline_tokens <= 100);
        assert_eq!(result.inline.len() + result.overflow.len(), 3);
    }

    #[test]
    fn priority_files_always_inline_even_if_large() {
        let mut priority = HashSet::new();
        priority.insert(PathBuf::from("/big"));
        let files = vec![file("/big", 90, "big"), file("/small", 5, "small")];
        let result = split(files, &priority, &HashSet::new(), 100);
        assert!(result.inline.iter().any(|f| f.abs_path == PathBuf::from("/big")));
    }

    #[test]
    fn priority_alone_exceeding_budget_is_the_entire_inline_set() {
        let mut priority = HashSet::new();
        priority.insert(PathBuf::from("/p1"));
        priority.insert(PathBuf::from("/p2"));
        let files = vec![
            file("/p1", 80, "p1"),
            file("/p2", 80, "p2"),
            file("/other", 1, "o"),
        ];
        let result = split(files, &priority, &HashSet::new(), 100);
        assert_eq!(result.inline.len(), 2);
        assert!(result.overflow.iter().any(|f| f.abs_path == PathBuf::from("/other")));
    }

    #[test]
    fn stable_set_preferred_over_smaller_new_files() {
        let mut stable = HashSet::new();
        stable.insert("stable_hash".to_string());
        let files = vec![
            file("/new_small", 10, "new"),
            file("/stable_big", 40, "stable_hash"),
        ];
        let result = split(files, &HashSet::new(), &stable, 45);
        assert!(result.inline.iter().any(|f| f.abs_path == PathBuf::from("/stable_big")));
        assert!(result.overflow.iter().any(|f| f.abs_path == PathBuf::from("/new_small")));
    }

    #[test]
    fn binaries_are_separated_as_image_candidates() {
        let files = vec![FileRef {
            abs_path: PathBuf::from("/pic.png"),
            size_bytes: 100,
            mtime_epoch: 0,
            content_hash: Some("h".into()),
            token_estimate: 0,
            kind: FileKind::Binary,
        }];
        let result = split(files, &HashSet::new(), &HashSet::new(), 100);
        assert_eq!(result.image_candidates.len(), 1);
        assert!(result.inline.is_empty());
        assert!(result.overflow.is_empty());
    }
}
