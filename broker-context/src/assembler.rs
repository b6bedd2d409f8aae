//! Top-level pipeline: gather → classify → score → split → render_tree
//! (spec §4.4).

use crate::error::{ContextError, ContextWarning};
use crate::gather::gather;
use crate::score::score_file;
use crate::split::{split, SplitResult};
use crate::tree::{render_tree, Marker};
use broker_types::{FileKind, FileRef};
use std::collections::HashSet;
use std::path::PathBuf;

/// Everything the rest of the dispatcher needs after assembling context
/// for one call.
pub struct AssembledContext {
    /// Files rendered directly into the prompt.
    pub inline: Vec<FileRef>,
    /// Files routed to the vector store.
    pub overflow: Vec<FileRef>,
    /// Binary files eligible for image attachment.
    pub image_candidates: Vec<FileRef>,
    /// Content hashes of the inline set, to persist as the session's new
    /// stable inline set (spec §4.4 step 5).
    pub new_stable_hashes: HashSet<String>,
    /// Rendered directory tree for the prompt preamble.
    pub tree: String,
    /// Non-fatal problems encountered along the way.
    pub warnings: Vec<ContextWarning>,
}

/// Run the full context assembly pipeline.
///
/// `context_paths` is gathered as inline-eligible file sources (spec §4.4
/// input list); `priority_paths` forces inline membership within that set.
/// `attachment_paths` are files explicitly marked to go into the overflow
/// (vector-store) set per the glossary's definition of "Attachment" — they
/// never compete for the inline budget and are gathered/classified
/// separately, skipping `split`'s budget logic entirely (binary attachments
/// still become image candidates, same as any other binary). `previous_
/// stable_hashes` is the session's stable inline set from the prior call,
/// if any; `inline_budget_tokens` bounds the inline set's total token
/// estimate (spec invariant P4).
pub fn assemble(
    context_paths: &[PathBuf],
    attachment_paths: &[PathBuf],
    priority_paths: &[PathBuf],
    previous_stable_hashes: &HashSet<String>,
    inline_budget_tokens: u64,
    respect_ignore_files: bool,
) -> Result<AssembledContext, ContextError> {
    let gathered = gather(context_paths, respect_ignore_files);
    let mut warnings = gathered.warnings;

    let mut scored = Vec::with_capacity(gathered.files.len());
    for path in &gathered.files {
        match score_file(path) {
            Ok(file_ref) => scored.push(file_ref),
            Err(e) => warnings.push(ContextWarning::unreadable(
                path.display().to_string(),
                e.to_string(),
            )),
        }
    }

    let priority_set: HashSet<PathBuf> = priority_paths
        .iter()
        .filter_map(|p| std::fs::canonicalize(p).ok())
        .collect();

    let SplitResult {
        inline,
        mut overflow,
        mut image_candidates,
    } = split(scored, &priority_set, previous_stable_hashes, inline_budget_tokens);

    let attachments_gathered = gather(attachment_paths, respect_ignore_files);
    warnings.extend(attachments_gathered.warnings);

    for path in &attachments_gathered.files {
        match score_file(path) {
            Ok(file_ref) if file_ref.kind == FileKind::Text => overflow.push(file_ref),
            Ok(file_ref) => image_candidates.push(file_ref),
            Err(e) => warnings.push(ContextWarning::unreadable(
                path.display().to_string(),
                e.to_string(),
            )),
        }
    }

    let new_stable_hashes: HashSet<String> = inline
        .iter()
        .filter_map(|f| f.content_hash.clone())
        .collect();

    let mut roots: Vec<PathBuf> = Vec::with_capacity(context_paths.len() + attachment_paths.len());
    roots.extend_from_slice(context_paths);
    roots.extend_from_slice(attachment_paths);
    let common_root = roots.first().cloned().unwrap_or_default();
    let marked: Vec<(&FileRef, Marker)> = inline
        .iter()
        .map(|f| (f, Marker::Inline))
        .chain(overflow.iter().map(|f| (f, Marker::Overflow)))
        .chain(image_candidates.iter().map(|f| (f, Marker::Attached)))
        .collect();
    let tree = render_tree(&common_root, &marked);

    Ok(AssembledContext {
        inline,
        overflow,
        image_candidates,
        new_stable_hashes,
        tree,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_small_tree_entirely_inline() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
        std::fs::write(dir.path().join("b.rs"), "fn b() {}").unwrap();

        let result = assemble(
            &[dir.path().to_path_buf()],
            &[],
            &[],
            &HashSet::new(),
            10_000,
            true,
        )
        .unwrap();

        assert_eq!(result.inline.len(), 2);
        assert!(result.overflow.is_empty());
        assert!(!result.new_stable_hashes.is_empty());
        assert!(result.tree.contains("a.rs"));
    }

    #[test]
    fn tiny_budget_overflows_everything_but_priority() {
        let dir = tempfile::tempdir().unwrap();
        let big_content = "x".repeat(4000);
        std::fs::write(dir.path().join("big.rs"), &big_content).unwrap();
        std::fs::write(dir.path().join("small.rs"), "y").unwrap();

        let result = assemble(
            &[dir.path().to_path_buf()],
            &[],
            &[],
            &HashSet::new(),
            1,
            true,
        )
        .unwrap();

        assert!(result.inline.len() <= 1);
        assert!(!result.overflow.is_empty());
    }

    #[test]
    fn small_attachment_is_forced_to_overflow_not_inlined() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tiny.rs"), "x").unwrap();

        let result = assemble(
            &[],
            &[dir.path().join("tiny.rs")],
            &[],
            &HashSet::new(),
            10_000,
            true,
        )
        .unwrap();

        assert!(result.inline.is_empty());
        assert_eq!(result.overflow.len(), 1);
        assert_eq!(result.overflow[0].abs_path.file_name().unwrap(), "tiny.rs");
    }
}
