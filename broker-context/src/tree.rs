//! Step 6: render_tree — a compact textual directory tree for the prompt
//! preamble, marking which set each file landed in (spec §4.4 step 6).

use broker_types::FileRef;
use std::collections::BTreeMap;
use std::path::Path;

/// Per-file marker shown next to its name in the rendered tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Included directly in the prompt.
    Inline,
    /// Routed to the overflow (vector-store) set.
    Overflow,
    /// Attached as an image.
    Attached,
}

impl Marker {
    fn tag(self) -> &'static str {
        match self {
            Marker::Inline => "inline",
            Marker::Overflow => "overflow",
            Marker::Attached => "attached",
        }
    }
}

/// Render a compact directory tree covering every file in `entries`,
/// relative to `root`, with each file's marker in brackets.
///
/// Directories are rendered depth-first in sorted order; this is
/// deterministic across runs for the same input so it can be diffed in
/// logs and tests.
pub fn render_tree(root: &Path, entries: &[(&FileRef, Marker)]) -> String {
    let mut tree: BTreeMap<String, Vec<(String, Marker)>> = BTreeMap::new();

    for (file_ref, marker) in entries {
        let rel = file_ref
            .abs_path
            .strip_prefix(root)
            .unwrap_or(&file_ref.abs_path);
        let dir = rel
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let name = rel
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| rel.display().to_string());
        tree.entry(dir).or_default().push((name, *marker));
    }

    let mut out = String::new();
    for (dir, mut files) in tree {
        files.sort_by(|a, b| a.0.cmp(&b.0));
        if dir.is_empty() {
            out.push_str(".\n");
        } else {
            out.push_str(&dir);
            out.push('\n');
        }
        for (name, marker) in files {
            out.push_str(&format!("  {name} [{}]\n", marker.tag()));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker_types::FileKind;
    use std::path::PathBuf;

    fn file(path: &str) -> FileRef {
        FileRef {
            abs_path: PathBuf::from(path),
            size_bytes: 1,
            mtime_epoch: 0,
            content_hash: None,
            token_estimate: 1,
            kind: FileKind::Text,
        }
    }

    #[test]
    fn renders_deterministic_tree() {
        let root = PathBuf::from("/repo");
        let a = file("/repo/src/a.rs");
        let b = file("/repo/src/b.rs");
        let c = file("/repo/README.md");
        let entries = vec![
            (&a, Marker::Inline),
            (&b, Marker::Overflow),
            (&c, Marker::Attached),
        ];
        let rendered = render_tree(&root, &entries);
        assert!(rendered.contains("a.rs [inline]"));
        assert!(rendered.contains("b.rs [overflow]"));
        assert!(rendered.contains("README.md [attached]"));
    }

    #[test]
    fn empty_entries_render_empty_string() {
        assert_eq!(render_tree(Path::new("/repo"), &[]), "");
    }
}
