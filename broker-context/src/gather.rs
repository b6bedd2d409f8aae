//! Step 1: gather — recursively enumerate files under the given roots,
//! honoring ignore rules, deduplicated by absolute path (spec §4.4 step 1).

use crate::error::ContextWarning;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Result of a gather pass: the deduplicated file list plus any warnings
/// for paths that could not be walked.
#[derive(Debug, Default)]
pub struct GatherResult {
    /// Absolute paths of every file found, deduplicated.
    pub files: Vec<PathBuf>,
    /// Non-fatal problems (missing roots, permission errors, symlink
    /// cycles) encountered during the walk.
    pub warnings: Vec<ContextWarning>,
}

/// Recursively enumerate files reachable from `roots`.
///
/// Honors `.gitignore`-style ignore rules the way `ignore::WalkBuilder`
/// does by default (global excludes, per-directory `.gitignore`,
/// `.ignore`). Symlinks are followed once; `ignore`/`walkdir`'s built-in
/// ancestor tracking turns a symlink loop into a warning rather than an
/// infinite walk.
pub fn gather(roots: &[PathBuf], respect_ignore_files: bool) -> GatherResult {
    let mut seen = HashSet::new();
    let mut files = Vec::new();
    let mut warnings = Vec::new();

    for root in roots {
        let abs_root = match std::fs::canonicalize(root) {
            Ok(p) => p,
            Err(e) => {
                warnings.push(ContextWarning::unreadable(
                    root.display().to_string(),
                    format!("cannot resolve path: {e}"),
                ));
                continue;
            }
        };

        if abs_root.is_file() {
            push_if_new(&abs_root, &mut seen, &mut files);
            continue;
        }

        let walker = ignore::WalkBuilder::new(&abs_root)
            .standard_filters(respect_ignore_files)
            .follow_links(true)
            .build();

        for entry in walker {
            match entry {
                Ok(dent) => {
                    if dent.file_type().is_some_and(|t| t.is_file()) {
                        push_if_new(dent.path(), &mut seen, &mut files);
                    }
                }
                Err(e) => warnings.push(ContextWarning::unreadable(
                    abs_root.display().to_string(),
                    format!("walk error: {e}"),
                )),
            }
        }
    }

    GatherResult { files, warnings }
}

fn push_if_new(path: &Path, seen: &mut HashSet<PathBuf>, out: &mut Vec<PathBuf>) {
    if seen.insert(path.to_path_buf()) {
        out.push(path.to_path_buf());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn gathers_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
        std::fs::write(dir.path().join("sub/b.rs"), "fn b() {}").unwrap();

        let result = gather(&[dir.path().to_path_buf()], true);
        assert_eq!(result.files.len(), 2);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn dedupes_overlapping_roots() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();

        let result = gather(
            &[dir.path().to_path_buf(), dir.path().join("a.rs")],
            true,
        );
        assert_eq!(result.files.len(), 1);
    }

    #[test]
    fn honors_gitignore() {
        let dir = tempfile::tempdir().unwrap();
        let mut ignore_file = std::fs::File::create(dir.path().join(".gitignore")).unwrap();
        writeln!(ignore_file, "ignored.rs").unwrap();
        std::fs::write(dir.path().join("kept.rs"), "fn a() {}").unwrap();
        std::fs::write(dir.path().join("ignored.rs"), "fn b() {}").unwrap();

        let result = gather(&[dir.path().to_path_buf()], true);
        let names: Vec<String> = result
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names.contains(&"kept.rs".to_string()));
        assert!(!names.contains(&"ignored.rs".to_string()));
    }

    #[test]
    fn missing_root_is_a_warning_not_a_panic() {
        let result = gather(&[PathBuf::from("/nonexistent/path/xyz")], true);
        assert!(result.files.is_empty());
        assert_eq!(result.warnings.len(), 1);
    }
}
