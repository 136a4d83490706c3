//! File discovery for `ingest`.
//!
//! Walks a directory, keeps files whose path relative to the root matches
//! one of the include globs, and skips VCS and build directories. Output is
//! sorted for deterministic ingestion order.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::RetrievalError;

const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/target/**", "**/node_modules/**"];

/// Counts returned by `ingest`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Files read and stored
    pub files: usize,
    /// Chunks upserted across all files
    pub chunks: usize,
    /// Files that matched but could not be read as text
    pub skipped: Vec<PathBuf>,
}

/// Expand patterns given as lists and/or comma-separated strings (`"*.md,*.txt"`).
pub fn split_patterns(patterns: &[String]) -> Vec<String> {
    patterns
        .iter()
        .flat_map(|p| p.split(','))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// List the files under `root` matching `patterns`.
///
/// A `root` that is itself a file is returned as-is, whatever the patterns.
pub fn discover(root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>, RetrievalError> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    if !root.exists() {
        return Err(RetrievalError::Io {
            path: root.to_path_buf(),
            reason: "path does not exist".into(),
        });
    }

    let include_set = build_globset(&split_patterns(patterns))?;
    let excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| RetrievalError::Io {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }
        files.push(path.to_path_buf());
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, RetrievalError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| RetrievalError::Pattern(format!("{pattern}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| RetrievalError::Pattern(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("docs/deep")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("readme.md"), "# top").unwrap();
        fs::write(root.join("docs/guide.txt"), "guide").unwrap();
        fs::write(root.join("docs/deep/notes.md"), "notes").unwrap();
        fs::write(root.join("docs/image.png"), [0u8, 1, 2]).unwrap();
        fs::write(root.join(".git/HEAD.md"), "ref").unwrap();
        dir
    }

    fn names(files: &[PathBuf], root: &Path) -> Vec<String> {
        files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn default_patterns_find_markdown_and_text() {
        let dir = tree();
        let patterns = vec!["**/*.md".to_string(), "**/*.txt".to_string()];
        let files = discover(dir.path(), &patterns).unwrap();
        assert_eq!(
            names(&files, dir.path()),
            vec!["docs/deep/notes.md", "docs/guide.txt", "readme.md"]
        );
    }

    #[test]
    fn comma_separated_patterns() {
        let dir = tree();
        let files = discover(dir.path(), &["*.md,*.txt".to_string()]).unwrap();
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn single_file_root() {
        let dir = tree();
        let file = dir.path().join("docs/image.png");
        let files = discover(&file, &["**/*.md".to_string()]).unwrap();
        assert_eq!(files, vec![file]);
    }

    #[test]
    fn missing_root_is_an_error() {
        let err = discover(Path::new("/definitely/not/here"), &[]).unwrap_err();
        assert!(matches!(err, RetrievalError::Io { .. }));
    }

    #[test]
    fn bad_glob_is_an_error() {
        let dir = tree();
        let err = discover(dir.path(), &["[".to_string()]).unwrap_err();
        assert!(matches!(err, RetrievalError::Pattern(_)));
    }
}
