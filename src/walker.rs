//! Directory discovery.

use crate::config::ScanOptions;
use crate::error::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Yields the directories a run visits: the root, then its subdirectories
/// down to `max_depth`.
#[derive(Debug, Clone)]
pub struct DirectoryWalker {
    options: ScanOptions,
    excludes: Vec<glob::Pattern>,
}

impl DirectoryWalker {
    #[must_use]
    pub fn new(options: &ScanOptions) -> Self {
        let excludes = options
            .exclude_patterns
            .iter()
            .filter_map(|pattern| match glob::Pattern::new(pattern) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "Ignoring invalid exclude pattern");
                    None
                }
            })
            .collect();

        Self {
            options: options.clone(),
            excludes,
        }
    }

    /// Directories under `root` in walk order, `root` first.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryNotFound` if `root` is not a directory.
    pub fn directories(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if !root.is_dir() {
            return Err(crate::err!(DirectoryNotFound { path: root.to_path_buf() }));
        }

        let mut walk = WalkDir::new(root).follow_links(true).sort_by_file_name();
        if let Ok(depth) = usize::try_from(self.options.max_depth) {
            walk = walk.max_depth(depth);
        }

        let mut directories = Vec::new();
        for entry in walk
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !self.should_skip(root, e.path()))
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read directory entry");
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                directories.push(entry.into_path());
            }
        }

        tracing::debug!(root = %root.display(), directories = directories.len(), "Directory walk complete");
        Ok(directories)
    }

    fn should_skip(&self, root: &Path, path: &Path) -> bool {
        if !path.is_dir() {
            return true;
        }

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if self.options.ignore_dirs.iter().any(|ignored| ignored == name) {
            tracing::debug!(path = %path.display(), reason = "ignored directory", "Skipping path");
            return true;
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        if self
            .excludes
            .iter()
            .any(|p| p.matches_path(relative) || p.matches(name))
        {
            tracing::debug!(path = %path.display(), reason = "matches exclude pattern", "Skipping path");
            return true;
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use test_case::test_case;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["a/b/c", "a/.terraform/modules", ".git/objects", "examples/simple", "z"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        fs::write(dir.path().join("main.tf"), "").unwrap();
        dir
    }

    fn relative(root: &Path, dirs: Vec<PathBuf>) -> Vec<String> {
        dirs.iter()
            .map(|d| d.strip_prefix(root).unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test_case(0, &[""] ; "root only")]
    #[test_case(1, &["", "a", "examples", "z"] ; "one level")]
    #[test_case(-1, &["", "a", "a/b", "a/b/c", "examples", "examples/simple", "z"] ; "unlimited")]
    fn test_depth(depth: i32, expected: &[&str]) {
        let dir = tree();
        let options = ScanOptions {
            max_depth: depth,
            ..ScanOptions::default()
        };
        let dirs = DirectoryWalker::new(&options).directories(dir.path()).unwrap();
        assert_eq!(relative(dir.path(), dirs), expected);
    }

    #[test]
    fn test_exclude_patterns() {
        let dir = tree();
        let options = ScanOptions {
            max_depth: -1,
            exclude_patterns: vec!["examples".to_string(), "a/b/*".to_string()],
            ..ScanOptions::default()
        };
        let dirs = DirectoryWalker::new(&options).directories(dir.path()).unwrap();
        assert_eq!(relative(dir.path(), dirs), vec!["", "a", "a/b", "z"]);
    }

    #[test]
    fn test_missing_root() {
        let err = DirectoryWalker::new(&ScanOptions::default())
            .directories(Path::new("/nonexistent/terraform"))
            .unwrap_err();
        assert!(matches!(err, crate::error::SamwiseError::DirectoryNotFound { .. }));
    }
}
