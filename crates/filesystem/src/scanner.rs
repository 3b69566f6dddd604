//! Publish tree scanner.
//!
//! Walks the local publish root and loads every regular file into a
//! [`LogicalFile`]. Paths are relative to the publish root even when the scan
//! is scoped to a sub-directory, so remote names stay stable no matter which
//! part of the tree a run publishes.

use std::path::{Path, PathBuf};

use hoist_common::{extension, relative_posix_path, CONFIG_FILE_NAME, RESERVED_PREFIX};
use walkdir::WalkDir;

use crate::error::FileSystemError;
use crate::glob::GlobFilter;

/// A file discovered under the publish root.
///
/// Immutable for the duration of a run and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalFile {
    /// Relative, forward-slash normalized path (e.g. `img/logo.png`).
    pub path: String,
    /// Raw file content.
    pub bytes: Vec<u8>,
}

impl LogicalFile {
    /// Create a logical file from a relative path and its content.
    pub fn new(path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            bytes: bytes.into(),
        }
    }

    /// Lowercase extension without the dot, if any.
    pub fn extension(&self) -> Option<String> {
        extension(&self.path)
    }
}

/// Options for scanning a publish tree.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Publish root; all paths are made relative to it.
    pub root: PathBuf,
    /// Normalized sub-directory prefix (`"blog/"`) limiting the scan, or `""`.
    pub scope: String,
    /// Exclude filter applied to relative paths.
    pub filter: GlobFilter,
    /// Whether to follow symlinks while walking.
    pub follow_symlinks: bool,
}

impl ScanOptions {
    /// Create options scanning the whole tree under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            follow_symlinks: true,
            ..Default::default()
        }
    }

    /// Limit the scan to a normalized sub-directory prefix.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Set the exclude filter.
    pub fn with_filter(mut self, filter: GlobFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Check whether a relative path is engine state rather than site content.
///
/// Covers the remote manifest directory and the root-level config file.
pub fn is_reserved_path(path: &str) -> bool {
    path.starts_with(RESERVED_PREFIX) || path == CONFIG_FILE_NAME
}

/// Scanner producing the logical files of one run.
pub struct TreeScanner {
    options: ScanOptions,
}

impl TreeScanner {
    /// Create a new scanner.
    pub fn new(options: ScanOptions) -> Self {
        Self { options }
    }

    /// Walk the tree and load every file that passes the filter.
    ///
    /// Results are sorted by path so runs over an unchanged tree see files in
    /// the same order.
    ///
    /// # Errors
    /// Returns error if the root is missing or a file cannot be read.
    pub fn scan(&self) -> Result<Vec<LogicalFile>, FileSystemError> {
        let root: &Path = &self.options.root;
        let start: PathBuf = root.join(self.options.scope.trim_end_matches('/'));

        if !start.is_dir() {
            return Err(FileSystemError::RootNotFound {
                path: start.display().to_string(),
            });
        }

        let mut files: Vec<LogicalFile> = Vec::new();

        let walker = WalkDir::new(&start)
            .follow_links(self.options.follow_symlinks)
            .sort_by_file_name();

        for entry in walker {
            let entry: walkdir::DirEntry = entry.map_err(|e| FileSystemError::IoError {
                path: e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                source: e.into(),
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path: &Path = entry.path();
            let relative_path: String = relative_posix_path(path, root)?;

            if is_reserved_path(&relative_path) {
                log::debug!("Skipping reserved path {}", relative_path);
                continue;
            }

            if !self.options.filter.is_empty() && !self.options.filter.matches(&relative_path) {
                continue;
            }

            let bytes: Vec<u8> = std::fs::read(path).map_err(|e| FileSystemError::IoError {
                path: path.display().to_string(),
                source: e,
            })?;

            files.push(LogicalFile {
                path: relative_path,
                bytes,
            });
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        log::info!("Found {} files under {}", files.len(), start.display());
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path: PathBuf = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_scan_collects_relative_posix_paths() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        write(dir.path(), "index.html", b"<h1>hi</h1>");
        write(dir.path(), "img/a.png", b"png");
        write(dir.path(), "css/deep/site.css", b"body{}");

        let files: Vec<LogicalFile> =
            TreeScanner::new(ScanOptions::new(dir.path())).scan().unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();

        assert_eq!(paths, vec!["css/deep/site.css", "img/a.png", "index.html"]);
        assert_eq!(files[1].bytes, b"png");
        assert_eq!(files[1].extension(), Some("png".to_string()));
    }

    #[test]
    fn test_scan_skips_reserved_paths() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        write(dir.path(), "hoist.json", b"{}");
        write(dir.path(), ".hoist/cache.json", b"[]");
        write(dir.path(), "about.html", b"about");

        let files: Vec<LogicalFile> =
            TreeScanner::new(ScanOptions::new(dir.path())).scan().unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "about.html");
    }

    #[test]
    fn test_scan_keeps_well_known_dotdir() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        write(dir.path(), ".well-known/security.txt", b"contact");

        let files: Vec<LogicalFile> =
            TreeScanner::new(ScanOptions::new(dir.path())).scan().unwrap();

        assert_eq!(files[0].path, ".well-known/security.txt");
    }

    #[test]
    fn test_scan_applies_filter() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        write(dir.path(), "index.html", b"x");
        write(dir.path(), "drafts/post.html", b"y");

        let filter: GlobFilter = GlobFilter::exclude(vec!["drafts/**".to_string()]).unwrap();
        let files: Vec<LogicalFile> =
            TreeScanner::new(ScanOptions::new(dir.path()).with_filter(filter))
                .scan()
                .unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "index.html");
    }

    #[test]
    fn test_scan_scope_keeps_root_relative_paths() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        write(dir.path(), "index.html", b"x");
        write(dir.path(), "blog/post.html", b"y");

        let files: Vec<LogicalFile> =
            TreeScanner::new(ScanOptions::new(dir.path()).with_scope("blog/"))
                .scan()
                .unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "blog/post.html");
    }

    #[test]
    fn test_scan_missing_root() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        let result: Result<Vec<LogicalFile>, FileSystemError> =
            TreeScanner::new(ScanOptions::new(dir.path()).with_scope("missing/")).scan();
        assert!(matches!(result, Err(FileSystemError::RootNotFound { .. })));
    }

    #[test]
    fn test_is_reserved_path() {
        assert!(is_reserved_path(".hoist/cache.json"));
        assert!(is_reserved_path("hoist.json"));
        assert!(!is_reserved_path("docs/hoist.json"));
        assert!(!is_reserved_path("index.html"));
    }
}
