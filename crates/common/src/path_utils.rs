//! Path utilities for local publish trees and remote object names.
//!
//! Local paths are converted once, at scan time, into relative POSIX strings.
//! Everything downstream (naming, rewriting, remote keys) works on those
//! strings, never on `Path`.

use std::path::{Component, Path, PathBuf};

use crate::error::PathError;

/// Lexical path normalization without filesystem access.
///
/// Removes `.` components and resolves `..` components lexically.
///
/// # Arguments
/// * `path` - Path to normalize
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut components: Vec<Component> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !components.is_empty()
                    && !matches!(
                        components.last(),
                        Some(Component::ParentDir) | Some(Component::RootDir)
                    )
                {
                    components.pop();
                } else {
                    components.push(component);
                }
            }
            _ => components.push(component),
        }
    }

    components.iter().collect()
}

/// Convert a path to POSIX-style string (forward slashes).
///
/// # Arguments
/// * `path` - Path to convert
pub fn to_posix_path(path: &Path) -> String {
    path.components()
        .map(|c: Component| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Compute the relative POSIX path of `path` under `root`.
///
/// Both paths are normalized lexically first; symlinks are not resolved.
///
/// # Arguments
/// * `path` - Path of a file inside the publish tree
/// * `root` - Publish root
///
/// # Errors
/// Returns error if path is outside the root directory.
pub fn relative_posix_path(path: &Path, root: &Path) -> Result<String, PathError> {
    let normalized: PathBuf = lexical_normalize(path);
    let normalized_root: PathBuf = lexical_normalize(root);

    let relative: &Path = normalized
        .strip_prefix(&normalized_root)
        .map_err(|_| PathError::PathOutsideRoot {
            path: normalized.display().to_string(),
            root: normalized_root.display().to_string(),
        })?;

    Ok(to_posix_path(relative))
}

/// Normalize a user supplied POSIX sub-directory into a key prefix.
///
/// `"./blog/"`, `"blog"` and `"/blog"` all become `"blog/"`. An empty or
/// root-only input becomes `""` (the whole destination).
///
/// # Errors
/// Returns error if the input escapes the root with `..`.
pub fn normalize_scope(scope: &str) -> Result<String, PathError> {
    let mut parts: Vec<&str> = Vec::new();
    for part in scope.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                return Err(PathError::ScopeEscapesRoot {
                    scope: scope.to_string(),
                })
            }
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!("{}/", parts.join("/")))
    }
}

/// Split a POSIX path into its parent directory (with trailing slash) and
/// file name. Root-level files have an empty parent.
pub fn split_parent(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(idx) => (&path[..=idx], &path[idx + 1..]),
        None => ("", path),
    }
}

/// Get the file name component of a POSIX path.
pub fn file_name(path: &str) -> &str {
    split_parent(path).1
}

/// Get the lowercase extension of a POSIX path, without the dot.
///
/// Dotfiles such as `.htaccess` have no extension.
pub fn extension(path: &str) -> Option<String> {
    let name: &str = file_name(path);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(idx) => Some(name[idx + 1..].to_ascii_lowercase()),
    }
}

/// Remove the extension from the file name of a POSIX path.
///
/// `"blog/post.html"` becomes `"blog/post"`.
pub fn strip_extension(path: &str) -> &str {
    let (parent, name) = split_parent(path);
    match name.rfind('.') {
        Some(0) | None => path,
        Some(idx) => &path[..parent.len() + idx],
    }
}
