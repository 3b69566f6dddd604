//! Glob pattern matching for publish trees.
//!
//! Patterns are matched against relative POSIX paths (`img/logo.png`), using
//! `globset` syntax: `**` for recursive matching, `*.{png,jpg}` brace
//! expansion and `[abc]` character classes.
//!
//! Two uses exist in a run:
//! - the scan filter, which drops excluded files from the tree entirely
//! - the preserve list, which is resolved once against the scanned tree into
//!   a [`PreserveSet`] of paths that must keep their literal remote name

use std::collections::HashSet;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::FileSystemError;

/// Exclude filter over relative POSIX paths.
#[derive(Debug, Clone, Default)]
pub struct GlobFilter {
    /// Patterns for files to leave out of the scan.
    exclude: Vec<String>,
    exclude_set: Option<GlobSet>,
}

impl GlobFilter {
    /// Create a filter that drops every path matching one of `patterns`.
    ///
    /// # Errors
    /// Returns error if any pattern is invalid.
    pub fn exclude(patterns: Vec<String>) -> Result<Self, FileSystemError> {
        let exclude_set: Option<GlobSet> = compile(&patterns)?;
        Ok(Self {
            exclude: patterns,
            exclude_set,
        })
    }

    /// Check if a path passes the filter, i.e. matches no exclude pattern.
    pub fn matches(&self, path: &str) -> bool {
        match &self.exclude_set {
            Some(set) => !set.is_match(path),
            None => true,
        }
    }

    /// Check if the filter has any patterns.
    pub fn is_empty(&self) -> bool {
        self.exclude.is_empty()
    }
}

/// Compile patterns into a `GlobSet`, or `None` when there are none.
fn compile(patterns: &[String]) -> Result<Option<GlobSet>, FileSystemError> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder: GlobSetBuilder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob: Glob = Glob::new(pattern).map_err(|e| FileSystemError::InvalidGlobPattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;
        builder.add(glob);
    }

    let set: GlobSet = builder
        .build()
        .map_err(|e| FileSystemError::InvalidGlobPattern {
            pattern: patterns.join(", "),
            reason: e.to_string(),
        })?;
    Ok(Some(set))
}

/// Paths of the local tree that must never be content-addressed.
///
/// Resolved once at run start so every lane sees the same answer.
#[derive(Debug, Clone, Default)]
pub struct PreserveSet {
    paths: HashSet<String>,
}

impl PreserveSet {
    /// Resolve preserve patterns against the scanned relative paths.
    ///
    /// # Arguments
    /// * `patterns` - Preserve-list glob patterns
    /// * `paths` - Relative POSIX paths of the local tree
    ///
    /// # Errors
    /// Returns error if any pattern is invalid.
    pub fn resolve<'a>(
        patterns: &[String],
        paths: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, FileSystemError> {
        let set: Option<GlobSet> = compile(patterns)?;
        let paths: HashSet<String> = match set {
            Some(set) => paths
                .into_iter()
                .filter(|p| set.is_match(p))
                .map(str::to_string)
                .collect(),
            None => HashSet::new(),
        };
        Ok(Self { paths })
    }

    /// Check whether a path was matched by the preserve list.
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// Number of preserved paths.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Check whether nothing is preserved.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
