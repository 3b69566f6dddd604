//! Options controlling a publish run.

use std::time::Duration;

use hoist_common::{
    DEFAULT_LANES, DEFAULT_RETENTION_DAYS, MILLIS_PER_DAY, WELL_KNOWN_NAMES, WELL_KNOWN_PREFIXES,
};

/// Options for publish operations.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Number of lanes, i.e. maximum concurrent remote writes.
    pub lanes: usize,
    /// How long an unwanted object stays marked before it may be deleted.
    pub retention: Duration,
    /// Whether expired deletion candidates are actually deleted.
    pub auto_delete: bool,
    /// Compute everything but write nothing to the store.
    pub dry_run: bool,
    /// Sub-directory of the publish root limiting the run.
    pub scope: Option<String>,
    /// Globs of files that keep their literal name.
    pub preserve: Vec<String>,
    /// Globs of files left out of the run.
    pub exclude: Vec<String>,
    /// Content types that are never content-addressed.
    pub never_cache: Vec<String>,
    /// File names that keep their literal name in any directory.
    pub well_known_names: Vec<String>,
    /// Path prefixes whose files keep their literal name.
    pub well_known_prefixes: Vec<String>,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            lanes: DEFAULT_LANES,
            retention: Duration::from_millis(
                DEFAULT_RETENTION_DAYS as u64 * MILLIS_PER_DAY as u64,
            ),
            auto_delete: false,
            dry_run: false,
            scope: None,
            preserve: Vec::new(),
            exclude: Vec::new(),
            never_cache: Vec::new(),
            well_known_names: WELL_KNOWN_NAMES.iter().map(|s| s.to_string()).collect(),
            well_known_prefixes: WELL_KNOWN_PREFIXES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl PublishOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of lanes.
    pub fn with_lanes(mut self, lanes: usize) -> Self {
        self.lanes = lanes;
        self
    }

    /// Set the retention window.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Set the retention window in days.
    pub fn with_retention_days(self, days: u32) -> Self {
        self.with_retention(Duration::from_millis(days as u64 * MILLIS_PER_DAY as u64))
    }

    /// Enable or disable deletion of expired candidates.
    pub fn with_auto_delete(mut self, auto_delete: bool) -> Self {
        self.auto_delete = auto_delete;
        self
    }

    /// Enable or disable dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Limit the run to a sub-directory of the publish root.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Set preserve-list globs.
    pub fn with_preserve(mut self, patterns: Vec<String>) -> Self {
        self.preserve = patterns;
        self
    }

    /// Set exclude globs.
    pub fn with_exclude(mut self, patterns: Vec<String>) -> Self {
        self.exclude = patterns;
        self
    }

    /// Set content types that are never content-addressed.
    pub fn with_never_cache(mut self, content_types: Vec<String>) -> Self {
        self.never_cache = content_types;
        self
    }

    /// Retention window in milliseconds.
    pub fn retention_millis(&self) -> i64 {
        self.retention.as_millis() as i64
    }

    /// Effective lane count (at least one).
    pub fn effective_lanes(&self) -> usize {
        self.lanes.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options: PublishOptions = PublishOptions::default();
        assert_eq!(options.lanes, 12);
        assert_eq!(options.retention_millis(), 3 * MILLIS_PER_DAY);
        assert!(!options.auto_delete);
        assert!(options.well_known_names.contains(&"index.html".to_string()));
        assert_eq!(options.well_known_prefixes, vec![".well-known/".to_string()]);
    }

    #[test]
    fn test_builder() {
        let options: PublishOptions = PublishOptions::new()
            .with_lanes(0)
            .with_retention_days(7)
            .with_auto_delete(true)
            .with_scope("blog");

        assert_eq!(options.effective_lanes(), 1);
        assert_eq!(options.retention_millis(), 7 * MILLIS_PER_DAY);
        assert!(options.auto_delete);
        assert_eq!(options.scope.as_deref(), Some("blog"));
    }
}
