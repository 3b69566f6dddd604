//! `hoist.json` discovery and loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hoist_common::CONFIG_FILE_NAME;
use serde::Deserialize;

/// Settings read from `hoist.json`.
///
/// Every field is optional; command line flags take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Destination bucket.
    pub bucket: Option<String>,
    /// Store region.
    pub region: Option<String>,
    /// Location hint used when creating the bucket.
    pub location: Option<String>,
    /// Custom endpoint for S3-compatible stores.
    pub endpoint: Option<String>,
    /// Static access key, used together with `secret_access_key` instead
    /// of the default credential chain.
    pub access_key_id: Option<String>,
    /// Static secret key.
    pub secret_access_key: Option<String>,
    /// Session token for temporary credentials.
    pub session_token: Option<String>,
    /// Globs of files that keep their literal name.
    pub preserve: Vec<String>,
    /// Globs of files left out of every run.
    pub exclude: Vec<String>,
    /// Content types that are never content-addressed.
    pub never_cache: Vec<String>,
    /// Retention window for unwanted objects, in days.
    pub retention_days: Option<u32>,
    /// Number of lanes.
    pub lanes: Option<usize>,
    /// Delete expired objects.
    pub auto_delete: bool,
    /// Create the bucket when it does not exist.
    pub create_bucket: bool,
}

/// Find `hoist.json` in `start` or the nearest ancestor that has one.
pub fn find_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

/// Load the config governing a publish root.
///
/// # Returns
/// The parsed config and its path, or the default config and `None` when no
/// file exists.
///
/// # Errors
/// Returns error if a config file exists but cannot be read or parsed.
pub fn load_config(root: &Path) -> Result<(Config, Option<PathBuf>)> {
    let path: PathBuf = match find_config(root) {
        Some(path) => path,
        None => return Ok((Config::default(), None)),
    };

    let text: String = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: Config = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    log::debug!("Loaded config from {}", path.display());
    Ok((config, Some(path)))
}
