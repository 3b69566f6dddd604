//! Shared constants used across hoist crates.

/// Default number of publish lanes (concurrent in-flight remote operations).
pub const DEFAULT_LANES: usize = 12;

/// Default grace period before an unwanted remote object is deleted (3 days).
pub const DEFAULT_RETENTION_DAYS: u32 = 3;

/// Milliseconds in one day.
pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Cache policy for content-addressed objects. Their URL changes whenever
/// their bytes do, so edges may keep them forever.
pub const CACHE_CONTROL_IMMUTABLE: &str = "public,max-age=31536000,immutable";

/// Cache policy for mutable entry points (markup, literal names, manifests).
pub const CACHE_CONTROL_NO_CACHE: &str = "no-cache,no-store,max-age=0";

/// Content type that receives bare-URL naming and forced revalidation.
pub const CONTENT_TYPE_HTML: &str = "text/html";

/// Content type for files with an unrecognized extension.
pub const CONTENT_TYPE_DEFAULT: &str = "application/octet-stream";

/// Prefix reserved for engine state, both locally and remotely.
pub const RESERVED_PREFIX: &str = ".hoist/";

/// Remote key of the known cache entry set.
pub const MANIFEST_CACHE_KEY: &str = ".hoist/cache.json";

/// Remote key of the pending deletion map.
pub const MANIFEST_PENDING_DELETION_KEY: &str = ".hoist/pending-deletion.json";

/// File names that always keep their literal name, wherever they live.
pub const WELL_KNOWN_NAMES: &[&str] = &["index.html", "404.html", "robots.txt", "favicon.ico"];

/// Path prefixes whose contents always keep their literal name.
pub const WELL_KNOWN_PREFIXES: &[&str] = &[".well-known/"];

/// Configuration file discovered by walking up from the publish root.
pub const CONFIG_FILE_NAME: &str = "hoist.json";

/// Compression level for gzip-encoded artifacts.
pub const DEFAULT_GZIP_LEVEL: u32 = 8;

/// User metadata key carrying the pre-transform size of an artifact.
pub const METADATA_KEY_ORIGINAL_SIZE: &str = "original-size";

/// Document served for directory requests when website hosting is enabled.
pub const WEBSITE_INDEX_DOCUMENT: &str = "index.html";

/// Document served for missing keys when website hosting is enabled.
pub const WEBSITE_NOT_FOUND_DOCUMENT: &str = "404.html";
