//! Per-format transforms applied to logical files before publishing.
//!
//! A [`TransformRegistry`] maps a lowercase extension to a [`FileFormat`]:
//! the content type served for it, whether its text can reference other
//! files, and the [`Transform`] producing its artifacts. The first output of
//! a transform is the primary artifact; any further outputs are derived
//! siblings that are published independently.
//!
//! | Formats | Transform |
//! |---------|-----------|
//! | png, jpg, jpeg, gif, webp, bmp, ico | pass through |
//! | everything else | gzip, level 8 |

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use hoist_common::{extension, CONTENT_TYPE_DEFAULT, CONTENT_TYPE_HTML, DEFAULT_GZIP_LEVEL};

use crate::error::TransformError;

/// One artifact produced by a transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    /// Relative path the artifact is named from (e.g. `img/a.png` or a
    /// derived `img/a.webp`).
    pub relative_name: String,
    /// Final bytes to publish.
    pub bytes: Vec<u8>,
    /// `Content-Type` to serve.
    pub content_type: String,
    /// `Content-Encoding`, if the bytes are encoded.
    pub content_encoding: Option<String>,
    /// Cache policy override. `None` lets the naming policy decide.
    pub cache_control: Option<String>,
    /// Size of the bytes before encoding.
    pub original_size: u64,
}

impl TransformOutput {
    /// Create an output served as-is.
    pub fn new(
        relative_name: impl Into<String>,
        bytes: Vec<u8>,
        content_type: impl Into<String>,
    ) -> Self {
        let original_size: u64 = bytes.len() as u64;
        Self {
            relative_name: relative_name.into(),
            bytes,
            content_type: content_type.into(),
            content_encoding: None,
            cache_control: None,
            original_size,
        }
    }
}

/// Turns one logical file into zero or more artifacts.
#[async_trait]
pub trait Transform: Send + Sync {
    /// Transform a file.
    ///
    /// # Arguments
    /// * `path` - Relative path of the logical file
    /// * `bytes` - File content, already reference-rewritten for text formats
    /// * `content_type` - Content type registered for the file's format
    ///
    /// # Returns
    /// Ordered outputs; the first is the primary artifact.
    async fn apply(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<Vec<TransformOutput>, TransformError>;
}

/// Publishes bytes unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

#[async_trait]
impl Transform for PassThrough {
    async fn apply(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<Vec<TransformOutput>, TransformError> {
        Ok(vec![TransformOutput::new(path, bytes, content_type)])
    }
}

/// Gzip-compresses bytes and marks them `Content-Encoding: gzip`.
#[derive(Debug, Clone, Copy)]
pub struct GzipTransform {
    level: u32,
}

impl GzipTransform {
    /// Create a gzip transform with the given compression level (0-9).
    pub fn new(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }

    /// Compress bytes.
    ///
    /// # Errors
    /// Returns error if the encoder fails.
    pub fn compress(&self, path: &str, bytes: &[u8]) -> Result<Vec<u8>, TransformError> {
        let compression_err = |e: std::io::Error| TransformError::Compression {
            path: path.to_string(),
            message: e.to_string(),
        };

        let mut encoder: GzEncoder<Vec<u8>> =
            GzEncoder::new(Vec::with_capacity(bytes.len() / 2), Compression::new(self.level));
        encoder.write_all(bytes).map_err(compression_err)?;
        encoder.finish().map_err(compression_err)
    }
}

impl Default for GzipTransform {
    fn default() -> Self {
        Self::new(DEFAULT_GZIP_LEVEL)
    }
}

#[async_trait]
impl Transform for GzipTransform {
    async fn apply(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<Vec<TransformOutput>, TransformError> {
        let compressed: Vec<u8> = self.compress(path, &bytes)?;
        Ok(vec![TransformOutput {
            relative_name: path.to_string(),
            bytes: compressed,
            content_type: content_type.to_string(),
            content_encoding: Some("gzip".to_string()),
            cache_control: None,
            original_size: bytes.len() as u64,
        }])
    }
}

/// How files of one format are served and transformed.
#[derive(Clone)]
pub struct FileFormat {
    /// Content type served for the format.
    pub content_type: String,
    /// Whether the format's text can reference other local files.
    pub rewrites_references: bool,
    /// Transform producing the format's artifacts.
    pub transform: Arc<dyn Transform>,
}

impl FileFormat {
    /// Create a format.
    pub fn new(content_type: impl Into<String>, transform: Arc<dyn Transform>) -> Self {
        Self {
            content_type: content_type.into(),
            rewrites_references: false,
            transform,
        }
    }

    /// Mark the format as able to reference other files.
    pub fn rewriting(mut self) -> Self {
        self.rewrites_references = true;
        self
    }
}

impl std::fmt::Debug for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileFormat")
            .field("content_type", &self.content_type)
            .field("rewrites_references", &self.rewrites_references)
            .finish_non_exhaustive()
    }
}

/// Image formats served without re-encoding.
const PASS_THROUGH_FORMATS: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
    ("ico", "image/x-icon"),
];

/// Formats served gzip-compressed.
const COMPRESSED_FORMATS: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("html", CONTENT_TYPE_HTML),
    ("htm", CONTENT_TYPE_HTML),
    ("css", "text/css"),
    ("js", "text/javascript"),
    ("md", "text/markdown"),
    ("svg", "image/svg+xml"),
    ("json", "application/json"),
    ("pdf", "application/pdf"),
];

/// Formats whose text is reference-rewritten.
const REWRITING_FORMATS: &[&str] = &["html", "htm", "css"];

/// Extension to format table with a gzip default.
#[derive(Debug, Clone)]
pub struct TransformRegistry {
    formats: HashMap<String, FileFormat>,
    fallback: FileFormat,
}

impl TransformRegistry {
    /// Create a registry with no formats; every file uses `fallback`.
    pub fn empty(fallback: FileFormat) -> Self {
        Self {
            formats: HashMap::new(),
            fallback,
        }
    }

    /// Register (or replace) the format for an extension.
    ///
    /// # Arguments
    /// * `extension` - Extension without the dot, matched case-insensitively
    /// * `format` - Format to use
    pub fn register(&mut self, extension: &str, format: FileFormat) -> &mut Self {
        self.formats.insert(extension.to_ascii_lowercase(), format);
        self
    }

    /// Replace only the transform of an already registered extension.
    ///
    /// Unregistered extensions get the fallback content type.
    pub fn set_transform(&mut self, extension: &str, transform: Arc<dyn Transform>) -> &mut Self {
        let mut format: FileFormat = self.format_for_extension(Some(extension)).clone();
        format.transform = transform;
        self.register(extension, format)
    }

    /// Look up the format for a relative path.
    pub fn format_for(&self, path: &str) -> &FileFormat {
        self.format_for_extension(extension(path).as_deref())
    }

    fn format_for_extension(&self, extension: Option<&str>) -> &FileFormat {
        extension
            .and_then(|ext| self.formats.get(&ext.to_ascii_lowercase()))
            .unwrap_or(&self.fallback)
    }

    /// Content type served for a relative path.
    pub fn content_type_for(&self, path: &str) -> &str {
        &self.format_for(path).content_type
    }

    /// Whether a relative path's text is reference-rewritten.
    pub fn rewrites_references(&self, path: &str) -> bool {
        self.format_for(path).rewrites_references
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        let gzip: Arc<dyn Transform> = Arc::new(GzipTransform::default());
        let pass_through: Arc<dyn Transform> = Arc::new(PassThrough);

        let mut registry: Self =
            Self::empty(FileFormat::new(CONTENT_TYPE_DEFAULT, Arc::clone(&gzip)));

        for (ext, content_type) in PASS_THROUGH_FORMATS {
            registry.register(ext, FileFormat::new(*content_type, Arc::clone(&pass_through)));
        }
        for (ext, content_type) in COMPRESSED_FORMATS {
            let mut format: FileFormat = FileFormat::new(*content_type, Arc::clone(&gzip));
            if REWRITING_FORMATS.contains(ext) {
                format = format.rewriting();
            }
            registry.register(ext, format);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn gunzip(bytes: &[u8]) -> Vec<u8> {
        let mut out: Vec<u8> = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_default_table() {
        let registry: TransformRegistry = TransformRegistry::default();

        assert_eq!(registry.content_type_for("img/a.PNG"), "image/png");
        assert_eq!(registry.content_type_for("index.html"), "text/html");
        assert_eq!(registry.content_type_for("app.js"), "text/javascript");
        assert_eq!(registry.content_type_for("data.bin"), CONTENT_TYPE_DEFAULT);
        assert_eq!(registry.content_type_for("LICENSE"), CONTENT_TYPE_DEFAULT);

        assert!(registry.rewrites_references("css/site.css"));
        assert!(registry.rewrites_references("about.html"));
        assert!(!registry.rewrites_references("app.js"));
        assert!(!registry.rewrites_references("img/a.png"));
    }

    #[tokio::test]
    async fn test_gzip_transform() {
        let registry: TransformRegistry = TransformRegistry::default();
        let format: &FileFormat = registry.format_for("site.css");

        let outputs: Vec<TransformOutput> = format
            .transform
            .apply("site.css", b"body{color:red}".to_vec(), &format.content_type)
            .await
            .unwrap();

        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].content_encoding.as_deref(), Some("gzip"));
        assert_eq!(outputs[0].original_size, 15);
        assert_eq!(gunzip(&outputs[0].bytes), b"body{color:red}");
    }

    #[tokio::test]
    async fn test_images_pass_through() {
        let registry: TransformRegistry = TransformRegistry::default();
        let format: &FileFormat = registry.format_for("img/a.jpg");

        let outputs: Vec<TransformOutput> = format
            .transform
            .apply("img/a.jpg", vec![0xff, 0xd8], &format.content_type)
            .await
            .unwrap();

        assert_eq!(outputs[0].bytes, vec![0xff, 0xd8]);
        assert_eq!(outputs[0].content_type, "image/jpeg");
        assert!(outputs[0].content_encoding.is_none());
    }

    #[test]
    fn test_gzip_output_is_deterministic() {
        let gzip: GzipTransform = GzipTransform::default();
        assert_eq!(
            gzip.compress("a", b"same bytes").unwrap(),
            gzip.compress("b", b"same bytes").unwrap()
        );
    }

    #[test]
    fn test_set_transform_keeps_content_type() {
        let mut registry: TransformRegistry = TransformRegistry::default();
        registry.set_transform("css", Arc::new(PassThrough));

        let format: &FileFormat = registry.format_for("a.css");
        assert_eq!(format.content_type, "text/css");
        assert!(format.rewrites_references);
    }
}
