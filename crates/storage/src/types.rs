//! Shared data structures for storage operations.

use std::collections::HashMap;

use hoist_common::{
    METADATA_KEY_ORIGINAL_SIZE, WEBSITE_INDEX_DOCUMENT, WEBSITE_NOT_FOUND_DOCUMENT,
};

/// Headers written with every published object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHeaders {
    /// `Content-Type`.
    pub content_type: String,
    /// `Content-Encoding`, if the bytes are encoded (e.g. `gzip`).
    pub content_encoding: Option<String>,
    /// `Cache-Control`.
    pub cache_control: String,
    /// Size of the artifact before encoding, sent as user metadata.
    pub original_size: Option<u64>,
}

impl ObjectHeaders {
    /// Create headers with a content type and cache policy.
    pub fn new(content_type: impl Into<String>, cache_control: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            content_encoding: None,
            cache_control: cache_control.into(),
            original_size: None,
        }
    }

    /// Set the content encoding.
    pub fn with_content_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.content_encoding = Some(encoding.into());
        self
    }

    /// Set the original-size hint.
    pub fn with_original_size(mut self, size: u64) -> Self {
        self.original_size = Some(size);
        self
    }

    /// Build user metadata for the upload.
    pub fn user_metadata(&self) -> HashMap<String, String> {
        let mut metadata: HashMap<String, String> = HashMap::new();
        if let Some(size) = self.original_size {
            metadata.insert(METADATA_KEY_ORIGINAL_SIZE.to_string(), size.to_string());
        }
        metadata
    }
}

/// Where a run publishes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Bucket name.
    pub bucket: String,
    /// Location hint used when the bucket has to be created.
    pub location_hint: Option<String>,
    /// Whether a missing bucket is created instead of aborting the run.
    pub create_if_missing: bool,
}

impl Destination {
    /// Create a destination for an existing bucket.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            location_hint: None,
            create_if_missing: false,
        }
    }

    /// Create the bucket at `location` when it does not exist.
    pub fn create_if_missing(mut self, location: Option<String>) -> Self {
        self.create_if_missing = true;
        self.location_hint = location;
        self
    }

    /// Public URL of the published site.
    pub fn url(&self) -> String {
        format!("https://{}", self.bucket)
    }
}

/// Static website hosting settings for a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebsiteConfig {
    /// Suffix appended to directory requests.
    pub index_document: String,
    /// Key served when the requested key does not exist.
    pub not_found_document: String,
}

impl Default for WebsiteConfig {
    fn default() -> Self {
        Self {
            index_document: WEBSITE_INDEX_DOCUMENT.into(),
            not_found_document: WEBSITE_NOT_FOUND_DOCUMENT.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_headers_metadata() {
        let headers: ObjectHeaders = ObjectHeaders::new("text/css", "no-cache")
            .with_content_encoding("gzip")
            .with_original_size(1234);

        assert_eq!(headers.content_encoding.as_deref(), Some("gzip"));
        assert_eq!(
            headers.user_metadata().get("original-size").map(String::as_str),
            Some("1234")
        );
        assert!(ObjectHeaders::new("a", "b").user_metadata().is_empty());
    }

    #[test]
    fn test_destination() {
        let dest: Destination =
            Destination::new("example.org").create_if_missing(Some("us-west1".into()));
        assert!(dest.create_if_missing);
        assert_eq!(dest.location_hint.as_deref(), Some("us-west1"));
        assert_eq!(dest.url(), "https://example.org");
    }

    #[test]
    fn test_default_website_documents() {
        let website: WebsiteConfig = WebsiteConfig::default();
        assert_eq!(website.index_document, "index.html");
        assert_eq!(website.not_found_document, "404.html");
    }
}
