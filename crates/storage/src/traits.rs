//! Object store interface consumed by the publish engine.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::types::{ObjectHeaders, WebsiteConfig};

/// Information about a remote object from a list operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Object key.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Store-reported digest of the stored bytes, normalized to the
    /// base64url content hash encoding. `None` when the store cannot
    /// provide a comparable digest (e.g. multipart uploads).
    pub content_hash: Option<String>,
}

/// Low-level object store operations - implemented by each backend.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Check whether a bucket exists.
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StorageError>;

    /// Create a bucket.
    ///
    /// # Arguments
    /// * `bucket` - Bucket name
    /// * `location_hint` - Backend-specific location (region) for the bucket
    async fn create_bucket(
        &self,
        bucket: &str,
        location_hint: Option<&str>,
    ) -> Result<(), StorageError>;

    /// List objects with prefix.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectInfo>, StorageError>;

    /// Download an object. Returns `None` if the object doesn't exist.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Upload bytes with the given headers, replacing any existing object.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        headers: &ObjectHeaders,
    ) -> Result<(), StorageError>;

    /// Delete an object.
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StorageError>;

    /// Serve the bucket as a static website.
    ///
    /// # Arguments
    /// * `bucket` - Bucket name
    /// * `website` - Index and not-found documents
    async fn configure_website(
        &self,
        bucket: &str,
        website: &WebsiteConfig,
    ) -> Result<(), StorageError>;

    /// Grant or revoke anonymous read access to every object in the bucket.
    ///
    /// # Arguments
    /// * `bucket` - Bucket name
    /// * `public` - `true` to allow anonymous reads, `false` to block them
    async fn set_public_access(&self, bucket: &str, public: bool) -> Result<(), StorageError>;
}
