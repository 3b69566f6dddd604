//! In-memory object store.
//!
//! Backs tests and dry runs. Listings report the same digest a real store
//! reports for single-part uploads, so manifest reconciliation behaves the
//! same as against S3.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use hoist_common::hash_bytes;

use crate::error::StorageError;
use crate::traits::{ObjectInfo, ObjectStore};
use crate::types::{ObjectHeaders, WebsiteConfig};

/// A stored object and the headers it was written with.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub headers: Option<ObjectHeaders>,
}

#[derive(Debug, Default)]
struct State {
    buckets: BTreeMap<String, BTreeMap<String, StoredObject>>,
    websites: BTreeMap<String, WebsiteConfig>,
    public_buckets: HashSet<String>,
    failing_puts: HashSet<String>,
    failing_deletes: HashSet<String>,
    fail_gets: bool,
}

/// Object store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    state: Mutex<State>,
    puts: AtomicUsize,
    deletes: AtomicUsize,
    lists: AtomicUsize,
}

impl MemoryObjectStore {
    /// Create a store with no buckets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with one empty bucket.
    pub fn with_bucket(bucket: &str) -> Self {
        let store: Self = Self::new();
        store.lock().buckets.insert(bucket.to_string(), BTreeMap::new());
        store
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Place an object directly, bypassing counters and fault injection.
    pub fn insert_object(&self, bucket: &str, key: &str, data: Vec<u8>) {
        self.lock()
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), StoredObject { data, headers: None });
    }

    /// Make every future `put_object` for `key` fail.
    pub fn fail_puts_for(&self, key: &str) {
        self.lock().failing_puts.insert(key.to_string());
    }

    /// Make every future `delete_object` for `key` fail.
    pub fn fail_deletes_for(&self, key: &str) {
        self.lock().failing_deletes.insert(key.to_string());
    }

    /// Make every future `get_object` fail with a network error.
    pub fn fail_gets(&self) {
        self.lock().fail_gets = true;
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        let mut state: MutexGuard<'_, State> = self.lock();
        state.failing_puts.clear();
        state.failing_deletes.clear();
        state.fail_gets = false;
    }

    /// Get a stored object.
    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.lock().buckets.get(bucket)?.get(key).cloned()
    }

    /// Get the headers an object was last written with.
    pub fn headers(&self, bucket: &str, key: &str) -> Option<ObjectHeaders> {
        self.object(bucket, key)?.headers
    }

    /// All keys in a bucket, sorted.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.lock()
            .buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Website settings last applied to a bucket.
    pub fn website(&self, bucket: &str) -> Option<WebsiteConfig> {
        self.lock().websites.get(bucket).cloned()
    }

    /// Whether anonymous reads are currently allowed on a bucket.
    pub fn is_public(&self, bucket: &str) -> bool {
        self.lock().public_buckets.contains(bucket)
    }

    /// Number of successful and failed `put_object` calls.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Number of successful and failed `delete_object` calls.
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Number of `list_objects` calls.
    pub fn list_count(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    /// Reset call counters.
    pub fn reset_counts(&self) {
        self.puts.store(0, Ordering::SeqCst);
        self.deletes.store(0, Ordering::SeqCst);
        self.lists.store(0, Ordering::SeqCst);
    }
}

fn bucket_not_found(bucket: &str) -> StorageError {
    StorageError::BucketNotFound {
        bucket: bucket.to_string(),
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StorageError> {
        Ok(self.lock().buckets.contains_key(bucket))
    }

    async fn create_bucket(
        &self,
        bucket: &str,
        _location_hint: Option<&str>,
    ) -> Result<(), StorageError> {
        self.lock().buckets.entry(bucket.to_string()).or_default();
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectInfo>, StorageError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        let state: MutexGuard<'_, State> = self.lock();
        let objects: &BTreeMap<String, StoredObject> =
            state.buckets.get(bucket).ok_or_else(|| bucket_not_found(bucket))?;

        Ok(objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| ObjectInfo {
                key: key.clone(),
                size: object.data.len() as u64,
                content_hash: Some(hash_bytes(&object.data)),
            })
            .collect())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let state: MutexGuard<'_, State> = self.lock();
        if state.fail_gets {
            return Err(StorageError::NetworkError {
                message: format!("injected get failure for {}", key),
                retryable: true,
            });
        }
        let objects: &BTreeMap<String, StoredObject> =
            state.buckets.get(bucket).ok_or_else(|| bucket_not_found(bucket))?;
        Ok(objects.get(key).map(|object| object.data.clone()))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        headers: &ObjectHeaders,
    ) -> Result<(), StorageError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let mut state: MutexGuard<'_, State> = self.lock();
        if state.failing_puts.contains(key) {
            return Err(StorageError::NetworkError {
                message: format!("injected put failure for {}", key),
                retryable: true,
            });
        }
        let objects: &mut BTreeMap<String, StoredObject> = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| bucket_not_found(bucket))?;
        objects.insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                headers: Some(headers.clone()),
            },
        );
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        let mut state: MutexGuard<'_, State> = self.lock();
        if state.failing_deletes.contains(key) {
            return Err(StorageError::NetworkError {
                message: format!("injected delete failure for {}", key),
                retryable: true,
            });
        }
        let objects: &mut BTreeMap<String, StoredObject> = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| bucket_not_found(bucket))?;
        objects.remove(key);
        Ok(())
    }

    async fn configure_website(
        &self,
        bucket: &str,
        website: &WebsiteConfig,
    ) -> Result<(), StorageError> {
        let mut state: MutexGuard<'_, State> = self.lock();
        if !state.buckets.contains_key(bucket) {
            return Err(bucket_not_found(bucket));
        }
        state.websites.insert(bucket.to_string(), website.clone());
        Ok(())
    }

    async fn set_public_access(&self, bucket: &str, public: bool) -> Result<(), StorageError> {
        let mut state: MutexGuard<'_, State> = self.lock();
        if !state.buckets.contains_key(bucket) {
            return Err(bucket_not_found(bucket));
        }
        if public {
            state.public_buckets.insert(bucket.to_string());
        } else {
            state.public_buckets.remove(bucket);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bucket_lifecycle() {
        let store: MemoryObjectStore = MemoryObjectStore::new();
        assert!(!store.bucket_exists("site").await.unwrap());

        store.create_bucket("site", Some("us-west1")).await.unwrap();
        assert!(store.bucket_exists("site").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_get_list_delete() {
        let store: MemoryObjectStore = MemoryObjectStore::with_bucket("site");
        let headers: ObjectHeaders = ObjectHeaders::new("text/css", "no-cache");

        store.put_object("site", "css/a", b"body{}", &headers).await.unwrap();
        store.put_object("site", "index.html", b"<p>", &headers).await.unwrap();

        assert_eq!(
            store.get_object("site", "css/a").await.unwrap(),
            Some(b"body{}".to_vec())
        );
        assert_eq!(store.get_object("site", "missing").await.unwrap(), None);

        let listed: Vec<ObjectInfo> = store.list_objects("site", "css/").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].content_hash, Some(hash_bytes(b"body{}")));

        store.delete_object("site", "css/a").await.unwrap();
        assert_eq!(store.keys("site"), vec!["index.html".to_string()]);
        assert_eq!(store.put_count(), 2);
        assert_eq!(store.delete_count(), 1);
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let store: MemoryObjectStore = MemoryObjectStore::with_bucket("site");
        let headers: ObjectHeaders = ObjectHeaders::new("text/plain", "no-cache");
        store.fail_puts_for("bad");

        let result: Result<(), StorageError> =
            store.put_object("site", "bad", b"x", &headers).await;
        assert!(result.unwrap_err().is_retryable());
        assert!(store.object("site", "bad").is_none());

        store.clear_faults();
        store.put_object("site", "bad", b"x", &headers).await.unwrap();
        assert!(store.object("site", "bad").is_some());
    }

    #[tokio::test]
    async fn test_missing_bucket() {
        let store: MemoryObjectStore = MemoryObjectStore::new();
        let result: Result<Option<Vec<u8>>, StorageError> = store.get_object("nope", "k").await;
        assert!(matches!(result, Err(StorageError::BucketNotFound { .. })));
    }

    #[tokio::test]
    async fn test_website_and_public_access() {
        let store: MemoryObjectStore = MemoryObjectStore::with_bucket("site");
        assert!(store.website("site").is_none());
        assert!(!store.is_public("site"));

        store.configure_website("site", &WebsiteConfig::default()).await.unwrap();
        assert_eq!(store.website("site"), Some(WebsiteConfig::default()));

        store.set_public_access("site", true).await.unwrap();
        assert!(store.is_public("site"));
        store.set_public_access("site", false).await.unwrap();
        assert!(!store.is_public("site"));

        let result: Result<(), StorageError> = store.set_public_access("nope", true).await;
        assert!(matches!(result, Err(StorageError::BucketNotFound { .. })));
        let result: Result<(), StorageError> =
            store.configure_website("nope", &WebsiteConfig::default()).await;
        assert!(matches!(result, Err(StorageError::BucketNotFound { .. })));
    }
}
