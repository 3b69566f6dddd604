//! Remote manifest persistence.
//!
//! The manifest is the engine's memory between runs, stored next to the
//! published site under reserved keys:
//!
//! ```text
//! .hoist/cache.json             ["<cache entry>", ...]
//! .hoist/pending-deletion.json  {"<cache entry>": <epoch millis>, ...}
//! ```
//!
//! Both documents are gzip-encoded JSON written with a no-cache policy. A run
//! reads them once before publishing and writes them back once at the end.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use hoist_common::{
    CACHE_CONTROL_NO_CACHE, DEFAULT_GZIP_LEVEL, MANIFEST_CACHE_KEY, MANIFEST_PENDING_DELETION_KEY,
};
use thiserror::Error;

use crate::error::StorageError;
use crate::traits::ObjectStore;
use crate::types::ObjectHeaders;

/// Content type of both manifest documents.
pub const MANIFEST_CONTENT_TYPE: &str = "application/json";

/// Errors decoding or encoding a manifest document.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to decompress {key}: {message}")]
    Decompress { key: String, message: String },

    #[error("Failed to parse {key}: {message}")]
    Parse { key: String, message: String },

    #[error("Failed to encode {key}: {message}")]
    Encode { key: String, message: String },
}

/// One encoded manifest document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedDocument {
    /// Gzip-compressed JSON.
    pub bytes: Vec<u8>,
    /// Length of the JSON before compression.
    pub original_size: usize,
}

/// Cache entries known to exist remotely plus deletion candidates.
///
/// A pending-deletion value of `None` means the entry has been seeded from
/// the remote listing this run but not yet stamped by the collector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteManifest {
    /// Cache entries of objects already published.
    pub known: HashSet<String>,
    /// Deletion candidates mapped to when they were first seen unwanted.
    pub pending_deletion: HashMap<String, Option<i64>>,
}

impl RemoteManifest {
    /// Create an empty manifest (first-ever run).
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a cache entry has already been published.
    pub fn is_known(&self, entry: &str) -> bool {
        self.known.contains(entry)
    }

    /// Record a published object and clear any deletion mark for it.
    pub fn mark_published(&mut self, entry: &str) {
        self.known.insert(entry.to_string());
        self.pending_deletion.remove(entry);
    }

    /// Clear a deletion mark without touching the known set.
    pub fn mark_wanted(&mut self, entry: &str) {
        self.pending_deletion.remove(entry);
    }

    /// Forget an object after it was deleted remotely.
    pub fn forget(&mut self, entry: &str) {
        self.known.remove(entry);
        self.pending_deletion.remove(entry);
    }

    /// Decode the manifest from the two stored documents.
    ///
    /// # Arguments
    /// * `cache` - Stored `cache.json` bytes, if the object exists
    /// * `pending` - Stored `pending-deletion.json` bytes, if the object exists
    ///
    /// # Errors
    /// Returns error if either document is present but undecodable.
    pub fn decode(cache: Option<&[u8]>, pending: Option<&[u8]>) -> Result<Self, ManifestError> {
        let known: HashSet<String> = match cache {
            Some(bytes) => {
                let entries: Vec<String> = decode_document(MANIFEST_CACHE_KEY, bytes)?;
                entries.into_iter().collect()
            }
            None => HashSet::new(),
        };

        let pending_deletion: HashMap<String, Option<i64>> = match pending {
            Some(bytes) => {
                let stamps: HashMap<String, i64> =
                    decode_document(MANIFEST_PENDING_DELETION_KEY, bytes)?;
                stamps.into_iter().map(|(k, v)| (k, Some(v))).collect()
            }
            None => HashMap::new(),
        };

        Ok(Self {
            known,
            pending_deletion,
        })
    }

    /// Encode both documents as gzip-compressed JSON.
    ///
    /// Entries are written sorted so unchanged state produces identical
    /// documents. Unstamped pending entries are dropped.
    ///
    /// # Returns
    /// `(cache, pending_deletion)` documents.
    pub fn encode(&self) -> Result<(EncodedDocument, EncodedDocument), ManifestError> {
        let mut known: Vec<&String> = self.known.iter().collect();
        known.sort();

        let pending: BTreeMap<&String, i64> = self
            .pending_deletion
            .iter()
            .filter_map(|(k, v)| v.map(|stamp| (k, stamp)))
            .collect();

        let cache: EncodedDocument = encode_document(MANIFEST_CACHE_KEY, &known)?;
        let pending: EncodedDocument = encode_document(MANIFEST_PENDING_DELETION_KEY, &pending)?;
        Ok((cache, pending))
    }
}

/// Headers used for both manifest documents.
pub fn manifest_headers(original_size: usize) -> ObjectHeaders {
    ObjectHeaders::new(MANIFEST_CONTENT_TYPE, CACHE_CONTROL_NO_CACHE)
        .with_content_encoding("gzip")
        .with_original_size(original_size as u64)
}

/// Read the manifest from the store.
///
/// Missing documents yield empty state. Documents that cannot be decoded
/// are logged and also yield empty state, at the cost of a full re-publish.
///
/// # Arguments
/// * `store` - Object store holding the published site
/// * `bucket` - Destination bucket
///
/// # Errors
/// Returns error if the store fails for a reason other than not-found.
pub async fn load_manifest<S: ObjectStore + ?Sized>(
    store: &S,
    bucket: &str,
) -> Result<RemoteManifest, StorageError> {
    let cache: Option<Vec<u8>> = store.get_object(bucket, MANIFEST_CACHE_KEY).await?;
    let pending: Option<Vec<u8>> = store.get_object(bucket, MANIFEST_PENDING_DELETION_KEY).await?;

    if cache.is_none() {
        log::info!("No remote manifest in {}, starting from empty state", bucket);
    }

    match RemoteManifest::decode(cache.as_deref(), pending.as_deref()) {
        Ok(manifest) => {
            log::debug!(
                "Loaded manifest: {} known, {} pending deletion",
                manifest.known.len(),
                manifest.pending_deletion.len()
            );
            Ok(manifest)
        }
        Err(e) => {
            log::warn!("Ignoring unreadable remote manifest: {}", e);
            Ok(RemoteManifest::new())
        }
    }
}

/// Write the manifest back to the store.
///
/// # Errors
/// Returns error if encoding or either upload fails.
pub async fn save_manifest<S: ObjectStore + ?Sized>(
    store: &S,
    bucket: &str,
    manifest: &RemoteManifest,
) -> Result<(), StorageError> {
    let (cache, pending) = manifest.encode().map_err(|e| StorageError::Other {
        message: e.to_string(),
    })?;

    for (key, document) in [
        (MANIFEST_CACHE_KEY, &cache),
        (MANIFEST_PENDING_DELETION_KEY, &pending),
    ] {
        store
            .put_object(
                bucket,
                key,
                &document.bytes,
                &manifest_headers(document.original_size),
            )
            .await?;
    }

    log::debug!(
        "Saved manifest: {} known, {} pending deletion",
        manifest.known.len(),
        manifest.pending_deletion.len()
    );
    Ok(())
}

/// Gzip magic bytes.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

fn decode_document<T: serde::de::DeserializeOwned>(
    key: &str,
    bytes: &[u8],
) -> Result<T, ManifestError> {
    // Some stores decompress transparently on read.
    let json: Vec<u8> = if bytes.starts_with(&GZIP_MAGIC) {
        let mut decoder: GzDecoder<&[u8]> = GzDecoder::new(bytes);
        let mut out: Vec<u8> = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| ManifestError::Decompress {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        out
    } else {
        bytes.to_vec()
    };

    serde_json::from_slice(&json).map_err(|e| ManifestError::Parse {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn encode_document<T: serde::Serialize>(
    key: &str,
    value: &T,
) -> Result<EncodedDocument, ManifestError> {
    let encode_err = |message: String| ManifestError::Encode {
        key: key.to_string(),
        message,
    };

    let json: Vec<u8> = serde_json::to_vec(value).map_err(|e| encode_err(e.to_string()))?;
    let mut encoder: GzEncoder<Vec<u8>> =
        GzEncoder::new(Vec::new(), Compression::new(DEFAULT_GZIP_LEVEL));
    encoder
        .write_all(&json)
        .map_err(|e| encode_err(e.to_string()))?;
    let bytes: Vec<u8> = encoder.finish().map_err(|e| encode_err(e.to_string()))?;
    Ok(EncodedDocument {
        bytes,
        original_size: json.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryObjectStore;

    fn sample() -> RemoteManifest {
        let mut manifest: RemoteManifest = RemoteManifest::new();
        manifest.known.insert("entry-a".to_string());
        manifest.known.insert("entry-b".to_string());
        manifest
            .pending_deletion
            .insert("entry-old".to_string(), Some(1_700_000_000_000));
        manifest
    }

    #[test]
    fn test_mark_published_clears_pending() {
        let mut manifest: RemoteManifest = RemoteManifest::new();
        manifest.pending_deletion.insert("e".to_string(), Some(1));

        manifest.mark_published("e");

        assert!(manifest.is_known("e"));
        assert!(!manifest.pending_deletion.contains_key("e"));
    }

    #[test]
    fn test_forget_removes_everywhere() {
        let mut manifest: RemoteManifest = sample();
        manifest.known.insert("entry-old".to_string());

        manifest.forget("entry-old");

        assert!(!manifest.is_known("entry-old"));
        assert!(!manifest.pending_deletion.contains_key("entry-old"));
    }

    #[test]
    fn test_encode_is_gzip_and_decodes_back() {
        let manifest: RemoteManifest = sample();
        let (cache, pending) = manifest.encode().unwrap();

        assert!(cache.bytes.starts_with(&GZIP_MAGIC));
        assert!(pending.bytes.starts_with(&GZIP_MAGIC));

        let decoded: RemoteManifest = RemoteManifest::decode(
            Some(cache.bytes.as_slice()),
            Some(pending.bytes.as_slice()),
        )
        .unwrap();
        assert_eq!(decoded, manifest);
    }

    #[test]
    fn test_encode_drops_unstamped_entries() {
        let mut manifest: RemoteManifest = RemoteManifest::new();
        manifest.pending_deletion.insert("seeded".to_string(), None);

        let (_, pending) = manifest.encode().unwrap();
        let decoded: RemoteManifest =
            RemoteManifest::decode(None, Some(pending.bytes.as_slice())).unwrap();

        assert!(decoded.pending_deletion.is_empty());
    }

    #[test]
    fn test_encode_is_deterministic() {
        let a: (EncodedDocument, EncodedDocument) = sample().encode().unwrap();
        let b: (EncodedDocument, EncodedDocument) = sample().encode().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_decode_plain_json() {
        let decoded: RemoteManifest = RemoteManifest::decode(
            Some(br#"["x","y"]"#.as_slice()),
            Some(br#"{"z": 42}"#.as_slice()),
        )
        .unwrap();

        assert_eq!(decoded.known.len(), 2);
        assert_eq!(decoded.pending_deletion.get("z"), Some(&Some(42)));
    }

    #[test]
    fn test_decode_garbage() {
        let result: Result<RemoteManifest, ManifestError> =
            RemoteManifest::decode(Some(b"not json".as_slice()), None);
        assert!(matches!(result, Err(ManifestError::Parse { .. })));

        let result: Result<RemoteManifest, ManifestError> =
            RemoteManifest::decode(Some([0x1f, 0x8b, 0x00, 0x01].as_slice()), None);
        assert!(matches!(result, Err(ManifestError::Decompress { .. })));
    }

    #[tokio::test]
    async fn test_load_missing_is_empty() {
        let store: MemoryObjectStore = MemoryObjectStore::with_bucket("site");
        let manifest: RemoteManifest = load_manifest(&store, "site").await.unwrap();
        assert_eq!(manifest, RemoteManifest::new());
    }

    #[tokio::test]
    async fn test_load_corrupt_is_empty() {
        let store: MemoryObjectStore = MemoryObjectStore::with_bucket("site");
        store.insert_object("site", MANIFEST_CACHE_KEY, b"{{{".to_vec());

        let manifest: RemoteManifest = load_manifest(&store, "site").await.unwrap();
        assert_eq!(manifest, RemoteManifest::new());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store: MemoryObjectStore = MemoryObjectStore::with_bucket("site");
        let manifest: RemoteManifest = sample();

        save_manifest(&store, "site", &manifest).await.unwrap();

        let headers: ObjectHeaders = store.headers("site", MANIFEST_CACHE_KEY).unwrap();
        assert_eq!(headers.cache_control, CACHE_CONTROL_NO_CACHE);
        assert_eq!(headers.content_encoding.as_deref(), Some("gzip"));

        let loaded: RemoteManifest = load_manifest(&store, "site").await.unwrap();
        assert_eq!(loaded, manifest);
    }

    #[tokio::test]
    async fn test_save_records_uncompressed_size() {
        let store: MemoryObjectStore = MemoryObjectStore::with_bucket("site");
        let mut manifest: RemoteManifest = RemoteManifest::new();
        for entry in ["a", "b", "c"] {
            manifest.known.insert(entry.to_string());
        }

        save_manifest(&store, "site", &manifest).await.unwrap();

        let cache: ObjectHeaders = store.headers("site", MANIFEST_CACHE_KEY).unwrap();
        assert_eq!(cache.original_size, Some(br#"["a","b","c"]"#.len() as u64));
        let pending: ObjectHeaders = store
            .headers("site", MANIFEST_PENDING_DELETION_KEY)
            .unwrap();
        assert_eq!(pending.original_size, Some(b"{}".len() as u64));
    }

    #[tokio::test]
    async fn test_load_propagates_store_errors() {
        let store: MemoryObjectStore = MemoryObjectStore::new();
        let result: Result<RemoteManifest, StorageError> = load_manifest(&store, "missing").await;
        assert!(matches!(result, Err(StorageError::BucketNotFound { .. })));
    }
}
