//! Hash computation utilities.
//!
//! Two identities are derived from published bytes:
//!
//! - **Content hash** - base64url (RFC 4648 §5, no padding) MD5 digest of the
//!   bytes. Used as the cache-busted file name of content-addressed objects.
//! - **Cache entry** - digest of `remote_name ++ content_hash`. Identifies one
//!   exact object at one exact location in the remote manifest.
//!
//! MD5 matches the digest object stores report for single-part uploads, so a
//! remote listing can be turned into cache entries without reading bodies.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use md5::{Digest, Md5};

/// Compute the base64url content hash of a byte slice.
///
/// # Arguments
/// * `data` - Bytes to hash
///
/// # Returns
/// 22-character base64url string (128 bits, no padding).
pub fn hash_bytes(data: &[u8]) -> String {
    let digest = Md5::digest(data);
    URL_SAFE_NO_PAD.encode(digest)
}

/// Compute the cache entry for bytes published at a remote name.
///
/// Changes if either the destination or the payload changes.
///
/// # Arguments
/// * `remote_name` - Full object key the bytes are published under
/// * `data` - Final (post-transform) bytes
pub fn cache_entry(remote_name: &str, data: &[u8]) -> String {
    cache_entry_for_hash(remote_name, &hash_bytes(data))
}

/// Compute the cache entry from an already known content hash.
///
/// Used when reconciling a remote listing whose store reports the digest.
///
/// # Arguments
/// * `remote_name` - Full object key
/// * `content_hash` - Base64url content hash of the object's bytes
pub fn cache_entry_for_hash(remote_name: &str, content_hash: &str) -> String {
    let mut hasher: ContentHasher = ContentHasher::new();
    hasher.update(remote_name.as_bytes());
    hasher.update(content_hash.as_bytes());
    hasher.finish()
}

/// Convert a hex MD5 digest (e.g. an S3 ETag) to the content hash encoding.
///
/// Surrounding quotes are ignored. Returns `None` for anything that is not
/// a 32-character hex digest, such as multipart ETags (`"<hex>-<parts>"`).
///
/// # Arguments
/// * `hex` - Hex-encoded MD5 digest
pub fn content_hash_from_hex(hex: &str) -> Option<String> {
    let hex: &str = hex.trim_matches('"');
    if hex.len() != 32 {
        return None;
    }

    let mut bytes: [u8; 16] = [0u8; 16];
    hex::decode_to_slice(hex, &mut bytes).ok()?;
    Some(URL_SAFE_NO_PAD.encode(bytes))
}

/// Streaming hasher for incremental content hashing.
pub struct ContentHasher {
    inner: Md5,
}

impl ContentHasher {
    /// Create a new streaming hasher.
    pub fn new() -> Self {
        Self { inner: Md5::new() }
    }

    /// Update the hasher with additional data.
    ///
    /// # Arguments
    /// * `data` - Bytes to add to the hash computation
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalize and return the base64url digest.
    pub fn finish(self) -> String {
        URL_SAFE_NO_PAD.encode(self.inner.finalize())
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_bytes_known_value() {
        // md5("hello world") = 5eb63bbbe01eeed093cb22bb8f5acdc3
        assert_eq!(hash_bytes(b"hello world"), "XrY7u-Ae7tCTyyK7j1rNww");
    }

    #[test]
    fn test_hash_bytes_is_url_safe() {
        for i in 0..512u32 {
            let hash: String = hash_bytes(&i.to_le_bytes());
            assert_eq!(hash.len(), 22);
            assert!(!hash.contains('+'));
            assert!(!hash.contains('/'));
            assert!(!hash.contains('='));
        }
    }

    #[test]
    fn test_hash_bytes_different_inputs() {
        assert_ne!(hash_bytes(b"hello"), hash_bytes(b"world"));
    }

    #[test]
    fn test_content_hasher_incremental() {
        let mut hasher: ContentHasher = ContentHasher::new();
        hasher.update(b"hello ");
        hasher.update(b"world");
        assert_eq!(hasher.finish(), hash_bytes(b"hello world"));
    }

    #[test]
    fn test_cache_entry_depends_on_name_and_content() {
        let base: String = cache_entry("css/abc", b"body{}");
        assert_eq!(base, cache_entry("css/abc", b"body{}"));
        assert_ne!(base, cache_entry("css/abd", b"body{}"));
        assert_ne!(base, cache_entry("css/abc", b"body{ }"));
    }

    #[test]
    fn test_cache_entry_matches_precomputed_hash() {
        let data: &[u8] = b"<html></html>";
        assert_eq!(
            cache_entry("index.html", data),
            cache_entry_for_hash("index.html", &hash_bytes(data))
        );
    }

    #[test]
    fn test_content_hash_from_hex() {
        assert_eq!(
            content_hash_from_hex("\"5eb63bbbe01eeed093cb22bb8f5acdc3\""),
            Some(hash_bytes(b"hello world"))
        );
        assert_eq!(content_hash_from_hex("5eb63bbbe01eeed093cb22bb8f5acdc3-2"), None);
        assert_eq!(content_hash_from_hex("zz"), None);
        assert_eq!(content_hash_from_hex("zzb63bbbe01eeed093cb22bb8f5acdc3"), None);
    }

    #[test]
    fn test_content_hash_from_uppercase_hex() {
        assert_eq!(
            content_hash_from_hex("5EB63BBBE01EEED093CB22BB8F5ACDC3"),
            Some(hash_bytes(b"hello world"))
        );
    }
}
