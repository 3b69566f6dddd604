//! Retention-window garbage collection of remote objects.
//!
//! Every object in the run-start listing becomes a deletion candidate.
//! Lanes clear candidates as the run reproduces them; whatever is left
//! after all lanes settle is unwanted. Unwanted objects are stamped the
//! first time they are seen and only deleted once the stamp is older than
//! the retention window, so an object missing from one partial or racing
//! deploy survives until a later run confirms it is really gone.

use std::collections::{HashMap, HashSet};

use hoist_common::{cache_entry_for_hash, RESERVED_PREFIX};
use hoist_storage::{ObjectInfo, ObjectStore, RemoteManifest, TransferError};

/// Cache entries of the run-start listing, mapped to their object keys.
#[derive(Debug, Clone, Default)]
pub struct ListingIndex {
    keys: HashMap<String, String>,
}

impl ListingIndex {
    /// Index a listing. Reserved keys and objects without a comparable
    /// digest are left out, so they are never collected.
    pub fn new(listing: &[ObjectInfo]) -> Self {
        let keys: HashMap<String, String> = listing
            .iter()
            .filter(|object| !object.key.starts_with(RESERVED_PREFIX))
            .filter_map(|object| {
                let hash: &str = object.content_hash.as_deref()?;
                Some((cache_entry_for_hash(&object.key, hash), object.key.clone()))
            })
            .collect();
        Self { keys }
    }

    /// Object key of a cache entry.
    pub fn key(&self, entry: &str) -> Option<&str> {
        self.keys.get(entry).map(String::as_str)
    }

    /// Number of indexed objects.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Mark every listed object as a deletion candidate.
    ///
    /// Existing stamps are kept so an object's grace period runs from the
    /// first run that found it unwanted.
    pub fn seed(&self, manifest: &mut RemoteManifest) {
        for entry in self.keys.keys() {
            manifest.pending_deletion.entry(entry.clone()).or_insert(None);
        }
    }
}

/// Outcome of one collection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionStats {
    /// Candidates still waiting (inside the window, or deletion disabled).
    pub queued_for_deletion: u64,
    /// Objects deleted (or that would be, in a dry run).
    pub deleted: u64,
    /// Failed deletions.
    pub errors: Vec<TransferError>,
}

/// Collector settings for one run.
pub struct GarbageCollector<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    bucket: &'a str,
    retention_millis: i64,
    auto_delete: bool,
    dry_run: bool,
    unscoped: bool,
    produced: HashSet<String>,
}

impl<'a, S: ObjectStore + ?Sized> GarbageCollector<'a, S> {
    /// Create a collector.
    ///
    /// # Arguments
    /// * `store` - Object store holding the published site
    /// * `bucket` - Destination bucket
    /// * `retention_millis` - Minimum age of a stamp before deletion
    pub fn new(store: &'a S, bucket: &'a str, retention_millis: i64) -> Self {
        Self {
            store,
            bucket,
            retention_millis,
            auto_delete: false,
            dry_run: false,
            unscoped: true,
            produced: HashSet::new(),
        }
    }

    /// Delete expired candidates instead of only counting them.
    pub fn with_auto_delete(mut self, auto_delete: bool) -> Self {
        self.auto_delete = auto_delete;
        self
    }

    /// Count deletions without issuing them.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Whether the listing covered the whole bucket.
    ///
    /// Only an unscoped listing proves that a candidate missing from it is
    /// gone, so only then are such candidates dropped.
    pub fn with_unscoped(mut self, unscoped: bool) -> Self {
        self.unscoped = unscoped;
        self
    }

    /// Remote names written by this run.
    ///
    /// A candidate listed under one of these keys was overwritten in place,
    /// so its entry is forgotten rather than deleted.
    pub fn with_produced(mut self, produced: HashSet<String>) -> Self {
        self.produced = produced;
        self
    }

    /// Stamp, expire and delete the remaining candidates.
    ///
    /// # Arguments
    /// * `manifest` - Manifest after all lanes settled
    /// * `listing` - Index of the run-start listing
    /// * `run_started` - Run start time in epoch millis
    pub async fn collect(
        &self,
        manifest: &mut RemoteManifest,
        listing: &ListingIndex,
        run_started: i64,
    ) -> CollectionStats {
        let mut stats: CollectionStats = CollectionStats::default();

        let mut candidates: Vec<String> = manifest.pending_deletion.keys().cloned().collect();
        candidates.sort();

        for entry in candidates {
            let key: String = match listing.key(&entry) {
                Some(key) => key.to_string(),
                None => {
                    if self.unscoped {
                        log::debug!("Dropping deletion candidate {} no longer listed", entry);
                        manifest.forget(&entry);
                    }
                    continue;
                }
            };

            if self.produced.contains(&key) {
                log::debug!("{} was replaced this run", key);
                manifest.forget(&entry);
                continue;
            }

            let first_seen: i64 = match manifest.pending_deletion.get(&entry) {
                Some(Some(stamp)) => *stamp,
                _ => {
                    manifest.pending_deletion.insert(entry.clone(), Some(run_started));
                    run_started
                }
            };

            if run_started - first_seen < self.retention_millis || !self.auto_delete {
                log::debug!("Keeping {} (unwanted since {})", key, first_seen);
                stats.queued_for_deletion += 1;
                continue;
            }

            if self.dry_run {
                log::info!("Would delete {}", key);
                stats.deleted += 1;
                continue;
            }

            match self.store.delete_object(self.bucket, &key).await {
                Ok(()) => {
                    log::info!("Deleted {}", key);
                    manifest.forget(&entry);
                    stats.deleted += 1;
                }
                Err(e) => {
                    log::error!("Failed to delete {}: {}", key, e);
                    stats.queued_for_deletion += 1;
                    stats.errors.push(TransferError::new(key, e));
                }
            }
        }

        stats
    }
}
