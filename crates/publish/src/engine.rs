//! Publish run orchestration.
//!
//! A run is a single read-modify-write of the remote manifest:
//!
//! 1. Check (or create and configure for website hosting) the destination bucket
//! 2. List the destination once and load the manifest
//! 3. Scan the local tree and resolve the preserve list
//! 4. Publish files wave by wave through the lane pool
//! 5. Collect unwanted objects past their retention window
//! 6. Write the manifest back, unless the run was cancelled

use std::path::Path;
use std::sync::{Arc, Mutex};

use hoist_common::normalize_scope;
use hoist_filesystem::{GlobFilter, LogicalFile, PreserveSet, ScanOptions, TreeScanner};
use hoist_storage::{
    load_manifest, save_manifest, Destination, ObjectInfo, ObjectStore, RemoteManifest,
    WebsiteConfig,
};
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, SystemClock};
use crate::error::PublishError;
use crate::gc::{CollectionStats, GarbageCollector, ListingIndex};
use crate::naming::NamingPolicy;
use crate::options::PublishOptions;
use crate::progress::{ProgressCallback, PublishProgress};
use crate::publisher::{LanePool, RunCounters};
use crate::report::PublishReport;
use crate::rewrite::RewriteTable;
use crate::transform::TransformRegistry;
use crate::waves::{plan_waves, WavePlan};

/// Publishes a local tree to one destination.
pub struct PublishEngine<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    destination: Destination,
    options: PublishOptions,
    registry: TransformRegistry,
    clock: Arc<dyn Clock>,
    progress: Option<&'a dyn ProgressCallback<PublishProgress>>,
    cancel: CancellationToken,
}

impl<'a, S: ObjectStore + ?Sized> PublishEngine<'a, S> {
    /// Create an engine with default options and formats.
    ///
    /// # Arguments
    /// * `store` - Object store backend
    /// * `destination` - Bucket to publish to
    pub fn new(store: &'a S, destination: Destination) -> Self {
        Self {
            store,
            destination,
            options: PublishOptions::default(),
            registry: TransformRegistry::default(),
            clock: Arc::new(SystemClock),
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Set run options.
    pub fn with_options(mut self, options: PublishOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the format table.
    pub fn with_registry(mut self, registry: TransformRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Set the clock used for retention stamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the progress callback. Returning `false` from it cancels the run.
    pub fn with_progress(mut self, progress: &'a dyn ProgressCallback<PublishProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Set the cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run options.
    pub fn options(&self) -> &PublishOptions {
        &self.options
    }

    /// Publish the tree under `root`.
    ///
    /// # Arguments
    /// * `root` - Local publish root; remote names are relative to it
    ///
    /// # Returns
    /// Run report. Per-artifact failures are counted there, not returned.
    ///
    /// # Errors
    /// Returns error if setup fails (destination, listing, manifest read,
    /// scan, patterns), the manifest cannot be written, or the run is
    /// cancelled. A cancelled run writes no manifest.
    pub async fn publish(&self, root: &Path) -> Result<PublishReport, PublishError> {
        let run_started: i64 = self.clock.now_millis();
        let bucket: &str = &self.destination.bucket;

        if bucket.is_empty() {
            return Err(PublishError::Setup {
                message: "no destination bucket configured".to_string(),
            });
        }

        let scope: String = match self.options.scope.as_deref() {
            Some(scope) => normalize_scope(scope)?,
            None => String::new(),
        };

        let bucket_exists: bool = self.ensure_destination().await?;

        let (listing, mut manifest): (Vec<ObjectInfo>, RemoteManifest) = if bucket_exists {
            let listing: Vec<ObjectInfo> = self.store.list_objects(bucket, &scope).await?;
            let manifest: RemoteManifest = load_manifest(self.store, bucket).await?;
            (listing, manifest)
        } else {
            (Vec::new(), RemoteManifest::new())
        };
        let index: ListingIndex = ListingIndex::new(&listing);
        log::info!("{} objects under {}/{}", listing.len(), bucket, scope);

        let files: Vec<LogicalFile> = self.scan(root, &scope)?;
        let preserve: PreserveSet =
            PreserveSet::resolve(&self.options.preserve, files.iter().map(|f| f.path.as_str()))?;
        let policy: NamingPolicy = NamingPolicy::new(&self.options, preserve);

        index.seed(&mut manifest);

        let WavePlan {
            waves,
            literal_names,
            ..
        } = plan_waves(files, &self.registry, &policy);
        log::debug!("Publishing in {} waves", waves.len());

        let shared_manifest: Mutex<RemoteManifest> = Mutex::new(manifest);
        let counters: RunCounters = RunCounters::new();

        let mut pool: LanePool<'_, S> = LanePool::new(
            self.store,
            bucket,
            &self.registry,
            &policy,
            &shared_manifest,
            &counters,
        )
        .with_lanes(self.options.effective_lanes())
        .with_dry_run(self.options.dry_run)
        .with_cancellation(self.cancel.clone());
        if let Some(progress) = self.progress {
            pool = pool.with_progress(progress);
        }

        let mut table: RewriteTable = literal_names;
        for wave in waves {
            if self.cancel.is_cancelled() {
                break;
            }
            let names = pool.run_wave(wave, &table).await;
            table.extend(names);
        }
        drop(pool);

        if self.cancel.is_cancelled() {
            log::warn!("Publish cancelled, remote manifest left unchanged");
            return Err(PublishError::Cancelled);
        }

        let mut manifest: RemoteManifest = shared_manifest
            .into_inner()
            .unwrap_or_else(|e| e.into_inner());

        let collection: CollectionStats =
            GarbageCollector::new(self.store, bucket, self.options.retention_millis())
                .with_auto_delete(self.options.auto_delete)
                .with_dry_run(self.options.dry_run)
                .with_unscoped(scope.is_empty())
                .with_produced(counters.take_produced())
                .collect(&mut manifest, &index, run_started)
                .await;

        if self.options.dry_run {
            log::info!("Dry run, remote manifest not written");
        } else {
            save_manifest(self.store, bucket, &manifest).await?;
        }

        let mut errors = counters.take_errors();
        errors.extend(collection.errors);

        let report: PublishReport = PublishReport {
            uploaded: counters.uploaded(),
            skipped: counters.skipped(),
            failed: counters.failed(),
            processed: counters.processed(),
            queued_for_deletion: collection.queued_for_deletion,
            deleted: collection.deleted,
            errors,
            url: self.destination.url(),
            dry_run: self.options.dry_run,
        };
        log::info!("{}", report);
        Ok(report)
    }

    /// Make sure the destination bucket exists.
    ///
    /// # Returns
    /// Whether the bucket exists after the check. Only a dry run that would
    /// have created the bucket returns `false`.
    async fn ensure_destination(&self) -> Result<bool, PublishError> {
        let bucket: &str = &self.destination.bucket;

        if self.store.bucket_exists(bucket).await? {
            log::info!("Bucket {} exists", bucket);
            return Ok(true);
        }

        if !self.destination.create_if_missing {
            return Err(PublishError::DestinationMissing {
                bucket: bucket.to_string(),
            });
        }

        if self.options.dry_run {
            log::info!("Would create bucket {}", bucket);
            return Ok(false);
        }

        log::info!("Creating bucket {}", bucket);
        self.store
            .create_bucket(bucket, self.destination.location_hint.as_deref())
            .await?;
        self.store
            .configure_website(bucket, &WebsiteConfig::default())
            .await?;
        Ok(true)
    }

    fn scan(&self, root: &Path, scope: &str) -> Result<Vec<LogicalFile>, PublishError> {
        let filter: GlobFilter = GlobFilter::exclude(self.options.exclude.clone())?;
        let scanner: TreeScanner =
            TreeScanner::new(ScanOptions::new(root).with_scope(scope).with_filter(filter));
        Ok(scanner.scan()?)
    }
}
