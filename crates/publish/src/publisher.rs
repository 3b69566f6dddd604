//! Bounded concurrent publisher.
//!
//! A fixed number of lanes drain one shared work queue. Each lane handles
//! one item at a time, so at most `lanes` remote writes are in flight.
//! Transforms may fan out: derived siblings are pushed onto the same queue
//! while it drains, and a wave is finished only when the completed count
//! catches up with the queued count, including those late additions.
//!
//! Per artifact:
//!
//! ```text
//! Pending ──known cache entry──▶ Skipped
//!    │
//!    └──put──▶ Uploaded | Failed
//! ```

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use futures::future::join_all;
use hoist_common::DEFAULT_LANES;
use hoist_filesystem::LogicalFile;
use hoist_storage::{ObjectStore, RemoteManifest, TransferError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::naming::{Artifact, NamingPolicy};
use crate::progress::{ArtifactState, ProgressCallback, PublishProgress};
use crate::rewrite::RewriteTable;
use crate::transform::{FileFormat, TransformOutput, TransformRegistry};

/// Lock a mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Unit of work in a lane.
#[derive(Debug)]
enum WorkItem {
    /// A logical file still to be rewritten and transformed.
    Source(LogicalFile),
    /// A derived sibling, already named.
    Derived(Artifact),
}

/// Work queue supporting insertion while it drains.
struct WorkQueue {
    items: Mutex<VecDeque<WorkItem>>,
    queued: AtomicUsize,
    completed: AtomicUsize,
    /// Artifacts that reached a terminal state; an item settles at most once.
    settled: AtomicUsize,
    changed: Notify,
}

impl WorkQueue {
    fn new(files: Vec<LogicalFile>) -> Self {
        let items: VecDeque<WorkItem> = files.into_iter().map(WorkItem::Source).collect();
        Self {
            queued: AtomicUsize::new(items.len()),
            items: Mutex::new(items),
            completed: AtomicUsize::new(0),
            settled: AtomicUsize::new(0),
            changed: Notify::new(),
        }
    }

    /// Append an item. Must happen before the producing item completes.
    fn push(&self, item: WorkItem) {
        self.queued.fetch_add(1, Ordering::SeqCst);
        lock(&self.items).push_back(item);
        self.changed.notify_waiters();
    }

    fn pop(&self) -> Option<WorkItem> {
        lock(&self.items).pop_front()
    }

    fn complete(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.changed.notify_waiters();
    }

    /// Count one settled artifact and return its 1-based position.
    fn settle(&self) -> usize {
        self.settled.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    fn is_drained(&self) -> bool {
        self.completed() >= self.queued()
    }
}

/// Counters shared by all lanes of a run.
#[derive(Debug, Default)]
pub struct RunCounters {
    uploaded: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    errors: Mutex<Vec<TransferError>>,
    produced: Mutex<HashSet<String>>,
}

impl RunCounters {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, state: ArtifactState) {
        let counter: &AtomicU64 = match state {
            ArtifactState::Uploaded => &self.uploaded,
            ArtifactState::Skipped => &self.skipped,
            ArtifactState::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn record_error(&self, error: TransferError) {
        lock(&self.errors).push(error);
    }

    fn record_produced(&self, remote_name: &str) {
        lock(&self.produced).insert(remote_name.to_string());
    }

    /// Artifacts uploaded.
    pub fn uploaded(&self) -> u64 {
        self.uploaded.load(Ordering::SeqCst)
    }

    /// Artifacts skipped as already published.
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Artifacts that failed.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    /// Artifacts that reached any terminal state.
    pub fn processed(&self) -> u64 {
        self.uploaded() + self.skipped() + self.failed()
    }

    /// Take the recorded per-artifact errors.
    pub fn take_errors(&self) -> Vec<TransferError> {
        std::mem::take(&mut *lock(&self.errors))
    }

    /// Take the remote names this run wrote or meant to write, failures
    /// included.
    pub fn take_produced(&self) -> HashSet<String> {
        std::mem::take(&mut *lock(&self.produced))
    }
}

/// Lane pool publishing one wave at a time.
pub struct LanePool<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    bucket: &'a str,
    registry: &'a TransformRegistry,
    policy: &'a NamingPolicy,
    manifest: &'a Mutex<RemoteManifest>,
    counters: &'a RunCounters,
    lanes: usize,
    dry_run: bool,
    progress: Option<&'a dyn ProgressCallback<PublishProgress>>,
    cancel: CancellationToken,
}

impl<'a, S: ObjectStore + ?Sized> LanePool<'a, S> {
    /// Create a lane pool.
    ///
    /// # Arguments
    /// * `store` - Object store to publish to
    /// * `bucket` - Destination bucket
    /// * `registry` - Format table
    /// * `policy` - Naming policy
    /// * `manifest` - Manifest shared by all lanes
    /// * `counters` - Run counters shared by all lanes
    pub fn new(
        store: &'a S,
        bucket: &'a str,
        registry: &'a TransformRegistry,
        policy: &'a NamingPolicy,
        manifest: &'a Mutex<RemoteManifest>,
        counters: &'a RunCounters,
    ) -> Self {
        Self {
            store,
            bucket,
            registry,
            policy,
            manifest,
            counters,
            lanes: DEFAULT_LANES,
            dry_run: false,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Set the number of lanes (at least one).
    pub fn with_lanes(mut self, lanes: usize) -> Self {
        self.lanes = lanes.max(1);
        self
    }

    /// Compute everything but skip remote writes.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
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

    /// Publish one wave of logical files.
    ///
    /// Returns once every queued item, including siblings added while
    /// draining, reached a terminal state, or the run was cancelled.
    ///
    /// # Arguments
    /// * `files` - Logical files of the wave
    /// * `table` - Names known before the wave started
    ///
    /// # Returns
    /// Remote names of the wave's primary artifacts, keyed by local path.
    pub async fn run_wave(
        &self,
        files: Vec<LogicalFile>,
        table: &RewriteTable,
    ) -> BTreeMap<String, String> {
        let queue: WorkQueue = WorkQueue::new(files);
        let names: Mutex<BTreeMap<String, String>> = Mutex::new(BTreeMap::new());

        let lanes = (0..self.lanes).map(|lane| self.run_lane(lane, &queue, table, &names));
        join_all(lanes).await;

        if !self.cancel.is_cancelled() {
            log::debug!("Wave settled: {} items", queue.completed());
        }
        names.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    async fn run_lane(
        &self,
        lane: usize,
        queue: &WorkQueue,
        table: &RewriteTable,
        names: &Mutex<BTreeMap<String, String>>,
    ) {
        loop {
            if self.cancel.is_cancelled() {
                return;
            }

            // Register interest before checking, so a push between the
            // check and the wait is not missed.
            let changed = queue.changed.notified();

            match queue.pop() {
                Some(item) => {
                    match item {
                        WorkItem::Source(file) => {
                            self.process_source(file, queue, table, names).await
                        }
                        WorkItem::Derived(artifact) => {
                            self.publish_artifact(artifact, queue).await
                        }
                    }
                    queue.complete();
                }
                None if queue.is_drained() => {
                    log::trace!("Lane {} finished", lane);
                    return;
                }
                None => {
                    tokio::select! {
                        _ = changed => {}
                        _ = self.cancel.cancelled() => return,
                    }
                }
            }
        }
    }

    /// Rewrite, transform and publish one logical file.
    async fn process_source(
        &self,
        file: LogicalFile,
        queue: &WorkQueue,
        table: &RewriteTable,
        names: &Mutex<BTreeMap<String, String>>,
    ) {
        let format: &FileFormat = self.registry.format_for(&file.path);

        let bytes: Vec<u8> = if format.rewrites_references {
            table.rewrite(&file.path, &file.bytes)
        } else {
            file.bytes
        };

        let outputs: Vec<TransformOutput> =
            match format.transform.apply(&file.path, bytes, &format.content_type).await {
                Ok(outputs) => outputs,
                Err(e) => {
                    log::error!("Transform failed for {}: {}", file.path, e);
                    if let Some(name) = self.policy.literal_name(&file.path, &format.content_type) {
                        self.counters.record_produced(&name);
                    }
                    self.counters
                        .record_error(TransferError::new(file.path.as_str(), &e));
                    self.settle(&file.path, None, ArtifactState::Failed, queue);
                    return;
                }
            };

        let mut outputs = outputs.into_iter();
        let primary: TransformOutput = match outputs.next() {
            Some(primary) => primary,
            None => {
                log::debug!("{} produced no artifacts", file.path);
                return;
            }
        };

        for sibling in outputs {
            queue.push(WorkItem::Derived(self.policy.name_artifact(sibling)));
        }

        let artifact: Artifact = self.policy.name_artifact(primary);
        lock(names).insert(file.path, artifact.remote_name.clone());
        self.publish_artifact(artifact, queue).await;
    }

    /// Skip or upload one named artifact.
    async fn publish_artifact(&self, artifact: Artifact, queue: &WorkQueue) {
        let entry: String = artifact.cache_entry();
        self.counters.record_produced(&artifact.remote_name);

        {
            let mut manifest: MutexGuard<'_, RemoteManifest> = lock(self.manifest);
            if manifest.is_known(&entry) {
                manifest.mark_wanted(&entry);
                drop(manifest);
                self.settle(
                    &artifact.source,
                    Some(&artifact.remote_name),
                    ArtifactState::Skipped,
                    queue,
                );
                return;
            }
        }

        if self.dry_run {
            lock(self.manifest).mark_published(&entry);
            self.settle(
                &artifact.source,
                Some(&artifact.remote_name),
                ArtifactState::Uploaded,
                queue,
            );
            return;
        }

        let result = self
            .store
            .put_object(
                self.bucket,
                &artifact.remote_name,
                &artifact.bytes,
                &artifact.headers,
            )
            .await;

        match result {
            Ok(()) => {
                lock(self.manifest).mark_published(&entry);
                self.settle(
                    &artifact.source,
                    Some(&artifact.remote_name),
                    ArtifactState::Uploaded,
                    queue,
                );
            }
            Err(e) => {
                log::error!("Upload of {} failed: {}", artifact.remote_name, e);
                self.counters
                    .record_error(TransferError::new(artifact.source.as_str(), &e));
                self.settle(
                    &artifact.source,
                    Some(&artifact.remote_name),
                    ArtifactState::Failed,
                    queue,
                );
            }
        }
    }

    /// Count a terminal state, log it and report progress.
    fn settle(
        &self,
        path: &str,
        remote_name: Option<&str>,
        state: ArtifactState,
        queue: &WorkQueue,
    ) {
        self.counters.record(state);

        let completed: usize = queue.settle();
        let queued: usize = queue.queued();
        let verb: &str = match (state, self.dry_run) {
            (ArtifactState::Skipped, _) => "Skipped",
            (ArtifactState::Uploaded, false) => "Uploaded",
            (ArtifactState::Uploaded, true) => "Would upload",
            (ArtifactState::Failed, _) => "Failed",
        };
        match remote_name {
            Some(name) if name != path => {
                log::info!("({}/{}) {} {} as {}", completed, queued, verb, path, name)
            }
            _ => log::info!("({}/{}) {} {}", completed, queued, verb, path),
        }

        if let Some(progress) = self.progress {
            let update: PublishProgress = PublishProgress {
                path: path.to_string(),
                remote_name: remote_name.map(str::to_string),
                state,
                completed,
                queued,
            };
            if !progress.on_progress(&update) {
                log::warn!("Publish cancelled by progress callback");
                self.cancel.cancel();
            }
        }
    }
}
