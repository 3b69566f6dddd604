//! Incremental publish engine for static sites.
//!
//! This crate turns a local tree into a content-addressed static site:
//! - `NamingPolicy` - Literal vs. content-addressed remote names
//! - `TransformRegistry` - Per-extension content types and transforms
//! - `RewriteTable` - Local-path references rewritten to remote names
//! - `LanePool` - Bounded concurrent uploads with fan-out
//! - `GarbageCollector` - Retention-window deletion of unwanted objects
//! - `PublishEngine` - One run from listing to manifest write-back
//!
//! # Example
//!
//! ```ignore
//! use hoist_publish::{PublishEngine, PublishOptions};
//! use hoist_storage::{Destination, MemoryObjectStore};
//!
//! let store = MemoryObjectStore::with_bucket("example.com");
//! let engine = PublishEngine::new(&store, Destination::new("example.com"))
//!     .with_options(PublishOptions::new().with_auto_delete(true));
//!
//! let report = engine.publish(Path::new("public")).await?;
//! println!("{}", report);
//! ```

pub mod clock;
pub mod engine;
pub mod error;
pub mod gc;
pub mod naming;
pub mod options;
pub mod progress;
pub mod publisher;
pub mod report;
pub mod rewrite;
pub mod transform;
pub mod waves;

pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::PublishEngine;
pub use error::{PublishError, TransformError};
pub use gc::{CollectionStats, GarbageCollector, ListingIndex};
pub use naming::{content_addressed_name, Artifact, NamingPolicy};
pub use options::PublishOptions;
pub use progress::{progress_fn, ArtifactState, FnProgress, ProgressCallback, PublishProgress};
pub use publisher::{LanePool, RunCounters};
pub use report::PublishReport;
pub use rewrite::{find_references, RewriteTable};
pub use transform::{
    FileFormat, GzipTransform, PassThrough, Transform, TransformOutput, TransformRegistry,
};
pub use waves::{plan_waves, WavePlan};
