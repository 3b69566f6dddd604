//! Object store abstraction for hoist.
//!
//! This crate provides the platform-agnostic interface the publish engine
//! talks to, plus everything that lives on the remote side of a run:
//!
//! - **ObjectStore** - bucket and object operations, implemented per backend
//! - **MemoryObjectStore** - in-memory backend for tests and dry runs
//! - **Remote manifest** - the persisted set of published cache entries and
//!   pending deletions, stored under `.hoist/` in the destination bucket

mod error;
pub mod manifest;
pub mod memory;
mod traits;
mod types;

pub use error::{StorageError, TransferError};
pub use manifest::{
    load_manifest, manifest_headers, save_manifest, EncodedDocument, ManifestError,
    RemoteManifest, MANIFEST_CONTENT_TYPE,
};
pub use memory::{MemoryObjectStore, StoredObject};
pub use traits::{ObjectInfo, ObjectStore};
pub use types::{Destination, ObjectHeaders, WebsiteConfig};
