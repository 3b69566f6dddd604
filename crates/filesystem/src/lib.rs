//! File system operations for hoist.
//!
//! This crate turns a local publish root into the logical files of a run:
//! - `TreeScanner` - Walks the tree and loads file contents
//! - `GlobFilter` - Exclude pattern matching for scans
//! - `PreserveSet` - Preserve-list globs resolved against the scanned tree

pub mod error;
pub mod glob;
pub mod scanner;

pub use error::FileSystemError;
pub use glob::{GlobFilter, PreserveSet};
pub use scanner::{is_reserved_path, LogicalFile, ScanOptions, TreeScanner};
