//! Shared types and utilities for hoist.
//!
//! This crate provides functionality used across all hoist crates:
//! - Content hashing and cache entry derivation
//! - Path normalization for local trees and remote names
//! - Shared constants and error types

pub mod constants;
pub mod error;
pub mod hash;
pub mod path_utils;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::PathError;
pub use hash::{
    cache_entry, cache_entry_for_hash, content_hash_from_hex, hash_bytes, ContentHasher,
};
pub use path_utils::{
    extension, file_name, lexical_normalize, normalize_scope, relative_posix_path,
    split_parent, strip_extension, to_posix_path,
};
