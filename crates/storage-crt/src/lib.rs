//! AWS SDK S3 backend for hoist.
//!
//! This crate provides an `ObjectStore` implementation using the AWS SDK for
//! Rust. Listings report the object ETag as a content hash, so single-part
//! uploads can be reconciled against the remote manifest without downloads.
//!
//! # Example
//!
//! ```ignore
//! use hoist_storage_crt::{CrtStorageClient, S3Settings};
//!
//! let client = CrtStorageClient::new(S3Settings::default()).await?;
//! let exists = client.bucket_exists("www.example.org").await?;
//! ```

mod client;
mod error;

pub use client::{AwsCredentials, CrtStorageClient, S3Settings, DEFAULT_REGION};
pub use error::CrtError;
