/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

/* Automatically managed default lints */
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
/* End of automatically managed default lints */
#![warn(
    missing_debug_implementations,
    missing_docs,
    rustdoc::missing_crate_level_docs,
    unreachable_pub,
    rust_2018_idioms
)]

//! A client-side transfer engine for block and range addressed object storage.
//!
//! Payloads larger than what a single request can carry are split into bounded-size
//! chunks, transferred sequentially or across a bounded pool of workers, and assembled
//! deterministically: block uploads are committed with a manifest ordered by chunk
//! sequence, range uploads and downloads address each chunk at its own fixed offset.
//!
//! # Examples
//!
//! Upload a buffer and read it back:
//!
//! ```no_run
//! # async fn example() -> Result<(), blob_transfer::error::Error> {
//! use std::sync::Arc;
//! use blob_transfer::io::{InputStream, OutputStream};
//! use blob_transfer::transport::in_memory::InMemoryTransport;
//! use blob_transfer::types::ConcurrencySetting;
//!
//! let config = blob_transfer::from_env()
//!     .concurrency(ConcurrencySetting::Explicit(4))
//!     .load(Arc::new(InMemoryTransport::new()));
//! let client = blob_transfer::Client::new(config);
//!
//! let handle = client
//!     .upload()
//!     .target("my-blob")
//!     .body(InputStream::from(vec![7u8; 32 * 1024 * 1024]))
//!     .initiate()?;
//! handle.join().await?;
//!
//! let handle = client
//!     .download()
//!     .target("my-blob")
//!     .destination(OutputStream::memory())
//!     .initiate()?;
//! let output = handle.join().await?;
//! assert_eq!(32 * 1024 * 1024, output.body().unwrap().len());
//! # Ok(())
//! # }
//! ```
//!
//! See the documentation for each client operation for more information:
//!
//! * [`upload`](crate::Client::upload) - upload a single object
//! * [`download`](crate::Client::download) - download a single object

pub(crate) const MEBIBYTE: u64 = 1024 * 1024;

/// Default number of concurrent chunk transfers for a single operation
pub(crate) const DEFAULT_CONCURRENCY: usize = 1;

/// Error types emitted by `blob-transfer`
pub mod error;

/// Common types used by `blob-transfer`
pub mod types;

/// Types and helpers for I/O
pub mod io;

/// Chunk planning
pub mod plan;

/// Progress reporting
pub mod progress;

/// The remote storage service boundary
pub mod transport;

/// Transfer client
pub mod client;

/// Transfer operations
pub mod operation;

/// Transfer configuration
pub mod config;

pub use self::client::Client;
use self::config::loader::ConfigLoader;
pub use self::config::Config;

/// Create a config loader
pub fn from_env() -> ConfigLoader {
    ConfigLoader::default()
}
