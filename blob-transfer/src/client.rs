/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

use crate::transport::Transport;
use crate::types::{ConcurrencySetting, PartSize};
use crate::Config;
use crate::{DEFAULT_CONCURRENCY, MEBIBYTE};

/// Transfer client for block and range addressed object storage.
#[derive(Debug, Clone)]
pub struct Client {
    pub(crate) handle: Arc<Handle>,
}

/// Whatever is needed to carry out operations, e.g. config and the transport
#[derive(Debug)]
pub(crate) struct Handle {
    pub(crate) config: crate::Config,
}

impl Handle {
    /// Get the concrete number of workers to use based on the concurrency setting.
    pub(crate) fn num_workers(&self) -> usize {
        resolve_concurrency(self.config.concurrency())
    }

    /// Get the concrete largest payload size transferred in a single request.
    pub(crate) fn single_shot_threshold_bytes(&self) -> u64 {
        match self.config.single_shot_threshold() {
            PartSize::Auto => 64 * MEBIBYTE,
            PartSize::Target(explicit) => *explicit,
        }
    }

    /// Get the concrete chunk size to use for transfers
    pub(crate) fn chunk_size_bytes(&self) -> u64 {
        match self.config.chunk_size() {
            PartSize::Auto => 4 * MEBIBYTE,
            PartSize::Target(explicit) => *explicit,
        }
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        self.config.transport()
    }
}

/// Concrete number of workers for a concurrency setting, at least one.
pub(crate) fn resolve_concurrency(setting: &ConcurrencySetting) -> usize {
    match setting {
        ConcurrencySetting::Explicit(concurrency) => (*concurrency).max(1),
        ConcurrencySetting::Auto => DEFAULT_CONCURRENCY,
    }
}

impl Client {
    /// Creates a new client from a transfer config.
    pub fn new(config: Config) -> Client {
        let handle = Arc::new(Handle { config });
        Client { handle }
    }

    /// Returns the client's configuration
    pub fn config(&self) -> &Config {
        &self.handle.config
    }

    /// Upload a single object.
    ///
    /// Constructs a fluent builder for the
    /// [`Upload`](crate::operation::upload::builders::UploadFluentBuilder) operation.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::error::Error;
    /// use std::path::Path;
    /// use blob_transfer::io::InputStream;
    ///
    /// async fn upload_file(
    ///     client: &blob_transfer::Client,
    ///     path: impl AsRef<Path>
    /// ) -> Result<(), Box<dyn Error>> {
    ///     let stream = InputStream::from_path(path)?;
    ///     let handle = client.upload()
    ///         .target("my-blob")
    ///         .body(stream)
    ///         .initiate()?;
    ///
    ///     // initiate() will return before the transfer is complete.
    ///     // Call the `join()` method on the returned handle to drive the transfer to completion.
    ///     let response = handle.join().await?;
    ///     // ... do something with response
    ///     Ok(())
    /// }
    /// ```
    pub fn upload(&self) -> crate::operation::upload::builders::UploadFluentBuilder {
        crate::operation::upload::builders::UploadFluentBuilder::new(self.handle.clone())
    }

    /// Download a single object.
    ///
    /// A single logical request may be split into many concurrent ranged reads.
    ///
    /// Constructs a fluent builder for the
    /// [`Download`](crate::operation::download::builders::DownloadFluentBuilder) operation.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::error::Error;
    /// use blob_transfer::io::OutputStream;
    ///
    /// async fn download_file(client: &blob_transfer::Client) -> Result<(), Box<dyn Error>> {
    ///     let handle = client
    ///         .download()
    ///         .target("my-blob")
    ///         .destination(OutputStream::to_path("/tmp/my-blob"))
    ///         .initiate()?;
    ///
    ///     handle.join().await?;
    ///     Ok(())
    /// }
    /// ```
    pub fn download(&self) -> crate::operation::download::builders::DownloadFluentBuilder {
        crate::operation::download::builders::DownloadFluentBuilder::new(self.handle.clone())
    }
}
