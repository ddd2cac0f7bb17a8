/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::error::{self, Error};
use crate::io::OutputStream;
use crate::progress::{ProgressObserver, SharedObserver};
use crate::types::ConcurrencySetting;

/// Request type for downloading a single object
#[non_exhaustive]
#[derive(Debug)]
pub struct DownloadInput {
    /// Name of the object to read
    pub target: String,

    /// Where the downloaded bytes are written
    pub destination: OutputStream,

    /// Offset of the first byte of the object to download
    pub start_offset: Option<u64>,

    /// Maximum number of bytes to download. Defaults to the rest of the object.
    pub count: Option<u64>,

    /// Concurrency override for this transfer
    pub concurrency: Option<ConcurrencySetting>,

    pub(crate) progress_observer: Option<SharedObserver>,
}

impl DownloadInput {
    /// Creates a new builder-style object to manufacture [`DownloadInput`](crate::operation::download::DownloadInput).
    pub fn builder() -> DownloadInputBuilder {
        DownloadInputBuilder::default()
    }

    /// Name of the object to read
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Offset of the first byte of the object to download
    pub fn start_offset(&self) -> Option<u64> {
        self.start_offset
    }

    /// Maximum number of bytes to download
    pub fn count(&self) -> Option<u64> {
        self.count
    }

    /// Concurrency override for this transfer
    pub fn concurrency(&self) -> Option<&ConcurrencySetting> {
        self.concurrency.as_ref()
    }

    /// Take ownership of the destination, leaving an in-memory one in its place
    pub(crate) fn take_destination(&mut self) -> OutputStream {
        std::mem::replace(&mut self.destination, OutputStream::memory())
    }
}

/// A builder for [`DownloadInput`](crate::operation::download::DownloadInput).
#[non_exhaustive]
#[derive(Default, Debug)]
pub struct DownloadInputBuilder {
    pub(crate) target: Option<String>,
    pub(crate) destination: Option<OutputStream>,
    pub(crate) start_offset: Option<u64>,
    pub(crate) count: Option<u64>,
    pub(crate) concurrency: Option<ConcurrencySetting>,
    pub(crate) progress_observer: Option<SharedObserver>,
}

impl DownloadInputBuilder {
    /// Name of the object to read. This field is required.
    pub fn target(mut self, input: impl Into<String>) -> Self {
        self.target = Some(input.into());
        self
    }

    /// Name of the object to read.
    pub fn set_target(mut self, input: Option<String>) -> Self {
        self.target = input;
        self
    }

    /// Name of the object to read.
    pub fn get_target(&self) -> &Option<String> {
        &self.target
    }

    /// Where the downloaded bytes are written. Defaults to [`OutputStream::memory`].
    pub fn destination(mut self, input: OutputStream) -> Self {
        self.destination = Some(input);
        self
    }

    /// Offset of the first byte of the object to download.
    pub fn start_offset(mut self, input: u64) -> Self {
        self.start_offset = Some(input);
        self
    }

    /// Maximum number of bytes to download.
    pub fn count(mut self, input: u64) -> Self {
        self.count = Some(input);
        self
    }

    /// Number of chunks in flight for this transfer, overriding the client configuration.
    pub fn concurrency(mut self, input: ConcurrencySetting) -> Self {
        self.concurrency = Some(input);
        self
    }

    /// Receive a [`ProgressEvent`](crate::progress::ProgressEvent) per completed chunk.
    pub fn progress_observer(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.progress_observer = Some(SharedObserver::new(observer));
        self
    }

    /// Consumes the builder and constructs a [`DownloadInput`](crate::operation::download::DownloadInput).
    pub fn build(self) -> Result<DownloadInput, Error> {
        let target = self
            .target
            .ok_or_else(|| error::invalid_input("target is required"))?;
        Ok(DownloadInput {
            target,
            destination: self.destination.unwrap_or_else(OutputStream::memory),
            start_offset: self.start_offset,
            count: self.count,
            concurrency: self.concurrency,
            progress_observer: self.progress_observer,
        })
    }
}
