/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

use crate::error::{BoxError, Error};
use crate::io::OutputStream;
use crate::progress::{ProgressEvent, ProgressObserver};
use crate::types::ConcurrencySetting;

use super::{DownloadHandle, DownloadInputBuilder};

/// Fluent builder for constructing a single object download transfer
#[derive(Debug)]
pub struct DownloadFluentBuilder {
    handle: Arc<crate::client::Handle>,
    inner: DownloadInputBuilder,
}

impl DownloadFluentBuilder {
    pub(crate) fn new(handle: Arc<crate::client::Handle>) -> Self {
        Self {
            handle,
            inner: ::std::default::Default::default(),
        }
    }

    /// Initiate a download transfer for a single object
    pub fn initiate(self) -> Result<DownloadHandle, Error> {
        let input = self.inner.build()?;
        crate::operation::download::Download::orchestrate(self.handle, input)
    }

    /// Name of the object to read. This field is required.
    pub fn target(mut self, input: impl Into<String>) -> Self {
        self.inner = self.inner.target(input);
        self
    }

    /// Name of the object to read.
    pub fn set_target(mut self, input: Option<String>) -> Self {
        self.inner = self.inner.set_target(input);
        self
    }

    /// Name of the object to read.
    pub fn get_target(&self) -> &Option<String> {
        self.inner.get_target()
    }

    /// Where the downloaded bytes are written.
    pub fn destination(mut self, input: OutputStream) -> Self {
        self.inner = self.inner.destination(input);
        self
    }

    /// Offset of the first byte of the object to download.
    pub fn start_offset(mut self, input: u64) -> Self {
        self.inner = self.inner.start_offset(input);
        self
    }

    /// Maximum number of bytes to download.
    pub fn count(mut self, input: u64) -> Self {
        self.inner = self.inner.count(input);
        self
    }

    /// Number of chunks in flight for this transfer.
    pub fn concurrency(mut self, input: ConcurrencySetting) -> Self {
        self.inner = self.inner.concurrency(input);
        self
    }

    /// Receive progress events from an observer.
    pub fn progress_observer(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.inner = self.inner.progress_observer(observer);
        self
    }

    /// Receive progress events from a closure.
    pub fn on_progress<F>(self, f: F) -> Self
    where
        F: Fn(ProgressEvent) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.progress_observer(f)
    }
}

impl crate::operation::download::input::DownloadInputBuilder {
    /// Initiate a download transfer for a single object with this input using the given client.
    pub fn initiate_with(self, client: &crate::Client) -> Result<DownloadHandle, Error> {
        let mut fluent_builder = client.download();
        fluent_builder.inner = self;
        fluent_builder.initiate()
    }
}
