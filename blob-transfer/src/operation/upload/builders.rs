/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

use crate::error::{BoxError, Error};
use crate::io::InputStream;
use crate::progress::{ProgressEvent, ProgressObserver};
use crate::types::{ConcurrencySetting, ObjectLayout};

use super::{UploadHandle, UploadInputBuilder};

/// Fluent builder for constructing a single object upload transfer
#[derive(Debug)]
pub struct UploadFluentBuilder {
    handle: Arc<crate::client::Handle>,
    inner: UploadInputBuilder,
}

impl UploadFluentBuilder {
    pub(crate) fn new(handle: Arc<crate::client::Handle>) -> Self {
        Self {
            handle,
            inner: ::std::default::Default::default(),
        }
    }

    /// Initiate an upload transfer for a single object.
    ///
    /// Invalid input, and a concurrency the body cannot support, are reported here before any
    /// request is sent. Must be called from within a Tokio runtime.
    pub fn initiate(self) -> Result<UploadHandle, Error> {
        let input = self.inner.build()?;
        crate::operation::upload::Upload::orchestrate(self.handle, input)
    }

    /// Object data.
    pub fn body(mut self, input: InputStream) -> Self {
        self.inner = self.inner.body(input);
        self
    }

    /// Object data.
    pub fn set_body(mut self, input: Option<InputStream>) -> Self {
        self.inner = self.inner.set_body(input);
        self
    }

    /// Object data.
    pub fn get_body(&self) -> &Option<InputStream> {
        self.inner.get_body()
    }

    /// Name of the object to write.
    pub fn target(mut self, input: impl Into<String>) -> Self {
        self.inner = self.inner.target(input);
        self
    }

    /// Name of the object to write.
    pub fn set_target(mut self, input: Option<String>) -> Self {
        self.inner = self.inner.set_target(input);
        self
    }

    /// Name of the object to write.
    pub fn get_target(&self) -> &Option<String> {
        self.inner.get_target()
    }

    /// How the object is assembled on the service.
    pub fn layout(mut self, input: ObjectLayout) -> Self {
        self.inner = self.inner.layout(input);
        self
    }

    /// Offset of the first byte of the body to upload.
    pub fn start_offset(mut self, input: u64) -> Self {
        self.inner = self.inner.start_offset(input);
        self
    }

    /// Number of bytes to upload.
    pub fn count(mut self, input: u64) -> Self {
        self.inner = self.inner.count(input);
        self
    }

    /// Number of chunks in flight for this transfer.
    pub fn concurrency(mut self, input: ConcurrencySetting) -> Self {
        self.inner = self.inner.concurrency(input);
        self
    }

    /// Reuse chunks staged by an earlier attempt of the same upload.
    pub fn resume(mut self, input: bool) -> Self {
        self.inner = self.inner.resume(input);
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

impl crate::operation::upload::input::UploadInputBuilder {
    /// Initiate an upload transfer for a single object with this input using the given client.
    pub fn initiate_with(self, client: &crate::Client) -> Result<UploadHandle, Error> {
        let mut fluent_builder = client.upload();
        fluent_builder.inner = self;
        fluent_builder.initiate()
    }
}
