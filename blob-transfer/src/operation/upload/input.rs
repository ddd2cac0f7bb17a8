/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;

use crate::error::{self, Error};
use crate::io::InputStream;
use crate::progress::{ProgressObserver, SharedObserver};
use crate::types::{ConcurrencySetting, ObjectLayout};

/// Request type for uploading a single object
#[non_exhaustive]
pub struct UploadInput {
    /// Object body
    pub body: InputStream,

    /// Name of the object to write
    pub target: String,

    /// How the object is assembled on the service
    pub layout: ObjectLayout,

    /// Offset of the first byte of `body` to upload
    pub start_offset: Option<u64>,

    /// Number of bytes to upload, defaults to the rest of `body`
    pub count: Option<u64>,

    /// Concurrency override for this transfer
    pub concurrency: Option<ConcurrencySetting>,

    /// Skip chunks already staged under their block IDs by an earlier attempt
    pub resume: bool,

    pub(crate) progress_observer: Option<SharedObserver>,
}

impl UploadInput {
    /// Creates a new builder-style object to manufacture [`UploadInput`](crate::operation::upload::UploadInput).
    pub fn builder() -> UploadInputBuilder {
        UploadInputBuilder::default()
    }

    /// Object body
    pub fn body(&self) -> &InputStream {
        &self.body
    }

    /// Name of the object to write
    pub fn target(&self) -> &str {
        &self.target
    }

    /// How the object is assembled on the service
    pub fn layout(&self) -> ObjectLayout {
        self.layout
    }

    /// Offset of the first byte of `body` to upload
    pub fn start_offset(&self) -> Option<u64> {
        self.start_offset
    }

    /// Number of bytes to upload
    pub fn count(&self) -> Option<u64> {
        self.count
    }

    /// Concurrency override for this transfer
    pub fn concurrency(&self) -> Option<&ConcurrencySetting> {
        self.concurrency.as_ref()
    }

    /// Whether chunks staged by an earlier attempt are reused
    pub fn resume(&self) -> bool {
        self.resume
    }

    /// Take ownership of the body, leaving an empty one in its place
    pub(crate) fn take_body(&mut self) -> InputStream {
        std::mem::take(&mut self.body)
    }
}

impl fmt::Debug for UploadInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut formatter = f.debug_struct("UploadInput");
        formatter.field("body", &self.body);
        formatter.field("target", &self.target);
        formatter.field("layout", &self.layout);
        formatter.field("start_offset", &self.start_offset);
        formatter.field("count", &self.count);
        formatter.field("concurrency", &self.concurrency);
        formatter.field("resume", &self.resume);
        formatter.field("progress_observer", &self.progress_observer.is_some());
        formatter.finish()
    }
}

/// A builder for [`UploadInput`](crate::operation::upload::UploadInput).
#[non_exhaustive]
#[derive(Default, Debug)]
pub struct UploadInputBuilder {
    pub(crate) body: Option<InputStream>,
    pub(crate) target: Option<String>,
    pub(crate) layout: Option<ObjectLayout>,
    pub(crate) start_offset: Option<u64>,
    pub(crate) count: Option<u64>,
    pub(crate) concurrency: Option<ConcurrencySetting>,
    pub(crate) resume: Option<bool>,
    pub(crate) progress_observer: Option<SharedObserver>,
}

impl UploadInputBuilder {
    /// Object data.
    pub fn body(mut self, input: InputStream) -> Self {
        self.body = Some(input);
        self
    }

    /// Object data.
    pub fn set_body(mut self, input: Option<InputStream>) -> Self {
        self.body = input;
        self
    }

    /// Object data.
    pub fn get_body(&self) -> &Option<InputStream> {
        &self.body
    }

    /// Name of the object to write. This field is required.
    pub fn target(mut self, input: impl Into<String>) -> Self {
        self.target = Some(input.into());
        self
    }

    /// Name of the object to write.
    pub fn set_target(mut self, input: Option<String>) -> Self {
        self.target = input;
        self
    }

    /// Name of the object to write.
    pub fn get_target(&self) -> &Option<String> {
        &self.target
    }

    /// How the object is assembled on the service. Default is [`ObjectLayout::Blocks`].
    pub fn layout(mut self, input: ObjectLayout) -> Self {
        self.layout = Some(input);
        self
    }

    /// How the object is assembled on the service.
    pub fn get_layout(&self) -> &Option<ObjectLayout> {
        &self.layout
    }

    /// Offset of the first byte of the body to upload.
    pub fn start_offset(mut self, input: u64) -> Self {
        self.start_offset = Some(input);
        self
    }

    /// Number of bytes to upload. Defaults to the rest of the body.
    pub fn count(mut self, input: u64) -> Self {
        self.count = Some(input);
        self
    }

    /// Number of chunks in flight for this transfer, overriding the client configuration.
    pub fn concurrency(mut self, input: ConcurrencySetting) -> Self {
        self.concurrency = Some(input);
        self
    }

    /// Reuse chunks staged by an earlier attempt of the same upload.
    ///
    /// Only applies to [`ObjectLayout::Blocks`] uploads of a body with known size.
    pub fn resume(mut self, input: bool) -> Self {
        self.resume = Some(input);
        self
    }

    /// Receive a [`ProgressEvent`](crate::progress::ProgressEvent) per completed chunk.
    pub fn progress_observer(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.progress_observer = Some(SharedObserver::new(observer));
        self
    }

    /// Consumes the builder and constructs a [`UploadInput`](crate::operation::upload::UploadInput).
    pub fn build(self) -> Result<UploadInput, Error> {
        let target = self
            .target
            .ok_or_else(|| error::invalid_input("target is required"))?;
        let body = self
            .body
            .ok_or_else(|| error::invalid_input("body is required"))?;
        Ok(UploadInput {
            body,
            target,
            layout: self.layout.unwrap_or_default(),
            start_offset: self.start_offset,
            count: self.count,
            concurrency: self.concurrency,
            resume: self.resume.unwrap_or_default(),
            progress_observer: self.progress_observer,
        })
    }
}
