/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

use crate::operation::upload::UploadInput;
use crate::transport::Transport;
use crate::types::ObjectLayout;

/// Internal context used to drive a single Upload operation
#[derive(Debug, Clone)]
pub(crate) struct UploadContext {
    /// reference to client handle used to do actual work
    pub(crate) handle: Arc<crate::client::Handle>,
    /// name of the object being written
    pub(crate) target: Arc<str>,
    pub(crate) layout: ObjectLayout,
    pub(crate) resume: bool,
    /// offset of the first uploaded byte within the body
    pub(crate) start_offset: u64,
}

impl UploadContext {
    /// Capture the request fields the transfer needs (the body is driven separately)
    pub(crate) fn new(
        handle: Arc<crate::client::Handle>,
        request: &UploadInput,
        start_offset: u64,
    ) -> Self {
        Self {
            handle,
            target: Arc::from(request.target()),
            layout: request.layout(),
            resume: request.resume(),
            start_offset,
        }
    }

    /// The transport to use for service requests
    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        self.handle.transport()
    }

    pub(crate) fn target(&self) -> &str {
        &self.target
    }
}
