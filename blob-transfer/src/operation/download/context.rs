/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

use crate::operation::download::DownloadInput;
use crate::transport::Transport;

/// Context shared by the tasks of a single download
#[derive(Debug, Clone)]
pub(crate) struct DownloadContext {
    pub(crate) handle: Arc<crate::client::Handle>,
    pub(crate) target: Arc<str>,
    pub(crate) start_offset: Option<u64>,
    pub(crate) count: Option<u64>,
}

impl DownloadContext {
    pub(crate) fn new(handle: Arc<crate::client::Handle>, request: &DownloadInput) -> Self {
        Self {
            handle,
            target: Arc::from(request.target()),
            start_offset: request.start_offset(),
            count: request.count(),
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
