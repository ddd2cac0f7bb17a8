/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use bytes::Bytes;

use crate::types::ObjectProperties;

/// Output from downloading an object
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub struct DownloadOutput {
    /// Properties of the object as discovered before the transfer started
    pub properties: ObjectProperties,

    /// Offset within the object of the first downloaded byte
    pub start_offset: u64,

    /// Number of bytes downloaded
    pub size: u64,

    pub(crate) body: Option<Bytes>,
}

impl DownloadOutput {
    /// Properties of the object
    pub fn properties(&self) -> &ObjectProperties {
        &self.properties
    }

    /// Offset within the object of the first downloaded byte
    pub fn start_offset(&self) -> u64 {
        self.start_offset
    }

    /// Number of bytes downloaded
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The downloaded bytes when the destination was [`OutputStream::memory`](crate::io::OutputStream::memory)
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Consume the output and take the downloaded bytes
    pub fn into_body(self) -> Option<Bytes> {
        self.body
    }
}
