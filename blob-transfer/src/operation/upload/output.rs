/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::types::{BlockId, ObjectLayout};

/// Common response fields for uploading an object
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub struct UploadOutput {
    /// Name of the object written
    pub target: String,

    /// How the object was assembled
    pub layout: ObjectLayout,

    /// Bytes that make up the object, including chunks reused from an earlier attempt
    pub size: u64,

    /// Number of requests that carried payload bytes
    pub chunks_transferred: u64,

    /// Number of chunks reused from an earlier attempt
    pub chunks_resumed: u64,

    /// Committed block IDs in object order. `None` unless a manifest was committed.
    pub manifest: Option<Vec<BlockId>>,
}

impl UploadOutput {
    /// Name of the object written
    pub fn target(&self) -> &str {
        &self.target
    }

    /// How the object was assembled
    pub fn layout(&self) -> ObjectLayout {
        self.layout
    }

    /// Size of the object in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Number of requests that carried payload bytes
    pub fn chunks_transferred(&self) -> u64 {
        self.chunks_transferred
    }

    /// Number of chunks reused from an earlier attempt
    pub fn chunks_resumed(&self) -> u64 {
        self.chunks_resumed
    }

    /// Committed block IDs in object order
    pub fn manifest(&self) -> Option<&[BlockId]> {
        self.manifest.as_deref()
    }
}
