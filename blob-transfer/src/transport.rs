/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BoxError;
use crate::types::{BlockId, BlockList, BlockListType, BlockState, ByteRange, ObjectProperties};

/// In-memory implementation of the storage service
pub mod in_memory;

/// Errors returned by a [`Transport`]
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The target object does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// A committed block list referenced a block that is unknown to the service
    #[error("the specified block list is invalid: {0}")]
    InvalidBlockList(String),

    /// The range is outside the bounds of the object
    #[error("the range specified is invalid for the current size of the resource: {0}")]
    InvalidRange(String),

    /// The request was rejected as malformed
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Any other failure (connection errors, throttling, ...)
    #[error("request failed: {0}")]
    Other(#[source] BoxError),
}

/// Category of a [`TransportError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportErrorKind {
    /// See [`TransportError::NotFound`]
    NotFound,
    /// See [`TransportError::InvalidBlockList`]
    InvalidBlockList,
    /// See [`TransportError::InvalidRange`]
    InvalidRange,
    /// See [`TransportError::InvalidInput`]
    InvalidInput,
    /// See [`TransportError::Other`]
    Other,
}

impl TransportError {
    /// Target does not exist
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Block list references an unknown block
    pub fn invalid_block_list(message: impl Into<String>) -> Self {
        Self::InvalidBlockList(message.into())
    }

    /// Range outside of the object bounds
    pub fn invalid_range(message: impl Into<String>) -> Self {
        Self::InvalidRange(message.into())
    }

    /// Malformed request
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Wrap an arbitrary failure
    pub fn other(err: impl Into<BoxError>) -> Self {
        Self::Other(err.into())
    }

    /// The category of this error
    pub fn kind(&self) -> TransportErrorKind {
        match self {
            TransportError::NotFound(_) => TransportErrorKind::NotFound,
            TransportError::InvalidBlockList(_) => TransportErrorKind::InvalidBlockList,
            TransportError::InvalidRange(_) => TransportErrorKind::InvalidRange,
            TransportError::InvalidInput(_) => TransportErrorKind::InvalidInput,
            TransportError::Other(_) => TransportErrorKind::Other,
        }
    }
}

/// Result type returned by [`Transport`] operations
pub type TransportResult<T> = Result<T, TransportError>;

/// The request surface of a block and range addressed storage service.
///
/// Implementations own authentication, signing, retries and the wire protocol. The transfer
/// engine only relies on the semantics below:
///
/// * `put_block` stages a block as uncommitted. Staging again under the same ID replaces the
///   uncommitted block.
/// * `commit_block_list` atomically replaces the object with the concatenation of the listed
///   blocks and discards blocks that were not referenced.
/// * `create_file` creates (or truncates) a zero-filled object of the given size. `put_range`
///   and `clear_range` must stay within that size.
/// * `get_range` returns exactly the requested bytes.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Replace `target` with `data` in a single request
    async fn put_blob(&self, target: &str, data: Bytes) -> TransportResult<()>;

    /// Stage a block for `target`
    async fn put_block(&self, target: &str, id: &BlockId, data: Bytes) -> TransportResult<()>;

    /// Commit the given blocks, in order, as the content of `target`
    async fn commit_block_list(
        &self,
        target: &str,
        blocks: &[(BlockId, BlockState)],
    ) -> TransportResult<()>;

    /// List the block catalog of `target`
    async fn get_block_list(
        &self,
        target: &str,
        list_type: BlockListType,
    ) -> TransportResult<BlockList>;

    /// Create `target` as a zero-filled object of `size` bytes
    async fn create_file(&self, target: &str, size: u64) -> TransportResult<()>;

    /// Write `data` into `range` of `target`
    async fn put_range(&self, target: &str, range: ByteRange, data: Bytes) -> TransportResult<()>;

    /// Reset `range` of `target` to zeros
    async fn clear_range(&self, target: &str, range: ByteRange) -> TransportResult<()>;

    /// Written (non-cleared) ranges of `target`, sorted and disjoint
    async fn list_ranges(&self, target: &str) -> TransportResult<Vec<ByteRange>>;

    /// Properties of `target`
    async fn get_properties(&self, target: &str) -> TransportResult<ObjectProperties>;

    /// Read `range` of `target`
    async fn get_range(&self, target: &str, range: ByteRange) -> TransportResult<Bytes>;
}
