/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;

/// The target chunk size or single-shot threshold for a transfer.
#[derive(Debug, Clone, Default)]
pub enum PartSize {
    /// Automatically configure a default size.
    #[default]
    Auto,

    /// Size explicitly given, in bytes.
    Target(u64),
}

/// The concurrency settings to use for a single upload or download request.
#[derive(Debug, Clone, Default)]
pub enum ConcurrencySetting {
    /// Use the default concurrency (sequential execution).
    #[default]
    Auto,

    /// Explicitly configured number of concurrent chunk transfers.
    ///
    /// Any value greater than one requires a source (upload) or sink (download) that supports
    /// positioned access.
    Explicit(usize),
}

/// How an uploaded object is assembled on the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ObjectLayout {
    /// Chunks are staged as blocks and become visible once a block list (the manifest) referencing
    /// them is committed.
    #[default]
    Blocks,

    /// The object is created at its full size and chunks are written directly into their byte
    /// ranges. There is no commit step.
    Ranges,
}

/// Identifier of a staged block.
///
/// Block IDs created by the transfer engine are derived from the chunk sequence index as a
/// fixed-width decimal so that lexical order equals sequence order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(String);

const BLOCK_ID_WIDTH: usize = 32;

impl BlockId {
    /// Create a block ID from an arbitrary string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the block ID for the chunk with the given sequence index.
    pub fn from_sequence(sequence_index: u64) -> Self {
        Self(format!("{sequence_index:0width$}", width = BLOCK_ID_WIDTH))
    }

    /// The sequence index this ID was derived from, if it was created by
    /// [`from_sequence`](Self::from_sequence).
    pub fn sequence_index(&self) -> Option<u64> {
        if self.0.len() != BLOCK_ID_WIDTH {
            return None;
        }
        self.0.parse().ok()
    }

    /// The ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Lifecycle state of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// Part of the currently committed object.
    Committed,
    /// Staged but not (yet) referenced by a committed block list.
    Uncommitted,
    /// Resolve to the newest version of the block: the uncommitted one if present, otherwise the
    /// committed one.
    Latest,
}

/// Catalog entry for a block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// The block ID
    pub id: BlockId,
    /// Size of the block in bytes
    pub size: u64,
    /// Lifecycle state
    pub state: BlockState,
}

impl Block {
    /// Create a new block entry
    pub fn new(id: BlockId, size: u64, state: BlockState) -> Self {
        Self { id, size, state }
    }
}

/// Which blocks to include when listing the block catalog of an object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BlockListType {
    /// Committed and uncommitted blocks
    #[default]
    All,
    /// Only committed blocks
    Committed,
    /// Only uncommitted blocks
    Uncommitted,
}

/// Block catalog of an object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockList {
    /// Blocks of the committed object, in object order
    pub committed_blocks: Vec<Block>,
    /// Staged blocks, in upload order
    pub uncommitted_blocks: Vec<Block>,
}

/// An inclusive byte range `[start, end]` within an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteRange {
    start: u64,
    end: u64,
}

impl ByteRange {
    /// Create a new inclusive range.
    ///
    /// Returns `None` if `start > end`.
    pub fn new(start: u64, end: u64) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Range of `length` bytes beginning at `offset`.
    ///
    /// Returns `None` for an empty range.
    pub fn with_length(offset: u64, length: u64) -> Option<Self> {
        let end = offset.checked_add(length)?.checked_sub(1)?;
        Self::new(offset, end)
    }

    /// First byte of the range
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Last byte of the range (inclusive)
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of bytes covered by this range
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Ranges are never empty, provided for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bytes={}-{}", self.start, self.end)
    }
}

/// Properties of a stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectProperties {
    /// Content length in bytes
    pub size: u64,
    /// How the object is stored
    pub layout: ObjectLayout,
}

/// Lifecycle phase of a single transfer.
///
/// Phases only move forward: `Planning -> Executing -> Finalizing -> Done`. `Failed` is reachable
/// from every non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    /// Discovering the size of the payload and splitting it into chunks
    Planning,
    /// Chunks are being transferred
    Executing,
    /// Committing the manifest (uploads) or flushing the destination (downloads)
    Finalizing,
    /// The transfer completed successfully
    Done,
    /// The transfer failed or was aborted
    Failed,
}

impl TransferPhase {
    /// True for `Done` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferPhase::Done | TransferPhase::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::{BlockId, ByteRange};

    #[test]
    fn test_block_ids_sort_by_sequence() {
        let mut ids = [10u64, 2, 100, 0, 9]
            .iter()
            .map(|seq| BlockId::from_sequence(*seq))
            .collect::<Vec<_>>();
        ids.sort();
        let seqs = ids
            .iter()
            .map(|id| id.sequence_index().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(vec![0, 2, 9, 10, 100], seqs);
        assert!(ids.iter().all(|id| id.as_str().len() == 32));
    }

    #[test]
    fn test_arbitrary_block_id_has_no_sequence() {
        assert_eq!(None, BlockId::from("1").sequence_index());
    }

    #[test]
    fn test_byte_range() {
        let range = ByteRange::with_length(512, 512).unwrap();
        assert_eq!(512, range.start());
        assert_eq!(1023, range.end());
        assert_eq!(512, range.len());
        assert_eq!("bytes=512-1023", range.to_string());
        assert_eq!(None, ByteRange::with_length(3, 0));
        assert_eq!(None, ByteRange::new(5, 4));
    }
}
