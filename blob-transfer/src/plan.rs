/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::error::{self, Error};
use crate::types::ByteRange;

/// A single unit of work within a transfer.
///
/// `offset` is absolute in the address space indexed by the transfer's start offset: the source
/// for uploads, the remote object for downloads. The opposite side is addressed at
/// `offset - start_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDescriptor {
    /// Position of this chunk within the transfer, starting at zero
    pub sequence_index: u64,
    /// Absolute offset of the first byte
    pub offset: u64,
    /// Number of bytes
    pub length: u64,
}

impl ChunkDescriptor {
    /// One past the last byte of this chunk
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// Inclusive byte range covered by this chunk, `None` for an empty chunk
    pub fn range(&self) -> Option<ByteRange> {
        ByteRange::with_length(self.offset, self.length)
    }

    /// The same chunk shifted by `-base`
    pub(crate) fn relative_to(&self, base: u64) -> ChunkDescriptor {
        ChunkDescriptor {
            offset: self.offset - base,
            ..*self
        }
    }
}

/// How a transfer will be carried out
#[derive(Debug)]
pub enum TransferPlan {
    /// The whole payload moves in one request
    SingleShot(ChunkDescriptor),
    /// The payload is split into chunks
    Chunked(ChunkPlanner),
}

/// Plan a transfer of the bytes between `start_offset` and `total_size`.
///
/// A known size that fits the single-shot threshold (including an empty payload) is transferred
/// in one request. Everything else, including any payload of unknown size, is chunked.
pub fn plan(
    total_size: Option<u64>,
    single_shot_threshold: u64,
    chunk_size: u64,
    start_offset: u64,
) -> Result<TransferPlan, Error> {
    let planner = ChunkPlanner::new(start_offset, total_size, chunk_size)?;
    match total_size {
        Some(total) if total - start_offset <= single_shot_threshold => {
            tracing::trace!(total, start_offset, "single-shot transfer");
            Ok(TransferPlan::SingleShot(ChunkDescriptor {
                sequence_index: 0,
                offset: start_offset,
                length: total - start_offset,
            }))
        }
        _ => {
            tracing::trace!(?total_size, chunk_size, start_offset, "chunked transfer");
            Ok(TransferPlan::Chunked(planner))
        }
    }
}

/// All chunk descriptors for a payload of known size.
pub fn plan_chunks(
    total_size: u64,
    chunk_size: u64,
    start_offset: u64,
) -> Result<Vec<ChunkDescriptor>, Error> {
    Ok(ChunkPlanner::new(start_offset, Some(total_size), chunk_size)?.collect())
}

/// Produces chunk descriptors one at a time.
///
/// With a known end every descriptor is `chunk_size` long except possibly the last one. With an
/// unknown end the caller reads up to [`next_len`](Self::next_len) bytes and then
/// [`commit`](Self::commit)s the length it actually got; a short read marks the end of the
/// payload.
#[derive(Debug, Clone)]
pub struct ChunkPlanner {
    next_sequence_index: u64,
    next_offset: u64,
    end: Option<u64>,
    chunk_size: u64,
}

impl ChunkPlanner {
    /// Create a planner for the bytes in `[start_offset, end)`.
    pub fn new(start_offset: u64, end: Option<u64>, chunk_size: u64) -> Result<Self, Error> {
        if chunk_size == 0 {
            return Err(error::invalid_input("chunk size must be greater than zero"));
        }
        if let Some(end) = end {
            if start_offset > end {
                return Err(error::invalid_input(format!(
                    "start offset {start_offset} is past the end of the payload ({end} bytes)"
                )));
            }
        }
        Ok(Self {
            next_sequence_index: 0,
            next_offset: start_offset,
            end,
            chunk_size,
        })
    }

    /// Configured chunk size
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// End of the payload if known
    pub fn end(&self) -> Option<u64> {
        self.end
    }

    /// Number of descriptors produced so far
    pub fn chunks_planned(&self) -> u64 {
        self.next_sequence_index
    }

    /// Offset the next descriptor will start at
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    /// True once a known end has been fully covered
    pub fn is_done(&self) -> bool {
        matches!(self.end, Some(end) if self.next_offset >= end)
    }

    /// Maximum length of the next descriptor
    pub fn next_len(&self) -> u64 {
        match self.end {
            Some(end) => self.chunk_size.min(end.saturating_sub(self.next_offset)),
            None => self.chunk_size,
        }
    }

    /// Produce the next descriptor with the given `length`.
    ///
    /// `length` must not exceed [`next_len`](Self::next_len). A `length` shorter than that
    /// resolves an unknown end.
    pub fn commit(&mut self, length: u64) -> ChunkDescriptor {
        debug_assert!(length <= self.next_len());
        let chunk = ChunkDescriptor {
            sequence_index: self.next_sequence_index,
            offset: self.next_offset,
            length,
        };
        if length < self.chunk_size && self.end.is_none() {
            self.end = Some(chunk.end());
        }
        self.next_sequence_index += 1;
        self.next_offset += length;
        tracing::trace!(seq = chunk.sequence_index, offset = chunk.offset, length, "chunk planned");
        chunk
    }

    /// Mark the payload as ending at the next offset (a zero-byte read of an unknown-size
    /// source). No descriptor is produced.
    pub fn finish(&mut self) {
        self.end = Some(self.next_offset);
    }
}

impl Iterator for ChunkPlanner {
    type Item = ChunkDescriptor;

    // unbounded while the end is unknown
    fn next(&mut self) -> Option<Self::Item> {
        if self.is_done() {
            return None;
        }
        let len = self.next_len();
        Some(self.commit(len))
    }
}
