/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use tracing::Instrument;

use crate::error::{self, Error};
use crate::operation::upload::UploadContext;
use crate::plan::ChunkDescriptor;
use crate::types::{BlockId, BlockState};

/// Build the manifest for a block layout upload.
///
/// The manifest lists one block per chunk in sequence order, whatever order the chunks
/// completed in. Every sequence index from zero up to the last chunk must be present.
pub(super) fn build_manifest(
    executed: &[ChunkDescriptor],
    staged: &[ChunkDescriptor],
) -> Result<Vec<BlockId>, Error> {
    let mut seqs = executed
        .iter()
        .chain(staged)
        .map(|chunk| chunk.sequence_index)
        .collect::<Vec<_>>();
    seqs.sort_unstable();

    if let Some((expected, actual)) = seqs
        .iter()
        .enumerate()
        .map(|(i, seq)| (i as u64, *seq))
        .find(|(i, seq)| i != seq)
    {
        return Err(error::runtime(format!(
            "cannot build manifest: expected chunk {expected} but found chunk {actual}"
        )));
    }

    Ok(seqs.into_iter().map(BlockId::from_sequence).collect())
}

/// Commit the manifest, making the uploaded object visible.
///
/// Blocks are committed in their latest state so that chunks staged by an earlier attempt are
/// picked up. An empty payload commits an empty manifest.
pub(super) async fn commit_manifest(
    ctx: &UploadContext,
    executed: &[ChunkDescriptor],
    staged: &[ChunkDescriptor],
) -> Result<Vec<BlockId>, Error> {
    let manifest = build_manifest(executed, staged)?;
    let blocks = manifest
        .iter()
        .map(|id| (id.clone(), BlockState::Latest))
        .collect::<Vec<_>>();

    tracing::trace!("committing manifest of {} block(s)", blocks.len());
    ctx.transport()
        .commit_block_list(ctx.target(), &blocks)
        .instrument(tracing::debug_span!("send-commit-block-list"))
        .await
        .map_err(error::manifest_commit_failed)?;
    Ok(manifest)
}
