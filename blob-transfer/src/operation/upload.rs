/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

/// Operation builders
pub mod builders;
mod input;
mod output;

mod context;
mod finalizer;
mod handle;
mod service;

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use context::UploadContext;
pub use handle::UploadHandle;
/// Request type for uploads
pub use input::{UploadInput, UploadInputBuilder};
/// Response type for uploads
pub use output::UploadOutput;
use service::{upload_chunk_service, UploadQueue};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::client::resolve_concurrency;
use crate::error::{self, Error};
use crate::io::part_reader::Builder as PartReaderBuilder;
use crate::io::InputStream;
use crate::operation::coordinator::{ExecutionMode, TransferCoordinator, TransferState};
use crate::plan::{plan_chunks, ChunkDescriptor, ChunkPlanner, TransferPlan};
use crate::types::{BlockListType, ObjectLayout, TransferPhase};

/// Operation struct for single object upload
#[derive(Clone, Default, Debug)]
pub(crate) struct Upload;

impl Upload {
    /// Validate the request and spawn a single `Upload` transfer operation
    pub(crate) fn orchestrate(
        handle: Arc<crate::client::Handle>,
        mut input: UploadInput,
    ) -> Result<UploadHandle, Error> {
        let workers = input
            .concurrency
            .as_ref()
            .map(resolve_concurrency)
            .unwrap_or_else(|| handle.num_workers());

        // fail before any request is issued
        ExecutionMode::new(workers)
            .check_capability(input.body.supports_positioned_access(), "source")?;

        let start_offset = input.start_offset.unwrap_or_default();
        let end = resolve_end(
            input.body.size_hint().exact_size(),
            start_offset,
            input.count,
        )?;
        if end.is_none() && input.layout == ObjectLayout::Ranges {
            return Err(error::invalid_input(
                "range layout uploads require a body of known size or an explicit count",
            ));
        }
        if input.resume && (end.is_none() || input.layout != ObjectLayout::Blocks) {
            return Err(error::invalid_input(
                "resume is only supported for block layout uploads of known size",
            ));
        }

        let state = TransferState {
            total_size: end.map(|end| end - start_offset),
            chunk_size: handle.chunk_size_bytes(),
            single_shot_threshold: handle.single_shot_threshold_bytes(),
            concurrency: workers,
        };
        let abort = CancellationToken::new();
        let (coordinator, phase) =
            TransferCoordinator::new(state, input.progress_observer.take(), abort.clone());

        let stream = input.take_body();
        let ctx = UploadContext::new(handle, &input, start_offset);
        let span = tracing::debug_span!("upload", target = ctx.target());
        let task = tokio::spawn(upload(ctx, coordinator, stream, end).instrument(span));
        Ok(UploadHandle::new(task, phase, abort))
    }
}

/// End of the bytes to upload, relative to the start of the body
fn resolve_end(
    size: Option<u64>,
    start_offset: u64,
    count: Option<u64>,
) -> Result<Option<u64>, Error> {
    let requested = match count {
        Some(count) => Some(start_offset.checked_add(count).ok_or_else(|| {
            error::invalid_input(format!("start offset {start_offset} plus count {count} overflows"))
        })?),
        None => None,
    };
    match (size, requested) {
        (Some(size), Some(end)) if end > size => Err(error::invalid_input(format!(
            "cannot upload bytes {start_offset}..{end} of a {size} byte body"
        ))),
        (Some(size), None) if start_offset > size => Err(error::invalid_input(format!(
            "start offset {start_offset} is past the end of a {size} byte body"
        ))),
        (Some(size), None) => Ok(Some(size)),
        (_, requested) => Ok(requested),
    }
}

async fn upload(
    ctx: UploadContext,
    coordinator: TransferCoordinator,
    stream: InputStream,
    end: Option<u64>,
) -> Result<UploadOutput, Error> {
    let result = try_upload(&ctx, &coordinator, stream, end).await;
    coordinator.complete(result)
}

async fn try_upload(
    ctx: &UploadContext,
    coordinator: &TransferCoordinator,
    stream: InputStream,
    end: Option<u64>,
) -> Result<UploadOutput, Error> {
    let state = coordinator.state();
    let plan = crate::plan::plan(
        end,
        state.single_shot_threshold,
        state.chunk_size,
        ctx.start_offset,
    )?;
    match plan {
        TransferPlan::SingleShot(chunk) => single_shot(ctx, coordinator, stream, chunk).await,
        TransferPlan::Chunked(planner) => chunked(ctx, coordinator, stream, planner).await,
    }
}

async fn single_shot(
    ctx: &UploadContext,
    coordinator: &TransferCoordinator,
    stream: InputStream,
    chunk: ChunkDescriptor,
) -> Result<UploadOutput, Error> {
    coordinator.transition(TransferPhase::Executing);
    coordinator.check_aborted()?;

    let data = if chunk.length == 0 {
        Bytes::new()
    } else {
        let planner = ChunkPlanner::new(chunk.offset, Some(chunk.end()), chunk.length)?;
        let reader = PartReaderBuilder::new()
            .stream(stream)
            .planner(planner)
            .build();
        reader
            .next_part()
            .await?
            .map(|part| part.data)
            .unwrap_or_default()
    };

    tracing::trace!(
        "sending {} bytes to {} as a single request",
        chunk.length,
        ctx.target()
    );
    service::put_single_shot(ctx, data)
        .instrument(tracing::debug_span!("send-single-shot"))
        .await
        .map_err(|err| error::chunk_failed(chunk.sequence_index, err))?;
    // the object is visible at this point, an observer error does not undo it
    coordinator.progress().record(chunk.length, true)?;

    coordinator.transition(TransferPhase::Finalizing);
    Ok(UploadOutput {
        target: ctx.target().to_owned(),
        layout: ctx.layout,
        size: chunk.length,
        chunks_transferred: 1,
        chunks_resumed: 0,
        manifest: None,
    })
}

async fn chunked(
    ctx: &UploadContext,
    coordinator: &TransferCoordinator,
    stream: InputStream,
    planner: ChunkPlanner,
) -> Result<UploadOutput, Error> {
    if ctx.layout == ObjectLayout::Ranges {
        let end = planner.end().ok_or_else(|| {
            error::invalid_input("range layout uploads require a body of known size")
        })?;
        ctx.transport()
            .create_file(ctx.target(), end - ctx.start_offset)
            .instrument(tracing::debug_span!("send-create-file"))
            .await?;
    }

    let staged = if ctx.resume {
        find_staged_chunks(ctx, &planner).await?
    } else {
        Vec::new()
    };
    let skip = staged
        .iter()
        .map(|chunk| chunk.sequence_index)
        .collect::<HashSet<_>>();
    coordinator
        .progress()
        .seed(staged.iter().map(|chunk| chunk.length).sum());

    let reader = PartReaderBuilder::new()
        .stream(stream)
        .planner(planner)
        .skip(skip)
        .build();
    let queue = Arc::new(UploadQueue::new(ctx.clone(), reader));
    let svc = upload_chunk_service(coordinator.mode().workers());
    let outcomes = coordinator.execute(queue, svc).await?;

    if outcomes.is_empty() && !staged.is_empty() {
        // every chunk was already staged
        coordinator.progress().record(0, true)?;
    }
    coordinator.progress().finish()?;
    coordinator.check_aborted()?;

    coordinator.transition(TransferPhase::Finalizing);
    let executed = outcomes
        .iter()
        .map(|outcome| outcome.chunk)
        .collect::<Vec<_>>();
    let manifest = match ctx.layout {
        ObjectLayout::Blocks => {
            Some(finalizer::commit_manifest(ctx, &executed, &staged).await?)
        }
        ObjectLayout::Ranges => None,
    };

    tracing::trace!("upload completed successfully");
    Ok(UploadOutput {
        target: ctx.target().to_owned(),
        layout: ctx.layout,
        size: coordinator.progress().bytes_completed(),
        chunks_transferred: executed.len() as u64,
        chunks_resumed: staged.len() as u64,
        manifest,
    })
}

/// Chunks of this transfer already staged by an earlier attempt.
///
/// A staged block only counts if its ID derives from the chunk's sequence index and its size
/// matches the planned chunk.
async fn find_staged_chunks(
    ctx: &UploadContext,
    planner: &ChunkPlanner,
) -> Result<Vec<ChunkDescriptor>, Error> {
    let end = planner
        .end()
        .ok_or_else(|| error::invalid_input("resume requires a body of known size"))?;
    let expected = plan_chunks(end, planner.chunk_size(), planner.next_offset())?;

    let block_list = match ctx
        .transport()
        .get_block_list(ctx.target(), BlockListType::Uncommitted)
        .instrument(tracing::debug_span!("send-get-block-list"))
        .await
    {
        Ok(block_list) => block_list,
        Err(err) if err.kind() == crate::transport::TransportErrorKind::NotFound => {
            tracing::debug!("no earlier attempt found for {}", ctx.target());
            return Ok(Vec::new());
        }
        Err(err) => return Err(err.into()),
    };

    let staged = block_list
        .uncommitted_blocks
        .iter()
        .filter_map(|block| {
            let seq = block.id.sequence_index()?;
            let chunk = expected.get(usize::try_from(seq).ok()?)?;
            (chunk.length == block.size).then_some(*chunk)
        })
        .collect::<Vec<_>>();
    tracing::debug!(
        "resuming upload of {}: {} of {} chunks already staged",
        ctx.target(),
        staged.len(),
        expected.len()
    );
    Ok(staged)
}
