/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

/// Operation builders
pub mod builders;
mod input;
mod output;

mod context;
mod handle;
mod service;

use std::sync::Arc;

use context::DownloadContext;
pub use handle::DownloadHandle;
/// Request type for downloads
pub use input::{DownloadInput, DownloadInputBuilder};
/// Response type for downloads
pub use output::DownloadOutput;
use service::{download_chunk_service, DownloadQueue};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::client::resolve_concurrency;
use crate::error::{self, Error};
use crate::io::sink::SinkWriter;
use crate::io::OutputStream;
use crate::operation::coordinator::{ExecutionMode, TransferCoordinator, TransferState};
use crate::plan::{ChunkDescriptor, ChunkPlanner, TransferPlan};
use crate::types::{ObjectProperties, TransferPhase};

/// Operation struct for single object download
#[derive(Clone, Default, Debug)]
pub(crate) struct Download;

impl Download {
    /// Validate the request and spawn a single `Download` transfer operation
    pub(crate) fn orchestrate(
        handle: Arc<crate::client::Handle>,
        mut input: DownloadInput,
    ) -> Result<DownloadHandle, Error> {
        let workers = input
            .concurrency
            .as_ref()
            .map(resolve_concurrency)
            .unwrap_or_else(|| handle.num_workers());

        // fail before any request is issued
        ExecutionMode::new(workers).check_capability(
            input.destination.supports_positioned_access(),
            "destination",
        )?;

        let state = TransferState {
            total_size: None,
            chunk_size: handle.chunk_size_bytes(),
            single_shot_threshold: handle.single_shot_threshold_bytes(),
            concurrency: workers,
        };
        let abort = CancellationToken::new();
        let (coordinator, phase) =
            TransferCoordinator::new(state, input.progress_observer.take(), abort.clone());

        let destination = input.take_destination();
        let ctx = DownloadContext::new(handle, &input);
        let span = tracing::debug_span!("download", target = ctx.target());
        let task = tokio::spawn(download(ctx, coordinator, destination).instrument(span));
        Ok(DownloadHandle::new(task, phase, abort))
    }
}

async fn download(
    ctx: DownloadContext,
    mut coordinator: TransferCoordinator,
    destination: OutputStream,
) -> Result<DownloadOutput, Error> {
    let result = try_download(&ctx, &mut coordinator, destination).await;
    coordinator.complete(result)
}

async fn try_download(
    ctx: &DownloadContext,
    coordinator: &mut TransferCoordinator,
    destination: OutputStream,
) -> Result<DownloadOutput, Error> {
    let properties = discover(ctx).await?;
    let (start, end) = resolve_range(&properties, ctx.start_offset, ctx.count)?;
    coordinator.set_total_size(end - start);

    let state = coordinator.state();
    let plan = crate::plan::plan(
        Some(end),
        state.single_shot_threshold,
        state.chunk_size,
        start,
    )?;
    let sink = Arc::new(destination.open(end - start).await?);

    match plan {
        TransferPlan::SingleShot(chunk) => single_shot(ctx, coordinator, &sink, chunk).await?,
        TransferPlan::Chunked(planner) => chunked(ctx, coordinator, &sink, planner).await?,
    }
    coordinator.progress().finish()?;
    coordinator.check_aborted()?;

    coordinator.transition(TransferPhase::Finalizing);
    let body = sink.finish().await?;
    tracing::trace!("download completed successfully");
    Ok(DownloadOutput {
        properties,
        start_offset: start,
        size: end - start,
        body,
    })
}

/// Fetch the properties of the object to discover its size
async fn discover(ctx: &DownloadContext) -> Result<ObjectProperties, Error> {
    let properties = ctx
        .transport()
        .get_properties(ctx.target())
        .instrument(tracing::debug_span!("send-get-properties"))
        .await?;
    tracing::debug!(
        "discovered {} of {} bytes ({:?} layout)",
        ctx.target(),
        properties.size,
        properties.layout
    );
    Ok(properties)
}

/// Absolute `[start, end)` of the bytes to download, clamped to the object
fn resolve_range(
    properties: &ObjectProperties,
    start_offset: Option<u64>,
    count: Option<u64>,
) -> Result<(u64, u64), Error> {
    let size = properties.size;
    let start = start_offset.unwrap_or_default();
    if start > size {
        return Err(error::invalid_input(format!(
            "start offset {start} is past the end of a {size} byte object"
        )));
    }
    let end = match count {
        Some(count) => start.saturating_add(count).min(size),
        None => size,
    };
    Ok((start, end))
}

async fn single_shot(
    ctx: &DownloadContext,
    coordinator: &TransferCoordinator,
    sink: &Arc<SinkWriter>,
    chunk: ChunkDescriptor,
) -> Result<(), Error> {
    coordinator.transition(TransferPhase::Executing);
    coordinator.check_aborted()?;
    if chunk.length > 0 {
        service::fetch_chunk(ctx, sink, chunk.offset, chunk)
            .instrument(tracing::debug_span!("send-single-shot"))
            .await
            .map_err(|err| error::chunk_failed(chunk.sequence_index, err))?;
    }
    coordinator.progress().record(chunk.length, true)?;
    Ok(())
}

async fn chunked(
    ctx: &DownloadContext,
    coordinator: &TransferCoordinator,
    sink: &Arc<SinkWriter>,
    planner: ChunkPlanner,
) -> Result<(), Error> {
    let start = planner.next_offset();
    let queue = Arc::new(DownloadQueue::new(ctx.clone(), sink.clone(), planner, start));
    let svc = download_chunk_service(coordinator.mode().workers());
    let outcomes = coordinator.execute(queue, svc).await?;
    tracing::trace!("downloaded {} chunk(s)", outcomes.len());
    Ok(())
}
