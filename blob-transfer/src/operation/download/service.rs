/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::{Arc, Mutex};

use tower::{service_fn, Service, ServiceBuilder};
use tracing::Instrument;

use crate::error::{self, Error};
use crate::io::sink::SinkWriter;
use crate::operation::coordinator::{ChunkOutcome, WorkQueue};
use crate::operation::download::DownloadContext;
use crate::plan::{ChunkDescriptor, ChunkPlanner};

/// Request/input type for our "download_chunk" service.
#[derive(Debug, Clone)]
pub(super) struct DownloadChunkRequest {
    pub(super) ctx: DownloadContext,
    pub(super) sink: Arc<SinkWriter>,
    pub(super) chunk: ChunkDescriptor,
    // absolute offset of the first downloaded byte
    pub(super) start_offset: u64,
    pub(super) is_last: bool,
}

/// Hands out ranged reads of the object in sequence order
#[derive(Debug)]
pub(super) struct DownloadQueue {
    ctx: DownloadContext,
    sink: Arc<SinkWriter>,
    planner: Mutex<ChunkPlanner>, // std Mutex
    start_offset: u64,
}

impl DownloadQueue {
    pub(super) fn new(
        ctx: DownloadContext,
        sink: Arc<SinkWriter>,
        planner: ChunkPlanner,
        start_offset: u64,
    ) -> Self {
        Self {
            ctx,
            sink,
            planner: Mutex::new(planner),
            start_offset,
        }
    }
}

impl WorkQueue for DownloadQueue {
    type Item = DownloadChunkRequest;

    async fn next_item(&self) -> Result<Option<DownloadChunkRequest>, Error> {
        let mut planner = self.planner.lock().expect("lock valid");
        let Some(chunk) = planner.next() else {
            return Ok(None);
        };
        Ok(Some(DownloadChunkRequest {
            ctx: self.ctx.clone(),
            sink: self.sink.clone(),
            chunk,
            start_offset: self.start_offset,
            is_last: planner.is_done(),
        }))
    }
}

/// Read `chunk` from the object and write it to the sink at its offset relative to
/// `start_offset`.
pub(super) async fn fetch_chunk(
    ctx: &DownloadContext,
    sink: &SinkWriter,
    start_offset: u64,
    chunk: ChunkDescriptor,
) -> Result<(), Error> {
    let Some(range) = chunk.range() else {
        return Ok(());
    };
    let data = ctx.transport().get_range(ctx.target(), range).await?;
    if data.len() as u64 != chunk.length {
        return Err(error::runtime(format!(
            "expected {} bytes for {range} but received {}",
            chunk.length,
            data.len()
        )));
    }
    sink.write_at(chunk.offset - start_offset, data).await
}

/// handler (service fn) for a single chunk
async fn download_chunk_handler(request: DownloadChunkRequest) -> Result<ChunkOutcome, Error> {
    let seq = request.chunk.sequence_index;
    fetch_chunk(
        &request.ctx,
        &request.sink,
        request.start_offset,
        request.chunk,
    )
    .instrument(tracing::debug_span!("download-chunk", seq))
    .await
    .map_err(|err| error::chunk_failed(seq, err))?;

    tracing::trace!("completed download of chunk {seq}");
    Ok(ChunkOutcome {
        chunk: request.chunk,
        is_last: request.is_last,
    })
}

/// Create a new tower::Service for downloading individual chunks of an object
pub(super) fn download_chunk_service(
    workers: usize,
) -> impl Service<DownloadChunkRequest, Response = ChunkOutcome, Error = Error, Future: Send>
       + Clone
       + Send
       + 'static {
    let svc = service_fn(download_chunk_handler);
    ServiceBuilder::new().concurrency_limit(workers).service(svc)
}
