/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use bytes::Bytes;
use tower::{service_fn, Service, ServiceBuilder};
use tracing::Instrument;

use crate::error::{self, Error};
use crate::io::part_reader::{PartData, PartReader};
use crate::operation::coordinator::{ChunkOutcome, WorkQueue};
use crate::operation::upload::UploadContext;
use crate::plan::ChunkDescriptor;
use crate::transport::TransportResult;
use crate::types::{BlockId, ByteRange, ObjectLayout};

/// Request/input type for our "upload_chunk" service.
#[derive(Debug, Clone)]
pub(super) struct UploadChunkRequest {
    pub(super) ctx: UploadContext,
    pub(super) part_data: PartData,
}

/// Hands out the chunks of the body as they are read
#[derive(Debug)]
pub(super) struct UploadQueue {
    ctx: UploadContext,
    part_reader: PartReader,
}

impl UploadQueue {
    pub(super) fn new(ctx: UploadContext, part_reader: PartReader) -> Self {
        Self { ctx, part_reader }
    }
}

impl WorkQueue for UploadQueue {
    type Item = UploadChunkRequest;

    async fn next_item(&self) -> Result<Option<UploadChunkRequest>, Error> {
        let part_data = self.part_reader.next_part().await?;
        Ok(part_data.map(|part_data| UploadChunkRequest {
            ctx: self.ctx.clone(),
            part_data,
        }))
    }
}

/// handler (service fn) for a single chunk
async fn upload_chunk_handler(request: UploadChunkRequest) -> Result<ChunkOutcome, Error> {
    let ctx = request.ctx;
    let part_data = request.part_data;
    let chunk = part_data.chunk;
    let seq = chunk.sequence_index;

    send_chunk(&ctx, chunk, part_data.data)
        .instrument(tracing::debug_span!("upload-chunk", seq))
        .await
        .map_err(|err| error::chunk_failed(seq, err))?;

    tracing::trace!("completed upload of chunk {seq}");
    Ok(ChunkOutcome {
        chunk,
        is_last: part_data.is_last,
    })
}

async fn send_chunk(ctx: &UploadContext, chunk: ChunkDescriptor, data: Bytes) -> TransportResult<()> {
    match ctx.layout {
        ObjectLayout::Blocks => {
            let id = BlockId::from_sequence(chunk.sequence_index);
            ctx.transport().put_block(ctx.target(), &id, data).await
        }
        ObjectLayout::Ranges => match chunk.relative_to(ctx.start_offset).range() {
            Some(range) => ctx.transport().put_range(ctx.target(), range, data).await,
            None => Ok(()),
        },
    }
}

/// Send a payload that fits in a single request
pub(super) async fn put_single_shot(ctx: &UploadContext, data: Bytes) -> TransportResult<()> {
    match ctx.layout {
        ObjectLayout::Blocks => ctx.transport().put_blob(ctx.target(), data).await,
        ObjectLayout::Ranges => {
            let len = data.len() as u64;
            ctx.transport().create_file(ctx.target(), len).await?;
            match ByteRange::with_length(0, len) {
                Some(range) => ctx.transport().put_range(ctx.target(), range, data).await,
                None => Ok(()),
            }
        }
    }
}

/// Create a new tower::Service for uploading individual chunks of an object
pub(super) fn upload_chunk_service(
    workers: usize,
) -> impl Service<UploadChunkRequest, Response = ChunkOutcome, Error = Error, Future: Send>
       + Clone
       + Send
       + 'static {
    let svc = service_fn(upload_chunk_handler);
    ServiceBuilder::new().concurrency_limit(workers).service(svc)
}
