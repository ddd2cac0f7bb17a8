/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::io::Write;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use blob_transfer::error::BoxError;
use blob_transfer::progress::{ProgressEvent, ProgressObserver};
use blob_transfer::transport::in_memory::InMemoryTransport;
use blob_transfer::transport::{Transport, TransportError, TransportResult};
use blob_transfer::types::{
    BlockId, BlockList, BlockListType, BlockState, ByteRange, ObjectProperties,
};
use bytes::Bytes;
use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Install a test log subscriber, filtered by `RUST_LOG`. Safe to call from every test.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// `len` random bytes
pub fn random_bytes(len: usize) -> Bytes {
    let mut data = vec![0; len];
    fastrand::fill(&mut data);
    Bytes::from(data)
}

/// Write `data` to a new temporary file
pub fn create_test_file(data: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file
}

/// A single request seen by a [`RecordingTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    PutBlob { target: String, len: u64 },
    PutBlock { target: String, id: BlockId, len: u64 },
    CommitBlockList { target: String, blocks: Vec<BlockId> },
    GetBlockList { target: String },
    CreateFile { target: String, size: u64 },
    PutRange { target: String, range: ByteRange },
    ClearRange { target: String, range: ByteRange },
    ListRanges { target: String },
    GetProperties { target: String },
    GetRange { target: String, range: ByteRange },
}

impl Call {
    /// True for requests that move payload bytes
    pub fn is_payload(&self) -> bool {
        matches!(
            self,
            Call::PutBlob { .. } | Call::PutBlock { .. } | Call::PutRange { .. } | Call::GetRange { .. }
        )
    }
}

/// Wraps an [`InMemoryTransport`], records every request and injects failures and latency.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    inner: Arc<InMemoryTransport>,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    // set once an injected failure has been returned
    failed: AtomicBool,
    payload_calls_after_failure: AtomicUsize,
    // failure injection
    fail_block: Option<u64>,
    fail_commit: bool,
    fail_range_read_at: Option<u64>,
    short_range_reads: bool,
    max_delay_ms: u64,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record requests against an existing store, e.g. one left behind by an earlier attempt
    pub fn with_store(store: Arc<InMemoryTransport>) -> Self {
        Self {
            inner: store,
            ..Default::default()
        }
    }

    /// Fail staging the block of the chunk with this sequence index
    pub fn fail_block(mut self, sequence_index: u64) -> Self {
        self.fail_block = Some(sequence_index);
        self
    }

    /// Reject every manifest commit
    pub fn fail_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    /// Fail the ranged read starting at `offset`
    pub fn fail_range_read_at(mut self, offset: u64) -> Self {
        self.fail_range_read_at = Some(offset);
        self
    }

    /// Return one byte less than requested from every ranged read
    pub fn short_range_reads(mut self) -> Self {
        self.short_range_reads = true;
        self
    }

    /// Delay every request by up to `max_delay_ms`
    pub fn with_jitter(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// The underlying store
    pub fn store(&self) -> Arc<InMemoryTransport> {
        self.inner.clone()
    }

    /// Contents of a committed or created object
    pub async fn object(&self, target: &str) -> Option<Bytes> {
        self.inner.object(target).await
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn payload_calls(&self) -> usize {
        self.calls().iter().filter(|c| c.is_payload()).count()
    }

    pub fn commits(&self) -> Vec<Vec<BlockId>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::CommitBlockList { blocks, .. } => Some(blocks),
                _ => None,
            })
            .collect()
    }

    /// Largest number of requests observed in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Payload requests that started after an injected failure was returned
    pub fn payload_calls_after_failure(&self) -> usize {
        self.payload_calls_after_failure.load(Ordering::SeqCst)
    }

    async fn enter(&self, call: Call) -> InFlight<'_> {
        if call.is_payload() && self.failed.load(Ordering::SeqCst) {
            self.payload_calls_after_failure.fetch_add(1, Ordering::SeqCst);
        }
        self.calls.lock().unwrap().push(call);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if self.max_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(fastrand::u64(0..=self.max_delay_ms))).await;
        }
        InFlight(&self.in_flight)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn put_blob(&self, target: &str, data: Bytes) -> TransportResult<()> {
        let call = Call::PutBlob {
            target: target.to_owned(),
            len: data.len() as u64,
        };
        let _guard = self.enter(call).await;
        self.inner.put_blob(target, data).await
    }

    async fn put_block(&self, target: &str, id: &BlockId, data: Bytes) -> TransportResult<()> {
        let call = Call::PutBlock {
            target: target.to_owned(),
            id: id.clone(),
            len: data.len() as u64,
        };
        let _guard = self.enter(call).await;
        if self.fail_block.is_some() && self.fail_block == id.sequence_index() {
            self.failed.store(true, Ordering::SeqCst);
            return Err(TransportError::other(format!("injected failure staging block {id}")));
        }
        self.inner.put_block(target, id, data).await
    }

    async fn commit_block_list(
        &self,
        target: &str,
        blocks: &[(BlockId, BlockState)],
    ) -> TransportResult<()> {
        let call = Call::CommitBlockList {
            target: target.to_owned(),
            blocks: blocks.iter().map(|(id, _)| id.clone()).collect(),
        };
        let _guard = self.enter(call).await;
        if self.fail_commit {
            return Err(TransportError::invalid_block_list("injected commit failure"));
        }
        self.inner.commit_block_list(target, blocks).await
    }

    async fn get_block_list(
        &self,
        target: &str,
        list_type: BlockListType,
    ) -> TransportResult<BlockList> {
        let call = Call::GetBlockList {
            target: target.to_owned(),
        };
        let _guard = self.enter(call).await;
        self.inner.get_block_list(target, list_type).await
    }

    async fn create_file(&self, target: &str, size: u64) -> TransportResult<()> {
        let call = Call::CreateFile {
            target: target.to_owned(),
            size,
        };
        let _guard = self.enter(call).await;
        self.inner.create_file(target, size).await
    }

    async fn put_range(&self, target: &str, range: ByteRange, data: Bytes) -> TransportResult<()> {
        let call = Call::PutRange {
            target: target.to_owned(),
            range,
        };
        let _guard = self.enter(call).await;
        self.inner.put_range(target, range, data).await
    }

    async fn clear_range(&self, target: &str, range: ByteRange) -> TransportResult<()> {
        let call = Call::ClearRange {
            target: target.to_owned(),
            range,
        };
        let _guard = self.enter(call).await;
        self.inner.clear_range(target, range).await
    }

    async fn list_ranges(&self, target: &str) -> TransportResult<Vec<ByteRange>> {
        let call = Call::ListRanges {
            target: target.to_owned(),
        };
        let _guard = self.enter(call).await;
        self.inner.list_ranges(target).await
    }

    async fn get_properties(&self, target: &str) -> TransportResult<ObjectProperties> {
        let call = Call::GetProperties {
            target: target.to_owned(),
        };
        let _guard = self.enter(call).await;
        self.inner.get_properties(target).await
    }

    async fn get_range(&self, target: &str, range: ByteRange) -> TransportResult<Bytes> {
        let call = Call::GetRange {
            target: target.to_owned(),
            range,
        };
        let _guard = self.enter(call).await;
        if self.fail_range_read_at == Some(range.start()) {
            self.failed.store(true, Ordering::SeqCst);
            return Err(TransportError::other(format!("injected failure reading {range}")));
        }
        let data = self.inner.get_range(target, range).await?;
        if self.short_range_reads {
            return Ok(data.slice(..data.len().saturating_sub(1)));
        }
        Ok(data)
    }
}

/// A non-seekable reader that returns its data in scripted read sizes.
///
/// Each poll returns at most the next scripted size. Once the script is exhausted the
/// remaining data is returned as fast as the caller's buffer allows.
#[derive(Debug)]
pub struct ScriptedReader {
    data: Bytes,
    reads: std::vec::IntoIter<usize>,
}

impl ScriptedReader {
    pub fn new(data: Bytes, reads: Vec<usize>) -> Self {
        Self {
            data,
            reads: reads.into_iter(),
        }
    }
}

impl AsyncRead for ScriptedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let limit = self.reads.next().unwrap_or(usize::MAX);
        let n = limit.min(buf.remaining()).min(self.data.len());
        let chunk = self.data.split_to(n);
        buf.put_slice(&chunk);
        Poll::Ready(Ok(()))
    }
}

/// An append-only writer whose contents can be inspected while it is owned by a transfer
#[derive(Debug, Clone, Default)]
pub struct CollectingWriter {
    data: Arc<Mutex<Vec<u8>>>,
}

impl CollectingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Bytes {
        Bytes::from(self.data.lock().unwrap().clone())
    }
}

impl AsyncWrite for CollectingWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.data.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Collects every progress event of a transfer
#[derive(Debug, Clone, Default)]
pub struct ProgressCollector {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
    fail_after: Option<usize>,
}

impl ProgressCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return an error from the observer once `n` events were received
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn bytes_completed(&self) -> Vec<u64> {
        self.events().iter().map(|e| e.bytes_completed).collect()
    }
}

impl ProgressObserver for ProgressCollector {
    fn on_progress(&self, event: ProgressEvent) -> Result<(), BoxError> {
        let mut events = self.events.lock().unwrap();
        if self.fail_after.is_some_and(|n| events.len() >= n) {
            return Err("observer cancelled the transfer".into());
        }
        events.push(event);
        Ok(())
    }
}
