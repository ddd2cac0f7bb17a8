/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::{Service, ServiceExt};

use crate::error::{self, Error};
use crate::plan::ChunkDescriptor;
use crate::progress::{ProgressAggregator, SharedObserver};
use crate::types::TransferPhase;

/// Source of work items for the worker pool.
///
/// Workers pull from the queue until it is exhausted. A queue is shared by all workers of a
/// transfer and must hand out every item exactly once.
pub(crate) trait WorkQueue: Send + Sync + 'static {
    type Item: Send + 'static;

    /// The next item, `None` once all work has been handed out
    fn next_item(&self) -> impl Future<Output = Result<Option<Self::Item>, Error>> + Send;
}

/// Result of executing a single chunk
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChunkOutcome {
    pub(crate) chunk: ChunkDescriptor,
    // no chunk follows this one
    pub(crate) is_last: bool,
}

/// How the chunks of a transfer are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecutionMode {
    /// One worker, chunks complete in sequence order
    Sequential,
    /// Up to `n` workers, chunks complete in any order
    Parallel(usize),
}

impl ExecutionMode {
    pub(crate) fn new(concurrency: usize) -> Self {
        if concurrency <= 1 {
            ExecutionMode::Sequential
        } else {
            ExecutionMode::Parallel(concurrency)
        }
    }

    pub(crate) fn workers(&self) -> usize {
        match self {
            ExecutionMode::Sequential => 1,
            ExecutionMode::Parallel(n) => *n,
        }
    }

    /// Parallel execution needs a source (or sink) that can be addressed by offset.
    pub(crate) fn check_capability(
        &self,
        positioned: bool,
        what: &'static str,
    ) -> Result<(), Error> {
        match self {
            ExecutionMode::Parallel(n) if !positioned => Err(error::positioned_access_required(
                format!("concurrency {n} requires a {what} with positioned access; use a concurrency of 1 for sequential {what}s"),
            )),
            _ => Ok(()),
        }
    }
}

/// Per transfer sizing, owned by the coordinator
#[derive(Debug, Clone)]
pub(crate) struct TransferState {
    pub(crate) total_size: Option<u64>,
    pub(crate) chunk_size: u64,
    pub(crate) single_shot_threshold: u64,
    pub(crate) concurrency: usize,
}

/// Drives a single transfer through its phases and runs the worker pool.
#[derive(Debug)]
pub(crate) struct TransferCoordinator {
    state: TransferState,
    phase: watch::Sender<TransferPhase>,
    progress: Arc<ProgressAggregator>,
    // cancelled by the caller through the operation handle
    abort: CancellationToken,
}

impl TransferCoordinator {
    pub(crate) fn new(
        state: TransferState,
        observer: Option<SharedObserver>,
        abort: CancellationToken,
    ) -> (Self, watch::Receiver<TransferPhase>) {
        let (phase, rx) = watch::channel(TransferPhase::Planning);
        let progress = Arc::new(ProgressAggregator::new(state.total_size, observer));
        let coordinator = Self {
            state,
            phase,
            progress,
            abort,
        };
        (coordinator, rx)
    }

    pub(crate) fn state(&self) -> &TransferState {
        &self.state
    }

    pub(crate) fn mode(&self) -> ExecutionMode {
        ExecutionMode::new(self.state.concurrency)
    }

    pub(crate) fn progress(&self) -> &Arc<ProgressAggregator> {
        &self.progress
    }

    pub(crate) fn phase(&self) -> TransferPhase {
        *self.phase.borrow()
    }

    /// Resolve the total size once planning discovered it
    pub(crate) fn set_total_size(&mut self, total_size: u64) {
        self.state.total_size = Some(total_size);
        self.progress.set_total(total_size);
    }

    pub(crate) fn transition(&self, next: TransferPhase) {
        let current = self.phase();
        if current.is_terminal() {
            return;
        }
        tracing::debug!("transfer phase {current:?} -> {next:?}");
        self.phase.send_replace(next);
    }

    /// Fail with `OperationCancelled` if the caller aborted the transfer
    pub(crate) fn check_aborted(&self) -> Result<(), Error> {
        if self.abort.is_cancelled() {
            return Err(error::operation_cancelled());
        }
        Ok(())
    }

    /// Record the result of the transfer in the phase state machine
    pub(crate) fn complete<T>(&self, result: Result<T, Error>) -> Result<T, Error> {
        match &result {
            Ok(_) => self.transition(TransferPhase::Done),
            Err(err) => {
                tracing::error!("transfer failed: {err}");
                self.transition(TransferPhase::Failed);
            }
        }
        result
    }

    /// Execute every item of `queue` with `svc` across the worker pool.
    ///
    /// The first failure stops dispatch of further items. Items already in flight are awaited
    /// before the failure is returned. Outcomes are returned in sequence order.
    pub(crate) async fn execute<Q, S>(
        &self,
        queue: Arc<Q>,
        svc: S,
    ) -> Result<Vec<ChunkOutcome>, Error>
    where
        Q: WorkQueue,
        S: Service<Q::Item, Response = ChunkOutcome, Error = Error> + Clone + Send + 'static,
        S::Future: Send,
    {
        self.transition(TransferPhase::Executing);
        let stop = self.abort.child_token();
        let mut tasks = JoinSet::new();
        for _ in 0..self.mode().workers() {
            let worker = worker(
                queue.clone(),
                svc.clone(),
                self.progress.clone(),
                stop.clone(),
            );
            tasks.spawn(worker);
        }
        tracing::trace!("work distributed to {} worker(s)", self.mode().workers());

        let mut outcomes = Vec::new();
        let mut first_err = None;
        while let Some(join_result) = tasks.join_next().await {
            let result = join_result.map_err(Error::from).and_then(|r| r);
            match result {
                Ok(completed) => outcomes.extend(completed),
                Err(err) => {
                    stop.cancel();
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
            }
        }

        if let Some(err) = first_err {
            return Err(err);
        }
        self.check_aborted()?;

        outcomes.sort_by_key(|o| o.chunk.sequence_index);
        Ok(outcomes)
    }
}

async fn worker<Q, S>(
    queue: Arc<Q>,
    svc: S,
    progress: Arc<ProgressAggregator>,
    stop: CancellationToken,
) -> Result<Vec<ChunkOutcome>, Error>
where
    Q: WorkQueue,
    S: Service<Q::Item, Response = ChunkOutcome, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
{
    let mut completed = Vec::new();
    loop {
        let next = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            next = queue.next_item() => next,
        };
        let item = match next {
            Ok(Some(item)) => item,
            Ok(None) => break,
            Err(err) => {
                stop.cancel();
                return Err(err);
            }
        };
        // reading the item may outlast a failure elsewhere in the pool
        if stop.is_cancelled() {
            tracing::trace!("transfer stopping, dropping undispatched item");
            break;
        }

        let outcome = match svc.clone().oneshot(item).await {
            Ok(outcome) => outcome,
            Err(err) => {
                stop.cancel();
                return Err(err);
            }
        };

        if let Err(err) = progress.record(outcome.chunk.length, outcome.is_last) {
            stop.cancel();
            return Err(err);
        }
        completed.push(outcome);
    }
    Ok(completed)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use tokio_util::sync::CancellationToken;
    use tower::service_fn;

    use super::{ChunkOutcome, ExecutionMode, TransferCoordinator, TransferState, WorkQueue};
    use crate::error::{self, BoxError, Error, ErrorKind};
    use crate::plan::{ChunkDescriptor, ChunkPlanner};
    use crate::progress::{ProgressEvent, SharedObserver};
    use crate::types::TransferPhase;

    struct PlannerQueue(Mutex<ChunkPlanner>);

    impl WorkQueue for PlannerQueue {
        type Item = ChunkDescriptor;

        async fn next_item(&self) -> Result<Option<ChunkDescriptor>, Error> {
            Ok(self.0.lock().unwrap().next())
        }
    }

    /// Hands out chunk 0 right away and takes `delay` to produce every other chunk
    struct SlowQueue {
        planner: Mutex<ChunkPlanner>,
        delay: std::time::Duration,
    }

    impl WorkQueue for SlowQueue {
        type Item = ChunkDescriptor;

        async fn next_item(&self) -> Result<Option<ChunkDescriptor>, Error> {
            let chunk = self.planner.lock().unwrap().next();
            if matches!(chunk, Some(c) if c.sequence_index > 0) {
                tokio::time::sleep(self.delay).await;
            }
            Ok(chunk)
        }
    }

    fn slow_queue(total: u64, chunk_size: u64, delay_ms: u64) -> Arc<SlowQueue> {
        Arc::new(SlowQueue {
            planner: Mutex::new(ChunkPlanner::new(0, Some(total), chunk_size).unwrap()),
            delay: std::time::Duration::from_millis(delay_ms),
        })
    }

    fn queue(total: u64, chunk_size: u64) -> Arc<PlannerQueue> {
        Arc::new(PlannerQueue(Mutex::new(
            ChunkPlanner::new(0, Some(total), chunk_size).unwrap(),
        )))
    }

    fn coordinator(
        total: u64,
        concurrency: usize,
        observer: Option<SharedObserver>,
    ) -> TransferCoordinator {
        let state = TransferState {
            total_size: Some(total),
            chunk_size: 10,
            single_shot_threshold: 0,
            concurrency,
        };
        TransferCoordinator::new(state, observer, CancellationToken::new()).0
    }

    fn outcome(chunk: ChunkDescriptor, total: u64) -> ChunkOutcome {
        ChunkOutcome {
            chunk,
            is_last: chunk.end() == total,
        }
    }

    #[test]
    fn test_capability_check() {
        let err = ExecutionMode::new(4)
            .check_capability(false, "source")
            .unwrap_err();
        assert_eq!(&ErrorKind::PositionedAccessRequired, err.kind());
        ExecutionMode::new(1)
            .check_capability(false, "source")
            .unwrap();
        ExecutionMode::new(4).check_capability(true, "source").unwrap();
    }

    #[tokio::test]
    async fn test_execute_in_parallel() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let (in_flight_c, max_c) = (in_flight.clone(), max_in_flight.clone());
        let svc = service_fn(move |chunk: ChunkDescriptor| {
            let in_flight = in_flight_c.clone();
            let max = max_c.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(fastrand::u64(1..5))).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, Error>(outcome(chunk, 95))
            }
        });

        let coordinator = coordinator(95, 4, None);
        let outcomes = coordinator.execute(queue(95, 10), svc).await.unwrap();
        let seqs = outcomes
            .iter()
            .map(|o| o.chunk.sequence_index)
            .collect::<Vec<_>>();
        assert_eq!((0..10).collect::<Vec<_>>(), seqs);
        assert!(max_in_flight.load(Ordering::SeqCst) <= 4);
        assert_eq!(95, coordinator.progress().bytes_completed());
        assert_eq!(TransferPhase::Executing, coordinator.phase());
    }

    #[tokio::test]
    async fn test_sequential_progress_is_in_order() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let captured = events.clone();
        let observer = SharedObserver::new(move |event: ProgressEvent| -> Result<(), BoxError> {
            captured.lock().unwrap().push(event.bytes_completed);
            Ok(())
        });
        let svc = service_fn(|chunk: ChunkDescriptor| async move {
            Ok::<_, Error>(outcome(chunk, 35))
        });
        let coordinator = coordinator(35, 1, Some(observer));
        coordinator.execute(queue(35, 10), svc).await.unwrap();
        assert_eq!(vec![10, 20, 30, 35], *events.lock().unwrap());
    }

    #[tokio::test]
    async fn test_failure_stops_dispatch() {
        let dispatched = Arc::new(AtomicU64::new(0));
        let dispatched_c = dispatched.clone();
        let svc = service_fn(move |chunk: ChunkDescriptor| {
            let dispatched = dispatched_c.clone();
            async move {
                dispatched.fetch_add(1, Ordering::SeqCst);
                if chunk.sequence_index == 2 {
                    return Err(error::chunk_failed(2, "boom"));
                }
                Ok(outcome(chunk, 1000))
            }
        });
        let coordinator = coordinator(1000, 1, None);
        let err = coordinator
            .execute(queue(1000, 10), svc)
            .await
            .unwrap_err();
        assert_eq!(Some(2), err.failed_chunk());
        assert_eq!(3, dispatched.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_dispatch_after_failure_while_reading() {
        let dispatched = Arc::new(Mutex::new(Vec::new()));
        let dispatched_c = dispatched.clone();
        let svc = service_fn(move |chunk: ChunkDescriptor| {
            let dispatched = dispatched_c.clone();
            async move {
                dispatched.lock().unwrap().push(chunk.sequence_index);
                if chunk.sequence_index == 0 {
                    return Err(error::chunk_failed(0, "boom"));
                }
                Ok(outcome(chunk, 80))
            }
        });

        let coordinator = coordinator(80, 8, None);
        let err = coordinator
            .execute(slow_queue(80, 10, 50), svc)
            .await
            .unwrap_err();
        assert_eq!(Some(0), err.failed_chunk());
        // chunks still being read when chunk 0 failed are never sent
        assert_eq!(vec![0], *dispatched.lock().unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_dispatch_after_abort_while_reading() {
        let dispatched = Arc::new(AtomicU64::new(0));
        let dispatched_c = dispatched.clone();
        let svc = service_fn(move |chunk: ChunkDescriptor| {
            let dispatched = dispatched_c.clone();
            async move {
                dispatched.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Error>(outcome(chunk, 80))
            }
        });

        let abort = CancellationToken::new();
        let state = TransferState {
            total_size: Some(80),
            chunk_size: 10,
            single_shot_threshold: 0,
            concurrency: 4,
        };
        let (coordinator, _) = TransferCoordinator::new(state, None, abort.clone());
        let queue = slow_queue(80, 10, 200);
        let execute = tokio::spawn(async move { coordinator.execute(queue, svc).await });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let dispatched_before_abort = dispatched.load(Ordering::SeqCst);
        abort.cancel();
        let err = execute.await.unwrap().unwrap_err();

        assert_eq!(&ErrorKind::OperationCancelled, err.kind());
        assert_eq!(1, dispatched_before_abort);
        assert_eq!(1, dispatched.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_complete_records_terminal_phase() {
        let coordinator = coordinator(10, 1, None);
        coordinator
            .complete::<()>(Err(error::runtime("failed")))
            .unwrap_err();
        assert_eq!(TransferPhase::Failed, coordinator.phase());
        // terminal phases are final
        coordinator.transition(TransferPhase::Done);
        assert_eq!(TransferPhase::Failed, coordinator.phase());
    }
}
