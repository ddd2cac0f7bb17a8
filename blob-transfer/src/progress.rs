/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{self, BoxError, Error};

/// Cumulative progress of a transfer.
///
/// Consecutive events of one transfer never decrease. The last event of a successful transfer
/// reports `bytes_completed == total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Bytes transferred so far, including bytes skipped by a resumed upload
    pub bytes_completed: u64,
    /// Total bytes of the transfer, `None` while the size of the source is unknown
    pub total: Option<u64>,
}

/// Receives [`ProgressEvent`]s while a transfer runs.
///
/// Observers are invoked synchronously from the worker that completed a chunk, one event at a
/// time. Returning an error aborts the transfer with
/// [`ErrorKind::ProgressObserverFailed`](crate::error::ErrorKind::ProgressObserverFailed).
pub trait ProgressObserver: Send + Sync {
    /// Called once per completed chunk
    fn on_progress(&self, event: ProgressEvent) -> Result<(), BoxError>;
}

impl<F> ProgressObserver for F
where
    F: Fn(ProgressEvent) -> Result<(), BoxError> + Send + Sync,
{
    fn on_progress(&self, event: ProgressEvent) -> Result<(), BoxError> {
        self(event)
    }
}

/// Shareable handle to a user supplied observer
#[derive(Clone)]
pub(crate) struct SharedObserver(Arc<dyn ProgressObserver>);

impl SharedObserver {
    pub(crate) fn new(observer: impl ProgressObserver + 'static) -> Self {
        Self(Arc::new(observer))
    }
}

impl fmt::Debug for SharedObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedObserver")
    }
}

#[derive(Debug)]
struct ProgressState {
    completed: u64,
    total: Option<u64>,
}

/// Thread-safe progress accumulator shared by all workers of a transfer.
///
/// Each completion adds its length and notifies the observer while holding the same lock, so the
/// observer sees events in non-decreasing order even when chunks complete concurrently.
#[derive(Debug)]
pub struct ProgressAggregator {
    state: Mutex<ProgressState>,
    observer: Option<SharedObserver>,
}

impl ProgressAggregator {
    pub(crate) fn new(total: Option<u64>, observer: Option<SharedObserver>) -> Self {
        Self {
            state: Mutex::new(ProgressState {
                completed: 0,
                total,
            }),
            observer,
        }
    }

    /// Count bytes that were complete before the transfer started. No event is emitted.
    pub(crate) fn seed(&self, bytes: u64) {
        let mut state = self.lock();
        state.completed += bytes;
    }

    /// Set the total once it is discovered. No event is emitted.
    pub(crate) fn set_total(&self, total: u64) {
        let mut state = self.lock();
        state.total = Some(total);
    }

    /// Record a completed chunk of `length` bytes.
    ///
    /// `end_of_stream` resolves an unknown total to the bytes completed so far.
    pub(crate) fn record(&self, length: u64, end_of_stream: bool) -> Result<ProgressEvent, Error> {
        let mut state = self.lock();
        state.completed += length;
        if end_of_stream && state.total.is_none() {
            state.total = Some(state.completed);
        }
        let event = ProgressEvent {
            bytes_completed: state.completed,
            total: state.total,
        };
        self.emit(event)?;
        Ok(event)
    }

    /// Resolve a still unknown total. Emits a final event only if the total was unresolved.
    pub(crate) fn finish(&self) -> Result<(), Error> {
        let mut state = self.lock();
        if state.total.is_none() {
            state.total = Some(state.completed);
            self.emit(ProgressEvent {
                bytes_completed: state.completed,
                total: state.total,
            })?;
        }
        Ok(())
    }

    /// Bytes completed so far
    pub fn bytes_completed(&self) -> u64 {
        self.lock().completed
    }

    /// Total if known
    pub fn total(&self) -> Option<u64> {
        self.lock().total
    }

    // the counters are updated before the observer runs, so a poisoned lock still holds a
    // consistent state
    fn lock(&self) -> MutexGuard<'_, ProgressState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ProgressEvent) -> Result<(), Error> {
        tracing::trace!(
            bytes_completed = event.bytes_completed,
            total = ?event.total,
            "progress"
        );
        let Some(observer) = &self.observer else {
            return Ok(());
        };
        match panic::catch_unwind(AssertUnwindSafe(|| observer.0.on_progress(event))) {
            Ok(result) => result.map_err(error::progress_observer_failed),
            Err(_) => Err(error::progress_observer_failed(
                "progress observer panicked",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::{ProgressAggregator, ProgressEvent, SharedObserver};
    use crate::error::{BoxError, ErrorKind};

    fn collector() -> (SharedObserver, Arc<Mutex<Vec<ProgressEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let captured = events.clone();
        let observer = SharedObserver::new(move |event: ProgressEvent| -> Result<(), BoxError> {
            captured.lock().unwrap().push(event);
            Ok(())
        });
        (observer, events)
    }

    fn event(bytes_completed: u64, total: Option<u64>) -> ProgressEvent {
        ProgressEvent {
            bytes_completed,
            total,
        }
    }

    #[test]
    fn test_known_total() {
        let (observer, events) = collector();
        let agg = ProgressAggregator::new(Some(1574), Some(observer));
        for len in [512, 512, 512, 38] {
            agg.record(len, false).unwrap();
        }
        agg.finish().unwrap();
        assert_eq!(
            vec![
                event(512, Some(1574)),
                event(1024, Some(1574)),
                event(1536, Some(1574)),
                event(1574, Some(1574)),
            ],
            *events.lock().unwrap()
        );
    }

    #[test]
    fn test_unknown_total_resolves_on_last_chunk() {
        let (observer, events) = collector();
        let agg = ProgressAggregator::new(None, Some(observer));
        agg.record(512, false).unwrap();
        agg.record(38, true).unwrap();
        agg.finish().unwrap();
        assert_eq!(
            vec![event(512, None), event(550, Some(550))],
            *events.lock().unwrap()
        );
    }

    #[test]
    fn test_unknown_total_resolved_by_finish() {
        let (observer, events) = collector();
        let agg = ProgressAggregator::new(None, Some(observer));
        agg.record(512, false).unwrap();
        agg.finish().unwrap();
        assert_eq!(
            vec![event(512, None), event(512, Some(512))],
            *events.lock().unwrap()
        );
    }

    #[test]
    fn test_seeded_bytes_count_towards_progress() {
        let (observer, events) = collector();
        let agg = ProgressAggregator::new(Some(30), Some(observer));
        agg.seed(20);
        agg.record(10, false).unwrap();
        assert_eq!(vec![event(30, Some(30))], *events.lock().unwrap());
    }

    #[test]
    fn test_observer_error() {
        let observer = SharedObserver::new(|_: ProgressEvent| -> Result<(), BoxError> {
            Err("observer gave up".into())
        });
        let agg = ProgressAggregator::new(Some(10), Some(observer));
        let err = agg.record(10, false).unwrap_err();
        assert_eq!(&ErrorKind::ProgressObserverFailed, err.kind());
    }

    #[test]
    fn test_observer_panic() {
        let observer = SharedObserver::new(|event: ProgressEvent| -> Result<(), BoxError> {
            if event.bytes_completed == 10 {
                panic!("observer bug");
            }
            Ok(())
        });
        let agg = ProgressAggregator::new(Some(20), Some(observer));
        let err = agg.record(10, false).unwrap_err();
        assert_eq!(&ErrorKind::ProgressObserverFailed, err.kind());

        // other workers keep reporting
        agg.record(10, false).unwrap();
        assert_eq!(20, agg.bytes_completed());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_monotonic_under_concurrency() {
        let (observer, events) = collector();
        let agg = Arc::new(ProgressAggregator::new(Some(64 * 100), Some(observer)));
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..64 {
            let agg = agg.clone();
            tasks.spawn(async move {
                for _ in 0..10 {
                    agg.record(10, false).unwrap();
                    tokio::task::yield_now().await;
                }
            });
        }
        while let Some(res) = tasks.join_next().await {
            res.unwrap();
        }

        let events = events.lock().unwrap();
        assert_eq!(640, events.len());
        assert!(events
            .windows(2)
            .all(|w| w[0].bytes_completed < w[1].bytes_completed));
        assert_eq!(6400, events.last().unwrap().bytes_completed);
    }
}
