/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, ErrorKind};
use crate::operation::download::DownloadOutput;
use crate::types::TransferPhase;

/// Response type for a single download object request.
///
/// Calling [`Self::abort`] stops dispatch of further ranged reads and waits for the reads already
/// in flight. The destination may hold a partial download afterwards.
#[derive(Debug)]
#[non_exhaustive]
pub struct DownloadHandle {
    task: JoinHandle<Result<DownloadOutput, Error>>,
    phase: watch::Receiver<TransferPhase>,
    abort: CancellationToken,
}

impl DownloadHandle {
    pub(crate) fn new(
        task: JoinHandle<Result<DownloadOutput, Error>>,
        phase: watch::Receiver<TransferPhase>,
        abort: CancellationToken,
    ) -> Self {
        Self { task, phase, abort }
    }

    /// The phase the transfer is currently in
    pub fn phase(&self) -> TransferPhase {
        *self.phase.borrow()
    }

    /// Consume the handle and wait for download transfer to complete
    #[tracing::instrument(skip_all, level = "debug", name = "join-download")]
    pub async fn join(self) -> Result<DownloadOutput, Error> {
        self.task.await?
    }

    /// Abort the download and wait for in-flight reads to settle
    #[tracing::instrument(skip_all, level = "debug", name = "abort-download")]
    pub async fn abort(self) -> Result<(), Error> {
        self.abort.cancel();
        match self.task.await? {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == &ErrorKind::OperationCancelled => Ok(()),
            Err(err) => Err(err),
        }
    }
}
