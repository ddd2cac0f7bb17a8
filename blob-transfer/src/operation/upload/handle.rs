/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, ErrorKind};
use crate::operation::upload::UploadOutput;
use crate::types::TransferPhase;

/// Response type for a single upload object request.
///
/// # Cancellation
///
/// Calling [`Self::abort`] stops dispatch of further chunks. Chunks already in flight are
/// awaited, and the manifest of a block layout upload is never committed, so the object is left
/// as it was before the upload started. Staged blocks are left for the service to expire.
///
/// Dropping the handle detaches the transfer, which keeps running in the background.
#[derive(Debug)]
#[non_exhaustive]
pub struct UploadHandle {
    task: JoinHandle<Result<UploadOutput, Error>>,
    phase: watch::Receiver<TransferPhase>,
    abort: CancellationToken,
}

impl UploadHandle {
    pub(crate) fn new(
        task: JoinHandle<Result<UploadOutput, Error>>,
        phase: watch::Receiver<TransferPhase>,
        abort: CancellationToken,
    ) -> Self {
        Self { task, phase, abort }
    }

    /// The phase the transfer is currently in
    pub fn phase(&self) -> TransferPhase {
        *self.phase.borrow()
    }

    /// Consume the handle and wait for upload to complete
    #[tracing::instrument(skip_all, level = "debug", name = "join-upload")]
    pub async fn join(self) -> Result<UploadOutput, Error> {
        self.task.await?
    }

    /// Abort the upload and wait for in-flight chunks to settle.
    ///
    /// Returns `Ok` if the transfer stopped (or had already completed). Any other failure the
    /// transfer ran into is returned as is.
    #[tracing::instrument(skip_all, level = "debug", name = "abort-upload")]
    pub async fn abort(self) -> Result<(), Error> {
        self.abort.cancel();
        match self.task.await? {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == &ErrorKind::OperationCancelled => Ok(()),
            Err(err) => Err(err),
        }
    }
}
