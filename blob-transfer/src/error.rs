/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;

use crate::transport::{TransportError, TransportErrorKind};

/// A boxed error that is `Send` and `Sync`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by this library
///
/// NOTE: The `source` chain carries the underlying cause (e.g. the transport error for a failed
/// chunk). Walk [`std::error::Error::source`] to display all of it.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: BoxError,
}

/// General categories of transfer errors.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Operation input validation issues, including offset/count combinations that cannot be
    /// planned.
    InputInvalid,

    /// Parallel execution was requested for a source or sink that only supports sequential
    /// access.
    PositionedAccessRequired,

    /// I/O errors
    IOError,

    /// Some kind of internal runtime issue (e.g. task failure, out of order write, etc)
    RuntimeError,

    /// Failed to upload or download a chunk of an object
    ChunkFailed(ChunkFailed),

    /// The service rejected the manifest that finalizes an upload.
    ///
    /// Blocks staged by the failed transfer are left uncommitted on the service. Uploading again
    /// under the same block IDs is safe since block uploads are idempotent.
    ManifestCommitFailed,

    /// The progress observer returned an error or panicked.
    ///
    /// Dispatch stops and a block layout upload is not committed. Bytes already written are not
    /// rolled back: a single request upload has created the object by the time its only event is
    /// emitted, and a range layout upload keeps the ranges it wrote.
    ProgressObserverFailed,

    /// Resource not found (e.g. download target does not exist)
    NotFound,

    /// The operation is being cancelled because the user explicitly called `.abort` on the handle
    OperationCancelled,
}

/// Stores information about a failed chunk
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChunkFailed {
    sequence_index: u64,
}

impl ChunkFailed {
    /// The sequence index of the chunk that failed.
    pub fn sequence_index(&self) -> u64 {
        self.sequence_index
    }
}

impl Error {
    /// Creates a new transfer [`Error`] from a known kind of error as well as an arbitrary error
    /// source.
    pub fn new<E>(kind: ErrorKind, err: E) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            kind,
            source: err.into(),
        }
    }

    /// Returns the corresponding [`ErrorKind`] for this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The sequence index of the failed chunk if this error was caused by a chunk transfer
    pub fn failed_chunk(&self) -> Option<u64> {
        match &self.kind {
            ErrorKind::ChunkFailed(chunk) => Some(chunk.sequence_index()),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::InputInvalid => write!(f, "invalid input"),
            ErrorKind::PositionedAccessRequired => {
                write!(f, "parallel transfer requires positioned access")
            }
            ErrorKind::IOError => write!(f, "I/O error"),
            ErrorKind::RuntimeError => write!(f, "runtime error"),
            ErrorKind::ChunkFailed(chunk_failed) => {
                write!(f, "failed to process chunk {}", chunk_failed.sequence_index)
            }
            ErrorKind::ManifestCommitFailed => write!(f, "failed to commit manifest"),
            ErrorKind::ProgressObserverFailed => write!(f, "progress observer failed"),
            ErrorKind::NotFound => write!(f, "resource not found"),
            ErrorKind::OperationCancelled => write!(f, "operation cancelled"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

impl From<crate::io::error::Error> for Error {
    fn from(value: crate::io::error::Error) -> Self {
        Self::new(ErrorKind::IOError, value)
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::new(ErrorKind::IOError, value)
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::new(ErrorKind::RuntimeError, value)
    }
}

impl From<TransportError> for Error {
    fn from(value: TransportError) -> Self {
        let kind = match value.kind() {
            TransportErrorKind::NotFound => ErrorKind::NotFound,
            TransportErrorKind::InvalidInput | TransportErrorKind::InvalidRange => {
                ErrorKind::InputInvalid
            }
            _ => ErrorKind::RuntimeError,
        };
        Error::new(kind, value)
    }
}

pub(crate) fn invalid_input<E>(err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::InputInvalid, err)
}

pub(crate) fn positioned_access_required<E>(err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::PositionedAccessRequired, err)
}

pub(crate) fn chunk_failed<E>(sequence_index: u64, err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::ChunkFailed(ChunkFailed { sequence_index }), err)
}

pub(crate) fn manifest_commit_failed<E>(err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::ManifestCommitFailed, err)
}

pub(crate) fn progress_observer_failed<E>(err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::ProgressObserverFailed, err)
}

pub(crate) fn runtime<E>(err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::RuntimeError, err)
}

static CANCELLATION_ERROR: &str = "the transfer was aborted, no further chunks will be dispatched";

pub(crate) fn operation_cancelled() -> Error {
    Error::new(ErrorKind::OperationCancelled, CANCELLATION_ERROR)
}

#[cfg(test)]
mod tests {
    use super::{chunk_failed, Error, ErrorKind};
    use crate::transport::TransportError;

    #[test]
    fn test_chunk_failed_carries_sequence_index() {
        let err = chunk_failed(7, "boom");
        assert_eq!(Some(7), err.failed_chunk());
        assert_eq!("failed to process chunk 7", err.to_string());
    }

    #[test]
    fn test_transport_not_found_maps_to_not_found() {
        let err: Error = TransportError::not_found("blob `a`").into();
        assert_eq!(&ErrorKind::NotFound, err.kind());
        assert_eq!(None, err.failed_chunk());
    }
}
