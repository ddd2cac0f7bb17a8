/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;

use crate::error::BoxError;

#[derive(Debug)]
pub(crate) enum ErrorKind {
    PathNotSet,
    OffsetGreaterThanFileSize,
    LengthPastEndOfFile,
    UnexpectedEndOfStream,
    TaskFailed,
    IoError,
}

/// An I/O related error occurred
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<BoxError>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, source: Option<BoxError>) -> Self {
        Self { kind, source }
    }

    pub(crate) fn unexpected_eof(expected: u64, actual: u64) -> Self {
        Self::new(
            ErrorKind::UnexpectedEndOfStream,
            Some(format!("expected {expected} bytes but the source ended after {actual}").into()),
        )
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind, None)
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::new(ErrorKind::IoError, Some(value.into()))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::new(ErrorKind::TaskFailed, Some(value.into()))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::PathNotSet => write!(f, "no path was given to read from"),
            ErrorKind::OffsetGreaterThanFileSize => write!(
                f,
                "offset must be less than or equal to file size but was greater than"
            ),
            ErrorKind::LengthPastEndOfFile => {
                write!(f, "offset + length is past the end of the file")
            }
            ErrorKind::UnexpectedEndOfStream => write!(f, "unexpected end of stream"),
            ErrorKind::TaskFailed => write!(f, "blocking I/O task failed"),
            ErrorKind::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|err| err.as_ref() as _)
    }
}
