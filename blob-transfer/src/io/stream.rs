/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;
use std::path::Path;
use std::pin::Pin;

use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::io::path_body::{PathBody, PathBodyBuilder};
use crate::io::size_hint::SizeHint;

/// Source of binary data.
///
/// In-memory buffers and files support positioned access and can be read by several workers at
/// once. Readers supplied through [`from_reader`](InputStream::from_reader) are consumed
/// sequentially and can only be uploaded with a concurrency of one.
#[derive(Debug)]
pub struct InputStream {
    pub(super) inner: RawInputStream,
}

impl InputStream {
    /// Create a new `InputStream` from a static byte slice
    pub fn from_static(bytes: &'static [u8]) -> Self {
        let inner = RawInputStream::Buf(bytes.into());
        Self { inner }
    }

    /// Return the bounds on the remaining length of the `InputStream`
    pub fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }

    /// True if any byte range of this source can be read independently of the others
    pub fn supports_positioned_access(&self) -> bool {
        !matches!(self.inner, RawInputStream::Dyn(_))
    }

    /// Returns a [`PathBodyBuilder`], allowing you to build a `InputStream` with
    /// full control over how the file is read (eg. specifying the length of
    /// the file or the starting offset to read from).
    pub fn read_from() -> PathBodyBuilder {
        PathBodyBuilder::new()
    }

    /// Create a new `InputStream` that reads data from a given `path`.
    ///
    /// ## Warning
    /// The contents of the file MUST not change. The length of the file is read once when the
    /// stream is created.
    ///
    /// # Examples
    /// ```no_run
    /// use blob_transfer::io::InputStream;
    ///
    /// let stream = InputStream::from_path("docs/rows.csv").expect("file should be readable");
    /// ```
    pub fn from_path(path: impl AsRef<Path>) -> Result<InputStream, crate::io::error::Error> {
        Self::read_from().path(path).build()
    }

    /// Create a new `InputStream` that reads sequentially from `reader` until it is exhausted.
    ///
    /// The size of the source is unknown, chunks are produced until the reader returns EOF.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self {
            inner: RawInputStream::Dyn(BoxReader::new(reader, None)),
        }
    }

    /// Create a new `InputStream` that reads exactly `length` bytes sequentially from `reader`.
    ///
    /// A reader that ends before `length` bytes fails the transfer.
    pub fn from_reader_with_length<R>(reader: R, length: u64) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self {
            inner: RawInputStream::Dyn(BoxReader::new(reader, Some(length))),
        }
    }
}

#[derive(Debug)]
pub(super) enum RawInputStream {
    /// In-memory buffer to read from
    Buf(Bytes),
    /// File based input
    Fs(PathBody),
    /// User provided sequential reader
    Dyn(BoxReader),
}

pub(crate) struct BoxReader {
    pub(super) inner: Pin<Box<dyn AsyncRead + Send + 'static>>,
    pub(super) length: Option<u64>,
}

impl BoxReader {
    fn new<R: AsyncRead + Send + 'static>(reader: R, length: Option<u64>) -> Self {
        Self {
            inner: Box::pin(reader),
            length,
        }
    }
}

impl fmt::Debug for BoxReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxReader(dyn AsyncRead)")
            .field("length", &self.length)
            .finish()
    }
}

impl RawInputStream {
    pub(super) fn size_hint(&self) -> SizeHint {
        match self {
            RawInputStream::Buf(bytes) => SizeHint::exact(bytes.len() as u64),
            RawInputStream::Fs(path_body) => SizeHint::exact(path_body.length),
            RawInputStream::Dyn(reader) => reader
                .length
                .map(SizeHint::exact)
                .unwrap_or_else(SizeHint::unknown),
        }
    }
}

impl Default for InputStream {
    fn default() -> Self {
        Self {
            inner: RawInputStream::Buf(Bytes::default()),
        }
    }
}

impl From<Bytes> for InputStream {
    fn from(value: Bytes) -> Self {
        Self {
            inner: RawInputStream::Buf(value),
        }
    }
}

impl From<Vec<u8>> for InputStream {
    fn from(value: Vec<u8>) -> Self {
        Self::from(Bytes::from(value))
    }
}

impl From<&'static [u8]> for InputStream {
    fn from(slice: &'static [u8]) -> InputStream {
        Self::from(Bytes::from_static(slice))
    }
}

impl From<&'static str> for InputStream {
    fn from(slice: &'static str) -> InputStream {
        Self::from(Bytes::from_static(slice.as_bytes()))
    }
}
