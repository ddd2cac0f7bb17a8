/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fs;
use std::path::{Path, PathBuf};

use crate::io::error::{Error, ErrorKind};
use crate::io::stream::{InputStream, RawInputStream};

/// Input stream designed to wrap file based input.
#[derive(Debug)]
pub(super) struct PathBody {
    pub(super) path: PathBuf,
    // absolute offset in the file of the first byte of the stream
    pub(super) offset: u64,
    pub(super) length: u64,
}

/// Builder for creating [`InputStream`] from a file/path, with full control over how the file is
/// read.
///
/// ```no_run
/// use blob_transfer::io::InputStream;
///
/// let stream = InputStream::read_from()
///     .path("docs/some-large-file.csv")
///     .offset(1024)
///     .length(123_456)
///     .build()
///     .expect("valid path");
/// ```
#[derive(Debug, Default)]
pub struct PathBodyBuilder {
    path: Option<PathBuf>,
    length: Option<u64>,
    offset: Option<u64>,
}

impl PathBodyBuilder {
    /// Create a new [`PathBodyBuilder`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the path to read from.
    ///
    /// NOTE: The length of the file is read once when the stream is built. The file must not be
    /// modified while the transfer is running.
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Specify the offset to start reading from (in bytes)
    ///
    /// When used in conjunction with `length`, allows for reading a single "chunk" of a file.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Specify the length to read (in bytes).
    ///
    /// By default the stream covers the rest of the file after `offset`.
    pub fn length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    /// Returns a [`InputStream`] from this builder.
    pub fn build(self) -> Result<InputStream, Error> {
        let path = self.path.ok_or(ErrorKind::PathNotSet)?;
        let offset = self.offset.unwrap_or_default();
        let file_size = fs::metadata(&path)?.len();

        if offset > file_size {
            return Err(ErrorKind::OffsetGreaterThanFileSize.into());
        }

        let length = match self.length {
            Some(length) => {
                if offset + length > file_size {
                    return Err(ErrorKind::LengthPastEndOfFile.into());
                }
                length
            }
            None => file_size - offset,
        };

        let body = PathBody {
            path,
            offset,
            length,
        };

        Ok(InputStream {
            inner: RawInputStream::Fs(body),
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use crate::io::InputStream;

    fn tmp_file(len: usize) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(&vec![b'x'; len]).unwrap();
        tmp
    }

    #[test]
    fn test_from_path() {
        let tmp = tmp_file(100);
        let stream = InputStream::from_path(tmp.path()).unwrap();
        assert_eq!(Some(100), stream.size_hint().exact_size());
        assert!(stream.supports_positioned_access());
    }

    #[test]
    fn test_offset_and_length() {
        let tmp = tmp_file(100);
        let stream = InputStream::read_from()
            .path(tmp.path())
            .offset(10)
            .build()
            .unwrap();
        assert_eq!(Some(90), stream.size_hint().exact_size());

        let stream = InputStream::read_from()
            .path(tmp.path())
            .offset(10)
            .length(20)
            .build()
            .unwrap();
        assert_eq!(Some(20), stream.size_hint().exact_size());
    }

    #[test]
    fn test_invalid_bounds() {
        let tmp = tmp_file(100);
        InputStream::read_from()
            .path(tmp.path())
            .offset(101)
            .build()
            .unwrap_err();
        InputStream::read_from()
            .path(tmp.path())
            .offset(50)
            .length(51)
            .build()
            .unwrap_err();
    }

    #[test]
    fn test_missing_file() {
        InputStream::from_path("/this/path/does/not/exist").unwrap_err();
    }
}
