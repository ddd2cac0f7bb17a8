/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{self, Error};
use crate::io::part_reader::file_util;

/// Destination of a download.
///
/// Memory buffers and files support positioned writes and can be filled by several workers at
/// once. Writers supplied through [`from_writer`](OutputStream::from_writer) only accept chunks
/// in sequence order and can only be used with a concurrency of one.
#[derive(Debug)]
pub struct OutputStream {
    inner: RawOutputStream,
}

enum RawOutputStream {
    Memory,
    Fs(PathBuf),
    Dyn(Pin<Box<dyn AsyncWrite + Send + 'static>>),
}

impl fmt::Debug for RawOutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawOutputStream::Memory => f.write_str("Memory"),
            RawOutputStream::Fs(path) => f.debug_tuple("Fs").field(path).finish(),
            RawOutputStream::Dyn(_) => f.write_str("Dyn(dyn AsyncWrite)"),
        }
    }
}

impl OutputStream {
    /// Collect the downloaded bytes in memory.
    ///
    /// The bytes are available through [`DownloadOutput::body`](crate::operation::download::DownloadOutput::body).
    pub fn memory() -> Self {
        Self {
            inner: RawOutputStream::Memory,
        }
    }

    /// Write the download to the file at `path`, creating or truncating it.
    pub fn to_path(path: impl AsRef<Path>) -> Self {
        Self {
            inner: RawOutputStream::Fs(path.as_ref().to_path_buf()),
        }
    }

    /// Write the download sequentially to `writer`. The writer is flushed but not shut down once
    /// the transfer completes.
    pub fn from_writer<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + 'static,
    {
        Self {
            inner: RawOutputStream::Dyn(Box::pin(writer)),
        }
    }

    /// True if chunks can be written at arbitrary offsets
    pub fn supports_positioned_access(&self) -> bool {
        !matches!(self.inner, RawOutputStream::Dyn(_))
    }

    /// Open the sink for a download of `length` bytes.
    pub(crate) async fn open(self, length: u64) -> Result<SinkWriter, Error> {
        let writer = match self.inner {
            RawOutputStream::Memory => {
                let len = usize::try_from(length).map_err(error::invalid_input)?;
                SinkWriter::Memory(Mutex::new(vec![0; len]))
            }
            RawOutputStream::Fs(path) => {
                let file = tokio::task::spawn_blocking(move || {
                    let file = OpenOptions::new()
                        .write(true)
                        .create(true)
                        .truncate(true)
                        .open(path)?;
                    file.set_len(length)?;
                    Ok::<File, std::io::Error>(file)
                })
                .await??;
                SinkWriter::Fs(Arc::new(file))
            }
            RawOutputStream::Dyn(writer) => SinkWriter::Dyn(tokio::sync::Mutex::new(SequentialWriter {
                writer,
                cursor: 0,
            })),
        };
        Ok(writer)
    }
}

/// An opened download destination
pub(crate) enum SinkWriter {
    Memory(Mutex<Vec<u8>>), // std Mutex
    Fs(Arc<File>),
    Dyn(tokio::sync::Mutex<SequentialWriter>),
}

pub(crate) struct SequentialWriter {
    writer: Pin<Box<dyn AsyncWrite + Send + 'static>>,
    // next position the writer accepts
    cursor: u64,
}

impl fmt::Debug for SinkWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkWriter::Memory(_) => f.write_str("SinkWriter::Memory"),
            SinkWriter::Fs(file) => f.debug_tuple("SinkWriter::Fs").field(file).finish(),
            SinkWriter::Dyn(_) => f.write_str("SinkWriter::Dyn"),
        }
    }
}

impl SinkWriter {
    /// Write `data` at `offset` relative to the start of the sink.
    pub(crate) async fn write_at(&self, offset: u64, data: Bytes) -> Result<(), Error> {
        match self {
            SinkWriter::Memory(buf) => {
                let mut buf = buf.lock().expect("lock valid");
                let start = offset as usize;
                let end = start + data.len();
                if end > buf.len() {
                    return Err(error::runtime(format!(
                        "write of {} bytes at offset {offset} exceeds the destination size {}",
                        data.len(),
                        buf.len()
                    )));
                }
                buf[start..end].copy_from_slice(&data);
            }
            SinkWriter::Fs(file) => {
                let file = file.clone();
                tokio::task::spawn_blocking(move || {
                    file_util::write_file_chunk_sync(&file, &data, offset)
                })
                .await??;
            }
            SinkWriter::Dyn(writer) => {
                let mut writer = writer.lock().await;
                if writer.cursor != offset {
                    return Err(error::runtime(format!(
                        "out of order write: sequential destination is at {} but the chunk starts at {offset}",
                        writer.cursor
                    )));
                }
                writer.writer.write_all(&data).await?;
                writer.cursor += data.len() as u64;
            }
        }
        Ok(())
    }

    /// Flush the destination. Memory sinks hand back their contents.
    pub(crate) async fn finish(&self) -> Result<Option<Bytes>, Error> {
        match self {
            SinkWriter::Memory(buf) => {
                let buf = std::mem::take(&mut *buf.lock().expect("lock valid"));
                Ok(Some(Bytes::from(buf)))
            }
            SinkWriter::Fs(file) => {
                let file = file.clone();
                tokio::task::spawn_blocking(move || file.sync_all()).await??;
                Ok(None)
            }
            SinkWriter::Dyn(writer) => {
                writer.lock().await.writer.flush().await?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::OutputStream;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_memory_sink_out_of_order() {
        let sink = OutputStream::memory().open(10).await.unwrap();
        sink.write_at(5, Bytes::from_static(b"world")).await.unwrap();
        sink.write_at(0, Bytes::from_static(b"hello")).await.unwrap();
        let body = sink.finish().await.unwrap().unwrap();
        assert_eq!(Bytes::from_static(b"helloworld"), body);
    }

    #[tokio::test]
    async fn test_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let sink = OutputStream::to_path(&path).open(6).await.unwrap();
        sink.write_at(3, Bytes::from_static(b"def")).await.unwrap();
        sink.write_at(0, Bytes::from_static(b"abc")).await.unwrap();
        assert!(sink.finish().await.unwrap().is_none());
        assert_eq!(b"abcdef".to_vec(), std::fs::read(&path).unwrap());
    }

    #[tokio::test]
    async fn test_sequential_sink_rejects_out_of_order_writes() {
        let stream = OutputStream::from_writer(Vec::<u8>::new());
        assert!(!stream.supports_positioned_access());
        let sink = stream.open(10).await.unwrap();
        sink.write_at(0, Bytes::from_static(b"hello")).await.unwrap();
        let err = sink
            .write_at(8, Bytes::from_static(b"ld"))
            .await
            .unwrap_err();
        assert_eq!(&ErrorKind::RuntimeError, err.kind());
    }
}
