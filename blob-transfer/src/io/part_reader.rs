/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */
use std::collections::HashSet;
use std::sync::Mutex;

use bytes::Bytes;
use tokio::io::AsyncReadExt;

use crate::io::error::Error;
use crate::io::path_body::PathBody;
use crate::io::stream::{BoxReader, RawInputStream};
use crate::io::InputStream;
use crate::plan::{ChunkDescriptor, ChunkPlanner};

/// Builder for creating a `PartReader`
#[derive(Debug)]
pub(crate) struct Builder {
    stream: Option<RawInputStream>,
    planner: Option<ChunkPlanner>,
    skip: HashSet<u64>,
}

impl Builder {
    pub(crate) fn new() -> Self {
        Self {
            stream: None,
            planner: None,
            skip: HashSet::new(),
        }
    }

    /// Set the input stream to read from.
    pub(crate) fn stream(mut self, stream: InputStream) -> Self {
        self.stream = Some(stream.inner);
        self
    }

    /// Set the planner that decides which chunks are read.
    pub(crate) fn planner(mut self, planner: ChunkPlanner) -> Self {
        self.planner = Some(planner);
        self
    }

    /// Sequence indexes of chunks that are already present at the destination and must not be
    /// returned.
    pub(crate) fn skip(mut self, skip: HashSet<u64>) -> Self {
        self.skip = skip;
        self
    }

    pub(crate) fn build(self) -> PartReader {
        let stream = self.stream.expect("input stream set");
        let planner = self.planner.expect("planner set");
        PartReader::new(stream, ReaderState::new(planner, self.skip))
    }
}

/// Reads the chunks of an [`InputStream`] in sequence order.
///
/// Positioned sources only reserve the next chunk under a lock and read it afterwards, so
/// several workers may read concurrently. Sequential readers are consumed under an async lock.
#[derive(Debug)]
pub(crate) struct PartReader {
    inner: Inner,
}

#[derive(Debug)]
enum Inner {
    Bytes(BytesPartReader),
    Fs(PathBodyPartReader),
    Dyn(DynPartReader),
}

impl PartReader {
    fn new(raw: RawInputStream, state: ReaderState) -> Self {
        let inner = match raw {
            RawInputStream::Buf(buf) => Inner::Bytes(BytesPartReader::new(buf, state)),
            RawInputStream::Fs(path_body) => Inner::Fs(PathBodyPartReader::new(path_body, state)),
            RawInputStream::Dyn(reader) => Inner::Dyn(DynPartReader::new(reader, state)),
        };
        Self { inner }
    }

    /// Read the next chunk, `None` once the source is exhausted
    pub(crate) async fn next_part(&self) -> Result<Option<PartData>, Error> {
        match &self.inner {
            Inner::Bytes(bytes) => bytes.next_part().await,
            Inner::Fs(path_body) => path_body.next_part().await,
            Inner::Dyn(reader) => reader.next_part().await,
        }
    }
}

/// A chunk of the source together with its contents
#[derive(Debug, Clone)]
pub(crate) struct PartData {
    pub(crate) chunk: ChunkDescriptor,
    pub(crate) data: Bytes,
    // no chunk follows this one
    pub(crate) is_last: bool,
}

#[derive(Debug)]
struct ReaderState {
    planner: ChunkPlanner,
    skip: HashSet<u64>,
}

impl ReaderState {
    fn new(planner: ChunkPlanner, skip: HashSet<u64>) -> Self {
        Self { planner, skip }
    }

    /// Reserve the next chunk that is not skipped. Only valid while the end is known.
    fn reserve(&mut self) -> Option<(ChunkDescriptor, bool)> {
        loop {
            let chunk = self.planner.next()?;
            if self.skip.contains(&chunk.sequence_index) {
                tracing::trace!(seq = chunk.sequence_index, "skipping chunk already present");
                continue;
            }
            let is_last = self.planner.is_done();
            return Some((chunk, is_last));
        }
    }
}

/// Implementation for in-memory input streams.
#[derive(Debug)]
struct BytesPartReader {
    buf: Bytes,
    state: Mutex<ReaderState>, // std Mutex
}

impl BytesPartReader {
    fn new(buf: Bytes, state: ReaderState) -> Self {
        Self {
            buf,
            state: Mutex::new(state),
        }
    }

    async fn next_part(&self) -> Result<Option<PartData>, Error> {
        let reserved = self.state.lock().expect("lock valid").reserve();
        let Some((chunk, is_last)) = reserved else {
            return Ok(None);
        };
        let start = chunk.offset as usize;
        let data = self.buf.slice(start..start + chunk.length as usize);
        Ok(Some(PartData {
            chunk,
            data,
            is_last,
        }))
    }
}

/// Implementation for path based input streams
#[derive(Debug)]
struct PathBodyPartReader {
    body: PathBody,
    state: Mutex<ReaderState>, // std Mutex
}

impl PathBodyPartReader {
    fn new(body: PathBody, state: ReaderState) -> Self {
        Self {
            body,
            state: Mutex::new(state),
        }
    }

    async fn next_part(&self) -> Result<Option<PartData>, Error> {
        let reserved = self.state.lock().expect("lock valid").reserve();
        let Some((chunk, is_last)) = reserved else {
            return Ok(None);
        };
        let path = self.body.path.clone();
        let file_offset = self.body.offset + chunk.offset;
        let handle = tokio::task::spawn_blocking(move || {
            let mut dst = vec![0; chunk.length as usize];
            file_util::read_file_chunk_sync(&mut dst, path, file_offset)?;
            Ok::<PartData, Error>(PartData {
                chunk,
                data: Bytes::from(dst),
                is_last,
            })
        });

        handle.await?.map(Some)
    }
}

pub(crate) mod file_util {
    #[cfg(unix)]
    pub(crate) use unix::{read_file_chunk_sync, write_file_chunk_sync};
    #[cfg(windows)]
    pub(crate) use windows::{read_file_chunk_sync, write_file_chunk_sync};

    #[cfg(unix)]
    mod unix {
        use std::fs::File;
        use std::io;
        use std::os::unix::fs::FileExt;
        use std::path::Path;

        pub(crate) fn read_file_chunk_sync(
            dst: &mut [u8],
            path: impl AsRef<Path>,
            offset: u64,
        ) -> Result<(), io::Error> {
            let file = File::open(path)?;
            file.read_exact_at(dst, offset)
        }

        pub(crate) fn write_file_chunk_sync(
            file: &File,
            src: &[u8],
            offset: u64,
        ) -> Result<(), io::Error> {
            file.write_all_at(src, offset)
        }
    }

    #[cfg(windows)]
    mod windows {
        use std::fs::File;
        use std::io;
        use std::os::windows::fs::FileExt;
        use std::path::Path;

        pub(crate) fn read_file_chunk_sync(
            mut dst: &mut [u8],
            path: impl AsRef<Path>,
            mut offset: u64,
        ) -> Result<(), io::Error> {
            let file = File::open(path)?;
            while !dst.is_empty() {
                match file.seek_read(dst, offset)? {
                    0 => return Err(io::ErrorKind::UnexpectedEof.into()),
                    n => {
                        dst = &mut std::mem::take(&mut dst)[n..];
                        offset += n as u64;
                    }
                }
            }
            Ok(())
        }

        pub(crate) fn write_file_chunk_sync(
            file: &File,
            mut src: &[u8],
            mut offset: u64,
        ) -> Result<(), io::Error> {
            while !src.is_empty() {
                match file.seek_write(src, offset)? {
                    0 => return Err(io::ErrorKind::WriteZero.into()),
                    n => {
                        src = &src[n..];
                        offset += n as u64;
                    }
                }
            }
            Ok(())
        }
    }
}

#[derive(Debug)]
struct DynPartReader {
    inner: tokio::sync::Mutex<DynReaderInner>,
}

#[derive(Debug)]
struct DynReaderInner {
    reader: BoxReader,
    // bytes consumed from the reader so far
    position: u64,
    state: ReaderState,
}

impl DynPartReader {
    fn new(reader: BoxReader, state: ReaderState) -> Self {
        Self {
            inner: tokio::sync::Mutex::new(DynReaderInner {
                reader,
                position: 0,
                state,
            }),
        }
    }

    async fn next_part(&self) -> Result<Option<PartData>, Error> {
        let mut inner = self.inner.lock().await;
        let inner = &mut *inner;

        // skip to the start offset
        let start = inner.state.planner.next_offset();
        if inner.position < start {
            let want = start - inner.position;
            let skipped = discard(&mut inner.reader, want).await?;
            inner.position += skipped;
            if skipped < want {
                return Err(Error::unexpected_eof(start, inner.position));
            }
        }

        loop {
            if inner.state.planner.is_done() {
                return Ok(None);
            }
            let want = inner.state.planner.next_len();
            let sequence_index = inner.state.planner.chunks_planned();

            if inner.state.skip.contains(&sequence_index) {
                let skipped = discard(&mut inner.reader, want).await?;
                inner.position += skipped;
                if skipped < want {
                    return Err(Error::unexpected_eof(want, skipped));
                }
                inner.state.planner.commit(want);
                tracing::trace!(seq = sequence_index, "skipping chunk already present");
                continue;
            }

            let data = fill(&mut inner.reader, want).await?;
            let got = data.len() as u64;
            inner.position += got;

            let known_end = inner.state.planner.end().is_some();
            if got < want && known_end {
                return Err(Error::unexpected_eof(want, got));
            }
            if got == 0 {
                // EOF on a chunk boundary
                inner.state.planner.finish();
                return Ok(None);
            }

            let chunk = inner.state.planner.commit(got);
            let is_last = inner.state.planner.is_done();
            return Ok(Some(PartData {
                chunk,
                data,
                is_last,
            }));
        }
    }
}

/// Read until `len` bytes are buffered or the reader is exhausted
async fn fill(reader: &mut BoxReader, len: u64) -> Result<Bytes, Error> {
    let mut buf = Vec::with_capacity(len as usize);
    (&mut reader.inner).take(len).read_to_end(&mut buf).await?;
    Ok(Bytes::from(buf))
}

async fn discard(reader: &mut BoxReader, len: u64) -> Result<u64, Error> {
    let skipped = tokio::io::copy(&mut (&mut reader.inner).take(len), &mut tokio::io::sink()).await?;
    Ok(skipped)
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;
    use std::io::Write;

    use bytes::{Buf, Bytes};
    use tempfile::NamedTempFile;

    use crate::io::part_reader::{Builder, PartData, PartReader};
    use crate::io::InputStream;
    use crate::plan::ChunkPlanner;

    const DATA: &str = "a lep is a ball, a tay is a hammer, a flix is a comb";

    fn reader(stream: InputStream, start: u64, end: Option<u64>, chunk_size: u64) -> PartReader {
        Builder::new()
            .stream(stream)
            .planner(ChunkPlanner::new(start, end, chunk_size).unwrap())
            .build()
    }

    async fn collect_parts(reader: PartReader) -> Vec<PartData> {
        let mut parts = Vec::new();
        let mut expected_seq = 0;
        while let Some(part) = reader.next_part().await.unwrap() {
            assert_eq!(expected_seq, part.chunk.sequence_index);
            assert_eq!(part.chunk.length, part.data.len() as u64);
            expected_seq += 1;
            parts.push(part);
        }
        parts
    }

    fn contents(parts: &[PartData]) -> Vec<&[u8]> {
        parts.iter().map(|p| p.data.chunk()).collect()
    }

    #[tokio::test]
    async fn test_bytes_part_reader() {
        let data = Bytes::from(DATA);
        let stream = InputStream::from(data.clone());
        let expected = data.chunks(5).collect::<Vec<_>>();
        let parts = collect_parts(reader(stream, 0, Some(data.len() as u64), 5)).await;

        assert_eq!(expected, contents(&parts));
        assert!(parts.last().unwrap().is_last);
        assert_eq!(1, parts.iter().filter(|p| p.is_last).count());
    }

    #[tokio::test]
    async fn test_bytes_part_reader_with_start_offset() {
        let data = Bytes::from(DATA);
        let stream = InputStream::from(data.clone());
        let parts = collect_parts(reader(stream, 8, Some(20), 5)).await;
        assert_eq!(vec![b" a ba", b"ll, a", b" t".as_slice()], contents(&parts));
        assert_eq!(8, parts[0].chunk.offset);
    }

    async fn path_reader_test(limit: Option<usize>, offset: Option<usize>) {
        let part_size = 5;
        let mut tmp = NamedTempFile::new().unwrap();
        let mut data = Bytes::from(DATA);
        tmp.write_all(data.chunk()).unwrap();

        let mut builder = InputStream::read_from().path(tmp.path());
        if let Some(limit) = limit {
            data.truncate(limit);
            builder = builder.length((limit - offset.unwrap_or_default()) as u64);
        }

        if let Some(offset) = offset {
            data.advance(offset);
            builder = builder.offset(offset as u64);
        }

        let expected = data.chunks(part_size).collect::<Vec<_>>();

        let stream = builder.build().unwrap();
        let len = stream.size_hint().exact_size();
        let parts = collect_parts(reader(stream, 0, len, part_size as u64)).await;

        assert_eq!(expected, contents(&parts));
    }

    #[tokio::test]
    async fn test_path_part_reader() {
        path_reader_test(None, None).await;
    }

    #[tokio::test]
    async fn test_path_part_reader_with_offset() {
        path_reader_test(None, Some(8)).await;
    }

    #[tokio::test]
    async fn test_path_part_reader_with_explicit_length() {
        path_reader_test(Some(12), None).await;
    }

    #[tokio::test]
    async fn test_path_part_reader_with_length_and_offset() {
        path_reader_test(Some(23), Some(4)).await;
    }

    #[tokio::test]
    async fn test_dyn_reader_unknown_size() {
        let mock = tokio_test::io::Builder::new()
            .read(&[1; 512])
            .read(&[2; 512])
            .read(&[3; 512])
            .read(&[4; 38])
            .build();
        let stream = InputStream::from_reader(mock);
        let parts = collect_parts(reader(stream, 0, None, 512)).await;
        let lens = parts.iter().map(|p| p.chunk.length).collect::<Vec<_>>();
        assert_eq!(vec![512, 512, 512, 38], lens);
        assert_eq!(1536, parts[3].chunk.offset);
        assert!(parts[3].is_last);
        assert!(!parts[2].is_last);
    }

    #[tokio::test]
    async fn test_dyn_reader_partial_reads_are_buffered() {
        let mock = tokio_test::io::Builder::new()
            .read(b"hel")
            .read(b"lo wor")
            .read(b"ld")
            .build();
        let stream = InputStream::from_reader(mock);
        let parts = collect_parts(reader(stream, 0, None, 5)).await;
        assert_eq!(
            vec![b"hello", b" worl", b"d".as_slice()],
            contents(&parts)
        );
    }

    #[tokio::test]
    async fn test_dyn_reader_ends_on_chunk_boundary() {
        let stream = InputStream::from_reader(&b"0123456789"[..]);
        let reader = reader(stream, 0, None, 5);
        let parts = collect_parts(reader).await;
        assert_eq!(2, parts.len());
        // the end is only observed by the zero byte read
        assert!(!parts[1].is_last);
    }

    #[tokio::test]
    async fn test_dyn_reader_known_length_short_source() {
        let stream = InputStream::from_reader_with_length(&b"0123456789"[..], 12);
        let reader = reader(stream, 0, Some(12), 5);
        reader.next_part().await.unwrap().unwrap();
        reader.next_part().await.unwrap().unwrap();
        reader.next_part().await.unwrap_err();
    }

    #[tokio::test]
    async fn test_skipped_chunks() {
        let data = Bytes::from(DATA);
        let skip = HashSet::from([0, 2]);

        let positioned = Builder::new()
            .stream(InputStream::from(data.clone()))
            .planner(ChunkPlanner::new(0, Some(20), 5).unwrap())
            .skip(skip.clone())
            .build();
        let sequential = Builder::new()
            .stream(InputStream::from_reader_with_length(
                std::io::Cursor::new(data.to_vec()),
                20,
            ))
            .planner(ChunkPlanner::new(0, Some(20), 5).unwrap())
            .skip(skip)
            .build();

        for reader in [positioned, sequential] {
            let mut parts = Vec::new();
            while let Some(part) = reader.next_part().await.unwrap() {
                parts.push(part);
            }
            let seqs = parts
                .iter()
                .map(|p| p.chunk.sequence_index)
                .collect::<Vec<_>>();
            assert_eq!(vec![1, 3], seqs);
            assert_eq!(vec![b" is a", b", a t".as_slice()], contents(&parts));
        }
    }
}
