/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;
use std::time::Duration;

use blob_transfer::error::ErrorKind;
use blob_transfer::io::OutputStream;
use blob_transfer::progress::ProgressEvent;
use blob_transfer::transport::Transport;
use blob_transfer::types::{ByteRange, ConcurrencySetting, PartSize};
use bytes::Bytes;
use test_common::{
    init_logging, random_bytes, Call, CollectingWriter, ProgressCollector, RecordingTransport,
};

const TARGET: &str = "test-blob";

async fn transport_with_object(transport: RecordingTransport, data: &Bytes) -> Arc<RecordingTransport> {
    transport
        .store()
        .put_blob(TARGET, data.clone())
        .await
        .unwrap();
    Arc::new(transport)
}

/// Client that chunks every non-empty download
fn client(transport: &Arc<RecordingTransport>, chunk_size: u64, concurrency: usize) -> blob_transfer::Client {
    let config = blob_transfer::Config::builder()
        .single_shot_threshold(PartSize::Target(0))
        .chunk_size(PartSize::Target(chunk_size))
        .concurrency(ConcurrencySetting::Explicit(concurrency))
        .transport(transport.clone())
        .build();
    blob_transfer::Client::new(config)
}

fn ranges_read(transport: &RecordingTransport) -> Vec<ByteRange> {
    transport
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::GetRange { range, .. } => Some(range),
            _ => None,
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_download_for_concurrency_and_chunk_sizes() {
    init_logging();
    let data = random_bytes(1574);
    for concurrency in [1, 3, 8] {
        for chunk_size in [7, 512, 4096] {
            let transport =
                transport_with_object(RecordingTransport::new().with_jitter(2), &data).await;
            let output = client(&transport, chunk_size, concurrency)
                .download()
                .target(TARGET)
                .destination(OutputStream::memory())
                .initiate()
                .unwrap()
                .join()
                .await
                .unwrap();

            assert_eq!(Some(&data), output.body());
            assert_eq!(
                1574u64.div_ceil(chunk_size) as usize,
                ranges_read(&transport).len()
            );
            assert!(transport.max_in_flight() <= concurrency);
        }
    }
}

#[tokio::test]
async fn test_ranged_download() {
    let data = random_bytes(1574);
    let transport = transport_with_object(RecordingTransport::new(), &data).await;

    let output = client(&transport, 128, 1)
        .download()
        .target(TARGET)
        .start_offset(100)
        .count(472)
        .initiate()
        .unwrap()
        .join()
        .await
        .unwrap();

    assert_eq!(100, output.start_offset());
    assert_eq!(472, output.size());
    assert_eq!(Some(&data.slice(100..572)), output.body());
    assert_eq!(
        vec![
            ByteRange::new(100, 227).unwrap(),
            ByteRange::new(228, 355).unwrap(),
            ByteRange::new(356, 483).unwrap(),
            ByteRange::new(484, 571).unwrap(),
        ],
        ranges_read(&transport)
    );
}

#[tokio::test]
async fn test_count_is_clamped_to_object() {
    let data = random_bytes(1000);
    let transport = transport_with_object(RecordingTransport::new(), &data).await;

    let output = client(&transport, 256, 2)
        .download()
        .target(TARGET)
        .start_offset(900)
        .count(5000)
        .initiate()
        .unwrap()
        .join()
        .await
        .unwrap();
    assert_eq!(Some(&data.slice(900..)), output.body());
}

#[tokio::test]
async fn test_start_past_end_of_object() {
    let data = random_bytes(1000);
    let transport = transport_with_object(RecordingTransport::new(), &data).await;

    let err = client(&transport, 256, 1)
        .download()
        .target(TARGET)
        .start_offset(1001)
        .initiate()
        .unwrap()
        .join()
        .await
        .unwrap_err();
    assert_eq!(&ErrorKind::InputInvalid, err.kind());
    assert!(ranges_read(&transport).is_empty());
}

#[tokio::test]
async fn test_missing_object() {
    let transport = Arc::new(RecordingTransport::new());
    let err = client(&transport, 256, 1)
        .download()
        .target("missing")
        .initiate()
        .unwrap()
        .join()
        .await
        .unwrap_err();
    assert_eq!(&ErrorKind::NotFound, err.kind());
}

#[tokio::test]
async fn test_download_progress() {
    let data = random_bytes(1574);
    let transport = transport_with_object(RecordingTransport::new(), &data).await;
    let progress = ProgressCollector::new();

    client(&transport, 512, 1)
        .download()
        .target(TARGET)
        .progress_observer(progress.clone())
        .initiate()
        .unwrap()
        .join()
        .await
        .unwrap();

    let expected = [512, 1024, 1536, 1574]
        .into_iter()
        .map(|bytes_completed| ProgressEvent {
            bytes_completed,
            total: Some(1574),
        })
        .collect::<Vec<_>>();
    assert_eq!(expected, progress.events());
}

#[tokio::test]
async fn test_empty_object() {
    let transport = transport_with_object(RecordingTransport::new(), &Bytes::new()).await;
    let progress = ProgressCollector::new();

    let output = client(&transport, 512, 4)
        .download()
        .target(TARGET)
        .progress_observer(progress.clone())
        .initiate()
        .unwrap()
        .join()
        .await
        .unwrap();

    assert_eq!(Some(&Bytes::new()), output.body());
    assert!(ranges_read(&transport).is_empty());
    assert_eq!(
        vec![ProgressEvent {
            bytes_completed: 0,
            total: Some(0)
        }],
        progress.events()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_download_to_file() {
    let data = random_bytes(10_000);
    let transport = transport_with_object(RecordingTransport::new().with_jitter(2), &data).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("downloaded");

    let output = client(&transport, 999, 4)
        .download()
        .target(TARGET)
        .destination(OutputStream::to_path(&path))
        .initiate()
        .unwrap()
        .join()
        .await
        .unwrap();

    assert_eq!(None, output.body());
    assert_eq!(data.to_vec(), std::fs::read(&path).unwrap());
}

#[tokio::test]
async fn test_download_to_sequential_writer() {
    let data = random_bytes(1574);
    let transport = transport_with_object(RecordingTransport::new(), &data).await;
    let writer = CollectingWriter::new();

    client(&transport, 100, 1)
        .download()
        .target(TARGET)
        .destination(OutputStream::from_writer(writer.clone()))
        .initiate()
        .unwrap()
        .join()
        .await
        .unwrap();

    assert_eq!(data, writer.contents());
}

#[tokio::test]
async fn test_sequential_writer_with_parallel_concurrency_is_rejected() {
    let data = random_bytes(1574);
    let transport = transport_with_object(RecordingTransport::new(), &data).await;

    let err = client(&transport, 100, 4)
        .download()
        .target(TARGET)
        .destination(OutputStream::from_writer(CollectingWriter::new()))
        .initiate()
        .unwrap_err();

    assert_eq!(&ErrorKind::PositionedAccessRequired, err.kind());
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_failed_range_read() {
    let data = random_bytes(1574);
    let transport =
        transport_with_object(RecordingTransport::new().fail_range_read_at(1024), &data).await;

    let err = client(&transport, 512, 1)
        .download()
        .target(TARGET)
        .initiate()
        .unwrap()
        .join()
        .await
        .unwrap_err();

    assert_eq!(Some(2), err.failed_chunk());
    assert_eq!(3, ranges_read(&transport).len());
}

#[tokio::test]
async fn test_short_range_read_fails_chunk() {
    let data = random_bytes(1574);
    let transport = transport_with_object(RecordingTransport::new().short_range_reads(), &data).await;

    let err = client(&transport, 512, 1)
        .download()
        .target(TARGET)
        .initiate()
        .unwrap()
        .join()
        .await
        .unwrap_err();
    assert_eq!(Some(0), err.failed_chunk());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_abort_download() {
    let data = random_bytes(1000);
    let transport = transport_with_object(RecordingTransport::new().with_jitter(20), &data).await;

    let handle = client(&transport, 10, 2)
        .download()
        .target(TARGET)
        .initiate()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    handle.abort().await.unwrap();
    assert!(ranges_read(&transport).len() < 100);
}
