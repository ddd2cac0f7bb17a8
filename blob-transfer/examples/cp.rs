/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time;

use blob_transfer::error::BoxError;
use blob_transfer::io::{InputStream, OutputStream};
use blob_transfer::progress::ProgressEvent;
use blob_transfer::transport::in_memory::InMemoryTransport;
use blob_transfer::types::{ConcurrencySetting, ObjectLayout, PartSize};
use clap::Parser;
use tracing::{debug_span, Instrument};

const ONE_MEGABYTE: u64 = 1000 * 1000;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum Layout {
    Blocks,
    Ranges,
}

impl From<Layout> for ObjectLayout {
    fn from(value: Layout) -> Self {
        match value {
            Layout::Blocks => ObjectLayout::Blocks,
            Layout::Ranges => ObjectLayout::Ranges,
        }
    }
}

#[derive(Debug, Clone, clap::Parser)]
#[command(name = "cp")]
#[command(
    about = "Copies a local file to another location by uploading it to an in-memory store and downloading it again."
)]
pub struct Args {
    /// Local file to copy from
    #[arg(required = true)]
    source: PathBuf,

    /// Local file to copy to
    #[arg(required = true)]
    dest: PathBuf,

    /// Number of concurrent chunk transfers to perform.
    #[arg(long, default_value_t = 8)]
    concurrency: usize,

    /// Chunk size to use
    #[arg(long, default_value_t = 8388608)]
    chunk_size: u64,

    /// Largest payload sent in a single request
    #[arg(long, default_value_t = 8388608)]
    single_shot_threshold: u64,

    /// How the object is assembled in the store
    #[arg(long, value_enum, default_value_t = Layout::Blocks)]
    layout: Layout,

    /// Print a line for every completed chunk
    #[arg(long, default_value_t = false, action = clap::ArgAction::SetTrue)]
    progress: bool,
}

fn report(verb: &str, size_bytes: u64, elapsed: time::Duration) {
    let size_megabytes = size_bytes as f64 / ONE_MEGABYTE as f64;
    let size_megabits = size_megabytes * 8f64;
    println!(
        "{verb} {size_bytes} bytes ({size_megabytes} MB) in {elapsed:?}; Mb/s: {}",
        size_megabits / elapsed.as_secs_f64()
    );
}

fn print_progress(event: ProgressEvent) -> Result<(), BoxError> {
    match event.total {
        Some(total) => println!("{}/{total} bytes", event.bytes_completed),
        None => println!("{} bytes", event.bytes_completed),
    }
    Ok(())
}

async fn do_copy(args: Args) -> Result<(), BoxError> {
    let config = blob_transfer::from_env()
        .concurrency(ConcurrencySetting::Explicit(args.concurrency))
        .chunk_size(PartSize::Target(args.chunk_size))
        .single_shot_threshold(PartSize::Target(args.single_shot_threshold))
        .load(Arc::new(InMemoryTransport::new()));
    let tm = blob_transfer::Client::new(config);
    let target = args.source.to_string_lossy().into_owned();

    println!("starting upload");
    let start = time::Instant::now();
    let mut upload = tm
        .upload()
        .target(&target)
        .body(InputStream::from_path(&args.source)?)
        .layout(args.layout.into());
    if args.progress {
        upload = upload.on_progress(print_progress);
    }
    let output = upload
        .initiate()?
        .join()
        .instrument(debug_span!("upload"))
        .await?;
    report("uploaded", output.size(), start.elapsed());

    println!("starting download");
    let start = time::Instant::now();
    let mut download = tm
        .download()
        .target(&target)
        .destination(OutputStream::to_path(&args.dest));
    if args.progress {
        download = download.on_progress(print_progress);
    }
    let output = download
        .initiate()?
        .join()
        .instrument(debug_span!("download"))
        .await?;
    report("downloaded", output.size(), start.elapsed());

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_thread_ids(true)
        .init();

    if let Err(ref err) = do_copy(args).await {
        tracing::error!("transfer failed: {err}");
        let mut source = err.source();
        while let Some(cause) = source {
            tracing::error!("caused by: {cause}");
            source = cause.source();
        }
    }

    Ok(())
}
