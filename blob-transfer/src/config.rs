/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Arc;

use crate::transport::Transport;
use crate::types::{ConcurrencySetting, PartSize};
use crate::MEBIBYTE;

/// Loading configuration from the environment
pub mod loader;

/// Maximum chunk size accepted by the service for a single block or range write
pub(crate) const MAX_CHUNK_SIZE_BYTES: u64 = 100 * MEBIBYTE;

/// Configuration for a [`Client`](crate::client::Client)
#[derive(Debug, Clone)]
pub struct Config {
    single_shot_threshold: PartSize,
    chunk_size: PartSize,
    concurrency: ConcurrencySetting,
    transport: Arc<dyn Transport>,
}

impl Config {
    /// Create a new `Config` builder
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Returns a reference to the largest payload size transferred with a single request
    pub fn single_shot_threshold(&self) -> &PartSize {
        &self.single_shot_threshold
    }

    /// Returns a reference to the target chunk size to use for transfer operations
    pub fn chunk_size(&self) -> &PartSize {
        &self.chunk_size
    }

    /// Returns the concurrency setting to use for individual transfer operations.
    pub fn concurrency(&self) -> &ConcurrencySetting {
        &self.concurrency
    }

    /// The transport used to send requests to the storage service.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}

/// Fluent style builder for [Config]
#[derive(Debug, Clone, Default)]
pub struct Builder {
    single_shot_threshold: PartSize,
    chunk_size: PartSize,
    concurrency: ConcurrencySetting,
    transport: Option<Arc<dyn Transport>>,
}

impl Builder {
    /// Largest payload that is transferred with a single request instead of being chunked.
    ///
    /// Default is [PartSize::Auto]
    pub fn single_shot_threshold(self, threshold: PartSize) -> Self {
        self.set_single_shot_threshold(threshold)
    }

    /// The target size of each chunk.
    ///
    /// Sizes are clamped to the range `1..=100 MiB`. All chunks except possibly the last one of a
    /// transfer have this size.
    ///
    /// Default is [PartSize::Auto]
    pub fn chunk_size(self, chunk_size: PartSize) -> Self {
        let chunk_size = match chunk_size {
            PartSize::Target(size) => PartSize::Target(size.clamp(1, MAX_CHUNK_SIZE_BYTES)),
            auto => auto,
        };

        self.set_chunk_size(chunk_size)
    }

    /// Single-shot threshold.
    ///
    /// NOTE: This does not validate the setting and is meant for internal use only.
    pub(crate) fn set_single_shot_threshold(mut self, threshold: PartSize) -> Self {
        self.single_shot_threshold = threshold;
        self
    }

    /// Target chunk size.
    ///
    /// NOTE: This does not validate the setting and is meant for internal use only.
    pub(crate) fn set_chunk_size(mut self, chunk_size: PartSize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the concurrency level individual transfers are allowed to use.
    ///
    /// This sets the maximum number of chunks in flight for one transfer.
    /// Default is [ConcurrencySetting::Auto].
    pub fn concurrency(mut self, concurrency: ConcurrencySetting) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the transport used to reach the storage service.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Consumes the builder and constructs a [`Config`](crate::config::Config)
    pub fn build(self) -> Config {
        Config {
            single_shot_threshold: self.single_shot_threshold,
            chunk_size: self.chunk_size,
            concurrency: self.concurrency,
            transport: self.transport.expect("transport set"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{Config, MAX_CHUNK_SIZE_BYTES};
    use crate::transport::in_memory::InMemoryTransport;
    use crate::types::PartSize;

    #[test]
    fn test_chunk_size_is_clamped() {
        let config = Config::builder()
            .chunk_size(PartSize::Target(0))
            .transport(Arc::new(InMemoryTransport::new()))
            .build();
        assert!(matches!(config.chunk_size(), PartSize::Target(1)));

        let config = Config::builder()
            .chunk_size(PartSize::Target(u64::MAX))
            .transport(Arc::new(InMemoryTransport::new()))
            .build();
        assert!(matches!(config.chunk_size(), PartSize::Target(size) if *size == MAX_CHUNK_SIZE_BYTES));
    }
}
