/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::str::FromStr;
use std::sync::Arc;

use crate::config::Builder;
use crate::transport::Transport;
use crate::types::{ConcurrencySetting, PartSize};
use crate::Config;

const ENV_CHUNK_SIZE: &str = "BLOB_TRANSFER_CHUNK_SIZE";
const ENV_SINGLE_SHOT_THRESHOLD: &str = "BLOB_TRANSFER_SINGLE_SHOT_THRESHOLD";
const ENV_CONCURRENCY: &str = "BLOB_TRANSFER_CONCURRENCY";

/// Load transfer [`Config`] from the environment.
///
/// The following variables are read when the corresponding setting was not given explicitly:
///
/// * `BLOB_TRANSFER_CHUNK_SIZE` - chunk size in bytes
/// * `BLOB_TRANSFER_SINGLE_SHOT_THRESHOLD` - single-shot threshold in bytes
/// * `BLOB_TRANSFER_CONCURRENCY` - concurrent chunk transfers per operation
#[derive(Default, Debug)]
pub struct ConfigLoader {
    builder: Builder,
    chunk_size: Option<PartSize>,
    single_shot_threshold: Option<PartSize>,
    concurrency: Option<ConcurrencySetting>,
}

impl ConfigLoader {
    /// Largest payload that is transferred with a single request instead of being chunked.
    ///
    /// Default is [PartSize::Auto]
    pub fn single_shot_threshold(mut self, threshold: PartSize) -> Self {
        self.single_shot_threshold = Some(threshold);
        self
    }

    /// The target size of each chunk.
    ///
    /// Default is [PartSize::Auto]
    pub fn chunk_size(mut self, chunk_size: PartSize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Set the concurrency level individual transfers are allowed to use.
    ///
    /// Default is [ConcurrencySetting::Auto].
    pub fn concurrency(mut self, concurrency: ConcurrencySetting) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    /// Load the configuration
    ///
    /// If fields have been overridden during builder construction, the override values will be
    /// used. Otherwise, values from the environment are used and the default value for each field
    /// if the environment does not set it.
    pub fn load(self, transport: Arc<dyn Transport>) -> Config {
        let chunk_size = self
            .chunk_size
            .or_else(|| env_value(ENV_CHUNK_SIZE).map(PartSize::Target))
            .unwrap_or_default();
        let single_shot_threshold = self
            .single_shot_threshold
            .or_else(|| env_value(ENV_SINGLE_SHOT_THRESHOLD).map(PartSize::Target))
            .unwrap_or_default();
        let concurrency = self
            .concurrency
            .or_else(|| env_value(ENV_CONCURRENCY).map(ConcurrencySetting::Explicit))
            .unwrap_or_default();

        self.builder
            .chunk_size(chunk_size)
            .single_shot_threshold(single_shot_threshold)
            .concurrency(concurrency)
            .transport(transport)
            .build()
    }
}

fn env_value<T: FromStr>(name: &str) -> Option<T> {
    let value = std::env::var(name).ok()?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!("ignoring invalid value `{value}` for {name}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::transport::in_memory::InMemoryTransport;
    use crate::types::{ConcurrencySetting, PartSize};

    #[test]
    fn test_explicit_settings_win() {
        let config = crate::from_env()
            .chunk_size(PartSize::Target(1024))
            .single_shot_threshold(PartSize::Target(0))
            .concurrency(ConcurrencySetting::Explicit(8))
            .load(Arc::new(InMemoryTransport::new()));
        assert!(matches!(config.chunk_size(), PartSize::Target(1024)));
        assert!(matches!(config.single_shot_threshold(), PartSize::Target(0)));
        assert!(matches!(
            config.concurrency(),
            ConcurrencySetting::Explicit(8)
        ));
    }
}
