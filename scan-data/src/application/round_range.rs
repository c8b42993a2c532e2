// This file is part of canton-scan.
// Copyright (C) 2025 Canton Scan contributors
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::{RoundEntry, RoundRange};
use futures::{StreamExt, TryStreamExt, stream};
use log::{debug, warn};
use metrics::counter;
use scan_common::{error::BoxError, stream::ordered_chunks};
use serde::Deserialize;
use std::{error::Error as StdError, future::Future, num::NonZeroU64};
use thiserror::Error;

/// Round-range fetching configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Maximum number of rounds per request.
    #[serde(default = "chunk_size_default")]
    pub chunk_size: u64,

    /// Maximum number of requests in flight; one means sequential.
    #[serde(default = "concurrency_default")]
    pub concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: chunk_size_default(),
            concurrency: concurrency_default(),
        }
    }
}

/// Fetch the entries for the given range by partitioning it into sub-ranges of at most
/// `chunk_size` rounds, fetching them with at most `concurrency` requests in flight and
/// concatenating the entries in ascending sub-range order.
///
/// Entries outside the sub-range they were requested for are dropped. Any failing sub-range
/// fails the whole fetch.
pub async fn fetch_range<T, E, F, Fut>(
    range: RoundRange,
    chunk_size: u64,
    concurrency: usize,
    fetch_chunk: F,
) -> Result<Vec<T>, RangeFetchError>
where
    T: RoundEntry,
    E: StdError + Send + Sync + 'static,
    F: Fn(RoundRange) -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
{
    let chunk_size = NonZeroU64::new(chunk_size).ok_or(RangeFetchError::ChunkSize)?;
    debug!(range:%, chunk_size, concurrency; "fetching round range");

    let fetches = stream::iter(range.chunks(chunk_size)).map(|chunk| {
        let entries = fetch_chunk(chunk);

        async move {
            counter!("scan_range_chunks_total").increment(1);

            let mut entries = entries.await.map_err(|error| RangeFetchError::Chunk {
                range: chunk,
                source: error.into(),
            })?;

            let len = entries.len();
            entries.retain(|entry| chunk.contains(entry.round()));
            if entries.len() < len {
                warn!(
                    range:% = chunk,
                    dropped = len - entries.len();
                    "dropped entries outside of requested range"
                );
            }

            entries.sort_by_key(|entry| entry.round());
            Ok::<_, RangeFetchError>(entries)
        }
    });

    ordered_chunks(fetches, concurrency).try_collect().await
}

#[derive(Debug, Error)]
pub enum RangeFetchError {
    #[error("chunk size must be at least one")]
    ChunkSize,

    #[error("cannot fetch rounds {range}")]
    Chunk {
        range: RoundRange,
        source: BoxError,
    },
}

fn chunk_size_default() -> u64 {
    100
}

fn concurrency_default() -> usize {
    4
}
