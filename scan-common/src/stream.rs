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

use futures::{Stream, StreamExt, stream};
use std::{future::Future, iter};

/// Flattens a stream of results of chunks of items into a stream of results of items.
pub fn flatten_chunks<T, E>(
    chunks: impl Stream<Item = Result<Vec<T>, E>>,
) -> impl Stream<Item = Result<T, E>> {
    chunks.flat_map(|chunk: Result<Vec<_>, E>| match chunk {
        Ok(chunk) => stream::iter(chunk.into_iter().map(Ok)).left_stream(),
        Err(error) => stream::iter(iter::once(Err(error))).right_stream(),
    })
}

/// Drives the given chunk fetches with at most `concurrency` of them in flight and yields their
/// items in the order of the chunks, not in the order the fetches complete. A `concurrency` of
/// zero is treated as one, i.e. sequential.
pub fn ordered_chunks<F, T, E>(
    fetches: impl Stream<Item = F>,
    concurrency: usize,
) -> impl Stream<Item = Result<T, E>>
where
    F: Future<Output = Result<Vec<T>, E>>,
{
    flatten_chunks(fetches.buffered(concurrency.max(1)))
}

#[cfg(test)]
mod tests {
    use crate::stream::{flatten_chunks, ordered_chunks};
    use assert_matches::assert_matches;
    use futures::{TryStreamExt, stream};
    use std::{convert::Infallible, time::Duration};

    #[tokio::test]
    async fn test_flatten_chunks() {
        let chunks = stream::iter(vec![Ok::<_, Infallible>(vec![0, 1, 2]), Ok(vec![3, 4])]);
        let rounds = flatten_chunks(chunks).try_collect::<Vec<_>>().await;
        assert_matches!(rounds, Ok(x) if x == vec![0, 1, 2, 3, 4]);

        let chunks = stream::iter(vec![Ok::<_, &'static str>(vec![0, 1]), Err("chunk failed")]);
        let mut rounds = flatten_chunks(chunks);
        assert_eq!(rounds.try_next().await, Ok(Some(0)));
        assert_eq!(rounds.try_next().await, Ok(Some(1)));
        assert_eq!(rounds.try_next().await, Err("chunk failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ordered_chunks() {
        // Earlier chunks complete later, yet the items come out in chunk order.
        let fetches = stream::iter((0..4u64).map(|n| async move {
            tokio::time::sleep(Duration::from_millis(100 * (4 - n))).await;
            Ok::<_, Infallible>(vec![n * 10, n * 10 + 1])
        }));
        let items = ordered_chunks(fetches, 4).try_collect::<Vec<_>>().await;
        assert_matches!(items, Ok(x) if x == vec![0, 1, 10, 11, 20, 21, 30, 31]);

        let fetches = stream::iter((0..2u64).map(|n| async move { Ok::<_, Infallible>(vec![n]) }));
        let items = ordered_chunks(fetches, 0).try_collect::<Vec<_>>().await;
        assert_matches!(items, Ok(x) if x == vec![0, 1]);
    }
}
