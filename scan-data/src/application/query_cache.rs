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

//! Keyed cache for query results.
//!
//! Every read of the data layer passes through the [QueryCache]: a value younger than the stale
//! time is served from memory, otherwise the query is (re)fetched. Failed fetches are retried
//! with exponential backoff. Entries not accessed within the GC time are evicted.

use derive_more::Display;
use log::{debug, warn};
use metrics::counter;
use parking_lot::Mutex;
use scan_common::error::StdErrorExt;
use serde::Deserialize;
use std::{
    any::Any, collections::HashMap, error::Error as StdError, future::Future, sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tokio::time::{Instant, sleep};

/// Query cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Age after which a cached value is refetched; zero means always refetch.
    #[serde(with = "humantime_serde", default = "stale_time_default")]
    pub stale_time: Duration,

    /// Entries not accessed for this long are evicted.
    #[serde(with = "humantime_serde", default = "gc_time_default")]
    pub gc_time: Duration,

    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stale_time: stale_time_default(),
            gc_time: gc_time_default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Bounded retries with exponential backoff.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "max_retries_default")]
    pub max_retries: u32,

    #[serde(with = "humantime_serde", default = "base_delay_default")]
    pub base_delay: Duration,

    #[serde(with = "humantime_serde", default = "max_delay_default")]
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before the retry following the given zero-based failed attempt:
    /// `base_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: max_retries_default(),
            base_delay: base_delay_default(),
            max_delay: max_delay_default(),
        }
    }
}

/// Per-call overrides of the cache [Config].
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions {
    pub stale_time: Option<Duration>,
    pub max_retries: Option<u32>,
}

impl QueryOptions {
    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    pub fn without_retry(mut self) -> Self {
        self.max_retries = Some(0);
        self
    }
}

/// Cache key: query name plus its stringified parameters.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash)]
#[display("{query}({params})")]
pub struct QueryKey {
    pub query: &'static str,
    pub params: String,
}

impl QueryKey {
    pub fn new(query: &'static str, params: impl ToString) -> Self {
        Self {
            query,
            params: params.to_string(),
        }
    }
}

/// Error returned by [QueryCache::fetch] once all attempts have failed; the source is the error
/// of the last attempt.
#[derive(Debug, Error)]
#[error("query {key} failed after {attempts} attempt(s)")]
pub struct QueryError<E>
where
    E: StdError + 'static,
{
    pub key: QueryKey,
    pub attempts: u32,
    pub source: E,
}

impl<E> QueryError<E>
where
    E: StdError + 'static,
{
    pub fn into_source(self) -> E {
        self.source
    }
}

/// Shared by clone; clones share the same entries.
#[derive(Clone)]
pub struct QueryCache {
    config: Config,
    entries: Arc<Mutex<HashMap<QueryKey, Entry>>>,
}

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    updated_at: Instant,
    accessed_at: Instant,
}

impl QueryCache {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            entries: Default::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Return the cached value for the given key if fresh, else run the given query, retrying
    /// failures according to the retry policy, and cache its value.
    pub async fn fetch<T, E, F, Fut>(
        &self,
        key: QueryKey,
        options: QueryOptions,
        query: F,
    ) -> Result<T, QueryError<E>>
    where
        T: Clone + Send + Sync + 'static,
        E: StdError + 'static,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.fetch_with(key, options, query, |_| true).await
    }

    /// Like [QueryCache::fetch], but only failures for which `retryable` holds are retried; others
    /// fail after the first attempt.
    pub async fn fetch_with<T, E, F, Fut, R>(
        &self,
        key: QueryKey,
        options: QueryOptions,
        query: F,
        retryable: R,
    ) -> Result<T, QueryError<E>>
    where
        T: Clone + Send + Sync + 'static,
        E: StdError + 'static,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
    {
        let stale_time = options.stale_time.unwrap_or(self.config.stale_time);
        let max_retries = options.max_retries.unwrap_or(self.config.retry.max_retries);

        if let Some(value) = self.fresh(&key, stale_time) {
            counter!("scan_query_cache_hits_total", "query" => key.query).increment(1);
            return Ok(value);
        }
        counter!("scan_query_cache_misses_total", "query" => key.query).increment(1);

        let mut attempt = 0;
        loop {
            match query().await {
                Ok(value) => {
                    self.insert(key, value.clone());
                    return Ok(value);
                }

                Err(error) if attempt < max_retries && retryable(&error) => {
                    let delay = self.config.retry.delay_for_attempt(attempt);
                    warn!(
                        key:%,
                        attempt,
                        delay:?,
                        error = error.as_chain();
                        "query failed, retrying"
                    );
                    counter!("scan_query_cache_retries_total", "query" => key.query).increment(1);

                    sleep(delay).await;
                    attempt += 1;
                }

                Err(error) => {
                    return Err(QueryError {
                        key,
                        attempts: attempt + 1,
                        source: error,
                    });
                }
            }
        }
    }

    /// The cached value for the given key regardless of its age, e.g. to degrade gracefully after
    /// a failed refetch.
    pub fn peek<T>(&self, key: &QueryKey) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        self.collect_garbage_locked(&mut entries, now);

        let entry = entries.get_mut(key)?;
        entry.accessed_at = now;
        entry.value.downcast_ref::<T>().cloned()
    }

    /// Drop the entry for the given key.
    pub fn invalidate(&self, key: &QueryKey) {
        self.entries.lock().remove(key);
    }

    /// Drop all entries of the given query, whatever their parameters.
    pub fn invalidate_query(&self, query: &str) {
        self.entries.lock().retain(|key, _| key.query != query);
    }

    /// Evict entries not accessed within the GC time.
    pub fn collect_garbage(&self) {
        let mut entries = self.entries.lock();
        self.collect_garbage_locked(&mut entries, Instant::now());
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn fresh<T>(&self, key: &QueryKey, stale_time: Duration) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        self.collect_garbage_locked(&mut entries, now);

        let entry = entries.get_mut(key)?;
        entry.accessed_at = now;
        (now.duration_since(entry.updated_at) < stale_time)
            .then(|| entry.value.downcast_ref::<T>().cloned())
            .flatten()
    }

    fn insert<T>(&self, key: QueryKey, value: T)
    where
        T: Send + Sync + 'static,
    {
        let now = Instant::now();
        let entry = Entry {
            value: Arc::new(value),
            updated_at: now,
            accessed_at: now,
        };
        self.entries.lock().insert(key, entry);
    }

    fn collect_garbage_locked(&self, entries: &mut HashMap<QueryKey, Entry>, now: Instant) {
        let gc_time = self.config.gc_time;
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.accessed_at) < gc_time);

        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted; "evicted inactive query cache entries");
            counter!("scan_query_cache_evictions_total").increment(evicted as u64);
        }
    }
}

fn stale_time_default() -> Duration {
    Duration::from_secs(30)
}

fn gc_time_default() -> Duration {
    Duration::from_secs(5 * 60)
}

fn max_retries_default() -> u32 {
    3
}

fn base_delay_default() -> Duration {
    Duration::from_secs(1)
}

fn max_delay_default() -> Duration {
    Duration::from_secs(5)
}
