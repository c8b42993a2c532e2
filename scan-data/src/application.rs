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

pub mod admin;
pub mod aggregation;
pub mod governance;
pub mod logs;
pub mod query_cache;
pub mod round_range;
pub mod scope;
pub mod snapshot_selector;

#[cfg(test)]
pub(crate) mod testing;

use crate::{
    application::{
        admin::AdminError,
        aggregation::AggregationError,
        governance::GovernanceError,
        query_cache::{QueryCache, QueryError, QueryKey, QueryOptions},
        round_range::RangeFetchError,
        snapshot_selector::SelectorError,
    },
    domain::{
        AggregationResult, AnsEntry, Amount, BackendFunctions, CipTally, DsoInfo,
        FeaturedAppTally, LatestRound, PartyRewards, PurgeSummary, RoundPartyTotals, RoundRange,
        RoundTotals, ScanApi, Snapshot, SnapshotLog, SnapshotSet, SvRewardsRequest,
        SvRewardsSummary, TemplateStat, TransactionPage, ValidatorLiveness, storage::Storage,
    },
};
use futures::Stream;
use scan_common::domain::{LogicalSuffix, RoundNumber, SnapshotId};
use serde::Deserialize;
use serde_json::Value;
use std::{sync::Arc, time::Duration};

/// Queries derived from snapshot data, invalidated after a purge.
const SNAPSHOT_QUERIES: &[&str] = &[
    "latest_snapshot",
    "current_snapshot_set",
    "lineage",
    "aggregate",
    "aggregate_latest",
    "template_stats",
];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "aggregation", default)]
    pub aggregation_config: aggregation::Config,

    #[serde(rename = "round_range", default)]
    pub round_range_config: round_range::Config,

    #[serde(rename = "query_cache", default)]
    pub query_cache_config: query_cache::Config,

    #[serde(with = "humantime_serde", default = "log_poll_interval_default")]
    pub log_poll_interval: Duration,

    #[serde(default = "log_batch_size_default")]
    pub log_batch_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aggregation_config: Default::default(),
            round_range_config: Default::default(),
            query_cache_config: Default::default(),
            log_poll_interval: log_poll_interval_default(),
            log_batch_size: log_batch_size_default(),
        }
    }
}

/// Entry point for pages: every read goes through the shared [QueryCache]. Cheap to clone, clones
/// share the cache.
#[derive(Clone)]
pub struct ScanData<S, A, F> {
    config: Arc<Config>,
    storage: S,
    scan_api: A,
    functions: F,
    cache: QueryCache,
}

impl<S, A, F> ScanData<S, A, F>
where
    S: Storage,
    A: ScanApi,
    F: BackendFunctions,
{
    pub fn new(config: Config, storage: S, scan_api: A, functions: F) -> Self {
        let cache = QueryCache::new(config.query_cache_config.clone());

        Self {
            config: Arc::new(config),
            storage,
            scan_api,
            functions,
            cache,
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub async fn latest_snapshot(&self) -> Result<Option<Snapshot>, QueryError<SelectorError>> {
        self.cache
            .fetch(
                QueryKey::new("latest_snapshot", ""),
                QueryOptions::default(),
                || snapshot_selector::latest_snapshot(&self.storage),
            )
            .await
    }

    pub async fn current_snapshot_set(
        &self,
    ) -> Result<Option<SnapshotSet>, QueryError<SelectorError>> {
        self.cache
            .fetch(
                QueryKey::new("current_snapshot_set", ""),
                QueryOptions::default(),
                || snapshot_selector::current_snapshot_set(&self.storage),
            )
            .await
    }

    pub async fn lineage(
        &self,
        snapshot_id: &SnapshotId,
    ) -> Result<SnapshotSet, QueryError<SelectorError>> {
        self.cache
            .fetch_with(
                QueryKey::new("lineage", snapshot_id),
                QueryOptions::default(),
                || snapshot_selector::lineage(&self.storage, snapshot_id),
                SelectorError::is_transient,
            )
            .await
    }

    pub async fn aggregate(
        &self,
        snapshot_id: &SnapshotId,
        suffix: &LogicalSuffix,
    ) -> Result<AggregationResult, QueryError<AggregationError>> {
        self.cache
            .fetch_with(
                QueryKey::new("aggregate", format!("{snapshot_id}/{suffix}")),
                QueryOptions::default(),
                || {
                    aggregation::aggregate(
                        &self.storage,
                        &self.config.aggregation_config,
                        snapshot_id,
                        suffix,
                    )
                },
                AggregationError::is_transient,
            )
            .await
    }

    /// Aggregation against the live contracts; always refetched, the cached value only serves
    /// [QueryCache::peek].
    pub async fn aggregate_realtime(
        &self,
        suffix: &LogicalSuffix,
    ) -> Result<AggregationResult, QueryError<AggregationError>> {
        self.cache
            .fetch(
                QueryKey::new("aggregate_realtime", suffix),
                QueryOptions::default().with_stale_time(Duration::ZERO),
                || {
                    aggregation::aggregate_realtime(
                        &self.storage,
                        &self.config.aggregation_config,
                        suffix,
                    )
                },
            )
            .await
    }

    pub async fn aggregate_latest(
        &self,
        suffix: &LogicalSuffix,
    ) -> Result<Option<AggregationResult>, QueryError<AggregationError>> {
        self.cache
            .fetch_with(
                QueryKey::new("aggregate_latest", suffix),
                QueryOptions::default(),
                || {
                    aggregation::aggregate_latest(
                        &self.storage,
                        &self.config.aggregation_config,
                        suffix,
                    )
                },
                AggregationError::is_transient,
            )
            .await
    }

    pub async fn template_stats(
        &self,
        snapshot_id: &SnapshotId,
    ) -> Result<Vec<TemplateStat>, QueryError<AggregationError>> {
        self.cache
            .fetch(
                QueryKey::new("template_stats", snapshot_id),
                QueryOptions::default(),
                || aggregation::template_stats(&self.storage, snapshot_id),
            )
            .await
    }

    pub async fn round_totals(
        &self,
        range: RoundRange,
    ) -> Result<Vec<RoundTotals>, QueryError<RangeFetchError>> {
        let round_range::Config {
            chunk_size,
            concurrency,
        } = self.config.round_range_config;

        self.cache
            .fetch(
                QueryKey::new("round_totals", range),
                QueryOptions::default(),
                || {
                    round_range::fetch_range(range, chunk_size, concurrency, |chunk| {
                        self.scan_api.round_totals(chunk)
                    })
                },
            )
            .await
    }

    pub async fn round_party_totals(
        &self,
        range: RoundRange,
    ) -> Result<Vec<RoundPartyTotals>, QueryError<RangeFetchError>> {
        let round_range::Config {
            chunk_size,
            concurrency,
        } = self.config.round_range_config;

        self.cache
            .fetch(
                QueryKey::new("round_party_totals", range),
                QueryOptions::default(),
                || {
                    round_range::fetch_range(range, chunk_size, concurrency, |chunk| {
                        self.scan_api.round_party_totals(chunk)
                    })
                },
            )
            .await
    }

    pub async fn latest_round(&self) -> Result<LatestRound, QueryError<A::Error>> {
        self.cache
            .fetch(
                QueryKey::new("latest_round", ""),
                QueryOptions::default(),
                || self.scan_api.latest_round(),
            )
            .await
    }

    pub async fn total_balance(
        &self,
        as_of_end_of_round: RoundNumber,
    ) -> Result<Amount, QueryError<A::Error>> {
        self.cache
            .fetch(
                QueryKey::new("total_balance", as_of_end_of_round),
                QueryOptions::default(),
                || self.scan_api.total_balance(as_of_end_of_round),
            )
            .await
    }

    pub async fn top_validators(
        &self,
        round: RoundNumber,
        limit: u32,
    ) -> Result<Vec<PartyRewards>, QueryError<A::Error>> {
        self.cache
            .fetch(
                QueryKey::new("top_validators", format!("{round}/{limit}")),
                QueryOptions::default(),
                || self.scan_api.top_validators(round, limit),
            )
            .await
    }

    pub async fn top_providers(
        &self,
        round: RoundNumber,
        limit: u32,
    ) -> Result<Vec<PartyRewards>, QueryError<A::Error>> {
        self.cache
            .fetch(
                QueryKey::new("top_providers", format!("{round}/{limit}")),
                QueryOptions::default(),
                || self.scan_api.top_providers(round, limit),
            )
            .await
    }

    pub async fn transactions(
        &self,
        page: TransactionPage,
    ) -> Result<Vec<Value>, QueryError<A::Error>> {
        let params = format!(
            "{}/{}/{}",
            page.page_end_event_id.as_deref().unwrap_or_default(),
            page.sort_order,
            page.page_size
        );

        self.cache
            .fetch(
                QueryKey::new("transactions", params),
                QueryOptions::default(),
                || self.scan_api.transactions(page.clone()),
            )
            .await
    }

    pub async fn dso(&self) -> Result<DsoInfo, QueryError<A::Error>> {
        self.cache
            .fetch(
                QueryKey::new("dso", ""),
                QueryOptions::default(),
                || self.scan_api.dso(),
            )
            .await
    }

    pub async fn vote_requests(&self) -> Result<Vec<Value>, QueryError<A::Error>> {
        self.cache
            .fetch(
                QueryKey::new("vote_requests", ""),
                QueryOptions::default(),
                || self.scan_api.vote_requests(),
            )
            .await
    }

    pub async fn ans_entries(
        &self,
        page_size: u32,
        name_prefix: Option<String>,
    ) -> Result<Vec<AnsEntry>, QueryError<A::Error>> {
        let params = format!(
            "{page_size}/{}",
            name_prefix.as_deref().unwrap_or_default()
        );

        self.cache
            .fetch(
                QueryKey::new("ans_entries", params),
                QueryOptions::default(),
                || self.scan_api.ans_entries(page_size, name_prefix.clone()),
            )
            .await
    }

    pub async fn featured_apps(&self) -> Result<Vec<Value>, QueryError<A::Error>> {
        self.cache
            .fetch(
                QueryKey::new("featured_apps", ""),
                QueryOptions::default(),
                || self.scan_api.featured_apps(),
            )
            .await
    }

    pub async fn validator_liveness(
        &self,
        validator_ids: Vec<String>,
    ) -> Result<Vec<ValidatorLiveness>, QueryError<A::Error>> {
        self.cache
            .fetch(
                QueryKey::new("validator_liveness", validator_ids.join(",")),
                QueryOptions::default(),
                || self.scan_api.validator_liveness(validator_ids.clone()),
            )
            .await
    }

    pub async fn cip_overview(&self) -> Result<Vec<CipTally>, QueryError<GovernanceError>> {
        self.cache
            .fetch(
                QueryKey::new("cip_overview", ""),
                QueryOptions::default(),
                || governance::cip_overview(&self.storage, &self.scan_api),
            )
            .await
    }

    pub async fn featured_app_tallies(
        &self,
    ) -> Result<Vec<FeaturedAppTally>, QueryError<GovernanceError>> {
        self.cache
            .fetch(
                QueryKey::new("featured_app_tallies", ""),
                QueryOptions::default(),
                || governance::featured_app_tallies(&self.storage),
            )
            .await
    }

    /// Realtime stream of the log lines of the given snapshot, not cached.
    pub fn watch_snapshot_logs(
        &self,
        snapshot_id: SnapshotId,
    ) -> impl Stream<Item = Result<SnapshotLog, sqlx::Error>> + use<S, A, F> {
        logs::watch_snapshot_logs(
            self.storage.clone(),
            snapshot_id,
            self.config.log_poll_interval,
            self.config.log_batch_size,
        )
    }

    /// Purge all snapshot data on behalf of the given admin user and drop all cached snapshot
    /// queries. Never retried.
    pub async fn purge_all(&self, user_id: &str) -> Result<PurgeSummary, AdminError> {
        let summary = admin::purge_all(&self.storage, &self.functions, user_id).await?;

        for query in SNAPSHOT_QUERIES {
            self.cache.invalidate_query(query);
        }

        Ok(summary)
    }

    pub async fn sv_rewards_summary(
        &self,
        request: SvRewardsRequest,
    ) -> Result<SvRewardsSummary, AdminError> {
        admin::sv_rewards_summary(&self.functions, request).await
    }
}

fn log_poll_interval_default() -> Duration {
    Duration::from_secs(2)
}

fn log_batch_size_default() -> u32 {
    500
}
