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

//! Command line arguments and their execution against [ScanData].

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use futures::TryStreamExt;
use log::info;
use scan_common::domain::{LogicalSuffix, RoundNumber, SnapshotId};
use scan_data::{
    application::{ScanData, scope::PageScope},
    domain::{
        AggregationResult, BackendFunctions, CipTally, DsoInfo, LatestRound, RoundRange, ScanApi,
        Snapshot, SortOrder, SvRewardsRequest, TransactionPage, storage::Storage,
    },
};
use serde::Serialize;
use std::{collections::BTreeMap, io::Write, path::PathBuf};

const LOG_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file; defaults to `CONFIG_FILE` or `config.yaml`.
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the database migrations and exit.
    Migrate,

    /// The latest completed snapshot.
    LatestSnapshot,

    /// The lineage of the latest completed snapshot.
    SnapshotSet,

    /// The lineage of the given snapshot back to its baseline.
    Lineage {
        #[arg(long)]
        snapshot_id: String,
    },

    /// Aggregate the records of a logical template across package versions.
    Aggregate {
        /// Logical template suffix, e.g. `Splice.Amulet:Amulet`.
        #[arg(long)]
        suffix: LogicalSuffix,

        /// Snapshot to aggregate; the latest completed one by default.
        #[arg(long)]
        snapshot_id: Option<String>,

        /// Payload path to sum up; may be given multiple times.
        #[arg(long)]
        sum: Vec<String>,

        /// Payload path to count records by.
        #[arg(long)]
        count_by: Option<String>,

        /// Include the records themselves.
        #[arg(long)]
        records: bool,
    },

    /// Aggregate the live contracts of a logical template.
    AggregateLive {
        #[arg(long)]
        suffix: LogicalSuffix,

        #[arg(long)]
        sum: Vec<String>,

        #[arg(long)]
        count_by: Option<String>,

        #[arg(long)]
        records: bool,
    },

    /// Per-template contract counts of a snapshot.
    TemplateStats {
        #[arg(long)]
        snapshot_id: String,
    },

    /// Network wide totals for an inclusive range of rounds.
    RoundTotals {
        #[arg(long)]
        start: RoundNumber,

        #[arg(long)]
        end: RoundNumber,
    },

    /// Per party totals for an inclusive range of rounds.
    PartyTotals {
        #[arg(long)]
        start: RoundNumber,

        #[arg(long)]
        end: RoundNumber,
    },

    LatestRound,

    /// Total amulet balance as of the end of the given round, the latest by default.
    TotalBalance {
        #[arg(long)]
        round: Option<RoundNumber>,
    },

    TopValidators {
        #[arg(long)]
        round: Option<RoundNumber>,

        #[arg(long, default_value_t = 10)]
        limit: u32,
    },

    TopProviders {
        #[arg(long)]
        round: Option<RoundNumber>,

        #[arg(long, default_value_t = 10)]
        limit: u32,
    },

    Transactions {
        /// Event id ending the previous page.
        #[arg(long)]
        after: Option<String>,

        #[arg(long, default_value_t = 20)]
        page_size: u32,

        /// Newest first.
        #[arg(long)]
        desc: bool,
    },

    Dso,

    VoteRequests,

    AnsEntries {
        #[arg(long, default_value_t = 20)]
        page_size: u32,

        #[arg(long)]
        name_prefix: Option<String>,
    },

    FeaturedApps,

    /// Faucet collection statistics of the given validators.
    Liveness {
        #[arg(long = "validator", required = true)]
        validator_ids: Vec<String>,
    },

    /// CIPs with their vote tallies.
    Cips,

    /// Featured app votes, tallied per app.
    FeaturedAppVotes,

    /// Latest round, latest snapshot, DSO and CIPs, fetched concurrently.
    Overview,

    /// Follow the logs of a snapshot until it is no longer processing.
    WatchLogs {
        #[arg(long)]
        snapshot_id: String,
    },

    /// Delete all captured snapshot data; requires the admin role.
    Purge {
        #[arg(long)]
        user_id: String,
    },

    /// Summary of the reward coupons of a super validator beneficiary.
    SvRewards {
        #[arg(long)]
        beneficiary: String,

        #[arg(long)]
        begin_record_time: DateTime<Utc>,

        #[arg(long)]
        end_record_time: DateTime<Utc>,

        #[arg(long)]
        begin_migration_id: u64,

        #[arg(long)]
        end_migration_id: u64,

        #[arg(long)]
        weight: f64,

        #[arg(long, default_value_t = 0.0)]
        already_minted_weight: f64,
    },
}

#[derive(Debug, Serialize)]
struct AggregationOutput {
    #[serde(flatten)]
    result: AggregationResult,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    sums: BTreeMap<String, f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    counts: Option<BTreeMap<String, usize>>,
}

impl AggregationOutput {
    fn new(
        mut result: AggregationResult,
        sum: Vec<String>,
        count_by: Option<String>,
        records: bool,
    ) -> Self {
        let sums = sum
            .into_iter()
            .map(|path| {
                let total = result.sum(&[path.as_str()]);
                (path, total)
            })
            .collect();
        let counts = count_by.map(|path| result.count_by(&[path.as_str()]));

        if !records {
            result.records.clear();
        }

        Self {
            result,
            sums,
            counts,
        }
    }
}

#[derive(Debug, Serialize)]
struct Overview {
    latest_round: LatestRound,
    latest_snapshot: Option<Snapshot>,
    dso: DsoInfo,
    cips: Vec<CipTally>,
}

/// Execute the given command, writing its result as JSON to `out`. Commands not needing any data,
/// i.e. [Command::Migrate], are no-ops.
pub async fn execute<S, A, F>(
    command: Command,
    data: ScanData<S, A, F>,
    mut out: impl Write,
) -> anyhow::Result<()>
where
    S: Storage,
    A: ScanApi,
    F: BackendFunctions,
{
    match command {
        Command::Migrate => Ok(()),

        Command::LatestSnapshot => print(&mut out, &data.latest_snapshot().await?),

        Command::SnapshotSet => print(&mut out, &data.current_snapshot_set().await?),

        Command::Lineage { snapshot_id } => {
            print(&mut out, &data.lineage(&SnapshotId(snapshot_id)).await?)
        }

        Command::Aggregate {
            suffix,
            snapshot_id,
            sum,
            count_by,
            records,
        } => {
            let result = match snapshot_id {
                Some(snapshot_id) => {
                    Some(data.aggregate(&SnapshotId(snapshot_id), &suffix).await?)
                }
                None => data.aggregate_latest(&suffix).await?,
            };
            let output =
                result.map(|result| AggregationOutput::new(result, sum, count_by, records));
            print(&mut out, &output)
        }

        Command::AggregateLive {
            suffix,
            sum,
            count_by,
            records,
        } => {
            let result = data.aggregate_realtime(&suffix).await?;
            print(
                &mut out,
                &AggregationOutput::new(result, sum, count_by, records),
            )
        }

        Command::TemplateStats { snapshot_id } => {
            print(&mut out, &data.template_stats(&SnapshotId(snapshot_id)).await?)
        }

        Command::RoundTotals { start, end } => {
            let range = RoundRange::new(start, end)?;
            print(&mut out, &data.round_totals(range).await?)
        }

        Command::PartyTotals { start, end } => {
            let range = RoundRange::new(start, end)?;
            print(&mut out, &data.round_party_totals(range).await?)
        }

        Command::LatestRound => print(&mut out, &data.latest_round().await?),

        Command::TotalBalance { round } => {
            let round = round_or_latest(&data, round).await?;
            print(&mut out, &data.total_balance(round).await?)
        }

        Command::TopValidators { round, limit } => {
            let round = round_or_latest(&data, round).await?;
            print(&mut out, &data.top_validators(round, limit).await?)
        }

        Command::TopProviders { round, limit } => {
            let round = round_or_latest(&data, round).await?;
            print(&mut out, &data.top_providers(round, limit).await?)
        }

        Command::Transactions {
            after,
            page_size,
            desc,
        } => {
            let page = TransactionPage {
                page_end_event_id: after,
                sort_order: if desc {
                    SortOrder::Descending
                } else {
                    SortOrder::Ascending
                },
                page_size,
            };
            print(&mut out, &data.transactions(page).await?)
        }

        Command::Dso => print(&mut out, &data.dso().await?),

        Command::VoteRequests => print(&mut out, &data.vote_requests().await?),

        Command::AnsEntries {
            page_size,
            name_prefix,
        } => print(&mut out, &data.ans_entries(page_size, name_prefix).await?),

        Command::FeaturedApps => print(&mut out, &data.featured_apps().await?),

        Command::Liveness { validator_ids } => {
            print(&mut out, &data.validator_liveness(validator_ids).await?)
        }

        Command::Cips => print(&mut out, &data.cip_overview().await?),

        Command::FeaturedAppVotes => print(&mut out, &data.featured_app_tallies().await?),

        Command::Overview => {
            let mut scope = PageScope::new();

            let latest_round = scope.spawn({
                let data = data.clone();
                async move { data.latest_round().await }
            });
            let latest_snapshot = scope.spawn({
                let data = data.clone();
                async move { data.latest_snapshot().await }
            });
            let dso = scope.spawn({
                let data = data.clone();
                async move { data.dso().await }
            });
            let cips = scope.spawn({
                let data = data.clone();
                async move { data.cip_overview().await }
            });

            // Leaving early on an error drops the scope and thereby aborts the remaining reads.
            let overview = Overview {
                latest_round: latest_round.await??,
                latest_snapshot: latest_snapshot.await??,
                dso: dso.await??,
                cips: cips.await??,
            };
            scope.close();

            print(&mut out, &overview)
        }

        Command::WatchLogs { snapshot_id } => {
            let mut scope = PageScope::new();
            let mut logs = scope.subscribe(
                data.watch_snapshot_logs(SnapshotId(snapshot_id)),
                LOG_CHANNEL_CAPACITY,
            );

            loop {
                tokio::select! {
                    log = logs.try_next() => match log.context("watch snapshot logs")? {
                        Some(log) => {
                            serde_json::to_writer(&mut out, &log).context("write output")?;
                            writeln!(out).context("write output")?;
                        }
                        None => break,
                    },

                    _ = tokio::signal::ctrl_c() => {
                        info!("interrupted, stop watching logs");
                        break;
                    }
                }
            }

            scope.close();
            Ok(())
        }

        Command::Purge { user_id } => print(&mut out, &data.purge_all(&user_id).await?),

        Command::SvRewards {
            beneficiary,
            begin_record_time,
            end_record_time,
            begin_migration_id,
            end_migration_id,
            weight,
            already_minted_weight,
        } => {
            let request = SvRewardsRequest {
                beneficiary,
                begin_record_time,
                end_record_time,
                begin_migration_id,
                end_migration_id,
                weight,
                already_minted_weight,
            };
            print(&mut out, &data.sv_rewards_summary(request).await?)
        }
    }
}

async fn round_or_latest<S, A, F>(
    data: &ScanData<S, A, F>,
    round: Option<RoundNumber>,
) -> anyhow::Result<RoundNumber>
where
    S: Storage,
    A: ScanApi,
    F: BackendFunctions,
{
    match round {
        Some(round) => Ok(round),
        None => Ok(data.latest_round().await?.round),
    }
}

fn print(out: &mut impl Write, value: &impl Serialize) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).context("write output")?;
    writeln!(out).context("write output")?;
    Ok(())
}
