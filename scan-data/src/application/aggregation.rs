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

//! Merging of the records of one logical entity type across package versions.
//!
//! A logical entity, e.g. `Splice.Amulet:Amulet`, is stored under one template identifier per
//! deployed package version. Aggregation selects all template identifiers with the requested
//! logical suffix, reads their records and concatenates them in template then record order.

use crate::{
    application::snapshot_selector::{self, SelectorError},
    domain::{
        AggregationResult, RecordSource, TemplateStat,
        storage::{SnapshotStorage, TemplateStorage},
    },
};
use futures::{StreamExt, TryStreamExt, stream};
use log::{debug, info, warn};
use scan_common::{
    domain::{ContractId, LogicalSuffix, SnapshotId, TemplateId},
    stream::ordered_chunks,
};
use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

/// Aggregation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Maximum number of template reads in flight.
    #[serde(default = "template_concurrency_default")]
    pub template_concurrency: usize,

    /// Keep only the first record per contract identifier.
    #[serde(default)]
    pub dedupe_by_contract_id: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            template_concurrency: template_concurrency_default(),
            dedupe_by_contract_id: false,
        }
    }
}

/// Aggregate the records of the given snapshot whose template identifier has the given logical
/// suffix. The contributing snapshots are those of the lineage of the given snapshot.
pub async fn aggregate<S>(
    storage: &S,
    config: &Config,
    snapshot_id: &SnapshotId,
    suffix: &LogicalSuffix,
) -> Result<AggregationResult, AggregationError>
where
    S: SnapshotStorage + TemplateStorage,
{
    let lineage = snapshot_selector::lineage(storage, snapshot_id).await?;

    let source = RecordSource::Snapshot(snapshot_id.clone());
    let mut result = aggregate_source(storage, config, &source, suffix).await?;
    result.incremental_snapshot_ids = lineage.incremental_ids();
    result.baseline_snapshot_id = Some(lineage.baseline.id);

    Ok(result)
}

/// Aggregate the live contracts whose template identifier has the given logical suffix.
pub async fn aggregate_realtime(
    storage: &impl TemplateStorage,
    config: &Config,
    suffix: &LogicalSuffix,
) -> Result<AggregationResult, AggregationError> {
    aggregate_source(storage, config, &RecordSource::Live, suffix).await
}

/// Aggregate against the latest completed snapshot, or `None` if there is none yet, in which case
/// no templates are read.
pub async fn aggregate_latest<S>(
    storage: &S,
    config: &Config,
    suffix: &LogicalSuffix,
) -> Result<Option<AggregationResult>, AggregationError>
where
    S: SnapshotStorage + TemplateStorage,
{
    let Some(snapshot) = snapshot_selector::latest_snapshot(storage).await? else {
        info!(suffix:%; "no completed snapshot yet, skipping aggregation");
        return Ok(None);
    };

    aggregate(storage, config, &snapshot.id, suffix)
        .await
        .map(Some)
}

/// Per-template contract counts of the given snapshot.
pub async fn template_stats(
    storage: &impl TemplateStorage,
    snapshot_id: &SnapshotId,
) -> Result<Vec<TemplateStat>, AggregationError> {
    storage
        .get_template_stats(snapshot_id)
        .await
        .map_err(|error| AggregationError::TemplateStats(snapshot_id.clone(), error))
}

async fn aggregate_source(
    storage: &impl TemplateStorage,
    config: &Config,
    source: &RecordSource,
    suffix: &LogicalSuffix,
) -> Result<AggregationResult, AggregationError> {
    let template_ids = storage
        .get_template_ids(source)
        .await
        .map_err(|error| AggregationError::ListTemplates(source.to_string(), error))?
        .into_iter()
        .filter(|template_id| template_id.matches(suffix))
        .collect::<Vec<_>>();
    debug!(source:%, suffix:%, template_ids:?; "matching templates");

    let fetches = stream::iter(template_ids.iter()).map(|template_id| async move {
        storage
            .get_template_records(source, template_id)
            .await
            .map_err(|error| AggregationError::FetchTemplate(template_id.clone(), error))
    });
    let mut records = ordered_chunks(fetches, config.template_concurrency)
        .try_collect::<Vec<_>>()
        .await?;

    let mut seen = HashSet::<ContractId>::with_capacity(records.len());
    if config.dedupe_by_contract_id {
        records.retain(|record| seen.insert(record.contract_id.clone()));
    } else {
        let duplicates = records
            .iter()
            .filter(|record| !seen.insert(record.contract_id.clone()))
            .count();
        if duplicates > 0 {
            warn!(source:%, suffix:%, duplicates; "duplicate contract ids across templates");
        }
    }

    Ok(AggregationResult {
        total_contracts: records.len(),
        template_count: template_ids.len(),
        template_ids,
        records,
        baseline_snapshot_id: None,
        incremental_snapshot_ids: vec![],
    })
}

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("cannot select snapshot")]
    Selector(#[from] SelectorError),

    #[error("cannot list templates of {0}")]
    ListTemplates(String, #[source] sqlx::Error),

    #[error("cannot fetch records of template {0}")]
    FetchTemplate(TemplateId, #[source] sqlx::Error),

    #[error("cannot get template stats of snapshot {0}")]
    TemplateStats(SnapshotId, #[source] sqlx::Error),
}

impl AggregationError {
    pub fn is_transient(&self) -> bool {
        match self {
            AggregationError::Selector(error) => error.is_transient(),
            _ => true,
        }
    }
}

fn template_concurrency_default() -> usize {
    4
}

#[cfg(test)]
mod tests {
    use crate::{
        application::{
            aggregation::{
                AggregationError, Config, aggregate, aggregate_latest, aggregate_realtime,
                template_stats,
            },
            snapshot_selector::tests::snapshot,
        },
        domain::{RecordSource, SnapshotStatus, TemplateRecord},
        infra::storage::in_mem::InMemStorage,
    };
    use assert_matches::assert_matches;
    use scan_common::domain::{LogicalSuffix, SnapshotId, TemplateId};
    use serde_json::json;

    const OPEN_ROUND: &str = "Splice.Round:OpenMiningRound";

    fn suffix(s: &str) -> LogicalSuffix {
        s.parse().expect("suffix is valid")
    }

    fn add_records(storage: &InMemStorage, source: &RecordSource, template_id: &str, ids: &[&str]) {
        for &id in ids {
            storage.add_record(
                source.clone(),
                TemplateRecord {
                    template_id: template_id.into(),
                    contract_id: id.into(),
                    payload: json!({ "round": { "number": "1" } }),
                },
            );
        }
    }

    /// Baseline `base` and incremental `inc` with records under three package versions.
    fn storage() -> InMemStorage {
        let storage = InMemStorage::default();
        storage.add_snapshot(snapshot("base", 1, SnapshotStatus::Completed, None));
        storage.add_snapshot(snapshot("inc", 2, SnapshotStatus::Completed, Some("base")));

        let inc = RecordSource::Snapshot("inc".into());
        add_records(&storage, &inc, &format!("h1:{OPEN_ROUND}"), &["c1", "c2", "c3"]);
        add_records(&storage, &inc, &format!("h2:{OPEN_ROUND}"), &["c4", "c5"]);
        add_records(&storage, &inc, "h3:Splice.Round:ClosedMiningRound", &["c6"]);
        add_records(
            &storage,
            &RecordSource::Snapshot("base".into()),
            &format!("h1:{OPEN_ROUND}"),
            &["c0"],
        );
        storage
    }

    #[tokio::test]
    async fn test_aggregate() {
        let storage = storage();

        let result = aggregate(
            &storage,
            &Config::default(),
            &SnapshotId::from("inc"),
            &suffix(OPEN_ROUND),
        )
        .await
        .expect("aggregation succeeds");

        assert_eq!(result.total_contracts, 5);
        assert_eq!(result.template_count, 2);
        assert_eq!(
            result.template_ids,
            vec![
                TemplateId::from(format!("h1:{OPEN_ROUND}")),
                TemplateId::from(format!("h2:{OPEN_ROUND}"))
            ]
        );
        let contract_ids = result
            .records
            .iter()
            .map(|r| r.contract_id.to_string())
            .collect::<Vec<_>>();
        assert_eq!(contract_ids, vec!["c1", "c2", "c3", "c4", "c5"]);
        assert_eq!(result.baseline_snapshot_id, Some(SnapshotId::from("base")));
        assert_eq!(result.incremental_snapshot_ids, vec![SnapshotId::from("inc")]);
        assert_eq!(result.sum(&["round.number"]), 5.0);
    }

    #[tokio::test]
    async fn test_aggregate_without_matches() {
        let storage = storage();

        let result = aggregate(
            &storage,
            &Config::default(),
            &SnapshotId::from("inc"),
            &suffix("Splice.Amulet:Amulet"),
        )
        .await;
        assert_matches!(
            result,
            Ok(r) if r.total_contracts == 0 && r.template_count == 0 && r.records.is_empty()
        );

        let result = aggregate(
            &storage,
            &Config::default(),
            &SnapshotId::from("unknown"),
            &suffix(OPEN_ROUND),
        )
        .await;
        assert_matches!(result, Err(AggregationError::Selector(_)));
    }

    #[tokio::test]
    async fn test_aggregate_failing_template() {
        let storage = storage();
        storage.fail_template(format!("h2:{OPEN_ROUND}").into());

        let result = aggregate(
            &storage,
            &Config::default(),
            &SnapshotId::from("inc"),
            &suffix(OPEN_ROUND),
        )
        .await;
        assert_matches!(
            result,
            Err(AggregationError::FetchTemplate(id, _)) if id.ends_with("h2:Splice.Round:OpenMiningRound")
        );
    }

    #[tokio::test]
    async fn test_dedupe_by_contract_id() {
        let storage = storage();
        let inc = RecordSource::Snapshot("inc".into());
        add_records(&storage, &inc, &format!("h2:{OPEN_ROUND}"), &["c1"]);

        let result = aggregate(
            &storage,
            &Config::default(),
            &SnapshotId::from("inc"),
            &suffix(OPEN_ROUND),
        )
        .await;
        assert_matches!(result, Ok(r) if r.total_contracts == 6);

        let config = Config {
            dedupe_by_contract_id: true,
            ..Default::default()
        };
        let result = aggregate(&storage, &config, &SnapshotId::from("inc"), &suffix(OPEN_ROUND))
            .await
            .expect("aggregation succeeds");
        assert_eq!(result.total_contracts, 5);
        assert_eq!(
            result.records[0].template_id,
            TemplateId::from(format!("h1:{OPEN_ROUND}"))
        );
    }

    #[tokio::test]
    async fn test_aggregate_realtime() {
        let storage = storage();
        add_records(&storage, &RecordSource::Live, &format!("h9:{OPEN_ROUND}"), &["l1", "l2"]);

        let result = aggregate_realtime(&storage, &Config::default(), &suffix(OPEN_ROUND))
            .await
            .expect("aggregation succeeds");
        assert_eq!(result.total_contracts, 2);
        assert_eq!(result.template_count, 1);
        assert_eq!(result.baseline_snapshot_id, None);
        assert!(result.incremental_snapshot_ids.is_empty());
    }

    #[tokio::test]
    async fn test_aggregate_latest() {
        let storage = InMemStorage::default();
        storage.add_snapshot(snapshot("running", 1, SnapshotStatus::Processing, None));

        let result = aggregate_latest(&storage, &Config::default(), &suffix(OPEN_ROUND)).await;
        assert_matches!(result, Ok(None));
        assert_eq!(storage.template_reads(), 0);

        let storage = self::storage();
        let result = aggregate_latest(&storage, &Config::default(), &suffix(OPEN_ROUND)).await;
        assert_matches!(result, Ok(Some(r)) if r.total_contracts == 5);
    }

    #[tokio::test]
    async fn test_template_stats() {
        let storage = storage();
        let stats = template_stats(&storage, &SnapshotId::from("inc"))
            .await
            .expect("stats can be read");
        assert_eq!(stats.len(), 3);
        assert_eq!(stats[0].contract_count, 3);
    }
}
