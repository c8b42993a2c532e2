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

use crate::domain::{Snapshot, SnapshotSet, storage::SnapshotStorage};
use log::{debug, warn};
use scan_common::domain::SnapshotId;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// The newest completed snapshot, or `None` if there is none yet. Processing and failed
/// snapshots are never returned.
pub async fn latest_snapshot(
    storage: &impl SnapshotStorage,
) -> Result<Option<Snapshot>, SelectorError> {
    let snapshot = storage
        .get_latest_completed_snapshot()
        .await?
        .filter(Snapshot::is_completed);

    debug!(snapshot_id:? = snapshot.as_ref().map(|s| &s.id); "selected latest snapshot");
    Ok(snapshot)
}

/// The lineage of the newest completed snapshot, i.e. the completed baseline it chains back to
/// plus the completed incrementals in between, or `None` if there is no such snapshot. The head of
/// the returned set is [latest_snapshot], unless the lineage of that snapshot is broken, in which
/// case the newest completed snapshot with an intact lineage is used.
pub async fn current_snapshot_set(
    storage: &impl SnapshotStorage,
) -> Result<Option<SnapshotSet>, SelectorError> {
    let snapshots = storage.get_completed_snapshots().await?;
    let by_id = snapshots
        .iter()
        .map(|s| (&s.id, s))
        .collect::<HashMap<_, _>>();

    for head in snapshots.iter().rev() {
        match completed_lineage(head, &by_id) {
            Some(mut chain) => {
                let baseline = chain.remove(0);
                return Ok(Some(SnapshotSet {
                    baseline,
                    incrementals: chain,
                }));
            }

            None => warn!(snapshot_id:% = head.id; "lineage of completed snapshot is broken"),
        }
    }

    Ok(None)
}

/// The chain from the given snapshot back to its baseline in creation order, baseline first, if
/// every link is a completed snapshot.
fn completed_lineage(
    head: &Snapshot,
    by_id: &HashMap<&SnapshotId, &Snapshot>,
) -> Option<Vec<Snapshot>> {
    let mut chain = vec![head.clone()];
    let mut visited = HashSet::from([&head.id]);
    let mut snapshot = head;

    while let Some(previous_id) = &snapshot.previous_snapshot_id {
        if !visited.insert(previous_id) {
            return None;
        }
        snapshot = by_id.get(previous_id)?;
        chain.push(snapshot.clone());
    }

    chain.reverse();
    Some(chain)
}

/// The chain from the given snapshot back to its baseline.
pub async fn lineage(
    storage: &impl SnapshotStorage,
    snapshot_id: &SnapshotId,
) -> Result<SnapshotSet, SelectorError> {
    let mut snapshot = storage
        .get_snapshot(snapshot_id)
        .await?
        .ok_or_else(|| SelectorError::SnapshotNotFound(snapshot_id.clone()))?;

    let mut visited = HashSet::from([snapshot.id.clone()]);
    let mut incrementals = vec![];

    while let Some(previous_id) = snapshot.previous_snapshot_id.clone() {
        if !visited.insert(previous_id.clone()) {
            return Err(SelectorError::BrokenChain {
                snapshot_id: snapshot_id.clone(),
                at: previous_id,
            });
        }

        let previous = storage.get_snapshot(&previous_id).await?.ok_or_else(|| {
            SelectorError::BrokenChain {
                snapshot_id: snapshot_id.clone(),
                at: previous_id,
            }
        })?;

        incrementals.push(snapshot);
        snapshot = previous;
    }

    incrementals.reverse();
    Ok(SnapshotSet {
        baseline: snapshot,
        incrementals,
    })
}

#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("cannot read snapshots")]
    Storage(#[from] sqlx::Error),

    #[error("snapshot {0} not found")]
    SnapshotNotFound(SnapshotId),

    #[error("lineage of snapshot {snapshot_id} is broken at {at}")]
    BrokenChain { snapshot_id: SnapshotId, at: SnapshotId },
}

impl SelectorError {
    /// Whether retrying may succeed; unknown snapshots and broken lineages do not heal by
    /// themselves.
    pub fn is_transient(&self) -> bool {
        matches!(self, SelectorError::Storage(_))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::{
        application::snapshot_selector::{
            SelectorError, current_snapshot_set, latest_snapshot, lineage,
        },
        domain::{Snapshot, SnapshotStatus},
        infra::storage::in_mem::InMemStorage,
    };
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};
    use scan_common::domain::SnapshotId;

    /// A snapshot created at the given minute of 2025-01-01.
    pub fn snapshot(
        id: &str,
        minute: u32,
        status: SnapshotStatus,
        previous: Option<&str>,
    ) -> Snapshot {
        Snapshot {
            id: id.into(),
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, minute, 0).unwrap(),
            status,
            previous_snapshot_id: previous.map(Into::into),
            record_count: 0,
            migration_id: None,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn test_latest_snapshot() {
        use SnapshotStatus::*;

        let storage = InMemStorage::default();
        assert_matches!(latest_snapshot(&storage).await, Ok(None));

        storage.add_snapshot(snapshot("processing-only", 1, Processing, None));
        assert_matches!(latest_snapshot(&storage).await, Ok(None));

        storage.add_snapshot(snapshot("a", 2, Completed, None));
        storage.add_snapshot(snapshot("b", 5, Completed, Some("a")));
        storage.add_snapshot(snapshot("c", 7, Failed, Some("b")));
        storage.add_snapshot(snapshot("d", 9, Processing, Some("b")));
        assert_matches!(latest_snapshot(&storage).await, Ok(Some(s)) if s.id == SnapshotId::from("b"));
    }

    #[tokio::test]
    async fn test_current_snapshot_set() {
        use SnapshotStatus::*;

        let storage = InMemStorage::default();
        storage.add_snapshot(snapshot("old-base", 1, Completed, None));
        storage.add_snapshot(snapshot("old-inc", 2, Completed, Some("old-base")));
        assert_matches!(
            current_snapshot_set(&storage).await,
            Ok(Some(set)) if set.baseline.id == SnapshotId::from("old-base") && set.incrementals.len() == 1
        );

        storage.add_snapshot(snapshot("base", 3, Completed, None));
        storage.add_snapshot(snapshot("inc-1", 4, Completed, Some("base")));
        storage.add_snapshot(snapshot("failed", 5, Failed, Some("inc-1")));
        storage.add_snapshot(snapshot("orphan", 6, Completed, Some("failed")));
        storage.add_snapshot(snapshot("inc-2", 7, Completed, Some("inc-1")));

        let set = current_snapshot_set(&storage)
            .await
            .expect("snapshots can be read")
            .expect("there is a completed baseline");
        assert_eq!(set.baseline.id, SnapshotId::from("base"));
        assert_eq!(
            set.incremental_ids(),
            vec![SnapshotId::from("inc-1"), SnapshotId::from("inc-2")]
        );
        assert_eq!(set.head().id, SnapshotId::from("inc-2"));

        // An incremental of the older baseline completing last makes that lineage current.
        storage.add_snapshot(snapshot("late-old-inc", 8, Completed, Some("old-inc")));
        let set = current_snapshot_set(&storage)
            .await
            .expect("snapshots can be read")
            .expect("there is a completed baseline");
        let latest = latest_snapshot(&storage)
            .await
            .expect("snapshots can be read")
            .expect("there is a completed snapshot");
        assert_eq!(set.baseline.id, SnapshotId::from("old-base"));
        assert_eq!(
            set.incremental_ids(),
            vec![SnapshotId::from("old-inc"), SnapshotId::from("late-old-inc")]
        );
        assert_eq!(set.head().id, latest.id);
    }

    #[tokio::test]
    async fn test_current_snapshot_set_follows_latest_snapshot() {
        use SnapshotStatus::*;

        let storage = InMemStorage::default();
        storage.add_snapshot(snapshot("base-a", 1, Completed, None));
        storage.add_snapshot(snapshot("base-b", 2, Completed, None));
        storage.add_snapshot(snapshot("inc-a", 3, Completed, Some("base-a")));

        let latest = latest_snapshot(&storage)
            .await
            .expect("snapshots can be read")
            .expect("there is a completed snapshot");
        let set = current_snapshot_set(&storage)
            .await
            .expect("snapshots can be read")
            .expect("there is a completed baseline");
        assert_eq!(set.baseline.id, SnapshotId::from("base-a"));
        assert_eq!(set.head().id, latest.id);

        // The newest completed snapshot chains to a failed one, the previous intact lineage wins.
        storage.add_snapshot(snapshot("failed", 4, Failed, Some("inc-a")));
        storage.add_snapshot(snapshot("orphan", 5, Completed, Some("failed")));
        let set = current_snapshot_set(&storage)
            .await
            .expect("snapshots can be read")
            .expect("there is a completed baseline");
        assert_eq!(set.head().id, SnapshotId::from("inc-a"));
    }

    #[tokio::test]
    async fn test_current_snapshot_set_without_baseline() {
        let storage = InMemStorage::default();
        storage.add_snapshot(snapshot("base", 1, SnapshotStatus::Processing, None));
        storage.add_snapshot(snapshot("inc", 2, SnapshotStatus::Completed, Some("base")));
        assert_matches!(current_snapshot_set(&storage).await, Ok(None));
    }

    #[tokio::test]
    async fn test_lineage() {
        use SnapshotStatus::*;

        let storage = InMemStorage::default();
        storage.add_snapshot(snapshot("base", 1, Completed, None));
        storage.add_snapshot(snapshot("inc-1", 2, Completed, Some("base")));
        storage.add_snapshot(snapshot("inc-2", 3, Completed, Some("inc-1")));
        storage.add_snapshot(snapshot("dangling", 4, Completed, Some("purged")));
        storage.add_snapshot(snapshot("loop-a", 5, Completed, Some("loop-b")));
        storage.add_snapshot(snapshot("loop-b", 6, Completed, Some("loop-a")));

        let set = lineage(&storage, &SnapshotId::from("inc-2"))
            .await
            .expect("lineage is intact");
        assert_eq!(set.baseline.id, SnapshotId::from("base"));
        assert_eq!(set.incremental_ids(), vec![SnapshotId::from("inc-1"), SnapshotId::from("inc-2")]);

        assert_matches!(
            lineage(&storage, &SnapshotId::from("base")).await,
            Ok(set) if set.incrementals.is_empty()
        );
        assert_matches!(
            lineage(&storage, &SnapshotId::from("unknown")).await,
            Err(SelectorError::SnapshotNotFound(id)) if id == SnapshotId::from("unknown")
        );
        assert_matches!(
            lineage(&storage, &SnapshotId::from("dangling")).await,
            Err(SelectorError::BrokenChain { at, .. }) if at == SnapshotId::from("purged")
        );
        assert_matches!(
            lineage(&storage, &SnapshotId::from("loop-a")).await,
            Err(SelectorError::BrokenChain { at, .. }) if at == SnapshotId::from("loop-a")
        );
    }

    #[test]
    fn test_is_transient() {
        assert!(SelectorError::Storage(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!SelectorError::SnapshotNotFound(SnapshotId::from("unknown")).is_transient());
        assert!(
            !SelectorError::BrokenChain {
                snapshot_id: SnapshotId::from("dangling"),
                at: SnapshotId::from("purged"),
            }
            .is_transient()
        );
    }
}
