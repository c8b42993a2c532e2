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

use chrono::{DateTime, Utc};
use derive_more::Display;
use scan_common::domain::SnapshotId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::str::FromStr;
use thiserror::Error;

/// Captured copy of the active contract set at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Snapshot {
    pub id: SnapshotId,

    pub created_at: DateTime<Utc>,

    #[sqlx(try_from = "String")]
    pub status: SnapshotStatus,

    /// The snapshot this one is incremental from; `None` for a baseline.
    pub previous_snapshot_id: Option<SnapshotId>,

    #[sqlx(try_from = "i64")]
    pub record_count: u64,

    pub migration_id: Option<i64>,

    /// Only set for failed snapshots.
    pub error_message: Option<String>,
}

impl Snapshot {
    pub fn kind(&self) -> SnapshotKind {
        if self.previous_snapshot_id.is_some() {
            SnapshotKind::Incremental
        } else {
            SnapshotKind::Baseline
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == SnapshotStatus::Completed
    }
}

/// Lifecycle status of a [Snapshot]: `processing` transitions to either `completed` or
/// `failed`, both of which are terminal.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    #[display("processing")]
    Processing,

    #[display("completed")]
    Completed,

    #[display("failed")]
    Failed,
}

impl SnapshotStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        self == Self::Processing && next.is_terminal()
    }
}

impl FromStr for SnapshotStatus {
    type Err = UnknownSnapshotStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownSnapshotStatusError(other.to_owned())),
        }
    }
}

impl TryFrom<String> for SnapshotStatus {
    type Error = UnknownSnapshotStatusError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Debug, Error)]
#[error("unknown snapshot status {0}")]
pub struct UnknownSnapshotStatusError(pub String);

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    #[display("baseline")]
    Baseline,

    #[display("incremental")]
    Incremental,
}

/// A completed baseline together with the completed incrementals chained onto it, the latter in
/// creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSet {
    pub baseline: Snapshot,
    pub incrementals: Vec<Snapshot>,
}

impl SnapshotSet {
    /// The identifiers of the incremental snapshots, in creation order.
    pub fn incremental_ids(&self) -> Vec<SnapshotId> {
        self.incrementals.iter().map(|s| s.id.clone()).collect()
    }

    /// The newest snapshot of this set.
    pub fn head(&self) -> &Snapshot {
        self.incrementals.last().unwrap_or(&self.baseline)
    }
}

/// Progress log line written while a snapshot is captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SnapshotLog {
    pub id: i64,
    pub snapshot_id: Option<SnapshotId>,
    pub level: String,
    pub message: String,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}
