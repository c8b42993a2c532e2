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

use crate::domain::{
    Cip, CipVote, FeaturedAppVote, RecordSource, Role, Snapshot, SnapshotLog, TemplateRecord,
    TemplateStat,
};
use scan_common::domain::{SnapshotId, TemplateId};

/// Storage abstraction: all of the backend tables this data layer reads.
pub trait Storage
where
    Self: SnapshotStorage + TemplateStorage + LogStorage + GovernanceStorage + RoleStorage,
{
}

impl<T> Storage for T where
    T: SnapshotStorage + TemplateStorage + LogStorage + GovernanceStorage + RoleStorage
{
}

/// Snapshot metadata.
#[trait_variant::make(Send)]
pub trait SnapshotStorage
where
    Self: Clone + Send + Sync + 'static,
{
    /// The newest snapshot by creation time with status completed, if any.
    async fn get_latest_completed_snapshot(&self) -> Result<Option<Snapshot>, sqlx::Error>;

    /// All completed snapshots, ordered by creation time ascending.
    async fn get_completed_snapshots(&self) -> Result<Vec<Snapshot>, sqlx::Error>;

    /// The snapshot with the given identifier regardless of its status, if any.
    async fn get_snapshot(&self, id: &SnapshotId) -> Result<Option<Snapshot>, sqlx::Error>;
}

/// Captured and live contracts.
#[trait_variant::make(Send)]
pub trait TemplateStorage
where
    Self: Clone + Send + Sync + 'static,
{
    /// Distinct template identifiers present in the given source, ordered lexicographically.
    async fn get_template_ids(&self, source: &RecordSource)
    -> Result<Vec<TemplateId>, sqlx::Error>;

    /// All records of the given template in the given source, in insertion order.
    async fn get_template_records(
        &self,
        source: &RecordSource,
        template_id: &TemplateId,
    ) -> Result<Vec<TemplateRecord>, sqlx::Error>;

    /// Per-template contract counts of the given snapshot, ordered by template identifier.
    async fn get_template_stats(
        &self,
        snapshot_id: &SnapshotId,
    ) -> Result<Vec<TemplateStat>, sqlx::Error>;
}

/// Snapshot progress logs.
#[trait_variant::make(Send)]
pub trait LogStorage
where
    Self: Clone + Send + Sync + 'static,
{
    /// At most `limit` log lines of the given snapshot with an id greater than `after_id`,
    /// ordered by id ascending.
    async fn get_snapshot_logs(
        &self,
        snapshot_id: &SnapshotId,
        after_id: Option<i64>,
        limit: u32,
    ) -> Result<Vec<SnapshotLog>, sqlx::Error>;
}

/// CIPs and votes.
#[trait_variant::make(Send)]
pub trait GovernanceStorage
where
    Self: Clone + Send + Sync + 'static,
{
    /// All CIPs, newest first.
    async fn get_cips(&self) -> Result<Vec<Cip>, sqlx::Error>;

    async fn get_cip_votes(&self) -> Result<Vec<CipVote>, sqlx::Error>;

    async fn get_featured_app_votes(&self) -> Result<Vec<FeaturedAppVote>, sqlx::Error>;
}

/// User roles.
#[trait_variant::make(Send)]
pub trait RoleStorage
where
    Self: Clone + Send + Sync + 'static,
{
    async fn get_roles(&self, user_id: &str) -> Result<Vec<Role>, sqlx::Error>;
}
