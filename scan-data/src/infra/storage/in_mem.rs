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
    Cip, CipVote, FeaturedAppVote, RecordSource, Role, Snapshot, SnapshotLog, SnapshotStatus,
    TemplateRecord, TemplateStat,
    storage::{GovernanceStorage, LogStorage, RoleStorage, SnapshotStorage, TemplateStorage},
};
use itertools::Itertools;
use parking_lot::RwLock;
use scan_common::domain::{SnapshotId, TemplateId};
use std::{collections::HashSet, sync::Arc};

/// In-memory storage implementation, e.g. for tests and demos. Reads of templates marked as
/// failing return an error.
#[derive(Debug, Clone, Default)]
pub struct InMemStorage {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    snapshots: Vec<Snapshot>,
    records: Vec<(RecordSource, TemplateRecord)>,
    logs: Vec<SnapshotLog>,
    cips: Vec<Cip>,
    cip_votes: Vec<CipVote>,
    featured_app_votes: Vec<FeaturedAppVote>,
    roles: Vec<(String, Role)>,
    failing_templates: HashSet<TemplateId>,
    template_reads: usize,
}

impl InMemStorage {
    pub fn add_snapshot(&self, snapshot: Snapshot) {
        self.inner.write().snapshots.push(snapshot);
    }

    /// Set the status of the given snapshot if the transition is allowed, returning whether it
    /// was applied.
    pub fn set_status(&self, id: &SnapshotId, status: SnapshotStatus) -> bool {
        let mut inner = self.inner.write();
        match inner.snapshots.iter_mut().find(|s| &s.id == id) {
            Some(snapshot) if snapshot.status.can_transition_to(status) => {
                snapshot.status = status;
                true
            }
            _ => false,
        }
    }

    pub fn add_record(&self, source: RecordSource, record: TemplateRecord) {
        self.inner.write().records.push((source, record));
    }

    /// Add a log line, assigning the next id.
    pub fn add_log(&self, mut log: SnapshotLog) -> i64 {
        let mut inner = self.inner.write();
        log.id = inner.logs.last().map(|l| l.id + 1).unwrap_or(1);
        let id = log.id;
        inner.logs.push(log);
        id
    }

    pub fn add_cip(&self, cip: Cip) {
        self.inner.write().cips.push(cip);
    }

    pub fn add_cip_vote(&self, vote: CipVote) {
        self.inner.write().cip_votes.push(vote);
    }

    pub fn add_featured_app_vote(&self, vote: FeaturedAppVote) {
        self.inner.write().featured_app_votes.push(vote);
    }

    pub fn add_role(&self, user_id: impl Into<String>, role: Role) {
        self.inner.write().roles.push((user_id.into(), role));
    }

    /// Make subsequent reads of the records of the given template fail.
    pub fn fail_template(&self, template_id: TemplateId) {
        self.inner.write().failing_templates.insert(template_id);
    }

    /// Number of template record reads so far.
    pub fn template_reads(&self) -> usize {
        self.inner.read().template_reads
    }
}

impl SnapshotStorage for InMemStorage {
    async fn get_latest_completed_snapshot(&self) -> Result<Option<Snapshot>, sqlx::Error> {
        let snapshot = self
            .inner
            .read()
            .snapshots
            .iter()
            .filter(|s| s.is_completed())
            .max_by_key(|s| s.created_at)
            .cloned();
        Ok(snapshot)
    }

    async fn get_completed_snapshots(&self) -> Result<Vec<Snapshot>, sqlx::Error> {
        let snapshots = self
            .inner
            .read()
            .snapshots
            .iter()
            .filter(|s| s.is_completed())
            .sorted_by_key(|s| s.created_at)
            .cloned()
            .collect();
        Ok(snapshots)
    }

    async fn get_snapshot(&self, id: &SnapshotId) -> Result<Option<Snapshot>, sqlx::Error> {
        let snapshot = self
            .inner
            .read()
            .snapshots
            .iter()
            .find(|s| &s.id == id)
            .cloned();
        Ok(snapshot)
    }
}

impl TemplateStorage for InMemStorage {
    async fn get_template_ids(
        &self,
        source: &RecordSource,
    ) -> Result<Vec<TemplateId>, sqlx::Error> {
        let template_ids = self
            .inner
            .read()
            .records
            .iter()
            .filter(|(s, _)| s == source)
            .map(|(_, record)| record.template_id.clone())
            .sorted()
            .dedup()
            .collect();
        Ok(template_ids)
    }

    async fn get_template_records(
        &self,
        source: &RecordSource,
        template_id: &TemplateId,
    ) -> Result<Vec<TemplateRecord>, sqlx::Error> {
        let mut inner = self.inner.write();
        inner.template_reads += 1;

        if inner.failing_templates.contains(template_id) {
            return Err(sqlx::Error::Protocol(format!(
                "cannot read records of template {template_id}"
            )));
        }

        let records = inner
            .records
            .iter()
            .filter(|(s, record)| s == source && &record.template_id == template_id)
            .map(|(_, record)| record.clone())
            .collect();
        Ok(records)
    }

    async fn get_template_stats(
        &self,
        snapshot_id: &SnapshotId,
    ) -> Result<Vec<TemplateStat>, sqlx::Error> {
        let source = RecordSource::Snapshot(snapshot_id.clone());
        let stats = self
            .inner
            .read()
            .records
            .iter()
            .filter(|(s, _)| s == &source)
            .counts_by(|(_, record)| record.template_id.clone())
            .into_iter()
            .map(|(template_id, count)| TemplateStat {
                template_id,
                contract_count: count as u64,
            })
            .sorted_by(|a, b| a.template_id.cmp(&b.template_id))
            .collect();
        Ok(stats)
    }
}

impl LogStorage for InMemStorage {
    async fn get_snapshot_logs(
        &self,
        snapshot_id: &SnapshotId,
        after_id: Option<i64>,
        limit: u32,
    ) -> Result<Vec<SnapshotLog>, sqlx::Error> {
        let logs = self
            .inner
            .read()
            .logs
            .iter()
            .filter(|log| log.snapshot_id.as_ref() == Some(snapshot_id))
            .filter(|log| after_id.is_none_or(|after_id| log.id > after_id))
            .take(limit as usize)
            .cloned()
            .collect();
        Ok(logs)
    }
}

impl GovernanceStorage for InMemStorage {
    async fn get_cips(&self) -> Result<Vec<Cip>, sqlx::Error> {
        let cips = self
            .inner
            .read()
            .cips
            .iter()
            .sorted_by(|a, b| b.created_at.cmp(&a.created_at))
            .cloned()
            .collect();
        Ok(cips)
    }

    async fn get_cip_votes(&self) -> Result<Vec<CipVote>, sqlx::Error> {
        Ok(self.inner.read().cip_votes.clone())
    }

    async fn get_featured_app_votes(&self) -> Result<Vec<FeaturedAppVote>, sqlx::Error> {
        Ok(self.inner.read().featured_app_votes.clone())
    }
}

impl RoleStorage for InMemStorage {
    async fn get_roles(&self, user_id: &str) -> Result<Vec<Role>, sqlx::Error> {
        let roles = self
            .inner
            .read()
            .roles
            .iter()
            .filter(|(id, _)| id == user_id)
            .map(|(_, role)| *role)
            .collect();
        Ok(roles)
    }
}
