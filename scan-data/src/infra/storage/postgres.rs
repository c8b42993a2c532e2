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
    storage::{GovernanceStorage, LogStorage, RoleStorage, SnapshotStorage, TemplateStorage},
};
use indoc::indoc;
use log::debug;
use scan_common::{
    domain::{SnapshotId, TemplateId},
    infra::pool::postgres::PostgresPool,
};
use sqlx::FromRow;

/// Page size for reading template records.
const RECORDS_PAGE_SIZE: i64 = 1_000;

/// Postgres based storage implementation.
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PostgresPool,
}

impl PostgresStorage {
    pub fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct PagedRecord {
    id: i64,

    #[sqlx(flatten)]
    record: TemplateRecord,
}

impl SnapshotStorage for PostgresStorage {
    async fn get_latest_completed_snapshot(&self) -> Result<Option<Snapshot>, sqlx::Error> {
        let query = indoc! {"
            SELECT
                id,
                created_at,
                status,
                previous_snapshot_id,
                record_count,
                migration_id,
                error_message
            FROM acs_snapshots
            WHERE status = 'completed'
            ORDER BY created_at DESC
            LIMIT 1
        "};

        sqlx::query_as::<_, Snapshot>(query)
            .fetch_optional(&*self.pool)
            .await
    }

    async fn get_completed_snapshots(&self) -> Result<Vec<Snapshot>, sqlx::Error> {
        let query = indoc! {"
            SELECT
                id,
                created_at,
                status,
                previous_snapshot_id,
                record_count,
                migration_id,
                error_message
            FROM acs_snapshots
            WHERE status = 'completed'
            ORDER BY created_at
        "};

        sqlx::query_as::<_, Snapshot>(query)
            .fetch_all(&*self.pool)
            .await
    }

    async fn get_snapshot(&self, id: &SnapshotId) -> Result<Option<Snapshot>, sqlx::Error> {
        let query = indoc! {"
            SELECT
                id,
                created_at,
                status,
                previous_snapshot_id,
                record_count,
                migration_id,
                error_message
            FROM acs_snapshots
            WHERE id = $1
        "};

        sqlx::query_as::<_, Snapshot>(query)
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
    }
}

impl TemplateStorage for PostgresStorage {
    async fn get_template_ids(
        &self,
        source: &RecordSource,
    ) -> Result<Vec<TemplateId>, sqlx::Error> {
        let template_ids = match source {
            RecordSource::Snapshot(snapshot_id) => {
                let query = indoc! {"
                    SELECT DISTINCT template_id
                    FROM acs_contracts
                    WHERE snapshot_id = $1
                    ORDER BY template_id
                "};

                sqlx::query_as::<_, (TemplateId,)>(query)
                    .bind(snapshot_id)
                    .fetch_all(&*self.pool)
                    .await?
            }

            RecordSource::Live => {
                let query = indoc! {"
                    SELECT DISTINCT template_id
                    FROM live_contracts
                    ORDER BY template_id
                "};

                sqlx::query_as::<_, (TemplateId,)>(query)
                    .fetch_all(&*self.pool)
                    .await?
            }
        };

        Ok(template_ids.into_iter().map(|(id,)| id).collect())
    }

    async fn get_template_records(
        &self,
        source: &RecordSource,
        template_id: &TemplateId,
    ) -> Result<Vec<TemplateRecord>, sqlx::Error> {
        let mut records = vec![];
        let mut after_id = 0;

        loop {
            let page = match source {
                RecordSource::Snapshot(snapshot_id) => {
                    let query = indoc! {"
                        SELECT id, template_id, contract_id, payload
                        FROM acs_contracts
                        WHERE snapshot_id = $1
                        AND template_id = $2
                        AND id > $3
                        ORDER BY id
                        LIMIT $4
                    "};

                    sqlx::query_as::<_, PagedRecord>(query)
                        .bind(snapshot_id)
                        .bind(template_id)
                        .bind(after_id)
                        .bind(RECORDS_PAGE_SIZE)
                        .fetch_all(&*self.pool)
                        .await?
                }

                RecordSource::Live => {
                    let query = indoc! {"
                        SELECT id, template_id, contract_id, payload
                        FROM live_contracts
                        WHERE template_id = $1
                        AND id > $2
                        ORDER BY id
                        LIMIT $3
                    "};

                    sqlx::query_as::<_, PagedRecord>(query)
                        .bind(template_id)
                        .bind(after_id)
                        .bind(RECORDS_PAGE_SIZE)
                        .fetch_all(&*self.pool)
                        .await?
                }
            };

            let len = page.len();
            if let Some(last) = page.last() {
                after_id = last.id;
            }
            records.extend(page.into_iter().map(|paged| paged.record));

            if (len as i64) < RECORDS_PAGE_SIZE {
                break;
            }
        }

        debug!(source:%, template_id:%, len = records.len(); "template records read");
        Ok(records)
    }

    async fn get_template_stats(
        &self,
        snapshot_id: &SnapshotId,
    ) -> Result<Vec<TemplateStat>, sqlx::Error> {
        let query = indoc! {"
            SELECT template_id, contract_count
            FROM acs_template_stats
            WHERE snapshot_id = $1
            ORDER BY template_id
        "};

        sqlx::query_as::<_, TemplateStat>(query)
            .bind(snapshot_id)
            .fetch_all(&*self.pool)
            .await
    }
}

impl LogStorage for PostgresStorage {
    async fn get_snapshot_logs(
        &self,
        snapshot_id: &SnapshotId,
        after_id: Option<i64>,
        limit: u32,
    ) -> Result<Vec<SnapshotLog>, sqlx::Error> {
        let query = indoc! {"
            SELECT id, snapshot_id, level, message, metadata, created_at
            FROM snapshot_logs
            WHERE snapshot_id = $1
            AND id > $2
            ORDER BY id
            LIMIT $3
        "};

        sqlx::query_as::<_, SnapshotLog>(query)
            .bind(snapshot_id)
            .bind(after_id.unwrap_or_default())
            .bind(limit as i64)
            .fetch_all(&*self.pool)
            .await
    }
}

impl GovernanceStorage for PostgresStorage {
    async fn get_cips(&self) -> Result<Vec<Cip>, sqlx::Error> {
        let query = indoc! {"
            SELECT id, number, title, status, created_at
            FROM cips
            ORDER BY created_at DESC
        "};

        sqlx::query_as::<_, Cip>(query)
            .fetch_all(&*self.pool)
            .await
    }

    async fn get_cip_votes(&self) -> Result<Vec<CipVote>, sqlx::Error> {
        let query = indoc! {"
            SELECT cip_id, voter, vote_kind, vote
            FROM cip_votes
            ORDER BY created_at
        "};

        sqlx::query_as::<_, CipVote>(query)
            .fetch_all(&*self.pool)
            .await
    }

    async fn get_featured_app_votes(&self) -> Result<Vec<FeaturedAppVote>, sqlx::Error> {
        let query = indoc! {"
            SELECT app_name, provider, voter, vote
            FROM featured_app_votes
            ORDER BY created_at
        "};

        sqlx::query_as::<_, FeaturedAppVote>(query)
            .fetch_all(&*self.pool)
            .await
    }
}

impl RoleStorage for PostgresStorage {
    async fn get_roles(&self, user_id: &str) -> Result<Vec<Role>, sqlx::Error> {
        let query = indoc! {"
            SELECT role
            FROM user_roles
            WHERE user_id = $1
        "};

        sqlx::query_as::<_, (String,)>(query)
            .bind(user_id)
            .fetch_all(&*self.pool)
            .await?
            .into_iter()
            .map(|(role,)| role.parse().map_err(|error| sqlx::Error::Decode(Box::new(error))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        application::{aggregation, snapshot_selector},
        domain::{
            RecordSource, Role,
            storage::{LogStorage, RoleStorage, TemplateStorage},
        },
        infra::storage::postgres::PostgresStorage,
    };
    use anyhow::Context;
    use indoc::indoc;
    use scan_common::{
        domain::{LogicalSuffix, SnapshotId},
        infra::{
            migrations,
            pool::{self, postgres::PostgresPool},
        },
    };
    use serde_json::json;
    use sqlx::postgres::PgSslMode;
    use std::{error::Error as StdError, time::Duration};
    use testcontainers::{ImageExt, runners::AsyncRunner};
    use testcontainers_modules::postgres::Postgres;

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_postgres_storage() -> Result<(), Box<dyn StdError>> {
        let postgres_container = Postgres::default()
            .with_db_name("scan")
            .with_user("scan")
            .with_password("scan")
            .with_tag("17.1-alpine")
            .start()
            .await
            .context("start Postgres container")?;
        let postgres_port = postgres_container
            .get_host_port_ipv4(5432)
            .await
            .context("get Postgres port")?;

        let config = pool::postgres::Config {
            host: "localhost".to_string(),
            port: postgres_port,
            dbname: "scan".to_string(),
            user: "scan".to_string(),
            password: "scan".into(),
            sslmode: PgSslMode::Prefer,
            max_connections: 10,
            idle_timeout: Duration::from_secs(60),
            max_lifetime: Duration::from_secs(5 * 60),
        };
        let pool = PostgresPool::new(config).await?;
        migrations::postgres::run(&pool).await?;

        let seed = indoc! {"
            INSERT INTO acs_snapshots (id, created_at, status, is_delta, previous_snapshot_id)
            VALUES
                ('base', '2025-01-01T00:00:00Z', 'completed', FALSE, NULL),
                ('inc', '2025-01-01T01:00:00Z', 'completed', TRUE, 'base'),
                ('next', '2025-01-01T02:00:00Z', 'processing', TRUE, 'inc');

            INSERT INTO snapshot_logs (snapshot_id, level, message)
            VALUES ('next', 'info', 'started'), ('next', 'info', 'halfway');

            INSERT INTO user_roles (user_id, role) VALUES ('alice', 'admin');
        "};
        sqlx::raw_sql(seed).execute(&*pool).await?;

        for n in 0..1_005 {
            let template_id = if n % 2 == 0 { "h1" } else { "h2" };
            sqlx::query(indoc! {"
                INSERT INTO acs_contracts (snapshot_id, template_id, contract_id, payload)
                VALUES ('inc', $1, $2, $3)
            "})
            .bind(format!("{template_id}:Splice.Amulet:Amulet"))
            .bind(format!("c{n}"))
            .bind(json!({ "amount": { "initialAmount": "1.0" } }))
            .execute(&*pool)
            .await?;
        }

        let storage = PostgresStorage::new(pool);

        let latest = snapshot_selector::latest_snapshot(&storage).await?;
        assert_eq!(latest.map(|s| s.id), Some(SnapshotId::from("inc")));

        let set = snapshot_selector::current_snapshot_set(&storage)
            .await?
            .context("there is a completed baseline")?;
        assert_eq!(set.incremental_ids(), vec![SnapshotId::from("inc")]);

        let template_ids = storage
            .get_template_ids(&RecordSource::Snapshot("inc".into()))
            .await?;
        assert_eq!(template_ids.len(), 2);

        let suffix = "Splice.Amulet:Amulet".parse::<LogicalSuffix>()?;
        let result = aggregation::aggregate(
            &storage,
            &aggregation::Config::default(),
            &SnapshotId::from("inc"),
            &suffix,
        )
        .await?;
        assert_eq!(result.total_contracts, 1_005);
        assert_eq!(result.template_count, 2);
        assert_eq!(result.sum(&["amount.initialAmount"]), 1_005.0);

        let logs = storage
            .get_snapshot_logs(&SnapshotId::from("next"), None, 10)
            .await?;
        assert_eq!(logs.len(), 2);
        let logs = storage
            .get_snapshot_logs(&SnapshotId::from("next"), Some(logs[0].id), 10)
            .await?;
        assert_eq!(logs.len(), 1);

        assert_eq!(storage.get_roles("alice").await?, vec![Role::Admin]);
        assert!(storage.get_roles("bob").await?.is_empty());

        Ok(())
    }
}
