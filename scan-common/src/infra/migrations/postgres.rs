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

//! Schema of the snapshot store, embedded from `migrations/postgres`:
//! - `acs_snapshots`: ACS snapshot metadata; incrementals link to their predecessor via
//!   `previous_snapshot_id`, `status` gates which snapshots are aggregated.
//! - `acs_template_stats`: per snapshot contract counts by template, read by the template stats
//!   query.
//! - `acs_contracts`: contract payloads per snapshot, keyed by `(snapshot_id, template_id, id)`
//!   for paging within a template.
//! - `live_contracts`: the real-time contract set backing realtime aggregation.
//! - `snapshot_logs`: progress and error messages written while taking a snapshot.
//! - `cips` and `cip_votes`: governance proposals and their votes per committee member.
//! - `featured_app_votes`: votes on featured apps, keyed by app name and provider party.
//! - `user_roles`: roles granted to users, checked by the admin gate.

use crate::infra::pool::postgres::PostgresPool;
use sqlx::migrate::{MigrateError, Migrator};
use thiserror::Error;

static MIGRATOR: Migrator = sqlx::migrate!("migrations/postgres");

/// Bring the snapshot store schema up to date; already applied migrations are skipped.
pub async fn run(pool: &PostgresPool) -> Result<(), Error> {
    MIGRATOR.run(&**pool).await?;
    Ok(())
}

/// Error possibly returned by [run].
#[derive(Debug, Error)]
#[error("cannot migrate snapshot store schema")]
pub struct Error(#[from] MigrateError);

#[cfg(test)]
mod tests {
    use crate::infra::{
        migrations::postgres::{MIGRATOR, run},
        pool::{self, postgres::PostgresPool},
    };
    use anyhow::Context;
    use sqlx::{Row, postgres::PgSslMode};
    use std::{collections::HashSet, error::Error as StdError, time::Duration};
    use testcontainers::{ImageExt, runners::AsyncRunner};
    use testcontainers_modules::postgres::Postgres;

    #[test]
    fn test_embedded_schema() {
        let migrations = MIGRATOR.iter().collect::<Vec<_>>();
        assert_eq!(migrations.len(), 1);
        assert_eq!(migrations[0].version, 1);
        assert_eq!(migrations[0].description, "initial");

        let sql = &migrations[0].sql;
        assert!(sql.contains("previous_snapshot_id"));
        for table in ["acs_snapshots", "featured_app_votes", "user_roles"] {
            assert!(
                sql.contains(&format!("CREATE TABLE {table} (")),
                "missing table {table}"
            );
        }
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_run() -> Result<(), Box<dyn StdError>> {
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

        run(&pool).await?;

        let table_names = sqlx::query(
            "SELECT tablename
             FROM pg_catalog.pg_tables
             WHERE schemaname = 'public'",
        )
        .fetch_all(&*pool)
        .await?
        .into_iter()
        .map(|row| row.get::<String, _>(0))
        .collect::<HashSet<_>>();

        for table in [
            "_sqlx_migrations",
            "acs_snapshots",
            "acs_template_stats",
            "acs_contracts",
            "live_contracts",
            "snapshot_logs",
            "cips",
            "cip_votes",
            "featured_app_votes",
            "user_roles",
        ] {
            assert!(table_names.contains(table), "missing table {table}");
        }

        Ok(())
    }
}
