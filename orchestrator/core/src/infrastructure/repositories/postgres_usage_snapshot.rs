// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres-backed `UsageSnapshotRepository`. One row per storage config;
//! `put` overwrites the prior snapshot rather than appending history, since
//! the quota guard only ever reads the latest figure.

use crate::domain::repository::{RepoResult, UsageSnapshotRepository};
use crate::domain::usage_snapshot::UsageSnapshot;
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

pub struct PostgresUsageSnapshotRepository {
    pool: PgPool,
}

impl PostgresUsageSnapshotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_row(row: sqlx::postgres::PgRow) -> RepoResult<UsageSnapshot> {
    Ok(UsageSnapshot {
        storage_config_id: row.get("storage_config_id"),
        total_bytes: row.get::<Option<i64>, _>("total_bytes").map(|v| v as u64),
        used_bytes: row.get::<i64, _>("used_bytes") as u64,
        taken_at: row.get("taken_at"),
    })
}

#[async_trait]
impl UsageSnapshotRepository for PostgresUsageSnapshotRepository {
    async fn put(&self, snapshot: &UsageSnapshot) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO usage_snapshots (storage_config_id, total_bytes, used_bytes, taken_at)
            VALUES ($1,$2,$3,$4)
            ON CONFLICT (storage_config_id) DO UPDATE SET
                total_bytes = EXCLUDED.total_bytes,
                used_bytes = EXCLUDED.used_bytes,
                taken_at = EXCLUDED.taken_at
            "#,
        )
        .bind(&snapshot.storage_config_id)
        .bind(snapshot.total_bytes.map(|v| v as i64))
        .bind(snapshot.used_bytes as i64)
        .bind(snapshot.taken_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest(&self, storage_config_id: &str) -> RepoResult<Option<UsageSnapshot>> {
        let row = sqlx::query("SELECT * FROM usage_snapshots WHERE storage_config_id = $1")
            .bind(storage_config_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(parse_row).transpose()
    }
}
