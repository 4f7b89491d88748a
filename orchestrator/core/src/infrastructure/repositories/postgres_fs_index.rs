// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres-backed `FsIndexRepository`. Search ordering and keyset cursor
//! match `InMemoryFsIndexRepository` exactly: `modified_ms DESC, fs_path ASC,
//! mount_id ASC` so callers see identical pagination behaviour across
//! backends.

use crate::domain::fs_index::{FsIndexDirty, FsIndexEntry, FsIndexState};
use crate::domain::repository::{FsIndexRepository, RepoResult};
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

pub struct PostgresFsIndexRepository {
    pool: PgPool,
}

impl PostgresFsIndexRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_entry(row: sqlx::postgres::PgRow) -> RepoResult<FsIndexEntry> {
    Ok(FsIndexEntry {
        mount_id: row.get("mount_id"),
        fs_path: row.get("fs_path"),
        name: row.get("name"),
        is_dir: row.get("is_dir"),
        size: row.get::<i64, _>("size") as u64,
        modified_ms: row.get("modified_ms"),
        mimetype: row.get("mimetype"),
        index_run_id: row.get("index_run_id"),
        updated_at_ms: row.get("updated_at_ms"),
    })
}

fn parse_state(row: sqlx::postgres::PgRow) -> RepoResult<FsIndexState> {
    let status_val: serde_json::Value = row.get("status");
    Ok(FsIndexState {
        mount_id: row.get("mount_id"),
        status: serde_json::from_value(status_val)?,
        last_indexed_ms: row.get("last_indexed_ms"),
        last_error: row.get("last_error"),
    })
}

fn parse_dirty(row: sqlx::postgres::PgRow) -> RepoResult<FsIndexDirty> {
    let op_val: serde_json::Value = row.get("op");
    Ok(FsIndexDirty {
        mount_id: row.get("mount_id"),
        fs_path: row.get("fs_path"),
        op: serde_json::from_value(op_val)?,
        created_at_ms: row.get("created_at_ms"),
    })
}

#[async_trait]
impl FsIndexRepository for PostgresFsIndexRepository {
    async fn upsert_entry(&self, entry: &FsIndexEntry) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO fs_index_entries (mount_id, fs_path, name, is_dir, size, modified_ms, mimetype, index_run_id, updated_at_ms)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
            ON CONFLICT (mount_id, fs_path) DO UPDATE SET
                name = EXCLUDED.name,
                is_dir = EXCLUDED.is_dir,
                size = EXCLUDED.size,
                modified_ms = EXCLUDED.modified_ms,
                mimetype = EXCLUDED.mimetype,
                index_run_id = EXCLUDED.index_run_id,
                updated_at_ms = EXCLUDED.updated_at_ms
            "#,
        )
        .bind(&entry.mount_id)
        .bind(&entry.fs_path)
        .bind(&entry.name)
        .bind(entry.is_dir)
        .bind(entry.size as i64)
        .bind(entry.modified_ms)
        .bind(&entry.mimetype)
        .bind(&entry.index_run_id)
        .bind(entry.updated_at_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_entry(&self, mount_id: &str, fs_path: &str) -> RepoResult<()> {
        sqlx::query("DELETE FROM fs_index_entries WHERE mount_id = $1 AND fs_path = $2")
            .bind(mount_id)
            .bind(fs_path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_stale(&self, mount_id: &str, index_run_id: &str) -> RepoResult<u64> {
        let result = sqlx::query(
            "DELETE FROM fs_index_entries WHERE mount_id = $1 AND index_run_id <> $2",
        )
        .bind(mount_id)
        .bind(index_run_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn search(
        &self,
        query: &str,
        mount_id: Option<&str>,
        path_prefix: Option<&str>,
        after: Option<(i64, String, String)>,
        limit: u32,
    ) -> RepoResult<Vec<FsIndexEntry>> {
        let (after_ms, after_path, after_mount) = after.unwrap_or((i64::MAX, String::new(), String::new()));
        let rows = sqlx::query(
            r#"
            SELECT * FROM fs_index_entries
            WHERE name ILIKE '%' || $1 || '%'
              AND ($2::text IS NULL OR mount_id = $2)
              AND ($3::text IS NULL OR fs_path LIKE $3 || '%')
              AND (modified_ms < $4 OR (modified_ms = $4 AND (fs_path, mount_id) > ($5, $6)))
            ORDER BY modified_ms DESC, fs_path ASC, mount_id ASC
            LIMIT $7
            "#,
        )
        .bind(query)
        .bind(mount_id)
        .bind(path_prefix)
        .bind(after_ms)
        .bind(&after_path)
        .bind(&after_mount)
        .bind(limit.min(500) as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(parse_entry).collect()
    }

    async fn count_for_mount(&self, mount_id: &str) -> RepoResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS c FROM fs_index_entries WHERE mount_id = $1")
            .bind(mount_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("c") as u64)
    }

    async fn clear_mount(&self, mount_id: &str) -> RepoResult<()> {
        sqlx::query("DELETE FROM fs_index_entries WHERE mount_id = $1")
            .bind(mount_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_state(&self, mount_id: &str) -> RepoResult<Option<FsIndexState>> {
        let row = sqlx::query("SELECT * FROM fs_index_state WHERE mount_id = $1")
            .bind(mount_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(parse_state).transpose()
    }

    async fn put_state(&self, state: &FsIndexState) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO fs_index_state (mount_id, status, last_indexed_ms, last_error)
            VALUES ($1,$2,$3,$4)
            ON CONFLICT (mount_id) DO UPDATE SET
                status = EXCLUDED.status,
                last_indexed_ms = EXCLUDED.last_indexed_ms,
                last_error = EXCLUDED.last_error
            "#,
        )
        .bind(&state.mount_id)
        .bind(serde_json::to_value(state.status)?)
        .bind(state.last_indexed_ms)
        .bind(&state.last_error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn enqueue_dirty(&self, dirty: &FsIndexDirty) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO fs_index_dirty (mount_id, fs_path, op, created_at_ms)
            VALUES ($1,$2,$3,$4)
            ON CONFLICT (mount_id, fs_path) DO UPDATE SET
                op = EXCLUDED.op,
                created_at_ms = EXCLUDED.created_at_ms
            "#,
        )
        .bind(&dirty.mount_id)
        .bind(&dirty.fs_path)
        .bind(serde_json::to_value(dirty.op)?)
        .bind(dirty.created_at_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn drain_dirty(&self, mount_id: Option<&str>, max_items: u32) -> RepoResult<Vec<FsIndexDirty>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM fs_index_dirty
            WHERE ($1::text IS NULL OR mount_id = $1)
            ORDER BY created_at_ms ASC
            LIMIT $2
            "#,
        )
        .bind(mount_id)
        .bind(max_items.min(10_000) as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(parse_dirty).collect()
    }

    async fn count_dirty(&self, mount_id: &str) -> RepoResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS c FROM fs_index_dirty WHERE mount_id = $1")
            .bind(mount_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("c") as u64)
    }

    async fn ack_dirty(&self, mount_id: &str, fs_path: &str) -> RepoResult<()> {
        sqlx::query("DELETE FROM fs_index_dirty WHERE mount_id = $1 AND fs_path = $2")
            .bind(mount_id)
            .bind(fs_path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
