// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres-backed `JobRepository`. `claim_next_pending` uses
//! `FOR UPDATE SKIP LOCKED` so concurrent dispatcher workers never double
//! -claim the same job.

use crate::domain::job::{Task, TaskStatus, TaskType};
use crate::domain::repository::{JobRepository, RepoResult, RepositoryError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;

pub struct PostgresJobRepository {
    pool: PgPool,
}

impl PostgresJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_row(row: sqlx::postgres::PgRow) -> RepoResult<Task> {
    let task_type_val: serde_json::Value = row.get("task_type");
    let status_val: serde_json::Value = row.get("status");
    let trigger_type_val: serde_json::Value = row.get("trigger_type");
    Ok(Task {
        task_id: row.get("task_id"),
        task_type: serde_json::from_value(task_type_val)?,
        status: serde_json::from_value(status_val)?,
        payload: row.get("payload"),
        progress: serde_json::from_value(row.get("progress"))?,
        stats: serde_json::from_value(row.get("stats"))?,
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        started_at: row.get("started_at"),
        finished_at: row.get("finished_at"),
        error_message: row.get("error_message"),
        trigger_type: serde_json::from_value(trigger_type_val)?,
        trigger_ref: row.get("trigger_ref"),
    })
}

#[async_trait]
impl JobRepository for PostgresJobRepository {
    async fn create(&self, task: &Task) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tasks (task_id, task_type, status, payload, progress, stats, created_by,
                created_at, started_at, finished_at, error_message, trigger_type, trigger_ref)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
            "#,
        )
        .bind(&task.task_id)
        .bind(serde_json::to_value(task.task_type)?)
        .bind(serde_json::to_value(task.status)?)
        .bind(&task.payload)
        .bind(serde_json::to_value(&task.progress)?)
        .bind(serde_json::to_value(&task.stats)?)
        .bind(&task.created_by)
        .bind(task.created_at)
        .bind(task.started_at)
        .bind(task.finished_at)
        .bind(&task.error_message)
        .bind(serde_json::to_value(task.trigger_type)?)
        .bind(&task.trigger_ref)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, task_id: &str) -> RepoResult<Task> {
        let row = sqlx::query("SELECT * FROM tasks WHERE task_id = $1")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        parse_row(row)
    }

    async fn update(&self, task: &Task) -> RepoResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE tasks SET status = $2, progress = $3, stats = $4, started_at = $5,
                finished_at = $6, error_message = $7
            WHERE task_id = $1
            "#,
        )
        .bind(&task.task_id)
        .bind(serde_json::to_value(task.status)?)
        .bind(serde_json::to_value(&task.progress)?)
        .bind(serde_json::to_value(&task.stats)?)
        .bind(task.started_at)
        .bind(task.finished_at)
        .bind(&task.error_message)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list(
        &self,
        task_type: Option<TaskType>,
        status: Option<TaskStatus>,
        created_by: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> RepoResult<Vec<Task>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM tasks
            WHERE ($1::jsonb IS NULL OR task_type = $1)
              AND ($2::jsonb IS NULL OR status = $2)
              AND ($3::text IS NULL OR created_by = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(task_type.map(|t| serde_json::to_value(t)).transpose()?)
        .bind(status.map(|s| serde_json::to_value(s)).transpose()?)
        .bind(created_by)
        .bind(limit.min(100) as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(parse_row).collect()
    }

    async fn delete(&self, task_id: &str) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE task_id = $1 AND status IN ('\"completed\"', '\"failed\"', '\"cancelled\"')")
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_stalled(&self, stalled_after: DateTime<Utc>) -> RepoResult<Vec<Task>> {
        let rows = sqlx::query(r#"SELECT * FROM tasks WHERE status = '"running"' AND started_at < $1"#)
            .bind(stalled_after)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(parse_row).collect()
    }

    async fn claim_next_pending(&self) -> RepoResult<Option<Task>> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            r#"SELECT * FROM tasks WHERE status = '"pending"' ORDER BY created_at ASC LIMIT 1 FOR UPDATE SKIP LOCKED"#,
        )
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };
        let mut task = parse_row(row)?;
        task.mark_running().map_err(|e| RepositoryError::Conflict(e.to_string()))?;
        sqlx::query(r#"UPDATE tasks SET status = '"running"', started_at = $2 WHERE task_id = $1"#)
            .bind(&task.task_id)
            .bind(task.started_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Some(task))
    }
}
