// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres-backed `UploadSessionRepository` covering both the session and
//! part-ledger tables; part upserts use `ON CONFLICT (upload_id, part_no)`
//! per the uniqueness invariant.

use crate::domain::repository::{RepoResult, RepositoryError, UploadSessionRepository};
use crate::domain::upload_session::{UploadPart, UploadSession};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;

pub struct PostgresUploadSessionRepository {
    pool: PgPool,
}

impl PostgresUploadSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_session(row: sqlx::postgres::PgRow) -> RepoResult<UploadSession> {
    let storage_type_val: serde_json::Value = row.get("storage_type");
    let strategy_val: serde_json::Value = row.get("strategy");
    let verification_policy_val: serde_json::Value = row.get("verification_policy");
    let status_val: serde_json::Value = row.get("status");
    Ok(UploadSession {
        id: row.get("id"),
        principal_id: row.get("principal_id"),
        storage_type: serde_json::from_value(storage_type_val)?,
        storage_config_id: row.get("storage_config_id"),
        mount_id: row.get("mount_id"),
        fs_path: row.get("fs_path"),
        file_name: row.get("file_name"),
        file_size: row.get::<i64, _>("file_size") as u64,
        part_size: row.get::<Option<i64>, _>("part_size").map(|v| v as u64),
        total_parts: row.get::<Option<i32>, _>("total_parts").map(|v| v as u32),
        bytes_uploaded: row.get::<i64, _>("bytes_uploaded") as u64,
        uploaded_parts: row.get::<i32, _>("uploaded_parts") as u32,
        next_expected_range: row.get::<Option<i64>, _>("next_expected_range").map(|v| v as u64),
        strategy: serde_json::from_value(strategy_val)?,
        verification_policy: serde_json::from_value(verification_policy_val)?,
        provider_upload_id: row.get("provider_upload_id"),
        provider_upload_url: row.get("provider_upload_url"),
        provider_meta: row.get("provider_meta"),
        status: serde_json::from_value(status_val)?,
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn parse_part(row: sqlx::postgres::PgRow) -> RepoResult<UploadPart> {
    let status_val: serde_json::Value = row.get("status");
    Ok(UploadPart {
        upload_id: row.get("upload_id"),
        part_no: row.get::<i32, _>("part_no") as u32,
        size: row.get::<i64, _>("size") as u64,
        provider_part_id: row.get("provider_part_id"),
        provider_meta: row.get("provider_meta"),
        byte_start: row.get::<i64, _>("byte_start") as u64,
        byte_end: row.get::<i64, _>("byte_end") as u64,
        status: serde_json::from_value(status_val)?,
    })
}

#[async_trait]
impl UploadSessionRepository for PostgresUploadSessionRepository {
    async fn create(&self, session: &UploadSession) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO upload_sessions (
                id, principal_id, storage_type, storage_config_id, mount_id, fs_path, file_name, file_size,
                part_size, total_parts, bytes_uploaded, uploaded_parts, next_expected_range, strategy,
                verification_policy, provider_upload_id, provider_upload_url, provider_meta, status,
                expires_at, created_at, updated_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22)
            "#,
        )
        .bind(&session.id)
        .bind(&session.principal_id)
        .bind(serde_json::to_value(session.storage_type)?)
        .bind(&session.storage_config_id)
        .bind(&session.mount_id)
        .bind(&session.fs_path)
        .bind(&session.file_name)
        .bind(session.file_size as i64)
        .bind(session.part_size.map(|v| v as i64))
        .bind(session.total_parts.map(|v| v as i32))
        .bind(session.bytes_uploaded as i64)
        .bind(session.uploaded_parts as i32)
        .bind(session.next_expected_range.map(|v| v as i64))
        .bind(serde_json::to_value(session.strategy)?)
        .bind(serde_json::to_value(session.verification_policy)?)
        .bind(&session.provider_upload_id)
        .bind(&session.provider_upload_url)
        .bind(&session.provider_meta)
        .bind(serde_json::to_value(session.status)?)
        .bind(session.expires_at)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> RepoResult<UploadSession> {
        let row = sqlx::query("SELECT * FROM upload_sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        parse_session(row)
    }

    async fn find_by_fingerprint(&self, fingerprint: &str) -> RepoResult<Option<UploadSession>> {
        // fingerprint = principal:storageConfigId:fsPath:fileName:fileSize
        let parts: Vec<&str> = fingerprint.splitn(5, ':').collect();
        if parts.len() != 5 {
            return Ok(None);
        }
        let row = sqlx::query(
            "SELECT * FROM upload_sessions WHERE principal_id = $1 AND storage_config_id = $2 AND fs_path = $3 AND file_name = $4 AND file_size = $5 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(parts[0])
        .bind(parts[1])
        .bind(parts[2])
        .bind(parts[3])
        .bind(parts[4].parse::<i64>().unwrap_or(0))
        .fetch_optional(&self.pool)
        .await?;
        row.map(parse_session).transpose()
    }

    async fn update(&self, session: &UploadSession) -> RepoResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE upload_sessions SET
                bytes_uploaded = $2, uploaded_parts = $3, next_expected_range = $4,
                provider_upload_id = $5, provider_upload_url = $6, provider_meta = $7,
                status = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(&session.id)
        .bind(session.bytes_uploaded as i64)
        .bind(session.uploaded_parts as i32)
        .bind(session.next_expected_range.map(|v| v as i64))
        .bind(&session.provider_upload_id)
        .bind(&session.provider_upload_url)
        .bind(&session.provider_meta)
        .bind(serde_json::to_value(session.status)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_expirable(&self, now: DateTime<Utc>, active_grace_hours: i64) -> RepoResult<Vec<UploadSession>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM upload_sessions
            WHERE status IN ('"initiated"', '"uploading"')
              AND (
                (expires_at IS NOT NULL AND expires_at <= $1)
                OR (expires_at IS NULL AND updated_at < $1 - ($2 || ' hours')::interval)
              )
            "#,
        )
        .bind(now)
        .bind(active_grace_hours.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(parse_session).collect()
    }

    async fn delete_terminal_older_than(&self, cutoff: DateTime<Utc>, batch_size: u32) -> RepoResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM upload_sessions WHERE id IN (
                SELECT id FROM upload_sessions
                WHERE status IN ('"completed"', '"aborted"', '"error"', '"expired"') AND updated_at < $1
                LIMIT $2
            )
            "#,
        )
        .bind(cutoff)
        .bind(batch_size as i64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn upsert_part(&self, part: &UploadPart) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO upload_parts (upload_id, part_no, size, provider_part_id, provider_meta, byte_start, byte_end, status)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
            ON CONFLICT (upload_id, part_no) DO UPDATE SET
                size = EXCLUDED.size,
                provider_part_id = EXCLUDED.provider_part_id,
                provider_meta = EXCLUDED.provider_meta,
                byte_start = EXCLUDED.byte_start,
                byte_end = EXCLUDED.byte_end,
                status = EXCLUDED.status
            "#,
        )
        .bind(&part.upload_id)
        .bind(part.part_no as i32)
        .bind(part.size as i64)
        .bind(&part.provider_part_id)
        .bind(&part.provider_meta)
        .bind(part.byte_start as i64)
        .bind(part.byte_end as i64)
        .bind(serde_json::to_value(part.status)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_part(&self, upload_id: &str, part_no: u32) -> RepoResult<Option<UploadPart>> {
        let row = sqlx::query("SELECT * FROM upload_parts WHERE upload_id = $1 AND part_no = $2")
            .bind(upload_id)
            .bind(part_no as i32)
            .fetch_optional(&self.pool)
            .await?;
        row.map(parse_part).transpose()
    }

    async fn list_parts(&self, upload_id: &str) -> RepoResult<Vec<UploadPart>> {
        let rows = sqlx::query("SELECT * FROM upload_parts WHERE upload_id = $1 ORDER BY part_no")
            .bind(upload_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(parse_part).collect()
    }

    async fn delete_parts(&self, upload_id: &str) -> RepoResult<()> {
        sqlx::query("DELETE FROM upload_parts WHERE upload_id = $1").bind(upload_id).execute(&self.pool).await?;
        Ok(())
    }
}
