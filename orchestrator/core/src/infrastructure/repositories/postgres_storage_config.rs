// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres-backed `StorageConfigRepository`. Secrets are persisted exactly
//! as handed in by the caller — callers MUST pass an already-encrypted
//! `StorageSecrets` (see `infrastructure::secrets`); this repository never
//! encrypts or decrypts.

use crate::domain::repository::{RepoResult, RepositoryError, StorageConfigRepository};
use crate::domain::storage_config::{StorageConfig, StorageSecrets};
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

pub struct PostgresStorageConfigRepository {
    pool: PgPool,
}

impl PostgresStorageConfigRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_row(row: sqlx::postgres::PgRow) -> RepoResult<StorageConfig> {
    let storage_type_val: serde_json::Value = row.get("storage_type");
    let secrets_val: serde_json::Value = row.get("secrets");
    Ok(StorageConfig {
        id: row.get("id"),
        storage_type: serde_json::from_value(storage_type_val)?,
        secrets: StorageSecrets(secrets_val),
        quota_bytes: row.get::<Option<i64>, _>("quota_bytes").map(|v| v as u64),
        root_prefix: row.get("root_prefix"),
    })
}

#[async_trait]
impl StorageConfigRepository for PostgresStorageConfigRepository {
    async fn create(&self, config: &StorageConfig) -> RepoResult<()> {
        let storage_type_json = serde_json::to_value(config.storage_type)?;
        sqlx::query(
            r#"INSERT INTO storage_configs (id, storage_type, secrets, quota_bytes, root_prefix)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(&config.id)
        .bind(storage_type_json)
        .bind(&config.secrets.0)
        .bind(config.quota_bytes.map(|v| v as i64))
        .bind(&config.root_prefix)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> RepoResult<StorageConfig> {
        let row = sqlx::query("SELECT id, storage_type, secrets, quota_bytes, root_prefix FROM storage_configs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        parse_row(row)
    }

    async fn list(&self) -> RepoResult<Vec<StorageConfig>> {
        let rows = sqlx::query("SELECT id, storage_type, secrets, quota_bytes, root_prefix FROM storage_configs")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(parse_row).collect()
    }

    async fn update(&self, config: &StorageConfig) -> RepoResult<()> {
        let result = sqlx::query(
            r#"UPDATE storage_configs SET secrets = $2, quota_bytes = $3, root_prefix = $4 WHERE id = $1"#,
        )
        .bind(&config.id)
        .bind(&config.secrets.0)
        .bind(config.quota_bytes.map(|v| v as i64))
        .bind(&config.root_prefix)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM storage_configs WHERE id = $1").bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
