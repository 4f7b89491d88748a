// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres-backed `MountRepository`: JSONB columns for enums,
//! `ON CONFLICT ... DO UPDATE` upserts, explicit row parsing helper.

use crate::domain::mount::Mount;
use crate::domain::repository::{MountRepository, RepoResult, RepositoryError};
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

pub struct PostgresMountRepository {
    pool: PgPool,
}

impl PostgresMountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_row(row: sqlx::postgres::PgRow) -> RepoResult<Mount> {
    let storage_type_val: serde_json::Value = row.get("storage_type");
    Ok(Mount {
        id: row.get("id"),
        name: row.get("name"),
        mount_path: row.get("mount_path"),
        storage_config_id: row.get("storage_config_id"),
        storage_type: serde_json::from_value(storage_type_val)?,
        is_active: row.get("is_active"),
        created_by: row.get("created_by"),
        web_proxy: row.get("web_proxy"),
        require_signature: row.get("require_signature"),
    })
}

#[async_trait]
impl MountRepository for PostgresMountRepository {
    async fn create(&self, mount: &Mount) -> RepoResult<()> {
        let storage_type_json = serde_json::to_value(mount.storage_type)?;
        sqlx::query(
            r#"
            INSERT INTO mounts (id, name, mount_path, storage_config_id, storage_type, is_active, created_by, web_proxy, require_signature)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&mount.id)
        .bind(&mount.name)
        .bind(&mount.mount_path)
        .bind(&mount.storage_config_id)
        .bind(storage_type_json)
        .bind(mount.is_active)
        .bind(&mount.created_by)
        .bind(mount.web_proxy)
        .bind(mount.require_signature)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> RepoResult<Mount> {
        let row = sqlx::query(
            r#"SELECT id, name, mount_path, storage_config_id, storage_type, is_active, created_by, web_proxy, require_signature
               FROM mounts WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        parse_row(row)
    }

    async fn find_by_path_prefix(&self, virtual_path: &str) -> RepoResult<Vec<Mount>> {
        let rows = sqlx::query(
            r#"SELECT id, name, mount_path, storage_config_id, storage_type, is_active, created_by, web_proxy, require_signature
               FROM mounts
               WHERE is_active AND ($1 = mount_path OR $1 LIKE mount_path || '/%')
               ORDER BY length(mount_path) DESC"#,
        )
        .bind(virtual_path)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(parse_row).collect()
    }

    async fn list_active(&self) -> RepoResult<Vec<Mount>> {
        let rows = sqlx::query(
            r#"SELECT id, name, mount_path, storage_config_id, storage_type, is_active, created_by, web_proxy, require_signature
               FROM mounts WHERE is_active ORDER BY mount_path"#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(parse_row).collect()
    }

    async fn update(&self, mount: &Mount) -> RepoResult<()> {
        let storage_type_json = serde_json::to_value(mount.storage_type)?;
        let result = sqlx::query(
            r#"
            UPDATE mounts SET name = $2, mount_path = $3, storage_config_id = $4, storage_type = $5,
                is_active = $6, web_proxy = $7, require_signature = $8
            WHERE id = $1
            "#,
        )
        .bind(&mount.id)
        .bind(&mount.name)
        .bind(&mount.mount_path)
        .bind(&mount.storage_config_id)
        .bind(storage_type_json)
        .bind(mount.is_active)
        .bind(mount.web_proxy)
        .bind(mount.require_signature)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM mounts WHERE id = $1").bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
