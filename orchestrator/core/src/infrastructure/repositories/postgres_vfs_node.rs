// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres-backed `VfsNodeRepository`. Subtree deletion uses a recursive
//! CTE rather than walking children in application code, keeping the
//! cascade atomic under concurrent writers.

use crate::domain::repository::{RepoResult, RepositoryError, VfsNodeRepository};
use crate::domain::vfs_node::VfsNode;
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

pub struct PostgresVfsNodeRepository {
    pool: PgPool,
}

impl PostgresVfsNodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_row(row: sqlx::postgres::PgRow) -> RepoResult<VfsNode> {
    let node_type_val: serde_json::Value = row.get("node_type");
    let storage_type_val: serde_json::Value = row.get("storage_type");
    let status_val: serde_json::Value = row.get("status");
    Ok(VfsNode {
        id: row.get("id"),
        owner_type: row.get("owner_type"),
        owner_id: row.get("owner_id"),
        scope_type: row.get("scope_type"),
        scope_id: row.get("scope_id"),
        parent_id: row.get("parent_id"),
        name: row.get("name"),
        node_type: serde_json::from_value(node_type_val)?,
        size: row.get::<Option<i64>, _>("size").map(|v| v as u64),
        mime_type: row.get("mime_type"),
        storage_type: serde_json::from_value(storage_type_val)?,
        content_ref: row.get("content_ref"),
        status: serde_json::from_value(status_val)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl VfsNodeRepository for PostgresVfsNodeRepository {
    async fn create(&self, node: &VfsNode) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO vfs_nodes (id, owner_type, owner_id, scope_type, scope_id, parent_id, name,
                node_type, size, mime_type, storage_type, content_ref, status, created_at, updated_at)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)
            "#,
        )
        .bind(&node.id)
        .bind(&node.owner_type)
        .bind(&node.owner_id)
        .bind(&node.scope_type)
        .bind(&node.scope_id)
        .bind(&node.parent_id)
        .bind(&node.name)
        .bind(serde_json::to_value(node.node_type)?)
        .bind(node.size.map(|v| v as i64))
        .bind(&node.mime_type)
        .bind(serde_json::to_value(node.storage_type)?)
        .bind(&node.content_ref)
        .bind(serde_json::to_value(node.status)?)
        .bind(node.created_at)
        .bind(node.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> RepoResult<VfsNode> {
        let row = sqlx::query("SELECT * FROM vfs_nodes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        parse_row(row)
    }

    async fn find_child(&self, scope_id: &str, parent_id: &str, name: &str) -> RepoResult<Option<VfsNode>> {
        let row = sqlx::query(
            "SELECT * FROM vfs_nodes WHERE scope_id = $1 AND parent_id = $2 AND name = $3 AND status = '\"active\"'",
        )
        .bind(scope_id)
        .bind(parent_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.map(parse_row).transpose()
    }

    async fn list_children(&self, scope_id: &str, parent_id: &str) -> RepoResult<Vec<VfsNode>> {
        let rows = sqlx::query("SELECT * FROM vfs_nodes WHERE scope_id = $1 AND parent_id = $2 ORDER BY name")
            .bind(scope_id)
            .bind(parent_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(parse_row).collect()
    }

    async fn update(&self, node: &VfsNode) -> RepoResult<()> {
        let result = sqlx::query(
            r#"UPDATE vfs_nodes SET name = $2, size = $3, mime_type = $4, content_ref = $5, status = $6, updated_at = $7 WHERE id = $1"#,
        )
        .bind(&node.id)
        .bind(&node.name)
        .bind(node.size.map(|v| v as i64))
        .bind(&node.mime_type)
        .bind(&node.content_ref)
        .bind(serde_json::to_value(node.status)?)
        .bind(node.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete_subtree(&self, id: &str) -> RepoResult<u64> {
        let result = sqlx::query(
            r#"
            WITH RECURSIVE subtree AS (
                SELECT id FROM vfs_nodes WHERE id = $1
                UNION ALL
                SELECT n.id FROM vfs_nodes n INNER JOIN subtree s ON n.parent_id = s.id
            )
            DELETE FROM vfs_nodes WHERE id IN (SELECT id FROM subtree)
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn sum_active_size(&self, scope_id: &str) -> RepoResult<u64> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(size), 0) AS total FROM vfs_nodes WHERE scope_id = $1 AND status = '\"active\"'",
        )
        .bind(scope_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>("total") as u64)
    }
}
