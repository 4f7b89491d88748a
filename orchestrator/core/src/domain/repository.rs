// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository trait registry: one `StorageBackend` switch
//! (`InMemory`/`PostgreSQL`) extended to every persisted entity here,
//! rather than just one aggregate.

use crate::domain::fs_index::{FsIndexDirty, FsIndexEntry, FsIndexState};
use crate::domain::job::{Task, TaskStatus, TaskType};
use crate::domain::mount::Mount;
use crate::domain::storage_config::StorageConfig;
use crate::domain::upload_session::{UploadPart, UploadSession};
use crate::domain::usage_snapshot::UsageSnapshot;
use crate::domain::vfs_node::VfsNode;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound,
            other => RepositoryError::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

impl From<RepositoryError> for crate::domain::errors::CoreError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => crate::domain::errors::CoreError::NotFound(err.to_string()),
            RepositoryError::Conflict(msg) => crate::domain::errors::CoreError::Conflict(msg),
            other => crate::domain::errors::CoreError::Internal(other.to_string()),
        }
    }
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Which storage backend a repository factory should wire up.
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub database_url: String,
    pub max_connections: u32,
}

#[async_trait]
pub trait MountRepository: Send + Sync {
    async fn create(&self, mount: &Mount) -> RepoResult<()>;
    async fn get(&self, id: &str) -> RepoResult<Mount>;
    async fn find_by_path_prefix(&self, virtual_path: &str) -> RepoResult<Vec<Mount>>;
    async fn list_active(&self) -> RepoResult<Vec<Mount>>;
    async fn update(&self, mount: &Mount) -> RepoResult<()>;
    async fn delete(&self, id: &str) -> RepoResult<()>;
}

#[async_trait]
pub trait StorageConfigRepository: Send + Sync {
    async fn create(&self, config: &StorageConfig) -> RepoResult<()>;
    async fn get(&self, id: &str) -> RepoResult<StorageConfig>;
    async fn list(&self) -> RepoResult<Vec<StorageConfig>>;
    async fn update(&self, config: &StorageConfig) -> RepoResult<()>;
    async fn delete(&self, id: &str) -> RepoResult<()>;
}

#[async_trait]
pub trait UploadSessionRepository: Send + Sync {
    async fn create(&self, session: &UploadSession) -> RepoResult<()>;
    async fn get(&self, id: &str) -> RepoResult<UploadSession>;
    async fn find_by_fingerprint(&self, fingerprint: &str) -> RepoResult<Option<UploadSession>>;
    async fn update(&self, session: &UploadSession) -> RepoResult<()>;
    async fn list_expirable(&self, now: DateTime<Utc>, active_grace_hours: i64) -> RepoResult<Vec<UploadSession>>;
    async fn delete_terminal_older_than(&self, cutoff: DateTime<Utc>, batch_size: u32) -> RepoResult<u64>;

    async fn upsert_part(&self, part: &UploadPart) -> RepoResult<()>;
    async fn get_part(&self, upload_id: &str, part_no: u32) -> RepoResult<Option<UploadPart>>;
    async fn list_parts(&self, upload_id: &str) -> RepoResult<Vec<UploadPart>>;
    async fn delete_parts(&self, upload_id: &str) -> RepoResult<()>;
}

#[async_trait]
pub trait VfsNodeRepository: Send + Sync {
    async fn create(&self, node: &VfsNode) -> RepoResult<()>;
    async fn get(&self, id: &str) -> RepoResult<VfsNode>;
    async fn find_child(&self, scope_id: &str, parent_id: &str, name: &str) -> RepoResult<Option<VfsNode>>;
    async fn list_children(&self, scope_id: &str, parent_id: &str) -> RepoResult<Vec<VfsNode>>;
    async fn update(&self, node: &VfsNode) -> RepoResult<()>;
    async fn delete_subtree(&self, id: &str) -> RepoResult<u64>;
    async fn sum_active_size(&self, scope_id: &str) -> RepoResult<u64>;
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, task: &Task) -> RepoResult<()>;
    async fn get(&self, task_id: &str) -> RepoResult<Task>;
    async fn update(&self, task: &Task) -> RepoResult<()>;
    async fn list(
        &self,
        task_type: Option<TaskType>,
        status: Option<TaskStatus>,
        created_by: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> RepoResult<Vec<Task>>;
    async fn delete(&self, task_id: &str) -> RepoResult<()>;
    /// Jobs stuck `Running` past `stalled_after` — reclassified
    /// `failed("stalled")` by the dispatcher watchdog on restart.
    async fn list_stalled(&self, stalled_after: DateTime<Utc>) -> RepoResult<Vec<Task>>;
    /// Claims the next pending job for dispatch, atomically marking it
    /// `Running` so at most one worker ever picks it up.
    async fn claim_next_pending(&self) -> RepoResult<Option<Task>>;
}

#[async_trait]
pub trait FsIndexRepository: Send + Sync {
    async fn upsert_entry(&self, entry: &FsIndexEntry) -> RepoResult<()>;
    async fn delete_entry(&self, mount_id: &str, fs_path: &str) -> RepoResult<()>;
    async fn delete_stale(&self, mount_id: &str, index_run_id: &str) -> RepoResult<u64>;
    async fn search(
        &self,
        query: &str,
        mount_id: Option<&str>,
        path_prefix: Option<&str>,
        after: Option<(i64, String, String)>,
        limit: u32,
    ) -> RepoResult<Vec<FsIndexEntry>>;
    async fn count_for_mount(&self, mount_id: &str) -> RepoResult<u64>;
    async fn clear_mount(&self, mount_id: &str) -> RepoResult<()>;

    async fn get_state(&self, mount_id: &str) -> RepoResult<Option<FsIndexState>>;
    async fn put_state(&self, state: &FsIndexState) -> RepoResult<()>;

    async fn enqueue_dirty(&self, dirty: &FsIndexDirty) -> RepoResult<()>;
    async fn drain_dirty(&self, mount_id: Option<&str>, max_items: u32) -> RepoResult<Vec<FsIndexDirty>>;
    async fn count_dirty(&self, mount_id: &str) -> RepoResult<u64>;
    async fn ack_dirty(&self, mount_id: &str, fs_path: &str) -> RepoResult<()>;
}

#[async_trait]
pub trait UsageSnapshotRepository: Send + Sync {
    async fn put(&self, snapshot: &UsageSnapshot) -> RepoResult<()>;
    async fn latest(&self, storage_config_id: &str) -> RepoResult<Option<UsageSnapshot>>;
}

/// Aggregate bundle handed to application services: one repository per
/// aggregate, injected into each use-case constructor.
pub struct Repositories {
    pub mounts: std::sync::Arc<dyn MountRepository>,
    pub storage_configs: std::sync::Arc<dyn StorageConfigRepository>,
    pub upload_sessions: std::sync::Arc<dyn UploadSessionRepository>,
    pub vfs_nodes: std::sync::Arc<dyn VfsNodeRepository>,
    pub jobs: std::sync::Arc<dyn JobRepository>,
    pub fs_index: std::sync::Arc<dyn FsIndexRepository>,
    pub usage_snapshots: std::sync::Arc<dyn UsageSnapshotRepository>,
}
