// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates concrete repository implementations based on storage backend
//! configuration, keeping the domain layer's repository traits free of any
//! infrastructure dependency.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Builds the [`Repositories`] bundle injected into every
//!   other application service.

use std::sync::Arc;
use sqlx::PgPool;

use crate::domain::repository::{
    FsIndexRepository, JobRepository, MountRepository, Repositories, StorageBackend,
    StorageConfigRepository, UploadSessionRepository, UsageSnapshotRepository, VfsNodeRepository,
};
use crate::infrastructure::repositories::{
    InMemoryFsIndexRepository, InMemoryJobRepository, InMemoryMountRepository,
    InMemoryStorageConfigRepository, InMemoryUploadSessionRepository,
    InMemoryUsageSnapshotRepository, InMemoryVfsNodeRepository, PostgresFsIndexRepository,
    PostgresJobRepository, PostgresMountRepository, PostgresStorageConfigRepository,
    PostgresUploadSessionRepository, PostgresUsageSnapshotRepository, PostgresVfsNodeRepository,
};

pub fn create_mount_repository(backend: &StorageBackend, pool: Option<PgPool>) -> Arc<dyn MountRepository> {
    match (backend, pool) {
        (StorageBackend::PostgreSQL(_), Some(pool)) => Arc::new(PostgresMountRepository::new(pool)),
        _ => Arc::new(InMemoryMountRepository::new()),
    }
}

pub fn create_storage_config_repository(backend: &StorageBackend, pool: Option<PgPool>) -> Arc<dyn StorageConfigRepository> {
    match (backend, pool) {
        (StorageBackend::PostgreSQL(_), Some(pool)) => Arc::new(PostgresStorageConfigRepository::new(pool)),
        _ => Arc::new(InMemoryStorageConfigRepository::new()),
    }
}

pub fn create_upload_session_repository(backend: &StorageBackend, pool: Option<PgPool>) -> Arc<dyn UploadSessionRepository> {
    match (backend, pool) {
        (StorageBackend::PostgreSQL(_), Some(pool)) => Arc::new(PostgresUploadSessionRepository::new(pool)),
        _ => Arc::new(InMemoryUploadSessionRepository::new()),
    }
}

pub fn create_vfs_node_repository(backend: &StorageBackend, pool: Option<PgPool>) -> Arc<dyn VfsNodeRepository> {
    match (backend, pool) {
        (StorageBackend::PostgreSQL(_), Some(pool)) => Arc::new(PostgresVfsNodeRepository::new(pool)),
        _ => Arc::new(InMemoryVfsNodeRepository::new()),
    }
}

pub fn create_job_repository(backend: &StorageBackend, pool: Option<PgPool>) -> Arc<dyn JobRepository> {
    match (backend, pool) {
        (StorageBackend::PostgreSQL(_), Some(pool)) => Arc::new(PostgresJobRepository::new(pool)),
        _ => Arc::new(InMemoryJobRepository::new()),
    }
}

pub fn create_fs_index_repository(backend: &StorageBackend, pool: Option<PgPool>) -> Arc<dyn FsIndexRepository> {
    match (backend, pool) {
        (StorageBackend::PostgreSQL(_), Some(pool)) => Arc::new(PostgresFsIndexRepository::new(pool)),
        _ => Arc::new(InMemoryFsIndexRepository::new()),
    }
}

pub fn create_usage_snapshot_repository(backend: &StorageBackend, pool: Option<PgPool>) -> Arc<dyn UsageSnapshotRepository> {
    match (backend, pool) {
        (StorageBackend::PostgreSQL(_), Some(pool)) => Arc::new(PostgresUsageSnapshotRepository::new(pool)),
        _ => Arc::new(InMemoryUsageSnapshotRepository::new()),
    }
}

/// Builds the full [`Repositories`] bundle for a given backend. `pool` must
/// be `Some` when `backend` is `StorageBackend::PostgreSQL`.
pub fn create_repositories(backend: &StorageBackend, pool: Option<PgPool>) -> Repositories {
    Repositories {
        mounts: create_mount_repository(backend, pool.clone()),
        storage_configs: create_storage_config_repository(backend, pool.clone()),
        upload_sessions: create_upload_session_repository(backend, pool.clone()),
        vfs_nodes: create_vfs_node_repository(backend, pool.clone()),
        jobs: create_job_repository(backend, pool.clone()),
        fs_index: create_fs_index_repository(backend, pool.clone()),
        usage_snapshots: create_usage_snapshot_repository(backend, pool),
    }
}
