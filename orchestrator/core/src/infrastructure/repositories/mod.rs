// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! This module provides infrastructure implementations of repository abstractions
//! defined in the domain layer, following the Repository pattern from DDD.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve domain aggregates
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! `in_memory` backs local development and tests; the `postgres_*` modules
//! back production deployments. Both satisfy the same traits in
//! `domain::repository`, selected at startup via `StorageBackend`.

pub mod in_memory;
pub mod postgres_fs_index;
pub mod postgres_job;
pub mod postgres_mount;
pub mod postgres_storage_config;
pub mod postgres_upload_session;
pub mod postgres_usage_snapshot;
pub mod postgres_vfs_node;

pub use in_memory::{
    InMemoryFsIndexRepository, InMemoryJobRepository, InMemoryMountRepository,
    InMemoryStorageConfigRepository, InMemoryUploadSessionRepository, InMemoryUsageSnapshotRepository,
    InMemoryVfsNodeRepository,
};
pub use postgres_fs_index::PostgresFsIndexRepository;
pub use postgres_job::PostgresJobRepository;
pub use postgres_mount::PostgresMountRepository;
pub use postgres_storage_config::PostgresStorageConfigRepository;
pub use postgres_upload_session::PostgresUploadSessionRepository;
pub use postgres_usage_snapshot::PostgresUsageSnapshotRepository;
pub use postgres_vfs_node::PostgresVfsNodeRepository;
