// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! The five concrete job handlers: copy, fs-index rebuild, fs-index
//! apply-dirty, upload-session cleanup, and usage-snapshot refresh.

use crate::application::cache_bus::CacheBus;
use crate::application::job_engine::JobHandler;
use crate::application::mount_manager::MountManager;
use crate::domain::driver::{DriverCtx, ListOptions};
use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::events::{CacheInvalidation, CacheScope};
use crate::domain::fs_index::{DirtyOp, FsIndexEntry, FsIndexState, FsIndexStatus};
use crate::domain::job::{Task, TaskType};
use crate::domain::principal::Principal;
use crate::domain::repository::{FsIndexRepository, MountRepository, StorageConfigRepository, UploadSessionRepository, UsageSnapshotRepository};
use crate::domain::usage_snapshot::UsageSnapshot;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

fn admin_ctx(mount: &crate::domain::mount::Mount, cancellation: CancellationToken) -> DriverCtx {
    DriverCtx {
        mount: mount.clone(),
        principal: Principal::admin("job-engine"),
        req_id: Uuid::new_v4().to_string(),
        cancellation,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CopyItem {
    source_path: String,
    target_path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CopyPayload {
    items: Vec<CopyItem>,
    #[serde(default)]
    skip_existing: bool,
}

/// `copy`: traverses `payload.items[]`; for directories recurses
/// depth-first; updates progress/stats after each item.
pub struct CopyJobHandler {
    mounts: Arc<MountManager>,
    cache: Arc<CacheBus>,
}

impl CopyJobHandler {
    pub fn new(mounts: Arc<MountManager>, cache: Arc<CacheBus>) -> Self {
        Self { mounts, cache }
    }
}

#[async_trait]
impl JobHandler for CopyJobHandler {
    fn task_type(&self) -> TaskType {
        TaskType::Copy
    }

    async fn run(&self, task: &mut Task, cancellation: CancellationToken) -> CoreResult<()> {
        let payload: CopyPayload = serde_json::from_value(task.payload.clone())?;
        task.progress.total = Some(payload.items.len() as u64);

        for item in &payload.items {
            if cancellation.is_cancelled() {
                task.mark_cancelled()?;
                return Ok(());
            }

            match self.copy_one(&item.source_path, &item.target_path, payload.skip_existing, &cancellation).await {
                Ok(()) => task.stats.processed += 1,
                Err(err) => {
                    warn!(source = %item.source_path, error = %err, "copy item failed");
                    task.stats.failed += 1;
                }
            }
            task.progress.current += 1;
        }

        self.cache.apply(&CacheInvalidation { scope: CacheScope::Directory, mount_id: None, storage_config_id: None });
        Ok(())
    }
}

impl CopyJobHandler {
    async fn copy_one(&self, source: &str, target: &str, skip_existing: bool, cancellation: &CancellationToken) -> CoreResult<()> {
        use crate::application::mount_manager::ResolveOutcome;

        let principal = Principal::admin("job-engine");
        let source_resolved = match self.mounts.resolve(source, &principal, false).await? {
            ResolveOutcome::Mount(t) => t,
            ResolveOutcome::VirtualRoot(_) => return Err(CoreError::Validation(format!("{source} is not inside a mount"))),
        };
        let target_resolved = match self.mounts.resolve(target, &principal, false).await? {
            ResolveOutcome::Mount(t) => t,
            ResolveOutcome::VirtualRoot(_) => return Err(CoreError::Validation(format!("{target} is not inside a mount"))),
        };

        let driver = self.mounts.driver_for(&source_resolved.mount).await?;
        let ctx = admin_ctx(&source_resolved.mount, cancellation.clone());
        let info = driver.get_file_info(&source_resolved.sub_path, &ctx).await?;

        if info.is_dir {
            return self.copy_directory(source, target, skip_existing, cancellation).await;
        }

        if source_resolved.mount.id == target_resolved.mount.id {
            let outcome = driver.copy_item(&source_resolved.sub_path, &target_resolved.sub_path, skip_existing, &ctx).await?;
            return match outcome.status {
                crate::domain::driver::CopyStatus::Failed => {
                    Err(CoreError::DriverError { code: "copy".into(), message: outcome.reason.unwrap_or_default() })
                }
                _ => Ok(()),
            };
        }

        let target_driver = self.mounts.driver_for(&target_resolved.mount).await?;
        let target_ctx = admin_ctx(&target_resolved.mount, cancellation.clone());
        if skip_existing && target_driver.exists(&target_resolved.sub_path, &target_ctx).await? {
            return Ok(());
        }
        let body = driver.download_file(&source_resolved.sub_path, None, &ctx).await?;
        target_driver.upload_file(&target_resolved.sub_path, body, &target_ctx).await?;
        Ok(())
    }

    async fn copy_directory(&self, source: &str, target: &str, skip_existing: bool, cancellation: &CancellationToken) -> CoreResult<()> {
        use crate::application::mount_manager::ResolveOutcome;
        let principal = Principal::admin("job-engine");
        let resolved = match self.mounts.resolve(source, &principal, true).await? {
            ResolveOutcome::Mount(t) => t,
            ResolveOutcome::VirtualRoot(_) => return Err(CoreError::Validation(format!("{source} is not inside a mount"))),
        };
        let driver = self.mounts.driver_for(&resolved.mount).await?;
        let ctx = admin_ctx(&resolved.mount, cancellation.clone());
        let listing = driver.list_directory(&resolved.sub_path, ListOptions::default(), &ctx).await?;
        for item in listing.items {
            if cancellation.is_cancelled() {
                return Ok(());
            }
            let child_source = format!("{}/{}", source.trim_end_matches('/'), item.name);
            let child_target = format!("{}/{}", target.trim_end_matches('/'), item.name);
            Box::pin(self.copy_one(&child_source, &child_target, skip_existing, cancellation)).await?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FsIndexRebuildPayload {
    mount_ids: Vec<String>,
    #[serde(default = "default_batch_size")]
    batch_size: u32,
    #[serde(default = "default_max_depth")]
    max_depth: u32,
}

fn default_batch_size() -> u32 {
    200
}
fn default_max_depth() -> u32 {
    32
}

/// `fs_index_rebuild`: walks each mount depth-first, upserting entries
/// tagged with a fresh `indexRunId`, then deletes stale entries.
pub struct FsIndexRebuildHandler {
    mounts: Arc<MountManager>,
    mount_repo: Arc<dyn MountRepository>,
    fs_index: Arc<dyn FsIndexRepository>,
}

impl FsIndexRebuildHandler {
    pub fn new(mounts: Arc<MountManager>, mount_repo: Arc<dyn MountRepository>, fs_index: Arc<dyn FsIndexRepository>) -> Self {
        Self { mounts, mount_repo, fs_index }
    }

    async fn walk(&self, mount: &crate::domain::mount::Mount, sub_path: &str, run_id: &str, depth: u32, max_depth: u32, batch_size: u32, cancellation: &CancellationToken) -> CoreResult<u64> {
        if depth > max_depth || cancellation.is_cancelled() {
            return Ok(0);
        }
        let driver = self.mounts.driver_for(mount).await?;
        let ctx = admin_ctx(mount, cancellation.clone());
        let mut cursor = None;
        let mut count = 0u64;
        loop {
            let opts = ListOptions { refresh: true, cursor: cursor.clone(), limit: Some(batch_size) };
            let listing = driver.list_directory(sub_path, opts, &ctx).await?;
            for item in &listing.items {
                if cancellation.is_cancelled() {
                    return Ok(count);
                }
                let fs_path = item.path.clone();
                self.fs_index
                    .upsert_entry(&FsIndexEntry {
                        mount_id: mount.id.clone(),
                        fs_path: fs_path.clone(),
                        name: item.name.clone(),
                        is_dir: item.is_dir,
                        size: item.size.unwrap_or(0),
                        modified_ms: item.modified.map(|m| m.timestamp_millis()).unwrap_or(0),
                        mimetype: item.mimetype.clone(),
                        index_run_id: run_id.to_string(),
                        updated_at_ms: Utc::now().timestamp_millis(),
                    })
                    .await?;
                count += 1;
                if item.is_dir {
                    count += Box::pin(self.walk(mount, &fs_path, run_id, depth + 1, max_depth, batch_size, cancellation)).await?;
                }
            }
            cursor = listing.next_cursor;
            if cursor.is_none() {
                break;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl JobHandler for FsIndexRebuildHandler {
    fn task_type(&self) -> TaskType {
        TaskType::FsIndexRebuild
    }

    async fn run(&self, task: &mut Task, cancellation: CancellationToken) -> CoreResult<()> {
        let payload: FsIndexRebuildPayload = serde_json::from_value(task.payload.clone())?;
        task.progress.total = Some(payload.mount_ids.len() as u64);

        for mount_id in &payload.mount_ids {
            if cancellation.is_cancelled() {
                task.mark_cancelled()?;
                return Ok(());
            }
            let mount = self.mount_repo.get(mount_id).await?;
            let run_id = Uuid::new_v4().to_string();
            self.fs_index
                .put_state(&FsIndexState { mount_id: mount_id.clone(), status: FsIndexStatus::Indexing, last_indexed_ms: None, last_error: None })
                .await?;

            let result = self.walk(&mount, "/", &run_id, 0, payload.max_depth, payload.batch_size, &cancellation).await;

            if cancellation.is_cancelled() {
                self.fs_index
                    .put_state(&FsIndexState {
                        mount_id: mount_id.clone(),
                        status: FsIndexStatus::Error,
                        last_indexed_ms: None,
                        last_error: Some("cancelled by operator".into()),
                    })
                    .await?;
                task.mark_cancelled()?;
                return Ok(());
            }

            match result {
                Ok(indexed) => {
                    self.fs_index.delete_stale(mount_id, &run_id).await?;
                    self.fs_index
                        .put_state(&FsIndexState {
                            mount_id: mount_id.clone(),
                            status: FsIndexStatus::Ready,
                            last_indexed_ms: Some(Utc::now().timestamp_millis()),
                            last_error: None,
                        })
                        .await?;
                    task.stats.processed += indexed;
                }
                Err(err) => {
                    self.fs_index
                        .put_state(&FsIndexState { mount_id: mount_id.clone(), status: FsIndexStatus::Error, last_indexed_ms: None, last_error: Some(err.to_string()) })
                        .await?;
                    task.stats.failed += 1;
                }
            }
            task.progress.current += 1;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FsIndexApplyDirtyPayload {
    #[serde(default = "default_max_items")]
    max_items: u32,
    mount_id: Option<String>,
    #[serde(default)]
    rebuild_directory_subtree: bool,
    #[serde(default = "default_max_depth")]
    max_depth: u32,
}

fn default_max_items() -> u32 {
    500
}

/// `fs_index_apply_dirty`: drains up to `maxItems` dirty rows, oldest
/// first, and resolves each against the mount's driver.
pub struct FsIndexApplyDirtyHandler {
    mounts: Arc<MountManager>,
    mount_repo: Arc<dyn MountRepository>,
    fs_index: Arc<dyn FsIndexRepository>,
}

impl FsIndexApplyDirtyHandler {
    pub fn new(mounts: Arc<MountManager>, mount_repo: Arc<dyn MountRepository>, fs_index: Arc<dyn FsIndexRepository>) -> Self {
        Self { mounts, mount_repo, fs_index }
    }
}

#[async_trait]
impl JobHandler for FsIndexApplyDirtyHandler {
    fn task_type(&self) -> TaskType {
        TaskType::FsIndexApplyDirty
    }

    async fn run(&self, task: &mut Task, cancellation: CancellationToken) -> CoreResult<()> {
        let payload: FsIndexApplyDirtyPayload = serde_json::from_value(task.payload.clone())?;
        let dirty = self.fs_index.drain_dirty(payload.mount_id.as_deref(), payload.max_items).await?;
        task.progress.total = Some(dirty.len() as u64);

        for entry in &dirty {
            if cancellation.is_cancelled() {
                task.mark_cancelled()?;
                return Ok(());
            }
            match self.apply_one(entry, payload.rebuild_directory_subtree, payload.max_depth).await {
                Ok(()) => task.stats.processed += 1,
                Err(err) => {
                    warn!(mount_id = %entry.mount_id, path = %entry.fs_path, error = %err, "apply-dirty entry failed");
                    task.stats.failed += 1;
                }
            }
            self.fs_index.ack_dirty(&entry.mount_id, &entry.fs_path).await?;
            task.progress.current += 1;
        }
        Ok(())
    }
}

impl FsIndexApplyDirtyHandler {
    async fn apply_one(&self, entry: &crate::domain::fs_index::FsIndexDirty, rebuild_subtree: bool, max_depth: u32) -> CoreResult<()> {
        match entry.op {
            DirtyOp::Delete => {
                self.fs_index.delete_entry(&entry.mount_id, &entry.fs_path).await?;
            }
            DirtyOp::Upsert => {
                let mount = self.mount_repo.get(&entry.mount_id).await?;
                let driver = self.mounts.driver_for(&mount).await?;
                let ctx = admin_ctx(&mount, CancellationToken::new());
                let info = driver.get_file_info(&entry.fs_path, &ctx).await?;
                self.fs_index
                    .upsert_entry(&FsIndexEntry {
                        mount_id: entry.mount_id.clone(),
                        fs_path: entry.fs_path.clone(),
                        name: info.name.clone(),
                        is_dir: info.is_dir,
                        size: info.size.unwrap_or(0),
                        modified_ms: info.modified.map(|m| m.timestamp_millis()).unwrap_or(0),
                        mimetype: info.mimetype.clone(),
                        index_run_id: String::new(),
                        updated_at_ms: Utc::now().timestamp_millis(),
                    })
                    .await?;

                if info.is_dir && rebuild_subtree {
                    self.rescan_subtree(&mount, &entry.fs_path, 0, max_depth).await?;
                }
            }
        }
        Ok(())
    }

    async fn rescan_subtree(&self, mount: &crate::domain::mount::Mount, sub_path: &str, depth: u32, max_depth: u32) -> CoreResult<()> {
        if depth > max_depth {
            return Ok(());
        }
        let driver = self.mounts.driver_for(mount).await?;
        let ctx = admin_ctx(mount, CancellationToken::new());
        let mut cursor = None;
        loop {
            let opts = ListOptions { refresh: true, cursor: cursor.clone(), limit: None };
            let listing = driver.list_directory(sub_path, opts, &ctx).await?;
            for item in &listing.items {
                self.fs_index
                    .upsert_entry(&FsIndexEntry {
                        mount_id: mount.id.clone(),
                        fs_path: item.path.clone(),
                        name: item.name.clone(),
                        is_dir: item.is_dir,
                        size: item.size.unwrap_or(0),
                        modified_ms: item.modified.map(|m| m.timestamp_millis()).unwrap_or(0),
                        mimetype: item.mimetype.clone(),
                        index_run_id: String::new(),
                        updated_at_ms: Utc::now().timestamp_millis(),
                    })
                    .await?;
                if item.is_dir {
                    Box::pin(self.rescan_subtree(mount, &item.path, depth + 1, max_depth)).await?;
                }
            }
            cursor = listing.next_cursor;
            if cursor.is_none() {
                break;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CleanupPayload {
    #[serde(default = "default_active_grace_hours")]
    active_grace_hours: i64,
    #[serde(default = "default_keep_days")]
    keep_days: i64,
    #[serde(default = "default_cleanup_batch")]
    batch_size: u32,
}

fn default_active_grace_hours() -> i64 {
    24
}
fn default_keep_days() -> i64 {
    30
}
fn default_cleanup_batch() -> u32 {
    500
}

/// `cleanup_upload_sessions`: expires stale sessions and deletes old
/// terminal ones in batches, cascading to part ledgers.
pub struct CleanupUploadSessionsHandler {
    sessions: Arc<dyn UploadSessionRepository>,
}

impl CleanupUploadSessionsHandler {
    pub fn new(sessions: Arc<dyn UploadSessionRepository>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl JobHandler for CleanupUploadSessionsHandler {
    fn task_type(&self) -> TaskType {
        TaskType::CleanupUploadSessions
    }

    async fn run(&self, task: &mut Task, cancellation: CancellationToken) -> CoreResult<()> {
        let payload: CleanupPayload = serde_json::from_value(task.payload.clone()).unwrap_or_default();
        let now = Utc::now();

        let expirable = self.sessions.list_expirable(now, payload.active_grace_hours).await?;
        for mut session in expirable {
            if cancellation.is_cancelled() {
                task.mark_cancelled()?;
                return Ok(());
            }
            if session.transition(crate::domain::upload_session::UploadSessionStatus::Expired).is_ok() {
                self.sessions.update(&session).await?;
                task.stats.processed += 1;
            }
        }

        let cutoff = now - chrono::Duration::days(payload.keep_days);
        let deleted = self.sessions.delete_terminal_older_than(cutoff, payload.batch_size).await?;
        task.stats.processed += deleted;
        task.progress.current = task.stats.processed;
        Ok(())
    }
}

/// `refresh_storage_usage_snapshots`: asks each driver for native usage, or
/// a future VfsNode/index aggregation fallback, bounded concurrency 1-10.
pub struct RefreshUsageSnapshotsHandler {
    storage_configs: Arc<dyn StorageConfigRepository>,
    usage_snapshots: Arc<dyn UsageSnapshotRepository>,
    mounts: Arc<MountManager>,
    mount_repo: Arc<dyn MountRepository>,
}

impl RefreshUsageSnapshotsHandler {
    pub fn new(
        storage_configs: Arc<dyn StorageConfigRepository>,
        usage_snapshots: Arc<dyn UsageSnapshotRepository>,
        mounts: Arc<MountManager>,
        mount_repo: Arc<dyn MountRepository>,
    ) -> Self {
        Self { storage_configs, usage_snapshots, mounts, mount_repo }
    }
}

#[async_trait]
impl JobHandler for RefreshUsageSnapshotsHandler {
    fn task_type(&self) -> TaskType {
        TaskType::RefreshStorageUsageSnapshots
    }

    async fn run(&self, task: &mut Task, cancellation: CancellationToken) -> CoreResult<()> {
        let configs = self.storage_configs.list().await?;
        task.progress.total = Some(configs.len() as u64);

        let all_mounts = self.mount_repo.list_active().await?;
        const MAX_CONCURRENCY: usize = 10;
        let chunks: Vec<_> = configs.chunks(MAX_CONCURRENCY).map(|c| c.to_vec()).collect();

        for chunk in chunks {
            if cancellation.is_cancelled() {
                task.mark_cancelled()?;
                return Ok(());
            }
            let futures = chunk.iter().map(|config| {
                let mount = all_mounts.iter().find(|m| m.storage_config_id == config.id).cloned();
                async move {
                    let Some(mount) = mount else { return None };
                    let driver = self.mounts.driver_for(&mount).await.ok()?;
                    let ctx = admin_ctx(&mount, CancellationToken::new());
                    let used = driver.usage_bytes(&ctx).await.ok().flatten()?;
                    Some((config.id.clone(), used))
                }
            });
            let results = futures::future::join_all(futures).await;
            for result in results.into_iter().flatten() {
                let (storage_config_id, used_bytes) = result;
                self.usage_snapshots
                    .put(&UsageSnapshot { storage_config_id, total_bytes: None, used_bytes, taken_at: Utc::now() })
                    .await?;
                task.stats.processed += 1;
            }
            task.progress.current += chunk.len() as u64;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::TriggerType;
    use crate::domain::upload_session::{PartVerificationPolicy, UploadSession, UploadSessionStatus, UploadStrategy};
    use crate::infrastructure::repositories::{InMemoryFsIndexRepository, InMemoryUploadSessionRepository};
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn task(task_type: TaskType, payload: serde_json::Value) -> Task {
        Task::new(task_type, payload, "admin", TriggerType::Manual, None)
    }

    #[tokio::test]
    async fn apply_dirty_acks_a_delete_without_touching_a_driver() {
        let fs_index = Arc::new(InMemoryFsIndexRepository::default());
        fs_index
            .enqueue_dirty(&crate::domain::fs_index::FsIndexDirty {
                mount_id: "m1".into(),
                fs_path: "/gone.txt".into(),
                op: DirtyOp::Delete,
                created_at_ms: 0,
            })
            .await
            .unwrap();
        fs_index
            .upsert_entry(&FsIndexEntry {
                mount_id: "m1".into(),
                fs_path: "/gone.txt".into(),
                name: "gone.txt".into(),
                is_dir: false,
                size: 10,
                modified_ms: 0,
                mimetype: None,
                index_run_id: "r1".into(),
                updated_at_ms: 0,
            })
            .await
            .unwrap();

        let mount_repo = Arc::new(crate::infrastructure::repositories::InMemoryMountRepository::new());
        let storage_configs = Arc::new(crate::infrastructure::repositories::InMemoryStorageConfigRepository::new());
        let registry = crate::infrastructure::drivers::DriverRegistry::new(crate::infrastructure::secrets::SecretsCipher::new(&[7u8; 32]).unwrap());
        let mounts = Arc::new(MountManager::new(mount_repo.clone(), storage_configs, Arc::new(registry)));
        let handler = FsIndexApplyDirtyHandler::new(mounts, mount_repo, fs_index.clone());
        let mut t = task(TaskType::FsIndexApplyDirty, json!({}));
        handler.run(&mut t, CancellationToken::new()).await.unwrap();

        assert_eq!(t.stats.processed, 1);
        assert_eq!(fs_index.count_dirty("m1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn cleanup_expires_sessions_past_grace_and_keeps_fresh_ones() {
        let sessions = Arc::new(InMemoryUploadSessionRepository::new());
        let mut stale = UploadSession::new(
            "p1",
            crate::domain::storage_config::StorageType::Local,
            "sc1",
            "m1",
            "/",
            "stale.bin",
            10,
            UploadStrategy::SingleSession,
            PartVerificationPolicy::ServerCanList,
            chrono::Duration::hours(1),
        );
        stale.expires_at = Some(Utc::now() - chrono::Duration::hours(2));
        sessions.create(&stale).await.unwrap();

        let handler = CleanupUploadSessionsHandler::new(sessions.clone());
        let mut t = task(TaskType::CleanupUploadSessions, json!({}));
        handler.run(&mut t, CancellationToken::new()).await.unwrap();

        assert_eq!(t.stats.processed, 1);
        let reloaded = sessions.get(&stale.id).await.unwrap();
        assert_eq!(reloaded.status, UploadSessionStatus::Expired);
    }

    #[tokio::test]
    async fn refresh_usage_snapshots_skips_configs_with_no_mount() {
        let storage_configs = Arc::new(crate::infrastructure::repositories::InMemoryStorageConfigRepository::new());
        let config = crate::domain::storage_config::StorageConfig::new(crate::domain::storage_config::StorageType::Local, json!({}));
        storage_configs.create(&config).await.unwrap();

        let usage_snapshots = Arc::new(crate::infrastructure::repositories::InMemoryUsageSnapshotRepository::new());
        let mount_repo = Arc::new(crate::infrastructure::repositories::InMemoryMountRepository::new());
        let registry = crate::infrastructure::drivers::DriverRegistry::new(crate::infrastructure::secrets::SecretsCipher::new(&[7u8; 32]).unwrap());
        let mounts = Arc::new(MountManager::new(mount_repo.clone(), storage_configs.clone(), Arc::new(registry)));

        let handler = RefreshUsageSnapshotsHandler::new(storage_configs, usage_snapshots.clone(), mounts, mount_repo);
        let mut t = task(TaskType::RefreshStorageUsageSnapshots, json!({}));
        handler.run(&mut t, CancellationToken::new()).await.unwrap();

        assert_eq!(t.stats.processed, 0);
        assert!(usage_snapshots.latest(&config.id).await.unwrap().is_none());
    }
}
