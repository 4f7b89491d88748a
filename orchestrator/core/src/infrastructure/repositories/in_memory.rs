// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-memory repository implementations, used for unit/integration tests
//! and the database-less dev mode selected by `StorageBackend::InMemory`
//! in `domain::repository`.

use crate::domain::fs_index::{FsIndexDirty, FsIndexEntry, FsIndexState};
use crate::domain::job::{Task, TaskStatus, TaskType};
use crate::domain::mount::Mount;
use crate::domain::repository::*;
use crate::domain::storage_config::StorageConfig;
use crate::domain::upload_session::{UploadPart, UploadSession};
use crate::domain::usage_snapshot::UsageSnapshot;
use crate::domain::vfs_node::VfsNode;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

#[derive(Default)]
pub struct InMemoryMountRepository {
    rows: DashMap<String, Mount>,
}

impl InMemoryMountRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MountRepository for InMemoryMountRepository {
    async fn create(&self, mount: &Mount) -> RepoResult<()> {
        if self.rows.contains_key(&mount.id) {
            return Err(RepositoryError::Conflict("mount id already exists".into()));
        }
        self.rows.insert(mount.id.clone(), mount.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> RepoResult<Mount> {
        self.rows.get(id).map(|m| m.clone()).ok_or(RepositoryError::NotFound)
    }

    async fn find_by_path_prefix(&self, virtual_path: &str) -> RepoResult<Vec<Mount>> {
        Ok(self
            .rows
            .iter()
            .filter(|m| m.is_active && (virtual_path == m.mount_path || virtual_path.starts_with(&format!("{}/", m.mount_path))))
            .map(|m| m.clone())
            .collect())
    }

    async fn list_active(&self) -> RepoResult<Vec<Mount>> {
        Ok(self.rows.iter().filter(|m| m.is_active).map(|m| m.clone()).collect())
    }

    async fn update(&self, mount: &Mount) -> RepoResult<()> {
        if !self.rows.contains_key(&mount.id) {
            return Err(RepositoryError::NotFound);
        }
        self.rows.insert(mount.id.clone(), mount.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> RepoResult<()> {
        self.rows.remove(id).ok_or(RepositoryError::NotFound)?;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryStorageConfigRepository {
    rows: DashMap<String, StorageConfig>,
}

impl InMemoryStorageConfigRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageConfigRepository for InMemoryStorageConfigRepository {
    async fn create(&self, config: &StorageConfig) -> RepoResult<()> {
        if self.rows.contains_key(&config.id) {
            return Err(RepositoryError::Conflict("storage config id already exists".into()));
        }
        self.rows.insert(config.id.clone(), config.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> RepoResult<StorageConfig> {
        self.rows.get(id).map(|c| c.clone()).ok_or(RepositoryError::NotFound)
    }

    async fn list(&self) -> RepoResult<Vec<StorageConfig>> {
        Ok(self.rows.iter().map(|c| c.clone()).collect())
    }

    async fn update(&self, config: &StorageConfig) -> RepoResult<()> {
        if !self.rows.contains_key(&config.id) {
            return Err(RepositoryError::NotFound);
        }
        self.rows.insert(config.id.clone(), config.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> RepoResult<()> {
        self.rows.remove(id).ok_or(RepositoryError::NotFound)?;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryUploadSessionRepository {
    sessions: DashMap<String, UploadSession>,
    parts: DashMap<(String, u32), UploadPart>,
}

impl InMemoryUploadSessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UploadSessionRepository for InMemoryUploadSessionRepository {
    async fn create(&self, session: &UploadSession) -> RepoResult<()> {
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> RepoResult<UploadSession> {
        self.sessions.get(id).map(|s| s.clone()).ok_or(RepositoryError::NotFound)
    }

    async fn find_by_fingerprint(&self, fingerprint: &str) -> RepoResult<Option<UploadSession>> {
        Ok(self.sessions.iter().find(|s| s.fingerprint() == fingerprint).map(|s| s.clone()))
    }

    async fn update(&self, session: &UploadSession) -> RepoResult<()> {
        if !self.sessions.contains_key(&session.id) {
            return Err(RepositoryError::NotFound);
        }
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn list_expirable(&self, now: DateTime<Utc>, active_grace_hours: i64) -> RepoResult<Vec<UploadSession>> {
        Ok(self
            .sessions
            .iter()
            .filter(|s| {
                matches!(
                    s.status,
                    crate::domain::upload_session::UploadSessionStatus::Initiated
                        | crate::domain::upload_session::UploadSessionStatus::Uploading
                )
            })
            .filter(|s| match s.expires_at {
                Some(exp) => exp <= now,
                None => now.signed_duration_since(s.updated_at) > chrono::Duration::hours(active_grace_hours),
            })
            .map(|s| s.clone())
            .collect())
    }

    async fn delete_terminal_older_than(&self, cutoff: DateTime<Utc>, batch_size: u32) -> RepoResult<u64> {
        let victims: Vec<String> = self
            .sessions
            .iter()
            .filter(|s| s.status.is_terminal() && s.updated_at < cutoff)
            .take(batch_size as usize)
            .map(|s| s.id.clone())
            .collect();
        let count = victims.len() as u64;
        for id in victims {
            self.sessions.remove(&id);
            self.parts.retain(|(uid, _), _| uid != &id);
        }
        Ok(count)
    }

    async fn upsert_part(&self, part: &UploadPart) -> RepoResult<()> {
        self.parts.insert((part.upload_id.clone(), part.part_no), part.clone());
        Ok(())
    }

    async fn get_part(&self, upload_id: &str, part_no: u32) -> RepoResult<Option<UploadPart>> {
        Ok(self.parts.get(&(upload_id.to_string(), part_no)).map(|p| p.clone()))
    }

    async fn list_parts(&self, upload_id: &str) -> RepoResult<Vec<UploadPart>> {
        let mut parts: Vec<UploadPart> = self
            .parts
            .iter()
            .filter(|entry| entry.key().0 == upload_id)
            .map(|entry| entry.value().clone())
            .collect();
        parts.sort_by_key(|p| p.part_no);
        Ok(parts)
    }

    async fn delete_parts(&self, upload_id: &str) -> RepoResult<()> {
        self.parts.retain(|(uid, _), _| uid != upload_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryVfsNodeRepository {
    rows: DashMap<String, VfsNode>,
}

impl InMemoryVfsNodeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VfsNodeRepository for InMemoryVfsNodeRepository {
    async fn create(&self, node: &VfsNode) -> RepoResult<()> {
        self.rows.insert(node.id.clone(), node.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> RepoResult<VfsNode> {
        self.rows.get(id).map(|n| n.clone()).ok_or(RepositoryError::NotFound)
    }

    async fn find_child(&self, scope_id: &str, parent_id: &str, name: &str) -> RepoResult<Option<VfsNode>> {
        Ok(self
            .rows
            .iter()
            .find(|n| {
                n.scope_id == scope_id
                    && n.parent_id == parent_id
                    && n.name == name
                    && matches!(n.status, crate::domain::vfs_node::VfsNodeStatus::Active)
            })
            .map(|n| n.clone()))
    }

    async fn list_children(&self, scope_id: &str, parent_id: &str) -> RepoResult<Vec<VfsNode>> {
        Ok(self
            .rows
            .iter()
            .filter(|n| n.scope_id == scope_id && n.parent_id == parent_id)
            .map(|n| n.clone())
            .collect())
    }

    async fn update(&self, node: &VfsNode) -> RepoResult<()> {
        if !self.rows.contains_key(&node.id) {
            return Err(RepositoryError::NotFound);
        }
        self.rows.insert(node.id.clone(), node.clone());
        Ok(())
    }

    async fn delete_subtree(&self, id: &str) -> RepoResult<u64> {
        let mut to_delete = vec![id.to_string()];
        let mut deleted = 0u64;
        while let Some(current) = to_delete.pop() {
            let children: Vec<String> = self
                .rows
                .iter()
                .filter(|n| n.parent_id == current)
                .map(|n| n.id.clone())
                .collect();
            to_delete.extend(children);
            if self.rows.remove(&current).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn sum_active_size(&self, scope_id: &str) -> RepoResult<u64> {
        Ok(self
            .rows
            .iter()
            .filter(|n| n.scope_id == scope_id && matches!(n.status, crate::domain::vfs_node::VfsNodeStatus::Active))
            .filter_map(|n| n.size)
            .sum())
    }
}

#[derive(Default)]
pub struct InMemoryJobRepository {
    rows: DashMap<String, Task>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create(&self, task: &Task) -> RepoResult<()> {
        self.rows.insert(task.task_id.clone(), task.clone());
        Ok(())
    }

    async fn get(&self, task_id: &str) -> RepoResult<Task> {
        self.rows.get(task_id).map(|t| t.clone()).ok_or(RepositoryError::NotFound)
    }

    async fn update(&self, task: &Task) -> RepoResult<()> {
        if !self.rows.contains_key(&task.task_id) {
            return Err(RepositoryError::NotFound);
        }
        self.rows.insert(task.task_id.clone(), task.clone());
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
        let mut rows: Vec<Task> = self
            .rows
            .iter()
            .filter(|t| task_type.map(|tt| tt == t.task_type).unwrap_or(true))
            .filter(|t| status.map(|s| s == t.status).unwrap_or(true))
            .filter(|t| created_by.map(|c| c == t.created_by).unwrap_or(true))
            .map(|t| t.clone())
            .collect();
        rows.sort_by_key(|t| std::cmp::Reverse(t.created_at));
        Ok(rows.into_iter().skip(offset as usize).take(limit as usize).collect())
    }

    async fn delete(&self, task_id: &str) -> RepoResult<()> {
        self.rows.remove(task_id).ok_or(RepositoryError::NotFound)?;
        Ok(())
    }

    async fn list_stalled(&self, stalled_after: DateTime<Utc>) -> RepoResult<Vec<Task>> {
        Ok(self
            .rows
            .iter()
            .filter(|t| t.status == TaskStatus::Running && t.started_at.map(|s| s < stalled_after).unwrap_or(false))
            .map(|t| t.clone())
            .collect())
    }

    async fn claim_next_pending(&self) -> RepoResult<Option<Task>> {
        let candidate = self
            .rows
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .min_by_key(|t| t.created_at)
            .map(|t| t.task_id.clone());
        match candidate {
            None => Ok(None),
            Some(id) => {
                let mut entry = self.rows.get_mut(&id).ok_or(RepositoryError::NotFound)?;
                entry.mark_running().map_err(|e| RepositoryError::Conflict(e.to_string()))?;
                Ok(Some(entry.clone()))
            }
        }
    }
}

#[derive(Default)]
pub struct InMemoryFsIndexRepository {
    entries: DashMap<(String, String), FsIndexEntry>,
    states: DashMap<String, FsIndexState>,
    dirty: DashMap<String, FsIndexDirty>,
}

impl InMemoryFsIndexRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FsIndexRepository for InMemoryFsIndexRepository {
    async fn upsert_entry(&self, entry: &FsIndexEntry) -> RepoResult<()> {
        self.entries.insert((entry.mount_id.clone(), entry.fs_path.clone()), entry.clone());
        Ok(())
    }

    async fn delete_entry(&self, mount_id: &str, fs_path: &str) -> RepoResult<()> {
        self.entries.remove(&(mount_id.to_string(), fs_path.to_string()));
        Ok(())
    }

    async fn delete_stale(&self, mount_id: &str, index_run_id: &str) -> RepoResult<u64> {
        let victims: Vec<(String, String)> = self
            .entries
            .iter()
            .filter(|e| e.mount_id == mount_id && e.index_run_id != index_run_id)
            .map(|e| e.key().clone())
            .collect();
        let count = victims.len() as u64;
        for key in victims {
            self.entries.remove(&key);
        }
        Ok(count)
    }

    async fn search(
        &self,
        query: &str,
        mount_id: Option<&str>,
        path_prefix: Option<&str>,
        after: Option<(i64, String, String)>,
        limit: u32,
    ) -> RepoResult<Vec<FsIndexEntry>> {
        let needle = query.to_lowercase();
        let mut rows: Vec<FsIndexEntry> = self
            .entries
            .iter()
            .filter(|e| e.name.to_lowercase().contains(&needle))
            .filter(|e| mount_id.map(|m| m == e.mount_id).unwrap_or(true))
            .filter(|e| {
                path_prefix
                    .map(|p| e.fs_path.starts_with(&format!("{p}/")) || e.fs_path == p)
                    .unwrap_or(true)
            })
            .map(|e| e.clone())
            .collect();
        rows.sort_by(|a, b| {
            b.modified_ms
                .cmp(&a.modified_ms)
                .then_with(|| a.fs_path.cmp(&b.fs_path))
                .then_with(|| b.mount_id.cmp(&a.mount_id))
        });
        if let Some((after_modified, after_path, after_id)) = after {
            rows.retain(|e| {
                if e.modified_ms != after_modified {
                    e.modified_ms < after_modified
                } else if e.fs_path != after_path {
                    e.fs_path.as_str() > after_path.as_str()
                } else {
                    e.mount_id.as_str() < after_id.as_str()
                }
            });
        }
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn count_for_mount(&self, mount_id: &str) -> RepoResult<u64> {
        Ok(self.entries.iter().filter(|e| e.mount_id == mount_id).count() as u64)
    }

    async fn clear_mount(&self, mount_id: &str) -> RepoResult<()> {
        self.entries.retain(|k, _| k.0 != mount_id);
        self.dirty.retain(|_, v| v.mount_id != mount_id);
        Ok(())
    }

    async fn get_state(&self, mount_id: &str) -> RepoResult<Option<FsIndexState>> {
        Ok(self.states.get(mount_id).map(|s| s.clone()))
    }

    async fn put_state(&self, state: &FsIndexState) -> RepoResult<()> {
        self.states.insert(state.mount_id.clone(), state.clone());
        Ok(())
    }

    async fn enqueue_dirty(&self, dirty: &FsIndexDirty) -> RepoResult<()> {
        let key = FsIndexDirty::dedupe_key(&dirty.mount_id, &dirty.fs_path);
        self.dirty.insert(key, dirty.clone());
        Ok(())
    }

    async fn drain_dirty(&self, mount_id: Option<&str>, max_items: u32) -> RepoResult<Vec<FsIndexDirty>> {
        let mut rows: Vec<FsIndexDirty> = self
            .dirty
            .iter()
            .filter(|d| mount_id.map(|m| m == d.mount_id).unwrap_or(true))
            .map(|d| d.clone())
            .collect();
        rows.sort_by_key(|d| d.created_at_ms);
        rows.truncate(max_items as usize);
        Ok(rows)
    }

    async fn count_dirty(&self, mount_id: &str) -> RepoResult<u64> {
        Ok(self.dirty.iter().filter(|d| d.mount_id == mount_id).count() as u64)
    }

    async fn ack_dirty(&self, mount_id: &str, fs_path: &str) -> RepoResult<()> {
        self.dirty.remove(&FsIndexDirty::dedupe_key(mount_id, fs_path));
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryUsageSnapshotRepository {
    rows: DashMap<String, UsageSnapshot>,
}

impl InMemoryUsageSnapshotRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageSnapshotRepository for InMemoryUsageSnapshotRepository {
    async fn put(&self, snapshot: &UsageSnapshot) -> RepoResult<()> {
        self.rows.insert(snapshot.storage_config_id.clone(), snapshot.clone());
        Ok(())
    }

    async fn latest(&self, storage_config_id: &str) -> RepoResult<Option<UsageSnapshot>> {
        Ok(self.rows.get(storage_config_id).map(|s| s.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fs_index::DirtyOp;

    #[tokio::test]
    async fn dirty_dedupe_keeps_one_row_with_newest_op() {
        let repo = InMemoryFsIndexRepository::default();
        repo.enqueue_dirty(&FsIndexDirty {
            mount_id: "m1".into(),
            fs_path: "/a.txt".into(),
            op: DirtyOp::Upsert,
            created_at_ms: 1,
        })
        .await
        .unwrap();
        repo.enqueue_dirty(&FsIndexDirty {
            mount_id: "m1".into(),
            fs_path: "/a.txt".into(),
            op: DirtyOp::Delete,
            created_at_ms: 2,
        })
        .await
        .unwrap();
        assert_eq!(repo.count_dirty("m1").await.unwrap(), 1);
        let drained = repo.drain_dirty(Some("m1"), 10).await.unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].op, DirtyOp::Delete);
        assert_eq!(drained[0].created_at_ms, 2);
    }

    #[tokio::test]
    async fn job_repo_claims_only_pending() {
        let repo = InMemoryJobRepository::default();
        let task = Task::new(TaskType::Copy, serde_json::json!({}), "admin", crate::domain::job::TriggerType::Manual, None);
        repo.create(&task).await.unwrap();
        let claimed = repo.claim_next_pending().await.unwrap().unwrap();
        assert_eq!(claimed.status, TaskStatus::Running);
        assert!(repo.claim_next_pending().await.unwrap().is_none());
    }
}
