// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! The fs-index query interface and admin controls. The opaque cursor
//! reuses `domain::proxy_signature`'s base64 conventions; admin mutations
//! invalidate the `EventBus`-driven cache bus.

use crate::application::cache_bus::CacheBus;
use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::events::{CacheInvalidation, CacheScope};
use crate::domain::fs_index::{FsIndexEntry, FsIndexState, IndexRecommendation};
use crate::domain::job::{TaskType, TriggerType};
use crate::domain::principal::Principal;
use crate::domain::repository::{FsIndexRepository, MountRepository};
use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const MIN_QUERY_LEN: usize = 3;
const MAX_LIMIT: u32 = 200;
const CURSOR_VERSION: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Global,
    Mount,
    Directory,
}

pub struct SearchQuery {
    pub query: String,
    pub scope: SearchScope,
    pub mount_id: Option<String>,
    pub path_prefix: Option<String>,
    pub limit: u32,
    pub cursor: Option<String>,
}

pub struct SearchPage {
    pub entries: Vec<FsIndexEntry>,
    pub next_cursor: Option<String>,
}

/// The opaque keyset-cursor payload. `filter_digest` binds the cursor to
/// the exact filters it was minted under — a cursor whose embedded filters
/// disagree with the request it's replayed against is rejected, since
/// resuming a different query at an arbitrary offset would silently change
/// what "next page" means.
#[derive(Debug, Serialize, Deserialize)]
struct Cursor {
    v: u8,
    modified_ms: i64,
    fs_path: String,
    id: String,
    filter_digest: String,
}

fn filter_digest(q: &SearchQuery) -> String {
    format!(
        "{}:{:?}:{}:{}",
        q.query,
        q.scope,
        q.mount_id.as_deref().unwrap_or(""),
        q.path_prefix.as_deref().unwrap_or("")
    )
}

fn encode_cursor(entry: &FsIndexEntry, digest: &str) -> String {
    let id = format!("{}:{}", entry.mount_id, entry.fs_path);
    let payload = Cursor {
        v: CURSOR_VERSION,
        modified_ms: entry.modified_ms,
        fs_path: entry.fs_path.clone(),
        id,
        filter_digest: digest.to_string(),
    };
    let json = serde_json::to_vec(&payload).expect("cursor payload always serializes");
    BASE64URL.encode(json)
}

fn decode_cursor(raw: &str, expected_digest: &str) -> CoreResult<(i64, String, String)> {
    let bytes = BASE64URL.decode(raw).map_err(|_| CoreError::Validation("malformed search cursor".into()))?;
    let cursor: Cursor = serde_json::from_slice(&bytes).map_err(|_| CoreError::Validation("malformed search cursor".into()))?;
    if cursor.v != CURSOR_VERSION {
        return Err(CoreError::Validation("unsupported search cursor version".into()));
    }
    if cursor.filter_digest != expected_digest {
        return Err(CoreError::Validation("search cursor does not match the current query filters".into()));
    }
    Ok((cursor.modified_ms, cursor.fs_path, cursor.id))
}

/// read-side query interface plus admin controls. The
/// write side (`FsIndexDirty` production) lives at the call sites that
/// mutate mounts; this service only reads and administers.
pub struct SearchIndexService {
    fs_index: Arc<dyn FsIndexRepository>,
    mounts: Arc<dyn MountRepository>,
    cache: Arc<CacheBus>,
}

impl SearchIndexService {
    pub fn new(fs_index: Arc<dyn FsIndexRepository>, mounts: Arc<dyn MountRepository>, cache: Arc<CacheBus>) -> Self {
        Self { fs_index, mounts, cache }
    }

    /// read side. Validates query length, resolves the
    /// scope filters, decodes and checks the cursor's filter digest, and
    /// returns one page ordered `modifiedMs DESC, fsPath ASC, id DESC`.
    pub async fn search(&self, query: SearchQuery) -> CoreResult<SearchPage> {
        if query.query.chars().count() < MIN_QUERY_LEN {
            return Err(CoreError::Validation(format!("query must be at least {MIN_QUERY_LEN} characters")));
        }
        let limit = query.limit.clamp(1, MAX_LIMIT);

        let mount_id = match query.scope {
            SearchScope::Mount | SearchScope::Directory => {
                Some(query.mount_id.clone().ok_or_else(|| CoreError::Validation("mountId is required for this scope".into()))?)
            }
            SearchScope::Global => None,
        };
        let path_prefix = match query.scope {
            SearchScope::Directory => {
                Some(query.path_prefix.clone().ok_or_else(|| CoreError::Validation("pathPrefix is required for directory scope".into()))?)
            }
            _ => None,
        };

        let digest = filter_digest(&query);
        let after = match &query.cursor {
            Some(raw) => Some(decode_cursor(raw, &digest)?),
            None => None,
        };

        let entries = self
            .fs_index
            .search(&query.query, mount_id.as_deref(), path_prefix.as_deref(), after, limit + 1)
            .await?;

        let has_more = entries.len() as u32 > limit;
        let mut page = entries;
        page.truncate(limit as usize);
        let next_cursor = if has_more { page.last().map(|e| encode_cursor(e, &digest)) } else { None };

        Ok(SearchPage { entries: page, next_cursor })
    }

    /// Admin status endpoint backing: current state plus the recommended
    /// next action for each requested mount.
    pub async fn status(&self, mount_id: &str) -> CoreResult<(FsIndexState, IndexRecommendation)> {
        let state = self
            .fs_index
            .get_state(mount_id)
            .await?
            .unwrap_or(FsIndexState { mount_id: mount_id.to_string(), status: crate::domain::fs_index::FsIndexStatus::NotReady, last_indexed_ms: None, last_error: None });
        let dirty_count = self.fs_index.count_dirty(mount_id).await?;
        let recommendation = crate::domain::fs_index::recommend(&state, dirty_count);
        Ok((state, recommendation))
    }

    /// Admin `clear`: drops derived rows for a mount and marks its state
    /// `not_ready`, invalidating the search cache scope.
    pub async fn clear(&self, mount_id: &str, principal: &Principal) -> CoreResult<()> {
        require_admin(principal)?;
        self.fs_index.clear_mount(mount_id).await?;
        self.fs_index
            .put_state(&FsIndexState { mount_id: mount_id.to_string(), status: crate::domain::fs_index::FsIndexStatus::NotReady, last_indexed_ms: None, last_error: None })
            .await?;
        self.cache.apply(&CacheInvalidation { scope: CacheScope::SearchIndex, mount_id: Some(mount_id.to_string()), storage_config_id: None });
        Ok(())
    }

    /// Admin `rebuild all/some`: enqueues an `fs_index_rebuild` job scoped
    /// to `mount_ids`, or every active mount when `None`.
    pub async fn enqueue_rebuild(
        &self,
        mount_ids: Option<Vec<String>>,
        principal: &Principal,
        job_engine: &crate::application::job_engine::JobEngine,
    ) -> CoreResult<crate::domain::job::Task> {
        require_admin(principal)?;
        let targets = match mount_ids {
            Some(ids) => ids,
            None => self.mounts.list_active().await?.into_iter().map(|m| m.id).collect(),
        };
        let payload = serde_json::json!({ "mountIds": targets });
        job_engine.create_job(TaskType::FsIndexRebuild, payload, principal, TriggerType::Manual, None).await
    }

    /// Admin `apply dirty`: enqueues an `fs_index_apply_dirty` job, scoped
    /// to one mount when given.
    pub async fn enqueue_apply_dirty(
        &self,
        mount_id: Option<String>,
        max_items: u32,
        principal: &Principal,
        job_engine: &crate::application::job_engine::JobEngine,
    ) -> CoreResult<crate::domain::job::Task> {
        require_admin(principal)?;
        let payload = serde_json::json!({ "mountId": mount_id, "maxItems": max_items });
        job_engine.create_job(TaskType::FsIndexApplyDirty, payload, principal, TriggerType::Manual, None).await
    }

    /// Admin `stop`: cooperative cancellation of a running rebuild/apply
    /// job, delegated to the job engine's own cancellation path.
    pub async fn stop(&self, job_id: &str, principal: &Principal, job_engine: &crate::application::job_engine::JobEngine) -> CoreResult<()> {
        require_admin(principal)?;
        job_engine.cancel_job(job_id, principal).await?;
        Ok(())
    }
}

fn require_admin(principal: &Principal) -> CoreResult<()> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(CoreError::Forbidden("fs index administration requires an admin principal".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::{InMemoryFsIndexRepository, InMemoryMountRepository};

    fn service() -> SearchIndexService {
        SearchIndexService::new(Arc::new(InMemoryFsIndexRepository::default()), Arc::new(InMemoryMountRepository::new()), Arc::new(CacheBus::new()))
    }

    fn query(q: &str) -> SearchQuery {
        SearchQuery { query: q.into(), scope: SearchScope::Global, mount_id: None, path_prefix: None, limit: 50, cursor: None }
    }

    #[tokio::test]
    async fn rejects_queries_shorter_than_three_characters() {
        let err = service().search(query("ab")).await.unwrap_err();
        assert_eq!(err.kind(), crate::domain::errors::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn mount_scope_requires_a_mount_id() {
        let mut q = query("report");
        q.scope = SearchScope::Mount;
        let err = service().search(q).await.unwrap_err();
        assert_eq!(err.kind(), crate::domain::errors::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn directory_scope_requires_a_path_prefix() {
        let mut q = query("report");
        q.scope = SearchScope::Directory;
        q.mount_id = Some("m1".into());
        let err = service().search(q).await.unwrap_err();
        assert_eq!(err.kind(), crate::domain::errors::ErrorKind::Validation);
    }

    #[test]
    fn cursor_round_trips_under_matching_filters() {
        let q = query("report");
        let digest = filter_digest(&q);
        let entry = FsIndexEntry {
            mount_id: "m1".into(),
            fs_path: "/a/report.pdf".into(),
            name: "report.pdf".into(),
            is_dir: false,
            size: 10,
            modified_ms: 42,
            mimetype: None,
            index_run_id: "r1".into(),
            updated_at_ms: 0,
        };
        let cursor = encode_cursor(&entry, &digest);
        let (modified_ms, fs_path, _id) = decode_cursor(&cursor, &digest).unwrap();
        assert_eq!(modified_ms, 42);
        assert_eq!(fs_path, "/a/report.pdf");
    }

    #[test]
    fn cursor_rejects_a_filter_mismatch() {
        let q = query("report");
        let digest = filter_digest(&q);
        let entry = FsIndexEntry {
            mount_id: "m1".into(),
            fs_path: "/a/report.pdf".into(),
            name: "report.pdf".into(),
            is_dir: false,
            size: 10,
            modified_ms: 42,
            mimetype: None,
            index_run_id: "r1".into(),
            updated_at_ms: 0,
        };
        let cursor = encode_cursor(&entry, &digest);

        let mut other = query("invoice");
        other.scope = SearchScope::Global;
        let other_digest = filter_digest(&other);
        let err = decode_cursor(&cursor, &other_digest).unwrap_err();
        assert_eq!(err.kind(), crate::domain::errors::ErrorKind::Validation);
    }
}
