// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Upload-session store & multipart orchestrator.
//!
//! The storage driver contract (`domain::driver::StorageDriver`) exposes no
//! back-end-native multipart primitives — only whole-object `upload_file`/
//! `download_file`/`remove` — so this orchestrator implements both
//! strategies on top of that uniform surface: each part is staged as its
//! own object under a `.cloudpaste-uploads/{uploadId}/part-{n}` key, and
//! `complete` reassembles the final object by streaming the staged parts
//! back through the driver in order. This keeps every back-end (including
//! the chat-as-storage drivers) eligible for multipart without a
//! back-end-specific resumable-upload client.

use crate::domain::driver::{ByteStream, DriverCtx};
use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::path;
use crate::domain::repository::{UploadSessionRepository, VfsNodeRepository};
use crate::domain::upload_session::{
    PartVerificationPolicy, UploadPart, UploadPartStatus, UploadSession, UploadSessionStatus, UploadStrategy,
};
use bytes::Bytes;
use chrono::Utc;
use futures::stream;
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;

use crate::application::cache_bus::CacheBus;
use crate::application::mount_manager::MountManager;
use crate::application::quota_guard::QuotaGuard;
use crate::domain::events::{CacheInvalidation, CacheScope, GatewayEvent, StorageEvent};
use crate::domain::fs_index::{DirtyOp, FsIndexDirty};
use crate::domain::repository::FsIndexRepository;
use crate::infrastructure::event_bus::EventBus;

const DEFAULT_PART_SIZE: u64 = 8 * 1024 * 1024;
const DEFAULT_SESSION_TTL_HOURS: i64 = 24;
const PROXY_CHUNK_POLL_ATTEMPTS: u32 = 10;
const PROXY_CHUNK_POLL_DELAY_MS: u64 = 200;

fn staging_key(upload_id: &str, part_no: u32) -> String {
    format!(".cloudpaste-uploads/{upload_id}/part-{part_no:06}")
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionDescriptor {
    pub upload_id: String,
    pub strategy: UploadStrategy,
    pub part_size: u64,
    pub total_parts: u32,
    pub upload_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignedPart {
    pub part_no: u32,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkOutcome {
    pub part_no: u32,
    pub status: UploadPartStatus,
    pub skipped: bool,
}

pub struct MultipartOrchestrator {
    sessions: Arc<dyn UploadSessionRepository>,
    vfs_nodes: Arc<dyn VfsNodeRepository>,
    fs_index: Arc<dyn FsIndexRepository>,
    mounts: Arc<MountManager>,
    quota: Arc<QuotaGuard>,
    cache: Arc<CacheBus>,
    events: EventBus,
}

impl MultipartOrchestrator {
    pub fn new(
        sessions: Arc<dyn UploadSessionRepository>,
        vfs_nodes: Arc<dyn VfsNodeRepository>,
        fs_index: Arc<dyn FsIndexRepository>,
        mounts: Arc<MountManager>,
        quota: Arc<QuotaGuard>,
        cache: Arc<CacheBus>,
        events: EventBus,
    ) -> Self {
        Self { sessions, vfs_nodes, fs_index, mounts, quota, cache, events }
    }

    /// `initialize`. `part_size`/`part_count` default to an
    /// 8 MiB fixed part size when unspecified by the caller.
    #[allow(clippy::too_many_arguments)]
    pub async fn initialize(
        &self,
        principal_id: &str,
        mount: &crate::domain::mount::Mount,
        storage_config: &crate::domain::storage_config::StorageConfig,
        fs_path: &str,
        file_name: &str,
        file_size: u64,
        part_size: Option<u64>,
        ctx: &DriverCtx,
    ) -> CoreResult<SessionDescriptor> {
        path::validate_filename(file_name).map_err(|e| CoreError::Validation(e.to_string()))?;

        let target_path = format!("{}/{}", fs_path.trim_end_matches('/'), file_name);
        let driver = self.mounts.driver_for(mount).await?;
        let existing_bytes = driver.get_file_info(&target_path, ctx).await.ok().and_then(|info| info.size).unwrap_or(0);
        self.quota.check(storage_config, file_size, existing_bytes).await?;

        let strategy = if storage_config.storage_type.is_storage_first() {
            UploadStrategy::SingleSession
        } else {
            UploadStrategy::PerPartUrl
        };
        let verification = match strategy {
            UploadStrategy::PerPartUrl => PartVerificationPolicy::ClientKeeps,
            UploadStrategy::SingleSession => PartVerificationPolicy::ServerCanList,
        };

        let part_size = part_size.unwrap_or(DEFAULT_PART_SIZE).max(1);
        let total_parts = file_size.div_ceil(part_size).max(1) as u32;

        let mut session = UploadSession::new(
            principal_id,
            mount.storage_type,
            storage_config.id.clone(),
            mount.id.clone(),
            fs_path,
            file_name,
            file_size,
            strategy,
            verification,
            chrono::Duration::hours(DEFAULT_SESSION_TTL_HOURS),
        );
        session.part_size = Some(part_size);
        session.total_parts = Some(total_parts);
        self.sessions.create(&session).await?;

        Ok(SessionDescriptor {
            upload_id: session.id.clone(),
            strategy,
            part_size,
            total_parts,
            upload_url: format!("/api/fs/multipart/upload-chunk?upload_id={}", session.id),
        })
    }

    /// `signParts`. `per_part_url` sessions receive one
    /// gateway-relative URL per requested part number; `single_session`
    /// sessions are handed the session's own chunk-upload URL for every
    /// part number requested.
    pub async fn sign_parts(&self, upload_id: &str, principal_id: &str, part_numbers: &[u32]) -> CoreResult<Vec<SignedPart>> {
        let mut session = self.sessions.get(upload_id).await?;
        session.ensure_owner(principal_id)?;
        if session.status == UploadSessionStatus::Initiated {
            session.transition(UploadSessionStatus::Uploading)?;
            self.sessions.update(&session).await?;
        }

        Ok(part_numbers
            .iter()
            .map(|&part_no| SignedPart {
                part_no,
                url: format!("/api/fs/multipart/upload-chunk?upload_id={upload_id}&part_no={part_no}"),
            })
            .collect())
    }

    /// `proxyChunk` (single_session only). `content_range` is
    /// the parsed `(start, end_inclusive, total)` from the `Content-Range`
    /// header.
    pub async fn proxy_chunk(
        &self,
        upload_id: &str,
        principal_id: &str,
        content_range: (u64, u64, u64),
        body: ByteStream,
        ctx: &DriverCtx,
    ) -> CoreResult<ChunkOutcome> {
        let (start, end, _total) = content_range;
        let mut session = self.sessions.get(upload_id).await?;
        session.ensure_owner(principal_id)?;
        if session.strategy != UploadStrategy::SingleSession {
            return Err(CoreError::Validation("proxy_chunk only applies to single_session uploads".into()));
        }
        if session.status.is_terminal() {
            return Err(CoreError::Conflict("upload session is already terminal".into()));
        }
        let part_size = session.part_size.unwrap_or(DEFAULT_PART_SIZE);
        let part_no = (start / part_size) as u32 + 1;

        if let Some(existing) = self.sessions.get_part(upload_id, part_no).await? {
            if existing.byte_start == start && existing.byte_end == end {
                match existing.status {
                    UploadPartStatus::Uploaded => {
                        return Ok(ChunkOutcome { part_no, status: UploadPartStatus::Uploaded, skipped: true });
                    }
                    UploadPartStatus::Uploading => {
                        for _ in 0..PROXY_CHUNK_POLL_ATTEMPTS {
                            tokio::time::sleep(std::time::Duration::from_millis(PROXY_CHUNK_POLL_DELAY_MS)).await;
                            if let Some(part) = self.sessions.get_part(upload_id, part_no).await? {
                                if part.status == UploadPartStatus::Uploaded {
                                    return Ok(ChunkOutcome { part_no, status: UploadPartStatus::Uploaded, skipped: true });
                                }
                            }
                        }
                    }
                    UploadPartStatus::Error => {}
                }
            }
        }

        if session.status == UploadSessionStatus::Initiated {
            session.transition(UploadSessionStatus::Uploading)?;
        }

        let mut part = UploadPart {
            upload_id: upload_id.to_string(),
            part_no,
            size: end - start + 1,
            provider_part_id: None,
            provider_meta: None,
            byte_start: start,
            byte_end: end,
            status: UploadPartStatus::Uploading,
        };
        self.sessions.upsert_part(&part).await?;

        let driver = self.mounts.driver_for(&ctx.mount).await?;
        let staged = staging_key(upload_id, part_no);
        let outcome = driver.upload_file(&staged, body, ctx).await;

        match outcome {
            Ok(_) => {
                part.status = UploadPartStatus::Uploaded;
                self.sessions.upsert_part(&part).await?;
                session.bytes_uploaded += part.size;
                session.uploaded_parts += 1;
                session.next_expected_range = Some(end + 1);
                self.sessions.update(&session).await?;
                Ok(ChunkOutcome { part_no, status: UploadPartStatus::Uploaded, skipped: false })
            }
            Err(err) => {
                part.status = UploadPartStatus::Error;
                self.sessions.upsert_part(&part).await?;
                Err(err)
            }
        }
    }

    pub async fn list_parts(&self, upload_id: &str, principal_id: &str) -> CoreResult<Vec<UploadPart>> {
        let session = self.sessions.get(upload_id).await?;
        session.ensure_owner(principal_id)?;
        let mut parts = self.sessions.list_parts(upload_id).await?;
        parts.sort_by_key(|p| p.part_no);
        Ok(parts)
    }

    /// `complete`. Re-checks quota, verifies part coverage
    /// per the session's strategy, reassembles the final object from staged
    /// parts, and emits a cache invalidation plus an index `upsert` dirty
    /// entry.
    pub async fn complete(
        &self,
        upload_id: &str,
        principal_id: &str,
        ctx: &DriverCtx,
        storage_config: &crate::domain::storage_config::StorageConfig,
    ) -> CoreResult<crate::domain::driver::UploadOutcome> {
        let mut session = self.sessions.get(upload_id).await?;
        session.ensure_owner(principal_id)?;
        if session.status.is_terminal() {
            return Err(CoreError::Conflict("upload session is already terminal".into()));
        }

        let driver = self.mounts.driver_for(&ctx.mount).await?;
        let final_path = format!("{}/{}", session.fs_path.trim_end_matches('/'), session.file_name);
        let existing_bytes = driver.get_file_info(&final_path, ctx).await.ok().and_then(|info| info.size).unwrap_or(0);
        self.quota.check(storage_config, session.file_size, existing_bytes).await?;

        let parts = self.sessions.list_parts(upload_id).await?;
        let covers = match session.strategy {
            UploadStrategy::PerPartUrl => UploadPart::covers_contiguous(&parts, session.file_size),
            UploadStrategy::SingleSession => UploadPart::sum_matches(&parts, session.file_size),
        };
        if !covers {
            return Err(CoreError::PreconditionFailed("uploaded parts do not cover the declared file size".into()));
        }

        let mut sorted: Vec<&UploadPart> = parts.iter().filter(|p| p.status == UploadPartStatus::Uploaded).collect();
        sorted.sort_by_key(|p| p.part_no);
        let chunks: Vec<CoreResult<Bytes>> = {
            let mut out = Vec::with_capacity(sorted.len());
            for part in &sorted {
                let staged = staging_key(upload_id, part.part_no);
                let mut body = driver.download_file(&staged, None, ctx).await?;
                let mut buf = Vec::new();
                while let Some(chunk) = body.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                out.push(Ok(Bytes::from(buf)));
            }
            out
        };
        let reassembled: ByteStream = Box::pin(stream::iter(chunks));
        let outcome = driver.upload_file(&final_path, reassembled, ctx).await?;

        for part in &sorted {
            let staged = staging_key(upload_id, part.part_no);
            let _ = driver.remove(&staged, ctx).await;
        }
        self.sessions.delete_parts(upload_id).await?;

        session.transition(UploadSessionStatus::Completed)?;
        self.sessions.update(&session).await?;

        self.upsert_vfs_node(&session, ctx).await?;
        self.record_write(&session, ctx).await?;

        Ok(outcome)
    }

    /// Reflects the completed upload into the mount's `VfsNode` tree, scoped
    /// to its storage config so multiple mounts over the same config share
    /// one tree view.
    async fn upsert_vfs_node(&self, session: &UploadSession, ctx: &DriverCtx) -> CoreResult<()> {
        let parent_id = String::new();
        if let Some(mut existing) = self.vfs_nodes.find_child(&session.storage_config_id, &parent_id, &session.file_name).await? {
            existing.size = Some(session.file_size);
            existing.updated_at = Utc::now();
            self.vfs_nodes.update(&existing).await?;
            return Ok(());
        }
        let node = crate::domain::vfs_node::VfsNode::new_file(
            "principal",
            &session.principal_id,
            "storage_config",
            &session.storage_config_id,
            parent_id,
            &session.file_name,
            session.file_size,
            session.storage_type,
        );
        let _ = &ctx.req_id;
        self.vfs_nodes.create(&node).await?;
        Ok(())
    }

    /// `abort`. Discards staged parts and transitions the
    /// session to `aborted`.
    pub async fn abort(&self, upload_id: &str, principal_id: &str, ctx: &DriverCtx) -> CoreResult<()> {
        let mut session = self.sessions.get(upload_id).await?;
        session.ensure_owner(principal_id)?;
        if session.status.is_terminal() {
            return Err(CoreError::Conflict("upload session is already terminal".into()));
        }
        if let Ok(driver) = self.mounts.driver_for(&ctx.mount).await {
            let parts = self.sessions.list_parts(upload_id).await?;
            for part in &parts {
                let staged = staging_key(upload_id, part.part_no);
                let _ = driver.remove(&staged, ctx).await;
            }
        }
        self.sessions.delete_parts(upload_id).await?;
        session.transition(UploadSessionStatus::Aborted)?;
        self.sessions.update(&session).await?;
        Ok(())
    }

    async fn record_write(&self, session: &UploadSession, ctx: &DriverCtx) -> CoreResult<()> {
        self.fs_index
            .enqueue_dirty(&FsIndexDirty {
                mount_id: session.mount_id.clone(),
                fs_path: format!("{}/{}", session.fs_path.trim_end_matches('/'), session.file_name),
                op: DirtyOp::Upsert,
                created_at_ms: Utc::now().timestamp_millis(),
            })
            .await?;
        self.cache.apply(&CacheInvalidation { scope: CacheScope::Directory, mount_id: Some(session.mount_id.clone()), storage_config_id: None });
        self.events.publish(GatewayEvent::Storage(StorageEvent::MountWritten {
            mount_id: session.mount_id.clone(),
            sub_path: session.fs_path.clone(),
            at: Utc::now(),
        }));
        let _ = &ctx.req_id;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_part_size_produces_one_part_for_small_files() {
        let total_parts = 4096u64.div_ceil(DEFAULT_PART_SIZE).max(1);
        assert_eq!(total_parts, 1);
    }

    #[test]
    fn staging_key_is_stable_and_namespaced() {
        assert_eq!(staging_key("u1", 3), ".cloudpaste-uploads/u1/part-000003");
    }
}
