// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Resuming a `single_session` upload after the client retries the same
//! byte range: the second `proxy_chunk` call for an already-uploaded part
//! must be a no-op (`skipped: true`) rather than re-writing the staged
//! object or double-counting progress.

mod common;

use cloudpaste_core::application::multipart::MultipartOrchestrator;
use cloudpaste_core::application::quota_guard::QuotaGuard;
use cloudpaste_core::application::cache_bus::CacheBus;
use cloudpaste_core::domain::repository::UploadSessionRepository;
use cloudpaste_core::domain::upload_session::{PartVerificationPolicy, UploadSession, UploadSessionStatus, UploadStrategy};
use cloudpaste_core::infrastructure::event_bus::EventBus;
use cloudpaste_core::infrastructure::repositories::{InMemoryFsIndexRepository, InMemoryUploadSessionRepository, InMemoryUsageSnapshotRepository, InMemoryVfsNodeRepository};
use std::sync::Arc;

#[tokio::test]
async fn re_uploading_the_same_range_is_skipped_not_duplicated() {
    let fixture = common::local_fixture("/m").await;
    let sessions = Arc::new(InMemoryUploadSessionRepository::new());
    let vfs_nodes = Arc::new(InMemoryVfsNodeRepository::new());
    let fs_index = Arc::new(InMemoryFsIndexRepository::default());
    let quota = Arc::new(QuotaGuard::new(Arc::new(InMemoryUsageSnapshotRepository::new())));
    let orch = MultipartOrchestrator::new(
        sessions.clone(),
        vfs_nodes,
        fs_index,
        fixture.mounts.clone(),
        quota,
        Arc::new(CacheBus::new()),
        EventBus::with_default_capacity(),
    );

    // initialize() only ever chooses single_session for storage-first
    // drivers (Google Drive/Hugging Face); this session is built directly
    // to exercise single_session semantics against a real, offline driver.
    let part_size = 4 * 1024 * 1024u64;
    let file_size = 20 * 1024 * 1024u64;
    let mut session = UploadSession::new(
        "p1",
        fixture.mount.storage_type,
        fixture.storage_config.id.clone(),
        fixture.mount.id.clone(),
        "/",
        "resume.bin",
        file_size,
        UploadStrategy::SingleSession,
        PartVerificationPolicy::ServerCanList,
        chrono::Duration::hours(1),
    );
    session.part_size = Some(part_size);
    session.total_parts = Some(file_size.div_ceil(part_size) as u32);
    sessions.create(&session).await.unwrap();

    let ctx = fixture.ctx();
    let chunk = vec![7u8; 4 * 1024 * 1024];
    let content_range = (0u64, 4 * 1024 * 1024 - 1, file_size);

    let first = orch.proxy_chunk(&session.id, "p1", content_range, common::byte_stream(chunk.clone()), &ctx).await.unwrap();
    assert!(!first.skipped);
    assert_eq!(first.part_no, 1);

    let second = orch.proxy_chunk(&session.id, "p1", content_range, common::byte_stream(chunk), &ctx).await.unwrap();
    assert!(second.skipped);
    assert_eq!(second.part_no, 1);

    let parts = orch.list_parts(&session.id, "p1").await.unwrap();
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].byte_start, 0);
    assert_eq!(parts[0].byte_end, 4 * 1024 * 1024 - 1);

    let reloaded = sessions.get(&session.id).await.unwrap();
    assert_eq!(reloaded.status, UploadSessionStatus::Uploading);
    assert_eq!(reloaded.uploaded_parts, 1);
    assert_eq!(reloaded.bytes_uploaded, 4 * 1024 * 1024);
}
