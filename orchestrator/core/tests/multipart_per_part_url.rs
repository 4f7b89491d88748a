// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! End-to-end multipart upload over a `per_part_url` session (the strategy
//! every backend except Google Drive/Hugging Face gets — see
//! `StorageType::is_storage_first`). The gateway never sees the raw bytes
//! for this strategy; the client stages each part directly against the
//! back-end (here, writing straight to the driver) and `sign_parts` only
//! hands out the URLs it would use to do so. This test drives that same
//! contract directly against the repository and driver rather than through
//! `proxy_chunk`, which this codebase reserves for `single_session` uploads.

mod common;

use cloudpaste_core::application::cache_bus::CacheBus;
use cloudpaste_core::application::multipart::MultipartOrchestrator;
use cloudpaste_core::application::quota_guard::QuotaGuard;
use cloudpaste_core::domain::driver::StorageDriver;
use cloudpaste_core::domain::repository::{FsIndexRepository, UploadSessionRepository};
use cloudpaste_core::domain::upload_session::{UploadPart, UploadPartStatus, UploadStrategy};
use cloudpaste_core::infrastructure::event_bus::EventBus;
use cloudpaste_core::infrastructure::repositories::{
    InMemoryFsIndexRepository, InMemoryUploadSessionRepository, InMemoryUsageSnapshotRepository, InMemoryVfsNodeRepository,
};
use std::sync::Arc;

fn orchestrator(
    fixture: &common::LocalFixture,
    sessions: Arc<InMemoryUploadSessionRepository>,
    vfs_nodes: Arc<InMemoryVfsNodeRepository>,
    fs_index: Arc<InMemoryFsIndexRepository>,
) -> MultipartOrchestrator {
    let quota = Arc::new(QuotaGuard::new(Arc::new(InMemoryUsageSnapshotRepository::new())));
    let cache = Arc::new(CacheBus::new());
    MultipartOrchestrator::new(sessions, vfs_nodes, fs_index, fixture.mounts.clone(), quota, cache, EventBus::with_default_capacity())
}

#[tokio::test]
async fn uploads_three_parts_then_completes_into_a_single_object() {
    let fixture = common::local_fixture("/m").await;
    let sessions = Arc::new(InMemoryUploadSessionRepository::new());
    let vfs_nodes = Arc::new(InMemoryVfsNodeRepository::new());
    let fs_index = Arc::new(InMemoryFsIndexRepository::default());
    let orch = orchestrator(&fixture, sessions.clone(), vfs_nodes.clone(), fs_index.clone());

    let part_size = 5 * 1024 * 1024u64;
    let parts: Vec<Vec<u8>> = vec![vec![1u8; 5 * 1024 * 1024], vec![2u8; 5 * 1024 * 1024], vec![3u8; 2 * 1024 * 1024]];
    let file_size: u64 = parts.iter().map(|p| p.len() as u64).sum();

    let descriptor = orch
        .initialize("p1", &fixture.mount, &fixture.storage_config, "/", "movie.mp4", file_size, Some(part_size), &fixture.ctx())
        .await
        .unwrap();
    assert_eq!(descriptor.strategy, UploadStrategy::PerPartUrl);
    assert_eq!(descriptor.total_parts, 3);

    let signed = orch.sign_parts(&descriptor.upload_id, "p1", &[1, 2, 3]).await.unwrap();
    assert_eq!(signed.len(), 3);
    for s in &signed {
        assert!(s.url.contains(&descriptor.upload_id));
        assert!(s.url.contains(&format!("part_no={}", s.part_no)));
    }

    // The client uploads each part straight to the back-end and reports it
    // to the ledger, exactly as sign_parts' URL shape implies it would.
    let driver = fixture.driver().await;
    let ctx = fixture.ctx();
    let mut start = 0u64;
    for (idx, data) in parts.iter().enumerate() {
        let part_no = (idx + 1) as u32;
        let end = start + data.len() as u64 - 1;
        let staged_key = format!(".cloudpaste-uploads/{}/part-{part_no:06}", descriptor.upload_id);
        driver.upload_file(&staged_key, common::byte_stream(data.clone()), &ctx).await.unwrap();
        sessions
            .upsert_part(&UploadPart {
                upload_id: descriptor.upload_id.clone(),
                part_no,
                size: data.len() as u64,
                provider_part_id: None,
                provider_meta: None,
                byte_start: start,
                byte_end: end,
                status: UploadPartStatus::Uploaded,
            })
            .await
            .unwrap();
        start = end + 1;
    }

    let outcome = orch.complete(&descriptor.upload_id, "p1", &ctx, &fixture.storage_config).await.unwrap();
    assert_eq!(outcome.storage_path, "/movie.mp4");

    let reassembled = driver.download_file("/movie.mp4", None, &ctx).await.unwrap();
    let bytes = common::read_all(reassembled).await;
    assert_eq!(bytes.len() as u64, file_size);
    assert_eq!(&bytes[..5 * 1024 * 1024], parts[0].as_slice());
    assert_eq!(&bytes[5 * 1024 * 1024..10 * 1024 * 1024], parts[1].as_slice());
    assert_eq!(&bytes[10 * 1024 * 1024..], parts[2].as_slice());

    // Staged parts are cleaned up and the ledger cleared.
    assert!(sessions.list_parts(&descriptor.upload_id).await.unwrap().is_empty());
    let staged_key = format!(".cloudpaste-uploads/{}/part-000001", descriptor.upload_id);
    assert!(!driver.exists(&staged_key, &ctx).await.unwrap());

    // A directory upsert was enqueued against the fs index for the file's
    // parent directory.
    assert_eq!(fs_index.count_dirty(&fixture.mount.id).await.unwrap(), 1);
}

#[tokio::test]
async fn complete_rejects_a_gap_in_part_coverage() {
    let fixture = common::local_fixture("/m").await;
    let sessions = Arc::new(InMemoryUploadSessionRepository::new());
    let vfs_nodes = Arc::new(InMemoryVfsNodeRepository::new());
    let fs_index = Arc::new(InMemoryFsIndexRepository::default());
    let orch = orchestrator(&fixture, sessions.clone(), vfs_nodes, fs_index);

    let part_size = 5 * 1024 * 1024u64;
    let descriptor = orch
        .initialize("p1", &fixture.mount, &fixture.storage_config, "/", "gap.bin", 10 * 1024 * 1024, Some(part_size), &fixture.ctx())
        .await
        .unwrap();

    // Only the first part is ever reported; the second is simply missing.
    sessions
        .upsert_part(&UploadPart {
            upload_id: descriptor.upload_id.clone(),
            part_no: 1,
            size: part_size,
            provider_part_id: None,
            provider_meta: None,
            byte_start: 0,
            byte_end: part_size - 1,
            status: UploadPartStatus::Uploaded,
        })
        .await
        .unwrap();

    let ctx = fixture.ctx();
    let err = orch.complete(&descriptor.upload_id, "p1", &ctx, &fixture.storage_config).await.unwrap_err();
    assert_eq!(err.kind(), cloudpaste_core::domain::errors::ErrorKind::PreconditionFailed);
}
