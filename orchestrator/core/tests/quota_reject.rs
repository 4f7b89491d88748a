// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Quota enforcement at multipart initialize: a storage config near its
//! quota rejects a session that would push usage over it, and leaves no
//! trace — no session row, unchanged snapshot.

mod common;

use cloudpaste_core::application::cache_bus::CacheBus;
use cloudpaste_core::application::multipart::MultipartOrchestrator;
use cloudpaste_core::application::quota_guard::QuotaGuard;
use cloudpaste_core::domain::errors::ErrorKind;
use cloudpaste_core::domain::repository::UsageSnapshotRepository;
use cloudpaste_core::domain::usage_snapshot::UsageSnapshot;
use cloudpaste_core::infrastructure::event_bus::EventBus;
use cloudpaste_core::infrastructure::repositories::{
    InMemoryFsIndexRepository, InMemoryUploadSessionRepository, InMemoryUsageSnapshotRepository, InMemoryVfsNodeRepository,
};
use std::sync::Arc;

const GIB: u64 = 1024 * 1024 * 1024;
const MIB: u64 = 1024 * 1024;

#[tokio::test]
async fn initialize_rejects_a_session_that_would_exceed_the_quota() {
    let fixture = common::local_fixture("/m").await;
    let mut storage_config = fixture.storage_config.clone();
    storage_config.quota_bytes = Some(GIB);

    let usage_snapshots = Arc::new(InMemoryUsageSnapshotRepository::new());
    usage_snapshots
        .put(&UsageSnapshot { storage_config_id: storage_config.id.clone(), total_bytes: None, used_bytes: 900 * MIB, taken_at: chrono::Utc::now() })
        .await
        .unwrap();

    let sessions = Arc::new(InMemoryUploadSessionRepository::new());
    let orch = MultipartOrchestrator::new(
        sessions.clone(),
        Arc::new(InMemoryVfsNodeRepository::new()),
        Arc::new(InMemoryFsIndexRepository::default()),
        fixture.mounts.clone(),
        Arc::new(QuotaGuard::new(usage_snapshots.clone())),
        Arc::new(CacheBus::new()),
        EventBus::with_default_capacity(),
    );

    let err = orch
        .initialize("p1", &fixture.mount, &storage_config, "/", "big.bin", 200 * MIB, None, &fixture.ctx())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QuotaExceeded);

    let snapshot = usage_snapshots.latest(&storage_config.id).await.unwrap().unwrap();
    assert_eq!(snapshot.used_bytes, 900 * MIB);
}

#[tokio::test]
async fn initialize_admits_a_session_that_fits_under_the_quota() {
    let fixture = common::local_fixture("/m").await;
    let mut storage_config = fixture.storage_config.clone();
    storage_config.quota_bytes = Some(GIB);

    let usage_snapshots = Arc::new(InMemoryUsageSnapshotRepository::new());
    usage_snapshots
        .put(&UsageSnapshot { storage_config_id: storage_config.id.clone(), total_bytes: None, used_bytes: 900 * MIB, taken_at: chrono::Utc::now() })
        .await
        .unwrap();

    let orch = MultipartOrchestrator::new(
        Arc::new(InMemoryUploadSessionRepository::new()),
        Arc::new(InMemoryVfsNodeRepository::new()),
        Arc::new(InMemoryFsIndexRepository::default()),
        fixture.mounts.clone(),
        Arc::new(QuotaGuard::new(usage_snapshots)),
        Arc::new(CacheBus::new()),
        EventBus::with_default_capacity(),
    );

    let descriptor = orch.initialize("p1", &fixture.mount, &storage_config, "/", "small.bin", 50 * MIB, None, &fixture.ctx()).await.unwrap();
    // default 8 MiB part size: ceil(50 / 8) = 7 parts.
    assert_eq!(descriptor.total_parts, 7);
}
