// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Shared fixtures for the end-to-end tests in this directory: a real,
//! offline `Local` (opendal `Fs`) mount wired through the same
//! `MountManager`/`DriverRegistry` production code uses, plus small
//! conversion helpers between `Vec<u8>` and `ByteStream`.

#![allow(dead_code)]

use cloudpaste_core::application::mount_manager::MountManager;
use cloudpaste_core::domain::driver::{ByteStream, DriverCtx, StorageDriver};
use cloudpaste_core::domain::mount::Mount;
use cloudpaste_core::domain::principal::Principal;
use cloudpaste_core::domain::storage_config::{StorageConfig, StorageType};
use cloudpaste_core::infrastructure::drivers::DriverRegistry;
use cloudpaste_core::infrastructure::repositories::{InMemoryMountRepository, InMemoryStorageConfigRepository};
use cloudpaste_core::infrastructure::secrets::SecretsCipher;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub fn byte_stream(data: Vec<u8>) -> ByteStream {
    Box::pin(futures::stream::once(async move { Ok(bytes::Bytes::from(data)) }))
}

pub async fn read_all(mut stream: ByteStream) -> Vec<u8> {
    use futures::StreamExt;
    let mut out = Vec::new();
    while let Some(chunk) = stream.next().await {
        out.extend_from_slice(&chunk.unwrap());
    }
    out
}

pub fn admin() -> Principal {
    Principal::admin("tester")
}

pub fn ctx(mount: &Mount) -> DriverCtx {
    DriverCtx { mount: mount.clone(), principal: admin(), req_id: "test-req".into(), cancellation: CancellationToken::new() }
}

pub fn ctx_with_cancellation(mount: &Mount, cancellation: CancellationToken) -> DriverCtx {
    DriverCtx { mount: mount.clone(), principal: admin(), req_id: "test-req".into(), cancellation }
}

/// A single `Local`-backed mount, plus everything the production
/// `MountManager`/`DriverRegistry` path needs to resolve and build its
/// driver exactly as the gateway would at runtime.
pub struct LocalFixture {
    pub dir: TempDir,
    pub storage_config: StorageConfig,
    pub mount: Mount,
    pub mount_repo: Arc<InMemoryMountRepository>,
    pub storage_config_repo: Arc<InMemoryStorageConfigRepository>,
    pub mounts: Arc<MountManager>,
}

impl LocalFixture {
    pub async fn driver(&self) -> Arc<dyn StorageDriver> {
        self.mounts.driver_for(&self.mount).await.unwrap()
    }

    pub fn ctx(&self) -> DriverCtx {
        ctx(&self.mount)
    }

    pub fn path(&self, relative: &str) -> std::path::PathBuf {
        self.dir.path().join(relative.trim_start_matches('/'))
    }
}

/// Builds one `Local` mount rooted at a fresh temp directory, registered
/// under `mount_path` in fresh in-memory repositories.
pub async fn local_fixture(mount_path: &str) -> LocalFixture {
    let dir = TempDir::new().expect("tempdir");
    let storage_config = StorageConfig::new(StorageType::Local, json!({ "root": dir.path().to_string_lossy() }));
    let mount = Mount::new("local", mount_path, storage_config.id.clone(), StorageType::Local, "tester");

    let mount_repo = Arc::new(InMemoryMountRepository::new());
    let storage_config_repo = Arc::new(InMemoryStorageConfigRepository::new());
    mount_repo.create(&mount).await.unwrap();
    storage_config_repo.create(&storage_config).await.unwrap();

    let registry = Arc::new(DriverRegistry::new(SecretsCipher::new(&[11u8; 32]).unwrap()));
    let mounts = Arc::new(MountManager::new(mount_repo.clone(), storage_config_repo.clone(), registry));

    LocalFixture { dir, storage_config, mount, mount_repo, storage_config_repo, mounts }
}

/// Adds a second `Local` mount (its own temp dir and storage config) to an
/// already-built fixture's repositories, for cross-mount copy scenarios.
pub async fn second_local_mount(fixture: &LocalFixture, mount_path: &str) -> (TempDir, Mount) {
    let dir = TempDir::new().expect("tempdir");
    let storage_config = StorageConfig::new(StorageType::Local, json!({ "root": dir.path().to_string_lossy() }));
    let mount = Mount::new("local-2", mount_path, storage_config.id.clone(), StorageType::Local, "tester");
    fixture.storage_config_repo.create(&storage_config).await.unwrap();
    fixture.mount_repo.create(&mount).await.unwrap();
    (dir, mount)
}

use cloudpaste_core::domain::repository::MountRepository as _;
use cloudpaste_core::domain::repository::StorageConfigRepository as _;
