// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Upload path admission and target resolution: the pre-flight check every
//! upload entry point (direct PUT, multipart `initialize`) runs before a
//! single byte moves.

use crate::application::mount_manager::{MountManager, ResolveOutcome};
use crate::application::quota_guard::QuotaGuard;
use crate::domain::driver::{DriverCtx, StorageDriver};
use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::mount::Mount;
use crate::domain::path;
use crate::domain::principal::Principal;
use crate::domain::repository::StorageConfigRepository;
use crate::domain::storage_config::StorageConfig;
use std::sync::Arc;

/// A resolved, quota-cleared upload target, ready to be handed to a driver
/// or the multipart orchestrator.
pub struct AdmittedUpload {
    pub mount: Mount,
    pub storage_config: StorageConfig,
    pub parent_sub_path: String,
    pub target_key: String,
}

pub struct UploadAdmission {
    mounts: Arc<MountManager>,
    storage_configs: Arc<dyn StorageConfigRepository>,
    quota: Arc<QuotaGuard>,
}

impl UploadAdmission {
    pub fn new(mounts: Arc<MountManager>, storage_configs: Arc<dyn StorageConfigRepository>, quota: Arc<QuotaGuard>) -> Self {
        Self { mounts, storage_configs, quota }
    }

    /// Resolves `raw_parent_path` to a mount, validates `file_name`, ensures
    /// the parent directory exists (auto-creating it for storage-first
    /// drivers, rejecting with `NOT_FOUND` for mount-view drivers whose
    /// parent is missing), computes the final target key under the storage
    /// config's `root_prefix`, and pre-flights the quota for `file_size`.
    pub async fn admit(
        &self,
        raw_parent_path: &str,
        file_name: &str,
        file_size: u64,
        principal: &Principal,
        ctx_req_id: &str,
        cancellation: tokio_util::sync::CancellationToken,
    ) -> CoreResult<AdmittedUpload> {
        path::validate_filename(file_name).map_err(|e| CoreError::Validation(e.to_string()))?;

        let resolved = match self.mounts.resolve(raw_parent_path, principal, true).await? {
            ResolveOutcome::Mount(target) => target,
            ResolveOutcome::VirtualRoot(_) => {
                return Err(CoreError::Validation(format!("{raw_parent_path} is not inside a mount")));
            }
        };

        let storage_config = self.storage_configs.get(&resolved.mount.storage_config_id).await?;

        let driver = self.mounts.driver_for(&resolved.mount).await?;
        let ctx = DriverCtx {
            mount: resolved.mount.clone(),
            principal: principal.clone(),
            req_id: ctx_req_id.to_string(),
            cancellation,
        };
        self.ensure_parent_exists(driver.as_ref(), &resolved.sub_path, &resolved.mount, &ctx).await?;

        let target_key = match &storage_config.root_prefix {
            Some(prefix) => format!("{}/{}/{}", prefix.trim_end_matches('/'), resolved.sub_path.trim_matches('/'), file_name).replace("//", "/"),
            None => format!("{}/{}", resolved.sub_path.trim_end_matches('/'), file_name),
        };

        let existing_bytes = driver.get_file_info(&target_key, &ctx).await.ok().and_then(|info| info.size).unwrap_or(0);
        self.quota.check(&storage_config, file_size, existing_bytes).await?;

        Ok(AdmittedUpload { mount: resolved.mount, storage_config, parent_sub_path: resolved.sub_path, target_key })
    }

    /// Storage-first drivers (Google Drive, Hugging Face) have no notion of
    /// an empty directory and auto-materialise the chain on write; every
    /// other driver must already have the parent, or admission fails
    /// `NOT_FOUND` rather than silently creating it.
    async fn ensure_parent_exists(&self, driver: &dyn StorageDriver, parent_sub_path: &str, mount: &Mount, ctx: &DriverCtx) -> CoreResult<()> {
        if parent_sub_path.is_empty() || parent_sub_path == "/" {
            return Ok(());
        }
        if mount.storage_type.is_storage_first() {
            if !driver.exists(parent_sub_path, ctx).await? {
                driver.create_directory(parent_sub_path, ctx).await?;
            }
            return Ok(());
        }
        if !driver.exists(parent_sub_path, ctx).await? {
            return Err(CoreError::NotFound(format!("parent directory {parent_sub_path} does not exist")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::principal::PrincipalType;
    use crate::infrastructure::drivers::DriverRegistry;
    use crate::infrastructure::repositories::{InMemoryMountRepository, InMemoryStorageConfigRepository, InMemoryUsageSnapshotRepository};
    use crate::infrastructure::secrets::SecretsCipher;
    use std::collections::HashSet;

    fn admission() -> (UploadAdmission, Arc<InMemoryMountRepository>, Arc<InMemoryStorageConfigRepository>) {
        let mounts_repo = Arc::new(InMemoryMountRepository::new());
        let configs_repo = Arc::new(InMemoryStorageConfigRepository::new());
        let registry = Arc::new(DriverRegistry::new(SecretsCipher::new(&[3u8; 32]).unwrap()));
        let manager = Arc::new(MountManager::new(mounts_repo.clone(), configs_repo.clone(), registry));
        let quota = Arc::new(QuotaGuard::new(Arc::new(InMemoryUsageSnapshotRepository::new())));
        (UploadAdmission::new(manager, configs_repo.clone(), quota), mounts_repo, configs_repo)
    }

    fn admin() -> Principal {
        Principal { principal_type: PrincipalType::Admin, id: "root".into(), permissions: HashSet::new(), allowed_base_path: None }
    }

    #[tokio::test]
    async fn rejects_reserved_filenames() {
        let (admission, mounts, configs) = admission();
        let config = StorageConfig::new(crate::domain::storage_config::StorageType::Local, serde_json::json!({"root": "/tmp"}));
        configs.create(&config).await.unwrap();
        let mount = Mount::new("root", "/", config.id.clone(), config.storage_type, "admin");
        mounts.create(&mount).await.unwrap();

        let err = admission
            .admit("/", "..", 10, &admin(), "req-1", tokio_util::sync::CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::domain::errors::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn rejects_a_path_outside_any_mount() {
        let (admission, _mounts, _configs) = admission();
        let err = admission
            .admit("/nowhere", "file.txt", 10, &admin(), "req-1", tokio_util::sync::CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::domain::errors::ErrorKind::Validation);
    }
}
