// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Path resolver and mount manager: maps a normalised
//! virtual path to `{mount, driver, subPath}` and caches driver instances
//! per `storage_config_id` via [`DriverRegistry`].

use crate::domain::driver::StorageDriver;
use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::mount::Mount;
use crate::domain::path::{self, NormPath};
use crate::domain::principal::Principal;
use crate::domain::repository::{MountRepository, StorageConfigRepository};
use crate::domain::storage_config::StorageType;
use crate::infrastructure::drivers::{DriverRegistry, MirrorDriver};
use std::sync::Arc;

/// A virtual path resolved to a concrete mount and the portion of the path
/// below the mount's root.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub mount: Mount,
    pub sub_path: String,
}

/// Outcome of resolving a virtual path: either a concrete mount, or — for a
/// prefix shorter than any mount — the synthetic directory of mounts visible
/// to the caller.
pub enum ResolveOutcome {
    Mount(ResolvedTarget),
    VirtualRoot(Vec<Mount>),
}

pub struct MountManager {
    mounts: Arc<dyn MountRepository>,
    storage_configs: Arc<dyn StorageConfigRepository>,
    drivers: Arc<DriverRegistry>,
}

impl MountManager {
    pub fn new(mounts: Arc<dyn MountRepository>, storage_configs: Arc<dyn StorageConfigRepository>, drivers: Arc<DriverRegistry>) -> Self {
        Self { mounts, storage_configs, drivers }
    }

    /// Resolves `raw_path` under `principal`'s access, normalising first and
    /// rejecting a path outside `principal.allowed_base_path` with
    /// `FORBIDDEN` before any mount lookup happens.
    pub async fn resolve(&self, raw_path: &str, principal: &Principal, keep_trailing_slash: bool) -> CoreResult<ResolveOutcome> {
        let norm = path::normalise(raw_path, keep_trailing_slash).map_err(|e| CoreError::Validation(e.to_string()))?;
        if !principal.permits_path(norm.as_str()) {
            return Err(CoreError::Forbidden(format!("{} is outside the caller's allowed base path", norm)));
        }

        let candidates = self.mounts.list_active().await?;
        let best = candidates
            .iter()
            .filter(|m| self.mount_contains(m, &norm))
            .max_by_key(|m| m.mount_path.len());

        match best {
            Some(mount) => {
                let mount_norm = path::normalise(&mount.mount_path, false).map_err(|e| CoreError::Internal(e.to_string()))?;
                let sub_path = norm.strip_prefix(&mount_norm).unwrap_or_default();
                Ok(ResolveOutcome::Mount(ResolvedTarget { mount: mount.clone(), sub_path }))
            }
            None => {
                let visible = candidates.into_iter().filter(|m| principal.permits_path(&m.mount_path)).collect();
                Ok(ResolveOutcome::VirtualRoot(visible))
            }
        }
    }

    fn mount_contains(&self, mount: &Mount, path: &NormPath) -> bool {
        path.as_str() == mount.mount_path || path.as_str().starts_with(&format!("{}/", mount.mount_path))
    }

    /// Builds (or returns the cached) driver for `mount`'s storage config,
    /// assembling a [`MirrorDriver`] from its declared members when the
    /// config's type is `Mirror` (, driver registry note).
    pub async fn driver_for(&self, mount: &Mount) -> CoreResult<Arc<dyn StorageDriver>> {
        let config = self.storage_configs.get(&mount.storage_config_id).await?;
        if config.storage_type == StorageType::Mirror {
            let member_ids: Vec<String> = config
                .secrets
                .0
                .get("members")
                .and_then(|v| v.as_array())
                .ok_or_else(|| CoreError::Validation("mirror storage config missing 'members' array".into()))?
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            if member_ids.is_empty() {
                return Err(CoreError::Validation("mirror storage config has no members".into()));
            }
            let mut members = Vec::with_capacity(member_ids.len());
            for id in member_ids {
                let member_config = self.storage_configs.get(&id).await?;
                members.push(self.drivers.get_or_build(&member_config)?);
            }
            return Ok(Arc::new(MirrorDriver::new(members)?));
        }
        self.drivers.get_or_build(&config)
    }

    /// Invalidates the cached driver for a storage config, called when the
    /// config's secrets or settings change.
    pub fn invalidate_driver(&self, storage_config_id: &str) {
        self.drivers.invalidate(storage_config_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::principal::PrincipalType;
    use crate::infrastructure::repositories::{InMemoryMountRepository, InMemoryStorageConfigRepository};
    use crate::infrastructure::secrets::SecretsCipher;
    use std::collections::HashSet;

    fn manager() -> MountManager {
        MountManager::new(
            Arc::new(InMemoryMountRepository::new()),
            Arc::new(InMemoryStorageConfigRepository::new()),
            Arc::new(DriverRegistry::new(SecretsCipher::new(&[1u8; 32]).unwrap())),
        )
    }

    fn anon() -> Principal {
        Principal { principal_type: PrincipalType::Anon, id: "anon".into(), permissions: HashSet::new(), allowed_base_path: None }
    }

    #[tokio::test]
    async fn resolves_to_virtual_root_when_no_mount_matches() {
        let mgr = manager();
        match mgr.resolve("/", &anon(), false).await.unwrap() {
            ResolveOutcome::VirtualRoot(mounts) => assert!(mounts.is_empty()),
            ResolveOutcome::Mount(_) => panic!("expected virtual root"),
        }
    }

    #[tokio::test]
    async fn rejects_path_outside_allowed_base() {
        let mgr = manager();
        let restricted = Principal {
            principal_type: PrincipalType::ApiKey,
            id: "k1".into(),
            permissions: HashSet::new(),
            allowed_base_path: Some("/team-a".into()),
        };
        let err = mgr.resolve("/team-b/doc.txt", &restricted, false).await.unwrap_err();
        assert_eq!(err.kind(), crate::domain::errors::ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn picks_longest_matching_mount() {
        let mgr = manager();
        let short = Mount::new("root", "/data", "sc1", StorageType::Local, "admin");
        let long = Mount::new("docs", "/data/docs", "sc2", StorageType::Local, "admin");
        mgr.mounts.create(&short).await.unwrap();
        mgr.mounts.create(&long).await.unwrap();
        match mgr.resolve("/data/docs/report.pdf", &anon(), false).await.unwrap() {
            ResolveOutcome::Mount(target) => {
                assert_eq!(target.mount.id, long.id);
                assert_eq!(target.sub_path, "report.pdf");
            }
            ResolveOutcome::VirtualRoot(_) => panic!("expected a mount match"),
        }
    }
}
