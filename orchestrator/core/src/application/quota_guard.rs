// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Pre-flight quota enforcement: every write admission path
//! (direct upload, multipart initialize, copy) consults the most recent
//! [`UsageSnapshot`] for the target storage config before bytes move.

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::repository::UsageSnapshotRepository;
use crate::domain::storage_config::StorageConfig;
use std::sync::Arc;

pub struct QuotaGuard {
    usage_snapshots: Arc<dyn UsageSnapshotRepository>,
}

impl QuotaGuard {
    pub fn new(usage_snapshots: Arc<dyn UsageSnapshotRepository>) -> Self {
        Self { usage_snapshots }
    }

    /// Rejects with `QUOTA_EXCEEDED` when `new_size - existing_bytes` would
    /// push usage past `config.quota_bytes`. `existing_bytes` is the size of
    /// the object being overwritten, or `0` for a new file, so re-uploading
    /// an unchanged-size file under a full quota is never wrongly rejected.
    /// A config with no quota or no snapshot yet is treated as unconstrained
    /// — the snapshot refresher (§4.10) is expected to have run at least
    /// once in a production deployment, but a fresh mount must still be
    /// usable before its first scheduled refresh.
    pub async fn check(&self, config: &StorageConfig, new_size: u64, existing_bytes: u64) -> CoreResult<()> {
        let Some(quota_bytes) = config.quota_bytes else {
            return Ok(());
        };
        let Some(snapshot) = self.usage_snapshots.latest(&config.id).await? else {
            return Ok(());
        };
        let additional_bytes = new_size.saturating_sub(existing_bytes);
        let available = snapshot.available(Some(quota_bytes)).unwrap_or(u64::MAX);
        if additional_bytes > available {
            return Err(CoreError::QuotaExceeded {
                storage_config_id: config.id.clone(),
                requested: additional_bytes,
                available,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::storage_config::StorageType;
    use crate::domain::usage_snapshot::UsageSnapshot;
    use crate::infrastructure::repositories::InMemoryUsageSnapshotRepository;
    use chrono::Utc;
    use serde_json::json;

    fn config(quota: Option<u64>) -> StorageConfig {
        let mut c = StorageConfig::new(StorageType::Local, json!({}));
        c.quota_bytes = quota;
        c
    }

    #[tokio::test]
    async fn unconstrained_without_quota() {
        let guard = QuotaGuard::new(Arc::new(InMemoryUsageSnapshotRepository::new()));
        guard.check(&config(None), u64::MAX, 0).await.unwrap();
    }

    #[tokio::test]
    async fn unconstrained_without_a_snapshot_yet() {
        let guard = QuotaGuard::new(Arc::new(InMemoryUsageSnapshotRepository::new()));
        guard.check(&config(Some(10)), 1_000_000, 0).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_when_request_exceeds_available() {
        let snapshots = Arc::new(InMemoryUsageSnapshotRepository::new());
        let cfg = config(Some(1000));
        snapshots
            .put(&UsageSnapshot { storage_config_id: cfg.id.clone(), total_bytes: None, used_bytes: 900, taken_at: Utc::now() })
            .await
            .unwrap();
        let guard = QuotaGuard::new(snapshots);
        let err = guard.check(&cfg, 200, 0).await.unwrap_err();
        assert_eq!(err.kind(), crate::domain::errors::ErrorKind::QuotaExceeded);
    }

    #[tokio::test]
    async fn allows_when_request_fits() {
        let snapshots = Arc::new(InMemoryUsageSnapshotRepository::new());
        let cfg = config(Some(1000));
        snapshots
            .put(&UsageSnapshot { storage_config_id: cfg.id.clone(), total_bytes: None, used_bytes: 500, taken_at: Utc::now() })
            .await
            .unwrap();
        let guard = QuotaGuard::new(snapshots);
        guard.check(&cfg, 400, 0).await.unwrap();
    }

    #[tokio::test]
    async fn overwrite_only_charges_the_size_delta() {
        let snapshots = Arc::new(InMemoryUsageSnapshotRepository::new());
        let cfg = config(Some(1000));
        snapshots
            .put(&UsageSnapshot { storage_config_id: cfg.id.clone(), total_bytes: None, used_bytes: 950, taken_at: Utc::now() })
            .await
            .unwrap();
        let guard = QuotaGuard::new(snapshots);
        // Re-uploading a 200-byte file that already occupies 200 bytes adds
        // nothing to usage and must be admitted even though 950 + 200 > 1000.
        guard.check(&cfg, 200, 200).await.unwrap();
    }
}
