// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `UsageSnapshot` — periodically refreshed per-storage usage used by the
//! quota guard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub storage_config_id: String,
    pub total_bytes: Option<u64>,
    pub used_bytes: u64,
    pub taken_at: DateTime<Utc>,
}

impl UsageSnapshot {
    pub fn available(&self, quota_bytes: Option<u64>) -> Option<u64> {
        quota_bytes.map(|q| q.saturating_sub(self.used_bytes))
    }
}
