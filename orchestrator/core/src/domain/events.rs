// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain events published on [`crate::infrastructure::event_bus::EventBus`],
//! a `tokio::sync::broadcast`-backed pub/sub, covering the gateway's
//! cache-invalidation and job/proxy audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scope of a cache-invalidation message; `None` fields act as wildcards
/// within their scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheScope {
    Directory,
    SignedUrl,
    SearchIndex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheInvalidation {
    pub scope: CacheScope,
    pub mount_id: Option<String>,
    pub storage_config_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StorageEvent {
    MountWritten {
        mount_id: String,
        sub_path: String,
        at: DateTime<Utc>,
    },
    MountDeleted {
        mount_id: String,
        sub_path: String,
        at: DateTime<Utc>,
    },
    StorageConfigChanged {
        storage_config_id: String,
        at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobEvent {
    Dispatched { task_id: String, task_type: String, at: DateTime<Utc> },
    Progressed { task_id: String, current: u64, total: Option<u64>, at: DateTime<Utc> },
    Finished { task_id: String, status: String, at: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyDecision {
    Allow,
    Deny,
}

/// The structured audit record every proxy request emits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyAuditRecord {
    pub req_id: String,
    pub path: String,
    pub decision: ProxyDecision,
    pub reason: String,
    pub signature_required: bool,
    pub signature_provided: bool,
    pub mount_id: Option<String>,
    pub ts: DateTime<Utc>,
}

/// The union published on the core event bus. Distinct enums per concern
/// (storage/job/proxy) are flattened here so `EventBus::publish` accepts
/// one union and subscribers (caches, the audit sink) filter on a single
/// receiver type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GatewayEvent {
    Cache(CacheInvalidation),
    Storage(StorageEvent),
    Job(JobEvent),
    ProxyAudit(ProxyAuditRecord),
}
