// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `VfsNode` — the tree-shaped record of a mount's contents, scoped to a
//! storage config rather than owned by any single mount.

use crate::domain::storage_config::StorageType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VfsNodeType {
    Dir,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VfsNodeStatus {
    Active,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VfsNode {
    pub id: String,
    pub owner_type: String,
    pub owner_id: String,
    pub scope_type: String,
    pub scope_id: String,
    /// Empty string signals a root-level child (no parent node).
    pub parent_id: String,
    pub name: String,
    pub node_type: VfsNodeType,
    pub size: Option<u64>,
    pub mime_type: Option<String>,
    pub storage_type: StorageType,
    pub content_ref: Value,
    pub status: VfsNodeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VfsNode {
    pub fn new_file(
        owner_type: impl Into<String>,
        owner_id: impl Into<String>,
        scope_type: impl Into<String>,
        scope_id: impl Into<String>,
        parent_id: impl Into<String>,
        name: impl Into<String>,
        size: u64,
        storage_type: StorageType,
    ) -> Self {
        let now = Utc::now();
        VfsNode {
            id: Uuid::new_v4().to_string(),
            owner_type: owner_type.into(),
            owner_id: owner_id.into(),
            scope_type: scope_type.into(),
            scope_id: scope_id.into(),
            parent_id: parent_id.into(),
            name: name.into(),
            node_type: VfsNodeType::File,
            size: Some(size),
            mime_type: None,
            storage_type,
            content_ref: Value::Null,
            status: VfsNodeStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}
