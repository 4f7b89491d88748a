// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `Mount` — binds a virtual path prefix to a `StorageConfig`.

use crate::domain::storage_config::StorageType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mount {
    pub id: String,
    pub name: String,
    /// Absolute, normalised virtual path. Never ends in `/` except the root
    /// mount `"/"`.
    pub mount_path: String,
    pub storage_config_id: String,
    /// Denormalised cache of the owning `StorageConfig`'s type, avoiding a
    /// join on every resolve.
    pub storage_type: StorageType,
    pub is_active: bool,
    pub created_by: String,
    pub web_proxy: bool,
    pub require_signature: bool,
}

impl Mount {
    pub fn new(name: impl Into<String>, mount_path: impl Into<String>, storage_config_id: impl Into<String>, storage_type: StorageType, created_by: impl Into<String>) -> Self {
        Mount {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            mount_path: mount_path.into(),
            storage_config_id: storage_config_id.into(),
            storage_type,
            is_active: true,
            created_by: created_by.into(),
            web_proxy: false,
            require_signature: false,
        }
    }
}
