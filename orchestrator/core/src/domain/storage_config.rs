// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `StorageConfig` — the credentials and policy for one back-end instance.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageType {
    S3,
    Webdav,
    OneDrive,
    GoogleDrive,
    GitHub,
    HuggingFace,
    Telegram,
    Discord,
    Local,
    Mirror,
}

impl StorageType {
    /// Whether this back-end's native model lacks a persistent tree view, so
    /// directory chains must be auto-materialised on write (glossary:
    /// "storage-first driver").
    pub fn is_storage_first(self) -> bool {
        matches!(self, StorageType::GoogleDrive | StorageType::HuggingFace)
    }
}

/// Secret material for a `StorageConfig`. Plaintext only ever exists inside
/// this struct transiently; at rest every field is encrypted by
/// `infrastructure::secrets`, which marks encrypted strings with the
/// `encrypted:` prefix.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageSecrets(pub Value);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    /// Secret fields, stored encrypted-in-place; see [`StorageSecrets`].
    pub secrets: StorageSecrets,
    pub quota_bytes: Option<u64>,
    pub root_prefix: Option<String>,
}

impl StorageConfig {
    pub fn new(storage_type: StorageType, secrets: Value) -> Self {
        StorageConfig {
            id: Uuid::new_v4().to_string(),
            storage_type,
            secrets: StorageSecrets(secrets),
            quota_bytes: None,
            root_prefix: None,
        }
    }
}
