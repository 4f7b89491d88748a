// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Builds and caches [`StorageDriver`] instances per `storage_config_id`, so
//! the mount-routing layer never reconstructs an opendal `Operator` (or
//! refreshes an OAuth token) on every request.

use crate::domain::driver::StorageDriver;
use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::storage_config::{StorageConfig, StorageType};
use crate::infrastructure::drivers::discord::DiscordDriver;
use crate::infrastructure::drivers::opendal_driver::OpendalDriver;
use crate::infrastructure::drivers::telegram::TelegramDriver;
use crate::infrastructure::secrets::SecretsCipher;
use dashmap::DashMap;
use std::sync::Arc;

pub struct DriverRegistry {
    cache: DashMap<String, Arc<dyn StorageDriver>>,
    cipher: SecretsCipher,
}

impl DriverRegistry {
    pub fn new(cipher: SecretsCipher) -> Self {
        Self { cache: DashMap::new(), cipher }
    }

    /// Returns the cached driver for this storage config, building and
    /// caching it on first use. `config.secrets` is decrypted here so no
    /// plaintext secret is ever cached longer than the driver's own lifetime.
    pub fn get_or_build(&self, config: &StorageConfig) -> CoreResult<Arc<dyn StorageDriver>> {
        if let Some(driver) = self.cache.get(&config.id) {
            return Ok(driver.clone());
        }
        let driver = self.build(config)?;
        self.cache.insert(config.id.clone(), driver.clone());
        Ok(driver)
    }

    pub fn invalidate(&self, storage_config_id: &str) {
        self.cache.remove(storage_config_id);
    }

    fn decrypted_secrets(&self, config: &StorageConfig) -> CoreResult<StorageConfig> {
        let mut decrypted = config.clone();
        if let Some(obj) = decrypted.secrets.0.as_object_mut() {
            for (_, value) in obj.iter_mut() {
                if let Some(s) = value.as_str() {
                    if SecretsCipher::is_encrypted(s) {
                        *value = serde_json::Value::String(self.cipher.decrypt(s)?);
                    }
                }
            }
        }
        Ok(decrypted)
    }

    fn build(&self, config: &StorageConfig) -> CoreResult<Arc<dyn StorageDriver>> {
        let config = self.decrypted_secrets(config)?;
        match config.storage_type {
            StorageType::S3
            | StorageType::Webdav
            | StorageType::OneDrive
            | StorageType::GoogleDrive
            | StorageType::GitHub
            | StorageType::HuggingFace
            | StorageType::Local => Ok(Arc::new(OpendalDriver::build(&config)?)),
            StorageType::Telegram => {
                let bot_token = string_secret(&config, "bot_token")?;
                let chat_id = string_secret(&config, "chat_id")?;
                Ok(Arc::new(TelegramDriver::new(bot_token, chat_id)))
            }
            StorageType::Discord => {
                let bot_token = string_secret(&config, "bot_token")?;
                let channel_id = string_secret(&config, "channel_id")?;
                Ok(Arc::new(DiscordDriver::new(bot_token, channel_id)))
            }
            StorageType::Mirror => {
                Err(CoreError::Validation("mirror mounts are assembled by mount_manager from their member drivers".into()))
            }
        }
    }
}

fn string_secret(config: &StorageConfig, key: &str) -> CoreResult<String> {
    config
        .secrets
        .0
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| CoreError::Validation(format!("storage config {} missing secret '{key}'", config.id)))
}
