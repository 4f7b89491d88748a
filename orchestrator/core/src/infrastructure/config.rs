// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Gateway Configuration (Kubernetes-style manifest)
//!
//! Defines the configuration schema loaded at startup, mirroring the
//! `apiVersion` / `kind` / `metadata` / `spec` shape used across the
//! 100monkeys.ai node configuration family.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level manifest for the storage gateway process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfigManifest {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: ManifestMetadata,
    pub spec: GatewayConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfigSpec {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub jobs: JobEngineConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub fs_index: FsIndexConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEngineConfig {
    #[serde(default = "default_worker_count")]
    pub worker_count: u32,
    #[serde(default = "default_stalled_after_secs")]
    pub stalled_after_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for JobEngineConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            stalled_after_secs: default_stalled_after_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_worker_count() -> u32 {
    4
}
fn default_stalled_after_secs() -> u64 {
    900
}
fn default_poll_interval_ms() -> u64 {
    500
}

/// The HMAC signing key itself is never part of this struct or the YAML
/// manifest — it is loaded at startup from `CLOUDPASTE_PROXY_SIGNING_KEY`
/// (base64, via `infrastructure::secrets::load_key_from_env`), the same
/// out-of-manifest convention `CLOUDPASTE_SECRETS_KEY` uses for the at-rest
/// cipher key, so neither secret round-trips through a config file on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_signature_ttl_secs")]
    pub signature_ttl_secs: i64,
    #[serde(default)]
    pub require_signature_by_default: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            signature_ttl_secs: default_signature_ttl_secs(),
            require_signature_by_default: false,
        }
    }
}

fn default_signature_ttl_secs() -> i64 {
    3600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsIndexConfig {
    #[serde(default = "default_dirty_rebuild_threshold")]
    pub dirty_rebuild_threshold: u64,
    #[serde(default = "default_apply_dirty_batch")]
    pub apply_dirty_batch: u32,
}

impl Default for FsIndexConfig {
    fn default() -> Self {
        Self {
            dirty_rebuild_threshold: default_dirty_rebuild_threshold(),
            apply_dirty_batch: default_apply_dirty_batch(),
        }
    }
}

fn default_dirty_rebuild_threshold() -> u64 {
    5000
}
fn default_apply_dirty_batch() -> u32 {
    500
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub metrics_addr: Option<String>,
}

impl GatewayConfigManifest {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Discovery precedence: `CLOUDPASTE_CONFIG_PATH` env var, then
    /// `./cloudpaste-config.yaml`, then `~/.cloudpaste/config.yaml`.
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("CLOUDPASTE_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }
        let cwd = PathBuf::from("./cloudpaste-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".cloudpaste").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }
        None
    }

    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }
        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("CLOUDPASTE_DATABASE_URL") {
            self.spec.database.url = Some(url);
        }
        if let Ok(val) = std::env::var("CLOUDPASTE_JOB_WORKERS") {
            if let Ok(n) = val.parse() {
                self.spec.jobs.worker_count = n;
            } else {
                tracing::warn!("Invalid CLOUDPASTE_JOB_WORKERS='{}', ignoring", val);
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != "cloudpaste.io/v1" {
            anyhow::bail!("invalid apiVersion: '{}'. Must be 'cloudpaste.io/v1'", self.api_version);
        }
        if self.kind != "GatewayConfig" {
            anyhow::bail!("invalid kind: '{}'. Must be 'GatewayConfig'", self.kind);
        }
        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }
        if self.spec.jobs.worker_count == 0 {
            anyhow::bail!("spec.jobs.worker_count must be at least 1");
        }
        Ok(())
    }
}

impl Default for GatewayConfigManifest {
    fn default() -> Self {
        Self {
            api_version: "cloudpaste.io/v1".into(),
            kind: "GatewayConfig".into(),
            metadata: ManifestMetadata { name: "default".into(), version: None },
            spec: GatewayConfigSpec {
                database: DatabaseConfig::default(),
                jobs: JobEngineConfig::default(),
                proxy: ProxyConfig::default(),
                fs_index: FsIndexConfig::default(),
                observability: ObservabilityConfig::default(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_kind() {
        let mut cfg = GatewayConfigManifest::default();
        cfg.kind = "NodeConfig".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parses_minimal_yaml() {
        let yaml = r#"
apiVersion: cloudpaste.io/v1
kind: GatewayConfig
metadata:
  name: prod
spec:
  jobs:
    worker_count: 8
"#;
        let cfg = GatewayConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.spec.jobs.worker_count, 8);
        cfg.validate().unwrap();
    }
}
