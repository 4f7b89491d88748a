// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! The storage driver contract: a capability-tagged,
//! stateless interface every back-end plug-in implements.

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::mount::Mount;
use crate::domain::principal::Principal;
use async_trait::async_trait;
use bitflags::bitflags;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Declared features of a driver. The core refuses any operation whose
    /// required capability is absent with `NOT_SUPPORTED`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capability: u16 {
        const READER      = 0b0000_0000_0001;
        const WRITER       = 0b0000_0000_0010;
        const ATOMIC       = 0b0000_0000_0100;
        const MULTIPART    = 0b0000_0000_1000;
        const PROXY        = 0b0000_0001_0000;
        const SEARCH       = 0b0000_0010_0000;
        const DIRECT_LINK  = 0b0000_0100_0000;
        const PAGED_LIST   = 0b0000_1000_0000;
        const RANGE        = 0b0001_0000_0000;
    }
}

/// Call context threaded through every driver operation, carrying the
/// request's mount, principal, and a cancellation/deadline token so a
/// handler can honour cooperative cancellation.
#[derive(Clone)]
pub struct DriverCtx {
    pub mount: Mount,
    pub principal: Principal,
    pub req_id: String,
    pub cancellation: tokio_util::sync::CancellationToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub size: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
    pub mimetype: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListOptions {
    pub refresh: bool,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryListing {
    pub path: String,
    pub items: Vec<FileInfo>,
    pub next_cursor: Option<String>,
}

/// A download handle. `fetch`/`fetch_range` are modelled as methods on the
/// driver keyed by this descriptor's `handle` rather than as boxed closures,
/// since trait objects cannot carry `FnOnce` fields portably; see
/// [`StorageDriver::fetch`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub size: Option<u64>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub supports_range: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyStatus {
    Success,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyOutcome {
    pub status: CopyStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub storage_path: String,
    pub message: Option<String>,
}

pub type ByteStream = BoxStream<'static, CoreResult<Bytes>>;

/// The uniform interface every back-end plug-in implements. Drivers are
/// stateless over their configuration plus a short-lived, internally
/// memoised auth state (token refresh MUST be single-flight; see
/// `infrastructure::retry::SingleFlight`).
#[async_trait]
pub trait StorageDriver: Send + Sync {
    fn capabilities(&self) -> Capability;

    fn requires(&self, cap: Capability) -> CoreResult<()> {
        if self.capabilities().contains(cap) {
            Ok(())
        } else {
            Err(CoreError::NotSupported(cap))
        }
    }

    async fn list_directory(&self, sub_path: &str, opts: ListOptions, ctx: &DriverCtx) -> CoreResult<DirectoryListing>;

    async fn get_file_info(&self, sub_path: &str, ctx: &DriverCtx) -> CoreResult<FileInfo>;

    async fn stat(&self, sub_path: &str, ctx: &DriverCtx) -> CoreResult<StreamDescriptor>;

    async fn exists(&self, sub_path: &str, ctx: &DriverCtx) -> CoreResult<bool>;

    async fn download_file(&self, sub_path: &str, range: Option<(u64, Option<u64>)>, ctx: &DriverCtx) -> CoreResult<ByteStream>;

    async fn upload_file(&self, sub_path: &str, body: ByteStream, ctx: &DriverCtx) -> CoreResult<UploadOutcome>;

    async fn create_directory(&self, sub_path: &str, ctx: &DriverCtx) -> CoreResult<()>;

    async fn remove(&self, sub_path: &str, ctx: &DriverCtx) -> CoreResult<()>;

    async fn rename_item(&self, old_sub_path: &str, new_sub_path: &str, ctx: &DriverCtx) -> CoreResult<()>;

    async fn copy_item(&self, src_sub: &str, dst_sub: &str, skip_existing: bool, ctx: &DriverCtx) -> CoreResult<CopyOutcome>;

    async fn generate_proxy_url(&self, sub_path: &str, ctx: &DriverCtx) -> CoreResult<Option<String>> {
        let _ = (sub_path, ctx);
        Ok(None)
    }

    async fn generate_upload_url(&self, sub_path: &str, ctx: &DriverCtx) -> CoreResult<Option<String>> {
        let _ = (sub_path, ctx);
        Ok(None)
    }

    /// Disk/quota usage as reported natively by the back-end, when
    /// `DIRECT_LINK`-style accounting is available. Returns `None` when the
    /// driver has no native usage API and the caller must fall back to
    /// VfsNode/index aggregation (`refresh_storage_usage_snapshots`).
    async fn usage_bytes(&self, ctx: &DriverCtx) -> CoreResult<Option<u64>> {
        let _ = ctx;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_contains_checks() {
        let caps = Capability::READER | Capability::WRITER;
        assert!(caps.contains(Capability::READER));
        assert!(!caps.contains(Capability::MULTIPART));
    }
}
