// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! The `StorageDriver` adapter over `opendal::Operator`, backing every
//! storage-first backend (S3, WebDAV, OneDrive, Google Drive, GitHub,
//! HuggingFace, Local) through one implementation. Provider-specific wiring
//! lives only in `build_operator`; the operation bodies are provider-agnostic
//! opendal calls.

use crate::domain::driver::{
    ByteStream, Capability, CopyOutcome, CopyStatus, DirectoryListing, DriverCtx, FileInfo,
    ListOptions, StorageDriver, StreamDescriptor, UploadOutcome,
};
use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::storage_config::{StorageConfig, StorageType};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use opendal::{Operator, Scheme};

pub struct OpendalDriver {
    op: Operator,
    capabilities: Capability,
}

impl OpendalDriver {
    pub fn new(op: Operator, capabilities: Capability) -> Self {
        Self { op, capabilities }
    }

    /// Builds the right opendal service configuration for a storage-first
    /// backend from its (decrypted) secrets blob. Secrets are expected to be
    /// a flat JSON object of the field names opendal's builders accept.
    pub fn build(config: &StorageConfig) -> CoreResult<Self> {
        let secrets = config
            .secrets
            .0
            .as_object()
            .ok_or_else(|| CoreError::Validation("storage secrets must be a JSON object".into()))?;
        let mut map = std::collections::HashMap::new();
        for (k, v) in secrets {
            if let Some(s) = v.as_str() {
                map.insert(k.clone(), s.to_string());
            }
        }
        if let Some(prefix) = &config.root_prefix {
            map.entry("root".to_string()).or_insert_with(|| prefix.clone());
        }

        let scheme = match config.storage_type {
            StorageType::S3 => Scheme::S3,
            StorageType::Webdav => Scheme::Webdav,
            StorageType::OneDrive => Scheme::Onedrive,
            StorageType::GoogleDrive => Scheme::Gdrive,
            StorageType::GitHub => Scheme::Github,
            StorageType::HuggingFace => Scheme::Huggingface,
            StorageType::Local => Scheme::Fs,
            other => {
                return Err(CoreError::NotSupported(Capability::empty()))
                    .map_err(|_| CoreError::Validation(format!("{other:?} is not opendal-backed")))
            }
        };

        let op = Operator::via_iter(scheme, map)
            .map_err(|e| CoreError::Internal(format!("failed to build {scheme:?} operator: {e}")))?;

        let capabilities = match config.storage_type {
            StorageType::S3 => {
                Capability::READER
                    | Capability::WRITER
                    | Capability::ATOMIC
                    | Capability::MULTIPART
                    | Capability::PAGED_LIST
                    | Capability::RANGE
                    | Capability::DIRECT_LINK
            }
            StorageType::Local => {
                Capability::READER | Capability::WRITER | Capability::ATOMIC | Capability::RANGE
            }
            _ => Capability::READER | Capability::WRITER | Capability::RANGE,
        };

        Ok(Self::new(op, capabilities))
    }
}

#[async_trait]
impl StorageDriver for OpendalDriver {
    fn capabilities(&self) -> Capability {
        self.capabilities
    }

    async fn list_directory(&self, sub_path: &str, opts: ListOptions, ctx: &DriverCtx) -> CoreResult<DirectoryListing> {
        let _ = ctx;
        let prefix = format!("{}/", sub_path.trim_matches('/'));
        let skip: usize = match &opts.cursor {
            Some(c) => c
                .parse()
                .map_err(|_| CoreError::Validation("invalid list cursor".into()))?,
            None => 0,
        };
        let limit = opts.limit.unwrap_or(1000) as usize;

        // opendal's `Lister` has no resumable page token of its own, so a page
        // is taken by re-listing from the start and skipping entries already
        // returned by earlier pages; the cursor is that skip offset.
        let mut lister = self.op.lister(&prefix).await?;
        let mut items = Vec::new();
        let mut seen = 0usize;
        let mut next_cursor = None;
        while let Some(entry) = lister.next().await {
            let entry = entry?;
            if seen < skip {
                seen += 1;
                continue;
            }
            if items.len() >= limit {
                next_cursor = Some((skip + items.len()).to_string());
                break;
            }
            let meta = entry.metadata();
            items.push(FileInfo {
                name: entry.name().trim_end_matches('/').to_string(),
                path: entry.path().to_string(),
                is_dir: meta.is_dir(),
                size: Some(meta.content_length()),
                modified: meta.last_modified(),
                mimetype: meta.content_type().map(|s| s.to_string()),
            });
            seen += 1;
        }
        Ok(DirectoryListing { path: sub_path.to_string(), items, next_cursor })
    }

    async fn get_file_info(&self, sub_path: &str, ctx: &DriverCtx) -> CoreResult<FileInfo> {
        let _ = ctx;
        let meta = self.op.stat(sub_path).await?;
        Ok(FileInfo {
            name: sub_path.rsplit('/').next().unwrap_or(sub_path).to_string(),
            path: sub_path.to_string(),
            is_dir: meta.is_dir(),
            size: Some(meta.content_length()),
            modified: meta.last_modified(),
            mimetype: meta.content_type().map(|s| s.to_string()),
        })
    }

    async fn stat(&self, sub_path: &str, ctx: &DriverCtx) -> CoreResult<StreamDescriptor> {
        let _ = ctx;
        let meta = self.op.stat(sub_path).await?;
        Ok(StreamDescriptor {
            size: Some(meta.content_length()),
            content_type: meta.content_type().map(|s| s.to_string()),
            etag: meta.etag().map(|s| s.to_string()),
            last_modified: meta.last_modified(),
            supports_range: self.capabilities.contains(Capability::RANGE),
        })
    }

    async fn exists(&self, sub_path: &str, ctx: &DriverCtx) -> CoreResult<bool> {
        let _ = ctx;
        Ok(self.op.exists(sub_path).await?)
    }

    async fn download_file(&self, sub_path: &str, range: Option<(u64, Option<u64>)>, ctx: &DriverCtx) -> CoreResult<ByteStream> {
        let _ = ctx;
        let reader = match range {
            Some((start, Some(end))) => self.op.reader_with(sub_path).await?.into_bytes_stream(start..end).await?,
            Some((start, None)) => self.op.reader_with(sub_path).await?.into_bytes_stream(start..).await?,
            None => self.op.reader_with(sub_path).await?.into_bytes_stream(..).await?,
        };
        let stream = reader.map(|chunk| chunk.map_err(CoreError::from));
        Ok(Box::pin(stream))
    }

    async fn upload_file(&self, sub_path: &str, mut body: ByteStream, ctx: &DriverCtx) -> CoreResult<UploadOutcome> {
        let _ = ctx;
        let mut writer = self.op.writer(sub_path).await?;
        while let Some(chunk) = body.next().await {
            let chunk: Bytes = chunk?;
            writer.write(chunk).await?;
        }
        writer.close().await?;
        Ok(UploadOutcome { storage_path: sub_path.to_string(), message: None })
    }

    async fn create_directory(&self, sub_path: &str, ctx: &DriverCtx) -> CoreResult<()> {
        let _ = ctx;
        let dir = format!("{}/", sub_path.trim_end_matches('/'));
        self.op.create_dir(&dir).await?;
        Ok(())
    }

    async fn remove(&self, sub_path: &str, ctx: &DriverCtx) -> CoreResult<()> {
        let _ = ctx;
        self.op.remove_all(sub_path).await?;
        Ok(())
    }

    async fn rename_item(&self, old_sub_path: &str, new_sub_path: &str, ctx: &DriverCtx) -> CoreResult<()> {
        let _ = ctx;
        self.op.rename(old_sub_path, new_sub_path).await?;
        Ok(())
    }

    async fn copy_item(&self, src_sub: &str, dst_sub: &str, skip_existing: bool, ctx: &DriverCtx) -> CoreResult<CopyOutcome> {
        let _ = ctx;
        if skip_existing && self.op.exists(dst_sub).await? {
            return Ok(CopyOutcome { status: CopyStatus::Skipped, reason: Some("destination exists".into()) });
        }
        self.op.copy(src_sub, dst_sub).await?;
        Ok(CopyOutcome { status: CopyStatus::Success, reason: None })
    }

    async fn usage_bytes(&self, ctx: &DriverCtx) -> CoreResult<Option<u64>> {
        let _ = ctx;
        Ok(None)
    }
}
