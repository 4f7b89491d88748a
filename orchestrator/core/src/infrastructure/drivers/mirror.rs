// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! The mirror driver fans writes out to every backing driver and reads from
//! the first one that answers successfully, giving a mount redundancy
//! across heterogeneous backends without the caller knowing which member
//! actually served a given read.

use crate::domain::driver::{
    ByteStream, Capability, CopyOutcome, DirectoryListing, DriverCtx, FileInfo, ListOptions,
    StorageDriver, StreamDescriptor, UploadOutcome,
};
use crate::domain::errors::{CoreError, CoreResult};
use async_trait::async_trait;
use std::sync::Arc;

pub struct MirrorDriver {
    members: Vec<Arc<dyn StorageDriver>>,
}

impl MirrorDriver {
    pub fn new(members: Vec<Arc<dyn StorageDriver>>) -> CoreResult<Self> {
        if members.is_empty() {
            return Err(CoreError::Validation("mirror driver requires at least one member".into()));
        }
        Ok(Self { members })
    }
}

#[async_trait]
impl StorageDriver for MirrorDriver {
    fn capabilities(&self) -> Capability {
        // Intersection: the mirror can only promise what every member promises.
        self.members.iter().fold(Capability::all(), |acc, m| acc & m.capabilities())
    }

    async fn list_directory(&self, sub_path: &str, opts: ListOptions, ctx: &DriverCtx) -> CoreResult<DirectoryListing> {
        self.members[0].list_directory(sub_path, opts, ctx).await
    }

    async fn get_file_info(&self, sub_path: &str, ctx: &DriverCtx) -> CoreResult<FileInfo> {
        let mut last_err = None;
        for member in &self.members {
            match member.get_file_info(sub_path, ctx).await {
                Ok(info) => return Ok(info),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| CoreError::NotFound(sub_path.to_string())))
    }

    async fn stat(&self, sub_path: &str, ctx: &DriverCtx) -> CoreResult<StreamDescriptor> {
        let mut last_err = None;
        for member in &self.members {
            match member.stat(sub_path, ctx).await {
                Ok(d) => return Ok(d),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| CoreError::NotFound(sub_path.to_string())))
    }

    async fn exists(&self, sub_path: &str, ctx: &DriverCtx) -> CoreResult<bool> {
        for member in &self.members {
            if member.exists(sub_path, ctx).await.unwrap_or(false) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn download_file(&self, sub_path: &str, range: Option<(u64, Option<u64>)>, ctx: &DriverCtx) -> CoreResult<ByteStream> {
        let mut last_err = None;
        for member in &self.members {
            match member.download_file(sub_path, range, ctx).await {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| CoreError::NotFound(sub_path.to_string())))
    }

    async fn upload_file(&self, sub_path: &str, body: ByteStream, ctx: &DriverCtx) -> CoreResult<UploadOutcome> {
        // Materialise once so every member writes the same bytes.
        use futures::StreamExt;
        let mut buf = bytes::BytesMut::new();
        let mut body = body;
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        let bytes = buf.freeze();

        let mut outcome = None;
        let mut failures = Vec::new();
        for member in &self.members {
            let stream: ByteStream = Box::pin(futures::stream::once(async { Ok(bytes.clone()) }));
            match member.upload_file(sub_path, stream, ctx).await {
                Ok(o) => outcome = Some(o),
                Err(e) => failures.push(e.to_string()),
            }
        }
        match outcome {
            Some(o) if failures.is_empty() => Ok(o),
            Some(o) => {
                tracing::warn!(failures = ?failures, "mirror upload partially failed");
                Ok(o)
            }
            None => Err(CoreError::DriverError { code: "mirror".into(), message: failures.join("; ") }),
        }
    }

    async fn create_directory(&self, sub_path: &str, ctx: &DriverCtx) -> CoreResult<()> {
        for member in &self.members {
            member.create_directory(sub_path, ctx).await?;
        }
        Ok(())
    }

    async fn remove(&self, sub_path: &str, ctx: &DriverCtx) -> CoreResult<()> {
        let mut last_err = None;
        for member in &self.members {
            if let Err(e) = member.remove(sub_path, ctx).await {
                last_err = Some(e);
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn rename_item(&self, old_sub_path: &str, new_sub_path: &str, ctx: &DriverCtx) -> CoreResult<()> {
        for member in &self.members {
            member.rename_item(old_sub_path, new_sub_path, ctx).await?;
        }
        Ok(())
    }

    async fn copy_item(&self, src_sub: &str, dst_sub: &str, skip_existing: bool, ctx: &DriverCtx) -> CoreResult<CopyOutcome> {
        self.members[0].copy_item(src_sub, dst_sub, skip_existing, ctx).await
    }

    async fn usage_bytes(&self, ctx: &DriverCtx) -> CoreResult<Option<u64>> {
        self.members[0].usage_bytes(ctx).await
    }
}
