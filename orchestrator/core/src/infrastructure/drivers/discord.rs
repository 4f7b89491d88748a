// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Discord-as-storage driver, symmetric to [`super::telegram::TelegramDriver`]:
//! a channel's messages stand in for blobs, `content_ref` encodes
//! `"{channel_id}:{message_id}:{attachment_id}"`, and directory structure is
//! entirely virtual (`vfs_node`/`fs_index`-backed).

use crate::domain::driver::{
    ByteStream, Capability, CopyOutcome, DirectoryListing, DriverCtx, FileInfo, ListOptions,
    StorageDriver, StreamDescriptor, UploadOutcome,
};
use crate::domain::errors::{CoreError, CoreResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;

pub struct DiscordDriver {
    http: Client,
    bot_token: String,
    channel_id: String,
}

impl DiscordDriver {
    pub fn new(bot_token: String, channel_id: String) -> Self {
        Self { http: Client::new(), bot_token, channel_id }
    }

    fn channel_messages_url(&self) -> String {
        format!("https://discord.com/api/v10/channels/{}/messages", self.channel_id)
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.bot_token)
    }
}

#[derive(Deserialize)]
struct DiscordMessage {
    id: String,
    attachments: Vec<DiscordAttachment>,
}

#[derive(Deserialize)]
struct DiscordAttachment {
    id: String,
    url: String,
    size: Option<u64>,
    content_type: Option<String>,
}

fn parse_content_ref(content_ref: &str) -> CoreResult<(&str, &str, &str)> {
    let mut parts = content_ref.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(channel), Some(msg), Some(attachment)) => Ok((channel, msg, attachment)),
        _ => Err(CoreError::Internal(format!("malformed discord content_ref: {content_ref}"))),
    }
}

#[async_trait]
impl StorageDriver for DiscordDriver {
    fn capabilities(&self) -> Capability {
        Capability::READER | Capability::WRITER
    }

    async fn list_directory(&self, _sub_path: &str, _opts: ListOptions, _ctx: &DriverCtx) -> CoreResult<DirectoryListing> {
        Err(CoreError::NotSupported(Capability::PAGED_LIST))
    }

    async fn get_file_info(&self, _sub_path: &str, _ctx: &DriverCtx) -> CoreResult<FileInfo> {
        Err(CoreError::NotSupported(Capability::PAGED_LIST))
    }

    async fn stat(&self, sub_path: &str, ctx: &DriverCtx) -> CoreResult<StreamDescriptor> {
        let (channel_id, message_id, attachment_id) = parse_content_ref(sub_path)?;
        let _ = ctx;
        let msg: DiscordMessage = self
            .http
            .get(format!("https://discord.com/api/v10/channels/{channel_id}/messages/{message_id}"))
            .header("Authorization", self.auth_header())
            .send()
            .await?
            .json()
            .await?;
        let attachment = msg
            .attachments
            .into_iter()
            .find(|a| a.id == attachment_id)
            .ok_or_else(|| CoreError::NotFound(format!("attachment {attachment_id} not found")))?;
        Ok(StreamDescriptor {
            size: attachment.size,
            content_type: attachment.content_type,
            etag: None,
            last_modified: None,
            supports_range: false,
        })
    }

    async fn exists(&self, sub_path: &str, ctx: &DriverCtx) -> CoreResult<bool> {
        Ok(self.stat(sub_path, ctx).await.is_ok())
    }

    async fn download_file(&self, sub_path: &str, _range: Option<(u64, Option<u64>)>, ctx: &DriverCtx) -> CoreResult<ByteStream> {
        let (channel_id, message_id, attachment_id) = parse_content_ref(sub_path)?;
        let msg: DiscordMessage = self
            .http
            .get(format!("https://discord.com/api/v10/channels/{channel_id}/messages/{message_id}"))
            .header("Authorization", self.auth_header())
            .send()
            .await?
            .json()
            .await?;
        let attachment = msg
            .attachments
            .into_iter()
            .find(|a| a.id == attachment_id)
            .ok_or_else(|| CoreError::NotFound(format!("attachment {attachment_id} not found")))?;
        let _ = ctx;
        let response = self.http.get(attachment.url).send().await?;
        let stream = response.bytes_stream().map(|chunk| chunk.map_err(CoreError::from));
        Ok(Box::pin(stream))
    }

    async fn upload_file(&self, sub_path: &str, mut body: ByteStream, ctx: &DriverCtx) -> CoreResult<UploadOutcome> {
        let _ = ctx;
        let mut buf = Vec::new();
        while let Some(chunk) = body.next().await {
            let chunk: Bytes = chunk?;
            buf.extend_from_slice(&chunk);
        }
        let file_name = sub_path.rsplit('/').next().unwrap_or("file").to_string();
        let part = reqwest::multipart::Part::bytes(buf).file_name(file_name);
        let form = reqwest::multipart::Form::new().part("files[0]", part);
        let msg: DiscordMessage = self
            .http
            .post(self.channel_messages_url())
            .header("Authorization", self.auth_header())
            .multipart(form)
            .send()
            .await?
            .json()
            .await?;
        let attachment_id = msg.attachments.first().map(|a| a.id.clone()).unwrap_or_default();
        Ok(UploadOutcome {
            storage_path: format!("{}:{}:{}", self.channel_id, msg.id, attachment_id),
            message: None,
        })
    }

    async fn create_directory(&self, _sub_path: &str, _ctx: &DriverCtx) -> CoreResult<()> {
        Ok(())
    }

    async fn remove(&self, sub_path: &str, _ctx: &DriverCtx) -> CoreResult<()> {
        let (channel_id, message_id, _) = parse_content_ref(sub_path)?;
        let status = self
            .http
            .delete(format!("https://discord.com/api/v10/channels/{channel_id}/messages/{message_id}"))
            .header("Authorization", self.auth_header())
            .send()
            .await?
            .status();
        if !status.is_success() {
            return Err(CoreError::DriverError { code: "discord".into(), message: format!("delete returned {status}") });
        }
        Ok(())
    }

    async fn rename_item(&self, _old_sub_path: &str, _new_sub_path: &str, _ctx: &DriverCtx) -> CoreResult<()> {
        Err(CoreError::NotSupported(Capability::ATOMIC))
    }

    async fn copy_item(&self, _src_sub: &str, _dst_sub: &str, _skip_existing: bool, _ctx: &DriverCtx) -> CoreResult<CopyOutcome> {
        Err(CoreError::NotSupported(Capability::ATOMIC))
    }
}
