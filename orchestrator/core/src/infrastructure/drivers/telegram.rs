// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Telegram-as-storage driver. A mount backed by Telegram has no native
//! directory structure — the Bot API only knows chats and messages — so
//! this driver declares no `PAGED_LIST` capability and relies entirely on
//! `vfs_node`/`fs_index` as the directory source of truth (mirrors how the
//! WebDAV/S3 drivers are authoritative for listing but chat backends are
//! not). `upload_file`/`download_file`/`remove` key off `content_ref`
//! strings of the form `"{chat_id}:{message_id}:{file_id}"`.

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

pub struct TelegramDriver {
    http: Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramDriver {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self { http: Client::new(), bot_token, chat_id }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.bot_token, method)
    }
}

#[derive(Deserialize)]
struct SendDocumentResponse {
    ok: bool,
    result: Option<SendDocumentResult>,
}

#[derive(Deserialize)]
struct SendDocumentResult {
    message_id: i64,
    document: Option<TelegramDocument>,
}

#[derive(Deserialize)]
struct TelegramDocument {
    file_id: String,
}

#[derive(Deserialize)]
struct GetFileResponse {
    ok: bool,
    result: Option<GetFileResult>,
}

#[derive(Deserialize)]
struct GetFileResult {
    file_path: String,
}

fn parse_content_ref(content_ref: &str) -> CoreResult<(&str, &str, &str)> {
    let mut parts = content_ref.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(chat), Some(msg), Some(file)) => Ok((chat, msg, file)),
        _ => Err(CoreError::Internal(format!("malformed telegram content_ref: {content_ref}"))),
    }
}

#[async_trait]
impl StorageDriver for TelegramDriver {
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
        let (_, _, file_id) = parse_content_ref(sub_path)?;
        let _ = ctx;
        let resp: GetFileResponse = self
            .http
            .get(self.api_url("getFile"))
            .query(&[("file_id", file_id)])
            .send()
            .await?
            .json()
            .await?;
        if !resp.ok {
            return Err(CoreError::DriverError { code: "telegram".into(), message: "getFile failed".into() });
        }
        Ok(StreamDescriptor { size: None, content_type: None, etag: None, last_modified: None, supports_range: false })
    }

    async fn exists(&self, sub_path: &str, ctx: &DriverCtx) -> CoreResult<bool> {
        Ok(self.stat(sub_path, ctx).await.is_ok())
    }

    async fn download_file(&self, sub_path: &str, _range: Option<(u64, Option<u64>)>, _ctx: &DriverCtx) -> CoreResult<ByteStream> {
        let (_, _, file_id) = parse_content_ref(sub_path)?;
        let resp: GetFileResponse = self
            .http
            .get(self.api_url("getFile"))
            .query(&[("file_id", file_id)])
            .send()
            .await?
            .json()
            .await?;
        let file_path = resp
            .result
            .ok_or_else(|| CoreError::NotFound(format!("telegram file {file_id} not found")))?
            .file_path;
        let url = format!("https://api.telegram.org/file/bot{}/{}", self.bot_token, file_path);
        let response = self.http.get(url).send().await?;
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
        let form = reqwest::multipart::Form::new().text("chat_id", self.chat_id.clone()).part("document", part);
        let resp: SendDocumentResponse = self.http.post(self.api_url("sendDocument")).multipart(form).send().await?.json().await?;
        let result = resp.result.ok_or_else(|| CoreError::DriverError { code: "telegram".into(), message: "sendDocument failed".into() })?;
        let file_id = result.document.map(|d| d.file_id).unwrap_or_default();
        Ok(UploadOutcome {
            storage_path: format!("{}:{}:{}", self.chat_id, result.message_id, file_id),
            message: None,
        })
    }

    async fn create_directory(&self, _sub_path: &str, _ctx: &DriverCtx) -> CoreResult<()> {
        Ok(())
    }

    async fn remove(&self, sub_path: &str, _ctx: &DriverCtx) -> CoreResult<()> {
        let (chat_id, message_id, _) = parse_content_ref(sub_path)?;
        let resp: serde_json::Value = self
            .http
            .get(self.api_url("deleteMessage"))
            .query(&[("chat_id", chat_id), ("message_id", message_id)])
            .send()
            .await?
            .json()
            .await?;
        if resp.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            return Err(CoreError::DriverError { code: "telegram".into(), message: "deleteMessage failed".into() });
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
