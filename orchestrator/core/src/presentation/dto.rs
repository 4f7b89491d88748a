// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Wire-shape request/response structs for `presentation::api`, kept
//! separate from the domain types they're built from so a back-end field
//! rename never silently changes the public HTTP contract.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub path: String,
    #[serde(default)]
    pub refresh: bool,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct FileInfoDto {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub size: Option<u64>,
    pub modified: Option<String>,
    pub mimetype: Option<String>,
}

impl From<crate::domain::driver::FileInfo> for FileInfoDto {
    fn from(f: crate::domain::driver::FileInfo) -> Self {
        FileInfoDto { name: f.name, path: f.path, is_dir: f.is_dir, size: f.size, modified: f.modified.map(|m| m.to_rfc3339()), mimetype: f.mimetype }
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponseDto {
    pub path: String,
    pub items: Vec<FileInfoDto>,
    pub next_cursor: Option<String>,
    pub etag: String,
}

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub path: String,
    pub new_path: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchRemoveRequest {
    pub paths: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchRemoveResponseDto {
    pub removed: Vec<String>,
    pub failed: Vec<BatchRemoveFailure>,
}

#[derive(Debug, Serialize)]
pub struct BatchRemoveFailure {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct FileLinkRequest {
    pub path: String,
    #[serde(default)]
    pub force_download: bool,
}

#[derive(Debug, Serialize)]
pub struct FileLinkResponseDto {
    pub url: String,
    pub expires_at_ms: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MultipartInitRequest {
    pub path: String,
    pub file_name: String,
    pub file_size: u64,
    pub part_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct MultipartSignRequest {
    pub upload_id: String,
    pub part_numbers: Vec<u32>,
}

#[derive(Debug, Deserialize)]
pub struct MultipartCompleteRequest {
    pub upload_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MultipartAbortRequest {
    pub upload_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequestDto {
    pub query: String,
    #[serde(default)]
    pub scope: String,
    pub mount_id: Option<String>,
    pub path_prefix: Option<String>,
    #[serde(default = "default_search_limit")]
    pub limit: u32,
    pub cursor: Option<String>,
}

fn default_search_limit() -> u32 {
    50
}

#[derive(Debug, Serialize)]
pub struct SearchResponseDto {
    pub entries: Vec<crate::domain::fs_index::FsIndexEntry>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JobsListQuery {
    pub task_type: Option<String>,
    pub status: Option<String>,
    #[serde(default = "default_jobs_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_jobs_limit() -> u32 {
    50
}

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub task_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponseDto {
    pub error: String,
    pub kind: String,
}
