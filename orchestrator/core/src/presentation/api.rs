// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Thin HTTP adapter: translates requests into application
//! service calls and `CoreError` into the `{success, message, data}`
//! envelope. No business logic lives here.

use crate::application::cache_bus::{CachedListing, EtagEntry};
use crate::application::job_engine::JobEngine;
use crate::application::mount_manager::{MountManager, ResolveOutcome};
use crate::application::multipart::MultipartOrchestrator;
use crate::application::proxy_service::ProxyService;
use crate::application::search_index::{SearchIndexService, SearchQuery, SearchScope};
use crate::application::streaming_service::{ConditionalRequest, StreamOutcome, StreamingService};
use crate::application::upload_admission::UploadAdmission;
use crate::application::CacheBus;
use crate::domain::driver::{DriverCtx, ListOptions};
use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::events::{CacheInvalidation, CacheScope, GatewayEvent, StorageEvent};
use crate::domain::fs_index::{DirtyOp, FsIndexDirty};
use crate::domain::job::{TaskStatus, TaskType, TriggerType};
use crate::domain::principal::{Permission, Principal, PrincipalType};
use crate::domain::repository::{FsIndexRepository, MountRepository, StorageConfigRepository, UploadSessionRepository, VfsNodeRepository};
use crate::infrastructure::event_bus::EventBus;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use futures::TryStreamExt;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

use crate::presentation::dto::*;

pub struct AppState {
    pub mounts: Arc<MountManager>,
    pub multipart: Arc<MultipartOrchestrator>,
    pub jobs: Arc<JobEngine>,
    pub search: Arc<SearchIndexService>,
    pub proxy: Arc<ProxyService>,
    pub cache: Arc<CacheBus>,
    pub admission: Arc<UploadAdmission>,
    pub storage_configs: Arc<dyn StorageConfigRepository>,
    pub fs_index: Arc<dyn FsIndexRepository>,
    pub vfs_nodes: Arc<dyn VfsNodeRepository>,
    pub mounts_repo: Arc<dyn MountRepository>,
    pub upload_sessions: Arc<dyn UploadSessionRepository>,
    pub events: EventBus,
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/fs/list", get(list))
        .route("/api/fs/get", get(get_info))
        .route("/api/fs/download", get(download))
        .route("/api/fs/content", get(content))
        .route("/api/fs/file-link", get(file_link))
        .route("/api/fs/rename", post(rename))
        .route("/api/fs/batch-remove", delete(batch_remove))
        .route("/api/fs/jobs", post(create_job).get(list_jobs))
        .route("/api/fs/jobs/{job_id}", get(get_job).delete(delete_job))
        .route("/api/fs/jobs/{job_id}/cancel", post(cancel_job))
        .route("/api/fs/multipart/init", post(multipart_init))
        .route("/api/fs/multipart/sign-parts", post(multipart_sign_parts))
        .route("/api/fs/multipart/upload-chunk", axum::routing::put(multipart_upload_chunk))
        .route("/api/fs/multipart/complete", post(multipart_complete))
        .route("/api/fs/multipart/abort", post(multipart_abort))
        .route("/api/fs/multipart/list-parts", post(multipart_list_parts))
        .route("/api/fs/search", get(search))
        .route("/api/admin/fs/index/status", get(admin_index_status))
        .route("/api/admin/fs/index/rebuild", post(admin_index_rebuild))
        .route("/api/admin/fs/index/apply-dirty", post(admin_index_apply_dirty))
        .route("/api/admin/fs/index/stop", post(admin_index_stop))
        .route("/api/admin/fs/index/clear", post(admin_index_clear))
        .route("/p/{*path}", get(proxy_get))
        .with_state(state)
}

/// Lifts the caller's identity from headers. The real authentication
/// adapter (out of scope here) is expected to populate
/// these after verifying a session/API key; absence maps to an
/// unauthenticated `Anon` principal.
fn principal_from_headers(headers: &HeaderMap) -> Principal {
    let principal_type = match headers.get("x-cloudpaste-principal-type").and_then(|v| v.to_str().ok()) {
        Some("admin") => PrincipalType::Admin,
        Some("api_key") => PrincipalType::ApiKey,
        _ => PrincipalType::Anon,
    };
    let id = headers.get("x-cloudpaste-principal-id").and_then(|v| v.to_str().ok()).unwrap_or("anon").to_string();
    let allowed_base_path = headers.get("x-cloudpaste-allowed-base-path").and_then(|v| v.to_str().ok()).map(str::to_string);
    let permissions = if principal_type == PrincipalType::Admin {
        HashSet::from([Permission::Read, Permission::Write, Permission::Delete, Permission::Share, Permission::Admin])
    } else {
        HashSet::from([Permission::Read, Permission::Write])
    };
    Principal { principal_type, id, permissions, allowed_base_path }
}

fn req_id(headers: &HeaderMap) -> String {
    headers.get("x-request-id").and_then(|v| v.to_str().ok()).map(str::to_string).unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn envelope_ok(data: serde_json::Value) -> Response {
    (StatusCode::OK, Json(json!({ "success": true, "message": "ok", "data": data }))).into_response()
}

fn envelope_err(err: CoreError) -> Response {
    let kind = err.kind();
    let status = StatusCode::from_u16(kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponseDto { error: err.to_string(), kind: format!("{kind:?}") })).into_response()
}

async fn resolve_or_err(mounts: &MountManager, path: &str, principal: &Principal, keep_trailing_slash: bool) -> Result<crate::application::mount_manager::ResolvedTarget, Response> {
    match mounts.resolve(path, principal, keep_trailing_slash).await {
        Ok(ResolveOutcome::Mount(target)) => Ok(target),
        Ok(ResolveOutcome::VirtualRoot(_)) => Err(envelope_err(CoreError::Validation(format!("{path} is not inside a mount")))),
        Err(err) => Err(envelope_err(err)),
    }
}

fn driver_ctx(mount: crate::domain::mount::Mount, principal: Principal, req_id: String) -> DriverCtx {
    DriverCtx { mount, principal, req_id, cancellation: tokio_util::sync::CancellationToken::new() }
}

async fn list(State(state): State<Arc<AppState>>, headers: HeaderMap, Query(q): Query<ListQuery>) -> Response {
    let principal = principal_from_headers(&headers);
    let target = match resolve_or_err(&state.mounts, &q.path, &principal, true).await {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    let principal_scope = format!("{:?}:{}:{:?}", principal.principal_type, principal.id, principal.allowed_base_path);
    if !q.refresh {
        if let Some(cached) = state.cache.get_listing(&target.mount.id, &target.sub_path, &principal_scope) {
            return (
                StatusCode::OK,
                [("ETag", cached.etag.clone())],
                Json(json!({ "success": true, "message": "ok", "data": serde_json::from_slice::<serde_json::Value>(&cached.body).unwrap_or(json!({})) })),
            )
                .into_response();
        }
    }

    let driver = match state.mounts.driver_for(&target.mount).await {
        Ok(d) => d,
        Err(err) => return envelope_err(err),
    };
    let ctx = driver_ctx(target.mount.clone(), principal.clone(), req_id(&headers));
    let opts = ListOptions { refresh: q.refresh, cursor: q.cursor, limit: q.limit };
    let listing = match driver.list_directory(&target.sub_path, opts, &ctx).await {
        Ok(l) => l,
        Err(err) => return envelope_err(err),
    };

    let etag_entries: Vec<EtagEntry> = listing
        .items
        .iter()
        .map(|i| EtagEntry { path: &i.path, is_dir: i.is_dir, size: i.size, modified_ms: i.modified.map(|m| m.timestamp_millis()), etag: None })
        .collect();
    let etag = crate::application::cache_bus::directory_etag(&target.mount.id, &target.sub_path, &etag_entries);

    let dto = ListResponseDto {
        path: listing.path.clone(),
        items: listing.items.into_iter().map(FileInfoDto::from).collect(),
        next_cursor: listing.next_cursor,
        etag: etag.clone(),
    };
    let body = serde_json::to_vec(&dto).unwrap_or_default();
    state.cache.put_listing(&target.mount.id, &target.sub_path, &principal_scope, CachedListing { etag: etag.clone(), body });

    (StatusCode::OK, [("ETag", etag)], Json(json!({ "success": true, "message": "ok", "data": dto }))).into_response()
}

async fn get_info(State(state): State<Arc<AppState>>, headers: HeaderMap, Query(q): Query<PathQuery>) -> Response {
    let principal = principal_from_headers(&headers);
    let target = match resolve_or_err(&state.mounts, &q.path, &principal, false).await {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let driver = match state.mounts.driver_for(&target.mount).await {
        Ok(d) => d,
        Err(err) => return envelope_err(err),
    };
    let ctx = driver_ctx(target.mount.clone(), principal, req_id(&headers));
    match driver.get_file_info(&target.sub_path, &ctx).await {
        Ok(info) => envelope_ok(serde_json::to_value(FileInfoDto::from(info)).unwrap_or_default()),
        Err(err) => envelope_err(err),
    }
}

async fn stream_response(headers: &HeaderMap, driver: &dyn crate::domain::driver::StorageDriver, sub_path: &str, ctx: &DriverCtx) -> Response {
    let conditional = ConditionalRequest {
        if_none_match: headers.get("if-none-match").and_then(|v| v.to_str().ok()).map(str::to_string),
        range: headers.get("range").and_then(|v| v.to_str().ok()).map(str::to_string),
    };
    match StreamingService::stream(driver, sub_path, &conditional, ctx).await {
        Ok(StreamOutcome::NotModified { etag }) => {
            let mut resp = StatusCode::NOT_MODIFIED.into_response();
            if let Some(etag) = etag {
                resp.headers_mut().insert("ETag", etag.parse().unwrap());
            }
            resp
        }
        Ok(StreamOutcome::RangeNotSatisfiable { total_size }) => {
            let mut resp = StatusCode::RANGE_NOT_SATISFIABLE.into_response();
            resp.headers_mut().insert("Content-Range", format!("bytes */{total_size}").parse().unwrap());
            resp
        }
        Ok(StreamOutcome::Body { size, content_type, etag, range, total_size, stream }) => {
            let status = if range.is_some() { StatusCode::PARTIAL_CONTENT } else { StatusCode::OK };
            let mut builder = Response::builder().status(status).header("Cache-Control", "private, no-cache").header("Vary", "Authorization, X-FS-Path-Token");
            if let Some(ct) = content_type {
                builder = builder.header("Content-Type", ct);
            }
            if let Some(etag) = etag {
                builder = builder.header("ETag", etag);
            }
            if let Some(size) = size {
                builder = builder.header("Content-Length", size.to_string());
            }
            if let (Some(range), Some(total)) = (range, total_size) {
                builder = builder.header("Content-Range", format!("bytes {}-{}/{}", range.start, range.end, total));
            }
            builder.body(Body::from_stream(stream)).unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(err) => envelope_err(err),
    }
}

async fn download(State(state): State<Arc<AppState>>, headers: HeaderMap, Query(q): Query<PathQuery>) -> Response {
    let principal = principal_from_headers(&headers);
    let target = match resolve_or_err(&state.mounts, &q.path, &principal, false).await {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let driver = match state.mounts.driver_for(&target.mount).await {
        Ok(d) => d,
        Err(err) => return envelope_err(err),
    };
    let ctx = driver_ctx(target.mount.clone(), principal, req_id(&headers));
    if !target.mount.web_proxy && !target.mount.require_signature {
        if let Ok(Some(url)) = driver.generate_proxy_url(&target.sub_path, &ctx).await {
            return (StatusCode::FOUND, [("Location", url)]).into_response();
        }
    }
    stream_response(&headers, driver.as_ref(), &target.sub_path, &ctx).await
}

async fn content(State(state): State<Arc<AppState>>, headers: HeaderMap, Query(q): Query<PathQuery>) -> Response {
    let principal = principal_from_headers(&headers);
    let target = match resolve_or_err(&state.mounts, &q.path, &principal, false).await {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let driver = match state.mounts.driver_for(&target.mount).await {
        Ok(d) => d,
        Err(err) => return envelope_err(err),
    };
    let ctx = driver_ctx(target.mount.clone(), principal, req_id(&headers));
    stream_response(&headers, driver.as_ref(), &target.sub_path, &ctx).await
}

async fn file_link(State(state): State<Arc<AppState>>, headers: HeaderMap, Query(q): Query<FileLinkRequest>) -> Response {
    let principal = principal_from_headers(&headers);
    let target = match resolve_or_err(&state.mounts, &q.path, &principal, false).await {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let driver = match state.mounts.driver_for(&target.mount).await {
        Ok(d) => d,
        Err(err) => return envelope_err(err),
    };
    let ctx = driver_ctx(target.mount.clone(), principal, req_id(&headers));

    if target.mount.require_signature || target.mount.web_proxy {
        let (sig, ts) = state.proxy.sign(&target.sub_path, Utc::now().timestamp_millis());
        let query = if q.force_download { format!("sign={sig}&ts={ts}&download=1") } else { format!("sign={sig}&ts={ts}") };
        return envelope_ok(serde_json::to_value(FileLinkResponseDto { url: format!("/p{}?{query}", target.mount.mount_path), expires_at_ms: Some(ts) }).unwrap_or_default());
    }

    match driver.generate_proxy_url(&target.sub_path, &ctx).await {
        Ok(Some(url)) => envelope_ok(serde_json::to_value(FileLinkResponseDto { url, expires_at_ms: None }).unwrap_or_default()),
        Ok(None) => envelope_err(CoreError::NotSupported(crate::domain::driver::Capability::DIRECT_LINK)),
        Err(err) => envelope_err(err),
    }
}

async fn rename(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<RenameRequest>) -> Response {
    let principal = principal_from_headers(&headers);
    let target = match resolve_or_err(&state.mounts, &body.path, &principal, false).await {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let new_target = match resolve_or_err(&state.mounts, &body.new_path, &principal, false).await {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    if target.mount.id != new_target.mount.id {
        return envelope_err(CoreError::Validation("rename cannot cross mounts; use a copy job instead".into()));
    }
    let driver = match state.mounts.driver_for(&target.mount).await {
        Ok(d) => d,
        Err(err) => return envelope_err(err),
    };
    let ctx = driver_ctx(target.mount.clone(), principal, req_id(&headers));
    match driver.rename_item(&target.sub_path, &new_target.sub_path, &ctx).await {
        Ok(()) => {
            invalidate_after_write(&state, &target.mount.id, &body.path).await;
            invalidate_after_write(&state, &target.mount.id, &body.new_path).await;
            envelope_ok(json!({ "renamed": true }))
        }
        Err(err) => envelope_err(err),
    }
}

async fn batch_remove(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<BatchRemoveRequest>) -> Response {
    let principal = principal_from_headers(&headers);
    let mut removed = Vec::new();
    let mut failed = Vec::new();

    for path in &body.paths {
        let target = match resolve_or_err(&state.mounts, path, &principal, false).await {
            Ok(t) => t,
            Err(_) => {
                failed.push(BatchRemoveFailure { path: path.clone(), reason: "not inside a mount".into() });
                continue;
            }
        };
        let driver = match state.mounts.driver_for(&target.mount).await {
            Ok(d) => d,
            Err(err) => {
                failed.push(BatchRemoveFailure { path: path.clone(), reason: err.to_string() });
                continue;
            }
        };
        let ctx = driver_ctx(target.mount.clone(), principal.clone(), req_id(&headers));
        match driver.remove(&target.sub_path, &ctx).await {
            Ok(()) => {
                invalidate_after_write(&state, &target.mount.id, path).await;
                removed.push(path.clone());
            }
            Err(err) => failed.push(BatchRemoveFailure { path: path.clone(), reason: err.to_string() }),
        }
    }
    envelope_ok(serde_json::to_value(BatchRemoveResponseDto { removed, failed }).unwrap_or_default())
}

async fn invalidate_after_write(state: &AppState, mount_id: &str, fs_path: &str) {
    let _ = state
        .fs_index
        .enqueue_dirty(&FsIndexDirty { mount_id: mount_id.to_string(), fs_path: fs_path.to_string(), op: DirtyOp::Upsert, created_at_ms: Utc::now().timestamp_millis() })
        .await;
    state.cache.apply(&CacheInvalidation { scope: CacheScope::Directory, mount_id: Some(mount_id.to_string()), storage_config_id: None });
    state.events.publish(GatewayEvent::Storage(StorageEvent::MountWritten { mount_id: mount_id.to_string(), sub_path: fs_path.to_string(), at: Utc::now() }));
}

fn parse_task_type(raw: &str) -> CoreResult<TaskType> {
    match raw {
        "copy" => Ok(TaskType::Copy),
        "fs_index_rebuild" => Ok(TaskType::FsIndexRebuild),
        "fs_index_apply_dirty" => Ok(TaskType::FsIndexApplyDirty),
        "cleanup_upload_sessions" => Ok(TaskType::CleanupUploadSessions),
        "refresh_storage_usage_snapshots" => Ok(TaskType::RefreshStorageUsageSnapshots),
        other => Err(CoreError::Validation(format!("unknown task type {other}"))),
    }
}

fn parse_task_status(raw: &str) -> CoreResult<TaskStatus> {
    match raw {
        "pending" => Ok(TaskStatus::Pending),
        "running" => Ok(TaskStatus::Running),
        "completed" => Ok(TaskStatus::Completed),
        "failed" => Ok(TaskStatus::Failed),
        "cancelled" => Ok(TaskStatus::Cancelled),
        other => Err(CoreError::Validation(format!("unknown job status {other}"))),
    }
}

async fn create_job(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<CreateJobRequest>) -> Response {
    let principal = principal_from_headers(&headers);
    let task_type = match parse_task_type(&body.task_type) {
        Ok(t) => t,
        Err(err) => return envelope_err(err),
    };
    match state.jobs.create_job(task_type, body.payload, &principal, TriggerType::Api, None).await {
        Ok(task) => envelope_ok(serde_json::to_value(task).unwrap_or_default()),
        Err(err) => envelope_err(err),
    }
}

async fn get_job(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(job_id): Path<String>) -> Response {
    let principal = principal_from_headers(&headers);
    match state.jobs.get_job_status(&job_id, &principal).await {
        Ok(task) => {
            let can_cancel = task.can_cancel();
            let mut value = serde_json::to_value(&task).unwrap_or_default();
            value["allowedActions"] = json!({ "canCancel": can_cancel });
            envelope_ok(value)
        }
        Err(err) => envelope_err(err),
    }
}

async fn cancel_job(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(job_id): Path<String>) -> Response {
    let principal = principal_from_headers(&headers);
    match state.jobs.cancel_job(&job_id, &principal).await {
        Ok(task) => envelope_ok(serde_json::to_value(task).unwrap_or_default()),
        Err(err) => envelope_err(err),
    }
}

async fn delete_job(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(job_id): Path<String>) -> Response {
    let principal = principal_from_headers(&headers);
    match state.jobs.delete_job(&job_id, &principal).await {
        Ok(()) => envelope_ok(json!({ "deleted": true })),
        Err(err) => envelope_err(err),
    }
}

async fn list_jobs(State(state): State<Arc<AppState>>, headers: HeaderMap, Query(q): Query<JobsListQuery>) -> Response {
    let principal = principal_from_headers(&headers);
    let task_type = match q.task_type.as_deref().map(parse_task_type).transpose() {
        Ok(t) => t,
        Err(err) => return envelope_err(err),
    };
    let status = match q.status.as_deref().map(parse_task_status).transpose() {
        Ok(s) => s,
        Err(err) => return envelope_err(err),
    };
    match state.jobs.list_jobs(task_type, status, &principal, q.limit, q.offset).await {
        Ok(tasks) => envelope_ok(serde_json::to_value(tasks).unwrap_or_default()),
        Err(err) => envelope_err(err),
    }
}

async fn multipart_init(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<MultipartInitRequest>) -> Response {
    let principal = principal_from_headers(&headers);
    let admitted = match state
        .admission
        .admit(&body.path, &body.file_name, body.file_size, &principal, &req_id(&headers), tokio_util::sync::CancellationToken::new())
        .await
    {
        Ok(a) => a,
        Err(err) => return envelope_err(err),
    };
    let ctx = driver_ctx(admitted.mount.clone(), principal.clone(), req_id(&headers));
    match state
        .multipart
        .initialize(&principal.id, &admitted.mount, &admitted.storage_config, &admitted.parent_sub_path, &body.file_name, body.file_size, body.part_size, &ctx)
        .await
    {
        Ok(descriptor) => envelope_ok(serde_json::to_value(descriptor).unwrap_or_default()),
        Err(err) => envelope_err(err),
    }
}

async fn multipart_sign_parts(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<MultipartSignRequest>) -> Response {
    let principal = principal_from_headers(&headers);
    match state.multipart.sign_parts(&body.upload_id, &principal.id, &body.part_numbers).await {
        Ok(parts) => envelope_ok(serde_json::to_value(parts).unwrap_or_default()),
        Err(err) => envelope_err(err),
    }
}

#[derive(serde::Deserialize)]
struct UploadChunkQuery {
    upload_id: String,
}

async fn multipart_upload_chunk(State(state): State<Arc<AppState>>, headers: HeaderMap, Query(q): Query<UploadChunkQuery>, body: Body) -> Response {
    let principal = principal_from_headers(&headers);
    let content_range = match headers.get("content-range").and_then(|v| v.to_str().ok()).and_then(parse_content_range) {
        Some(r) => r,
        None => return envelope_err(CoreError::Validation("Content-Range header is required".into())),
    };

    let session = match state.upload_sessions.get(&q.upload_id).await {
        Ok(s) => s,
        Err(err) => return envelope_err(err.into()),
    };
    let mount = match state.mounts_repo.get(&session.mount_id).await {
        Ok(m) => m,
        Err(err) => return envelope_err(err.into()),
    };
    let ctx = driver_ctx(mount, principal.clone(), req_id(&headers));

    let byte_stream: crate::domain::driver::ByteStream = Box::pin(body.into_data_stream().map_err(|e| CoreError::Internal(e.to_string())));
    match state.multipart.proxy_chunk(&q.upload_id, &principal.id, content_range, byte_stream, &ctx).await {
        Ok(outcome) => envelope_ok(serde_json::to_value(outcome).unwrap_or_default()),
        Err(err) => envelope_err(err),
    }
}

fn parse_content_range(raw: &str) -> Option<(u64, u64, u64)> {
    let rest = raw.strip_prefix("bytes ")?;
    let (range, total) = rest.split_once('/')?;
    let (start, end) = range.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?, total.parse().ok()?))
}

async fn multipart_complete(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<MultipartCompleteRequest>) -> Response {
    let principal = principal_from_headers(&headers);
    let session = match state.upload_sessions.get(&body.upload_id).await {
        Ok(s) => s,
        Err(err) => return envelope_err(err.into()),
    };
    let mount = match state.mounts_repo.get(&session.mount_id).await {
        Ok(m) => m,
        Err(err) => return envelope_err(err.into()),
    };
    let storage_config = match state.storage_configs.get(&mount.storage_config_id).await {
        Ok(c) => c,
        Err(err) => return envelope_err(err.into()),
    };
    let ctx = driver_ctx(mount, principal.clone(), req_id(&headers));
    match state.multipart.complete(&body.upload_id, &principal.id, &ctx, &storage_config).await {
        Ok(outcome) => envelope_ok(serde_json::to_value(outcome).unwrap_or_default()),
        Err(err) => envelope_err(err),
    }
}

async fn multipart_abort(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<MultipartAbortRequest>) -> Response {
    let principal = principal_from_headers(&headers);
    let session = match state.upload_sessions.get(&body.upload_id).await {
        Ok(s) => s,
        Err(err) => return envelope_err(err.into()),
    };
    let mount = match state.mounts_repo.get(&session.mount_id).await {
        Ok(m) => m,
        Err(err) => return envelope_err(err.into()),
    };
    let ctx = driver_ctx(mount, principal.clone(), req_id(&headers));
    match state.multipart.abort(&body.upload_id, &principal.id, &ctx).await {
        Ok(()) => envelope_ok(json!({ "aborted": true })),
        Err(err) => envelope_err(err),
    }
}

#[derive(serde::Deserialize)]
struct ListPartsRequest {
    upload_id: String,
}

async fn multipart_list_parts(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<ListPartsRequest>) -> Response {
    let principal = principal_from_headers(&headers);
    match state.multipart.list_parts(&body.upload_id, &principal.id).await {
        Ok(parts) => envelope_ok(serde_json::to_value(parts).unwrap_or_default()),
        Err(err) => envelope_err(err),
    }
}

async fn search(State(state): State<Arc<AppState>>, Query(q): Query<SearchRequestDto>) -> Response {
    let scope = match q.scope.as_str() {
        "mount" => SearchScope::Mount,
        "directory" => SearchScope::Directory,
        _ => SearchScope::Global,
    };
    let query = SearchQuery { query: q.query, scope, mount_id: q.mount_id, path_prefix: q.path_prefix, limit: q.limit, cursor: q.cursor };
    match state.search.search(query).await {
        Ok(page) => envelope_ok(serde_json::to_value(SearchResponseDto { entries: page.entries, next_cursor: page.next_cursor }).unwrap_or_default()),
        Err(err) => envelope_err(err),
    }
}

async fn admin_index_status(State(state): State<Arc<AppState>>, Query(q): Query<PathQuery>) -> Response {
    match state.search.status(&q.path).await {
        Ok((s, rec)) => envelope_ok(json!({ "state": s, "recommendation": rec })),
        Err(err) => envelope_err(err),
    }
}

#[derive(serde::Deserialize)]
struct RebuildRequest {
    mount_ids: Option<Vec<String>>,
}

async fn admin_index_rebuild(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<RebuildRequest>) -> Response {
    let principal = principal_from_headers(&headers);
    match state.search.enqueue_rebuild(body.mount_ids, &principal, &state.jobs).await {
        Ok(task) => envelope_ok(serde_json::to_value(task).unwrap_or_default()),
        Err(err) => envelope_err(err),
    }
}

#[derive(serde::Deserialize)]
struct ApplyDirtyRequest {
    mount_id: Option<String>,
    #[serde(default = "default_apply_dirty_max")]
    max_items: u32,
}

fn default_apply_dirty_max() -> u32 {
    500
}

async fn admin_index_apply_dirty(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<ApplyDirtyRequest>) -> Response {
    let principal = principal_from_headers(&headers);
    match state.search.enqueue_apply_dirty(body.mount_id, body.max_items, &principal, &state.jobs).await {
        Ok(task) => envelope_ok(serde_json::to_value(task).unwrap_or_default()),
        Err(err) => envelope_err(err),
    }
}

#[derive(serde::Deserialize)]
struct StopRequest {
    job_id: String,
}

async fn admin_index_stop(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<StopRequest>) -> Response {
    let principal = principal_from_headers(&headers);
    match state.search.stop(&body.job_id, &principal, &state.jobs).await {
        Ok(()) => envelope_ok(json!({ "stopped": true })),
        Err(err) => envelope_err(err),
    }
}

#[derive(serde::Deserialize)]
struct ClearRequest {
    mount_id: String,
}

async fn admin_index_clear(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<ClearRequest>) -> Response {
    let principal = principal_from_headers(&headers);
    match state.search.clear(&body.mount_id, &principal).await {
        Ok(()) => envelope_ok(json!({ "cleared": true })),
        Err(err) => envelope_err(err),
    }
}

#[derive(serde::Deserialize)]
struct ProxyQuery {
    sign: Option<String>,
    ts: Option<i64>,
    download: Option<bool>,
}

async fn proxy_get(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(raw_path): Path<String>, Query(q): Query<ProxyQuery>) -> Response {
    let fs_path = format!("/{}", raw_path.trim_start_matches('/'));
    let principal = Principal { principal_type: PrincipalType::Anon, id: "proxy".into(), permissions: HashSet::from([Permission::Read]), allowed_base_path: None };

    let target = match resolve_or_err(&state.mounts, &fs_path, &principal, false).await {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let driver = match state.mounts.driver_for(&target.mount).await {
        Ok(d) => d,
        Err(err) => return envelope_err(err),
    };
    let req_id = req_id(&headers);
    let ctx = driver_ctx(target.mount.clone(), principal, req_id);

    let conditional = ConditionalRequest {
        if_none_match: headers.get("if-none-match").and_then(|v| v.to_str().ok()).map(str::to_string),
        range: headers.get("range").and_then(|v| v.to_str().ok()).map(str::to_string),
    };
    let now_ms = Utc::now().timestamp_millis();
    match state
        .proxy
        .serve(&target.mount, &target.sub_path, driver.as_ref(), q.sign.as_deref(), q.ts, &conditional, &ctx, now_ms)
        .await
    {
        Ok(StreamOutcome::NotModified { etag }) => {
            let mut resp = StatusCode::NOT_MODIFIED.into_response();
            if let Some(etag) = etag {
                resp.headers_mut().insert("ETag", etag.parse().unwrap());
            }
            resp
        }
        Ok(StreamOutcome::RangeNotSatisfiable { total_size }) => {
            let mut resp = StatusCode::RANGE_NOT_SATISFIABLE.into_response();
            resp.headers_mut().insert("Content-Range", format!("bytes */{total_size}").parse().unwrap());
            resp
        }
        Ok(StreamOutcome::Body { size, content_type, etag, range, total_size, stream }) => {
            let status = if range.is_some() { StatusCode::PARTIAL_CONTENT } else { StatusCode::OK };
            let mut builder = Response::builder().status(status).header("Cache-Control", "private, no-cache").header("Vary", "Authorization, X-FS-Path-Token");
            if let Some(ct) = content_type {
                builder = builder.header("Content-Type", ct);
            }
            if let Some(etag) = etag {
                builder = builder.header("ETag", etag);
            }
            if let Some(size) = size {
                builder = builder.header("Content-Length", size.to_string());
            }
            if q.download.unwrap_or(false) {
                builder = builder.header("Content-Disposition", "attachment");
            }
            if let (Some(range), Some(total)) = (range, total_size) {
                builder = builder.header("Content-Range", format!("bytes {}-{}/{}", range.start, range.end, total));
            }
            builder.body(Body::from_stream(stream)).unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(err) => envelope_err(err),
    }
}
