// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Use-case services, one module per aggregate or cross-cutting concern.

pub mod cache_bus;
pub mod job_engine;
pub mod job_handlers;
pub mod mount_manager;
pub mod multipart;
pub mod proxy_service;
pub mod quota_guard;
pub mod repository_factory;
pub mod scheduled_task_runner;
pub mod search_index;
pub mod streaming_service;
pub mod upload_admission;

pub use cache_bus::CacheBus;
pub use job_engine::JobEngine;
pub use mount_manager::MountManager;
pub use multipart::MultipartOrchestrator;
pub use proxy_service::ProxyService;
pub use quota_guard::QuotaGuard;
pub use scheduled_task_runner::ScheduledTaskRunner;
pub use search_index::SearchIndexService;
pub use streaming_service::StreamingService;
pub use upload_admission::UploadAdmission;
