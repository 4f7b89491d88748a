// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod driver;
pub mod errors;
pub mod events;
pub mod fs_index;
pub mod job;
pub mod mount;
pub mod path;
pub mod principal;
pub mod proxy_signature;
pub mod repository;
pub mod storage_config;
pub mod upload_session;
pub mod usage_snapshot;
pub mod vfs_node;
