// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Storage driver implementations: one `opendal`-backed
//! adapter for every storage-first backend, bespoke adapters for the two
//! chat-as-storage backends, a redundancy-fanout mirror driver, and the
//! registry that builds and caches them per `storage_config_id`.

pub mod discord;
pub mod mirror;
pub mod opendal_driver;
pub mod registry;
pub mod telegram;

pub use discord::DiscordDriver;
pub use mirror::MirrorDriver;
pub use opendal_driver::OpendalDriver;
pub use registry::DriverRegistry;
pub use telegram::TelegramDriver;
