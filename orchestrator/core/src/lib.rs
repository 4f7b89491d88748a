// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # cloudpaste-core
//!
//! The runtime heart of the CloudPaste gateway: a multi-tenant storage
//! gateway that fronts heterogeneous back-ends (S3-compatible object
//! stores, local disk, Google Drive, Hugging Face datasets, and mirrored
//! combinations of these) behind one virtual filesystem, with resumable
//! multipart uploads, a background job engine, a cross-mount search
//! index, and signed proxy access for private content.
//!
//! ## Layer structure
//!
//! ```text
//! presentation/   ← HTTP API (axum): REST surface + signed proxy route
//!     ↓
//! application/    ← Use-cases: mount resolution, multipart orchestration,
//!                   job engine, search index, cache bus, quota guard,
//!                   signed proxy, upload admission, scheduled tasks
//!     ↓
//! domain/         ← Aggregates, value objects, domain events, driver
//!                   contract, repository traits
//!     ↓
//! infrastructure/ ← Postgres/in-memory repositories, driver registry
//!                   (S3, local, Google Drive, Hugging Face, mirror),
//!                   config loading, the broadcast event bus, secrets
//! ```
//!
//! ## Integration tests
//!
//! See `orchestrator/core/tests/` for end-to-end scenarios covering
//! multipart uploads, cancellation, index reconciliation, the signed
//! proxy, and quota enforcement.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
