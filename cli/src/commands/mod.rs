// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod config;
pub mod index;
pub mod job;

use anyhow::{Context, Result};
use cloudpaste_core::application::job_engine::JobEngine;
use cloudpaste_core::application::repository_factory;
use cloudpaste_core::application::{CacheBus, SearchIndexService};
use cloudpaste_core::infrastructure::config::GatewayConfigManifest;
use cloudpaste_core::infrastructure::event_bus::EventBus;
use cloudpaste_core::domain::repository::{PostgresConfig, StorageBackend};
use std::path::PathBuf;
use std::sync::Arc;

/// Loads the gateway config manifest and connects the pieces a CLI
/// subcommand needs: a job engine (handlers registered, dispatcher NOT
/// started — the CLI only enqueues/inspects, it never runs handlers) and
/// a search-index service, both over the configured Postgres backend
/// when `spec.database.url` is set, or in-memory otherwise.
pub struct CliContext {
    pub config: GatewayConfigManifest,
    pub jobs: Arc<JobEngine>,
    pub search: Arc<SearchIndexService>,
}

pub async fn bootstrap(config_path: Option<PathBuf>) -> Result<CliContext> {
    let config = GatewayConfigManifest::load_or_default(config_path).context("failed to load gateway config")?;
    config.validate().context("gateway config failed validation")?;

    let (backend, pool) = match &config.spec.database.url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(config.spec.database.max_connections)
                .connect(url)
                .await
                .context("failed to connect to PostgreSQL")?;
            (StorageBackend::PostgreSQL(PostgresConfig { database_url: url.clone(), max_connections: config.spec.database.max_connections }), Some(pool))
        }
        None => (StorageBackend::InMemory, None),
    };

    let repos = repository_factory::create_repositories(&backend, pool);
    let events = EventBus::with_default_capacity();
    let jobs = Arc::new(JobEngine::new(repos.jobs.clone(), events, config.spec.jobs.stalled_after_secs as i64, config.spec.jobs.poll_interval_ms));
    let cache = Arc::new(CacheBus::new());
    let search = Arc::new(SearchIndexService::new(repos.fs_index.clone(), repos.mounts.clone(), cache));

    Ok(CliContext { config, jobs, search })
}
