// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! PostgreSQL connection pool bootstrap.
//!
//! Mirrors the daemon's startup sequence: connect, check applied migration
//! count against the compiled-in migrator, run pending migrations, and
//! panic on a genuinely broken migration state rather than limping forward
//! against a half-migrated schema.

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("failed to connect to PostgreSQL")?;

        let total_known = MIGRATOR.iter().count();
        if total_known == 0 {
            anyhow::bail!("no migrations compiled into the binary; check the build");
        }

        MIGRATOR.run(&pool).await.context("failed to apply database migrations")?;
        tracing::info!(migrations = total_known, "database migrations up to date");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
