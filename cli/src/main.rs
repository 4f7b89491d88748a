// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # `cloudpaste` — CloudPaste gateway operator CLI
//!
//! Reaches the storage/job engine core directly (no HTTP hop), for the
//! administrative surface otherwise exposed over `/api/fs/jobs*` and
//! `/api/admin/fs/index/*`: job admin, search-index admin, and config
//! show/validate.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "cloudpaste", version, about = "CloudPaste storage gateway operator CLI")]
struct Cli {
    /// Explicit path to a GatewayConfig manifest (overrides discovery).
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Job admin: create, list, inspect, cancel, delete.
    #[command(subcommand)]
    Job(commands::job::JobCommand),
    /// Search-index admin: status, rebuild, apply-dirty, stop, clear.
    #[command(subcommand)]
    Index(commands::index::IndexCommand),
    /// Gateway configuration manifest: show, validate.
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Job(cmd) => commands::job::run(cmd, cli.config).await,
        Command::Index(cmd) => commands::index::run(cmd, cli.config).await,
        Command::Config(cmd) => commands::config::run(cmd, cli.config),
    };

    if let Err(err) = &result {
        eprintln!("{} {err}", "error:".red().bold());
    }
    result
}
