// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `cloudpaste index ...` — the search-index admin surface
//! (`/api/admin/fs/index/*`).

use anyhow::Result;
use clap::Subcommand;
use cloudpaste_core::domain::principal::Principal;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum IndexCommand {
    /// Current state plus the recommended next action for a mount.
    Status { mount_id: String },
    /// Enqueue a rebuild job for the given mounts, or every active mount.
    Rebuild {
        #[arg(long = "mount")]
        mount_ids: Vec<String>,
    },
    /// Enqueue an apply-dirty job, optionally scoped to one mount.
    ApplyDirty {
        #[arg(long)]
        mount_id: Option<String>,
        #[arg(long, default_value_t = 500)]
        max_items: u32,
    },
    /// Cooperatively cancel a running rebuild/apply-dirty job.
    Stop { job_id: String },
    /// Drop derived rows for a mount and mark it `not_ready`.
    Clear { mount_id: String },
}

pub async fn run(cmd: IndexCommand, config_path: Option<PathBuf>) -> Result<()> {
    let ctx = super::bootstrap(config_path).await?;
    let operator = Principal::admin("cli-operator");

    match cmd {
        IndexCommand::Status { mount_id } => {
            let (state, recommendation) = ctx.search.status(&mount_id).await?;
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({
                "state": state,
                "recommendation": recommendation,
            }))?);
        }
        IndexCommand::Rebuild { mount_ids } => {
            let ids = if mount_ids.is_empty() { None } else { Some(mount_ids) };
            let task = ctx.search.enqueue_rebuild(ids, &operator, &ctx.jobs).await?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        IndexCommand::ApplyDirty { mount_id, max_items } => {
            let task = ctx.search.enqueue_apply_dirty(mount_id, max_items, &operator, &ctx.jobs).await?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        IndexCommand::Stop { job_id } => {
            ctx.search.stop(&job_id, &operator, &ctx.jobs).await?;
            println!("cancellation requested for {job_id}");
        }
        IndexCommand::Clear { mount_id } => {
            ctx.search.clear(&mount_id, &operator).await?;
            println!("cleared index state for mount {mount_id}");
        }
    }
    Ok(())
}
