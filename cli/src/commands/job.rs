// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `cloudpaste job ...` — the job-admin surface (`/api/fs/jobs*`)
//! reached directly against the core, operated as an admin principal.

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use cloudpaste_core::domain::job::{TaskStatus, TaskType, TriggerType};
use cloudpaste_core::domain::principal::Principal;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum JobCommand {
    /// Enqueue a job (`copy`, `fs-index-rebuild`, `fs-index-apply-dirty`,
    /// `cleanup-upload-sessions`, `refresh-storage-usage-snapshots`).
    Create(CreateArgs),
    /// List jobs, optionally filtered by type/status.
    List(ListArgs),
    /// Show one job's full status.
    Get { job_id: String },
    /// Request cooperative cancellation of a pending/running job.
    Cancel { job_id: String },
    /// Delete a terminal job.
    Delete { job_id: String },
}

#[derive(Args)]
pub struct CreateArgs {
    task_type: String,
    /// JSON payload, e.g. '{"mountIds":["m1"]}'.
    #[arg(long, default_value = "{}")]
    payload: String,
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(long)]
    task_type: Option<String>,
    #[arg(long)]
    status: Option<String>,
    #[arg(long, default_value_t = 50)]
    limit: u32,
    #[arg(long, default_value_t = 0)]
    offset: u32,
}

fn parse_task_type(s: &str) -> Result<TaskType> {
    Ok(match s {
        "copy" => TaskType::Copy,
        "fs-index-rebuild" | "fs_index_rebuild" => TaskType::FsIndexRebuild,
        "fs-index-apply-dirty" | "fs_index_apply_dirty" => TaskType::FsIndexApplyDirty,
        "cleanup-upload-sessions" | "cleanup_upload_sessions" => TaskType::CleanupUploadSessions,
        "refresh-storage-usage-snapshots" | "refresh_storage_usage_snapshots" => TaskType::RefreshStorageUsageSnapshots,
        other => bail!("unknown task type '{other}'"),
    })
}

fn parse_status(s: &str) -> Result<TaskStatus> {
    Ok(match s {
        "pending" => TaskStatus::Pending,
        "running" => TaskStatus::Running,
        "completed" => TaskStatus::Completed,
        "failed" => TaskStatus::Failed,
        "cancelled" => TaskStatus::Cancelled,
        other => bail!("unknown status '{other}'"),
    })
}

pub async fn run(cmd: JobCommand, config_path: Option<PathBuf>) -> Result<()> {
    let ctx = super::bootstrap(config_path).await?;
    let operator = Principal::admin("cli-operator");

    match cmd {
        JobCommand::Create(args) => {
            let task_type = parse_task_type(&args.task_type)?;
            let payload: serde_json::Value = serde_json::from_str(&args.payload)?;
            let task = ctx.jobs.create_job(task_type, payload, &operator, TriggerType::Manual, None).await?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        JobCommand::List(args) => {
            let task_type = args.task_type.as_deref().map(parse_task_type).transpose()?;
            let status = args.status.as_deref().map(parse_status).transpose()?;
            let tasks = ctx.jobs.list_jobs(task_type, status, &operator, args.limit, args.offset).await?;
            println!("{}", serde_json::to_string_pretty(&tasks)?);
        }
        JobCommand::Get { job_id } => {
            let task = ctx.jobs.get_job_status(&job_id, &operator).await?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        JobCommand::Cancel { job_id } => {
            let task = ctx.jobs.cancel_job(&job_id, &operator).await?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        JobCommand::Delete { job_id } => {
            ctx.jobs.delete_job(&job_id, &operator).await?;
            println!("deleted {job_id}");
        }
    }
    Ok(())
}
