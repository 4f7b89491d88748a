// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `Task` (job) — the generic, persisted unit of asynchronous work.
//! The handler registry and dispatcher live in `application::job_engine`;
//! this module owns only the state machine and the record shape.

use crate::domain::errors::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }

    fn allowed_next(self) -> &'static [TaskStatus] {
        use TaskStatus::*;
        match self {
            Pending => &[Running, Cancelled],
            Running => &[Completed, Failed, Cancelled],
            Completed | Failed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        self.allowed_next().contains(&next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Copy,
    FsIndexRebuild,
    FsIndexApplyDirty,
    CleanupUploadSessions,
    RefreshStorageUsageSnapshots,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Copy => "copy",
            TaskType::FsIndexRebuild => "fs_index_rebuild",
            TaskType::FsIndexApplyDirty => "fs_index_apply_dirty",
            TaskType::CleanupUploadSessions => "cleanup_upload_sessions",
            TaskType::RefreshStorageUsageSnapshots => "refresh_storage_usage_snapshots",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Manual,
    Scheduled,
    Api,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TaskProgress {
    pub current: u64,
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TaskStats {
    pub processed: u64,
    pub failed: u64,
    pub skipped: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub payload: Value,
    pub progress: TaskProgress,
    pub stats: TaskStats,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub trigger_type: TriggerType,
    pub trigger_ref: Option<String>,
}

impl Task {
    pub fn new(task_type: TaskType, payload: Value, created_by: impl Into<String>, trigger_type: TriggerType, trigger_ref: Option<String>) -> Self {
        Task {
            task_id: Uuid::new_v4().to_string(),
            task_type,
            status: TaskStatus::Pending,
            payload,
            progress: TaskProgress::default(),
            stats: TaskStats::default(),
            created_by: created_by.into(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            error_message: None,
            trigger_type,
            trigger_ref,
        }
    }

    pub fn mark_running(&mut self) -> CoreResult<()> {
        self.transition(TaskStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_completed(&mut self) -> CoreResult<()> {
        self.transition(TaskStatus::Completed)?;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) -> CoreResult<()> {
        self.error_message = Some(message.into());
        self.transition(TaskStatus::Failed)?;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_cancelled(&mut self) -> CoreResult<()> {
        self.transition(TaskStatus::Cancelled)?;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// `cancelJob` after terminal status is a no-op that fails `CONFLICT`
    /// (job-terminality invariant).
    pub fn request_cancel(&mut self) -> CoreResult<()> {
        if self.status.is_terminal() {
            return Err(CoreError::Conflict("job is already in a terminal state".into()));
        }
        self.mark_cancelled()
    }

    fn transition(&mut self, next: TaskStatus) -> CoreResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::Conflict(format!(
                "cannot transition task from {:?} to {next:?}",
                self.status
            )));
        }
        self.status = next;
        Ok(())
    }

    pub fn can_cancel(&self) -> bool {
        !self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task() -> Task {
        Task::new(TaskType::Copy, json!({}), "admin", TriggerType::Manual, None)
    }

    #[test]
    fn cancel_after_terminal_is_conflict() {
        let mut t = task();
        t.mark_running().unwrap();
        t.mark_completed().unwrap();
        assert!(t.request_cancel().is_err());
    }

    #[test]
    fn pending_can_be_cancelled_directly() {
        let mut t = task();
        assert!(t.can_cancel());
        t.request_cancel().unwrap();
        assert_eq!(t.status, TaskStatus::Cancelled);
    }
}
