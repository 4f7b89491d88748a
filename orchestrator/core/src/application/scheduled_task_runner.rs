// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Cron-like driver that enqueues jobs on fixed intervals (
//! component 10): `fs_index_apply_dirty`, `cleanup_upload_sessions`, and
//! `refresh_storage_usage_snapshots` all run unattended in production, each
//! on its own period: one `tokio::time::interval` per registered entry,
//! each enqueuing through the same `JobEngine` the dispatcher drains,
//! instead of one shared poll.

use crate::application::job_engine::JobEngine;
use crate::domain::job::{TaskType, TriggerType};
use crate::domain::principal::Principal;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// One maintenance task run on a fixed period, with a fresh payload minted
/// at every tick rather than reused, so callers can close over time-varying
/// state (e.g. "mounts active as of this tick").
pub struct ScheduledEntry {
    pub name: String,
    pub task_type: TaskType,
    pub period: std::time::Duration,
    pub payload: Box<dyn Fn() -> Value + Send + Sync>,
}

impl ScheduledEntry {
    pub fn new(name: impl Into<String>, task_type: TaskType, period: std::time::Duration, payload: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        Self { name: name.into(), task_type, period, payload: Box::new(payload) }
    }
}

pub struct ScheduledTaskRunner {
    entries: Vec<ScheduledEntry>,
    jobs: Arc<JobEngine>,
}

impl ScheduledTaskRunner {
    pub fn new(jobs: Arc<JobEngine>, entries: Vec<ScheduledEntry>) -> Self {
        Self { entries, jobs }
    }

    /// Spawns one ticking task per entry; all are cancelled together via
    /// `shutdown`. Each tick enqueues a job through the same `JobEngine`
    /// used for manual/API-triggered jobs, tagged `TriggerType::Scheduled`
    /// so the audit trail distinguishes automatic runs from operator ones.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> Vec<tokio::task::JoinHandle<()>> {
        let system = Principal::admin("scheduler");
        self.entries
            .iter()
            .enumerate()
            .map(|(idx, _)| {
                let runner = self.clone();
                let shutdown = shutdown.clone();
                let system = system.clone();
                tokio::spawn(async move {
                    let entry = &runner.entries[idx];
                    let mut ticker = tokio::time::interval(entry.period);
                    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                    loop {
                        tokio::select! {
                            _ = shutdown.cancelled() => return,
                            _ = ticker.tick() => {}
                        }
                        let payload = (entry.payload)();
                        match runner.jobs.create_job(entry.task_type, payload, &system, TriggerType::Scheduled, Some(entry.name.clone())).await {
                            Ok(task) => info!(task_id = %task.task_id, entry = %entry.name, "scheduled task enqueued"),
                            Err(err) => error!(entry = %entry.name, error = %err, "failed to enqueue scheduled task"),
                        }
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::event_bus::EventBus;
    use crate::infrastructure::repositories::InMemoryJobRepository;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn spawns_one_task_per_entry_and_stops_on_shutdown() {
        let jobs = Arc::new(JobEngine::new(Arc::new(InMemoryJobRepository::new()), EventBus::with_default_capacity(), 900, 10));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_for_closure = calls.clone();
        let entry = ScheduledEntry::new(
            "test-cleanup",
            TaskType::CleanupUploadSessions,
            std::time::Duration::from_millis(10),
            move || {
                calls_for_closure.fetch_add(1, Ordering::SeqCst);
                json!({})
            },
        );
        let runner = Arc::new(ScheduledTaskRunner::new(jobs.clone(), vec![entry]));
        let shutdown = CancellationToken::new();
        let handles = runner.spawn(shutdown.clone());

        tokio::time::sleep(std::time::Duration::from_millis(45)).await;
        shutdown.cancel();
        for h in handles {
            let _ = h.await;
        }
        assert!(calls.load(Ordering::SeqCst) >= 2);
    }
}
