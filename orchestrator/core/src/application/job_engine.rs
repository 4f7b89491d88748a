// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Generic asynchronous job engine: dispatcher, state
//! machine transitions, and cooperative cancellation. Handlers themselves
//! live in `application::job_handlers`.

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::job::{Task, TaskStatus, TaskType, TriggerType};
use crate::domain::principal::Principal;
use crate::domain::repository::JobRepository;
use crate::infrastructure::event_bus::EventBus;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// One registered job type's execution logic. Implementations MUST check
/// `cancellation` at every item/batch/page boundary.
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn task_type(&self) -> TaskType;

    async fn run(&self, task: &mut Task, cancellation: CancellationToken) -> CoreResult<()>;
}

pub struct JobEngine {
    jobs: Arc<dyn JobRepository>,
    handlers: DashMap<TaskType, Arc<dyn JobHandler>>,
    running: DashMap<String, CancellationToken>,
    events: EventBus,
    stalled_after_secs: i64,
    poll_interval_ms: u64,
}

impl JobEngine {
    pub fn new(jobs: Arc<dyn JobRepository>, events: EventBus, stalled_after_secs: i64, poll_interval_ms: u64) -> Self {
        Self { jobs, handlers: DashMap::new(), running: DashMap::new(), events, stalled_after_secs, poll_interval_ms }
    }

    pub fn register(&self, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(handler.task_type(), handler);
    }

    /// `createJob`. Enqueues a `pending` task; a background
    /// dispatcher worker (spawned via [`Self::run_dispatcher`]) picks it up.
    pub async fn create_job(
        &self,
        task_type: TaskType,
        payload: Value,
        principal: &Principal,
        trigger_type: TriggerType,
        trigger_ref: Option<String>,
    ) -> CoreResult<Task> {
        let task = Task::new(task_type, payload, principal.id.clone(), trigger_type, trigger_ref);
        self.jobs.create(&task).await?;
        self.events.publish(crate::domain::events::GatewayEvent::Job(crate::domain::events::JobEvent::Dispatched {
            task_id: task.task_id.clone(),
            task_type: task_type.as_str().to_string(),
            at: Utc::now(),
        }));
        Ok(task)
    }

    /// `getJobStatus`. Non-admin principals may only see
    /// their own jobs.
    pub async fn get_job_status(&self, job_id: &str, principal: &Principal) -> CoreResult<Task> {
        let task = self.jobs.get(job_id).await?;
        self.ensure_visible(&task, principal)?;
        Ok(task)
    }

    /// `cancelJob`. Marks the task `cancelled` and, if it is
    /// currently executing on this process, trips its cancellation token.
    pub async fn cancel_job(&self, job_id: &str, principal: &Principal) -> CoreResult<Task> {
        let mut task = self.jobs.get(job_id).await?;
        self.ensure_visible(&task, principal)?;
        task.request_cancel()?;
        self.jobs.update(&task).await?;
        if let Some(token) = self.running.get(job_id) {
            token.cancel();
        }
        Ok(task)
    }

    pub async fn list_jobs(
        &self,
        task_type: Option<TaskType>,
        status: Option<TaskStatus>,
        principal: &Principal,
        limit: u32,
        offset: u32,
    ) -> CoreResult<Vec<Task>> {
        let limit = limit.min(100);
        let created_by = if principal.is_admin() { None } else { Some(principal.id.as_str()) };
        Ok(self.jobs.list(task_type, status, created_by, limit, offset).await?)
    }

    /// `deleteJob`. Only terminal jobs may be deleted.
    pub async fn delete_job(&self, job_id: &str, principal: &Principal) -> CoreResult<()> {
        let task = self.jobs.get(job_id).await?;
        self.ensure_visible(&task, principal)?;
        if !task.status.is_terminal() {
            return Err(CoreError::Conflict("job must reach a terminal status before it can be deleted".into()));
        }
        self.jobs.delete(job_id).await?;
        Ok(())
    }

    fn ensure_visible(&self, task: &Task, principal: &Principal) -> CoreResult<()> {
        if principal.is_admin() || task.created_by == principal.id {
            Ok(())
        } else {
            Err(CoreError::Forbidden("job belongs to another principal".into()))
        }
    }

    /// Reclassifies jobs stuck `running` past the stalled threshold as
    /// `failed("stalled")`, run once at startup 
    pub async fn reap_stalled(&self) -> CoreResult<u64> {
        let cutoff = Utc::now() - chrono::Duration::seconds(self.stalled_after_secs);
        let stalled = self.jobs.list_stalled(cutoff).await?;
        let count = stalled.len() as u64;
        for mut task in stalled {
            if task.mark_failed("stalled").is_ok() {
                let _ = self.jobs.update(&task).await;
            }
        }
        Ok(count)
    }

    /// Dispatcher loop: claims the next pending job, at most one worker runs
    /// it at a time (enforced both by `claim_next_pending`'s `FOR UPDATE
    /// SKIP LOCKED` semantics and the `running` map), runs to completion or
    /// cancellation, and persists the final status. Intended to be spawned
    /// as a background task per configured worker.
    pub async fn run_dispatcher(self: Arc<Self>, shutdown: CancellationToken) {
        let poll_interval = std::time::Duration::from_millis(self.poll_interval_ms);
        loop {
            if shutdown.is_cancelled() {
                return;
            }
            match self.jobs.claim_next_pending().await {
                Ok(Some(task)) => self.execute(task).await,
                Ok(None) => tokio::time::sleep(poll_interval).await,
                Err(err) => {
                    error!(error = %err, "job dispatcher failed to claim next job");
                    tokio::time::sleep(poll_interval).await;
                }
            }
        }
    }

    async fn execute(&self, mut task: Task) {
        let Some(handler) = self.handlers.get(&task.task_type).map(|h| h.clone()) else {
            warn!(task_type = task.task_type.as_str(), "no handler registered for task type");
            let _ = task.mark_failed("no handler registered");
            let _ = self.jobs.update(&task).await;
            return;
        };

        let token = CancellationToken::new();
        self.running.insert(task.task_id.clone(), token.clone());

        if task.mark_running().is_ok() {
            let _ = self.jobs.update(&task).await;
        }

        let result = handler.run(&mut task, token).await;
        self.running.remove(&task.task_id);

        match result {
            Ok(()) => {
                if task.status != TaskStatus::Cancelled {
                    let _ = task.mark_completed();
                }
            }
            Err(err) => {
                if task.status != TaskStatus::Cancelled {
                    let _ = task.mark_failed(err.to_string());
                }
            }
        }
        let _ = self.jobs.update(&task).await;
        self.events.publish(crate::domain::events::GatewayEvent::Job(crate::domain::events::JobEvent::Finished {
            task_id: task.task_id.clone(),
            status: format!("{:?}", task.status).to_lowercase(),
            at: Utc::now(),
        }));
        info!(task_id = %task.task_id, status = ?task.status, "job finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::InMemoryJobRepository;
    use serde_json::json;

    fn admin() -> Principal {
        Principal::admin("root")
    }

    #[tokio::test]
    async fn non_owner_cannot_see_job() {
        let engine = JobEngine::new(Arc::new(InMemoryJobRepository::new()), EventBus::with_default_capacity(), 900, 10);
        let task = engine.create_job(TaskType::Copy, json!({}), &admin(), TriggerType::Manual, None).await.unwrap();
        let other = Principal {
            principal_type: crate::domain::principal::PrincipalType::ApiKey,
            id: "someone-else".into(),
            permissions: Default::default(),
            allowed_base_path: None,
        };
        let err = engine.get_job_status(&task.task_id, &other).await.unwrap_err();
        assert_eq!(err.kind(), crate::domain::errors::ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn delete_rejects_non_terminal_job() {
        let engine = JobEngine::new(Arc::new(InMemoryJobRepository::new()), EventBus::with_default_capacity(), 900, 10);
        let task = engine.create_job(TaskType::Copy, json!({}), &admin(), TriggerType::Manual, None).await.unwrap();
        let err = engine.delete_job(&task.task_id, &admin()).await.unwrap_err();
        assert_eq!(err.kind(), crate::domain::errors::ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn cancel_then_delete_succeeds() {
        let engine = JobEngine::new(Arc::new(InMemoryJobRepository::new()), EventBus::with_default_capacity(), 900, 10);
        let task = engine.create_job(TaskType::Copy, json!({}), &admin(), TriggerType::Manual, None).await.unwrap();
        engine.cancel_job(&task.task_id, &admin()).await.unwrap();
        engine.delete_job(&task.task_id, &admin()).await.unwrap();
    }
}
