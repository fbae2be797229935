//! The resumption sweep.
//!
//! Each sweep lists waiting executions whose wake time has elapsed, rebuilds
//! the engine for the owning workflow, and resumes them. Only executions
//! still in the waiting state are returned by the store query, which keeps
//! resume effectively once-per-elapsed-wake without engine-side
//! deduplication.

use crate::error::SchedulerError;
use chrono::{DateTime, Utc};
use copper_pigeon_workflow::{EngineServices, ExecutionEngine, ExecutionStore, WorkflowStore};
use std::time::Duration;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Periodically resumes waiting executions whose wake time has elapsed.
pub struct ResumptionScheduler<W, E> {
    workflows: W,
    executions: E,
    services: EngineServices,
    poll_interval: Duration,
}

impl<W, E> ResumptionScheduler<W, E>
where
    W: WorkflowStore,
    E: ExecutionStore + Clone,
{
    /// Creates a scheduler over the given stores and engine collaborators.
    pub fn new(workflows: W, executions: E, services: EngineServices) -> Self {
        Self {
            workflows,
            executions,
            services,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets the polling interval for `run`.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Performs one sweep: resume every execution due at `now`.
    ///
    /// Returns the number of executions resumed. A failure on one execution
    /// is logged and does not stop the sweep.
    ///
    /// # Errors
    ///
    /// Returns an error if the due-execution listing itself fails.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<u32, SchedulerError> {
        let due = self.executions.list_due(now).await?;
        if due.is_empty() {
            return Ok(0);
        }

        tracing::debug!(count = due.len(), "resuming due executions");

        let mut resumed = 0;
        for mut context in due {
            let workflow = match self.workflows.get(context.workflow_id).await {
                Ok(Some(workflow)) => workflow,
                Ok(None) => {
                    tracing::warn!(
                        execution = %context.execution_id,
                        workflow = %context.workflow_id,
                        "workflow definition missing, leaving execution waiting"
                    );
                    continue;
                }
                Err(error) => {
                    tracing::warn!(
                        execution = %context.execution_id,
                        %error,
                        "workflow lookup failed, leaving execution waiting"
                    );
                    continue;
                }
            };

            let engine =
                ExecutionEngine::new(workflow, self.executions.clone(), self.services.clone());
            match engine.resume_execution(&mut context).await {
                Ok(()) => resumed += 1,
                Err(error) => {
                    tracing::warn!(
                        execution = %context.execution_id,
                        %error,
                        "resume failed"
                    );
                }
            }
        }

        Ok(resumed)
    }

    /// Runs sweeps forever at the configured interval.
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            interval.tick().await;
            if let Err(error) = self.run_once(Utc::now()).await {
                tracing::warn!(%error, "resumption sweep failed");
            }
        }
    }
}
