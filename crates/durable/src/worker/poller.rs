//! Task polling
//!
//! One long-poll per call. An empty long-poll is a normal outcome; errors are
//! returned to the worker loop, which owns the retry schedule.

use std::sync::Arc;

use tracing::{debug, instrument, trace};

use crate::service::{PollRequest, ServiceError, Task, TaskKind, WorkflowService};

/// Long-polls one task list
pub struct TaskPoller {
    service: Arc<dyn WorkflowService>,
    kind: TaskKind,
    request: PollRequest,
}

impl TaskPoller {
    pub fn new(service: Arc<dyn WorkflowService>, kind: TaskKind, request: PollRequest) -> Self {
        Self {
            service,
            kind,
            request,
        }
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn task_list(&self) -> &str {
        &self.request.task_list.name
    }

    /// Poll once
    ///
    /// Returns `Ok(None)` when the long-poll ended without a task.
    #[instrument(skip(self), fields(kind = %self.kind, task_list = %self.request.task_list.name))]
    pub async fn poll(&self) -> Result<Option<Task>, PollerError> {
        let task = match self.kind {
            TaskKind::Activity => self
                .service
                .poll_for_activity_task(&self.request)
                .await?
                .map(Task::Activity),
            TaskKind::Decision => self
                .service
                .poll_for_decision_task(&self.request)
                .await?
                .map(Task::Decision),
        };

        match &task {
            Some(task) => debug!(
                workflow_id = %task.workflow_execution().workflow_id,
                run_id = %task.workflow_execution().run_id,
                "Received task"
            ),
            None => trace!("Long-poll returned no task"),
        }

        Ok(task)
    }
}

/// Poller errors
#[derive(Debug, thiserror::Error)]
pub enum PollerError {
    /// The poll request failed
    #[error("poll failed: {0}")]
    Service(#[from] ServiceError),
}
