//! Activity execution context

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::service::{ActivityTask, WorkflowExecution};
use crate::workflow::TypeRef;

/// Context provided to activities during execution
///
/// The context provides:
/// - Which activity task is running and for which workflow execution
/// - Cancellation detection when the worker is shutting down
///
/// # Example
///
/// ```ignore
/// async fn execute(&self, ctx: &ActivityContext, input: &str) -> Result<String, ActivityError> {
///     tokio::select! {
///         output = do_work(input) => output,
///         _ = ctx.cancelled() => Err(ActivityError::new("worker shutting down")),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ActivityContext {
    /// Unique id of this execution attempt, for log correlation
    pub attempt_id: Uuid,

    /// Activity ID within the workflow
    pub activity_id: String,

    pub activity_type: TypeRef,

    /// Workflow execution that scheduled the activity
    pub workflow_execution: WorkflowExecution,

    cancellation: CancellationToken,
}

impl ActivityContext {
    /// Context for an activity task, cancelled together with `cancellation`
    pub fn new(task: &ActivityTask, cancellation: CancellationToken) -> Self {
        Self {
            attempt_id: Uuid::now_v7(),
            activity_id: task.activity_id.clone(),
            activity_type: task.activity_type.clone(),
            workflow_execution: task.workflow_execution.clone(),
            cancellation,
        }
    }

    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves when cancellation is requested
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await
    }

    #[cfg(test)]
    pub(crate) fn for_test(activity_id: &str) -> Self {
        let task = ActivityTask {
            activity_id: activity_id.to_string(),
            ..Default::default()
        };
        Self::new(&task, CancellationToken::new())
    }
}
