// Activity implementations
//
// Both activities of the sample workflow prepend a configured title to their
// input, so the second one's result shows the first one's output flowing
// through the workflow.

use async_trait::async_trait;
use tracing::info;

use swflow_durable::activity::{Activity, ActivityContext, ActivityError, ActivityExecutor};

use crate::config::WorkerConfig;

/// Prepends `title` to the activity input
#[derive(Debug, Clone)]
pub struct TitleActivity {
    title: String,
}

impl TitleActivity {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

#[async_trait]
impl Activity for TitleActivity {
    async fn execute(&self, ctx: &ActivityContext, input: &str) -> Result<String, ActivityError> {
        info!(
            activity_id = %ctx.activity_id,
            workflow_id = %ctx.workflow_execution.workflow_id,
            input_len = input.len(),
            "Executing title activity"
        );
        Ok(format!("{}{}", self.title, input))
    }
}

/// Executor with both workflow activities registered
pub fn create_executor(config: &WorkerConfig) -> ActivityExecutor {
    ActivityExecutor::new()
        .with(
            config.workflow.first_activity.activity_type.clone(),
            TitleActivity::new(config.first_activity_title.clone()),
        )
        .with(
            config.workflow.second_activity.activity_type.clone(),
            TitleActivity::new(config.second_activity_title.clone()),
        )
}
