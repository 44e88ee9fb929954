// Workflow starter
// Decision: Workflow ids are "myWorkflowId-<unix seconds>"; two starts within one second collide
//           and the second is rejected by the service

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use swflow_durable::service::{StartWorkflowRequest, WorkflowService};
use swflow_durable::workflow::WorkflowConfig;
use swflow_durable::ServiceError;

/// Prefix of generated workflow ids
pub const WORKFLOW_ID_PREFIX: &str = "myWorkflowId-";

/// JSON document sent as the workflow input
#[derive(Debug, Serialize)]
struct WorkflowInput<'a> {
    input: &'a str,
}

/// A started execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedWorkflow {
    pub workflow_id: String,
    pub run_id: String,
}

/// Workflow id for a start at the current time
pub fn workflow_id() -> String {
    format!("{WORKFLOW_ID_PREFIX}{}", Utc::now().timestamp())
}

/// Start one execution of the configured workflow type with `{"input": <input>}`
pub async fn start_workflow(
    service: &dyn WorkflowService,
    config: &WorkflowConfig,
    input: &str,
) -> Result<StartedWorkflow, ServiceError> {
    let workflow_id = workflow_id();
    let input = serde_json::to_string(&WorkflowInput { input })?;
    let request = StartWorkflowRequest::from_config(config, workflow_id.clone(), Some(input));

    let response = service.start_workflow_execution(&request).await?;
    info!(
        workflow_id = %workflow_id,
        run_id = %response.run_id,
        workflow_type = %config.workflow_type,
        task_list = %config.decision_task_list,
        "Workflow started"
    );

    Ok(StartedWorkflow {
        workflow_id,
        run_id: response.run_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use swflow_durable::InMemoryWorkflowService;

    #[test]
    fn test_workflow_id_format() {
        let id = workflow_id();
        let seconds = id.strip_prefix(WORKFLOW_ID_PREFIX).unwrap();
        assert!(seconds.parse::<i64>().unwrap() > 1_600_000_000);
    }

    #[tokio::test]
    async fn test_start_records_json_input() {
        let service = InMemoryWorkflowService::new();
        let config = WorkflowConfig::default();

        let started = start_workflow(&service, &config, "World").await.unwrap();

        let history = service.history(&started.workflow_id).unwrap();
        let input = history[0]
            .workflow_execution_started_event_attributes
            .as_ref()
            .and_then(|attributes| attributes.input.as_deref());
        assert_eq!(input, Some(r#"{"input":"World"}"#));
        assert!(!started.run_id.is_empty());
    }
}
