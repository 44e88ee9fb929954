//! Task response submission
//!
//! Each task token is used for exactly one response. A rejected submission
//! is logged with the full request and not retried; the service times the
//! task out and redrives it.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error};

use crate::activity::ActivityError;
use crate::service::{
    RespondActivityTaskCompleted, RespondActivityTaskFailed, RespondDecisionTaskCompleted,
    ServiceError, WorkflowService,
};
use crate::workflow::DecisionBatch;

/// Errors from submitting a task response
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("{operation} failed: {source}")]
    Submit {
        operation: &'static str,
        #[source]
        source: ServiceError,
    },
}

/// Submits task results back to the service
#[derive(Clone)]
pub struct ResponseReporter {
    service: Arc<dyn WorkflowService>,
}

impl ResponseReporter {
    pub fn new(service: Arc<dyn WorkflowService>) -> Self {
        Self { service }
    }

    /// Complete an activity task with its output
    pub async fn report_activity_result(
        &self,
        task_token: &str,
        output: String,
    ) -> Result<(), ReportError> {
        let request = RespondActivityTaskCompleted {
            task_token: task_token.to_string(),
            result: Some(output),
        };
        self.service
            .respond_activity_task_completed(&request)
            .await
            .map_err(|err| submit_failed("RespondActivityTaskCompleted", &request, err))?;
        debug!("Activity result submitted");
        Ok(())
    }

    /// Fail an activity task; reason and details are cut to the service limits
    pub async fn report_activity_failure(
        &self,
        task_token: &str,
        activity_error: &ActivityError,
    ) -> Result<(), ReportError> {
        let request = RespondActivityTaskFailed::new(
            task_token,
            &activity_error.reason(),
            activity_error.details.as_deref().unwrap_or_default(),
        );
        self.service
            .respond_activity_task_failed(&request)
            .await
            .map_err(|err| submit_failed("RespondActivityTaskFailed", &request, err))?;
        debug!("Activity failure submitted");
        Ok(())
    }

    /// Complete a decision task with its decisions, in order
    pub async fn report_decisions(
        &self,
        task_token: &str,
        decisions: DecisionBatch,
    ) -> Result<(), ReportError> {
        let request = RespondDecisionTaskCompleted {
            task_token: task_token.to_string(),
            decisions,
        };
        self.service
            .respond_decision_task_completed(&request)
            .await
            .map_err(|err| submit_failed("RespondDecisionTaskCompleted", &request, err))?;
        debug!(decisions = request.decisions.len(), "Decisions submitted");
        Ok(())
    }
}

fn submit_failed<R: Serialize>(operation: &'static str, request: &R, source: ServiceError) -> ReportError {
    let payload = serde_json::to_string(request)
        .unwrap_or_else(|err| format!("<unserializable request: {err}>"));
    error!(operation, request = %payload, error = %source, "Failed to submit task response");
    ReportError::Submit { operation, source }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::service::{
        InMemoryWorkflowService, PollRequest, StartWorkflowRequest, WorkflowService,
    };
    use crate::workflow::{Decision, EventType, WorkflowConfig};

    async fn started_service() -> (Arc<InMemoryWorkflowService>, String) {
        let service = Arc::new(
            InMemoryWorkflowService::new().with_long_poll_timeout(Duration::from_millis(10)),
        );
        let request =
            StartWorkflowRequest::from_config(&WorkflowConfig::default(), "wf-1", Some("World".into()));
        service.start_workflow_execution(&request).await.unwrap();
        let task = service
            .poll_for_decision_task(&PollRequest::new("default", "deciderTaskList"))
            .await
            .unwrap()
            .unwrap();
        (service, task.task_token)
    }

    #[test_log::test(tokio::test)]
    async fn test_report_decisions() {
        let (service, token) = started_service().await;
        let reporter = ResponseReporter::new(service.clone());

        reporter
            .report_decisions(&token, vec![Decision::complete()])
            .await
            .expect("should submit decisions");

        let history = service.history("wf-1").unwrap();
        assert_eq!(history.last().unwrap().event_type, EventType::WorkflowExecutionCompleted);
    }

    #[test_log::test(tokio::test)]
    async fn test_stale_token_is_not_masked() {
        let (service, token) = started_service().await;
        let reporter = ResponseReporter::new(service);

        reporter.report_decisions(&token, vec![]).await.unwrap();
        let err = reporter.report_decisions(&token, vec![]).await.unwrap_err();

        let ReportError::Submit { operation, source } = err;
        assert_eq!(operation, "RespondDecisionTaskCompleted");
        assert!(matches!(source, ServiceError::UnknownTaskToken(_)));
    }

    #[test_log::test(tokio::test)]
    async fn test_report_activity_failure_with_unknown_token() {
        let (service, _) = started_service().await;
        let reporter = ResponseReporter::new(service);

        let err = reporter
            .report_activity_failure("nope", &ActivityError::new("boom"))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("RespondActivityTaskFailed failed"));
    }
}
