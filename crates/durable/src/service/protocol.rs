//! WorkflowService trait definition
//!
//! Request and task types serialize to the service's JSON wire shape
//! (camelCase fields), so transports can send them as-is.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::workflow::{
    truncate_utf8, Decision, HistoryEvent, TaskList, TypeRef, WorkflowConfig, MAX_DETAILS_BYTES,
    MAX_REASON_BYTES,
};

/// Error type for service calls
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The request never got a response
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with an error
    #[error("service error {status} {code}: {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    /// Task token is unknown, expired or already used
    #[error("unknown task token: {0}")]
    UnknownTaskToken(String),

    /// An open execution with the same workflow id exists
    #[error("workflow execution already started: {0}")]
    WorkflowAlreadyStarted(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Which queue a task came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Activity,
    Decision,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Activity => write!(f, "activity"),
            Self::Decision => write!(f, "decision"),
        }
    }
}

/// `{workflowId, runId}` of one execution
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    pub workflow_id: String,
    pub run_id: String,
}

/// Work handed to an activity worker
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityTask {
    /// Single-use credential for the response
    #[serde(default)]
    pub task_token: String,

    #[serde(default)]
    pub activity_id: String,

    #[serde(default)]
    pub activity_type: TypeRef,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,

    #[serde(default)]
    pub started_event_id: i64,

    #[serde(default)]
    pub workflow_execution: WorkflowExecution,
}

/// Work handed to a decider
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DecisionTask {
    /// Single-use credential for the response
    #[serde(default)]
    pub task_token: String,

    #[serde(default)]
    pub workflow_execution: WorkflowExecution,

    #[serde(default)]
    pub workflow_type: TypeRef,

    /// Complete history, oldest first
    #[serde(default)]
    pub events: Vec<HistoryEvent>,

    #[serde(default)]
    pub started_event_id: i64,

    #[serde(default)]
    pub previous_started_event_id: i64,

    /// Set while more history pages remain to be fetched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// A task delivered by a poll
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    Activity(ActivityTask),
    Decision(DecisionTask),
}

impl Task {
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::Activity(_) => TaskKind::Activity,
            Self::Decision(_) => TaskKind::Decision,
        }
    }

    pub fn task_token(&self) -> &str {
        match self {
            Self::Activity(task) => &task.task_token,
            Self::Decision(task) => &task.task_token,
        }
    }

    pub fn workflow_execution(&self) -> &WorkflowExecution {
        match self {
            Self::Activity(task) => &task.workflow_execution,
            Self::Decision(task) => &task.workflow_execution,
        }
    }
}

/// Body of `PollForActivityTask` and `PollForDecisionTask`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PollRequest {
    pub domain: String,
    pub task_list: TaskList,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
}

impl PollRequest {
    pub fn new(domain: impl Into<String>, task_list: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            task_list: TaskList::new(task_list),
            identity: None,
        }
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }
}

/// Body of `RespondActivityTaskCompleted`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RespondActivityTaskCompleted {
    pub task_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

/// Body of `RespondActivityTaskFailed`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RespondActivityTaskFailed {
    pub task_token: String,
    pub reason: String,
    pub details: String,
}

impl RespondActivityTaskFailed {
    /// Build the request, cutting `reason` and `details` to the service limits
    pub fn new(task_token: impl Into<String>, reason: &str, details: &str) -> Self {
        Self {
            task_token: task_token.into(),
            reason: truncate_utf8(reason, MAX_REASON_BYTES).to_string(),
            details: truncate_utf8(details, MAX_DETAILS_BYTES).to_string(),
        }
    }
}

/// Body of `RespondDecisionTaskCompleted`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RespondDecisionTaskCompleted {
    pub task_token: String,
    pub decisions: Vec<Decision>,
}

/// Body of `StartWorkflowExecution`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StartWorkflowRequest {
    pub domain: String,
    pub workflow_id: String,
    pub workflow_type: TypeRef,
    pub task_list: TaskList,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    pub execution_start_to_close_timeout: String,
    pub task_start_to_close_timeout: String,
    pub child_policy: String,
}

impl StartWorkflowRequest {
    /// Start request for the configured workflow type
    pub fn from_config(
        config: &WorkflowConfig,
        workflow_id: impl Into<String>,
        input: Option<String>,
    ) -> Self {
        let timeouts = &config.execution_timeouts;
        Self {
            domain: config.domain.clone(),
            workflow_id: workflow_id.into(),
            workflow_type: config.workflow_type.clone(),
            task_list: TaskList::new(config.decision_task_list.clone()),
            input,
            execution_start_to_close_timeout: timeouts.execution_start_to_close.as_secs().to_string(),
            task_start_to_close_timeout: timeouts.task_start_to_close.as_secs().to_string(),
            child_policy: config.child_policy.clone(),
        }
    }
}

/// Response of `StartWorkflowExecution`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StartWorkflowResponse {
    pub run_id: String,
}

/// Port to the orchestration service
///
/// Polls return `Ok(None)` when the long-poll ends without a task. The
/// service owns task leasing, history and timeouts; implementations only
/// move requests and responses.
#[async_trait]
pub trait WorkflowService: Send + Sync {
    /// Long-poll an activity task list
    async fn poll_for_activity_task(
        &self,
        request: &PollRequest,
    ) -> Result<Option<ActivityTask>, ServiceError>;

    async fn respond_activity_task_completed(
        &self,
        request: &RespondActivityTaskCompleted,
    ) -> Result<(), ServiceError>;

    async fn respond_activity_task_failed(
        &self,
        request: &RespondActivityTaskFailed,
    ) -> Result<(), ServiceError>;

    /// Long-poll a decision task list
    ///
    /// A returned task carries the complete history.
    async fn poll_for_decision_task(
        &self,
        request: &PollRequest,
    ) -> Result<Option<DecisionTask>, ServiceError>;

    async fn respond_decision_task_completed(
        &self,
        request: &RespondDecisionTaskCompleted,
    ) -> Result<(), ServiceError>;

    async fn start_workflow_execution(
        &self,
        request: &StartWorkflowRequest,
    ) -> Result<StartWorkflowResponse, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_request_wire_shape() {
        let request = PollRequest::new("default", "activityTaskList").with_identity("w-1");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "domain": "default",
                "taskList": {"name": "activityTaskList"},
                "identity": "w-1"
            })
        );
    }

    #[test]
    fn test_start_request_from_config() {
        let config = WorkflowConfig::new("prod");
        let request =
            StartWorkflowRequest::from_config(&config, "myWorkflowId-1", Some("World".into()));
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["domain"], "prod");
        assert_eq!(json["workflowType"]["name"], "myWorkflowName2");
        assert_eq!(json["taskList"]["name"], "deciderTaskList");
        assert_eq!(json["executionStartToCloseTimeout"], "300");
        assert_eq!(json["taskStartToCloseTimeout"], "10");
        assert_eq!(json["childPolicy"], "TERMINATE");
        assert_eq!(json["input"], "World");
    }

    #[test]
    fn test_activity_failure_is_truncated() {
        let request = RespondActivityTaskFailed::new("t", &"r".repeat(300), &"d".repeat(40_000));
        assert_eq!(request.reason.len(), MAX_REASON_BYTES);
        assert_eq!(request.details.len(), MAX_DETAILS_BYTES);
    }

    #[test]
    fn test_deserialize_empty_poll_response() {
        let task: DecisionTask = serde_json::from_str(r#"{"startedEventId": 0}"#).unwrap();
        assert!(task.task_token.is_empty());
        assert!(task.events.is_empty());
    }

    #[test]
    fn test_deserialize_activity_task() {
        let json = r#"{
            "taskToken": "AAAA",
            "activityId": "myActivity-1",
            "activityType": {"name": "myActivityName", "version": "myActivityVersion"},
            "input": "World",
            "startedEventId": 6,
            "workflowExecution": {"workflowId": "myWorkflowId-1", "runId": "r1"}
        }"#;

        let task = Task::Activity(serde_json::from_str(json).unwrap());
        assert_eq!(task.kind(), TaskKind::Activity);
        assert_eq!(task.task_token(), "AAAA");
        assert_eq!(task.workflow_execution().run_id, "r1");
    }
}
