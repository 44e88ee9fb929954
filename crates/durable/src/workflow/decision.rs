//! Decisions a decider submits back to the service
//!
//! The serialized form is the `RespondDecisionTaskCompleted` wire shape and
//! must stay byte-compatible: a `decisionType` tag plus one
//! `<type>DecisionAttributes` object, timeouts as string-encoded seconds.

use serde::{Deserialize, Serialize};

use super::{ActivityTypeConfig, TypeRef};

/// Maximum length of a failure `reason`, in bytes
pub const MAX_REASON_BYTES: usize = 256;

/// Maximum length of a failure `details` payload, in bytes
pub const MAX_DETAILS_BYTES: usize = 32768;

/// The decisions produced for a single decision task
pub type DecisionBatch = Vec<Decision>;

/// `{name}` wrapper used for task lists on the wire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskList {
    pub name: String,
}

impl TaskList {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Attributes of a `ScheduleActivityTask` decision
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleActivityTaskAttributes {
    pub activity_type: TypeRef,
    pub activity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<String>,
    pub schedule_to_close_timeout: String,
    pub schedule_to_start_timeout: String,
    pub start_to_close_timeout: String,
    pub heartbeat_timeout: String,
    pub task_list: TaskList,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
}

/// Attributes of a `CompleteWorkflowExecution` decision
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompleteWorkflowExecutionAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

/// Attributes of a `FailWorkflowExecution` decision
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailWorkflowExecutionAttributes {
    pub reason: String,
    pub details: String,
}

/// One action for the service to record, in list order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "decisionType")]
pub enum Decision {
    ScheduleActivityTask {
        #[serde(rename = "scheduleActivityTaskDecisionAttributes")]
        attributes: ScheduleActivityTaskAttributes,
    },

    CompleteWorkflowExecution {
        #[serde(
            rename = "completeWorkflowExecutionDecisionAttributes",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        attributes: Option<CompleteWorkflowExecutionAttributes>,
    },

    FailWorkflowExecution {
        #[serde(rename = "failWorkflowExecutionDecisionAttributes")]
        attributes: FailWorkflowExecutionAttributes,
    },
}

impl Decision {
    /// Schedule `activity` with the given id and input
    pub fn schedule_activity(
        activity: &ActivityTypeConfig,
        activity_id: impl Into<String>,
        input: Option<String>,
    ) -> Self {
        let timeouts = &activity.timeouts;
        Self::ScheduleActivityTask {
            attributes: ScheduleActivityTaskAttributes {
                activity_type: activity.activity_type.clone(),
                activity_id: activity_id.into(),
                control: activity.control.clone(),
                schedule_to_close_timeout: timeouts.schedule_to_close.as_secs().to_string(),
                schedule_to_start_timeout: timeouts.schedule_to_start.as_secs().to_string(),
                start_to_close_timeout: timeouts.start_to_close.as_secs().to_string(),
                heartbeat_timeout: timeouts.heartbeat.as_secs().to_string(),
                task_list: TaskList::new(activity.task_list.clone()),
                input,
            },
        }
    }

    /// Complete the workflow without a result
    pub fn complete() -> Self {
        Self::CompleteWorkflowExecution { attributes: None }
    }

    /// Fail the workflow; `reason` and `details` are cut to the service limits
    pub fn fail(reason: &str, details: &str) -> Self {
        Self::FailWorkflowExecution {
            attributes: FailWorkflowExecutionAttributes {
                reason: truncate_utf8(reason, MAX_REASON_BYTES).to_string(),
                details: truncate_utf8(details, MAX_DETAILS_BYTES).to_string(),
            },
        }
    }

    /// Wire name of the decision type
    pub fn decision_type(&self) -> &'static str {
        match self {
            Self::ScheduleActivityTask { .. } => "ScheduleActivityTask",
            Self::CompleteWorkflowExecution { .. } => "CompleteWorkflowExecution",
            Self::FailWorkflowExecution { .. } => "FailWorkflowExecution",
        }
    }

    /// Check if this decision closes the workflow execution
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::CompleteWorkflowExecution { .. } | Self::FailWorkflowExecution { .. }
        )
    }
}

/// Longest prefix of `s` that fits in `max_bytes` without splitting a character
pub fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
