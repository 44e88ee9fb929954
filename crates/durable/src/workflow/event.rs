//! Workflow history events
//!
//! Mirrors the history event shape returned by `PollForDecisionTask`: every
//! event carries an id, a timestamp, its type and exactly one type-specific
//! attributes object. History is append-only and totally ordered by `event_id`.

use serde::{Deserialize, Serialize};

/// Kinds of history events
///
/// Only the kinds the replay engine interprets plus the ones the in-memory
/// service writes are named. Anything else the service sends deserializes to
/// [`EventType::Unknown`] and is skipped during replay.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventType {
    WorkflowExecutionStarted,
    WorkflowExecutionCompleted,
    WorkflowExecutionFailed,
    DecisionTaskScheduled,
    DecisionTaskStarted,
    DecisionTaskCompleted,
    ActivityTaskScheduled,
    ActivityTaskStarted,
    ActivityTaskCompleted,
    ActivityTaskFailed,
    ActivityTaskTimedOut,
    ActivityTaskCanceled,

    /// Event kind this worker does not know about
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Attributes of `WorkflowExecutionStarted`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecutionStartedAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
}

/// Attributes of `ActivityTaskScheduled`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityTaskScheduledAttributes {
    pub activity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
}

/// Attributes of `ActivityTaskCompleted`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityTaskCompletedAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default)]
    pub scheduled_event_id: i64,
    #[serde(default)]
    pub started_event_id: i64,
}

/// Attributes of `ActivityTaskFailed`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityTaskFailedAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default)]
    pub scheduled_event_id: i64,
}

/// Attributes of `WorkflowExecutionFailed`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecutionFailedAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// A single entry of a workflow execution's history
///
/// Events are immutable once written. The workflow state is reconstructed by
/// replaying all events in order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEvent {
    /// Position in the history (1-based, strictly increasing)
    pub event_id: i64,

    /// Seconds since the epoch, as reported by the service
    #[serde(default)]
    pub event_timestamp: f64,

    pub event_type: EventType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_execution_started_event_attributes: Option<WorkflowExecutionStartedAttributes>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_execution_failed_event_attributes: Option<WorkflowExecutionFailedAttributes>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_task_scheduled_event_attributes: Option<ActivityTaskScheduledAttributes>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_task_completed_event_attributes: Option<ActivityTaskCompletedAttributes>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_task_failed_event_attributes: Option<ActivityTaskFailedAttributes>,
}

impl HistoryEvent {
    /// Create an event without attributes
    pub fn new(event_id: i64, event_type: EventType) -> Self {
        Self {
            event_id,
            event_timestamp: 0.0,
            event_type,
            workflow_execution_started_event_attributes: None,
            workflow_execution_failed_event_attributes: None,
            activity_task_scheduled_event_attributes: None,
            activity_task_completed_event_attributes: None,
            activity_task_failed_event_attributes: None,
        }
    }

    /// `WorkflowExecutionStarted` with the given input
    pub fn workflow_started(event_id: i64, input: impl Into<String>) -> Self {
        let mut event = Self::new(event_id, EventType::WorkflowExecutionStarted);
        event.workflow_execution_started_event_attributes =
            Some(WorkflowExecutionStartedAttributes {
                input: Some(input.into()),
            });
        event
    }

    /// `ActivityTaskScheduled` for the given activity id
    pub fn activity_scheduled(event_id: i64, activity_id: impl Into<String>) -> Self {
        let mut event = Self::new(event_id, EventType::ActivityTaskScheduled);
        event.activity_task_scheduled_event_attributes = Some(ActivityTaskScheduledAttributes {
            activity_id: activity_id.into(),
            input: None,
        });
        event
    }

    /// `ActivityTaskCompleted` with the given result
    pub fn activity_completed(event_id: i64, result: impl Into<String>) -> Self {
        let mut event = Self::new(event_id, EventType::ActivityTaskCompleted);
        event.activity_task_completed_event_attributes = Some(ActivityTaskCompletedAttributes {
            result: Some(result.into()),
            ..Default::default()
        });
        event
    }

    /// `ActivityTaskFailed` with the given reason
    pub fn activity_failed(event_id: i64, reason: impl Into<String>) -> Self {
        let mut event = Self::new(event_id, EventType::ActivityTaskFailed);
        event.activity_task_failed_event_attributes = Some(ActivityTaskFailedAttributes {
            reason: Some(reason.into()),
            ..Default::default()
        });
        event
    }

    /// Set the event timestamp
    pub fn at(mut self, event_timestamp: f64) -> Self {
        self.event_timestamp = event_timestamp;
        self
    }

    /// Check if this is a terminal workflow event
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.event_type,
            EventType::WorkflowExecutionCompleted | EventType::WorkflowExecutionFailed
        )
    }
}
