//! Workflow model types
//!
//! This module contains the data exchanged with the orchestration service:
//! - [`HistoryEvent`] entries of a workflow's append-only history
//! - [`Decision`] actions submitted in response to a decision task
//! - [`WorkflowConfig`] static configuration of a workflow type

mod config;
mod decision;
mod event;

pub use config::{
    ActivityTimeouts, ActivityTypeConfig, ExecutionTimeouts, TypeRef, WorkflowConfig,
};
pub use decision::{
    truncate_utf8, CompleteWorkflowExecutionAttributes, Decision, DecisionBatch,
    FailWorkflowExecutionAttributes, ScheduleActivityTaskAttributes, TaskList,
    MAX_DETAILS_BYTES, MAX_REASON_BYTES,
};
pub use event::{
    ActivityTaskCompletedAttributes, ActivityTaskFailedAttributes,
    ActivityTaskScheduledAttributes, EventType, HistoryEvent,
    WorkflowExecutionFailedAttributes, WorkflowExecutionStartedAttributes,
};
