//! Orchestration service port
//!
//! The managed service owns task queues, history and timeouts. Workers only
//! see it through [`WorkflowService`]; [`InMemoryWorkflowService`] implements
//! the same contract in-process for tests and local runs.

mod memory;
mod protocol;

pub use memory::{ExecutionStatus, InMemoryWorkflowService};
pub use protocol::{
    ActivityTask, DecisionTask, PollRequest, RespondActivityTaskCompleted,
    RespondActivityTaskFailed, RespondDecisionTaskCompleted, ServiceError, StartWorkflowRequest,
    StartWorkflowResponse, Task, TaskKind, WorkflowExecution, WorkflowService,
};
