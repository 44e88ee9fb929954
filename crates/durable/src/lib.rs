//! # Durable Workflow Workers
//!
//! Activity and decision workers for a managed workflow-orchestration service
//! with an append-only event history.
//!
//! ## Features
//!
//! - **History replay**: workflow state is never stored; every decision task
//!   re-derives it by folding the full history through an explicit transition table
//! - **Single-use responses**: each task token is answered exactly once, never retried
//! - **Cancellable long-poll loop**: stop signal, retry backoff with an optional
//!   ceiling and a circuit breaker against a persistently failing service
//! - **In-memory service**: the same contract in-process, for tests and local runs
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Orchestration service                      │
//! │  (task lists, history log, task leasing, timeouts)          │
//! └─────────────────────────────────────────────────────────────┘
//!            ▲  poll / respond                 ▲  poll / respond
//!            │                                 │
//! ┌──────────────────────────┐    ┌─────────────────────────────┐
//! │ WorkerLoop (activity)    │    │ WorkerLoop (decision)       │
//! │  ActivityExecutor        │    │  DeciderRegistry            │
//! │  (runs activity code)    │    │  (replays history through   │
//! │                          │    │   the transition table)     │
//! └──────────────────────────┘    └─────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use swflow_durable::prelude::*;
//!
//! let decider = TwoActivityDecider::new(Arc::new(WorkflowConfig::default()));
//! let decisions = decider.decide(&[HistoryEvent::workflow_started(1, "World")]);
//!
//! assert_eq!(decisions.len(), 1);
//! assert_eq!(decisions[0][0].decision_type(), "ScheduleActivityTask");
//! ```

pub mod activity;
pub mod engine;
pub mod reliability;
pub mod service;
pub mod worker;
pub mod workflow;

/// Prelude for common imports
pub mod prelude {
    pub use async_trait::async_trait;

    pub use crate::activity::{Activity, ActivityContext, ActivityError, ActivityExecutor};
    pub use crate::engine::{
        DecideError, Decider, DeciderRegistry, TwoActivityDecider, WorkflowState,
    };
    pub use crate::reliability::{CircuitBreakerConfig, RetryPolicy};
    pub use crate::service::{
        InMemoryWorkflowService, ServiceError, StartWorkflowRequest, WorkflowService,
    };
    pub use crate::worker::{WorkerError, WorkerLoop, WorkerLoopConfig, WorkerStats};
    pub use crate::workflow::{
        ActivityTypeConfig, Decision, DecisionBatch, HistoryEvent, TypeRef, WorkflowConfig,
    };
}

// Re-export key types at crate root
pub use activity::{Activity, ActivityContext, ActivityError, ActivityExecutor};
pub use engine::{DecideError, Decider, DeciderRegistry, TwoActivityDecider, WorkflowState};
pub use reliability::{CircuitBreaker, CircuitBreakerConfig, RetryPolicy};
pub use service::{InMemoryWorkflowService, ServiceError, WorkflowService};
pub use worker::{WorkerError, WorkerLoop, WorkerLoopConfig, WorkerStats};
pub use workflow::{Decision, DecisionBatch, HistoryEvent, TypeRef, WorkflowConfig};
