//! Worker loop for activity and decision tasks
//!
//! This module provides:
//! - [`TaskPoller`] - One long-poll against a task list
//! - [`ResponseReporter`] - Single-use response submission
//! - [`WorkerLoop`] - The cancellable poll/process/report cycle
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        WorkerLoop                          │
//! │                                                            │
//! │  ┌────────────┐  task  ┌────────────────────┐  result      │
//! │  │ TaskPoller │ ─────► │ ActivityExecutor   │ ─────┐       │
//! │  │ (long-poll)│        │ or DeciderRegistry │      │       │
//! │  └─────┬──────┘        └────────────────────┘      ▼       │
//! │        │ error                        ┌──────────────────┐ │
//! │        ▼                              │ ResponseReporter │ │
//! │  RetryPolicy / CircuitBreaker         │ (one per token)  │ │
//! │                                       └──────────────────┘ │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Many processes may run loops on the same task list; the service hands each
//! task to exactly one poller.

mod poller;
mod reporter;
mod worker_loop;

pub use poller::{PollerError, TaskPoller};
pub use reporter::{ReportError, ResponseReporter};
pub use worker_loop::{WorkerError, WorkerLoop, WorkerLoopConfig, WorkerStats};
