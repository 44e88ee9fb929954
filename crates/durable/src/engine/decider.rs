//! History replay decider
//!
//! A decider turns the complete, ordered history of a workflow execution into
//! the decisions for the current decision task. It keeps nothing between
//! calls: every decision task replays the history from the first event.

use std::backtrace::Backtrace;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::transition::{fold_history, Replay};
use crate::workflow::{
    Decision, DecisionBatch, EventType, HistoryEvent, TypeRef, WorkflowConfig,
};

/// Prefix of the reason of every decider failure
pub const DECIDER_FAILURE_PREFIX: &str = "Exception in decider: ";

/// Errors raised while replaying a history
///
/// These never leave [`Decider::decide`]; they become a
/// `FailWorkflowExecution` decision instead.
#[derive(Debug, thiserror::Error)]
pub enum DecideError {
    /// An event the state machine interprets arrived without its attributes
    #[error("event {event_id} ({event_type}) is missing its attributes")]
    MissingAttributes { event_id: i64, event_type: EventType },

    /// No decider is registered for the task's workflow type
    #[error("no decider registered for workflow type {0}")]
    UnknownWorkflowType(TypeRef),

    /// Replay panicked
    #[error("{0}")]
    Panicked(String),
}

impl DecideError {
    pub(crate) fn missing_attributes(event: &HistoryEvent) -> Self {
        Self::MissingAttributes {
            event_id: event.event_id,
            event_type: event.event_type,
        }
    }
}

/// Replays a workflow history into decisions
///
/// Implementations provide [`Decider::replay`]; the provided
/// [`Decider::decide`] wraps it with the failure conversion.
pub trait Decider: Send + Sync {
    /// Workflow type this decider serves
    fn workflow_type(&self) -> &TypeRef;

    /// Fold the history into the final state and pending decisions
    fn replay(&self, history: &[HistoryEvent]) -> Result<Replay, DecideError>;

    /// Decision batches for a decision task
    ///
    /// Always returns exactly one batch. Errors and panics during replay
    /// yield a single `FailWorkflowExecution`.
    fn decide(&self, history: &[HistoryEvent]) -> Vec<DecisionBatch> {
        decide_guarded(history, || self.replay(history))
    }
}

/// Run a replay, converting its errors and panics into a failure decision
pub fn decide_guarded<F>(history: &[HistoryEvent], replay: F) -> Vec<DecisionBatch>
where
    F: FnOnce() -> Result<Replay, DecideError>,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(replay))
        .unwrap_or_else(|payload| Err(DecideError::Panicked(panic_message(payload.as_ref()))));

    match outcome {
        Ok(replay) => vec![replay.pending.unwrap_or_else(|| vec![Decision::complete()])],
        Err(err) => vec![vec![failure_decision(&err, history)]],
    }
}

/// `FailWorkflowExecution` describing `err`
///
/// `details` carries the error, the history position and a backtrace of the
/// failing call, cut to the service's size limit.
pub fn failure_decision(err: &DecideError, history: &[HistoryEvent]) -> Decision {
    let reason = format!("{DECIDER_FAILURE_PREFIX}{err}");
    let last_event = history
        .last()
        .map(|event| format!("{} ({})", event.event_id, event.event_type))
        .unwrap_or_else(|| "none".to_string());
    let details = format!(
        "{err:?}\nhistory length: {}\nlast event: {last_event}\nbacktrace:\n{}",
        history.len(),
        Backtrace::force_capture()
    );
    Decision::fail(&reason, &details)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "decider panicked".to_string()
    }
}

/// Decider for the two-activity workflow
///
/// Schedules the first activity with the workflow input, then the second
/// activity with the first one's result.
#[derive(Debug, Clone)]
pub struct TwoActivityDecider {
    config: Arc<WorkflowConfig>,
}

impl TwoActivityDecider {
    pub fn new(config: Arc<WorkflowConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }
}

impl Decider for TwoActivityDecider {
    fn workflow_type(&self) -> &TypeRef {
        &self.config.workflow_type
    }

    fn replay(&self, history: &[HistoryEvent]) -> Result<Replay, DecideError> {
        fold_history(history, &self.config)
    }
}
