//! Workflow state machine
//!
//! The workflow's progress is never stored. It is re-derived on every decision
//! task by folding [`transition`] over the full history, starting from
//! [`WorkflowState::Start`] with no pending decisions.
//!
//! Activity ids count the schedules produced by the fold itself
//! (`<prefix>-1`, `<prefix>-2`, ...), so events the table ignores never
//! shift them.
//!
//! ```text
//! state                   event                   -> state                  pending
//! ----------------------  ----------------------     ----------------------  ----------------------
//! any                     WorkflowExecutionStarted   Start                   [schedule #1(input)]
//! Start                   ActivityTaskCompleted      FirstActivityComplete   [schedule #2(result)]
//! FirstActivityComplete   ActivityTaskCompleted      SecondActivityComplete  []
//! SecondActivityComplete  ActivityTaskCompleted      NothingOpen             []
//! NothingOpen             ActivityTaskCompleted      NothingOpen             []
//! any                     anything else              (unchanged)             (unchanged)
//! ```

use serde::{Deserialize, Serialize};

use super::DecideError;
use crate::workflow::{
    ActivityTypeConfig, Decision, DecisionBatch, EventType, HistoryEvent, WorkflowConfig,
};

/// Progress marker derived from history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// Workflow started, first activity outstanding
    Start,

    /// First activity done, second activity outstanding
    FirstActivityComplete,

    SecondActivityComplete,

    /// Nothing is open
    NothingOpen,
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::FirstActivityComplete => write!(f, "first_activity_complete"),
            Self::SecondActivityComplete => write!(f, "second_activity_complete"),
            Self::NothingOpen => write!(f, "nothing_open"),
        }
    }
}

/// Result of applying one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: WorkflowState,

    /// Replaces whatever was pending before
    pub pending: DecisionBatch,
}

/// Accumulator of a full history fold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replay {
    pub state: WorkflowState,

    /// `None` until some event produced a decision list
    pub pending: Option<DecisionBatch>,

    /// Number of events that caused a transition
    pub transitions: usize,

    /// Activities scheduled by the fold so far, across restarts
    pub scheduled: usize,
}

impl Default for Replay {
    fn default() -> Self {
        Self {
            state: WorkflowState::Start,
            pending: None,
            transitions: 0,
            scheduled: 0,
        }
    }
}

impl Replay {
    /// Apply one event to the accumulator
    pub fn apply(
        mut self,
        event: &HistoryEvent,
        config: &WorkflowConfig,
    ) -> Result<Self, DecideError> {
        if let Some(next) = transition(self.state, self.scheduled, event, config)? {
            self.scheduled += next
                .pending
                .iter()
                .filter(|decision| matches!(decision, Decision::ScheduleActivityTask { .. }))
                .count();
            self.state = next.state;
            self.pending = Some(next.pending);
            self.transitions += 1;
        }
        Ok(self)
    }
}

/// Fold the whole history, in order
pub fn fold_history(
    history: &[HistoryEvent],
    config: &WorkflowConfig,
) -> Result<Replay, DecideError> {
    history
        .iter()
        .try_fold(Replay::default(), |replay, event| replay.apply(event, config))
}

/// The transition table
///
/// `scheduled` is the number of activities scheduled earlier in the fold; a
/// new schedule takes the next sequence number as its activity id.
///
/// Returns `Ok(None)` for events that do not move the state machine
/// (scheduling, failures, timeouts, cancellations and every unknown kind).
pub fn transition(
    state: WorkflowState,
    scheduled: usize,
    event: &HistoryEvent,
    config: &WorkflowConfig,
) -> Result<Option<Transition>, DecideError> {
    let next = match (event.event_type, state) {
        (EventType::WorkflowExecutionStarted, _) => {
            let attributes = event
                .workflow_execution_started_event_attributes
                .as_ref()
                .ok_or_else(|| DecideError::missing_attributes(event))?;
            Transition {
                state: WorkflowState::Start,
                pending: vec![schedule(
                    &config.first_activity,
                    scheduled + 1,
                    attributes.input.clone(),
                )],
            }
        }
        (EventType::ActivityTaskCompleted, state) => {
            let attributes = event
                .activity_task_completed_event_attributes
                .as_ref()
                .ok_or_else(|| DecideError::missing_attributes(event))?;
            match state {
                WorkflowState::Start => Transition {
                    state: WorkflowState::FirstActivityComplete,
                    pending: vec![schedule(
                        &config.second_activity,
                        scheduled + 1,
                        attributes.result.clone(),
                    )],
                },
                WorkflowState::FirstActivityComplete => Transition {
                    state: WorkflowState::SecondActivityComplete,
                    pending: vec![],
                },
                WorkflowState::SecondActivityComplete | WorkflowState::NothingOpen => {
                    Transition {
                        state: WorkflowState::NothingOpen,
                        pending: vec![],
                    }
                }
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(next))
}

fn schedule(activity: &ActivityTypeConfig, sequence: usize, input: Option<String>) -> Decision {
    let activity_id = format!("{}-{}", activity.id_prefix, sequence);
    Decision::schedule_activity(activity, activity_id, input)
}
