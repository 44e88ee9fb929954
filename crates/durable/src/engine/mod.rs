//! Workflow decision engine
//!
//! The engine module rebuilds workflow state by replaying history through an
//! explicit transition table and turns it into decisions.

mod decider;
mod registry;
mod transition;

pub use decider::{
    decide_guarded, failure_decision, DecideError, Decider, TwoActivityDecider,
    DECIDER_FAILURE_PREFIX,
};
pub use registry::DeciderRegistry;
pub use transition::{fold_history, transition, Replay, Transition, WorkflowState};
