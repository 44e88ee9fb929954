//! Decider registry
//!
//! Maps workflow types to their deciders so one decision worker can serve
//! several workflow types on the same task list.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::decider::{failure_decision, DecideError, Decider};
use crate::workflow::{DecisionBatch, HistoryEvent, TypeRef};

/// Registry of deciders keyed by workflow type
#[derive(Default, Clone)]
pub struct DeciderRegistry {
    deciders: HashMap<TypeRef, Arc<dyn Decider>>,
}

impl DeciderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decider under its own workflow type
    ///
    /// Replaces any decider previously registered for the same type.
    pub fn register(&mut self, decider: impl Decider + 'static) {
        let decider: Arc<dyn Decider> = Arc::new(decider);
        self.deciders.insert(decider.workflow_type().clone(), decider);
    }

    /// Builder form of [`DeciderRegistry::register`]
    pub fn with(mut self, decider: impl Decider + 'static) -> Self {
        self.register(decider);
        self
    }

    pub fn contains(&self, workflow_type: &TypeRef) -> bool {
        self.deciders.contains_key(workflow_type)
    }

    pub fn get(&self, workflow_type: &TypeRef) -> Option<&Arc<dyn Decider>> {
        self.deciders.get(workflow_type)
    }

    pub fn len(&self) -> usize {
        self.deciders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deciders.is_empty()
    }

    /// Get all registered workflow types
    pub fn workflow_types(&self) -> impl Iterator<Item = &TypeRef> {
        self.deciders.keys()
    }

    /// Decide a task of the given workflow type
    ///
    /// An unregistered type fails the workflow like any other decider error.
    pub fn decide(&self, workflow_type: &TypeRef, history: &[HistoryEvent]) -> Vec<DecisionBatch> {
        match self.deciders.get(workflow_type) {
            Some(decider) => decider.decide(history),
            None => {
                let err = DecideError::UnknownWorkflowType(workflow_type.clone());
                vec![vec![failure_decision(&err, history)]]
            }
        }
    }
}

impl fmt::Debug for DeciderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeciderRegistry")
            .field("workflow_types", &self.deciders.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TwoActivityDecider;
    use crate::workflow::{Decision, WorkflowConfig};

    fn registry() -> DeciderRegistry {
        DeciderRegistry::new().with(TwoActivityDecider::new(Arc::new(WorkflowConfig::default())))
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = registry();
        let workflow_type = TypeRef::new("myWorkflowName2", "myWorkflowVersion");

        assert!(registry.contains(&workflow_type));
        assert!(!registry.contains(&TypeRef::new("myWorkflowName2", "other")));
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
        assert_eq!(registry.get(&workflow_type).unwrap().workflow_type(), &workflow_type);
    }

    #[test]
    fn test_decide_dispatches_by_type() {
        let registry = registry();
        let decisions = registry.decide(
            &TypeRef::new("myWorkflowName2", "myWorkflowVersion"),
            &[HistoryEvent::workflow_started(1, "World")],
        );

        assert_eq!(decisions.len(), 1);
        assert!(matches!(decisions[0][..], [Decision::ScheduleActivityTask { .. }]));
    }

    #[test]
    fn test_unknown_workflow_type_fails_workflow() {
        let registry = DeciderRegistry::new();
        let decisions = registry.decide(&TypeRef::new("missing", "1"), &[]);

        match &decisions[..] {
            [batch] => match &batch[..] {
                [Decision::FailWorkflowExecution { attributes }] => {
                    assert_eq!(
                        attributes.reason,
                        "Exception in decider: no decider registered for workflow type missing@1"
                    );
                }
                other => panic!("Expected FailWorkflowExecution, got {:?}", other),
            },
            other => panic!("Expected one batch, got {:?}", other),
        }
    }

    #[test]
    fn test_registry_debug() {
        let debug_str = format!("{:?}", registry());
        assert!(debug_str.contains("myWorkflowName2"));
    }
}
