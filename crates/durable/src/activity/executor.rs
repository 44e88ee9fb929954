//! Activity executor
//!
//! Looks up the activity registered for a task's activity type and runs it
//! on the task input. No retries happen here: a failed activity is reported
//! and the workflow decides what comes next.

use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::{Activity, ActivityContext, ActivityError};
use crate::service::ActivityTask;
use crate::workflow::TypeRef;

/// Error type reported when no activity is registered for a task
pub const UNREGISTERED_ACTIVITY: &str = "UnregisteredActivity";

/// Error type reported when an activity panics
pub const ACTIVITY_PANIC: &str = "ActivityPanic";

/// Registry of activities keyed by activity type
#[derive(Default, Clone)]
pub struct ActivityExecutor {
    activities: HashMap<TypeRef, Arc<dyn Activity>>,
}

impl ActivityExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an activity implementation for a type
    pub fn register(&mut self, activity_type: TypeRef, activity: impl Activity) {
        self.activities.insert(activity_type, Arc::new(activity));
    }

    /// Builder form of [`ActivityExecutor::register`]
    pub fn with(mut self, activity_type: TypeRef, activity: impl Activity) -> Self {
        self.register(activity_type, activity);
        self
    }

    pub fn contains(&self, activity_type: &TypeRef) -> bool {
        self.activities.contains_key(activity_type)
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    /// Run the activity for `task` and return its output
    ///
    /// # Errors
    ///
    /// Fails when the activity type is not registered, when the activity
    /// returns an error and when it panics.
    #[instrument(skip_all, fields(activity_id = %task.activity_id, activity_type = %task.activity_type))]
    pub async fn execute(
        &self,
        task: &ActivityTask,
        cancellation: CancellationToken,
    ) -> Result<String, ActivityError> {
        let activity = self.activities.get(&task.activity_type).ok_or_else(|| {
            ActivityError::new(format!(
                "no activity registered for type {}",
                task.activity_type
            ))
            .with_type(UNREGISTERED_ACTIVITY)
        })?;

        let ctx = ActivityContext::new(task, cancellation);
        let input = task.input.as_deref().unwrap_or_default();
        debug!(attempt_id = %ctx.attempt_id, input_len = input.len(), "Executing activity");

        AssertUnwindSafe(activity.execute(&ctx, input))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                let message = if let Some(message) = payload.downcast_ref::<&str>() {
                    (*message).to_string()
                } else if let Some(message) = payload.downcast_ref::<String>() {
                    message.clone()
                } else {
                    "activity panicked".to_string()
                };
                Err(ActivityError::new(message).with_type(ACTIVITY_PANIC))
            })
    }
}

impl fmt::Debug for ActivityExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityExecutor")
            .field("activity_types", &self.activities.keys().collect::<Vec<_>>())
            .finish()
    }
}
