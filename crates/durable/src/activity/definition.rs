//! Activity trait definition

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ActivityContext;

/// Error type for activity failures
///
/// Reported to the service as the `reason`/`details` of a failed activity
/// task. Whether the activity runs again is up to the workflow, not the worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityError {
    /// Error message
    pub message: String,

    /// Error type/code for programmatic handling
    pub error_type: Option<String>,

    /// Additional error details (for debugging)
    pub details: Option<String>,
}

impl ActivityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
            details: None,
        }
    }

    /// Set the error type
    pub fn with_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    /// Add error details
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// `reason` sent to the service: `"<type>: <message>"` or the bare message
    pub fn reason(&self) -> String {
        match &self.error_type {
            Some(error_type) => format!("{}: {}", error_type, self.message),
            None => self.message.clone(),
        }
    }
}

impl std::fmt::Display for ActivityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ActivityError {}

impl From<anyhow::Error> for ActivityError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(err.to_string()).with_details(format!("{err:?}"))
    }
}

/// An activity is a unit of work executed on demand
///
/// Payloads are opaque strings, exactly as they travel on the wire; the
/// activity decides how to decode them.
///
/// # Example
///
/// ```
/// use swflow_durable::prelude::*;
///
/// struct Shout;
///
/// #[async_trait]
/// impl Activity for Shout {
///     async fn execute(&self, _ctx: &ActivityContext, input: &str) -> Result<String, ActivityError> {
///         Ok(input.to_uppercase())
///     }
/// }
/// ```
#[async_trait]
pub trait Activity: Send + Sync + 'static {
    /// Execute the activity
    ///
    /// # Errors
    ///
    /// Any error is reported as a failed activity task.
    async fn execute(&self, ctx: &ActivityContext, input: &str) -> Result<String, ActivityError>;
}

/// Plain functions and closures are activities
#[async_trait]
impl<F> Activity for F
where
    F: Fn(&str) -> Result<String, ActivityError> + Send + Sync + 'static,
{
    async fn execute(&self, _ctx: &ActivityContext, input: &str) -> Result<String, ActivityError> {
        self(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_error_reason() {
        let error = ActivityError::new("connection failed");
        assert_eq!(error.reason(), "connection failed");

        let error = error.with_type("CONNECTION_ERROR");
        assert_eq!(error.reason(), "CONNECTION_ERROR: connection failed");
        assert_eq!(error.to_string(), "connection failed");
    }

    #[test]
    fn test_from_anyhow_keeps_context() {
        let err = anyhow::anyhow!("disk full").context("writing report");
        let error = ActivityError::from(err);

        assert_eq!(error.message, "writing report");
        assert!(error.details.unwrap().contains("disk full"));
    }

    #[test]
    fn test_activity_error_serialization() {
        let error = ActivityError::new("test error")
            .with_type("TEST")
            .with_details("line 1");

        let json = serde_json::to_string(&error).unwrap();
        let parsed: ActivityError = serde_json::from_str(&json).unwrap();

        assert_eq!(error, parsed);
    }

    #[tokio::test]
    async fn test_closure_activity() {
        let activity = |input: &str| Ok::<_, ActivityError>(format!("Hello {input}"));
        let ctx = ActivityContext::for_test("a-1");

        assert_eq!(activity.execute(&ctx, "World").await.unwrap(), "Hello World");
    }
}
