//! Static workflow configuration
//!
//! Loaded once at process start and shared read-only (behind an `Arc`) by the
//! decider and the workers for the rest of the process lifetime.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// `{name, version}` pair identifying an activity or workflow type
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TypeRef {
    pub name: String,
    pub version: String,
}

impl TypeRef {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Timeouts attached to every scheduled activity
///
/// On the wire these are string-encoded whole seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityTimeouts {
    #[serde(with = "duration_secs")]
    pub schedule_to_close: Duration,

    #[serde(with = "duration_secs")]
    pub schedule_to_start: Duration,

    #[serde(with = "duration_secs")]
    pub start_to_close: Duration,

    #[serde(with = "duration_secs")]
    pub heartbeat: Duration,
}

impl Default for ActivityTimeouts {
    fn default() -> Self {
        Self {
            schedule_to_close: Duration::from_secs(360),
            schedule_to_start: Duration::from_secs(300),
            start_to_close: Duration::from_secs(60),
            heartbeat: Duration::from_secs(60),
        }
    }
}

impl ActivityTimeouts {
    /// Set the schedule-to-close timeout
    pub fn with_schedule_to_close(mut self, timeout: Duration) -> Self {
        self.schedule_to_close = timeout;
        self
    }

    /// Set the schedule-to-start timeout
    pub fn with_schedule_to_start(mut self, timeout: Duration) -> Self {
        self.schedule_to_start = timeout;
        self
    }

    /// Set the start-to-close timeout
    pub fn with_start_to_close(mut self, timeout: Duration) -> Self {
        self.start_to_close = timeout;
        self
    }

    /// Set the heartbeat timeout
    pub fn with_heartbeat(mut self, timeout: Duration) -> Self {
        self.heartbeat = timeout;
        self
    }
}

/// Everything needed to schedule one activity type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityTypeConfig {
    pub activity_type: TypeRef,

    /// Task list the activity is scheduled on
    pub task_list: String,

    pub timeouts: ActivityTimeouts,

    /// Prefix of generated activity ids
    pub id_prefix: String,

    /// Opaque `control` value echoed back by the service
    pub control: Option<String>,
}

impl ActivityTypeConfig {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            activity_type: TypeRef::new(name, version),
            task_list: "activityTaskList".to_string(),
            timeouts: ActivityTimeouts::default(),
            id_prefix: "myActivity".to_string(),
            control: Some("this is a sample message".to_string()),
        }
    }

    pub fn with_task_list(mut self, task_list: impl Into<String>) -> Self {
        self.task_list = task_list.into();
        self
    }

    pub fn with_timeouts(mut self, timeouts: ActivityTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    pub fn with_control(mut self, control: Option<String>) -> Self {
        self.control = control;
        self
    }
}

/// Timeouts supplied when starting a workflow execution
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionTimeouts {
    #[serde(with = "duration_secs")]
    pub task_start_to_close: Duration,

    #[serde(with = "duration_secs")]
    pub execution_start_to_close: Duration,
}

impl Default for ExecutionTimeouts {
    fn default() -> Self {
        Self {
            task_start_to_close: Duration::from_secs(10),
            execution_start_to_close: Duration::from_secs(300),
        }
    }
}

/// Configuration of one two-activity workflow type
///
/// # Example
///
/// ```
/// use swflow_durable::workflow::{ActivityTypeConfig, WorkflowConfig};
///
/// let config = WorkflowConfig::new("my-domain")
///     .with_decision_task_list("deciders")
///     .with_first_activity(ActivityTypeConfig::new("greet", "1").with_task_list("greeters"));
///
/// assert_eq!(config.first_activity.task_list, "greeters");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowConfig {
    pub domain: String,
    pub workflow_type: TypeRef,
    pub decision_task_list: String,
    pub execution_timeouts: ExecutionTimeouts,
    pub child_policy: String,

    /// Scheduled when the workflow starts
    pub first_activity: ActivityTypeConfig,

    /// Scheduled when the first activity completes
    pub second_activity: ActivityTypeConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            domain: "default".to_string(),
            workflow_type: TypeRef::new("myWorkflowName2", "myWorkflowVersion"),
            decision_task_list: "deciderTaskList".to_string(),
            execution_timeouts: ExecutionTimeouts::default(),
            child_policy: "TERMINATE".to_string(),
            first_activity: ActivityTypeConfig::new("myActivityName", "myActivityVersion"),
            second_activity: ActivityTypeConfig::new("myActivityName2", "myActivityVersion2"),
        }
    }
}

impl WorkflowConfig {
    /// Reference configuration in the given domain
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Default::default()
        }
    }

    pub fn with_workflow_type(mut self, workflow_type: TypeRef) -> Self {
        self.workflow_type = workflow_type;
        self
    }

    pub fn with_decision_task_list(mut self, task_list: impl Into<String>) -> Self {
        self.decision_task_list = task_list.into();
        self
    }

    pub fn with_execution_timeouts(mut self, timeouts: ExecutionTimeouts) -> Self {
        self.execution_timeouts = timeouts;
        self
    }

    pub fn with_first_activity(mut self, activity: ActivityTypeConfig) -> Self {
        self.first_activity = activity;
        self
    }

    pub fn with_second_activity(mut self, activity: ActivityTypeConfig) -> Self {
        self.second_activity = activity;
        self
    }

    /// Activity task lists served by this workflow, deduplicated
    pub fn activity_task_lists(&self) -> Vec<&str> {
        let mut lists = vec![self.first_activity.task_list.as_str()];
        if self.second_activity.task_list != self.first_activity.task_list {
            lists.push(self.second_activity.task_list.as_str());
        }
        lists
    }
}

/// Serde support for Duration as whole seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_defaults() {
        let config = WorkflowConfig::default();
        assert_eq!(config.decision_task_list, "deciderTaskList");
        assert_eq!(config.first_activity.activity_type.name, "myActivityName");
        assert_eq!(config.second_activity.activity_type.version, "myActivityVersion2");
        assert_eq!(
            config.first_activity.timeouts.schedule_to_close,
            Duration::from_secs(360)
        );
        assert_eq!(config.first_activity.timeouts.heartbeat, Duration::from_secs(60));
    }

    #[test]
    fn test_activity_task_lists_dedup() {
        let config = WorkflowConfig::default();
        assert_eq!(config.activity_task_lists(), vec!["activityTaskList"]);

        let config = config
            .with_second_activity(ActivityTypeConfig::new("b", "1").with_task_list("other"));
        assert_eq!(config.activity_task_lists(), vec!["activityTaskList", "other"]);
    }

    #[test]
    fn test_type_ref_display() {
        assert_eq!(TypeRef::new("greet", "2").to_string(), "greet@2");
    }

    #[test]
    fn test_serialization() {
        let config = WorkflowConfig::new("prod");
        let json = serde_json::to_string(&config).unwrap();
        let parsed: WorkflowConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }
}
