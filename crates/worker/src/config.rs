// Worker process configuration
// Decision: Everything comes from environment variables (optionally via .env); no config files
// Decision: Unparseable values fall back to the default instead of aborting startup

use std::time::Duration;

use swflow_durable::reliability::{CircuitBreakerConfig, RetryPolicy};
use swflow_durable::workflow::{ActivityTimeouts, ActivityTypeConfig, TypeRef, WorkflowConfig};
use swflow_durable::WorkerLoopConfig;
use uuid::Uuid;

use crate::signing::{region_from_host, AwsCredentials, SigV4Signer, DEFAULT_REGION};

/// Default service endpoint
pub const DEFAULT_ENDPOINT: &str = "https://swf.us-east-1.amazonaws.com";

/// Configuration for the worker binary
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Base URL of the orchestration service
    pub endpoint: String,
    /// Signing credentials; requests go unsigned without them
    pub credentials: Option<AwsCredentials>,
    /// Signing region; derived from the endpoint when unset
    pub region: Option<String>,
    /// Bearer token sent with every unsigned request, if set
    pub auth_token: Option<String>,
    /// Client-side timeout of a long-poll request
    pub long_poll_timeout: Duration,
    /// Workflow type, task lists and activity types
    pub workflow: WorkflowConfig,
    /// Identity, poll retry and circuit breaker settings
    pub worker_loop: WorkerLoopConfig,
    /// Prefix the first activity prepends to its input
    pub first_activity_title: String,
    /// Prefix the second activity prepends to its input
    pub second_activity_title: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            credentials: None,
            region: None,
            auth_token: None,
            long_poll_timeout: Duration::from_secs(70),
            workflow: WorkflowConfig::default(),
            worker_loop: WorkerLoopConfig::default()
                .with_identity(format!("swflow-worker-{}", Uuid::now_v7())),
            first_activity_title: "Hello ".to_string(),
            second_activity_title: "Greetings: ".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `SWF_ENDPOINT`, `SWF_DOMAIN`, `SWF_IDENTITY`, `SWF_AUTH_TOKEN`
    /// - `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_SESSION_TOKEN`,
    ///   `AWS_REGION` (or `AWS_DEFAULT_REGION`)
    /// - `DECISION_TASK_LIST`, `ACTIVITY_TASK_LIST`
    /// - `WORKFLOW_NAME`, `WORKFLOW_VERSION`
    /// - `ACTIVITY1_NAME`, `ACTIVITY1_VERSION`, `ACTIVITY1_TITLE` (and `ACTIVITY2_*`)
    /// - `ACTIVITY_SCHEDULE_TO_CLOSE_SECS`, `ACTIVITY_SCHEDULE_TO_START_SECS`,
    ///   `ACTIVITY_START_TO_CLOSE_SECS`, `ACTIVITY_HEARTBEAT_SECS`
    /// - `POLL_RETRY_INITIAL_MS`, `POLL_RETRY_MAX_MS`, `POLL_RETRY_BACKOFF`,
    ///   `POLL_RETRY_MAX_ATTEMPTS` (unset means unbounded). A backoff above 1
    ///   raises the default `POLL_RETRY_MAX_MS` from 2s to 60s
    /// - `POLL_CIRCUIT_FAILURE_THRESHOLD` (unset disables the breaker), `POLL_CIRCUIT_RESET_SECS`
    /// - `LONG_POLL_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let env = Env(&lookup);

        let reference = WorkflowConfig::default();
        let activity_task_list =
            env.string("ACTIVITY_TASK_LIST", &reference.first_activity.task_list);

        let timeouts = ActivityTimeouts::default()
            .with_schedule_to_close(env.secs("ACTIVITY_SCHEDULE_TO_CLOSE_SECS", 360))
            .with_schedule_to_start(env.secs("ACTIVITY_SCHEDULE_TO_START_SECS", 300))
            .with_start_to_close(env.secs("ACTIVITY_START_TO_CLOSE_SECS", 60))
            .with_heartbeat(env.secs("ACTIVITY_HEARTBEAT_SECS", 60));

        let activity = |prefix: &str, reference: &ActivityTypeConfig| {
            let name = env.string(&format!("{prefix}_NAME"), &reference.activity_type.name);
            let version =
                env.string(&format!("{prefix}_VERSION"), &reference.activity_type.version);
            ActivityTypeConfig::new(name, version)
                .with_task_list(activity_task_list.clone())
                .with_timeouts(timeouts)
        };

        let workflow = WorkflowConfig::new(env.string("SWF_DOMAIN", &reference.domain))
            .with_workflow_type(TypeRef::new(
                env.string("WORKFLOW_NAME", &reference.workflow_type.name),
                env.string("WORKFLOW_VERSION", &reference.workflow_type.version),
            ))
            .with_decision_task_list(env.string("DECISION_TASK_LIST", &reference.decision_task_list))
            .with_first_activity(activity("ACTIVITY1", &reference.first_activity))
            .with_second_activity(activity("ACTIVITY2", &reference.second_activity));

        let fixed = RetryPolicy::default();
        let backoff = env
            .parse("POLL_RETRY_BACKOFF")
            .unwrap_or(fixed.backoff_coefficient);
        let max_interval = if backoff > 1.0 {
            RetryPolicy::exponential().max_interval
        } else {
            fixed.max_interval
        };
        let retry = RetryPolicy::default()
            .with_initial_interval(env.millis("POLL_RETRY_INITIAL_MS", fixed.initial_interval))
            .with_max_interval(env.millis("POLL_RETRY_MAX_MS", max_interval))
            .with_backoff_coefficient(backoff)
            .with_max_attempts(env.parse("POLL_RETRY_MAX_ATTEMPTS"));

        let mut worker_loop = WorkerLoopConfig::new()
            .with_identity(env.string("SWF_IDENTITY", &defaults.worker_loop.identity))
            .with_retry(retry);
        if let Some(threshold) = env.parse::<u32>("POLL_CIRCUIT_FAILURE_THRESHOLD") {
            let reset_timeout = env.secs(
                "POLL_CIRCUIT_RESET_SECS",
                CircuitBreakerConfig::default().reset_timeout.as_secs(),
            );
            worker_loop = worker_loop.with_circuit_breaker(
                CircuitBreakerConfig::new()
                    .with_failure_threshold(threshold)
                    .with_reset_timeout(reset_timeout),
            );
        }

        Self {
            endpoint: env.string("SWF_ENDPOINT", &defaults.endpoint),
            credentials: AwsCredentials::from_lookup(&lookup),
            region: lookup("AWS_REGION")
                .or_else(|| lookup("AWS_DEFAULT_REGION"))
                .filter(|region| !region.is_empty()),
            auth_token: lookup("SWF_AUTH_TOKEN").filter(|token| !token.is_empty()),
            long_poll_timeout: env.secs(
                "LONG_POLL_TIMEOUT_SECS",
                defaults.long_poll_timeout.as_secs(),
            ),
            workflow,
            worker_loop,
            first_activity_title: env.string("ACTIVITY1_TITLE", &defaults.first_activity_title),
            second_activity_title: env.string("ACTIVITY2_TITLE", &defaults.second_activity_title),
        }
    }
}

impl WorkerConfig {
    /// Request signer, when credentials are configured
    ///
    /// The region is `region`, else the one in a regional endpoint host,
    /// else `us-east-1`.
    pub fn signer(&self) -> Option<SigV4Signer> {
        let credentials = self.credentials.clone()?;
        let region = self.region.clone().unwrap_or_else(|| {
            reqwest::Url::parse(&self.endpoint)
                .ok()
                .and_then(|url| url.host_str().and_then(region_from_host).map(str::to_string))
                .unwrap_or_else(|| DEFAULT_REGION.to_string())
        });
        Some(SigV4Signer::new(credentials, region))
    }
}

struct Env<'a, F>(&'a F);

impl<F> Env<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str, default: &str) -> String {
        (self.0)(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        (self.0)(key).and_then(|value| value.trim().parse().ok())
    }

    fn secs(&self, key: &str, default: u64) -> Duration {
        Duration::from_secs(self.parse(key).unwrap_or(default))
    }

    fn millis(&self, key: &str, default: Duration) -> Duration {
        self.parse(key).map(Duration::from_millis).unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_reference_workflow() {
        let config = WorkerConfig::from_lookup(lookup(&[]));

        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert!(config.auth_token.is_none());
        assert!(config.credentials.is_none());
        assert!(config.signer().is_none());
        assert_eq!(config.workflow, WorkflowConfig::default());
        assert_eq!(config.worker_loop.retry, RetryPolicy::default());
        assert!(config.worker_loop.circuit_breaker.is_none());
        assert!(config.worker_loop.identity.starts_with("swflow-worker-"));
    }

    #[test]
    fn test_overrides() {
        let config = WorkerConfig::from_lookup(lookup(&[
            ("SWF_DOMAIN", "prod"),
            ("SWF_IDENTITY", "host-7"),
            ("SWF_AUTH_TOKEN", "secret"),
            ("DECISION_TASK_LIST", "deciders"),
            ("ACTIVITY_TASK_LIST", "workers"),
            ("ACTIVITY2_NAME", "shout"),
            ("ACTIVITY_START_TO_CLOSE_SECS", "15"),
            ("POLL_RETRY_INITIAL_MS", "250"),
            ("POLL_RETRY_MAX_ATTEMPTS", "5"),
            ("POLL_CIRCUIT_FAILURE_THRESHOLD", "3"),
            ("POLL_CIRCUIT_RESET_SECS", "9"),
        ]));

        assert_eq!(config.workflow.domain, "prod");
        assert_eq!(config.worker_loop.identity, "host-7");
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.workflow.decision_task_list, "deciders");
        assert_eq!(config.workflow.activity_task_lists(), vec!["workers"]);
        assert_eq!(config.workflow.second_activity.activity_type.name, "shout");
        assert_eq!(
            config.workflow.first_activity.timeouts.start_to_close,
            Duration::from_secs(15)
        );
        assert_eq!(
            config.worker_loop.retry.initial_interval,
            Duration::from_millis(250)
        );
        assert_eq!(config.worker_loop.retry.max_attempts, Some(5));

        let breaker = config.worker_loop.circuit_breaker.unwrap();
        assert_eq!(breaker.failure_threshold, 3);
        assert_eq!(breaker.reset_timeout, Duration::from_secs(9));
    }

    #[test]
    fn test_signer_region() {
        let credentials = [
            ("AWS_ACCESS_KEY_ID", "AKID"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
        ];

        let config = WorkerConfig::from_lookup(lookup(&credentials));
        assert_eq!(config.signer().unwrap().region(), "us-east-1");

        let mut vars = credentials.to_vec();
        vars.push(("SWF_ENDPOINT", "https://swf.eu-west-1.amazonaws.com"));
        let config = WorkerConfig::from_lookup(lookup(&vars));
        assert_eq!(config.signer().unwrap().region(), "eu-west-1");

        vars.push(("AWS_DEFAULT_REGION", "ap-south-1"));
        let config = WorkerConfig::from_lookup(lookup(&vars));
        assert_eq!(config.signer().unwrap().region(), "ap-south-1");

        vars.push(("AWS_REGION", "us-west-2"));
        let config = WorkerConfig::from_lookup(lookup(&vars));
        assert_eq!(config.signer().unwrap().region(), "us-west-2");
    }

    #[test]
    fn test_backoff_alone_grows_delays() {
        let config = WorkerConfig::from_lookup(lookup(&[("POLL_RETRY_BACKOFF", "2")]));
        let retry = &config.worker_loop.retry;

        assert_eq!(retry.max_interval, Duration::from_secs(60));
        assert_eq!(retry.delay_for_failure(1), Duration::from_secs(2));
        assert_eq!(retry.delay_for_failure(3), Duration::from_secs(8));
        assert_eq!(retry.delay_for_failure(10), Duration::from_secs(60));

        let capped = WorkerConfig::from_lookup(lookup(&[
            ("POLL_RETRY_BACKOFF", "2"),
            ("POLL_RETRY_MAX_MS", "5000"),
        ]));
        assert_eq!(capped.worker_loop.retry.delay_for_failure(3), Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = WorkerConfig::from_lookup(lookup(&[
            ("LONG_POLL_TIMEOUT_SECS", "soon"),
            ("POLL_RETRY_MAX_ATTEMPTS", "-1"),
        ]));

        assert_eq!(config.long_poll_timeout, Duration::from_secs(70));
        assert_eq!(config.worker_loop.retry.max_attempts, None);
    }
}
