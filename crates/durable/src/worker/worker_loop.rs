//! Worker loop
//!
//! Drives poll -> execute or decide -> report, strictly sequentially, until
//! the shutdown token is cancelled. A task that was already received is
//! always processed and reported before the loop exits.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use super::poller::{PollerError, TaskPoller};
use super::reporter::ResponseReporter;
use crate::activity::ActivityExecutor;
use crate::engine::DeciderRegistry;
use crate::reliability::{CircuitBreaker, CircuitBreakerConfig, CircuitState, RetryPolicy};
use crate::service::{
    ActivityTask, DecisionTask, PollRequest, Task, TaskKind, WorkflowService,
};
use crate::workflow::{Decision, DecisionBatch};

/// Worker loop configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerLoopConfig {
    /// Identity sent with every poll
    pub identity: String,

    /// Delay schedule after failed polls
    pub retry: RetryPolicy,

    /// Suspend polling after repeated failures
    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

impl Default for WorkerLoopConfig {
    fn default() -> Self {
        Self {
            identity: format!("swflow-{}", Uuid::now_v7()),
            retry: RetryPolicy::default(),
            circuit_breaker: None,
        }
    }
}

impl WorkerLoopConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = Some(config);
        self
    }
}

/// Counters of one loop run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub polls: u64,
    pub empty_polls: u64,
    pub poll_failures: u64,

    /// Tasks whose response the service accepted
    pub tasks_reported: u64,

    /// Activity tasks that ended in an activity error
    pub activity_failures: u64,

    /// Decision tasks answered with `FailWorkflowExecution`
    pub workflow_failures: u64,

    /// Responses the service rejected
    pub report_failures: u64,
}

/// Worker loop errors
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The retry ceiling was reached
    #[error("polling failed {attempts} consecutive times: {source}")]
    PollRetriesExhausted {
        attempts: u32,
        #[source]
        source: PollerError,
    },
}

#[derive(Clone)]
enum Handler {
    Activity(Arc<ActivityExecutor>),
    Decision(Arc<DeciderRegistry>),
}

/// Poll/process/report cycle for one task list
///
/// # Example
///
/// ```ignore
/// let shutdown = CancellationToken::new();
/// let worker = WorkerLoop::decision(
///     service,
///     "default",
///     "deciderTaskList",
///     Arc::new(registry),
///     WorkerLoopConfig::default(),
///     shutdown.clone(),
/// );
///
/// let handle = tokio::spawn(worker.run());
/// shutdown.cancel();
/// let stats = handle.await??;
/// ```
pub struct WorkerLoop {
    poller: TaskPoller,
    handler: Handler,
    reporter: ResponseReporter,
    config: WorkerLoopConfig,
    shutdown: CancellationToken,
    stats: WorkerStats,
}

impl WorkerLoop {
    /// Activity worker for `task_list`
    pub fn activity(
        service: Arc<dyn WorkflowService>,
        domain: &str,
        task_list: &str,
        executor: Arc<ActivityExecutor>,
        config: WorkerLoopConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self::new(
            service,
            TaskKind::Activity,
            domain,
            task_list,
            Handler::Activity(executor),
            config,
            shutdown,
        )
    }

    /// Decision worker for `task_list`
    pub fn decision(
        service: Arc<dyn WorkflowService>,
        domain: &str,
        task_list: &str,
        registry: Arc<DeciderRegistry>,
        config: WorkerLoopConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self::new(
            service,
            TaskKind::Decision,
            domain,
            task_list,
            Handler::Decision(registry),
            config,
            shutdown,
        )
    }

    fn new(
        service: Arc<dyn WorkflowService>,
        kind: TaskKind,
        domain: &str,
        task_list: &str,
        handler: Handler,
        config: WorkerLoopConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let request = PollRequest::new(domain, task_list).with_identity(config.identity.clone());
        Self {
            poller: TaskPoller::new(service.clone(), kind, request),
            handler,
            reporter: ResponseReporter::new(service),
            config,
            shutdown,
            stats: WorkerStats::default(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.config.identity
    }

    pub fn kind(&self) -> TaskKind {
        self.poller.kind()
    }

    /// Run until shutdown
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::PollRetriesExhausted`] once the configured
    /// retry ceiling is hit. Without a ceiling the loop only ends on shutdown.
    pub async fn run(mut self) -> Result<WorkerStats, WorkerError> {
        info!(
            identity = %self.config.identity,
            kind = %self.poller.kind(),
            task_list = %self.poller.task_list(),
            "Worker loop started"
        );

        let mut breaker = self.config.circuit_breaker.clone().map(CircuitBreaker::new);
        let mut consecutive_failures: u32 = 0;

        while !self.shutdown.is_cancelled() {
            if let Some(breaker) = breaker.as_mut() {
                if !breaker.allow_request() {
                    let wait = breaker.remaining_open();
                    debug!(wait_ms = wait.as_millis() as u64, "Circuit open, polling suspended");
                    if self.sleep_or_shutdown(wait).await {
                        break;
                    }
                    continue;
                }
            }

            let polled = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                polled = self.poller.poll() => polled,
            };
            self.stats.polls += 1;

            match polled {
                Ok(task) => {
                    consecutive_failures = 0;
                    if let Some(breaker) = breaker.as_mut() {
                        breaker.record_success();
                    }
                    match task {
                        Some(task) => self.process(task).await,
                        None => {
                            self.stats.empty_polls += 1;
                            trace!("No task available");
                        }
                    }
                }
                Err(err) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    self.stats.poll_failures += 1;

                    if let Some(breaker) = breaker.as_mut() {
                        let before = breaker.state();
                        breaker.record_failure();
                        if before != CircuitState::Open && breaker.state() == CircuitState::Open {
                            warn!(
                                reset_timeout_ms = breaker.config().reset_timeout.as_millis() as u64,
                                "Poll circuit opened"
                            );
                        }
                    }

                    if !self.config.retry.has_attempts_remaining(consecutive_failures) {
                        error!(
                            error = %err,
                            attempts = consecutive_failures,
                            "Poll retries exhausted, stopping worker loop"
                        );
                        return Err(WorkerError::PollRetriesExhausted {
                            attempts: consecutive_failures,
                            source: err,
                        });
                    }

                    let delay = self.config.retry.delay_for_failure(consecutive_failures);
                    warn!(
                        error = %err,
                        attempt = consecutive_failures,
                        delay_ms = delay.as_millis() as u64,
                        "Poll failed, retrying"
                    );
                    if self.sleep_or_shutdown(delay).await {
                        break;
                    }
                }
            }
        }

        info!(
            polls = self.stats.polls,
            tasks_reported = self.stats.tasks_reported,
            report_failures = self.stats.report_failures,
            "Worker loop stopped"
        );
        Ok(self.stats)
    }

    /// Returns true if shutdown was requested while sleeping
    async fn sleep_or_shutdown(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => true,
            _ = tokio::time::sleep(duration) => false,
        }
    }

    async fn process(&mut self, task: Task) {
        let reported = match (task, self.handler.clone()) {
            (Task::Activity(task), Handler::Activity(executor)) => {
                self.process_activity(&executor, task).await
            }
            (Task::Decision(task), Handler::Decision(registry)) => {
                self.process_decision(&registry, task).await
            }
            (task, _) => {
                error!(
                    task_kind = %task.kind(),
                    worker_kind = %self.poller.kind(),
                    "Received task of the wrong kind, leaving it to time out"
                );
                return;
            }
        };

        if reported {
            self.stats.tasks_reported += 1;
        } else {
            self.stats.report_failures += 1;
        }
    }

    async fn process_activity(&mut self, executor: &ActivityExecutor, task: ActivityTask) -> bool {
        info!(
            activity_id = %task.activity_id,
            activity_type = %task.activity_type,
            workflow_id = %task.workflow_execution.workflow_id,
            "Processing activity task"
        );

        let result = match executor.execute(&task, self.shutdown.child_token()).await {
            Ok(output) => {
                info!(activity_id = %task.activity_id, "Activity succeeded");
                self.reporter.report_activity_result(&task.task_token, output).await
            }
            Err(err) => {
                self.stats.activity_failures += 1;
                warn!(
                    activity_id = %task.activity_id,
                    error = %err.reason(),
                    "Activity failed"
                );
                self.reporter.report_activity_failure(&task.task_token, &err).await
            }
        };
        result.is_ok()
    }

    async fn process_decision(&mut self, registry: &DeciderRegistry, task: DecisionTask) -> bool {
        // One batch per decision task
        let decisions: DecisionBatch = registry
            .decide(&task.workflow_type, &task.events)
            .into_iter()
            .flatten()
            .collect();

        for decision in &decisions {
            if let Decision::FailWorkflowExecution { attributes } = decision {
                self.stats.workflow_failures += 1;
                error!(
                    workflow_id = %task.workflow_execution.workflow_id,
                    reason = %attributes.reason,
                    "Failing workflow execution"
                );
            }
        }

        info!(
            workflow_id = %task.workflow_execution.workflow_id,
            workflow_type = %task.workflow_type,
            events = task.events.len(),
            decisions = ?decisions.iter().map(Decision::decision_type).collect::<Vec<_>>(),
            "Decided"
        );

        self.reporter
            .report_decisions(&task.task_token, decisions)
            .await
            .is_ok()
    }
}
