//! End-to-end worker loop tests against the in-memory service
//!
//! Both worker kinds run as real tokio tasks and talk to the service through
//! the `WorkflowService` trait, exactly as they would against the managed
//! service.
//!
//! Run with: cargo test -p swflow-durable --test worker_loop_test

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use swflow_durable::prelude::*;
use swflow_durable::service::{
    ActivityTask, DecisionTask, ExecutionStatus, PollRequest, RespondActivityTaskCompleted,
    RespondActivityTaskFailed, RespondDecisionTaskCompleted, StartWorkflowResponse,
};
use swflow_durable::workflow::EventType;

const LONG_POLL: Duration = Duration::from_millis(20);
const WAIT_LIMIT: Duration = Duration::from_secs(5);

// ============================================
// Helpers
// ============================================

fn greet(input: &str) -> Result<String, ActivityError> {
    Ok(format!("Hello {input}"))
}

fn shout(input: &str) -> Result<String, ActivityError> {
    Ok(input.to_uppercase())
}

fn refuse(_input: &str) -> Result<String, ActivityError> {
    Err(ActivityError::new("not today").with_type("Refused"))
}

fn service() -> Arc<InMemoryWorkflowService> {
    Arc::new(InMemoryWorkflowService::new().with_long_poll_timeout(LONG_POLL))
}

fn fast_retry() -> WorkerLoopConfig {
    WorkerLoopConfig::new().with_retry(RetryPolicy::fixed(Duration::from_millis(5)))
}

async fn start(service: &InMemoryWorkflowService, config: &WorkflowConfig, workflow_id: &str) {
    let request = StartWorkflowRequest::from_config(config, workflow_id, Some("World".to_string()));
    service
        .start_workflow_execution(&request)
        .await
        .expect("workflow should start");
}

fn spawn_decider(
    service: Arc<InMemoryWorkflowService>,
    config: Arc<WorkflowConfig>,
    loop_config: WorkerLoopConfig,
    shutdown: &CancellationToken,
) -> JoinHandle<Result<WorkerStats, WorkerError>> {
    let registry = DeciderRegistry::new().with(TwoActivityDecider::new(config.clone()));
    let worker = WorkerLoop::decision(
        service,
        &config.domain,
        &config.decision_task_list,
        Arc::new(registry),
        loop_config,
        shutdown.clone(),
    );
    tokio::spawn(worker.run())
}

fn spawn_activities(
    service: Arc<InMemoryWorkflowService>,
    config: &WorkflowConfig,
    executor: ActivityExecutor,
    shutdown: &CancellationToken,
) -> JoinHandle<Result<WorkerStats, WorkerError>> {
    let worker = WorkerLoop::activity(
        service,
        &config.domain,
        &config.first_activity.task_list,
        Arc::new(executor),
        fast_retry(),
        shutdown.clone(),
    );
    tokio::spawn(worker.run())
}

fn count(events: &[HistoryEvent], event_type: EventType) -> usize {
    events
        .iter()
        .filter(|event| event.event_type == event_type)
        .count()
}

/// Wait until the history of `workflow_id` satisfies `done`
async fn wait_for_history(
    service: &InMemoryWorkflowService,
    workflow_id: &str,
    done: impl Fn(&[HistoryEvent]) -> bool,
) -> Vec<HistoryEvent> {
    let deadline = Instant::now() + WAIT_LIMIT;
    loop {
        let events = service.history(workflow_id).unwrap_or_default();
        if done(&events) {
            return events;
        }
        assert!(
            Instant::now() < deadline,
            "history of {workflow_id} never reached the expected shape: {:?}",
            events.iter().map(|e| e.event_type).collect::<Vec<_>>()
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

async fn stop(
    shutdown: &CancellationToken,
    handle: JoinHandle<Result<WorkerStats, WorkerError>>,
) -> WorkerStats {
    shutdown.cancel();
    tokio::time::timeout(WAIT_LIMIT, handle)
        .await
        .expect("worker should stop promptly")
        .expect("worker task should not panic")
        .expect("worker should stop cleanly")
}

// ============================================
// Full workflow
// ============================================

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn test_two_activity_workflow_runs_to_quiescence() {
    let service = service();
    let config = Arc::new(WorkflowConfig::default());
    let shutdown = CancellationToken::new();

    let executor = ActivityExecutor::new()
        .with(config.first_activity.activity_type.clone(), greet)
        .with(config.second_activity.activity_type.clone(), shout);

    let decider = spawn_decider(service.clone(), config.clone(), fast_retry(), &shutdown);
    let activities = spawn_activities(service.clone(), &config, executor, &shutdown);

    start(&service, &config, "wf-full").await;

    // Third decision task answers the second completion
    let events = wait_for_history(&service, "wf-full", |events| {
        count(events, EventType::ActivityTaskCompleted) == 2
            && count(events, EventType::DecisionTaskCompleted) == 3
    })
    .await;

    let decision_stats = stop(&shutdown, decider).await;
    let activity_stats = stop(&shutdown, activities).await;

    let scheduled: Vec<_> = events
        .iter()
        .filter_map(|event| event.activity_task_scheduled_event_attributes.as_ref())
        .collect();
    assert_eq!(scheduled.len(), 2);
    assert_eq!(scheduled[0].input.as_deref(), Some("World"));
    assert_eq!(scheduled[1].input.as_deref(), Some("Hello World"));
    assert_eq!(scheduled[0].activity_id, "myActivity-1");

    let results: Vec<_> = events
        .iter()
        .filter_map(|event| event.activity_task_completed_event_attributes.as_ref())
        .filter_map(|attributes| attributes.result.as_deref())
        .collect();
    assert_eq!(results, vec!["Hello World", "HELLO WORLD"]);

    // The workflow schedules nothing further and is never closed by the decider
    assert_eq!(service.execution_status("wf-full"), Some(ExecutionStatus::Open));
    assert_eq!(count(&events, EventType::WorkflowExecutionCompleted), 0);
    assert_eq!(service.outstanding_tasks(), 0);

    assert_eq!(decision_stats.tasks_reported, 3);
    assert_eq!(decision_stats.workflow_failures, 0);
    assert_eq!(activity_stats.tasks_reported, 2);
    assert_eq!(activity_stats.activity_failures, 0);
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn test_activity_error_is_reported_as_failure() {
    let service = service();
    let config = Arc::new(WorkflowConfig::default());
    let shutdown = CancellationToken::new();

    let executor = ActivityExecutor::new().with(config.first_activity.activity_type.clone(), refuse);

    let decider = spawn_decider(service.clone(), config.clone(), fast_retry(), &shutdown);
    let activities = spawn_activities(service.clone(), &config, executor, &shutdown);

    start(&service, &config, "wf-refused").await;

    let events = wait_for_history(&service, "wf-refused", |events| {
        count(events, EventType::ActivityTaskFailed) >= 1
    })
    .await;

    stop(&shutdown, decider).await;
    let activity_stats = stop(&shutdown, activities).await;

    let failed = events
        .iter()
        .find_map(|event| event.activity_task_failed_event_attributes.as_ref())
        .expect("failure event should be recorded");
    assert_eq!(failed.reason.as_deref(), Some("Refused: not today"));
    assert_eq!(count(&events, EventType::ActivityTaskCompleted), 0);
    assert!(activity_stats.activity_failures >= 1);
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn test_unregistered_workflow_type_fails_execution() {
    let service = service();
    let config = Arc::new(WorkflowConfig::default());
    let shutdown = CancellationToken::new();

    let decider = spawn_decider(service.clone(), config.clone(), fast_retry(), &shutdown);

    let unknown = config
        .as_ref()
        .clone()
        .with_workflow_type(TypeRef::new("somethingElse", "1"));
    start(&service, &unknown, "wf-unknown").await;

    let events = wait_for_history(&service, "wf-unknown", |events| {
        count(events, EventType::WorkflowExecutionFailed) == 1
    })
    .await;
    let stats = stop(&shutdown, decider).await;

    let failed = events
        .iter()
        .find_map(|event| event.workflow_execution_failed_event_attributes.as_ref())
        .and_then(|attributes| attributes.reason.clone())
        .unwrap_or_default();
    assert!(failed.starts_with("Exception in decider: no decider registered"));
    assert_eq!(service.execution_status("wf-unknown"), Some(ExecutionStatus::Failed));
    assert_eq!(stats.workflow_failures, 1);
}

// ============================================
// Poll failures
// ============================================

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn test_poll_failures_are_retried() {
    let service = service();
    let config = Arc::new(WorkflowConfig::default());
    let shutdown = CancellationToken::new();

    service.fail_next_polls(3);
    let decider = spawn_decider(service.clone(), config.clone(), fast_retry(), &shutdown);
    start(&service, &config, "wf-retry").await;

    wait_for_history(&service, "wf-retry", |events| {
        count(events, EventType::ActivityTaskScheduled) == 1
    })
    .await;
    let stats = stop(&shutdown, decider).await;

    assert_eq!(stats.poll_failures, 3);
    assert_eq!(stats.tasks_reported, 1);
}

#[test_log::test(tokio::test)]
async fn test_retry_ceiling_stops_loop() {
    let service = service();
    let config = Arc::new(WorkflowConfig::default());
    let shutdown = CancellationToken::new();

    service.fail_next_polls(10);
    let loop_config = WorkerLoopConfig::new().with_retry(
        RetryPolicy::fixed(Duration::from_millis(1)).with_max_attempts(Some(3)),
    );
    let handle = spawn_decider(service.clone(), config, loop_config, &shutdown);

    let result = tokio::time::timeout(WAIT_LIMIT, handle)
        .await
        .expect("loop should give up")
        .expect("worker task should not panic");

    match result {
        Err(WorkerError::PollRetriesExhausted { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("Expected PollRetriesExhausted, got {:?}", other),
    }
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn test_circuit_breaker_suspends_polling() {
    let service = service();
    let config = Arc::new(WorkflowConfig::default());
    let shutdown = CancellationToken::new();
    let reset_timeout = Duration::from_millis(200);

    service.fail_next_polls(2);
    let loop_config = WorkerLoopConfig::new()
        .with_retry(RetryPolicy::fixed(Duration::from_millis(1)))
        .with_circuit_breaker(
            CircuitBreakerConfig::new()
                .with_failure_threshold(2)
                .with_reset_timeout(reset_timeout),
        );

    start(&service, &config, "wf-breaker").await;
    let began = Instant::now();
    let decider = spawn_decider(service.clone(), config, loop_config, &shutdown);

    wait_for_history(&service, "wf-breaker", |events| {
        count(events, EventType::DecisionTaskCompleted) == 1
    })
    .await;
    let stats = stop(&shutdown, decider).await;

    assert!(began.elapsed() >= reset_timeout);
    assert_eq!(stats.poll_failures, 2);
    assert_eq!(stats.tasks_reported, 1);
}

// ============================================
// Rejected responses
// ============================================

/// Delegates polls and starts, rejects every response
struct RejectingService {
    inner: Arc<InMemoryWorkflowService>,
    submitted: Mutex<Vec<String>>,
}

impl RejectingService {
    fn new(inner: Arc<InMemoryWorkflowService>) -> Self {
        Self {
            inner,
            submitted: Mutex::new(Vec::new()),
        }
    }

    fn reject(&self, task_token: &str) -> Result<(), ServiceError> {
        self.submitted.lock().push(task_token.to_string());
        Err(ServiceError::Transport("connection reset".to_string()))
    }
}

#[async_trait]
impl WorkflowService for RejectingService {
    async fn poll_for_activity_task(
        &self,
        request: &PollRequest,
    ) -> Result<Option<ActivityTask>, ServiceError> {
        self.inner.poll_for_activity_task(request).await
    }

    async fn respond_activity_task_completed(
        &self,
        request: &RespondActivityTaskCompleted,
    ) -> Result<(), ServiceError> {
        self.reject(&request.task_token)
    }

    async fn respond_activity_task_failed(
        &self,
        request: &RespondActivityTaskFailed,
    ) -> Result<(), ServiceError> {
        self.reject(&request.task_token)
    }

    async fn poll_for_decision_task(
        &self,
        request: &PollRequest,
    ) -> Result<Option<DecisionTask>, ServiceError> {
        self.inner.poll_for_decision_task(request).await
    }

    async fn respond_decision_task_completed(
        &self,
        request: &RespondDecisionTaskCompleted,
    ) -> Result<(), ServiceError> {
        self.reject(&request.task_token)
    }

    async fn start_workflow_execution(
        &self,
        request: &StartWorkflowRequest,
    ) -> Result<StartWorkflowResponse, ServiceError> {
        self.inner.start_workflow_execution(request).await
    }
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn test_rejected_response_is_not_retried() {
    let inner = service();
    let rejecting = Arc::new(RejectingService::new(inner.clone()));
    let config = Arc::new(WorkflowConfig::default());
    let shutdown = CancellationToken::new();

    start(&inner, &config, "wf-rejected-1").await;
    start(&inner, &config, "wf-rejected-2").await;

    let registry = DeciderRegistry::new().with(TwoActivityDecider::new(config.clone()));
    let worker = WorkerLoop::decision(
        rejecting.clone(),
        &config.domain,
        &config.decision_task_list,
        Arc::new(registry),
        fast_retry(),
        shutdown.clone(),
    );
    let handle = tokio::spawn(worker.run());

    let deadline = Instant::now() + WAIT_LIMIT;
    while rejecting.submitted.lock().len() < 2 {
        assert!(Instant::now() < deadline, "second decision task was never processed");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // Let the loop run a few more empty polls before stopping it
    tokio::time::sleep(LONG_POLL * 3).await;
    let stats = stop(&shutdown, handle).await;

    assert_eq!(stats.report_failures, 2);
    assert_eq!(stats.tasks_reported, 0);

    // One submission per task token
    let submitted = rejecting.submitted.lock().clone();
    assert_eq!(submitted.len(), 2);
    assert_ne!(submitted[0], submitted[1]);

    // The service never recorded an answer; the tasks are left to time out
    for workflow_id in ["wf-rejected-1", "wf-rejected-2"] {
        let events = inner.history(workflow_id).unwrap_or_default();
        assert_eq!(count(&events, EventType::DecisionTaskCompleted), 0);
        assert_eq!(inner.execution_status(workflow_id), Some(ExecutionStatus::Open));
    }
}

// ============================================
// Shutdown
// ============================================

#[test_log::test(tokio::test)]
async fn test_shutdown_interrupts_idle_long_poll() {
    let service = Arc::new(InMemoryWorkflowService::new());
    let config = Arc::new(WorkflowConfig::default());
    let shutdown = CancellationToken::new();

    // Default long-poll is a minute; shutdown must not wait for it
    let decider = spawn_decider(service, config, fast_retry(), &shutdown);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let stats = stop(&shutdown, decider).await;
    assert_eq!(stats.tasks_reported, 0);
    assert_eq!(stats.poll_failures, 0);
}

#[test_log::test(tokio::test)]
async fn test_shutdown_during_retry_backoff() {
    let service = service();
    let config = Arc::new(WorkflowConfig::default());
    let shutdown = CancellationToken::new();

    service.fail_next_polls(1);
    let loop_config =
        WorkerLoopConfig::new().with_retry(RetryPolicy::fixed(Duration::from_secs(60)));
    let decider = spawn_decider(service, config, loop_config, &shutdown);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let stats = stop(&shutdown, decider).await;
    assert_eq!(stats.poll_failures, 1);
}
