//! In-memory implementation of WorkflowService for testing
//!
//! Behaves like the managed service as far as the workers can observe:
//! long-polls block until work arrives or the poll times out, task tokens
//! are single-use, and every state change is appended to the execution's
//! history.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::Notify;
use uuid::Uuid;

use super::protocol::*;
use crate::workflow::{
    ActivityTaskCompletedAttributes, ActivityTaskFailedAttributes,
    ActivityTaskScheduledAttributes, Decision, EventType, HistoryEvent, TypeRef,
    WorkflowExecutionFailedAttributes, WorkflowExecutionStartedAttributes,
};

/// Lifecycle of an execution as tracked by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Open,
    Completed,
    Failed,
}

struct Execution {
    execution: WorkflowExecution,
    domain: String,
    workflow_type: TypeRef,
    decision_task_list: String,
    status: ExecutionStatus,
    events: Vec<HistoryEvent>,

    /// A decision task is queued and not yet handed out
    decision_scheduled: bool,

    previous_started_event_id: i64,
}

impl Execution {
    fn append(&mut self, mut event: HistoryEvent) -> i64 {
        let event_id = self.events.len() as i64 + 1;
        event.event_id = event_id;
        event.event_timestamp = Utc::now().timestamp_millis() as f64 / 1000.0;
        self.events.push(event);
        event_id
    }

    fn is_open(&self) -> bool {
        self.status == ExecutionStatus::Open
    }
}

struct QueuedActivity {
    execution: usize,
    task_list: String,
    activity_id: String,
    activity_type: TypeRef,
    input: Option<String>,
    scheduled_event_id: i64,
}

enum Lease {
    Decision {
        execution: usize,
    },
    Activity {
        execution: usize,
        scheduled_event_id: i64,
        started_event_id: i64,
    },
}

#[derive(Default)]
struct State {
    executions: Vec<Execution>,
    open_by_workflow_id: HashMap<String, usize>,
    decision_queue: VecDeque<usize>,
    activity_queue: VecDeque<QueuedActivity>,
    leases: HashMap<String, Lease>,
    failing_polls: u32,
}

impl State {
    fn take_injected_failure(&mut self) -> Result<(), ServiceError> {
        if self.failing_polls > 0 {
            self.failing_polls -= 1;
            return Err(ServiceError::Transport("injected poll failure".to_string()));
        }
        Ok(())
    }

    fn schedule_decision(&mut self, index: usize) {
        let execution = &mut self.executions[index];
        if !execution.is_open() || execution.decision_scheduled {
            return;
        }
        execution.append(HistoryEvent::new(0, EventType::DecisionTaskScheduled));
        execution.decision_scheduled = true;
        self.decision_queue.push_back(index);
    }

    fn take_decision_task(&mut self, request: &PollRequest) -> Option<DecisionTask> {
        let position = self.decision_queue.iter().position(|&index| {
            let execution = &self.executions[index];
            execution.domain == request.domain
                && execution.decision_task_list == request.task_list.name
        })?;
        let index = self.decision_queue.remove(position)?;

        let execution = &mut self.executions[index];
        execution.decision_scheduled = false;
        let started_event_id = execution.append(HistoryEvent::new(0, EventType::DecisionTaskStarted));
        let previous_started_event_id = execution.previous_started_event_id;
        execution.previous_started_event_id = started_event_id;

        let task = DecisionTask {
            task_token: new_token(),
            workflow_execution: execution.execution.clone(),
            workflow_type: execution.workflow_type.clone(),
            events: execution.events.clone(),
            started_event_id,
            previous_started_event_id,
            next_page_token: None,
        };
        self.leases
            .insert(task.task_token.clone(), Lease::Decision { execution: index });
        Some(task)
    }

    fn take_activity_task(&mut self, request: &PollRequest) -> Option<ActivityTask> {
        let position = self.activity_queue.iter().position(|queued| {
            queued.task_list == request.task_list.name
                && self.executions[queued.execution].domain == request.domain
        })?;
        let queued = self.activity_queue.remove(position)?;

        let execution = &mut self.executions[queued.execution];
        let started_event_id = execution.append(HistoryEvent::new(0, EventType::ActivityTaskStarted));

        let task = ActivityTask {
            task_token: new_token(),
            activity_id: queued.activity_id,
            activity_type: queued.activity_type,
            input: queued.input,
            started_event_id,
            workflow_execution: execution.execution.clone(),
        };
        self.leases.insert(
            task.task_token.clone(),
            Lease::Activity {
                execution: queued.execution,
                scheduled_event_id: queued.scheduled_event_id,
                started_event_id,
            },
        );
        Some(task)
    }

    fn apply_decisions(&mut self, index: usize, decisions: &[Decision]) {
        let execution = &mut self.executions[index];
        execution.append(HistoryEvent::new(0, EventType::DecisionTaskCompleted));

        for decision in decisions {
            let execution = &mut self.executions[index];
            if !execution.is_open() {
                break;
            }
            match decision {
                Decision::ScheduleActivityTask { attributes } => {
                    let mut event = HistoryEvent::new(0, EventType::ActivityTaskScheduled);
                    event.activity_task_scheduled_event_attributes =
                        Some(ActivityTaskScheduledAttributes {
                            activity_id: attributes.activity_id.clone(),
                            input: attributes.input.clone(),
                        });
                    let scheduled_event_id = execution.append(event);
                    self.activity_queue.push_back(QueuedActivity {
                        execution: index,
                        task_list: attributes.task_list.name.clone(),
                        activity_id: attributes.activity_id.clone(),
                        activity_type: attributes.activity_type.clone(),
                        input: attributes.input.clone(),
                        scheduled_event_id,
                    });
                }
                Decision::CompleteWorkflowExecution { .. } => {
                    execution.append(HistoryEvent::new(0, EventType::WorkflowExecutionCompleted));
                    self.close(index, ExecutionStatus::Completed);
                }
                Decision::FailWorkflowExecution { attributes } => {
                    let mut event = HistoryEvent::new(0, EventType::WorkflowExecutionFailed);
                    event.workflow_execution_failed_event_attributes =
                        Some(WorkflowExecutionFailedAttributes {
                            reason: Some(attributes.reason.clone()),
                            details: Some(attributes.details.clone()),
                        });
                    execution.append(event);
                    self.close(index, ExecutionStatus::Failed);
                }
            }
        }
    }

    fn close(&mut self, index: usize, status: ExecutionStatus) {
        let execution = &mut self.executions[index];
        execution.status = status;
        let workflow_id = execution.execution.workflow_id.clone();
        self.open_by_workflow_id.remove(&workflow_id);
        self.decision_queue.retain(|&queued| queued != index);
        self.activity_queue.retain(|queued| queued.execution != index);
    }
}

/// In-memory implementation of WorkflowService
///
/// This is primarily for testing.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use swflow_durable::InMemoryWorkflowService;
///
/// let service = InMemoryWorkflowService::new().with_long_poll_timeout(Duration::from_millis(50));
/// assert_eq!(service.outstanding_tasks(), 0);
/// ```
pub struct InMemoryWorkflowService {
    state: Mutex<State>,
    work_available: Notify,
    long_poll_timeout: Duration,
}

impl InMemoryWorkflowService {
    /// Create a new in-memory service with a 60 second long-poll
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            work_available: Notify::new(),
            long_poll_timeout: Duration::from_secs(60),
        }
    }

    /// Set how long an empty poll blocks before returning no task
    pub fn with_long_poll_timeout(mut self, timeout: Duration) -> Self {
        self.long_poll_timeout = timeout;
        self
    }

    /// Make the next `count` polls fail with a transport error
    pub fn fail_next_polls(&self, count: u32) {
        self.state.lock().failing_polls = count;
    }

    /// History of the latest execution with this workflow id
    pub fn history(&self, workflow_id: &str) -> Option<Vec<HistoryEvent>> {
        let state = self.state.lock();
        state
            .executions
            .iter()
            .rev()
            .find(|execution| execution.execution.workflow_id == workflow_id)
            .map(|execution| execution.events.clone())
    }

    /// Status of the latest execution with this workflow id
    pub fn execution_status(&self, workflow_id: &str) -> Option<ExecutionStatus> {
        let state = self.state.lock();
        state
            .executions
            .iter()
            .rev()
            .find(|execution| execution.execution.workflow_id == workflow_id)
            .map(|execution| execution.status)
    }

    /// Number of tasks handed out and not yet answered
    pub fn outstanding_tasks(&self) -> usize {
        self.state.lock().leases.len()
    }

    /// Number of tasks waiting to be polled
    pub fn queued_tasks(&self) -> usize {
        let state = self.state.lock();
        state.decision_queue.len() + state.activity_queue.len()
    }

    /// Block until `take` yields a task or the long-poll expires
    async fn long_poll<T>(
        &self,
        mut take: impl FnMut(&mut State) -> Option<T>,
    ) -> Result<Option<T>, ServiceError> {
        self.state.lock().take_injected_failure()?;

        let deadline = tokio::time::Instant::now() + self.long_poll_timeout;
        loop {
            let notified = self.work_available.notified();
            let task = take(&mut *self.state.lock());
            if let Some(task) = task {
                return Ok(Some(task));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    fn take_lease(&self, state: &mut State, task_token: &str) -> Result<Lease, ServiceError> {
        state
            .leases
            .remove(task_token)
            .ok_or_else(|| ServiceError::UnknownTaskToken(task_token.to_string()))
    }
}

impl Default for InMemoryWorkflowService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowService for InMemoryWorkflowService {
    async fn poll_for_activity_task(
        &self,
        request: &PollRequest,
    ) -> Result<Option<ActivityTask>, ServiceError> {
        self.long_poll(|state| state.take_activity_task(request)).await
    }

    async fn respond_activity_task_completed(
        &self,
        request: &RespondActivityTaskCompleted,
    ) -> Result<(), ServiceError> {
        {
            let mut state = self.state.lock();
            let Lease::Activity {
                execution: index,
                scheduled_event_id,
                started_event_id,
            } = self.take_lease(&mut state, &request.task_token)?
            else {
                return Err(ServiceError::UnknownTaskToken(request.task_token.clone()));
            };

            let execution = &mut state.executions[index];
            if execution.is_open() {
                let mut event = HistoryEvent::new(0, EventType::ActivityTaskCompleted);
                event.activity_task_completed_event_attributes =
                    Some(ActivityTaskCompletedAttributes {
                        result: request.result.clone(),
                        scheduled_event_id,
                        started_event_id,
                    });
                execution.append(event);
                state.schedule_decision(index);
            }
        }
        self.work_available.notify_waiters();
        Ok(())
    }

    async fn respond_activity_task_failed(
        &self,
        request: &RespondActivityTaskFailed,
    ) -> Result<(), ServiceError> {
        {
            let mut state = self.state.lock();
            let Lease::Activity {
                execution: index,
                scheduled_event_id,
                ..
            } = self.take_lease(&mut state, &request.task_token)?
            else {
                return Err(ServiceError::UnknownTaskToken(request.task_token.clone()));
            };

            let execution = &mut state.executions[index];
            if execution.is_open() {
                let mut event = HistoryEvent::new(0, EventType::ActivityTaskFailed);
                event.activity_task_failed_event_attributes = Some(ActivityTaskFailedAttributes {
                    reason: Some(request.reason.clone()),
                    details: Some(request.details.clone()),
                    scheduled_event_id,
                });
                execution.append(event);
                state.schedule_decision(index);
            }
        }
        self.work_available.notify_waiters();
        Ok(())
    }

    async fn poll_for_decision_task(
        &self,
        request: &PollRequest,
    ) -> Result<Option<DecisionTask>, ServiceError> {
        self.long_poll(|state| state.take_decision_task(request)).await
    }

    async fn respond_decision_task_completed(
        &self,
        request: &RespondDecisionTaskCompleted,
    ) -> Result<(), ServiceError> {
        {
            let mut state = self.state.lock();
            let Lease::Decision { execution: index } =
                self.take_lease(&mut state, &request.task_token)?
            else {
                return Err(ServiceError::UnknownTaskToken(request.task_token.clone()));
            };

            if state.executions[index].is_open() {
                state.apply_decisions(index, &request.decisions);
            }
        }
        self.work_available.notify_waiters();
        Ok(())
    }

    async fn start_workflow_execution(
        &self,
        request: &StartWorkflowRequest,
    ) -> Result<StartWorkflowResponse, ServiceError> {
        let run_id = {
            let mut state = self.state.lock();
            if state.open_by_workflow_id.contains_key(&request.workflow_id) {
                return Err(ServiceError::WorkflowAlreadyStarted(request.workflow_id.clone()));
            }

            let run_id = Uuid::now_v7().to_string();
            let mut execution = Execution {
                execution: WorkflowExecution {
                    workflow_id: request.workflow_id.clone(),
                    run_id: run_id.clone(),
                },
                domain: request.domain.clone(),
                workflow_type: request.workflow_type.clone(),
                decision_task_list: request.task_list.name.clone(),
                status: ExecutionStatus::Open,
                events: Vec::new(),
                decision_scheduled: false,
                previous_started_event_id: 0,
            };

            let mut started = HistoryEvent::new(0, EventType::WorkflowExecutionStarted);
            started.workflow_execution_started_event_attributes =
                Some(WorkflowExecutionStartedAttributes {
                    input: request.input.clone(),
                });
            execution.append(started);

            let index = state.executions.len();
            state.executions.push(execution);
            state
                .open_by_workflow_id
                .insert(request.workflow_id.clone(), index);
            state.schedule_decision(index);
            run_id
        };
        self.work_available.notify_waiters();
        Ok(StartWorkflowResponse { run_id })
    }
}

fn new_token() -> String {
    Uuid::now_v7().simple().to_string()
}
