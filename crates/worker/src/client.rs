// HTTP client for the orchestration service's JSON protocol
// Decision: Implements the durable WorkflowService port so the worker loops never see HTTP
// Decision: Every operation is a POST to the endpoint root, selected by the X-Amz-Target header
//
// This module provides:
// - Request framing (amz-json content type, target header)
// - Authentication: SigV4 signing with AWS credentials, or a bearer token for proxies
// - Empty long-polls (blank taskToken) mapped to "no task"
// - History pagination for decision tasks
// - Service faults mapped onto ServiceError

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use swflow_durable::service::{
    ActivityTask, DecisionTask, PollRequest, RespondActivityTaskCompleted,
    RespondActivityTaskFailed, RespondDecisionTaskCompleted, ServiceError, StartWorkflowRequest,
    StartWorkflowResponse, WorkflowService,
};

use crate::signing::{SigV4Signer, SignableRequest};

/// Content type of every request
pub const AMZ_JSON: &str = "application/x-amz-json-1.0";

/// Header selecting the operation
pub const TARGET_HEADER: &str = "X-Amz-Target";

const TARGET_PREFIX: &str = "SimpleWorkflowService";

const UNKNOWN_RESOURCE: &str = "UnknownResourceFault";
const ALREADY_STARTED: &str = "WorkflowExecutionAlreadyStartedFault";

/// Error body returned with non-2xx responses
#[derive(Debug, Default, Deserialize)]
struct FaultBody {
    #[serde(rename = "__type", default)]
    fault_type: String,
    #[serde(alias = "Message", default)]
    message: String,
}

/// `PollForDecisionTask` body, with the page token on follow-up pages
#[derive(Serialize)]
struct PagedPoll<'a> {
    #[serde(flatten)]
    request: &'a PollRequest,
    #[serde(rename = "nextPageToken", skip_serializing_if = "Option::is_none")]
    next_page_token: Option<&'a str>,
}

/// Client for the orchestration service
pub struct SwfHttpClient {
    endpoint: String,
    /// `Host` header value the HTTP stack sends for `endpoint`
    host: String,
    path: String,
    http: reqwest::Client,
    signer: Option<SigV4Signer>,
    auth_token: Option<String>,
}

impl SwfHttpClient {
    /// Create a client for `endpoint`
    ///
    /// `request_timeout` must exceed the service's long-poll duration, or
    /// empty polls surface as transport errors.
    pub fn new(endpoint: &str, request_timeout: Duration) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        let endpoint = endpoint.trim_end_matches('/').to_string();
        let url = Url::parse(&endpoint)
            .map_err(|e| ServiceError::Transport(format!("invalid endpoint {endpoint}: {e}")))?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(ServiceError::Transport(format!(
                    "endpoint {endpoint} has no host"
                )))
            }
        };

        Ok(Self {
            path: url.path().to_string(),
            endpoint,
            host,
            http,
            signer: None,
            auth_token: None,
        })
    }

    /// Sign every request with AWS Signature Version 4
    ///
    /// Takes precedence over a bearer token.
    pub fn with_signer(mut self, signer: Option<SigV4Signer>) -> Self {
        self.signer = signer;
        self
    }

    /// Send `Authorization: Bearer <token>` with every unsigned request
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Host the requests are signed for
    pub fn host(&self) -> &str {
        &self.host
    }

    /// POST one operation and return the raw response body
    #[instrument(skip(self, body), fields(endpoint = %self.endpoint))]
    async fn send<B: Serialize + ?Sized>(
        &self,
        operation: &str,
        body: &B,
    ) -> Result<Vec<u8>, ServiceError> {
        let payload = serde_json::to_vec(body)?;
        let target = format!("{TARGET_PREFIX}.{operation}");

        let mut request = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, AMZ_JSON)
            .header(TARGET_HEADER, &target);
        if let Some(signer) = &self.signer {
            let signable = SignableRequest {
                method: "POST",
                host: &self.host,
                path: &self.path,
                headers: &[("content-type", AMZ_JSON), ("x-amz-target", target.as_str())],
                body: &payload,
            };
            for (name, value) in signer.sign(&signable, Utc::now()) {
                request = request.header(name, value);
            }
        } else if let Some(token) = &self.auth_token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request
            .body(payload)
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        if !status.is_success() {
            let fault: FaultBody = serde_json::from_slice(&bytes).unwrap_or_else(|_| FaultBody {
                message: String::from_utf8_lossy(&bytes).into_owned(),
                ..Default::default()
            });
            let code = fault
                .fault_type
                .rsplit('#')
                .next()
                .unwrap_or_default()
                .to_string();
            debug!(status = status.as_u16(), code = %code, "Service returned a fault");
            return Err(ServiceError::Service {
                status: status.as_u16(),
                code,
                message: fault.message,
            });
        }

        debug!(status = status.as_u16(), bytes = bytes.len(), "Service call succeeded");
        Ok(bytes.to_vec())
    }

    async fn call<B, T>(&self, operation: &str, body: &B) -> Result<T, ServiceError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let bytes = self.send(operation, body).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Respond operations; a rejected token becomes `UnknownTaskToken`
    async fn respond<B: Serialize + ?Sized>(
        &self,
        operation: &str,
        task_token: &str,
        body: &B,
    ) -> Result<(), ServiceError> {
        match self.send(operation, body).await {
            Ok(_) => Ok(()),
            Err(ServiceError::Service { code, .. }) if code == UNKNOWN_RESOURCE => {
                Err(ServiceError::UnknownTaskToken(task_token.to_string()))
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl WorkflowService for SwfHttpClient {
    async fn poll_for_activity_task(
        &self,
        request: &PollRequest,
    ) -> Result<Option<ActivityTask>, ServiceError> {
        let task: ActivityTask = self.call("PollForActivityTask", request).await?;
        Ok((!task.task_token.is_empty()).then_some(task))
    }

    async fn respond_activity_task_completed(
        &self,
        request: &RespondActivityTaskCompleted,
    ) -> Result<(), ServiceError> {
        self.respond("RespondActivityTaskCompleted", &request.task_token, request)
            .await
    }

    async fn respond_activity_task_failed(
        &self,
        request: &RespondActivityTaskFailed,
    ) -> Result<(), ServiceError> {
        self.respond("RespondActivityTaskFailed", &request.task_token, request)
            .await
    }

    async fn poll_for_decision_task(
        &self,
        request: &PollRequest,
    ) -> Result<Option<DecisionTask>, ServiceError> {
        let mut task: DecisionTask = self
            .call(
                "PollForDecisionTask",
                &PagedPoll {
                    request,
                    next_page_token: None,
                },
            )
            .await?;
        if task.task_token.is_empty() {
            return Ok(None);
        }

        while let Some(page_token) = task.next_page_token.take() {
            let page: DecisionTask = self
                .call(
                    "PollForDecisionTask",
                    &PagedPoll {
                        request,
                        next_page_token: Some(&page_token),
                    },
                )
                .await?;
            debug!(
                workflow_id = %task.workflow_execution.workflow_id,
                events = page.events.len(),
                "Fetched history page"
            );
            task.events.extend(page.events);
            task.next_page_token = page.next_page_token;
        }

        Ok(Some(task))
    }

    async fn respond_decision_task_completed(
        &self,
        request: &RespondDecisionTaskCompleted,
    ) -> Result<(), ServiceError> {
        self.respond("RespondDecisionTaskCompleted", &request.task_token, request)
            .await
    }

    async fn start_workflow_execution(
        &self,
        request: &StartWorkflowRequest,
    ) -> Result<StartWorkflowResponse, ServiceError> {
        match self
            .call::<_, StartWorkflowResponse>("StartWorkflowExecution", request)
            .await
        {
            Err(ServiceError::Service { code, .. }) if code == ALREADY_STARTED => Err(
                ServiceError::WorkflowAlreadyStarted(request.workflow_id.clone()),
            ),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paged_poll_body() {
        let request = PollRequest::new("default", "deciderTaskList").with_identity("w-1");

        let first = serde_json::to_value(PagedPoll {
            request: &request,
            next_page_token: None,
        })
        .unwrap();
        assert_eq!(
            first,
            serde_json::json!({
                "domain": "default",
                "taskList": {"name": "deciderTaskList"},
                "identity": "w-1"
            })
        );

        let next = serde_json::to_value(PagedPoll {
            request: &request,
            next_page_token: Some("abc"),
        })
        .unwrap();
        assert_eq!(next["nextPageToken"], "abc");
    }

    #[test]
    fn test_fault_body_parsing() {
        let fault: FaultBody = serde_json::from_str(
            r#"{"__type": "com.amazonaws.swf.base.model#UnknownResourceFault", "message": "gone"}"#,
        )
        .unwrap();
        assert_eq!(fault.fault_type.rsplit('#').next(), Some(UNKNOWN_RESOURCE));
        assert_eq!(fault.message, "gone");
    }

    #[test]
    fn test_endpoint_trailing_slash() {
        let client = SwfHttpClient::new("http://localhost:9000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:9000");
        assert_eq!(client.host(), "localhost:9000");
    }

    #[test]
    fn test_default_port_is_not_part_of_host() {
        let client =
            SwfHttpClient::new("https://swf.us-east-1.amazonaws.com", Duration::from_secs(1))
                .unwrap();
        assert_eq!(client.host(), "swf.us-east-1.amazonaws.com");
        assert_eq!(client.path, "/");
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(matches!(
            SwfHttpClient::new("not a url", Duration::from_secs(1)),
            Err(ServiceError::Transport(_))
        ));
    }
}
