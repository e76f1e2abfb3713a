//! 远程动作：把已解析输入以 JSON POST 到 HTTP 端点，响应体即输出值
//!
//! 状态码分类：429 -> RateLimited（读取 Retry-After 秒数），5xx / 超时 / 连接错误 -> Retryable，
//! 其余 4xx -> NonRetryable。重试本身交给 QoS 层。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::debug;

use crate::core::InvocationError;
use crate::model::{ActionBody, ActionOutput};
use crate::process::ActionContext;

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// 错误信息中保留的响应体最大字符数
const BODY_PREVIEW_CHARS: usize = 300;

pub struct RemoteAction {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl RemoteAction {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Retry-After 头（秒数形式）
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// 非成功状态码到调用错误的映射
pub fn classify_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> InvocationError {
    let body = if body.chars().count() > BODY_PREVIEW_CHARS {
        format!("{}...", body.chars().take(BODY_PREVIEW_CHARS).collect::<String>())
    } else {
        body.to_string()
    };
    let message = format!("HTTP {}: {}", status.as_u16(), body);
    if status == StatusCode::TOO_MANY_REQUESTS {
        InvocationError::rate_limited(message, retry_after)
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        InvocationError::retryable(message)
    } else {
        InvocationError::fatal(message)
    }
}

fn classify_transport(err: reqwest::Error) -> InvocationError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        InvocationError::retryable(err.to_string())
    } else {
        InvocationError::fatal(err.to_string())
    }
}

#[async_trait]
impl ActionBody for RemoteAction {
    async fn invoke(&self, ctx: &ActionContext) -> Result<ActionOutput, InvocationError> {
        let payload = json!({
            "action": ctx.action_name,
            "process_id": ctx.process_id,
            "attempt": ctx.attempt,
            "inputs": ctx.inputs,
        });
        debug!(
            endpoint = %self.endpoint,
            action = %ctx.action_name,
            attempt = ctx.attempt,
            "Calling remote action"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let hint = retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, hint, &body));
        }

        let value: Value = response.json().await.map_err(|e| {
            InvocationError::fatal(format!("Invalid JSON from {}: {}", self.endpoint, e))
        })?;
        Ok(match value {
            Value::Null => ActionOutput::none(),
            v => ActionOutput::value(v),
        })
    }

    fn kind(&self) -> &'static str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_rate_limit_keeps_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        let err = classify_status(StatusCode::TOO_MANY_REQUESTS, retry_after(&headers), "slow down");
        match err {
            InvocationError::RateLimited { message, retry_after } => {
                assert!(message.contains("429"));
                assert_eq!(retry_after, Some(Duration::from_secs(7)));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_http_date_retry_after_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn test_server_errors_are_retryable() {
        for status in [StatusCode::INTERNAL_SERVER_ERROR, StatusCode::BAD_GATEWAY, StatusCode::REQUEST_TIMEOUT] {
            assert!(matches!(
                classify_status(status, None, ""),
                InvocationError::Retryable(_)
            ));
        }
    }

    #[test]
    fn test_client_errors_are_permanent() {
        let err = classify_status(StatusCode::BAD_REQUEST, None, &"x".repeat(1000));
        match err {
            InvocationError::NonRetryable(message) => {
                assert!(message.starts_with("HTTP 400"));
                assert!(message.ends_with("..."));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_retryable() {
        use crate::blackboard::{Binding, Blackboard};
        use crate::core::ProcessStatus;
        use crate::model::{ActionMetadata, AgentDefinition, Goal};
        use crate::process::Engine;
        use crate::qos::{QosResolver, QosSettings};
        use tokio_util::sync::CancellationToken;

        let remote = ActionMetadata::new("lookup")
            .output(Binding::of_type("Answer"))
            .into_action(
                RemoteAction::new("http://127.0.0.1:9/lookup").with_timeout(Duration::from_millis(200)),
            );
        let agent = AgentDefinition::builder("remote")
            .action(remote)
            .goal(Goal::producing("Answer"))
            .build()
            .unwrap();
        let goal = agent.default_goal().unwrap().clone();
        let engine = Engine::builder()
            .with_qos(QosResolver::new().with(
                "default",
                QosSettings::default().max_attempts(2).backoff_millis(1),
            ))
            .build();

        let result = engine
            .run(&agent, &goal, Blackboard::new(), CancellationToken::new())
            .await;
        assert_eq!(result.status, ProcessStatus::Failed);
        assert_eq!(result.history[0].attempts, 2);
    }
}
