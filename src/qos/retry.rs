//! 重试执行器：按 QosPolicy 重复调用，失败经 core::recovery 分类
//!
//! 每次尝试与每次退避等待都与取消令牌竞争；取消时正在进行的 future 在其 await 点被丢弃。

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::{classify, InvocationError, RecoveryAction, ReplanRequest};
use crate::qos::QosPolicy;

/// 引擎看到的调用结果
#[derive(Debug)]
pub enum RetryOutcome<T> {
    /// 成功的值与实际尝试次数
    Succeeded(T, u32),
    /// 重规划信号，不消耗重试预算；attempts 为已执行的尝试数（含本次）
    Replan { request: ReplanRequest, attempts: u32 },
    /// 不可重试错误，或重试次数用尽
    Failed { attempts: u32, error: InvocationError },
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RetryExecutor;

impl RetryExecutor {
    /// 执行 op(attempt)，attempt 从 1 开始
    pub async fn execute<T, F, Fut>(
        policy: &QosPolicy,
        retryable: bool,
        cancel: &CancellationToken,
        label: &str,
        mut op: F,
    ) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, InvocationError>>,
    {
        let max_attempts = if retryable { policy.max_attempts.max(1) } else { 1 };
        let mut attempt: u32 = 1;
        let mut prev_delay = Duration::ZERO;

        loop {
            if cancel.is_cancelled() {
                return RetryOutcome::Cancelled;
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return RetryOutcome::Cancelled,
                r = op(attempt) => r,
            };

            let err = match result {
                Ok(value) => return RetryOutcome::Succeeded(value, attempt),
                Err(e) => e,
            };

            let (rate_limited, retry_after) = match classify(&err, retryable) {
                RecoveryAction::Replan => {
                    debug!(action = %label, attempt, "Replan requested");
                    let request = match err {
                        InvocationError::ReplanRequested(request) => request,
                        other => ReplanRequest::new(other.to_string()),
                    };
                    return RetryOutcome::Replan {
                        request,
                        attempts: attempt,
                    };
                }
                RecoveryAction::Cancelled => return RetryOutcome::Cancelled,
                RecoveryAction::Abort => {
                    warn!(action = %label, attempt, error = %err, "Invocation failed, not retrying");
                    return RetryOutcome::Failed {
                        attempts: attempt,
                        error: err,
                    };
                }
                RecoveryAction::Retry {
                    rate_limited,
                    retry_after,
                } => (rate_limited, retry_after),
            };

            if attempt >= max_attempts {
                warn!(
                    action = %label,
                    attempts = attempt,
                    error = %err,
                    "Retry budget exhausted"
                );
                return RetryOutcome::Failed {
                    attempts: attempt,
                    error: err,
                };
            }

            // 抖动后仍保持单调不减，且不超过 backoff_max
            let backoff = policy
                .jittered_delay(attempt)
                .max(prev_delay)
                .min(policy.backoff_max);
            prev_delay = backoff;
            let mut delay = backoff;
            if let Some(hint) = retry_after {
                delay = delay.max(hint);
            }
            if rate_limited {
                warn!(
                    action = %label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited, backing off"
                );
            } else {
                warn!(
                    action = %label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient failure, retrying"
                );
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return RetryOutcome::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}
