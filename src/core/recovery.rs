//! 失败分类
//!
//! 根据 InvocationError 类型返回 RecoveryAction，供重试执行器决定是重试、重规划、中止还是取消。
//! 所有分类只在这里发生，引擎只看到 成功 / 重规划 / 终止失败 / 取消 四种结果。

use std::time::Duration;

use crate::core::InvocationError;

/// 对一次失败调用建议的处理方式
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// 按退避曲线重试；rate_limited 时单独记录，retry_after 作为最小等待
    Retry {
        rate_limited: bool,
        retry_after: Option<Duration>,
    },
    /// 绕过重试，直接交回引擎重新规划
    Replan,
    /// 不消耗重试预算，立即中止
    Abort,
    /// 已取消
    Cancelled,
}

/// 将调用失败映射为恢复动作；retryable=false 的动作任何失败都直接中止（重规划与取消除外）
pub fn classify(err: &InvocationError, retryable: bool) -> RecoveryAction {
    match err {
        InvocationError::ReplanRequested(_) => RecoveryAction::Replan,
        InvocationError::Cancelled => RecoveryAction::Cancelled,
        InvocationError::NonRetryable(_) => RecoveryAction::Abort,
        _ if !retryable => RecoveryAction::Abort,
        InvocationError::RateLimited { retry_after, .. } => RecoveryAction::Retry {
            rate_limited: true,
            retry_after: *retry_after,
        },
        InvocationError::Retryable(_)
        | InvocationError::ToolLoopExhausted { .. }
        | InvocationError::SubProcessFailed { .. } => RecoveryAction::Retry {
            rate_limited: false,
            retry_after: None,
        },
    }
}
