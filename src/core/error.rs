//! 错误类型与重规划信号
//!
//! InvocationError 描述单次动作调用的失败（由 recovery::classify 决定重试 / 重规划 / 中止）；
//! ProcessError 是流程终止时暴露给调用方的错误，总是带上源动作名、尝试次数与最后的错误信息。

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::blackboard::Binding;

/// 重规划请求：控制流信号而非错误。updates 会在回到规划前写入黑板
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplanRequest {
    pub reason: String,
    pub updates: Vec<(Binding, serde_json::Value)>,
}

impl ReplanRequest {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            updates: Vec::new(),
        }
    }

    /// 重规划前写入黑板的绑定
    pub fn with_update(mut self, binding: Binding, value: serde_json::Value) -> Self {
        self.updates.push((binding, value));
        self
    }
}

/// 单次动作调用（或工具循环 / 子流程）的失败
#[derive(Error, Debug, Clone)]
pub enum InvocationError {
    #[error("Transient failure: {0}")]
    Retryable(String),

    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        /// 服务端建议的等待时间（如 Retry-After）
        retry_after: Option<Duration>,
    },

    #[error("Permanent failure: {0}")]
    NonRetryable(String),

    #[error("Replan requested: {}", .0.reason)]
    ReplanRequested(ReplanRequest),

    #[error("Tool loop exhausted after {iterations} iterations")]
    ToolLoopExhausted { iterations: usize },

    #[error("Sub-process '{agent}' failed: {message}")]
    SubProcessFailed { agent: String, message: String },

    #[error("Cancelled")]
    Cancelled,
}

impl InvocationError {
    pub fn retryable(msg: impl Into<String>) -> Self {
        Self::Retryable(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::NonRetryable(msg.into())
    }

    pub fn rate_limited(msg: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::RateLimited {
            message: msg.into(),
            retry_after,
        }
    }

    pub fn replan(reason: impl Into<String>) -> Self {
        Self::ReplanRequested(ReplanRequest::new(reason))
    }
}

/// 流程终止错误（FAILED / KILLED 时返回给调用方）
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcessError {
    #[error("Stuck: no applicable action, unmet bindings: {}", format_bindings(unmet))]
    Stuck { unmet: Vec<Binding> },

    #[error("Action '{action}' failed after {attempts} attempt(s): {message}")]
    ActionFailed {
        action: String,
        attempts: u32,
        message: String,
    },

    #[error("Action budget exceeded ({max_actions} actions)")]
    BudgetExceeded { max_actions: usize },

    #[error("Process cancelled")]
    Cancelled,

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

/// 智能体定义 / 平台注册错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Duplicate action name: {0}")]
    DuplicateAction(String),

    #[error("Unknown goal: {0}")]
    UnknownGoal(String),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Agent '{0}' declares no goals")]
    NoGoals(String),
}

fn format_bindings(bindings: &[Binding]) -> String {
    bindings
        .iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
