//! 模型边界
//!
//! 工具循环每轮调用一次 ToolLoopModel::step：模型看到对话记录与可用工具，返回最终输出、一批工具调用或重规划信号。
//! 提示词渲染与具体后端不在本 crate 范围内，由实现方负责。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{InvocationError, ReplanRequest};
use crate::llm::Message;

/// 模型选出的一次工具调用（{"tool": "echo", "args": {...}}）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, args: Value) -> Self {
        Self {
            tool: tool.into(),
            args,
        }
    }
}

/// 提供给模型的工具描述
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// 模型一轮的决定
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    /// 动作的最终输出
    Final(Value),
    /// 需要执行的工具调用
    ToolCalls(Vec<ToolCall>),
    /// 交回引擎重新规划
    Replan(ReplanRequest),
}

/// 工具循环使用的模型
#[async_trait]
pub trait ToolLoopModel: Send + Sync {
    async fn step(&self, transcript: &[Message], tools: &[ToolSpec]) -> Result<ModelTurn, InvocationError>;

    /// 模型名（日志用）
    fn name(&self) -> &str {
        "model"
    }
}
