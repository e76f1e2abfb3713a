//! Mock 模型（用于测试与演示，无需 API）

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::core::InvocationError;
use crate::llm::{Message, ModelTurn, Role, ToolCall, ToolLoopModel, ToolSpec};

/// Echo 模型：第一轮把最后一条 User 消息交给 echo 工具，拿到观察后作为最终输出
#[derive(Debug, Default)]
pub struct MockModel;

#[async_trait]
impl ToolLoopModel for MockModel {
    async fn step(&self, transcript: &[Message], tools: &[ToolSpec]) -> Result<ModelTurn, InvocationError> {
        if let Some(observation) = transcript.iter().rev().find(|m| m.role == Role::Tool) {
            return Ok(ModelTurn::Final(json!(observation.content)));
        }
        let last_user = transcript
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        if tools.iter().any(|t| t.name == "echo") {
            Ok(ModelTurn::ToolCalls(vec![ToolCall::new(
                "echo",
                json!({ "text": format!("Echo from Mock: {}", last_user) }),
            )]))
        } else {
            Ok(ModelTurn::Final(json!(last_user)))
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// 脚本模型：按顺序返回预设结果；脚本用完后重复最后一项
pub struct ScriptedModel {
    turns: Mutex<VecDeque<Result<ModelTurn, InvocationError>>>,
    last: Mutex<Option<Result<ModelTurn, InvocationError>>>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(turns: impl IntoIterator<Item = Result<ModelTurn, InvocationError>>) -> Self {
        Self {
            turns: Mutex::new(turns.into_iter().collect()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// 每轮都返回同一结果
    pub fn repeating(turn: ModelTurn) -> Self {
        Self::new([Ok(turn)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolLoopModel for ScriptedModel {
    async fn step(&self, _transcript: &[Message], _tools: &[ToolSpec]) -> Result<ModelTurn, InvocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .turns
            .lock()
            .map_err(|_| InvocationError::fatal("scripted model lock poisoned"))?
            .pop_front();
        let mut last = self
            .last
            .lock()
            .map_err(|_| InvocationError::fatal("scripted model lock poisoned"))?;
        match next {
            Some(turn) => {
                *last = Some(turn.clone());
                turn
            }
            None => last
                .clone()
                .unwrap_or_else(|| Err(InvocationError::fatal("scripted model has no turns"))),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
