//! 工具循环
//!
//! 单次动作调用内的有界迭代：模型选择工具 -> 执行 -> 观察写回对话记录 -> 下一轮，直到最终输出、
//! 迭代上限、重规划信号或取消。无论从哪条路径退出（包括 future 被丢弃），
//! ToolLoopStarted / ToolLoopCompleted 都恰好各发一次。重规划的那一轮不计入迭代数。

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::InvocationError;
use crate::llm::{Message, ModelTurn, ToolLoopModel};
use crate::process::{EventEmitter, EventKind};
use crate::tools::{ToolError, ToolExecutor};

pub const DEFAULT_MAX_ITERATIONS: usize = 20;

/// 观察预览最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;

/// 一次工具循环的输入
#[derive(Debug, Clone)]
pub struct ToolLoopRequest {
    pub system_prompt: Option<String>,
    pub prompt: String,
    pub tool_names: Vec<String>,
    pub max_iterations: usize,
}

impl ToolLoopRequest {
    pub fn new(prompt: impl Into<String>, tool_names: Vec<String>) -> Self {
        Self {
            system_prompt: None,
            prompt: prompt.into(),
            tool_names,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// 单次调用内的循环状态
#[derive(Debug, Clone)]
pub struct ToolLoopState {
    pub iteration: usize,
    pub max_iterations: usize,
    pub interaction_id: String,
    pub tool_names: Vec<String>,
}

/// 循环成功结束的结果
#[derive(Debug, Clone)]
pub struct ToolLoopResult {
    pub output: Value,
    pub iterations: usize,
    pub transcript: Vec<Message>,
}

/// 保证完成事件恰好发送一次：正常返回与被丢弃都经过 Drop
struct CompletionGuard {
    events: EventEmitter,
    state: ToolLoopState,
    started: Instant,
    replan_requested: bool,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.events.emit(EventKind::ToolLoopCompleted {
            interaction_id: self.state.interaction_id.clone(),
            total_iterations: self.state.iteration,
            replan_requested: self.replan_requested,
            duration_ms: self.started.elapsed().as_millis() as u64,
        });
    }
}

/// 工具循环：模型 + 计时工具执行器
#[derive(Clone)]
pub struct ToolLoop {
    model: Arc<dyn ToolLoopModel>,
    executor: ToolExecutor,
}

impl ToolLoop {
    pub fn new(model: Arc<dyn ToolLoopModel>, executor: ToolExecutor) -> Self {
        Self { model, executor }
    }

    pub async fn run(
        &self,
        request: ToolLoopRequest,
        events: &EventEmitter,
        cancel: &CancellationToken,
    ) -> Result<ToolLoopResult, InvocationError> {
        let state = ToolLoopState {
            iteration: 0,
            max_iterations: request.max_iterations,
            interaction_id: Uuid::new_v4().to_string(),
            tool_names: request.tool_names.clone(),
        };
        events.emit(EventKind::ToolLoopStarted {
            tool_names: state.tool_names.clone(),
            max_iterations: state.max_iterations,
            interaction_id: state.interaction_id.clone(),
        });
        let mut guard = CompletionGuard {
            events: events.clone(),
            state,
            started: Instant::now(),
            replan_requested: false,
        };

        let result = self.drive(&request, &mut guard.state, cancel).await;
        guard.replan_requested = matches!(result, Err(InvocationError::ReplanRequested(_)));
        result
    }

    async fn drive(
        &self,
        request: &ToolLoopRequest,
        state: &mut ToolLoopState,
        cancel: &CancellationToken,
    ) -> Result<ToolLoopResult, InvocationError> {
        let tools = self.executor.specs(&state.tool_names);
        let mut transcript = Vec::new();
        if let Some(system) = &request.system_prompt {
            transcript.push(Message::system(system.clone()));
        }
        transcript.push(Message::user(request.prompt.clone()));

        loop {
            if cancel.is_cancelled() {
                return Err(InvocationError::Cancelled);
            }
            if state.iteration >= state.max_iterations {
                warn!(
                    interaction_id = %state.interaction_id,
                    iterations = state.iteration,
                    "Tool loop exhausted"
                );
                return Err(InvocationError::ToolLoopExhausted {
                    iterations: state.iteration,
                });
            }

            let turn = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(InvocationError::Cancelled),
                t = self.model.step(&transcript, &tools) => t?,
            };

            match turn {
                ModelTurn::Final(output) => {
                    state.iteration += 1;
                    debug!(
                        interaction_id = %state.interaction_id,
                        iterations = state.iteration,
                        "Tool loop produced final output"
                    );
                    return Ok(ToolLoopResult {
                        output,
                        iterations: state.iteration,
                        transcript,
                    });
                }
                ModelTurn::Replan(request) => {
                    return Err(InvocationError::ReplanRequested(request));
                }
                ModelTurn::ToolCalls(calls) => {
                    transcript.push(Message::assistant(
                        serde_json::to_string(&calls).unwrap_or_default(),
                    ));
                    for call in calls {
                        let observation = if state.tool_names.iter().any(|t| t == &call.tool) {
                            let result = tokio::select! {
                                biased;
                                _ = cancel.cancelled() => return Err(InvocationError::Cancelled),
                                r = self.executor.execute(&call.tool, call.args.clone()) => r,
                            };
                            match result {
                                Ok(content) => content,
                                Err(ToolError::Replan(request)) => {
                                    return Err(InvocationError::ReplanRequested(request));
                                }
                                Err(ToolError::Failed(e)) => format!("Error: {}", e),
                            }
                        } else {
                            "Error: tool not available".to_string()
                        };
                        debug!(
                            tool = %call.tool,
                            observation = %preview(&observation),
                            "Tool observation"
                        );
                        transcript.push(Message::tool(call.tool, observation));
                    }
                    state.iteration += 1;
                }
            }
        }
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > OBSERVATION_PREVIEW_CHARS {
        format!("{}...", text.chars().take(OBSERVATION_PREVIEW_CHARS).collect::<String>())
    } else {
        text.to_string()
    }
}
