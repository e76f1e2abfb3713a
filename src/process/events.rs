//! 流程事件与事件汇
//!
//! 每个事件带上所属流程 id、父流程 id、时间戳与（适用时的）动作名，可序列化为 JSON 供外部观察。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

/// 流程事件
#[derive(Debug, Clone, Serialize)]
pub struct ProcessEvent {
    pub process_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// 事件类型
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    ProcessCreated {
        agent: String,
        goal: String,
    },
    ActionStarted {
        /// 已解析的输入变量名
        inputs: Vec<String>,
        max_attempts: u32,
    },
    ActionResult {
        /// succeeded / replanned / failed
        outcome: String,
        attempts: u32,
        duration_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    ToolLoopStarted {
        tool_names: Vec<String>,
        max_iterations: usize,
        interaction_id: String,
    },
    ToolLoopCompleted {
        interaction_id: String,
        total_iterations: usize,
        replan_requested: bool,
        duration_ms: u64,
    },
    ProcessCompleted {
        bindings: Vec<String>,
    },
    ProcessFailed {
        error: String,
    },
    ProcessKilled,
}

impl EventKind {
    /// snake_case 类型名
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::ProcessCreated { .. } => "process_created",
            EventKind::ActionStarted { .. } => "action_started",
            EventKind::ActionResult { .. } => "action_result",
            EventKind::ToolLoopStarted { .. } => "tool_loop_started",
            EventKind::ToolLoopCompleted { .. } => "tool_loop_completed",
            EventKind::ProcessCompleted { .. } => "process_completed",
            EventKind::ProcessFailed { .. } => "process_failed",
            EventKind::ProcessKilled => "process_killed",
        }
    }
}

/// 事件汇（同步回调，不得阻塞）
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: &ProcessEvent);
}

/// 转发到 tokio mpsc 通道；接收端关闭后静默丢弃
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProcessEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<ProcessEvent>) -> Self {
        Self { tx }
    }

    /// 创建 sink 与对应的接收端
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProcessEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn on_event(&self, event: &ProcessEvent) {
        let _ = self.tx.send(event.clone());
    }
}

/// 以结构化日志输出事件
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn on_event(&self, event: &ProcessEvent) {
        let payload = serde_json::to_string(&event.kind).unwrap_or_default();
        tracing::info!(
            process_id = %event.process_id,
            parent_id = event.parent_id.as_deref().unwrap_or("-"),
            action = event.action.as_deref().unwrap_or("-"),
            event = event.kind.name(),
            payload = %payload,
            "process event"
        );
    }
}

/// 广播给多个 sink
#[derive(Clone, Default)]
pub struct MulticastSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl MulticastSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for MulticastSink {
    fn on_event(&self, event: &ProcessEvent) {
        for sink in &self.sinks {
            sink.on_event(event);
        }
    }
}

/// 绑定了流程 / 动作上下文的事件发送器
#[derive(Clone)]
pub struct EventEmitter {
    sink: Arc<dyn EventSink>,
    process_id: String,
    parent_id: Option<String>,
    action: Option<String>,
}

impl EventEmitter {
    pub fn new(sink: Arc<dyn EventSink>, process_id: impl Into<String>, parent_id: Option<String>) -> Self {
        Self {
            sink,
            process_id: process_id.into(),
            parent_id,
            action: None,
        }
    }

    pub fn for_action(&self, action: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            ..self.clone()
        }
    }

    pub fn process_id(&self) -> &str {
        &self.process_id
    }

    pub fn sink(&self) -> Arc<dyn EventSink> {
        Arc::clone(&self.sink)
    }

    pub fn emit(&self, kind: EventKind) {
        let event = ProcessEvent {
            process_id: self.process_id.clone(),
            parent_id: self.parent_id.clone(),
            action: self.action.clone(),
            timestamp: Utc::now(),
            kind,
        };
        self.sink.on_event(&event);
    }
}
