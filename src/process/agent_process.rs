//! AgentProcess：一次目标执行的可变状态（黑板、状态、历史），只由引擎修改
//!
//! 状态通过 tokio watch 通道发布，ProcessHandle 持有接收端用于观察与取消。

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::blackboard::{Binding, Blackboard};
use crate::core::{ProcessError, ProcessStatus};
use crate::model::Goal;

/// 单条执行记录的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
    Succeeded,
    Replanned { reason: String },
    Failed { error: String },
}

/// 执行历史条目，按实际调用顺序追加，永不删除
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRecord {
    pub seq: usize,
    pub action: String,
    pub outcome: RecordOutcome,
    pub attempts: u32,
    pub duration_ms: u64,
    /// 本次写入黑板的输出绑定（可空输出返回空时为 None）
    pub output: Option<Binding>,
}

/// 状态单元：校验迁移后经 watch 通道发布
#[derive(Clone)]
pub struct StatusCell {
    tx: Arc<watch::Sender<ProcessStatus>>,
}

impl StatusCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ProcessStatus::Created);
        Self { tx: Arc::new(tx) }
    }

    pub fn get(&self) -> ProcessStatus {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProcessStatus> {
        self.tx.subscribe()
    }

    /// 非法迁移返回 InvalidTransition，状态保持不变
    pub fn transition(&self, next: ProcessStatus) -> Result<(), ProcessError> {
        let current = self.get();
        if !current.can_transition_to(next) {
            return Err(ProcessError::InvalidTransition {
                from: current.to_string(),
                to: next.to_string(),
            });
        }
        self.tx.send_replace(next);
        Ok(())
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}

/// 一次运行中的流程
pub struct AgentProcess {
    pub id: String,
    pub parent_id: Option<String>,
    pub agent: String,
    pub goal: Goal,
    pub blackboard: Blackboard,
    pub status: StatusCell,
    pub history: Vec<ExecutionRecord>,
    pub started_at: DateTime<Utc>,
}

impl AgentProcess {
    pub fn new(
        id: String,
        parent_id: Option<String>,
        agent: impl Into<String>,
        goal: Goal,
        blackboard: Blackboard,
        status: StatusCell,
    ) -> Self {
        Self {
            id,
            parent_id,
            agent: agent.into(),
            goal,
            blackboard,
            status,
            history: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn record(
        &mut self,
        action: &str,
        outcome: RecordOutcome,
        attempts: u32,
        duration_ms: u64,
        output: Option<Binding>,
    ) {
        let seq = self.history.len();
        self.history.push(ExecutionRecord {
            seq,
            action: action.to_string(),
            outcome,
            attempts,
            duration_ms,
            output,
        });
    }

    /// 转为终态结果；Completed 时带上目标绑定
    pub fn into_result(self, error: Option<ProcessError>) -> ProcessResult {
        let status = self.status.get();
        let (bindings, output) = if status == ProcessStatus::Completed {
            let bindings = self.blackboard.collect(&self.goal.required);
            let output = self
                .goal
                .primary_output()
                .and_then(|b| self.blackboard.resolve(b))
                .map(|e| e.value.clone());
            (bindings, output)
        } else {
            (BTreeMap::new(), None)
        };
        ProcessResult {
            process_id: self.id,
            parent_id: self.parent_id,
            agent: self.agent,
            goal: self.goal.name,
            status,
            bindings,
            output,
            error,
            history: self.history,
            blackboard: self.blackboard,
        }
    }
}

/// 流程终态结果
#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub process_id: String,
    pub parent_id: Option<String>,
    pub agent: String,
    pub goal: String,
    pub status: ProcessStatus,
    /// 目标绑定（仅 COMPLETED）
    pub bindings: BTreeMap<String, Value>,
    /// 目标第一个必需绑定的值（仅 COMPLETED）
    pub output: Option<Value>,
    pub error: Option<ProcessError>,
    pub history: Vec<ExecutionRecord>,
    /// 最终黑板
    pub blackboard: Blackboard,
}

impl ProcessResult {
    pub fn is_completed(&self) -> bool {
        self.status == ProcessStatus::Completed
    }

    pub fn action_names(&self) -> Vec<&str> {
        self.history.iter().map(|r| r.action.as_str()).collect()
    }

    pub fn into_bindings(self) -> Result<BTreeMap<String, Value>, ProcessError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.bindings),
        }
    }
}

/// 运行中流程的外部句柄：观察状态、请求取消
#[derive(Clone)]
pub struct ProcessHandle {
    pub id: String,
    cancel: CancellationToken,
    status: watch::Receiver<ProcessStatus>,
}

impl ProcessHandle {
    pub fn new(id: String, cancel: CancellationToken, status: watch::Receiver<ProcessStatus>) -> Self {
        Self { id, cancel, status }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn status(&self) -> ProcessStatus {
        *self.status.borrow()
    }

    /// 等待进入给定状态（或任一终态）
    pub async fn wait_for(&mut self, target: ProcessStatus) -> ProcessStatus {
        loop {
            let current = *self.status.borrow_and_update();
            if current == target || current.is_terminal() {
                return current;
            }
            if self.status.changed().await.is_err() {
                return *self.status.borrow();
            }
        }
    }

    pub async fn wait_for_terminal(&mut self) -> ProcessStatus {
        loop {
            let current = *self.status.borrow_and_update();
            if current.is_terminal() {
                return current;
            }
            if self.status.changed().await.is_err() {
                return *self.status.borrow();
            }
        }
    }
}
