//! 动作调用上下文：ActionBody 在一次尝试中能看到的一切

use tokio_util::sync::CancellationToken;

use crate::blackboard::Blackboard;
use crate::core::{ProcessError, ProcessStatus};
use crate::model::ActionInputs;
use crate::process::{Engine, EventEmitter, StatusCell};

pub struct ActionContext {
    pub process_id: String,
    pub parent_id: Option<String>,
    pub agent_name: String,
    pub action_name: String,
    /// 第几次尝试（从 1 开始）
    pub attempt: u32,
    /// 按变量名解析好的输入
    pub inputs: ActionInputs,
    /// 动作元数据声明的可用工具
    pub tool_names: Vec<String>,
    /// 调用开始时的黑板快照（只读）
    pub blackboard: Blackboard,
    pub cancel: CancellationToken,
    pub events: EventEmitter,
    /// 用于嵌套子流程
    pub engine: Engine,
    pub(crate) status: StatusCell,
}

impl ActionContext {
    pub fn input(&self, name: &str) -> Option<&serde_json::Value> {
        self.inputs.get(name)
    }

    pub fn status(&self) -> ProcessStatus {
        self.status.get()
    }

    /// 等待子流程期间父流程进入 WAITING
    pub(crate) fn enter_waiting(&self) -> Result<(), ProcessError> {
        self.status.transition(ProcessStatus::Waiting)
    }

    pub(crate) fn resume_running(&self) -> Result<(), ProcessError> {
        self.status.transition(ProcessStatus::Running)
    }
}
