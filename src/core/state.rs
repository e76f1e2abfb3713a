//! 流程状态机
//!
//! CREATED → RUNNING → {WAITING → RUNNING} → {COMPLETED | FAILED | KILLED}；终态不可再迁移。

use std::fmt;

use serde::{Deserialize, Serialize};

/// AgentProcess 的状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessStatus {
    Created,
    Running,
    /// 嵌套子流程执行中
    Waiting,
    Completed,
    Failed,
    Killed,
}

impl ProcessStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProcessStatus::Completed | ProcessStatus::Failed | ProcessStatus::Killed
        )
    }

    /// 合法迁移表
    pub fn can_transition_to(self, next: ProcessStatus) -> bool {
        use ProcessStatus::*;
        match (self, next) {
            (Created, Running) => true,
            (Created, Killed | Failed) => true,
            (Running, Waiting) => true,
            (Waiting, Running) => true,
            (Running | Waiting, Completed | Failed | Killed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessStatus::Created => "CREATED",
            ProcessStatus::Running => "RUNNING",
            ProcessStatus::Waiting => "WAITING",
            ProcessStatus::Completed => "COMPLETED",
            ProcessStatus::Failed => "FAILED",
            ProcessStatus::Killed => "KILLED",
        };
        f.write_str(s)
    }
}
