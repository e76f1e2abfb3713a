//! 流程监管：取消令牌层级
//!
//! 平台持有根 CancellationToken；每个流程拿到子 token，嵌套子流程再从父流程 token 派生，
//! 因此取消父流程会级联到所有子流程，而取消子流程不会影响父流程。

use tokio_util::sync::CancellationToken;

/// 取消令牌层级的根
#[derive(Debug, Clone)]
pub struct Supervisor {
    cancel_token: CancellationToken,
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// 取消全部流程（如进程收到 Ctrl+C）
    pub fn cancel_all(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// 为单个流程创建子 token
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_all_cascades() {
        let supervisor = Supervisor::new();
        let process = supervisor.child_token();
        let nested = process.child_token();
        supervisor.cancel_all();
        assert!(process.is_cancelled());
        assert!(nested.is_cancelled());
    }

    #[test]
    fn test_child_cancel_does_not_reach_parent() {
        let supervisor = Supervisor::new();
        let process = supervisor.child_token();
        let nested = process.child_token();
        nested.cancel();
        assert!(!process.is_cancelled());
        assert!(!supervisor.is_cancelled());
    }
}
