//! 核心层：错误分类与恢复、流程状态机、取消监管

pub mod error;
pub mod recovery;
pub mod state;
pub mod supervisor;

pub use error::{InvocationError, ModelError, ProcessError, ReplanRequest};
pub use recovery::{classify, RecoveryAction};
pub use state::ProcessStatus;
pub use supervisor::Supervisor;
