//! 工具层：Tool trait、注册表、计时执行器与有界工具循环

pub mod echo;
pub mod executor;
pub mod loop_;
pub mod registry;

pub use echo::EchoTool;
pub use executor::ToolExecutor;
pub use loop_::{ToolLoop, ToolLoopRequest, ToolLoopResult, ToolLoopState, DEFAULT_MAX_ITERATIONS};
pub use registry::{Tool, ToolError, ToolRegistry};
