//! 流程层：AgentProcess 状态与历史、事件、执行引擎，以及工具循环 / 子流程 / 远程三种动作体

pub mod agent_process;
pub mod context;
pub mod engine;
pub mod events;
pub mod remote;
pub mod subprocess;
pub mod tool_action;

pub use agent_process::{
    AgentProcess, ExecutionRecord, ProcessHandle, ProcessResult, RecordOutcome, StatusCell,
};
pub use context::ActionContext;
pub use engine::{Engine, EngineBuilder};
pub use events::{
    ChannelSink, EventEmitter, EventKind, EventSink, MulticastSink, ProcessEvent,
    TracingSink,
};
pub use remote::RemoteAction;
pub use subprocess::SubProcessAction;
pub use tool_action::ToolLoopAction;
