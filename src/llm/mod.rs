//! LLM 层：工具循环的模型边界与 Mock 实现

pub mod message;
pub mod mock;
pub mod traits;

pub use message::{Message, Role};
pub use mock::{MockModel, ScriptedModel};
pub use traits::{ModelTurn, ToolCall, ToolLoopModel, ToolSpec};
