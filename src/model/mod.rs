//! 模型层：动作、目标、智能体定义与条件求值边界

pub mod action;
pub mod agent;
pub mod condition;
pub mod goal;

pub use action::{Action, ActionBody, ActionInputs, ActionMetadata, ActionOutput, FnAction};
pub use agent::{AgentBuilder, AgentDefinition};
pub use condition::{BindingConditions, ChainedEvaluator, ConditionEvaluator, FnEvaluator, Truth};
pub use goal::Goal;
