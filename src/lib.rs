//! Hive - Rust 目标驱动智能体流程引擎
//!
//! 模块划分：
//! - **agent**: Agent 平台（部署、按名运行、后台启动与取消）
//! - **blackboard**: 类型化变量绑定与黑板
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类与恢复、流程状态机、取消监管
//! - **llm**: 工具循环的模型边界与 Mock 实现
//! - **model**: 动作、目标、条件、智能体定义
//! - **observability**: 日志初始化
//! - **planner**: 目标链（A*）与效用两种规划器
//! - **process**: 流程状态、事件、执行引擎与动作体
//! - **qos**: 分层重试策略与重试执行器
//! - **tools**: 工具注册、计时执行器与工具循环

pub mod agent;
pub mod blackboard;
pub mod config;
pub mod core;
pub mod llm;
pub mod model;
pub mod observability;
pub mod planner;
pub mod process;
pub mod qos;
pub mod tools;

pub use agent::AgentPlatform;
pub use blackboard::{Binding, Blackboard};
pub use model::{ActionMetadata, AgentDefinition, Goal};
pub use process::{Engine, ProcessResult};
