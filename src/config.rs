//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__ENGINE__MAX_ACTIONS=100`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::planner::goal_chaining::DEFAULT_MAX_EXPANSIONS;
use crate::qos::QosSection;
use crate::tools::loop_::DEFAULT_MAX_ITERATIONS;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineSection,
    pub tool_loop: ToolLoopSection,
    /// [qos] 段：分层重试策略（见 qos::QosResolver）
    pub qos: QosSection,
}

/// [engine] 段：流程动作预算与规划搜索上限
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// 单个流程最多执行的动作记录数，超出则 FAILED(BudgetExceeded)
    #[serde(default = "default_max_actions")]
    pub max_actions: usize,
    /// 目标链规划 A* 最多展开的节点数
    #[serde(default = "default_max_expansions")]
    pub max_expansions: usize,
}

fn default_max_actions() -> usize {
    50
}

fn default_max_expansions() -> usize {
    DEFAULT_MAX_EXPANSIONS
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_actions: default_max_actions(),
            max_expansions: default_max_expansions(),
        }
    }
}

/// [tool_loop] 段：迭代上限与单次工具调用超时
#[derive(Debug, Clone, Deserialize)]
pub struct ToolLoopSection {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_tool_timeout_secs() -> u64 {
    30
}

impl Default for ToolLoopSection {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
