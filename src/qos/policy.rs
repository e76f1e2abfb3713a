//! QoS 策略与分层解析
//!
//! 查找顺序（逐字段）：动作元数据上的覆盖 -> `agent.<a>.method.<x>` -> `agent.<a>.default` -> `default` -> 内置默认值。
//! 键一律小写（config crate 加载时会把键转成小写）。

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::model::ActionMetadata;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BACKOFF_MILLIS: u64 = 10_000;
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 5.0;
pub const DEFAULT_BACKOFF_MAX_MILLIS: u64 = 60_000;

/// 一次调用的重试策略（已解析，所有字段齐全）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QosPolicy {
    pub max_attempts: u32,
    pub backoff_initial: Duration,
    pub backoff_multiplier: f64,
    pub backoff_max: Duration,
    /// 抖动比例，0.1 表示 ±10%
    pub jitter: f64,
}

impl Default for QosPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_initial: Duration::from_millis(DEFAULT_BACKOFF_MILLIS),
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            backoff_max: Duration::from_millis(DEFAULT_BACKOFF_MAX_MILLIS),
            jitter: 0.0,
        }
    }
}

impl QosPolicy {
    /// 只尝试一次
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn new(max_attempts: u32, backoff_initial: Duration, backoff_multiplier: f64) -> Self {
        Self {
            max_attempts,
            backoff_initial,
            backoff_multiplier,
            ..Self::default()
        }
    }

    pub fn with_max(mut self, backoff_max: Duration) -> Self {
        self.backoff_max = backoff_max;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// 第 attempt 次失败后、第 attempt+1 次尝试前的等待：min(initial * multiplier^(attempt-1), max)
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1) as i32;
        let millis = self.backoff_initial.as_millis() as f64 * self.backoff_multiplier.powi(exp);
        let max = self.backoff_max.as_millis() as f64;
        let millis = if millis.is_finite() { millis.min(max) } else { max };
        Duration::from_millis(millis.max(0.0) as u64)
    }

    /// 在 delay 基础上加 ±jitter 比例的随机偏移
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.delay(attempt);
        if self.jitter <= 0.0 || base.is_zero() {
            return base;
        }
        let spread = self.jitter.min(1.0);
        let factor = rand::thread_rng().gen_range(-spread..=spread);
        let millis = base.as_millis() as f64 * (1.0 + factor);
        Duration::from_millis(millis.max(0.0) as u64)
    }
}

/// 部分 QoS 设置（配置层与动作覆盖使用），未设置的字段向下一层查找
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QosSettings {
    pub max_attempts: Option<u32>,
    pub backoff_millis: Option<u64>,
    pub backoff_multiplier: Option<f64>,
    pub backoff_max_interval: Option<u64>,
    pub jitter: Option<f64>,
}

impl QosSettings {
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = Some(n);
        self
    }

    pub fn backoff_millis(mut self, millis: u64) -> Self {
        self.backoff_millis = Some(millis);
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = Some(multiplier);
        self
    }

    pub fn backoff_max_interval(mut self, millis: u64) -> Self {
        self.backoff_max_interval = Some(millis);
        self
    }

    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = Some(jitter);
        self
    }
}

/// [qos] 段：`[qos.default]`、`[qos.agent.<a>.default]`、`[qos.agent.<a>.method.<x>]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QosSection {
    pub default: Option<QosSettings>,
    pub agent: BTreeMap<String, AgentQosSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AgentQosSection {
    pub default: Option<QosSettings>,
    pub method: BTreeMap<String, QosSettings>,
}

/// 分层 QoS 解析器（扁平键表）
#[derive(Debug, Clone, Default)]
pub struct QosResolver {
    entries: HashMap<String, QosSettings>,
}

impl QosResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, settings: QosSettings) -> Self {
        self.insert(key, settings);
        self
    }

    pub fn insert(&mut self, key: &str, settings: QosSettings) {
        self.entries.insert(key.to_lowercase(), settings);
    }

    /// 把嵌套配置段展开成扁平键
    pub fn from_section(section: &QosSection) -> Self {
        let mut resolver = Self::new();
        if let Some(default) = &section.default {
            resolver.insert("default", default.clone());
        }
        for (agent, agent_section) in &section.agent {
            if let Some(default) = &agent_section.default {
                resolver.insert(&format!("agent.{}.default", agent), default.clone());
            }
            for (method, settings) in &agent_section.method {
                resolver.insert(&format!("agent.{}.method.{}", agent, method), settings.clone());
            }
        }
        resolver
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 解析某智能体某动作的最终策略
    pub fn resolve(&self, agent: &str, action: &ActionMetadata) -> QosPolicy {
        let method_key = format!("agent.{}.method.{}", agent, action.name).to_lowercase();
        let agent_key = format!("agent.{}.default", agent).to_lowercase();
        let layers: Vec<&QosSettings> = action
            .qos
            .iter()
            .chain(self.entries.get(&method_key))
            .chain(self.entries.get(&agent_key))
            .chain(self.entries.get("default"))
            .collect();

        let builtin = QosPolicy::default();
        let max_attempts = layers
            .iter()
            .find_map(|l| l.max_attempts)
            .unwrap_or(builtin.max_attempts)
            .max(1);
        let backoff_initial = layers
            .iter()
            .find_map(|l| l.backoff_millis)
            .map(Duration::from_millis)
            .unwrap_or(builtin.backoff_initial);
        let backoff_multiplier = layers
            .iter()
            .find_map(|l| l.backoff_multiplier)
            .unwrap_or(builtin.backoff_multiplier);
        let backoff_max = layers
            .iter()
            .find_map(|l| l.backoff_max_interval)
            .map(Duration::from_millis)
            .unwrap_or(builtin.backoff_max);
        let jitter = layers
            .iter()
            .find_map(|l| l.jitter)
            .unwrap_or(builtin.jitter);

        QosPolicy {
            max_attempts,
            backoff_initial,
            backoff_multiplier,
            backoff_max,
            jitter,
        }
    }
}
