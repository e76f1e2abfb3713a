//! 条件求值边界
//!
//! 引擎与规划器从不解释表达式语法，只使用三态结果；Indeterminate 在资格判断中按 false 处理，
//! 但在诊断中单独报告，以区分「条件为假」与「数据不足」。

use std::sync::Arc;

use serde::Serialize;

use crate::blackboard::Blackboard;

/// 三态求值结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Truth {
    True,
    False,
    Indeterminate,
}

impl Truth {
    pub fn is_true(self) -> bool {
        self == Truth::True
    }
}

impl From<bool> for Truth {
    fn from(value: bool) -> Self {
        if value {
            Truth::True
        } else {
            Truth::False
        }
    }
}

/// 前置 / 后置条件求值器（规则引擎等外部后端实现此 trait）
pub trait ConditionEvaluator: Send + Sync {
    fn evaluate(&self, expression: &str, blackboard: &Blackboard) -> Truth;
}

/// 内置条件：`true`、`false`、`bound:<name>`、`unbound:<name>`，其余返回 Indeterminate
#[derive(Debug, Default, Clone, Copy)]
pub struct BindingConditions;

impl ConditionEvaluator for BindingConditions {
    fn evaluate(&self, expression: &str, blackboard: &Blackboard) -> Truth {
        let expr = expression.trim();
        match expr {
            "true" => return Truth::True,
            "false" => return Truth::False,
            _ => {}
        }
        if let Some(name) = expr.strip_prefix("bound:") {
            return blackboard.contains_name(name.trim()).into();
        }
        if let Some(name) = expr.strip_prefix("unbound:") {
            return (!blackboard.contains_name(name.trim())).into();
        }
        Truth::Indeterminate
    }
}

/// 闭包适配器
pub struct FnEvaluator<F>(pub F);

impl<F> ConditionEvaluator for FnEvaluator<F>
where
    F: Fn(&str, &Blackboard) -> Truth + Send + Sync,
{
    fn evaluate(&self, expression: &str, blackboard: &Blackboard) -> Truth {
        (self.0)(expression, blackboard)
    }
}

/// 依次询问多个求值器，第一个非 Indeterminate 的结果胜出
#[derive(Clone, Default)]
pub struct ChainedEvaluator {
    evaluators: Vec<Arc<dyn ConditionEvaluator>>,
}

impl ChainedEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, evaluator: Arc<dyn ConditionEvaluator>) -> Self {
        self.evaluators.push(evaluator);
        self
    }
}

impl ConditionEvaluator for ChainedEvaluator {
    fn evaluate(&self, expression: &str, blackboard: &Blackboard) -> Truth {
        self.evaluators
            .iter()
            .map(|e| e.evaluate(expression, blackboard))
            .find(|t| *t != Truth::Indeterminate)
            .unwrap_or(Truth::Indeterminate)
    }
}
