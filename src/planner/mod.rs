//! 规划层：每一步根据黑板重新推导下一个动作
//!
//! 两种策略共享同一资格判断（eligibility）：输入已满足、前置条件为 True、且执行后会改变状态。
//! GoalChaining 先反向求相关动作集再正向 A* 搜索；Utility 对当前合格动作按 value - cost 打分取最大。

pub mod goal_chaining;
pub mod utility;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::blackboard::{Binding, Blackboard};
use crate::model::{Action, ActionMetadata, AgentDefinition, ConditionEvaluator, Goal, Truth};

pub use goal_chaining::GoalChainingPlanner;
pub use utility::UtilityPlanner;

/// 规划输入（只读借用）
pub struct PlanningContext<'a> {
    pub agent: &'a AgentDefinition,
    pub goal: &'a Goal,
    pub blackboard: &'a Blackboard,
    pub evaluator: &'a dyn ConditionEvaluator,
}

/// 无可用动作的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StuckReason {
    /// 搜索不到通往目标的路径
    Unreachable,
    /// 当前没有任何合格动作
    NoEligibleAction,
}

/// 规划结果
#[derive(Debug, Clone)]
pub enum PlanStep {
    NextAction {
        action: Action,
        /// 预计的后续动作名（含本步）
        plan_preview: Vec<String>,
    },
    GoalAchieved,
    NoApplicableAction {
        unmet: Vec<Binding>,
        reason: StuckReason,
    },
}

impl PlanStep {
    pub fn action_name(&self) -> Option<&str> {
        match self {
            PlanStep::NextAction { action, .. } => Some(action.name()),
            _ => None,
        }
    }
}

/// 规划器：纯函数式，不修改黑板
pub trait Planner: Send + Sync {
    fn next(&self, ctx: &PlanningContext<'_>) -> PlanStep;

    fn name(&self) -> &'static str;
}

/// 规划策略，按智能体固定
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannerKind {
    #[default]
    GoalChaining,
    Utility,
}

/// 按策略构造规划器
pub fn planner_for(kind: PlannerKind, max_expansions: usize) -> Arc<dyn Planner> {
    match kind {
        PlannerKind::GoalChaining => Arc::new(GoalChainingPlanner::new(max_expansions)),
        PlannerKind::Utility => Arc::new(UtilityPlanner::default()),
    }
}

/// 资格判断结果（诊断用，不是错误）
#[derive(Debug, Clone, PartialEq)]
pub enum Eligibility {
    Eligible,
    MissingInputs(Vec<Binding>),
    PreconditionUnsatisfied { expression: String, truth: Truth },
    /// 输出已绑定且后置条件均已成立
    NoEffect,
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

pub fn eligibility(
    action: &ActionMetadata,
    blackboard: &Blackboard,
    evaluator: &dyn ConditionEvaluator,
) -> Eligibility {
    let missing = blackboard.unmet(&action.inputs);
    if !missing.is_empty() {
        return Eligibility::MissingInputs(missing);
    }
    for expression in &action.preconditions {
        let truth = evaluator.evaluate(expression, blackboard);
        if !truth.is_true() {
            return Eligibility::PreconditionUnsatisfied {
                expression: expression.clone(),
                truth,
            };
        }
    }
    if !would_change_state(action, blackboard, evaluator) {
        return Eligibility::NoEffect;
    }
    Eligibility::Eligible
}

/// 输出尚未绑定，或存在尚未成立的后置条件
pub fn would_change_state(
    action: &ActionMetadata,
    blackboard: &Blackboard,
    evaluator: &dyn ConditionEvaluator,
) -> bool {
    let output_pending = action
        .output
        .as_ref()
        .is_some_and(|o| !blackboard.satisfies(o));
    output_pending
        || action
            .postconditions
            .iter()
            .any(|p| !evaluator.evaluate(p, blackboard).is_true())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BindingConditions;
    use serde_json::json;

    #[test]
    fn test_eligibility_diagnostics() {
        let eval = BindingConditions;
        let meta = ActionMetadata::new("review")
            .input(Binding::of_type("Draft"))
            .precondition("approved")
            .output(Binding::of_type("Review"));
        let mut bb = Blackboard::new();
        assert!(matches!(
            eligibility(&meta, &bb, &eval),
            Eligibility::MissingInputs(ref m) if m == &vec![Binding::of_type("Draft")]
        ));

        bb.bind(Binding::of_type("Draft"), json!("d"));
        assert_eq!(
            eligibility(&meta, &bb, &eval),
            Eligibility::PreconditionUnsatisfied {
                expression: "approved".to_string(),
                truth: Truth::Indeterminate,
            }
        );
    }

    #[test]
    fn test_no_effect_when_output_bound() {
        let eval = BindingConditions;
        let meta = ActionMetadata::new("draft").output(Binding::of_type("Draft"));
        let mut bb = Blackboard::new();
        assert!(eligibility(&meta, &bb, &eval).is_eligible());
        bb.bind(Binding::of_type("Draft"), json!("d"));
        assert_eq!(eligibility(&meta, &bb, &eval), Eligibility::NoEffect);

        let with_post = meta.postcondition("bound:published");
        assert!(eligibility(&with_post, &bb, &eval).is_eligible());
    }

    #[test]
    fn test_planner_for_kind() {
        assert_eq!(planner_for(PlannerKind::GoalChaining, 16).name(), "goal_chaining");
        assert_eq!(planner_for(PlannerKind::Utility, 16).name(), "utility");
    }
}
