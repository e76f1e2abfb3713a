//! 效用规划：对当前合格动作打分（value - cost），取最大者；平局取最早声明的动作

use tracing::debug;

use crate::planner::{eligibility, PlanStep, Planner, PlanningContext, StuckReason};

pub struct UtilityPlanner {
    /// 低于该分数的动作不会被选中
    min_score: f64,
}

impl Default for UtilityPlanner {
    fn default() -> Self {
        Self {
            min_score: f64::NEG_INFINITY,
        }
    }
}

impl UtilityPlanner {
    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }
}

impl Planner for UtilityPlanner {
    fn next(&self, ctx: &PlanningContext<'_>) -> PlanStep {
        if ctx.goal.is_satisfied(ctx.blackboard) {
            return PlanStep::GoalAchieved;
        }

        let mut best_idx: Option<usize> = None;
        let mut best_score = f64::NEG_INFINITY;

        for (idx, action) in ctx.agent.actions.iter().enumerate() {
            if !eligibility(&action.metadata, ctx.blackboard, ctx.evaluator).is_eligible() {
                continue;
            }
            let score = action.metadata.utility();
            let score = if score.is_nan() { f64::NEG_INFINITY } else { score };
            // 严格大于：平局保留先声明者
            if best_idx.is_none() || score > best_score {
                best_score = score;
                best_idx = Some(idx);
            }
        }

        match best_idx {
            Some(idx) if best_score >= self.min_score => {
                let action = ctx.agent.actions[idx].clone();
                debug!(action = %action.name(), score = best_score, "Utility pick");
                PlanStep::NextAction {
                    plan_preview: vec![action.name().to_string()],
                    action,
                }
            }
            _ => PlanStep::NoApplicableAction {
                unmet: ctx.goal.unmet(ctx.blackboard),
                reason: StuckReason::NoEligibleAction,
            },
        }
    }

    fn name(&self) -> &'static str {
        "utility"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::{Binding, Blackboard};
    use crate::model::{ActionMetadata, AgentDefinition, BindingConditions, FnAction, Goal};
    use serde_json::json;

    fn scored(name: &str, output: &str, cost: f64, value: f64) -> crate::model::Action {
        ActionMetadata::new(name)
            .output(Binding::of_type(output))
            .cost(cost)
            .value(value)
            .into_action(FnAction::sync(|_| Ok(json!(1))))
    }

    fn pick(planner: &UtilityPlanner, agent: &AgentDefinition, bb: &Blackboard) -> PlanStep {
        planner.next(&PlanningContext {
            agent,
            goal: agent.default_goal().unwrap(),
            blackboard: bb,
            evaluator: &BindingConditions,
        })
    }

    #[test]
    fn test_argmax_of_value_minus_cost() {
        let agent = AgentDefinition::builder("u")
            .action(scored("low", "X", 1.0, 2.0))
            .action(scored("high", "Y", 1.0, 9.0))
            .action(scored("mid", "Z", 0.0, 4.0))
            .goal(Goal::producing("Done"))
            .build()
            .unwrap();
        let step = pick(&UtilityPlanner::default(), &agent, &Blackboard::new());
        assert_eq!(step.action_name(), Some("high"));
    }

    #[test]
    fn test_tie_goes_to_earliest_declared() {
        let agent = AgentDefinition::builder("u")
            .action(scored("first", "X", 1.0, 3.0))
            .action(scored("second", "Y", 0.0, 2.0))
            .goal(Goal::producing("Done"))
            .build()
            .unwrap();
        let step = pick(&UtilityPlanner::default(), &agent, &Blackboard::new());
        assert_eq!(step.action_name(), Some("first"));
    }

    #[test]
    fn test_ineligible_and_min_score() {
        let agent = AgentDefinition::builder("u")
            .action(scored("only", "X", 5.0, 1.0))
            .goal(Goal::producing("Done"))
            .build()
            .unwrap();
        let mut bb = Blackboard::new();
        let strict = UtilityPlanner::default().with_min_score(0.0);
        assert!(matches!(
            pick(&strict, &agent, &bb),
            PlanStep::NoApplicableAction {
                reason: StuckReason::NoEligibleAction,
                ..
            }
        ));

        assert_eq!(pick(&UtilityPlanner::default(), &agent, &bb).action_name(), Some("only"));
        bb.bind(Binding::of_type("X"), json!(1));
        match pick(&UtilityPlanner::default(), &agent, &bb) {
            PlanStep::NoApplicableAction { unmet, reason } => {
                assert_eq!(reason, StuckReason::NoEligibleAction);
                assert_eq!(unmet, vec![Binding::of_type("Done")]);
            }
            other => panic!("unexpected step: {:?}", other),
        }
    }

    #[test]
    fn test_goal_achieved() {
        let agent = AgentDefinition::builder("u")
            .action(scored("only", "Done", 0.0, 1.0))
            .goal(Goal::producing("Done"))
            .build()
            .unwrap();
        let bb = Blackboard::with_bindings([(Binding::of_type("Done"), json!(true))]);
        assert!(matches!(
            pick(&UtilityPlanner::default(), &agent, &bb),
            PlanStep::GoalAchieved
        ));
    }
}
