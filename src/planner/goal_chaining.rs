//! 目标链规划：反向相关性 + 正向 A*
//!
//! 反向：从目标中未满足的绑定出发，求产出它们的动作，再求这些动作未满足的输入与前置条件，直到不动点。
//! 正向：在假想状态（已绑定的绑定 + 已断言的条件）上只用相关动作做 A*；
//! g 为累计成本，h 为未满足的目标绑定数；平局依次比较更低成本、更高价值、声明顺序。

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use tracing::debug;

use crate::blackboard::{Binding, Blackboard};
use crate::model::{ActionMetadata, ConditionEvaluator, Goal};
use crate::planner::{eligibility, PlanStep, Planner, PlanningContext, StuckReason};

pub const DEFAULT_MAX_EXPANSIONS: usize = 4096;

/// 假想状态中的事实
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Fact {
    Bound(Binding),
    Holds(String),
}

type State = BTreeSet<Fact>;

pub struct GoalChainingPlanner {
    max_expansions: usize,
}

impl Default for GoalChainingPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EXPANSIONS)
    }
}

impl GoalChainingPlanner {
    pub fn new(max_expansions: usize) -> Self {
        Self { max_expansions }
    }

    /// 反向相关性：返回与目标相关的动作下标（声明顺序）
    fn relevant_actions(
        &self,
        actions: &[&ActionMetadata],
        goal: &Goal,
        blackboard: &Blackboard,
        evaluator: &dyn ConditionEvaluator,
    ) -> Vec<usize> {
        let mut wanted_bindings = goal.unmet(blackboard);
        let mut wanted_conditions: BTreeSet<String> = BTreeSet::new();
        let mut relevant = vec![false; actions.len()];

        loop {
            let mut changed = false;
            for (idx, action) in actions.iter().enumerate() {
                if relevant[idx] {
                    continue;
                }
                let produces_binding = action.output.as_ref().is_some_and(|o| {
                    wanted_bindings.iter().any(|w| binding_covers(o, w))
                        || wanted_conditions.contains(&bound_condition(o))
                });
                let establishes = action
                    .postconditions
                    .iter()
                    .any(|p| wanted_conditions.contains(p));
                if !(produces_binding || establishes) {
                    continue;
                }
                relevant[idx] = true;
                changed = true;
                for input in blackboard.unmet(&action.inputs) {
                    if !wanted_bindings.contains(&input) {
                        wanted_bindings.push(input);
                    }
                }
                for pre in &action.preconditions {
                    if !evaluator.evaluate(pre, blackboard).is_true() {
                        wanted_conditions.insert(pre.clone());
                    }
                }
            }
            if !changed {
                break;
            }
        }

        relevant
            .iter()
            .enumerate()
            .filter_map(|(idx, &r)| r.then_some(idx))
            .collect()
    }

    /// 正向 A*：返回路径上的动作下标
    fn search(
        &self,
        actions: &[&ActionMetadata],
        relevant: &[usize],
        eligible_now: &[bool],
        goal: &Goal,
        start: State,
    ) -> Option<Vec<usize>> {
        #[derive(Debug, Clone)]
        struct OpenNode {
            f: f64,
            g: f64,
            value: f64,
            state: State,
            tie: u64,
        }

        impl Ord for OpenNode {
            fn cmp(&self, other: &Self) -> Ordering {
                // BinaryHeap 为最大堆，这里反转 f / g / tie 使其按最小弹出，value 越大越优先
                other
                    .f
                    .total_cmp(&self.f)
                    .then_with(|| other.g.total_cmp(&self.g))
                    .then_with(|| self.value.total_cmp(&other.value))
                    .then_with(|| other.tie.cmp(&self.tie))
            }
        }

        impl PartialOrd for OpenNode {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl PartialEq for OpenNode {
            fn eq(&self, other: &Self) -> bool {
                self.cmp(other) == Ordering::Equal
            }
        }

        impl Eq for OpenNode {}

        // 单个动作可能一次满足多个要求，估值只取最低单步代价，保证不高估
        let min_cost = relevant
            .iter()
            .map(|&idx| actions[idx].cost)
            .fold(f64::INFINITY, f64::min);
        let step_floor = if min_cost.is_finite() && min_cost > 0.0 {
            min_cost
        } else {
            0.0
        };
        let unmet = |state: &State| goal.required.iter().filter(|r| !covers(state, r)).count();
        let h = |state: &State| -> f64 {
            if unmet(state) == 0 {
                0.0
            } else {
                step_floor
            }
        };

        let mut open = BinaryHeap::<OpenNode>::new();
        let mut tie: u64 = 0;
        let mut best: BTreeMap<State, (f64, f64)> = BTreeMap::new();
        let mut came_from: BTreeMap<State, (State, usize)> = BTreeMap::new();

        best.insert(start.clone(), (0.0, 0.0));
        open.push(OpenNode {
            f: h(&start),
            g: 0.0,
            value: 0.0,
            state: start.clone(),
            tie,
        });
        tie += 1;

        let mut expansions: usize = 0;

        while let Some(node) = open.pop() {
            expansions += 1;
            if expansions > self.max_expansions {
                debug!(expansions, "Goal-chaining search hit expansion cap");
                return None;
            }

            if let Some(&(g, value)) = best.get(&node.state) {
                if node.g != g || node.value != value {
                    continue;
                }
            }

            if unmet(&node.state) == 0 {
                let mut path = Vec::new();
                let mut current = node.state;
                while let Some((prev, idx)) = came_from.get(&current).cloned() {
                    path.push(idx);
                    current = prev;
                }
                path.reverse();
                return Some(path);
            }

            let at_start = node.state == start;
            for &idx in relevant {
                let action = actions[idx];
                if at_start && !eligible_now[idx] {
                    continue;
                }
                if !applicable(action, &node.state) {
                    continue;
                }
                let next = apply(action, &node.state);
                if next == node.state {
                    continue;
                }

                let next_g = node.g + action.cost;
                let next_value = node.value + action.value;
                let improves = match best.get(&next) {
                    None => true,
                    Some(&(g, value)) => next_g < g || (next_g == g && next_value > value),
                };
                if !improves {
                    continue;
                }

                best.insert(next.clone(), (next_g, next_value));
                came_from.insert(next.clone(), (node.state.clone(), idx));
                open.push(OpenNode {
                    f: next_g + h(&next),
                    g: next_g,
                    value: next_value,
                    state: next,
                    tie,
                });
                tie += 1;
            }
        }

        None
    }
}

impl Planner for GoalChainingPlanner {
    fn next(&self, ctx: &PlanningContext<'_>) -> PlanStep {
        if ctx.goal.is_satisfied(ctx.blackboard) {
            return PlanStep::GoalAchieved;
        }

        let actions: Vec<&ActionMetadata> =
            ctx.agent.actions.iter().map(|a| &a.metadata).collect();
        let relevant = self.relevant_actions(&actions, ctx.goal, ctx.blackboard, ctx.evaluator);
        let eligible_now: Vec<bool> = actions
            .iter()
            .map(|a| eligibility(a, ctx.blackboard, ctx.evaluator).is_eligible())
            .collect();
        let start = initial_state(&actions, &relevant, ctx);

        debug!(
            agent = %ctx.agent.name,
            goal = %ctx.goal.name,
            relevant = relevant.len(),
            "Goal-chaining plan"
        );

        match self.search(&actions, &relevant, &eligible_now, ctx.goal, start) {
            Some(path) if !path.is_empty() => {
                let plan_preview = path.iter().map(|&i| actions[i].name.clone()).collect();
                PlanStep::NextAction {
                    action: ctx.agent.actions[path[0]].clone(),
                    plan_preview,
                }
            }
            _ => PlanStep::NoApplicableAction {
                unmet: ctx.goal.unmet(ctx.blackboard),
                reason: StuckReason::Unreachable,
            },
        }
    }

    fn name(&self) -> &'static str {
        "goal_chaining"
    }
}

fn bound_condition(binding: &Binding) -> String {
    format!("bound:{}", binding.name)
}

fn unbound_condition(binding: &Binding) -> String {
    format!("unbound:{}", binding.name)
}

/// produced 的值能否满足 wanted（同名或 wanted 为默认名，且类型兼容）
fn binding_covers(produced: &Binding, wanted: &Binding) -> bool {
    (produced.name == wanted.name || wanted.uses_default_name())
        && wanted.accepts(&produced.type_name)
}

fn covers(state: &State, wanted: &Binding) -> bool {
    state.iter().any(|fact| match fact {
        Fact::Bound(b) => binding_covers(b, wanted),
        Fact::Holds(_) => false,
    })
}

fn applicable(action: &ActionMetadata, state: &State) -> bool {
    action.inputs.iter().all(|i| covers(state, i))
        && action
            .preconditions
            .iter()
            .all(|p| state.contains(&Fact::Holds(p.clone())))
}

fn apply(action: &ActionMetadata, state: &State) -> State {
    let mut next = state.clone();
    if let Some(output) = &action.output {
        if !state.contains(&Fact::Bound(output.clone())) {
            next.insert(Fact::Bound(output.clone()));
            next.insert(Fact::Holds(bound_condition(output)));
            next.remove(&Fact::Holds(unbound_condition(output)));
        }
    }
    for post in &action.postconditions {
        next.insert(Fact::Holds(post.clone()));
    }
    next
}

/// 当前黑板投影到相关绑定与条件上的初始状态
fn initial_state(actions: &[&ActionMetadata], relevant: &[usize], ctx: &PlanningContext<'_>) -> State {
    let mut state = State::new();
    let bindings = ctx.goal.required.iter().chain(relevant.iter().flat_map(|&i| {
        actions[i].inputs.iter().chain(actions[i].output.iter())
    }));
    for binding in bindings {
        if ctx.blackboard.satisfies(binding) {
            state.insert(Fact::Bound(binding.clone()));
        }
    }
    for &i in relevant {
        for expr in actions[i].preconditions.iter().chain(&actions[i].postconditions) {
            if ctx.evaluator.evaluate(expr, ctx.blackboard).is_true() {
                state.insert(Fact::Holds(expr.clone()));
            }
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActionMetadata, AgentDefinition, BindingConditions, FnAction};
    use crate::planner::test_support::produce;
    use serde_json::json;

    fn plan(agent: &AgentDefinition, bb: &Blackboard) -> PlanStep {
        let goal = agent.default_goal().unwrap();
        GoalChainingPlanner::default().next(&PlanningContext {
            agent,
            goal,
            blackboard: bb,
            evaluator: &BindingConditions,
        })
    }

    #[test]
    fn test_chain_produces_in_dependency_order() {
        let agent = AgentDefinition::builder("chain")
            .action(produce("produceB", &["A"], "B"))
            .action(produce("produceA", &[], "A"))
            .goal(Goal::producing("B"))
            .build()
            .unwrap();

        let mut bb = Blackboard::new();
        match plan(&agent, &bb) {
            PlanStep::NextAction {
                action,
                plan_preview,
            } => {
                assert_eq!(action.name(), "produceA");
                assert_eq!(plan_preview, vec!["produceA", "produceB"]);
            }
            other => panic!("unexpected step: {:?}", other),
        }

        bb.bind(Binding::of_type("A"), json!("a"));
        assert_eq!(plan(&agent, &bb).action_name(), Some("produceB"));

        bb.bind(Binding::of_type("B"), json!("b"));
        assert!(matches!(plan(&agent, &bb), PlanStep::GoalAchieved));
        assert!(agent.goals[0].is_satisfied(&bb));
    }

    #[test]
    fn test_unreachable_reports_unmet() {
        let agent = AgentDefinition::builder("gap")
            .action(produce("produceA", &[], "A"))
            .goal(Goal::producing("C"))
            .build()
            .unwrap();
        match plan(&agent, &Blackboard::new()) {
            PlanStep::NoApplicableAction { unmet, reason } => {
                assert_eq!(reason, StuckReason::Unreachable);
                assert_eq!(unmet, vec![Binding::of_type("C")]);
            }
            other => panic!("unexpected step: {:?}", other),
        }
    }

    #[test]
    fn test_irrelevant_action_ignored() {
        let agent = AgentDefinition::builder("focus")
            .action(produce("noise", &[], "Z"))
            .action(produce("produceB", &[], "B"))
            .goal(Goal::producing("B"))
            .build()
            .unwrap();
        assert_eq!(plan(&agent, &Blackboard::new()).action_name(), Some("produceB"));
    }

    #[test]
    fn test_ties_prefer_cost_then_value_then_order() {
        let make = |name: &str, cost: f64, value: f64| {
            ActionMetadata::new(name)
                .output(Binding::of_type("B"))
                .cost(cost)
                .value(value)
                .into_action(FnAction::sync(|_| Ok(json!(1))))
        };

        let cheaper = AgentDefinition::builder("cost")
            .action(make("expensive", 3.0, 0.0))
            .action(make("cheap", 1.0, 0.0))
            .goal(Goal::producing("B"))
            .build()
            .unwrap();
        assert_eq!(plan(&cheaper, &Blackboard::new()).action_name(), Some("cheap"));

        let valuable = AgentDefinition::builder("value")
            .action(make("plain", 1.0, 1.0))
            .action(make("rich", 1.0, 5.0))
            .goal(Goal::producing("B"))
            .build()
            .unwrap();
        assert_eq!(plan(&valuable, &Blackboard::new()).action_name(), Some("rich"));

        let ordered = AgentDefinition::builder("order")
            .action(make("first", 1.0, 1.0))
            .action(make("second", 1.0, 1.0))
            .goal(Goal::producing("B"))
            .build()
            .unwrap();
        assert_eq!(plan(&ordered, &Blackboard::new()).action_name(), Some("first"));
    }

    #[test]
    fn test_prefers_cheaper_longer_chain() {
        let make = |name: &str, inputs: &[&str], cost: f64| {
            let mut meta = ActionMetadata::new(name).output(Binding::of_type("B")).cost(cost);
            for input in inputs {
                meta = meta.input(Binding::of_type(*input));
            }
            meta.into_action(FnAction::sync(|_| Ok(json!(1))))
        };
        let make_a = ActionMetadata::new("makeA")
            .output(Binding::of_type("A"))
            .cost(0.1)
            .into_action(FnAction::sync(|_| Ok(json!(1))));
        let agent = AgentDefinition::builder("cheap_chain")
            .action(make("expensiveB", &[], 0.5))
            .action(make_a)
            .action(make("cheapB", &["A"], 0.1))
            .goal(Goal::producing("B"))
            .build()
            .unwrap();
        match plan(&agent, &Blackboard::new()) {
            PlanStep::NextAction { plan_preview, .. } => {
                assert_eq!(plan_preview, vec!["makeA", "cheapB"]);
            }
            other => panic!("unexpected step: {:?}", other),
        }
    }

    #[test]
    fn test_postcondition_establishes_precondition() {
        let approve = ActionMetadata::new("approve")
            .postcondition("approved")
            .into_action(FnAction::sync(|_| Ok(json!(null))));
        let publish = ActionMetadata::new("publish")
            .precondition("approved")
            .output(Binding::of_type("Published"))
            .into_action(FnAction::sync(|_| Ok(json!(true))));
        let agent = AgentDefinition::builder("gate")
            .action(publish)
            .action(approve)
            .goal(Goal::producing("Published"))
            .build()
            .unwrap();
        match plan(&agent, &Blackboard::new()) {
            PlanStep::NextAction { plan_preview, .. } => {
                assert_eq!(plan_preview, vec!["approve", "publish"]);
            }
            other => panic!("unexpected step: {:?}", other),
        }
    }

    #[test]
    fn test_bound_precondition_chains_through_output() {
        let fetch = produce("fetch", &[], "Source");
        let summarize = ActionMetadata::new("summarize")
            .precondition("bound:source")
            .output(Binding::of_type("Summary"))
            .into_action(FnAction::sync(|_| Ok(json!("s"))));
        let agent = AgentDefinition::builder("bound")
            .action(summarize)
            .action(fetch)
            .goal(Goal::producing("Summary"))
            .build()
            .unwrap();
        assert_eq!(plan(&agent, &Blackboard::new()).action_name(), Some("fetch"));
    }

    #[test]
    fn test_expansion_cap() {
        let agent = AgentDefinition::builder("cap")
            .action(produce("produceA", &[], "A"))
            .goal(Goal::producing("A"))
            .build()
            .unwrap();
        let goal = agent.default_goal().unwrap();
        let step = GoalChainingPlanner::new(0).next(&PlanningContext {
            agent: &agent,
            goal,
            blackboard: &Blackboard::new(),
            evaluator: &BindingConditions,
        });
        assert!(matches!(
            step,
            PlanStep::NoApplicableAction {
                reason: StuckReason::Unreachable,
                ..
            }
        ));
    }
}
