//! 智能体定义：按声明顺序排列的动作集、目标集与规划策略

use std::collections::HashSet;

use crate::core::ModelError;
use crate::model::{Action, Goal};
use crate::planner::PlannerKind;

/// 一个智能体：动作名在动作集内唯一，规划策略在流程生命周期内固定
#[derive(Debug, Clone)]
pub struct AgentDefinition {
    pub name: String,
    pub description: String,
    pub actions: Vec<Action>,
    pub goals: Vec<Goal>,
    pub strategy: PlannerKind,
}

impl AgentDefinition {
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder {
            name: name.into(),
            description: String::new(),
            actions: Vec::new(),
            goals: Vec::new(),
            strategy: PlannerKind::default(),
        }
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.metadata.name == name)
    }

    pub fn goal(&self, name: &str) -> Option<&Goal> {
        self.goals.iter().find(|g| g.matches_name(name))
    }

    /// 未指定目标时使用第一个声明的目标
    pub fn default_goal(&self) -> Option<&Goal> {
        self.goals.first()
    }

    /// 按名查找目标，None 时退回默认目标
    pub fn resolve_goal(&self, name: Option<&str>) -> Result<&Goal, ModelError> {
        match name {
            Some(n) => self
                .goal(n)
                .ok_or_else(|| ModelError::UnknownGoal(n.to_string())),
            None => self
                .default_goal()
                .ok_or_else(|| ModelError::NoGoals(self.name.clone())),
        }
    }

    pub fn action_names(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.name()).collect()
    }
}

/// AgentDefinition 构建器
pub struct AgentBuilder {
    name: String,
    description: String,
    actions: Vec<Action>,
    goals: Vec<Goal>,
    strategy: PlannerKind,
}

impl AgentBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn goal(mut self, goal: Goal) -> Self {
        self.goals.push(goal);
        self
    }

    pub fn strategy(mut self, strategy: PlannerKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn build(self) -> Result<AgentDefinition, ModelError> {
        let mut seen = HashSet::new();
        for action in &self.actions {
            if !seen.insert(action.metadata.name.clone()) {
                return Err(ModelError::DuplicateAction(action.metadata.name.clone()));
            }
        }
        Ok(AgentDefinition {
            name: self.name,
            description: self.description,
            actions: self.actions,
            goals: self.goals,
            strategy: self.strategy,
        })
    }
}
