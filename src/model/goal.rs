//! 目标：一组必须出现在黑板上的绑定

use serde::Serialize;

use crate::blackboard::{default_variable_name, Binding, Blackboard};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Goal {
    pub name: String,
    pub description: String,
    pub required: Vec<Binding>,
}

impl Goal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            required: Vec::new(),
        }
    }

    /// 以期望的输出类型声明目标，如 `Goal::producing("Story")`
    pub fn producing(type_name: impl Into<String>) -> Self {
        let binding = Binding::of_type(type_name);
        Self::new(binding.name.clone()).require(binding)
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn require(mut self, binding: Binding) -> Self {
        if !self.required.contains(&binding) {
            self.required.push(binding);
        }
        self
    }

    pub fn is_satisfied(&self, blackboard: &Blackboard) -> bool {
        self.required.iter().all(|b| blackboard.satisfies(b))
    }

    pub fn unmet(&self, blackboard: &Blackboard) -> Vec<Binding> {
        blackboard.unmet(&self.required)
    }

    /// 子流程向父流程交回的绑定：第一个必需绑定
    pub fn primary_output(&self) -> Option<&Binding> {
        self.required.first()
    }

    /// 目标名与默认变量名比较时不区分模块前缀
    pub fn matches_name(&self, name: &str) -> bool {
        self.name == name || self.name == default_variable_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_producing_goal() {
        let goal = Goal::producing("story.Story");
        assert_eq!(goal.name, "story");
        assert_eq!(goal.required, vec![Binding::of_type("story.Story")]);
        assert!(goal.matches_name("story.Story"));
    }

    #[test]
    fn test_satisfaction() {
        let goal = Goal::new("both")
            .require(Binding::of_type("A"))
            .require(Binding::of_type("B"));
        let mut bb = Blackboard::new();
        bb.bind(Binding::of_type("A"), json!(1));
        assert!(!goal.is_satisfied(&bb));
        assert_eq!(goal.unmet(&bb), vec![Binding::of_type("B")]);
        bb.bind(Binding::of_type("B"), json!(2));
        assert!(goal.is_satisfied(&bb));
    }
}
