//! 子流程动作：在动作内部为另一个 Agent 的目标运行嵌套流程
//!
//! 子流程在独立任务中运行，只看到父黑板的副本（可限定可见变量），父流程在等待期间处于 WAITING；
//! 只有子目标的主输出绑定回到父流程。子 token 派生自父 token，父调用被丢弃时子流程随之取消。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::core::{InvocationError, ProcessStatus};
use crate::model::{ActionBody, ActionOutput, AgentDefinition};
use crate::process::ActionContext;

pub struct SubProcessAction {
    agent: Arc<AgentDefinition>,
    goal: Option<String>,
    visible: Option<Vec<String>>,
}

impl SubProcessAction {
    /// 运行 agent 的默认目标（第一个声明的目标）
    pub fn new(agent: Arc<AgentDefinition>) -> Self {
        Self {
            agent,
            goal: None,
            visible: None,
        }
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = Some(goal.into());
        self
    }

    /// 仅把这些变量名复制给子流程
    pub fn with_visible<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.visible = Some(names.into_iter().map(Into::into).collect());
        self
    }
}

/// 等待子流程期间父流程保持 WAITING；子流程结束或 future 被丢弃时恢复 RUNNING
struct WaitingGuard<'a> {
    ctx: &'a ActionContext,
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        if self.ctx.status() == ProcessStatus::Waiting && !self.ctx.cancel.is_cancelled() {
            if let Err(e) = self.ctx.resume_running() {
                warn!(
                    process_id = %self.ctx.process_id,
                    error = %e,
                    "Failed to resume parent after sub-process"
                );
            }
        }
    }
}

#[async_trait]
impl ActionBody for SubProcessAction {
    async fn invoke(&self, ctx: &ActionContext) -> Result<ActionOutput, InvocationError> {
        let goal = self
            .agent
            .resolve_goal(self.goal.as_deref())
            .map_err(|e| InvocationError::fatal(e.to_string()))?
            .clone();
        let blackboard = match &self.visible {
            Some(names) => ctx.blackboard.view(names),
            None => ctx.blackboard.fork(),
        };

        ctx.enter_waiting()
            .map_err(|e| InvocationError::fatal(e.to_string()))?;
        let guard = WaitingGuard { ctx };
        debug!(
            process_id = %ctx.process_id,
            agent = %self.agent.name,
            goal = %goal.name,
            visible = blackboard.len(),
            "Starting sub-process"
        );
        let cancel = ctx.cancel.child_token();
        let _cancel_on_drop = cancel.clone().drop_guard();
        let join = ctx.engine.spawn_child(
            Arc::clone(&self.agent),
            goal,
            blackboard,
            ctx.process_id.clone(),
            cancel,
        );
        let result = join
            .await
            .map_err(|e| InvocationError::fatal(format!("Sub-process task failed: {}", e)))?;
        drop(guard);

        info!(
            process_id = %ctx.process_id,
            child_id = %result.process_id,
            status = %result.status,
            "Sub-process finished"
        );
        match result.status {
            ProcessStatus::Completed => Ok(match result.output {
                Some(value) => ActionOutput::value(value),
                None => ActionOutput::none(),
            }),
            ProcessStatus::Killed => Err(InvocationError::Cancelled),
            _ => Err(InvocationError::SubProcessFailed {
                agent: self.agent.name.clone(),
                message: result
                    .error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| result.status.to_string()),
            }),
        }
    }

    fn kind(&self) -> &'static str {
        "sub_process"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::{Binding, Blackboard};
    use crate::model::{ActionMetadata, FnAction, Goal};
    use crate::process::{ChannelSink, Engine, EventKind};
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn child_agent() -> Arc<AgentDefinition> {
        let outline = ActionMetadata::new("outline")
            .input(Binding::of_type("Topic"))
            .output(Binding::of_type("Outline"))
            .into_action(FnAction::sync(|inputs| {
                let topic = inputs.get("topic").and_then(|v| v.as_str()).unwrap_or("?");
                Ok(json!(format!("outline of {}", topic)))
            }));
        let draft = ActionMetadata::new("draft")
            .input(Binding::of_type("Outline"))
            .output(Binding::of_type("Draft"))
            .into_action(FnAction::sync(|_| Ok(json!("draft text"))));
        Arc::new(
            AgentDefinition::builder("writer")
                .action(outline)
                .action(draft)
                .goal(Goal::producing("Draft"))
                .build()
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_parent_receives_only_child_goal_output() {
        let (sink, mut rx) = ChannelSink::channel();
        let engine = Engine::builder().with_sink(Arc::new(sink)).build();
        let delegate = ActionMetadata::new("delegate")
            .input(Binding::of_type("Topic"))
            .output(Binding::of_type("Draft"))
            .into_action(SubProcessAction::new(child_agent()).with_visible(["topic"]));
        let parent = AgentDefinition::builder("editor")
            .action(delegate)
            .goal(Goal::producing("Draft"))
            .build()
            .unwrap();
        let goal = parent.default_goal().unwrap().clone();
        let bb = Blackboard::with_bindings([
            (Binding::of_type("Topic"), json!("rust")),
            (Binding::of_type("Secret"), json!("hidden")),
        ]);

        let result = engine.run(&parent, &goal, bb, CancellationToken::new()).await;
        assert!(result.is_completed());
        assert_eq!(result.output, Some(json!("draft text")));
        assert!(!result.blackboard.contains_name("outline"));
        assert_eq!(result.action_names(), vec!["delegate"]);

        let mut child_ids = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let EventKind::ProcessCreated { agent, .. } = &event.kind {
                if agent == "writer" {
                    assert_eq!(event.parent_id.as_deref(), Some(result.process_id.as_str()));
                    child_ids.push(event.process_id.clone());
                }
            }
        }
        assert_eq!(child_ids.len(), 1);
    }

    #[tokio::test]
    async fn test_hidden_bindings_do_not_reach_child() {
        let peek = ActionMetadata::new("peek")
            .input(Binding::of_type("Secret"))
            .output(Binding::of_type("Leak"))
            .into_action(FnAction::sync(|_| Ok(json!("leaked"))));
        let child = Arc::new(
            AgentDefinition::builder("snoop")
                .action(peek)
                .goal(Goal::producing("Leak"))
                .build()
                .unwrap(),
        );
        let delegate = ActionMetadata::new("delegate")
            .output(Binding::of_type("Leak"))
            .retryable(false)
            .into_action(SubProcessAction::new(child).with_visible(["topic"]));
        let parent = AgentDefinition::builder("guard")
            .action(delegate)
            .goal(Goal::producing("Leak"))
            .build()
            .unwrap();
        let goal = parent.default_goal().unwrap().clone();
        let bb = Blackboard::with_bindings([(Binding::of_type("Secret"), json!("s"))]);

        let result = Engine::builder()
            .build()
            .run(&parent, &goal, bb, CancellationToken::new())
            .await;
        assert_eq!(result.status, ProcessStatus::Failed);
        let message = result.error.map(|e| e.to_string()).unwrap_or_default();
        assert!(message.contains("snoop"), "{}", message);
    }
}
