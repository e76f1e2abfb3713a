//! 流程执行引擎
//!
//! 循环：取消检查 -> 规划 -> 动作预算检查 -> 解析输入与 QoS -> 经 RetryExecutor 调用 -> 写回黑板 -> 再规划，
//! 直到目标达成（COMPLETED）、无可用动作或动作失败（FAILED）、被取消（KILLED）。
//! 引擎是唯一修改黑板与状态的地方；Engine 可廉价克隆，内部共享配置。

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::blackboard::Blackboard;
use crate::config::{AppConfig, EngineSection};
use crate::core::{ProcessError, ProcessStatus};
use crate::model::{Action, ActionInputs, AgentDefinition, BindingConditions, ConditionEvaluator, Goal};
use crate::planner::{planner_for, PlanStep, PlanningContext};
use crate::process::{
    ActionContext, AgentProcess, EventEmitter, EventKind, EventSink, ProcessHandle, ProcessResult,
    RecordOutcome, StatusCell, TracingSink,
};
use crate::qos::{QosResolver, RetryExecutor, RetryOutcome};

/// 单个动作执行后的去向
enum StepResult {
    Continue,
    Failed(ProcessError),
    Cancelled,
}

struct EngineInner {
    config: EngineSection,
    evaluator: Arc<dyn ConditionEvaluator>,
    qos: QosResolver,
    sink: Arc<dyn EventSink>,
}

/// 执行引擎（克隆共享同一配置）
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// 按配置构建：[engine] 段与 [qos] 层级，条件求值用内置 BindingConditions，事件写日志
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::builder()
            .with_config(cfg.engine.clone())
            .with_qos(QosResolver::from_section(&cfg.qos))
            .build()
    }

    pub fn config(&self) -> &EngineSection {
        &self.inner.config
    }

    pub fn sink(&self) -> Arc<dyn EventSink> {
        Arc::clone(&self.inner.sink)
    }

    pub fn evaluator(&self) -> Arc<dyn ConditionEvaluator> {
        Arc::clone(&self.inner.evaluator)
    }

    /// 运行一个顶层流程直到终态
    pub async fn run(
        &self,
        agent: &AgentDefinition,
        goal: &Goal,
        blackboard: Blackboard,
        cancel: CancellationToken,
    ) -> ProcessResult {
        let id = Uuid::new_v4().to_string();
        self.run_process(agent, goal, blackboard, id, None, cancel, StatusCell::new())
            .await
    }

    /// 在后台任务中运行，返回可观察 / 可取消的句柄
    pub fn start(
        &self,
        agent: Arc<AgentDefinition>,
        goal: Goal,
        blackboard: Blackboard,
        cancel: CancellationToken,
    ) -> (ProcessHandle, JoinHandle<ProcessResult>) {
        let id = Uuid::new_v4().to_string();
        let status = StatusCell::new();
        let handle = ProcessHandle::new(id.clone(), cancel.clone(), status.subscribe());
        let engine = self.clone();
        let join = tokio::spawn(async move {
            engine
                .run_process(&agent, &goal, blackboard, id, None, cancel, status)
                .await
        });
        (handle, join)
    }

    /// 在独立任务中运行 parent_id 的子流程；cancel 应派生自父流程的 token
    pub fn spawn_child(
        &self,
        agent: Arc<AgentDefinition>,
        goal: Goal,
        blackboard: Blackboard,
        parent_id: String,
        cancel: CancellationToken,
    ) -> JoinHandle<ProcessResult> {
        let id = Uuid::new_v4().to_string();
        let engine = self.clone();
        tokio::spawn(async move {
            engine
                .run_process(&agent, &goal, blackboard, id, Some(parent_id), cancel, StatusCell::new())
                .await
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_process(
        &self,
        agent: &AgentDefinition,
        goal: &Goal,
        blackboard: Blackboard,
        id: String,
        parent_id: Option<String>,
        cancel: CancellationToken,
        status: StatusCell,
    ) -> ProcessResult {
        let events = EventEmitter::new(self.sink(), id.clone(), parent_id.clone());
        let mut process = AgentProcess::new(id, parent_id, &agent.name, goal.clone(), blackboard, status);
        events.emit(EventKind::ProcessCreated {
            agent: agent.name.clone(),
            goal: goal.name.clone(),
        });
        info!(
            process_id = %process.id,
            agent = %agent.name,
            goal = %goal.name,
            "Process created"
        );

        if cancel.is_cancelled() {
            return self.finish(process, &events, ProcessStatus::Killed, Some(ProcessError::Cancelled));
        }
        if let Err(e) = process.status.transition(ProcessStatus::Running) {
            return self.finish(process, &events, ProcessStatus::Failed, Some(e));
        }

        let planner = planner_for(agent.strategy, self.inner.config.max_expansions);
        let max_actions = self.inner.config.max_actions;

        loop {
            if cancel.is_cancelled() {
                return self.finish(process, &events, ProcessStatus::Killed, Some(ProcessError::Cancelled));
            }

            let step = planner.next(&PlanningContext {
                agent,
                goal,
                blackboard: &process.blackboard,
                evaluator: self.inner.evaluator.as_ref(),
            });

            let action = match step {
                PlanStep::GoalAchieved => {
                    return self.finish(process, &events, ProcessStatus::Completed, None);
                }
                PlanStep::NoApplicableAction { unmet, reason } => {
                    warn!(
                        process_id = %process.id,
                        reason = ?reason,
                        unmet = ?unmet,
                        "No applicable action"
                    );
                    return self.finish(
                        process,
                        &events,
                        ProcessStatus::Failed,
                        Some(ProcessError::Stuck { unmet }),
                    );
                }
                PlanStep::NextAction {
                    action,
                    plan_preview,
                } => {
                    debug!(
                        process_id = %process.id,
                        planner = planner.name(),
                        action = %action.name(),
                        plan = ?plan_preview,
                        "Next action"
                    );
                    action
                }
            };

            if process.history.len() >= max_actions {
                return self.finish(
                    process,
                    &events,
                    ProcessStatus::Failed,
                    Some(ProcessError::BudgetExceeded { max_actions }),
                );
            }

            match self
                .execute_action(&mut process, agent, &action, &events, &cancel)
                .await
            {
                StepResult::Continue => {}
                StepResult::Failed(err) => {
                    return self.finish(process, &events, ProcessStatus::Failed, Some(err));
                }
                StepResult::Cancelled => {
                    return self.finish(process, &events, ProcessStatus::Killed, Some(ProcessError::Cancelled));
                }
            }
        }
    }

    async fn execute_action(
        &self,
        process: &mut AgentProcess,
        agent: &AgentDefinition,
        action: &Action,
        events: &EventEmitter,
        cancel: &CancellationToken,
    ) -> StepResult {
        let meta = &action.metadata;
        let inputs: ActionInputs = meta
            .inputs
            .iter()
            .filter_map(|b| {
                process
                    .blackboard
                    .resolve(b)
                    .map(|e| (b.name.clone(), e.value.clone()))
            })
            .collect();
        let policy = self.inner.qos.resolve(&agent.name, meta);
        let action_events = events.for_action(&meta.name);
        action_events.emit(EventKind::ActionStarted {
            inputs: inputs.keys().cloned().collect(),
            max_attempts: policy.max_attempts,
        });

        let started = Instant::now();
        let snapshot = process.blackboard.clone();
        let outcome = {
            let process: &AgentProcess = process;
            RetryExecutor::execute(&policy, meta.retryable, cancel, &meta.name, |attempt| {
                let ctx = ActionContext {
                    process_id: process.id.clone(),
                    parent_id: process.parent_id.clone(),
                    agent_name: agent.name.clone(),
                    action_name: meta.name.clone(),
                    attempt,
                    inputs: inputs.clone(),
                    tool_names: meta.tool_names.clone(),
                    blackboard: snapshot.clone(),
                    cancel: cancel.clone(),
                    events: action_events.clone(),
                    engine: self.clone(),
                    status: process.status.clone(),
                };
                let body = Arc::clone(&action.body);
                async move { body.invoke(&ctx).await }
            })
            .await
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            RetryOutcome::Succeeded(output, attempts) => {
                let bound = match (meta.output.as_ref(), output.value) {
                    (Some(binding), Some(value)) => {
                        process.blackboard.bind(binding.clone(), value);
                        Some(binding.clone())
                    }
                    (Some(binding), None) => {
                        debug!(action = %meta.name, binding = %binding, "Nullable output came back empty");
                        None
                    }
                    (None, Some(_)) => {
                        debug!(action = %meta.name, "Action returned a value but declares no output");
                        None
                    }
                    (None, None) => None,
                };
                for (binding, value) in output.extra {
                    process.blackboard.bind(binding, value);
                }
                process.record(&meta.name, RecordOutcome::Succeeded, attempts, duration_ms, bound);
                action_events.emit(EventKind::ActionResult {
                    outcome: "succeeded".to_string(),
                    attempts,
                    duration_ms,
                    detail: None,
                });

                for post in &meta.postconditions {
                    let truth = self.inner.evaluator.evaluate(post, &process.blackboard);
                    if !truth.is_true() {
                        debug!(
                            action = %meta.name,
                            postcondition = %post,
                            truth = ?truth,
                            "Postcondition does not hold after execution"
                        );
                    }
                }
                info!(
                    process_id = %process.id,
                    action = %meta.name,
                    attempts,
                    duration_ms,
                    "Action succeeded"
                );
                StepResult::Continue
            }
            RetryOutcome::Replan { request, attempts } => {
                for (binding, value) in request.updates {
                    process.blackboard.bind(binding, value);
                }
                info!(
                    process_id = %process.id,
                    action = %meta.name,
                    reason = %request.reason,
                    "Replanning"
                );
                action_events.emit(EventKind::ActionResult {
                    outcome: "replanned".to_string(),
                    attempts,
                    duration_ms,
                    detail: Some(request.reason.clone()),
                });
                process.record(
                    &meta.name,
                    RecordOutcome::Replanned {
                        reason: request.reason,
                    },
                    attempts,
                    duration_ms,
                    None,
                );
                StepResult::Continue
            }
            RetryOutcome::Failed { attempts, error } => {
                let message = error.to_string();
                process.record(
                    &meta.name,
                    RecordOutcome::Failed {
                        error: message.clone(),
                    },
                    attempts,
                    duration_ms,
                    None,
                );
                action_events.emit(EventKind::ActionResult {
                    outcome: "failed".to_string(),
                    attempts,
                    duration_ms,
                    detail: Some(message.clone()),
                });
                StepResult::Failed(ProcessError::ActionFailed {
                    action: meta.name.clone(),
                    attempts,
                    message,
                })
            }
            RetryOutcome::Cancelled => StepResult::Cancelled,
        }
    }

    fn finish(
        &self,
        process: AgentProcess,
        events: &EventEmitter,
        status: ProcessStatus,
        error: Option<ProcessError>,
    ) -> ProcessResult {
        if let Err(e) = process.status.transition(status) {
            warn!(process_id = %process.id, error = %e, "Status transition rejected");
        }
        match status {
            ProcessStatus::Completed => {
                events.emit(EventKind::ProcessCompleted {
                    bindings: process.goal.required.iter().map(|b| b.name.clone()).collect(),
                });
                info!(
                    process_id = %process.id,
                    actions = process.history.len(),
                    "Process completed"
                );
            }
            ProcessStatus::Killed => {
                events.emit(EventKind::ProcessKilled);
                info!(process_id = %process.id, "Process killed");
            }
            _ => {
                let message = error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                events.emit(EventKind::ProcessFailed {
                    error: message.clone(),
                });
                warn!(process_id = %process.id, error = %message, "Process failed");
            }
        }
        process.into_result(error)
    }
}

/// Engine 构建器
pub struct EngineBuilder {
    config: EngineSection,
    evaluator: Arc<dyn ConditionEvaluator>,
    qos: QosResolver,
    sink: Arc<dyn EventSink>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            config: EngineSection::default(),
            evaluator: Arc::new(BindingConditions),
            qos: QosResolver::new(),
            sink: Arc::new(TracingSink),
        }
    }
}

impl EngineBuilder {
    pub fn with_config(mut self, config: EngineSection) -> Self {
        self.config = config;
        self
    }

    pub fn with_max_actions(mut self, max_actions: usize) -> Self {
        self.config.max_actions = max_actions;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn ConditionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_qos(mut self, qos: QosResolver) -> Self {
        self.qos = qos;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            inner: Arc::new(EngineInner {
                config: self.config,
                evaluator: self.evaluator,
                qos: self.qos,
                sink: self.sink,
            }),
        }
    }
}
