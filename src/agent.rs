//! Agent 平台
//!
//! 持有共享的 Engine 与已部署的 AgentDefinition，按名字运行目标；
//! start 在后台任务中运行并返回可取消的 ProcessHandle。所有流程的取消令牌都派生自平台的 Supervisor。

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::info;

use crate::blackboard::{Binding, Blackboard};
use crate::config::AppConfig;
use crate::core::{ModelError, Supervisor};
use crate::model::{AgentDefinition, Goal};
use crate::process::{Engine, ProcessHandle, ProcessResult};

pub struct AgentPlatform {
    engine: Engine,
    agents: HashMap<String, Arc<AgentDefinition>>,
    supervisor: Supervisor,
}

impl AgentPlatform {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            agents: HashMap::new(),
            supervisor: Supervisor::new(),
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(Engine::from_config(cfg))
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// 部署（或按名替换）一个 Agent
    pub fn deploy(&mut self, agent: AgentDefinition) -> Arc<AgentDefinition> {
        let agent = Arc::new(agent);
        info!(
            agent = %agent.name,
            actions = agent.actions.len(),
            goals = agent.goals.len(),
            "Agent deployed"
        );
        self.agents.insert(agent.name.clone(), Arc::clone(&agent));
        agent
    }

    pub fn agent(&self, name: &str) -> Result<Arc<AgentDefinition>, ModelError> {
        self.agents
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::UnknownAgent(name.to_string()))
    }

    pub fn agent_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    fn prepare(
        &self,
        agent: &str,
        goal: Option<&str>,
    ) -> Result<(Arc<AgentDefinition>, Goal), ModelError> {
        let agent = self.agent(agent)?;
        let goal = agent.resolve_goal(goal)?.clone();
        Ok((agent, goal))
    }

    /// 运行到终态；goal 为 None 时使用 Agent 的第一个目标
    pub async fn run(
        &self,
        agent: &str,
        goal: Option<&str>,
        bindings: impl IntoIterator<Item = (Binding, Value)>,
    ) -> Result<ProcessResult, ModelError> {
        let (agent, goal) = self.prepare(agent, goal)?;
        Ok(self
            .engine
            .run(
                &agent,
                &goal,
                Blackboard::with_bindings(bindings),
                self.supervisor.child_token(),
            )
            .await)
    }

    /// 后台运行，返回句柄（可观察状态、取消）与结果 JoinHandle
    pub fn start(
        &self,
        agent: &str,
        goal: Option<&str>,
        bindings: impl IntoIterator<Item = (Binding, Value)>,
    ) -> Result<(ProcessHandle, JoinHandle<ProcessResult>), ModelError> {
        let (agent, goal) = self.prepare(agent, goal)?;
        Ok(self.engine.start(
            agent,
            goal,
            Blackboard::with_bindings(bindings),
            self.supervisor.child_token(),
        ))
    }

    /// 取消平台上所有运行中的流程
    pub fn shutdown(&self) {
        info!("Cancelling all processes");
        self.supervisor.cancel_all();
    }
}
