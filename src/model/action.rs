//! 动作模型
//!
//! ActionMetadata 描述一个工作单元（输入、输出、前后置条件、成本/价值、可重试性、工具名），注册后不可变；
//! ActionBody 是统一的调用能力接口，本地闭包、工具循环、子流程、远程 HTTP 等变体在注册时选定。

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;

use crate::blackboard::Binding;
use crate::core::InvocationError;
use crate::process::ActionContext;
use crate::qos::QosSettings;

/// 已解析的动作输入：变量名 -> 值
pub type ActionInputs = BTreeMap<String, Value>;

/// 动作的静态描述
#[derive(Debug, Clone, Serialize)]
pub struct ActionMetadata {
    pub name: String,
    pub description: String,
    pub inputs: Vec<Binding>,
    pub output: Option<Binding>,
    pub preconditions: Vec<String>,
    pub postconditions: Vec<String>,
    pub cost: f64,
    pub value: f64,
    pub retryable: bool,
    pub tool_names: Vec<String>,
    /// 动作级 QoS 覆盖（层级查找中最具体的一层）
    pub qos: Option<QosSettings>,
}

impl ActionMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            inputs: Vec::new(),
            output: None,
            preconditions: Vec::new(),
            postconditions: Vec::new(),
            cost: 0.0,
            value: 0.0,
            retryable: true,
            tool_names: Vec::new(),
            qos: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn input(mut self, binding: Binding) -> Self {
        if !self.inputs.contains(&binding) {
            self.inputs.push(binding);
        }
        self
    }

    pub fn output(mut self, binding: Binding) -> Self {
        self.output = Some(binding);
        self
    }

    pub fn precondition(mut self, expression: impl Into<String>) -> Self {
        self.preconditions.push(expression.into());
        self
    }

    pub fn postcondition(mut self, expression: impl Into<String>) -> Self {
        self.postconditions.push(expression.into());
        self
    }

    pub fn cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    pub fn value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn tool(mut self, name: impl Into<String>) -> Self {
        self.tool_names.push(name.into());
        self
    }

    pub fn qos(mut self, qos: QosSettings) -> Self {
        self.qos = Some(qos);
        self
    }

    /// 效用分数：value - cost
    pub fn utility(&self) -> f64 {
        self.value - self.cost
    }

    pub fn into_action(self, body: impl ActionBody + 'static) -> Action {
        Action {
            metadata: self,
            body: Arc::new(body),
        }
    }
}

/// 动作一次调用的产出
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionOutput {
    /// 声明的输出绑定的值；None 表示可空输出本次为空
    pub value: Option<Value>,
    /// 额外写入黑板的绑定（仅在调用成功时提交）
    pub extra: Vec<(Binding, Value)>,
}

impl ActionOutput {
    pub fn value(value: Value) -> Self {
        Self {
            value: Some(value),
            extra: Vec::new(),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_extra(mut self, binding: Binding, value: Value) -> Self {
        self.extra.push((binding, value));
        self
    }
}

/// 动作调用能力接口
#[async_trait]
pub trait ActionBody: Send + Sync {
    async fn invoke(&self, ctx: &ActionContext) -> Result<ActionOutput, InvocationError>;

    /// 变体名（日志用）
    fn kind(&self) -> &'static str {
        "local"
    }
}

/// 已注册的动作：元数据 + 调用体
#[derive(Clone)]
pub struct Action {
    pub metadata: ActionMetadata,
    pub body: Arc<dyn ActionBody>,
}

impl Action {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.metadata.name)
            .field("kind", &self.body.kind())
            .finish()
    }
}

type ActionFn =
    dyn Fn(ActionInputs) -> BoxFuture<'static, Result<ActionOutput, InvocationError>> + Send + Sync;

/// 本地闭包动作
#[derive(Clone)]
pub struct FnAction {
    f: Arc<ActionFn>,
}

impl FnAction {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(ActionInputs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ActionOutput, InvocationError>> + Send + 'static,
    {
        Self {
            f: Arc::new(move |inputs| Box::pin(f(inputs))),
        }
    }

    /// 同步闭包，直接返回输出值
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&ActionInputs) -> Result<Value, InvocationError> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self::new(move |inputs| {
            let f = Arc::clone(&f);
            async move { (*f)(&inputs).map(ActionOutput::value) }
        })
    }
}

#[async_trait]
impl ActionBody for FnAction {
    async fn invoke(&self, ctx: &ActionContext) -> Result<ActionOutput, InvocationError> {
        (self.f)(ctx.inputs.clone()).await
    }
}
