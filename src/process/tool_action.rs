//! 工具循环动作：以输入渲染提示词，运行一次有界工具循环，最终输出即动作输出

use async_trait::async_trait;
use serde_json::Value;

use crate::core::InvocationError;
use crate::model::{ActionBody, ActionInputs, ActionOutput};
use crate::process::ActionContext;
use crate::tools::{ToolLoop, ToolLoopRequest, DEFAULT_MAX_ITERATIONS};

pub struct ToolLoopAction {
    tool_loop: ToolLoop,
    prompt_template: String,
    system_prompt: Option<String>,
    tool_names: Vec<String>,
    max_iterations: usize,
}

impl ToolLoopAction {
    /// prompt_template 中的 `{name}` 会被同名输入替换
    pub fn new(tool_loop: ToolLoop, prompt_template: impl Into<String>) -> Self {
        Self {
            tool_loop,
            prompt_template: prompt_template.into(),
            system_prompt: None,
            tool_names: Vec::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// 不设置时使用动作元数据声明的工具
    pub fn with_tools<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.tool_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// 渲染提示词：字符串值原样替换，其余值替换为 JSON 文本
pub fn render_prompt(template: &str, inputs: &ActionInputs) -> String {
    inputs.iter().fold(template.to_string(), |acc, (name, value)| {
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        acc.replace(&format!("{{{}}}", name), &text)
    })
}

#[async_trait]
impl ActionBody for ToolLoopAction {
    async fn invoke(&self, ctx: &ActionContext) -> Result<ActionOutput, InvocationError> {
        let tool_names = if self.tool_names.is_empty() {
            ctx.tool_names.clone()
        } else {
            self.tool_names.clone()
        };
        let mut request = ToolLoopRequest::new(
            render_prompt(&self.prompt_template, &ctx.inputs),
            tool_names,
        )
        .with_max_iterations(self.max_iterations);
        if let Some(system) = &self.system_prompt {
            request = request.with_system_prompt(system.clone());
        }

        let result = self.tool_loop.run(request, &ctx.events, &ctx.cancel).await?;
        Ok(ActionOutput::value(result.output))
    }

    fn kind(&self) -> &'static str {
        "tool_loop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_prompt() {
        let mut inputs = ActionInputs::new();
        inputs.insert("topic".to_string(), json!("ownership"));
        inputs.insert("count".to_string(), json!(3));
        let prompt = render_prompt("Write {count} notes about {topic}. {missing}", &inputs);
        assert_eq!(prompt, "Write 3 notes about ownership. {missing}");
    }
}
