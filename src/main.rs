//! Hive 演示入口
//!
//! 部署一个两步 Agent（本地动作 + Mock 模型驱动的工具循环），运行到终态并打印结果与执行历史。
//! 用法：`hive [主题]`，日志级别由 RUST_LOG 控制。

use std::sync::Arc;

use anyhow::Context;
use hive::config::load_config;
use hive::llm::MockModel;
use hive::model::{ActionMetadata, AgentDefinition, FnAction, Goal};
use hive::process::ToolLoopAction;
use hive::tools::{EchoTool, ToolExecutor, ToolLoop, ToolRegistry};
use hive::{observability, AgentPlatform, Binding};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).context("Failed to load config")?;
    let topic = std::env::args().nth(1).unwrap_or_else(|| "ownership".to_string());

    let executor = ToolExecutor::new(
        ToolRegistry::new().with(EchoTool),
        cfg.tool_loop.tool_timeout_secs,
    );
    let tool_loop = ToolLoop::new(Arc::new(MockModel), executor);

    let outline = ActionMetadata::new("outline")
        .description("Turn a topic into a short outline")
        .input(Binding::of_type("Topic"))
        .output(Binding::of_type("Outline"))
        .into_action(FnAction::sync(|inputs| {
            let topic = inputs.get("topic").and_then(|v| v.as_str()).unwrap_or_default();
            Ok(json!(format!("1. what is {topic} 2. why {topic} matters")))
        }));
    let write = ActionMetadata::new("write")
        .description("Draft notes from the outline with tools")
        .input(Binding::of_type("Outline"))
        .output(Binding::of_type("Notes"))
        .tool("echo")
        .into_action(
            ToolLoopAction::new(tool_loop, "Write notes following: {outline}")
                .with_max_iterations(cfg.tool_loop.max_iterations),
        );
    let agent = AgentDefinition::builder("note_writer")
        .description("Writes study notes")
        .action(outline)
        .action(write)
        .goal(Goal::producing("Notes"))
        .build()
        .context("Invalid agent definition")?;

    let mut platform = AgentPlatform::from_config(&cfg);
    platform.deploy(agent);

    let result = platform
        .run("note_writer", None, [(Binding::of_type("Topic"), json!(topic))])
        .await
        .context("Failed to run agent")?;

    println!("status: {}", result.status);
    for record in &result.history {
        println!(
            "  #{} {} ({} attempt(s), {} ms)",
            record.seq, record.action, record.attempts, record.duration_ms
        );
    }
    match (&result.output, &result.error) {
        (Some(output), _) => println!("output: {}", output),
        (None, Some(error)) => println!("error: {}", error),
        (None, None) => {}
    }
    Ok(())
}
