//! Worker actor: executes one task at a time on behalf of a single agent.
//!
//! A worker owns no scheduling state. It receives `Execute`, runs the task
//! on a spawned tokio task (so its mailbox stays responsive), and reports
//! the outcome back to the scheduler as `TaskComplete` or `TaskError`. The
//! scheduler is the only writer of queue and result state.

use std::sync::Arc;
use std::time::Instant;

use ractor::{Actor, ActorProcessingErr, ActorRef};
use serde_json::Value;
use tracing::{debug, info, warn};

use covey_core::{Error, Result};

use crate::config::AgentDefinition;
use crate::model::{ModelInvoker, ModelReply, ModelRequest};
use crate::router::{CallContext, PeerRouter};
use crate::task::{Task, TaskType};

use super::messages::{SchedulerMessage, WorkerMessage};

/// Cap on model/tool alternations within one completion task. A model that
/// keeps asking for tools past this fails the task instead of spinning.
pub const MAX_TOOL_ROUNDS: u32 = 8;

/// Everything a worker needs to execute tasks for its agent.
///
/// Shared via `Arc` with the spawned execution tasks, so the actor mailbox
/// can keep receiving while a task runs.
pub struct WorkerContext {
    /// The agent this worker executes for.
    pub agent_id: String,
    /// The agent's configuration.
    pub definition: AgentDefinition,
    /// Model-invocation capability.
    pub model: Arc<dyn ModelInvoker>,
    /// The agent's tool router.
    pub router: Arc<PeerRouter>,
}

impl WorkerContext {
    /// Execute one task to completion and return its output.
    pub async fn execute(&self, task: &Task) -> Result<Value> {
        match task.task_type {
            TaskType::Completion => self.run_completion(task).await,
            TaskType::ToolCall => self.run_tool_call(task).await,
            TaskType::FileOperation => self.run_file_operation(task).await,
            TaskType::Command => self.run_command(task).await,
        }
    }

    /// Model loop: invoke, service tool calls, feed results back, repeat
    /// until the model answers with text.
    async fn run_completion(&self, task: &Task) -> Result<Value> {
        let mut prompt = task
            .prompt()
            .ok_or_else(|| Error::task_failed(&task.id, "completion task has no prompt"))?
            .to_string();

        let depth = task
            .payload
            .get("recursion_depth")
            .and_then(Value::as_u64)
            .and_then(|d| u32::try_from(d).ok())
            .unwrap_or(0);
        let mut call_ctx = CallContext::root(&self.agent_id)
            .with_depth(depth)
            .with_task(&task.id);
        if let Some(context) = task.payload.get("context") {
            call_ctx = call_ctx.with_context(context.clone());
        }

        let tools = self.router.list_tools();

        for round in 0..MAX_TOOL_ROUNDS {
            let request =
                ModelRequest::new(&prompt, &self.definition.model).with_tools(tools.clone());
            let reply = self.model.invoke(&request).await?;

            match reply {
                ModelReply::Text(text) => return Ok(Value::String(text)),
                ModelReply::ToolCall { name, arguments } => {
                    debug!(
                        agent_id = %self.agent_id,
                        task_id = %task.id,
                        tool = %name,
                        round,
                        "servicing tool call"
                    );
                    let output = match self.router.call_tool(&name, &arguments, &call_ctx).await {
                        Ok(output) => output,
                        // An unknown tool is fed back as text so the model
                        // can recover instead of crashing the task.
                        Err(e @ Error::UnknownTool(_)) => e.to_string(),
                        Err(e) => return Err(e),
                    };
                    prompt.push_str(&format!("\n[tool {name}] {output}"));
                }
            }
        }

        Err(Error::task_failed(
            &task.id,
            format!("model requested tools for {MAX_TOOL_ROUNDS} rounds without answering"),
        ))
    }

    /// Direct tool invocation: `{tool, arguments}`.
    async fn run_tool_call(&self, task: &Task) -> Result<Value> {
        let name = task
            .payload
            .get("tool")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::task_failed(&task.id, "tool_call task has no 'tool'"))?;
        let arguments = task
            .payload
            .get("arguments")
            .cloned()
            .unwrap_or(Value::Null);

        let output = self
            .router
            .call_tool(
                name,
                &arguments,
                &CallContext::root(&self.agent_id).with_task(&task.id),
            )
            .await?;
        Ok(Value::String(output))
    }

    /// File operation: `{operation: read|write, path, content?}`. Routed
    /// through the tool table so `allowed_tools` applies.
    async fn run_file_operation(&self, task: &Task) -> Result<Value> {
        let operation = task
            .payload
            .get("operation")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::task_failed(&task.id, "file task has no 'operation'"))?;

        let tool = match operation {
            "read" => "read_file",
            "write" => "write_file",
            other => {
                return Err(Error::task_failed(
                    &task.id,
                    format!("unsupported file operation '{other}'"),
                ))
            }
        };

        let output = self
            .router
            .call_tool(
                tool,
                &task.payload,
                &CallContext::root(&self.agent_id).with_task(&task.id),
            )
            .await?;
        Ok(Value::String(output))
    }

    /// Shell command: `{command}`. Routed through the tool table so
    /// `allowed_tools` applies.
    async fn run_command(&self, task: &Task) -> Result<Value> {
        let output = self
            .router
            .call_tool(
                "bash",
                &task.payload,
                &CallContext::root(&self.agent_id).with_task(&task.id),
            )
            .await?;
        Ok(Value::String(output))
    }
}

/// Arguments for spawning a worker actor.
pub struct WorkerArgs {
    /// Shared execution context.
    pub context: Arc<WorkerContext>,
    /// Scheduler mailbox for outcome reports.
    pub scheduler: ActorRef<SchedulerMessage>,
}

/// Worker actor state.
pub struct WorkerState {
    context: Arc<WorkerContext>,
    scheduler: ActorRef<SchedulerMessage>,
}

/// Worker actor definition.
#[derive(Clone, Default)]
pub struct WorkerActorDef;

impl Actor for WorkerActorDef {
    type Msg = WorkerMessage;
    type State = WorkerState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> std::result::Result<Self::State, ActorProcessingErr> {
        info!(agent_id = %args.context.agent_id, "worker starting");
        Ok(WorkerState {
            context: args.context,
            scheduler: args.scheduler,
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> std::result::Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::Execute { task } => {
                let context = Arc::clone(&state.context);
                let scheduler = state.scheduler.clone();

                tokio::spawn(async move {
                    let task_id = task.id.clone();
                    let agent_id = context.agent_id.clone();
                    let started = Instant::now();

                    // Fire-and-forget telemetry; outcome reporting below is
                    // what the scheduler actually depends on.
                    let _ = scheduler.cast(SchedulerMessage::Log {
                        agent_id: agent_id.clone(),
                        task_id: Some(task_id.clone()),
                        message: format!("executing {} task", task.task_type),
                    });

                    let outcome = context.execute(&task).await;
                    let duration = started.elapsed();

                    if outcome.is_ok() {
                        let _ = scheduler.cast(SchedulerMessage::Metric {
                            agent_id: agent_id.clone(),
                            name: "task_duration_ms".to_string(),
                            value: duration.as_secs_f64() * 1000.0,
                        });
                    }

                    let report = match outcome {
                        Ok(output) => SchedulerMessage::TaskComplete {
                            task_id,
                            agent_id,
                            output,
                            duration,
                        },
                        Err(e) => SchedulerMessage::TaskError {
                            task_id,
                            agent_id,
                            reason: e.to_string(),
                            duration,
                        },
                    };

                    if let Err(e) = scheduler.cast(report) {
                        warn!(error = %e, "failed to report task outcome to scheduler");
                    }
                });
            }
        }
        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> std::result::Result<(), ActorProcessingErr> {
        debug!(agent_id = %state.context.agent_id, "worker stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use crate::router::SchedulerClient;
    use crate::task::TaskResult;

    struct NoPeers;

    #[async_trait]
    impl SchedulerClient for NoPeers {
        async fn execute_peer(&self, task: Task) -> Result<TaskResult> {
            Err(Error::unknown_agent(task.agent_id))
        }

        async fn call_integration(
            &self,
            _call_id: &str,
            _task_id: &str,
            integration: &str,
            _action: &str,
            _params: &Value,
        ) -> Result<String> {
            Err(Error::unknown_tool(integration))
        }
    }

    fn context_with_model(model: Arc<dyn ModelInvoker>) -> WorkerContext {
        let definition = AgentDefinition::new();
        let router = Arc::new(PeerRouter::new(
            "solo",
            &definition,
            Vec::new(),
            Vec::new(),
            Arc::new(NoPeers),
        ));
        WorkerContext {
            agent_id: "solo".to_string(),
            definition,
            model,
            router,
        }
    }

    #[tokio::test]
    async fn should_complete_text_only_task() {
        let ctx = context_with_model(Arc::new(crate::model::EchoModel));
        let task = Task::completion("t1", "solo", "summarize the design");

        let output = ctx.execute(&task).await.unwrap();

        assert_eq!(
            output,
            Value::String("[default] summarize the design".to_string())
        );
    }

    #[tokio::test]
    async fn should_feed_tool_output_back_into_prompt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "remember the milk").unwrap();

        let model = Arc::new(crate::model::ScriptedModel::new([
            ModelReply::ToolCall {
                name: "read_file".to_string(),
                arguments: json!({"path": "notes.txt"}),
            },
            ModelReply::Text("noted".to_string()),
        ]));
        let mut ctx = context_with_model(model);
        ctx.definition.directory = dir.path().to_path_buf();
        ctx.router = Arc::new(PeerRouter::new(
            "solo",
            &ctx.definition,
            Vec::new(),
            Vec::new(),
            Arc::new(NoPeers),
        ));

        let task = Task::completion("t2", "solo", "read my notes");
        let output = ctx.execute(&task).await.unwrap();

        assert_eq!(output, Value::String("noted".to_string()));
    }

    #[tokio::test]
    async fn should_recover_from_unknown_tool_request() {
        let model = Arc::new(crate::model::ScriptedModel::new([
            ModelReply::ToolCall {
                name: "does_not_exist".to_string(),
                arguments: json!({}),
            },
            ModelReply::Text("gave up on that tool".to_string()),
        ]));
        let ctx = context_with_model(model);

        let task = Task::completion("t3", "solo", "try something odd");
        let output = ctx.execute(&task).await.unwrap();

        assert_eq!(output, Value::String("gave up on that tool".to_string()));
    }

    #[tokio::test]
    async fn should_fail_after_tool_round_limit() {
        let replies = (0..MAX_TOOL_ROUNDS).map(|_| ModelReply::ToolCall {
            name: "does_not_exist".to_string(),
            arguments: json!({}),
        });
        let ctx = context_with_model(Arc::new(crate::model::ScriptedModel::new(replies)));

        let task = Task::completion("t4", "solo", "loop forever");
        let err = ctx.execute(&task).await.unwrap_err();

        assert!(err.to_string().contains("rounds"));
    }

    #[tokio::test]
    async fn should_fail_completion_without_prompt() {
        let ctx = context_with_model(Arc::new(crate::model::EchoModel));
        let task = Task::new("t5", "solo", TaskType::Completion);

        assert!(ctx.execute(&task).await.is_err());
    }

    #[tokio::test]
    async fn should_run_file_operation_through_router() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context_with_model(Arc::new(crate::model::EchoModel));
        ctx.definition.directory = dir.path().to_path_buf();
        ctx.router = Arc::new(PeerRouter::new(
            "solo",
            &ctx.definition,
            Vec::new(),
            Vec::new(),
            Arc::new(NoPeers),
        ));

        let task = Task::new("t6", "solo", TaskType::FileOperation).with_payload(json!({
            "operation": "write",
            "path": "out.txt",
            "content": "hello"
        }));
        ctx.execute(&task).await.unwrap();

        let read = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(read, "hello");
    }

    #[tokio::test]
    async fn should_respect_allowed_tools_for_commands() {
        let mut ctx = context_with_model(Arc::new(crate::model::EchoModel));
        ctx.definition = AgentDefinition::new().with_allowed_tool("read_file");
        ctx.router = Arc::new(PeerRouter::new(
            "solo",
            &ctx.definition,
            Vec::new(),
            Vec::new(),
            Arc::new(NoPeers),
        ));

        let task =
            Task::new("t7", "solo", TaskType::Command).with_payload(json!({"command": "ls"}));
        let err = ctx.execute(&task).await.unwrap_err();

        assert_eq!(err.to_string(), "Unknown tool: bash");
    }
}
