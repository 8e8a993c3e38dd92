//! Peer protocol router.
//!
//! Each exposed agent runs a router that answers two queries: `list_tools`
//! (one descriptor per peer agent, per shared integration, and per built-in
//! tool) and `call_tool` (dispatch by name). The router is stateless between
//! calls; the only chain state is the recursion depth carried in
//! [`CallContext`].

pub mod builtins;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use covey_core::{Error, Result};

use crate::config::AgentDefinition;
use crate::task::{Task, TaskId, TaskResult, TaskType};

pub use builtins::BuiltinTool;

/// Hard ceiling on peer-call chains. A call arriving at or beyond this
/// depth is answered with [`RECURSION_LIMIT_MESSAGE`] instead of being
/// forwarded, so the chain unwinds cleanly.
pub const MAX_RECURSION_DEPTH: u32 = 10;

/// Sentinel returned when the recursion ceiling is hit. Deliberately not an
/// error: the caller decides how to proceed.
pub const RECURSION_LIMIT_MESSAGE: &str = "Max recursion depth reached";

/// One tool as advertised to the model-invocation layer.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    /// Tool name (peer agent name, integration name, or built-in name).
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON-schema-shaped input contract.
    pub input_schema: Value,
}

/// Context carried alongside a tool call. Lives only for the duration of a
/// call chain; never persisted.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Hop counter: 0 at the chain root, incremented by exactly 1 per hop.
    pub recursion_depth: u32,
    /// The agent making this call.
    pub calling_agent: String,
    /// The task on whose behalf the call is made, for correlation.
    pub task_id: Option<TaskId>,
    /// Free-form caller-supplied context.
    pub context: Option<Value>,
}

impl CallContext {
    /// Context for a fresh (depth 0) call chain.
    pub fn root(calling_agent: impl Into<String>) -> Self {
        Self {
            recursion_depth: 0,
            calling_agent: calling_agent.into(),
            task_id: None,
            context: None,
        }
    }

    /// Set the recursion depth (used when resuming a chain from a task).
    #[must_use]
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.recursion_depth = depth;
        self
    }

    /// Record the task this chain belongs to.
    #[must_use]
    pub fn with_task(mut self, task_id: impl Into<TaskId>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Attach caller-supplied context.
    #[must_use]
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }
}

/// The worker's channel back to the orchestrator: peer calls become
/// scheduler submissions, integration calls become scheduler RPCs.
#[async_trait]
pub trait SchedulerClient: Send + Sync {
    /// Submit a peer-call task and wait for its result.
    async fn execute_peer(&self, task: Task) -> Result<TaskResult>;

    /// Call a shared integration through the orchestrator.
    async fn call_integration(
        &self,
        call_id: &str,
        task_id: &str,
        integration: &str,
        action: &str,
        params: &Value,
    ) -> Result<String>;
}

/// A peer agent as seen by a router: name plus advertised description.
#[derive(Debug, Clone)]
pub struct PeerInfo {
    /// The peer's agent name (doubles as the tool name).
    pub name: String,
    /// The peer's configured description.
    pub description: String,
}

/// Where a tool name resolves to.
#[derive(Debug, Clone)]
enum ToolTarget {
    /// Another agent, called through the scheduler.
    Peer(PeerInfo),
    /// A shared external integration.
    Shared(String),
    /// A local built-in tool.
    Builtin(BuiltinTool),
}

/// Per-agent tool router.
///
/// The dispatch table is populated at construction from three disjoint
/// sets: configured peers (minus the agent itself), the agent's shared
/// integrations, and the built-in set filtered by `allowed_tools`.
pub struct PeerRouter {
    agent_id: String,
    directory: PathBuf,
    table: HashMap<String, ToolTarget>,
    scheduler: Arc<dyn SchedulerClient>,
}

impl PeerRouter {
    /// Build a router for one agent.
    pub fn new(
        agent_id: impl Into<String>,
        definition: &AgentDefinition,
        peers: Vec<PeerInfo>,
        integrations: Vec<String>,
        scheduler: Arc<dyn SchedulerClient>,
    ) -> Self {
        let agent_id = agent_id.into();
        let mut table = HashMap::new();

        for peer in peers {
            if peer.name == agent_id {
                continue;
            }
            table.insert(peer.name.clone(), ToolTarget::Peer(peer));
        }

        for name in integrations {
            table.insert(name.clone(), ToolTarget::Shared(name));
        }

        for tool in BuiltinTool::ALL {
            let allowed = definition.allowed_tools.is_empty()
                || definition.allowed_tools.iter().any(|t| t == tool.name());
            if allowed {
                table.insert(tool.name().to_string(), ToolTarget::Builtin(tool));
            }
        }

        Self {
            agent_id,
            directory: definition.directory.clone(),
            table,
            scheduler,
        }
    }

    /// The agent this router belongs to.
    #[must_use]
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Every tool this router can dispatch, sorted by name.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        let mut names: Vec<&String> = self.table.keys().collect();
        names.sort();

        names
            .into_iter()
            .filter_map(|name| self.table.get(name).map(|t| Self::describe(name, t)))
            .collect()
    }

    fn describe(name: &str, target: &ToolTarget) -> ToolDescriptor {
        match target {
            ToolTarget::Peer(peer) => ToolDescriptor {
                name: name.to_string(),
                description: if peer.description.is_empty() {
                    format!("Call agent '{name}'")
                } else {
                    format!("Call agent '{name}': {}", peer.description)
                },
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "request": { "type": "string" },
                        "context": { "type": "object" }
                    },
                    "required": ["request"]
                }),
            },
            ToolTarget::Shared(integration) => ToolDescriptor {
                name: name.to_string(),
                description: format!("Shared integration '{integration}'"),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "action": { "type": "string" },
                        "params": { "type": "object" }
                    },
                    "required": ["action"]
                }),
            },
            ToolTarget::Builtin(tool) => ToolDescriptor {
                name: name.to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            },
        }
    }

    /// Dispatch a tool call by name.
    ///
    /// Unknown names produce `Unknown tool: <name>` as a descriptive error;
    /// the router itself never crashes.
    pub async fn call_tool(&self, name: &str, args: &Value, ctx: &CallContext) -> Result<String> {
        debug!(
            agent_id = %self.agent_id,
            tool = name,
            depth = ctx.recursion_depth,
            "routing tool call"
        );

        match self.table.get(name) {
            Some(ToolTarget::Peer(peer)) => self.call_peer(peer, args, ctx).await,
            Some(ToolTarget::Shared(integration)) => self.call_shared(integration, args, ctx).await,
            Some(ToolTarget::Builtin(tool)) => tool.run(&self.directory, args).await,
            None => Err(Error::unknown_tool(name)),
        }
    }

    async fn call_peer(&self, peer: &PeerInfo, args: &Value, ctx: &CallContext) -> Result<String> {
        if ctx.recursion_depth >= MAX_RECURSION_DEPTH {
            debug!(
                agent_id = %self.agent_id,
                peer = %peer.name,
                depth = ctx.recursion_depth,
                "recursion ceiling reached, unwinding"
            );
            return Ok(RECURSION_LIMIT_MESSAGE.to_string());
        }

        let request = args
            .get("request")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::invalid_config("peer call requires a 'request' argument"))?;

        let mut prompt = format!("Request from agent '{}': {request}", ctx.calling_agent);
        let extra = args.get("context").cloned().or_else(|| ctx.context.clone());
        if let Some(context) = &extra {
            prompt.push_str(&format!("\nContext: {context}"));
        }

        let mut payload = json!({
            "prompt": prompt,
            "recursion_depth": ctx.recursion_depth.saturating_add(1),
            "caller": ctx.calling_agent,
        });
        if let (Some(map), Some(context)) = (payload.as_object_mut(), extra) {
            map.insert("context".to_string(), context);
        }

        let task = Task::new(
            format!("peer-{}", ulid::Ulid::new()),
            &peer.name,
            TaskType::Completion,
        )
        .with_payload(payload);

        let result = self.scheduler.execute_peer(task).await?;
        if result.success {
            Ok(result
                .output_text()
                .map(str::to_string)
                .or_else(|| result.output.as_ref().map(Value::to_string))
                .unwrap_or_default())
        } else {
            Err(Error::task_failed(
                result.task_id,
                result.error.unwrap_or_else(|| "peer call failed".to_string()),
            ))
        }
    }

    async fn call_shared(
        &self,
        integration: &str,
        args: &Value,
        ctx: &CallContext,
    ) -> Result<String> {
        let action = args
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::invalid_config("shared tool call requires an 'action'"))?;
        let params = args.get("params").cloned().unwrap_or(Value::Null);

        let call_id = format!("call-{}", ulid::Ulid::new());
        let task_id = ctx.task_id.clone().unwrap_or_default();
        self.scheduler
            .call_integration(&call_id, &task_id, integration, action, &params)
            .await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scheduler stub that records peer tasks and integration calls.
    struct RecordingScheduler {
        tasks: Mutex<Vec<Task>>,
        integration_calls: Mutex<Vec<(String, String, Value)>>,
    }

    impl RecordingScheduler {
        fn new() -> Self {
            Self {
                tasks: Mutex::new(Vec::new()),
                integration_calls: Mutex::new(Vec::new()),
            }
        }

        fn submitted(&self) -> Vec<Task> {
            self.tasks.lock().unwrap().clone()
        }

        fn integration_calls(&self) -> Vec<(String, String, Value)> {
            self.integration_calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SchedulerClient for RecordingScheduler {
        async fn execute_peer(&self, task: Task) -> Result<TaskResult> {
            let id = task.id.clone();
            let agent = task.agent_id.clone();
            self.tasks.lock().unwrap().push(task);
            Ok(TaskResult::success(
                id,
                agent,
                Value::String("peer answer".to_string()),
                Duration::from_millis(5),
            ))
        }

        async fn call_integration(
            &self,
            _call_id: &str,
            _task_id: &str,
            integration: &str,
            action: &str,
            params: &Value,
        ) -> Result<String> {
            self.integration_calls.lock().unwrap().push((
                integration.to_string(),
                action.to_string(),
                params.clone(),
            ));
            Ok(format!("{integration} performed {action}"))
        }
    }

    fn build_router(scheduler: Arc<RecordingScheduler>) -> PeerRouter {
        PeerRouter::new(
            "lead",
            &AgentDefinition::new(),
            vec![
                PeerInfo {
                    name: "researcher".to_string(),
                    description: "digs into sources".to_string(),
                },
                // Self entries are dropped at construction.
                PeerInfo {
                    name: "lead".to_string(),
                    description: String::new(),
                },
            ],
            vec!["tracker".to_string()],
            scheduler,
        )
    }

    #[test]
    fn should_list_peers_integrations_and_builtins() {
        let router = build_router(Arc::new(RecordingScheduler::new()));
        let names: Vec<String> = router.list_tools().into_iter().map(|t| t.name).collect();

        assert_eq!(
            names,
            vec!["bash", "read_file", "researcher", "search", "tracker", "write_file"]
        );
    }

    #[test]
    fn should_not_expose_self_as_peer() {
        let router = build_router(Arc::new(RecordingScheduler::new()));
        assert!(!router.list_tools().iter().any(|t| t.name == "lead"));
    }

    #[test]
    fn should_filter_builtins_by_allowed_tools() {
        let definition = AgentDefinition::new()
            .with_allowed_tool("read_file")
            .with_allowed_tool("search");
        let router = PeerRouter::new(
            "lead",
            &definition,
            Vec::new(),
            Vec::new(),
            Arc::new(RecordingScheduler::new()),
        );

        let names: Vec<String> = router.list_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["read_file", "search"]);
    }

    #[tokio::test]
    async fn should_report_unknown_tool_without_crashing() {
        let router = build_router(Arc::new(RecordingScheduler::new()));
        let ctx = CallContext::root("lead");

        let err = router
            .call_tool("does_not_exist", &json!({}), &ctx)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Unknown tool: does_not_exist");
    }

    #[tokio::test]
    async fn should_forward_peer_call_and_increment_depth() {
        let scheduler = Arc::new(RecordingScheduler::new());
        let router = build_router(scheduler.clone());
        let ctx = CallContext::root("lead").with_depth(9);

        let output = router
            .call_tool("researcher", &json!({"request": "find sources"}), &ctx)
            .await
            .unwrap();

        assert_eq!(output, "peer answer");
        let submitted = scheduler.submitted();
        assert_eq!(submitted.len(), 1);
        let task = submitted.first().unwrap();
        assert_eq!(task.agent_id, "researcher");
        assert_eq!(task.payload["recursion_depth"], json!(10));
        assert!(task.payload["prompt"]
            .as_str()
            .unwrap()
            .contains("Request from agent 'lead': find sources"));
    }

    #[tokio::test]
    async fn should_stop_at_recursion_ceiling_without_forwarding() {
        let scheduler = Arc::new(RecordingScheduler::new());
        let router = build_router(scheduler.clone());
        let ctx = CallContext::root("lead").with_depth(MAX_RECURSION_DEPTH);

        let output = router
            .call_tool("researcher", &json!({"request": "go deeper"}), &ctx)
            .await
            .unwrap();

        assert_eq!(output, RECURSION_LIMIT_MESSAGE);
        assert!(scheduler.submitted().is_empty());
    }

    #[tokio::test]
    async fn should_dispatch_shared_integration_by_action() {
        let scheduler = Arc::new(RecordingScheduler::new());
        let router = build_router(scheduler.clone());
        let ctx = CallContext::root("lead").with_task("t-1");

        let output = router
            .call_tool(
                "tracker",
                &json!({"action": "create-issue", "params": {"title": "bug"}}),
                &ctx,
            )
            .await
            .unwrap();

        assert_eq!(output, "tracker performed create-issue");
        let calls = scheduler.integration_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "tracker");
        assert_eq!(calls[0].1, "create-issue");
    }

    #[tokio::test]
    async fn should_require_action_for_shared_call() {
        let router = build_router(Arc::new(RecordingScheduler::new()));
        let ctx = CallContext::root("lead");

        let err = router.call_tool("tracker", &json!({}), &ctx).await.unwrap_err();
        assert!(err.to_string().contains("action"));
    }

    #[tokio::test]
    async fn should_include_context_in_peer_prompt() {
        let scheduler = Arc::new(RecordingScheduler::new());
        let router = build_router(scheduler.clone());
        let ctx = CallContext::root("lead");

        router
            .call_tool(
                "researcher",
                &json!({"request": "check this", "context": {"topic": "storage"}}),
                &ctx,
            )
            .await
            .unwrap();

        let submitted = scheduler.submitted();
        let prompt = submitted.first().unwrap().payload["prompt"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(prompt.contains("Context:"));
        assert!(prompt.contains("storage"));
    }
}
