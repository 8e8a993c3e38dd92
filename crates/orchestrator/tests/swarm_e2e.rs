//! End-to-end swarm tests - BDD style
//!
//! Following BDD naming convention: given_<context>_when_<action>_then_<outcome>
//!
//! Full-stack scenarios: multi-agent chains, pipelines, map-reduce, the
//! event firehose, and graceful shutdown.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use covey_events::{EventBus, EventSubscription, TaskEvent};
use covey_orchestrator::{
    AgentDefinition, AgentPool, IntegrationRegistry, ModelInvoker, ModelReply, ModelRequest,
    Result, ScriptedModel, Swarm, SwarmConfig, Task,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

struct SlowModel {
    delay: Duration,
}

#[async_trait]
impl ModelInvoker for SlowModel {
    async fn invoke(&self, request: &ModelRequest) -> Result<ModelReply> {
        tokio::time::sleep(self.delay).await;
        Ok(ModelReply::Text(format!("done: {}", request.prompt)))
    }
}

async fn collect_until(
    sub: &mut EventSubscription,
    mut done: impl FnMut(&[TaskEvent]) -> bool,
) -> Vec<TaskEvent> {
    let mut events = Vec::new();
    while !done(&events) {
        match tokio::time::timeout(Duration::from_secs(2), sub.recv()).await {
            Ok(Ok(event)) => events.push(event),
            _ => break,
        }
    }
    events
}

fn position_of(events: &[TaskEvent], event_type: &str, task_id: &str) -> Option<usize> {
    events.iter().position(|e| {
        e.event_type() == event_type && e.task_id().map(String::as_str) == Some(task_id)
    })
}

#[tokio::test]
async fn given_three_agent_chain_when_executed_then_results_flow_back_up() {
    init_tracing();

    // GIVEN: planner -> researcher -> archivist, each exposed to the
    // previous one
    let config = SwarmConfig::new("chain")
        .with_agent("planner", AgentDefinition::new().with_peer("researcher"))
        .with_agent("researcher", AgentDefinition::new().with_peer("archivist"))
        .with_agent("archivist", AgentDefinition::new());
    // Deterministic invocation order down the chain and back up.
    let model = Arc::new(ScriptedModel::new([
        ModelReply::ToolCall {
            name: "researcher".to_string(),
            arguments: serde_json::json!({"request": "what do we know?"}),
        },
        ModelReply::ToolCall {
            name: "archivist".to_string(),
            arguments: serde_json::json!({"request": "pull the records"}),
        },
        ModelReply::Text("records: 42 entries".to_string()),
        ModelReply::Text("synthesis of the records".to_string()),
        ModelReply::Text("final plan".to_string()),
    ]));
    let swarm = Swarm::builder(config)
        .with_model(model.clone())
        .initialize()
        .await
        .unwrap();

    // WHEN: the top of the chain runs
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        swarm.execute(Task::completion("t-plan", "planner", "make a plan")),
    )
    .await
    .unwrap()
    .unwrap();

    // THEN: every level resolved and the top-level answer came back
    assert!(result.success);
    assert_eq!(result.output_text(), Some("final plan"));
    assert_eq!(model.remaining(), 0);

    let status = swarm.status().await.unwrap();
    assert_eq!(status.completed, 3, "both peer tasks completed too");

    swarm.shutdown().await.unwrap();
}

#[tokio::test]
async fn given_pipeline_when_run_then_stages_are_strictly_sequential() {
    init_tracing();

    let config = SwarmConfig::new("stages")
        .with_agent("alpha", AgentDefinition::new())
        .with_agent("beta", AgentDefinition::new());
    let swarm = Swarm::builder(config)
        .with_model(Arc::new(SlowModel {
            delay: Duration::from_millis(30),
        }))
        .initialize()
        .await
        .unwrap();
    let mut events = swarm.events();

    let stages = vec![
        vec![
            Task::completion("s1-a", "alpha", "stage one"),
            Task::completion("s1-b", "beta", "stage one"),
        ],
        vec![Task::completion("s2-a", "alpha", "stage two")],
    ];
    let outputs = swarm.pipeline(stages).await.unwrap();

    assert_eq!(outputs.len(), 2);
    assert!(outputs.iter().flatten().all(|r| r.success));

    // Every first-stage completion precedes the second stage's dispatch.
    let seen = collect_until(&mut events, |evs| {
        position_of(evs, "completed", "s2-a").is_some()
    })
    .await;
    let second_start = position_of(&seen, "dispatched", "s2-a").unwrap();
    assert!(position_of(&seen, "completed", "s1-a").unwrap() < second_start);
    assert!(position_of(&seen, "completed", "s1-b").unwrap() < second_start);

    swarm.shutdown().await.unwrap();
}

#[tokio::test]
async fn given_items_when_map_reduced_then_all_outputs_folded() {
    init_tracing();

    let config = SwarmConfig::new("mapred")
        .with_agent("alpha", AgentDefinition::new())
        .with_agent("beta", AgentDefinition::new());
    let swarm = Swarm::initialize(config).await.unwrap();

    let topics = vec!["storage", "network", "compute"];
    let combined = swarm
        .map_reduce(
            topics,
            |topic| Task::completion(format!("t-{topic}"), "alpha", format!("audit {topic}")),
            |results| {
                results
                    .iter()
                    .filter_map(|r| r.output_text())
                    .collect::<Vec<_>>()
                    .join("; ")
            },
        )
        .await
        .unwrap();

    assert!(combined.contains("storage"));
    assert!(combined.contains("network"));
    assert!(combined.contains("compute"));

    swarm.shutdown().await.unwrap();
}

#[tokio::test]
async fn given_task_lifecycle_when_observed_then_events_arrive_in_order() {
    init_tracing();

    let config = SwarmConfig::new("observed").with_agent("solo", AgentDefinition::new());
    let swarm = Swarm::initialize(config).await.unwrap();
    let mut events = swarm.events();

    let result = swarm
        .execute(Task::completion("t-watched", "solo", "work"))
        .await
        .unwrap();
    assert!(result.success);

    let seen = collect_until(&mut events, |evs| {
        position_of(evs, "completed", "t-watched").is_some()
    })
    .await;
    let submitted = position_of(&seen, "submitted", "t-watched").unwrap();
    let dispatched = position_of(&seen, "dispatched", "t-watched").unwrap();
    let completed = position_of(&seen, "completed", "t-watched").unwrap();
    assert!(submitted < dispatched && dispatched < completed);

    swarm.shutdown().await.unwrap();
}

#[tokio::test]
async fn given_in_flight_task_when_pool_shuts_down_then_drain_waits_for_it() {
    init_tracing();

    // GIVEN: a pool with one slow task in flight
    let config = SwarmConfig::new("draining").with_agent("solo", AgentDefinition::new());
    let bus = Arc::new(EventBus::new());
    let pool = AgentPool::initialize(
        &config,
        Arc::new(SlowModel {
            delay: Duration::from_millis(200),
        }),
        IntegrationRegistry::new(),
        bus,
    )
    .await
    .unwrap();

    let handle = pool.handle().clone();
    let in_flight = tokio::spawn(async move {
        handle
            .submit(Task::completion("t-linger", "solo", "slow work"))
            .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    // WHEN: the pool shuts down while the task is running
    pool.shutdown().await.unwrap();

    // THEN: the drain waited and the caller still got a real result
    let result = in_flight.await.unwrap().unwrap();
    assert!(result.success);
}

#[tokio::test]
async fn given_drained_scheduler_when_submitting_then_rejected() {
    init_tracing();

    let config = SwarmConfig::new("closed").with_agent("solo", AgentDefinition::new());
    let bus = Arc::new(EventBus::new());
    let pool = AgentPool::initialize(
        &config,
        Arc::new(SlowModel {
            delay: Duration::from_millis(10),
        }),
        IntegrationRegistry::new(),
        bus,
    )
    .await
    .unwrap();

    pool.handle().drain(Duration::from_secs(1)).await.unwrap();

    let rejected = pool
        .handle()
        .submit(Task::completion("t-late", "solo", "too late"))
        .await;
    assert!(rejected.is_err(), "submissions after drain must be rejected");

    pool.shutdown().await.unwrap();
}

#[tokio::test]
async fn given_batch_with_failures_when_executed_then_results_keep_input_order() {
    init_tracing();

    let config = SwarmConfig::new("mixed").with_agent("solo", AgentDefinition::new());
    // Script: first task succeeds, second exhausts the script and errors.
    let model = Arc::new(ScriptedModel::new([ModelReply::Text("ok".to_string())]));
    let swarm = Swarm::builder(config)
        .with_model(model)
        .initialize()
        .await
        .unwrap();

    let results = swarm
        .execute_batch(vec![
            Task::completion("t-good", "solo", "first"),
            Task::completion("t-bad", "solo", "second"),
        ])
        .await
        .unwrap();

    assert_eq!(results[0].task_id, "t-good");
    assert_eq!(results[1].task_id, "t-bad");
    assert!(results[0].success);
    assert!(!results[1].success);

    swarm.shutdown().await.unwrap();
}
