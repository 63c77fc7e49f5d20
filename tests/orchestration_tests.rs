mod common;

use std::sync::Arc;
use std::time::Duration;

use mcp_host::agent_loop::{CycleStatus, LoopLimits, ModelResponse, Orchestrator, ResponseBlock};
use mcp_host::config::{HostConfig, ServerConfig};
use mcp_host::conversation::{
    Conversation, OutcomePayload, SequentialIdGenerator, ToolErrorKind, Turn,
};
use mcp_host::error::HostError;
use mcp_host::mcp::{
    ConnectResult, ConnectionState, RegistryOptions, ServerRegistry, SseConnector, SseOptions,
    ToolDispatcher,
};
use pretty_assertions::assert_eq;
use serde_json::json;

use common::{dead_endpoint, lookup_server, spawn_tool_server, FlakyConnector, ScriptedModel};

fn sse_connector() -> Arc<SseConnector> {
    Arc::new(
        SseConnector::new(SseOptions {
            open_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
        })
        .unwrap(),
    )
}

fn orchestrator(model: Arc<ScriptedModel>, registry: Arc<ServerRegistry>) -> Orchestrator {
    Orchestrator::new(model, ToolDispatcher::new(registry, Duration::from_secs(5)))
        .with_id_generator(Arc::new(SequentialIdGenerator::new("gen_")))
}

fn outcome_of(turns: &[Turn], id: &str) -> OutcomePayload {
    turns
        .iter()
        .find_map(|turn| match turn {
            Turn::ToolOutcome(outcome) if outcome.id == id => Some(outcome.payload.clone()),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no outcome for {id}"))
}

#[tokio::test]
async fn routes_calls_to_owning_servers_over_sse() {
    let alpha = spawn_tool_server(lookup_server("alpha")).await;
    let beta = spawn_tool_server(lookup_server("beta")).await;

    let mut config = HostConfig::default();
    config.servers = vec![
        ServerConfig::new("alpha", alpha.sse_url()),
        ServerConfig::new("beta", beta.sse_url()),
    ];
    let registry = Arc::new(ServerRegistry::from_config(&config, sse_connector()).unwrap());
    let report = registry.connect_all().await;
    assert_eq!(report["alpha"], ConnectResult::Connected { tools: 1 });
    assert_eq!(report["beta"], ConnectResult::Connected { tools: 1 });

    let model = ScriptedModel::new();
    model.queue_tool_call(Some("toolu_a"), "alpha_lookup", json!({"q": "x"}));
    model.queue_tool_call(Some("toolu_b"), "beta_lookup", json!({"q": "y"}));
    model.queue_text("alpha said x, beta said y");

    let orchestrator = orchestrator(model.clone(), Arc::clone(&registry));
    let mut conversation = Conversation::new();
    let report = orchestrator
        .submit(&mut conversation, "look up x on alpha and y on beta")
        .await
        .unwrap();

    assert_eq!(report.status, CycleStatus::Completed);
    assert_eq!(report.rounds, 3);
    assert_eq!(
        outcome_of(&report.turns, "toolu_a"),
        OutcomePayload::success(json!("alpha:x"))
    );
    assert_eq!(
        outcome_of(&report.turns, "toolu_b"),
        OutcomePayload::success(json!("beta:y"))
    );

    let requests = model.requests();
    let mut offered: Vec<_> = requests[0].tools.iter().map(|t| t.name.clone()).collect();
    offered.sort();
    assert_eq!(offered, vec!["alpha_lookup", "beta_lookup"]);
    assert!(requests[0].system.contains("- alpha_lookup: Look something up"));

    registry.shutdown().await;
}

#[tokio::test]
async fn unreachable_server_is_excluded_but_others_work() {
    let alpha = spawn_tool_server(lookup_server("alpha")).await;
    let mut config = HostConfig::default();
    config.servers = vec![
        ServerConfig::new("alpha", alpha.sse_url()),
        ServerConfig::new("gamma", dead_endpoint().await),
    ];
    let registry = Arc::new(ServerRegistry::from_config(&config, sse_connector()).unwrap());
    let report = registry.connect_all().await;
    assert!(matches!(report["gamma"], ConnectResult::Failed { .. }));

    let states = registry.server_states();
    let gamma = states.iter().find(|s| s.name == "gamma").unwrap();
    assert_eq!(gamma.state, ConnectionState::Failed);

    let model = ScriptedModel::new();
    model.queue_tool_call(Some("t1"), "gamma_lookup", json!({"q": "x"}));
    model.queue_text("gamma is unavailable");

    let orchestrator = orchestrator(model.clone(), Arc::clone(&registry));
    let mut conversation = Conversation::new();
    let report = orchestrator
        .submit(&mut conversation, "ask gamma")
        .await
        .unwrap();

    assert!(model.requests()[0]
        .tools
        .iter()
        .all(|tool| !tool.name.starts_with("gamma_")));
    assert_eq!(
        outcome_of(&report.turns, "t1").error_kind(),
        Some(ToolErrorKind::UnknownTool)
    );
    assert_eq!(report.status, CycleStatus::Completed);
}

#[tokio::test]
async fn transport_failure_is_reported_to_the_model() {
    let connector = Arc::new(FlakyConnector {
        tool: "lookup".into(),
    });
    let registry = ServerRegistry::new(connector, RegistryOptions::default());
    registry
        .register_server(ServerConfig::new("alpha", "memory://alpha"))
        .unwrap();
    registry.connect_all().await;
    let registry = Arc::new(registry);

    let model = ScriptedModel::new();
    model.queue_tool_call(Some("t1"), "alpha_lookup", json!({"q": "x"}));
    model.queue_text("the lookup failed");

    let orchestrator = orchestrator(model.clone(), registry);
    let mut conversation = Conversation::new();
    let report = orchestrator
        .submit(&mut conversation, "look up x")
        .await
        .unwrap();

    let outcome = outcome_of(&report.turns, "t1");
    assert_eq!(outcome.error_kind(), Some(ToolErrorKind::Transport));

    let requests = model.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[1].turns.last(),
        Some(&Turn::outcome("t1", outcome))
    );
}

#[tokio::test]
async fn round_budget_leaves_a_valid_transcript() {
    let alpha = spawn_tool_server(lookup_server("alpha")).await;
    let registry = ServerRegistry::new(sse_connector(), RegistryOptions::default());
    registry
        .register_server(ServerConfig::new("alpha", alpha.sse_url()))
        .unwrap();
    registry.connect_all().await;
    let registry = Arc::new(registry);

    let model = ScriptedModel::new();
    for _ in 0..5 {
        model.queue_tool_call(None, "alpha_lookup", json!({"q": "again"}));
    }

    let orchestrator = orchestrator(model.clone(), registry).with_limits(LoopLimits {
        max_rounds: 3,
        ..LoopLimits::default()
    });
    let mut conversation = Conversation::new();
    let report = orchestrator
        .submit(&mut conversation, "loop forever")
        .await
        .unwrap();

    assert_eq!(report.status, CycleStatus::BudgetExceeded);
    assert_eq!(model.requests().len(), 3);
    conversation.transcript().validate().unwrap();
    assert_eq!(
        outcome_of(&report.turns, "gen_1"),
        OutcomePayload::success(json!("alpha:again"))
    );
}

#[tokio::test]
async fn follow_up_cycle_replays_earlier_turns() {
    let alpha = spawn_tool_server(lookup_server("alpha")).await;
    let registry = ServerRegistry::new(sse_connector(), RegistryOptions::default());
    registry
        .register_server(ServerConfig::new("alpha", alpha.sse_url()))
        .unwrap();
    registry.connect_all().await;

    let model = ScriptedModel::new();
    model.queue_tool_call(Some("t1"), "alpha_lookup", json!({"q": "x"}));
    model.queue_text("first answer");
    model.queue(Ok(ModelResponse::new(vec![ResponseBlock::text(
        "second answer",
    )])));

    let orchestrator = orchestrator(model.clone(), Arc::new(registry));
    let mut conversation = Conversation::new();
    orchestrator
        .submit(&mut conversation, "first")
        .await
        .unwrap();
    let second = orchestrator
        .submit(&mut conversation, "second")
        .await
        .unwrap();

    assert_eq!(
        second.turns,
        vec![Turn::user("second"), Turn::assistant("second answer")]
    );
    let last_request = model.requests().pop().unwrap();
    assert_eq!(last_request.turns.len(), 5);
    assert_eq!(last_request.turns[0], Turn::user("first"));
}

#[tokio::test]
async fn model_failure_surfaces_as_error() {
    let registry = Arc::new(ServerRegistry::new(
        sse_connector(),
        RegistryOptions::default(),
    ));
    let model = ScriptedModel::new();
    model.queue(Err(HostError::model_status(500, "internal")));

    let orchestrator = orchestrator(model, registry);
    let mut conversation = Conversation::new();
    let err = orchestrator
        .submit(&mut conversation, "hello")
        .await
        .unwrap_err();

    assert!(matches!(err, HostError::ModelCall { status: Some(500), .. }));
    assert_eq!(conversation.snapshot(), vec![Turn::user("hello")]);
}
